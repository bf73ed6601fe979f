//! Firmware update orchestrator.
//!
//! Flow: `Idle → Downloading → (Rebooting | Failed)`
//!
//! An `OTA` command claims the job gate (an atomic phase word) and spawns
//! one job thread that streams the image from the fixed HTTPS endpoint
//! into the inactive slot. On success the job waits a short fixed delay
//! and restarts the device; it never returns to `Idle`. On any failure
//! the phase becomes `Failed`, which releases the gate: the device keeps
//! running the current image and only another `OTA` command retries.
//!
//! Requests while a job is `Downloading` or `Rebooting` are refused, not
//! queued.

pub mod image;

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use core::time::Duration;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info, warn};

use crate::app::ports::{ImageStream, ImageWriter, UpdatePlatform, UpdateTrigger};
use crate::config::NodeConfig;

use image::ImageCheck;

/// Stack for the job thread; TLS handshakes need the headroom.
const JOB_STACK_SIZE: usize = 10 * 1024;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    AlreadyInProgress,
    SpawnFailed,
    ConnectFailed,
    HttpStatus(u16),
    Timeout,
    ReadFailed,
    EmptyImage,
    ImageTooLarge,
    BadMagic(u8),
    LengthMismatch { expected: u64, received: u64 },
    NoPartition,
    WriteFailed,
    VerifyFailed,
    BootSetFailed,
    Cancelled,
    JobPanicked,
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInProgress => write!(f, "update job already in progress"),
            Self::SpawnFailed => write!(f, "could not spawn update job"),
            Self::ConnectFailed => write!(f, "could not connect to firmware server"),
            Self::HttpStatus(code) => write!(f, "firmware server returned HTTP {}", code),
            Self::Timeout => write!(f, "firmware download timed out"),
            Self::ReadFailed => write!(f, "firmware download read failed"),
            Self::EmptyImage => write!(f, "firmware image is empty"),
            Self::ImageTooLarge => write!(f, "firmware image exceeds slot size"),
            Self::BadMagic(b) => write!(f, "not an app image (first byte 0x{:02x})", b),
            Self::LengthMismatch { expected, received } => {
                write!(f, "image length mismatch ({} of {} bytes)", received, expected)
            }
            Self::NoPartition => write!(f, "no inactive OTA partition available"),
            Self::WriteFailed => write!(f, "OTA write failed"),
            Self::VerifyFailed => write!(f, "OTA verification failed"),
            Self::BootSetFailed => write!(f, "set boot partition failed"),
            Self::Cancelled => write!(f, "update job cancelled"),
            Self::JobPanicked => write!(f, "update job panicked"),
        }
    }
}

impl core::error::Error for UpdateError {}

// ── State machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdatePhase {
    Idle = 0,
    Downloading = 1,
    Rebooting = 2,
    Failed = 3,
}

impl UpdatePhase {
    /// `true` while a job holds the gate.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Downloading | Self::Rebooting)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Downloading,
            2 => Self::Rebooting,
            _ => Self::Failed,
        }
    }
}

/// Atomic phase word. The orchestrator's copy is the job gate; each job
/// also keeps its own so a stale handle never observes a later job.
#[derive(Debug)]
struct JobSlot {
    phase: AtomicU8,
}

impl JobSlot {
    fn new(phase: UpdatePhase) -> Self {
        Self {
            phase: AtomicU8::new(phase as u8),
        }
    }

    fn phase(&self) -> UpdatePhase {
        UpdatePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set(&self, phase: UpdatePhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Atomically move to `Downloading` unless a job is already active.
    fn claim(&self) -> Result<(), UpdateError> {
        let mut current = self.phase.load(Ordering::Acquire);
        loop {
            if UpdatePhase::from_u8(current).is_active() {
                return Err(UpdateError::AlreadyInProgress);
            }
            match self.phase.compare_exchange_weak(
                current,
                UpdatePhase::Downloading as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Per-job state: its own phase and cancel flag, plus the shared gate.
#[derive(Debug)]
struct JobControl {
    gate: Arc<JobSlot>,
    status: JobSlot,
    cancel: AtomicBool,
}

impl JobControl {
    fn new(gate: Arc<JobSlot>) -> Self {
        Self {
            gate,
            status: JobSlot::new(UpdatePhase::Downloading),
            cancel: AtomicBool::new(false),
        }
    }

    fn phase(&self) -> UpdatePhase {
        self.status.phase()
    }

    fn set(&self, phase: UpdatePhase) {
        self.status.set(phase);
        self.gate.set(phase);
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

/// Releases the gate if a job ends (error or unwind) while still
/// `Downloading`.
struct FailOnExit<'a>(&'a JobControl);

impl Drop for FailOnExit<'_> {
    fn drop(&mut self) {
        if self.0.phase() == UpdatePhase::Downloading {
            self.0.set(UpdatePhase::Failed);
        }
    }
}

// ── Settings ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct UpdateSettings {
    pub url: String,
    pub timeout: Duration,
    pub reboot_delay: Duration,
    pub max_image_size: u32,
    pub chunk_size: usize,
    pub current_version: String,
}

impl UpdateSettings {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            url: config.firmware_url.clone(),
            timeout: Duration::from_millis(u64::from(config.ota_timeout_ms)),
            reboot_delay: Duration::from_millis(u64::from(config.reboot_delay_ms)),
            max_image_size: config.max_image_size,
            chunk_size: config.ota_chunk_size,
            current_version: config.firmware_version.clone(),
        }
    }
}

// ── Orchestrator ──────────────────────────────────────────────

/// Owns the job gate and spawns at most one update job at a time.
pub struct UpdateOrchestrator<U> {
    platform: Arc<U>,
    settings: Arc<UpdateSettings>,
    slot: Arc<JobSlot>,
    jobs_started: AtomicU32,
}

impl<U: UpdatePlatform> UpdateOrchestrator<U> {
    pub fn new(platform: U, settings: UpdateSettings) -> Self {
        Self {
            platform: Arc::new(platform),
            settings: Arc::new(settings),
            slot: Arc::new(JobSlot::new(UpdatePhase::Idle)),
            jobs_started: AtomicU32::new(0),
        }
    }

    pub fn phase(&self) -> UpdatePhase {
        self.slot.phase()
    }

    pub fn in_progress(&self) -> bool {
        self.phase().is_active()
    }

    /// Jobs spawned since boot.
    pub fn jobs_started(&self) -> u32 {
        self.jobs_started.load(Ordering::Relaxed)
    }

    /// Claim the gate and spawn a job.
    pub fn start(&self) -> Result<UpdateJob, UpdateError> {
        self.slot.claim()?;

        let control = Arc::new(JobControl::new(Arc::clone(&self.slot)));
        let platform = Arc::clone(&self.platform);
        let settings = Arc::clone(&self.settings);
        let job_control = Arc::clone(&control);

        let spawned = thread::Builder::new()
            .name("ota".into())
            .stack_size(JOB_STACK_SIZE)
            .spawn(move || {
                let _guard = FailOnExit(&job_control);
                let result = run_job(&*platform, &settings, &job_control);
                if let Err(e) = result {
                    error!("OTA: failed: {}, keeping current firmware", e);
                }
                result
            });

        match spawned {
            Ok(handle) => {
                let n = self.jobs_started.fetch_add(1, Ordering::Relaxed) + 1;
                info!("OTA: job #{} started", n);
                Ok(UpdateJob { control, handle })
            }
            Err(e) => {
                warn!("OTA: spawn failed: {}", e);
                self.slot.set(UpdatePhase::Failed);
                Err(UpdateError::SpawnFailed)
            }
        }
    }
}

impl<U: UpdatePlatform> UpdateTrigger for UpdateOrchestrator<U> {
    fn request_update(&self) -> Result<(), UpdateError> {
        // Detached: the job reports through the log and the shared phase.
        self.start().map(drop)
    }
}

// ── Job handle ────────────────────────────────────────────────

/// Supervision handle for one job. Outlives the job without affecting
/// any job started after it.
pub struct UpdateJob {
    control: Arc<JobControl>,
    handle: JoinHandle<Result<u64, UpdateError>>,
}

impl UpdateJob {
    /// Phase of this job, not of the orchestrator.
    pub fn phase(&self) -> UpdatePhase {
        self.control.phase()
    }

    /// Ask this job to stop. Honoured between download chunks; once the
    /// image is finalized the restart goes ahead regardless.
    pub fn cancel(&self) {
        self.control.cancel.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job. `Ok(bytes)` only returns on hosts where
    /// `restart()` comes back.
    pub fn join(self) -> Result<u64, UpdateError> {
        self.handle.join().unwrap_or(Err(UpdateError::JobPanicked))
    }
}

// ── Job body ──────────────────────────────────────────────────

fn run_job<U: UpdatePlatform>(
    platform: &U,
    settings: &UpdateSettings,
    control: &JobControl,
) -> Result<u64, UpdateError> {
    info!("OTA: running {}, fetching {}", settings.current_version, settings.url);

    let mut stream = platform.open_image(&settings.url, settings.timeout)?;
    let mut check = ImageCheck::new(settings.max_image_size, stream.content_length())?;
    let mut writer = platform.begin_write()?;
    let mut buf = vec![0u8; settings.chunk_size.max(1)];

    loop {
        if control.cancelled() {
            return Err(UpdateError::Cancelled);
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        check.accept(&buf[..n])?;
        writer.write(&buf[..n])?;
    }

    let total = check.finish()?;
    writer.finalize()?;

    control.set(UpdatePhase::Rebooting);
    info!("OTA: {} bytes installed, restarting in {:?}", total, settings.reboot_delay);
    thread::sleep(settings.reboot_delay);
    platform.restart();
    Ok(total)
}

// ── Boot validation ───────────────────────────────────────────

/// Mark the running image valid so the bootloader does not roll back.
#[cfg(target_os = "espidf")]
pub fn confirm_running_image() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: running image marked valid"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn confirm_running_image() {
    info!("OTA rollback check (simulation): skipped");
}

// ── Tests ─────────────────────────────────────────────────────
