//! Update orchestrator driven through the command interpreter.

use std::sync::Arc;
use std::time::Duration;

use irnode::app::actuator::{self, ActuatorController};
use irnode::app::events::AppEvent;
use irnode::app::interpreter::CommandInterpreter;
use irnode::config::NodeConfig;
use irnode::drivers::status_led::IndicatorLed;
use irnode::ota::{UpdateError, UpdateJob, UpdateOrchestrator, UpdatePhase, UpdateSettings};

use crate::mock_hw::{MockLed, MockPlatform, RecordingSink, Server, app_image};

fn settings() -> UpdateSettings {
    UpdateSettings {
        reboot_delay: Duration::ZERO,
        chunk_size: 16,
        ..UpdateSettings::from_config(&NodeConfig::default())
    }
}

fn interpreter(
    ota: &Arc<UpdateOrchestrator<MockPlatform>>,
) -> CommandInterpreter<MockLed, Arc<UpdateOrchestrator<MockPlatform>>, RecordingSink> {
    let act = actuator::shared(ActuatorController::new(IndicatorLed::new(MockLed::default()).unwrap()));
    CommandInterpreter::new(act, Arc::clone(ota), RecordingSink::default())
}

fn update_outcomes(sink: &RecordingSink) -> Vec<bool> {
    sink.events
        .iter()
        .filter_map(|e| match e {
            AppEvent::UpdateRequested { accepted } => Some(*accepted),
            _ => None,
        })
        .collect()
}

fn wait_until_finished(job: &UpdateJob) {
    for _ in 0..500 {
        if job.is_finished() {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("update job did not finish");
}

#[test]
fn ota_while_job_running_is_a_no_op() {
    let platform = MockPlatform::held(Server::Serves(app_image(100)));
    let probe = platform.clone();
    let ota = Arc::new(UpdateOrchestrator::new(platform, settings()));
    let mut cmd = interpreter(&ota);

    let job = ota.start().unwrap();
    probe.wait_for_open();
    assert_eq!(job.phase(), UpdatePhase::Downloading);

    cmd.handle(b"OTA");
    cmd.handle(b"OTA");
    assert_eq!(update_outcomes(cmd.sink()), [false, false]);
    assert_eq!(ota.jobs_started(), 1);

    probe.release();
    assert_eq!(job.join(), Ok(100));
    assert_eq!(probe.opens.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(probe.restarts(), 1);
    assert_eq!(*probe.flashed.lock().unwrap(), app_image(100));
}

#[test]
fn failed_download_clears_gate_and_does_not_reboot() {
    let platform = MockPlatform::new(Server::Fails(UpdateError::ConnectFailed));
    let probe = platform.clone();
    let ota = Arc::new(UpdateOrchestrator::new(platform, settings()));

    let job = ota.start().unwrap();
    assert_eq!(job.join(), Err(UpdateError::ConnectFailed));

    assert!(!ota.in_progress());
    assert_eq!(ota.phase(), UpdatePhase::Failed);
    assert_eq!(probe.restarts(), 0);
    assert!(probe.flashed.lock().unwrap().is_empty());
}

#[test]
fn ota_after_failure_starts_a_new_job() {
    let platform = MockPlatform::new(Server::Fails(UpdateError::HttpStatus(404)));
    let ota = Arc::new(UpdateOrchestrator::new(platform, settings()));

    assert_eq!(ota.start().unwrap().join(), Err(UpdateError::HttpStatus(404)));

    let mut cmd = interpreter(&ota);
    cmd.handle(b"OTA");
    assert_eq!(update_outcomes(cmd.sink()), [true]);
    assert_eq!(ota.jobs_started(), 2);
}

#[test]
fn non_image_body_is_rejected_before_flashing() {
    let platform = MockPlatform::new(Server::Serves(b"<html>not found</html>".to_vec()));
    let probe = platform.clone();
    let ota = UpdateOrchestrator::new(platform, settings());

    assert_eq!(ota.start().unwrap().join(), Err(UpdateError::BadMagic(b'<')));
    assert!(probe.flashed.lock().unwrap().is_empty());
    assert_eq!(probe.restarts(), 0);
}

#[test]
fn cancelled_job_fails_without_reboot() {
    let platform = MockPlatform::held(Server::Serves(app_image(100)));
    let probe = platform.clone();
    let ota = UpdateOrchestrator::new(platform, settings());

    let job = ota.start().unwrap();
    probe.wait_for_open();
    job.cancel();
    probe.release();

    assert_eq!(job.join(), Err(UpdateError::Cancelled));
    assert_eq!(ota.phase(), UpdatePhase::Failed);
    assert_eq!(probe.restarts(), 0);
}

#[test]
fn oversized_image_is_refused() {
    let platform = MockPlatform::new(Server::Serves(app_image(128)));
    let ota = UpdateOrchestrator::new(
        platform,
        UpdateSettings {
            max_image_size: 64,
            ..settings()
        },
    );
    assert_eq!(ota.start().unwrap().join(), Err(UpdateError::ImageTooLarge));
    assert!(!ota.in_progress());
}

#[test]
fn mid_stream_timeout_fails_without_finalize() {
    let platform = MockPlatform::new(Server::Serves(app_image(100)))
        .failing_read_after(40, UpdateError::Timeout);
    let probe = platform.clone();
    let ota = UpdateOrchestrator::new(platform, settings());

    assert_eq!(ota.start().unwrap().join(), Err(UpdateError::Timeout));
    assert_eq!(ota.phase(), UpdatePhase::Failed);
    assert!(!ota.in_progress());
    assert_eq!(probe.flashed.lock().unwrap().len(), 40);
    assert_eq!(probe.finalized(), 0);
    assert_eq!(probe.restarts(), 0);
}

#[test]
fn slot_write_failure_fails_without_finalize() {
    let platform =
        MockPlatform::new(Server::Serves(app_image(100))).failing_write(UpdateError::WriteFailed);
    let probe = platform.clone();
    let ota = UpdateOrchestrator::new(platform, settings());

    assert_eq!(ota.start().unwrap().join(), Err(UpdateError::WriteFailed));
    assert_eq!(ota.phase(), UpdatePhase::Failed);
    assert!(!ota.in_progress());
    assert!(probe.flashed.lock().unwrap().is_empty());
    assert_eq!(probe.finalized(), 0);
    assert_eq!(probe.restarts(), 0);
}

#[test]
fn finished_job_handle_does_not_control_the_next_job() {
    let platform = MockPlatform::held(Server::Serves(app_image(100)));
    let probe = platform.clone();
    let ota = UpdateOrchestrator::new(platform, settings());

    let first = ota.start().unwrap();
    probe.wait_for_open();
    first.cancel();
    probe.release();
    wait_until_finished(&first);
    assert_eq!(first.phase(), UpdatePhase::Failed);

    probe.hold();
    let second = ota.start().unwrap();
    probe.wait_for_opens(2);
    first.cancel();
    assert_eq!(first.phase(), UpdatePhase::Failed);
    assert_eq!(second.phase(), UpdatePhase::Downloading);

    probe.release();
    assert_eq!(second.join(), Ok(100));
    assert_eq!(ota.phase(), UpdatePhase::Rebooting);
    assert_eq!(probe.finalized(), 1);
    assert_eq!(probe.restarts(), 1);
    assert_eq!(first.join(), Err(UpdateError::Cancelled));
}
