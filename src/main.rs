//! irnode firmware: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   Adapters (outer ring)                      │
//! │                                                              │
//! │  PinDriver (IR in, LED out)   LogEventSink   SystemClock     │
//! │  MqttLink (telemetry + rx)    EspUpdatePlatform (HTTPS+OTA)  │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  main thread: PollLoop ──▶ ActuatorController ◀── cmd thread │
//! │                  │          (Arc<Mutex<_>>)      Interpreter │
//! │                  ▼                                   │       │
//! │          TelemetryPublisher              UpdateOrchestrator  │
//! │                                            (ota thread)      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Boot is strictly ordered; any failure before the poll loop starts
//! is fatal and parks the main task.
#![deny(unused_must_use)]

#[cfg(target_os = "espidf")]
mod firmware {
    use core::fmt::Display;
    use core::time::Duration;
    use std::sync::Arc;
    use std::thread;

    use embassy_sync::channel::Channel;
    use esp_idf_hal::gpio::{PinDriver, Pull};
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use log::{error, info};

    use irnode::adapters::device_id::{self, DeviceIdentity};
    use irnode::adapters::log_sink::LogEventSink;
    use irnode::adapters::mqtt::{self, MqttLink};
    use irnode::adapters::nvs;
    use irnode::adapters::ota_platform::EspUpdatePlatform;
    use irnode::adapters::time::SystemClock;
    use irnode::adapters::wifi;
    use irnode::app::actuator::{self, ActuatorController};
    use irnode::app::commands::CommandQueue;
    use irnode::app::events::AppEvent;
    use irnode::app::interpreter::CommandInterpreter;
    use irnode::app::poll_loop::{PollLoop, PollSettings};
    use irnode::app::ports::EventSink;
    use irnode::app::telemetry::{TelemetryPublisher, VersionString};
    use irnode::config::{NodeConfig, Secrets};
    use irnode::drivers::status_led::IndicatorLed;
    use irnode::error::Error;
    use irnode::ota::{self, UpdateOrchestrator, UpdateSettings};
    use irnode::pins;
    use irnode::sensors::PresenceSensor;

    const CMD_STACK_SIZE: usize = 8 * 1024;

    /// Transport → interpreter queue.
    static COMMANDS: CommandQueue = Channel::new();

    /// Log the platform error and reduce it to a boot-stage failure.
    fn stage<E: Display>(name: &'static str) -> impl FnOnce(E) -> Error {
        move |e| {
            error!("{}: {}", name, e);
            Error::Init(name)
        }
    }

    /// Log a fatal boot error and park the main task.
    fn halt(err: Error) -> ! {
        error!("boot failed: {}, halting", err);
        loop {
            thread::sleep(Duration::from_secs(1));
        }
    }

    pub fn run() -> anyhow::Result<()> {
        // ── 1. ESP-IDF bootstrap ──────────────────────────────────
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;

        info!("╔══════════════════════════════════════╗");
        info!("║  irnode {:<29}║", irnode::config::FIRMWARE_VERSION);
        info!("╚══════════════════════════════════════╝");

        ota::confirm_running_image();

        let config = NodeConfig::default();
        if let Err(e) = config.validate() {
            halt(e.into());
        }

        // ── 2. Storage + peripherals ──────────────────────────────
        let nvs_partition = nvs::init_storage()
            .map_err(stage("NVS init"))
            .unwrap_or_else(|e| halt(e));
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;

        let mut ir_pin = PinDriver::input(peripherals.pins.gpio21)?;
        ir_pin.set_pull(Pull::Floating)?;
        let led_pin = PinDriver::output(peripherals.pins.gpio2)?;
        info!(
            "GPIO: LED gpio{} (out), IR gpio{} (in, active low)",
            pins::LED_GPIO,
            pins::PRESENCE_SENSOR_GPIO
        );

        let led = IndicatorLed::new(led_pin).unwrap_or_else(|e| halt(e.into()));
        let shared_actuator = actuator::shared(ActuatorController::new(led));
        let sensor = PresenceSensor::new(ir_pin);

        // ── 3. Identity + secrets ─────────────────────────────────
        let mac = device_id::read_mac()
            .map_err(stage("MAC read"))
            .unwrap_or_else(|e| halt(e));
        let identity = DeviceIdentity::from_mac(mac);
        info!("Device ID: {}", identity.as_str());

        let secrets = Secrets::embedded().unwrap_or_else(|e| halt(e.into()));

        // ── 4. Network ────────────────────────────────────────────
        let _wifi = wifi::connect(peripherals.modem, sysloop, nvs_partition, &secrets.network)
            .unwrap_or_else(|e| halt(e));

        let (client, conn) = mqtt::connect(&secrets.broker)
            .map_err(stage("MQTT connect"))
            .unwrap_or_else(|e| halt(e));
        let link = MqttLink::new(client);
        link.spawn_receiver(conn, config.command_topic.clone(), config.max_command_len, &COMMANDS)?;

        // ── 5. Command interpreter + update orchestrator ──────────
        let orchestrator = Arc::new(UpdateOrchestrator::new(
            EspUpdatePlatform,
            UpdateSettings::from_config(&config),
        ));
        let interpreter = CommandInterpreter::new(
            Arc::clone(&shared_actuator),
            Arc::clone(&orchestrator),
            LogEventSink::new(),
        );
        thread::Builder::new()
            .name("cmd".into())
            .stack_size(CMD_STACK_SIZE)
            .spawn(move || futures_lite::future::block_on(interpreter.run(&COMMANDS)))?;

        // ── 6. Poll loop (never returns) ──────────────────────────
        let firmware_version =
            VersionString::try_from(config.firmware_version.as_str()).unwrap_or_else(|()| halt(Error::Init("firmware version")));

        let mut sink = LogEventSink::new();
        sink.emit(&AppEvent::Started {
            device_id: identity.id().clone(),
            version: firmware_version.clone(),
        });

        PollLoop::new(
            sensor,
            shared_actuator,
            TelemetryPublisher::new(link, config.telemetry_topic.clone()),
            SystemClock,
            sink,
            PollSettings {
                period: Duration::from_millis(u64::from(config.poll_interval_ms)),
                identity,
                firmware_version,
            },
        )
        .run()
    }
}

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("irnode targets ESP-IDF; run the host tests with `--no-default-features`");
}
