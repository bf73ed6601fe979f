//! MQTT broker link.
//!
//! [`MqttLink`] implements [`TelemetryPort`] on top of `EspMqttClient`.
//! The connection half runs on its own `mqtt-rx` thread: it (re)subscribes
//! the command topic on every `Connected` event and copies complete
//! inbound payloads onto the [`CommandQueue`]. It never interprets them.
//!
//! The broker session is TLS-verified against the IDF certificate bundle
//! when the URI scheme is `mqtts://` or `wss://`.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use embedded_svc::mqtt::client::{Details, EventPayload, QoS};
use esp_idf_svc::mqtt::client::{EspMqttClient, EspMqttConnection, MqttClientConfiguration};
use esp_idf_svc::sys::EspError;
use log::{debug, info, warn};

use crate::app::commands::{CommandQueue, InboundMessage};
use crate::app::ports::{Qos, TelemetryPort};
use crate::config::BrokerConfig;
use crate::error::CommsError;

const RX_STACK_SIZE: usize = 8 * 1024;

pub type SharedClient = Arc<Mutex<EspMqttClient<'static>>>;

/// Open the broker session. Returns the client and its event connection.
pub fn connect(broker: &BrokerConfig) -> Result<(SharedClient, EspMqttConnection), EspError> {
    let conf = MqttClientConfiguration {
        client_id: Some(broker.client_id.as_str()),
        username: (!broker.username.is_empty()).then_some(broker.username.as_str()),
        password: (!broker.password.is_empty()).then_some(broker.password.as_str()),
        crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
        ..Default::default()
    };
    let (client, conn) = EspMqttClient::new(&broker.broker_uri, &conf)?;
    info!("MQTT: client created for {}", broker.broker_uri);
    Ok((Arc::new(Mutex::new(client)), conn))
}

fn qos(level: Qos) -> QoS {
    match level {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
    }
}

/// Publish side of the broker session.
pub struct MqttLink {
    client: SharedClient,
    connected: Arc<AtomicBool>,
}

impl MqttLink {
    pub fn new(client: SharedClient) -> Self {
        Self {
            client,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Start the receive thread for `topic`, feeding `queue` with payloads
    /// of at most `max_len` bytes.
    pub fn spawn_receiver(
        &self,
        mut conn: EspMqttConnection,
        topic: String,
        max_len: usize,
        queue: &'static CommandQueue,
    ) -> std::io::Result<JoinHandle<()>> {
        let client = Arc::clone(&self.client);
        let connected = Arc::clone(&self.connected);

        thread::Builder::new()
            .name("mqtt-rx".into())
            .stack_size(RX_STACK_SIZE)
            .spawn(move || {
                while let Ok(event) = conn.next() {
                    match event.payload() {
                        EventPayload::Connected(_) => {
                            connected.store(true, Ordering::Release);
                            info!("MQTT: connected, subscribing '{}'", topic);
                            let mut c = client.lock().unwrap_or_else(PoisonError::into_inner);
                            if let Err(e) = c.subscribe(&topic, QoS::AtLeastOnce) {
                                warn!("MQTT: subscribe failed: {:?}", e);
                            }
                        }
                        EventPayload::Disconnected => {
                            connected.store(false, Ordering::Release);
                            warn!("MQTT: disconnected, client will reconnect");
                        }
                        EventPayload::Received { data, details, .. } => {
                            if !matches!(details, Details::Complete) {
                                debug!("MQTT: skipping fragmented payload");
                                continue;
                            }
                            match InboundMessage::with_limit(data, max_len) {
                                Some(msg) => {
                                    if queue.try_send(msg).is_err() {
                                        warn!("MQTT: command queue full, payload dropped");
                                    }
                                }
                                None => debug!("MQTT: {}-byte payload is not a command", data.len()),
                            }
                        }
                        EventPayload::Error(e) => warn!("MQTT: {:?}", e),
                        _ => {}
                    }
                }
                connected.store(false, Ordering::Release);
                warn!("MQTT: connection closed, receiver exiting");
            })
    }
}

impl TelemetryPort for MqttLink {
    fn publish(&mut self, topic: &str, payload: &[u8], level: Qos, retain: bool) -> Result<(), CommsError> {
        if !self.is_connected() {
            return Err(CommsError::NotConnected);
        }
        let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        client
            .publish(topic, qos(level), retain, payload)
            .map(drop)
            .map_err(|e| {
                debug!("MQTT: publish error {:?}", e);
                CommsError::PublishFailed
            })
    }
}
