//! Broker side of the simulator: the minimal publish surface the loop needs, and
//! its `rumqttc` implementation.
//!
//! Transport, keep-alive and reconnection stay inside `rumqttc`. The event loop is
//! driven by one background task started once the broker has acknowledged the
//! connection; until then any error is returned to the caller as [`ConnectError`].
//!
//! Requests never wait for room in the client queue: while the broker is away the
//! queue fills up and further publishes fail at once, so neither a tick nor the
//! shutdown path can hang on a dead connection.

use crate::config::BrokerAddress;
use crate::error::{ConnectError, PublishError};
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, Incoming, MqttOptions,
    Outgoing, QoS,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Request queue capacity between the client handle and its event loop.
const REQUEST_CAPACITY: usize = 10;

/// Publish side of a broker connection.
#[allow(async_fn_in_trait)]
pub trait Broker {
    /// Hands one message to the broker client. Implementations must fail rather
    /// than wait when the client cannot take it.
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), PublishError>;

    /// Closes the connection, giving pending traffic at most `grace` to flush.
    async fn disconnect(self, grace: Duration);
}

/// Live MQTT connection (rumqttc).
pub struct MqttConnection {
    client: AsyncClient,
    driver: JoinHandle<()>,
    address: BrokerAddress,
}

impl MqttConnection {
    /// Connects and waits for the broker's CONNACK. No retry.
    pub async fn connect(
        address: &BrokerAddress,
        client_id: &str,
        keep_alive: Duration,
    ) -> Result<Self, ConnectError> {
        let mut opts = MqttOptions::new(client_id, address.host.as_str(), address.port);
        opts.set_keep_alive(keep_alive);
        opts.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(opts, REQUEST_CAPACITY);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(ConnectError::Refused {
                            address: address.to_string(),
                            code: ack.code,
                        });
                    }
                    break;
                }
                Ok(_) => {}
                Err(ConnectionError::ConnectionRefused(code)) => {
                    return Err(ConnectError::Refused {
                        address: address.to_string(),
                        code,
                    })
                }
                Err(source) => {
                    return Err(ConnectError::Connection {
                        address: address.to_string(),
                        source,
                    })
                }
            }
        }

        info!(%address, client_id, "connected to MQTT broker");
        let driver = tokio::spawn(drive_event_loop(eventloop));

        Ok(Self {
            client,
            driver,
            address: address.clone(),
        })
    }
}

impl Broker for MqttConnection {
    // QoS 0 has no PUBACK: the acknowledgement is the request entering the client
    // queue. A full queue means the broker is unreachable and the frame is dropped.
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, qos, retain, payload)
            .map_err(|e| PublishError {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn disconnect(mut self, grace: Duration) {
        if let Err(e) = self.client.try_disconnect() {
            warn!("MQTT disconnect request failed: {}", e);
        }

        match tokio::time::timeout(grace, &mut self.driver).await {
            Ok(_) => debug!(address = %self.address, "MQTT connection closed"),
            Err(_) => {
                debug!(address = %self.address, ?grace, "grace period elapsed, dropping MQTT event loop");
                self.driver.abort();
            }
        }
    }
}

/// Polls the event loop until our own DISCONNECT goes out. Connection errors are
/// logged and polling resumes, which makes rumqttc reconnect.
async fn drive_event_loop(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(Event::Incoming(Incoming::ConnAck(_))) => info!("MQTT session re-established"),
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT connection error: {}", e);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
