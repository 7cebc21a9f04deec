//! Publish loop: one LoRa frame per tick.
//!
//! The loop owns the per-node counters and the random source. Each tick runs the
//! whole build → serialize → publish → print sequence before the next tick is
//! awaited, so nothing here needs a lock.

use crate::broker::Broker;
use crate::error::{PublishError, SerializationError};
use crate::message::{build_message, MessageCounters};
use crate::schedule::Ticker;
use chrono::Local;
use rand::Rng;
use rumqttc::QoS;
use std::future::Future;
use tracing::{debug, error, info};

/// What happened to the frame of one tick.
#[derive(Debug)]
pub enum TickOutcome {
    Published { topic: String, node: String, sequence: u32 },
    /// Broker refused the message; it is dropped, not retried.
    PublishFailed(PublishError),
    /// Frame could not be encoded; the tick is skipped.
    SerializationFailed(SerializationError),
}

impl TickOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, TickOutcome::Published { .. })
    }
}

pub struct Publisher<B, R> {
    broker: B,
    rng: R,
    counters: MessageCounters,
}

impl<B: Broker, R: Rng> Publisher<B, R> {
    pub fn new(broker: B, rng: R) -> Self {
        Self {
            broker,
            rng,
            counters: MessageCounters::new(),
        }
    }

    pub fn counters(&self) -> &MessageCounters {
        &self.counters
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Gives the connection back, typically to disconnect it.
    pub fn into_broker(self) -> B {
        self.broker
    }

    /// One full publish cycle. Failures are logged and reported, never propagated.
    pub async fn publish_once(&mut self) -> TickOutcome {
        let message = build_message(&mut self.rng, &mut self.counters, Local::now().fixed_offset());
        let topic = message.topic();

        let payload = match message.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!("skipping tick: {}", e);
                return TickOutcome::SerializationFailed(e);
            }
        };

        debug!(%topic, bytes = payload.len(), seq = message.sequence_number, "publishing");
        let result = self
            .broker
            .publish(&topic, payload, QoS::AtMostOnce, false)
            .await;

        println!("{}", message.summary(&topic));

        match result {
            Ok(()) => TickOutcome::Published {
                topic,
                node: message.origin_node,
                sequence: message.sequence_number,
            },
            Err(e) => {
                error!("message #{} dropped: {}", message.sequence_number, e);
                TickOutcome::PublishFailed(e)
            }
        }
    }

    /// Publishes on every tick until the ticker runs dry or `shutdown` resolves.
    /// Returns the number of ticks handled.
    pub async fn run<T, F>(&mut self, ticker: &mut T, shutdown: F) -> u64
    where
        T: Ticker,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticks = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                more = ticker.tick() => {
                    if !more {
                        debug!("tick source exhausted");
                        break;
                    }
                    self.publish_once().await;
                    ticks += 1;
                }
            }
        }

        ticks
    }
}
