/*!
Mock MQTT client for running the simulator without a broker

Records every accepted publish, can be told to reject the next N publishes, and
tracks whether it was disconnected. Cloning shares the same recorder.
*/

use anyhow::Result;
use rumqttc::QoS;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Mock MQTT client mirroring the publish/disconnect surface of rumqttc::AsyncClient
#[derive(Clone)]
pub struct MockMqttClient {
    published_messages: Arc<Mutex<Vec<MockMessage>>>,
    attempts: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
    disconnected: Arc<AtomicBool>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self {
            published_messages: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            failures_left: Arc::new(AtomicUsize::new(0)),
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes the next `count` publishes fail, like a saturated or closed client.
    pub fn fail_next_publishes(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Simulated publish (same argument order as AsyncClient::publish)
    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let topic = topic.into();
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.disconnected.load(Ordering::SeqCst) {
            anyhow::bail!("client disconnected, cannot publish to {}", topic);
        }

        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            log::warn!("💥 [MOCK] Rejected publish to {}", topic);
            anyhow::bail!("injected publish failure on {}", topic);
        }

        let message = MockMessage {
            topic,
            payload: payload.into(),
            qos,
            retain,
        };
        log::info!("📤 [MOCK] Published to {}: {} bytes", message.topic, message.payload.len());
        self.published_messages.lock().unwrap().push(message);
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        log::info!("🔌 [MOCK] Disconnected");
        Ok(())
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Number of publish calls, accepted or not
    pub fn publish_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// All accepted messages, in publish order
    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.published_messages.lock().unwrap().clone()
    }

    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.published_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Parses the last message of a topic as JSON
    pub fn get_last_json_message<T>(&self, topic: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let messages = self.find_messages_by_topic(topic);
        if let Some(last_msg) = messages.last() {
            let parsed: T = serde_json::from_slice(&last_msg.payload)?;
            Ok(Some(parsed))
        } else {
            Ok(None)
        }
    }

    /// Forgets recorded messages and counters (injected failures included)
    pub fn clear(&self) {
        self.published_messages.lock().unwrap().clear();
        self.attempts.store(0, Ordering::SeqCst);
        self.failures_left.store(0, Ordering::SeqCst);
    }
}

impl Default for MockMqttClient {
    fn default() -> Self {
        Self::new()
    }
}
