//! End-to-end publish loop against the devkit MQTT stub, with every payload checked
//! against contracts/mqtt/mediciones@v1.json.

use lora_simulator::error::PublishError;
use lora_simulator::message::NODES;
use lora_simulator::{Broker, LoraMessage, Publisher, Ticker};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rumqttc::QoS;
use simulator_devkit::{init_test_logging, ContractLoader, MockMqttClient};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

struct StubBroker(MockMqttClient);

impl Broker for StubBroker {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), PublishError> {
        self.0
            .publish(topic, qos, retain, payload)
            .await
            .map_err(|e| PublishError {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn disconnect(self, _grace: Duration) {
        let _ = self.0.disconnect().await;
    }
}

/// Ticks driven by the test through a channel; closing the channel ends the schedule.
struct ManualTicker(mpsc::UnboundedReceiver<()>);

impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.0.recv().await.is_some()
    }
}

fn manual_ticks(count: usize) -> ManualTicker {
    let (tx, rx) = mpsc::unbounded_channel();
    for _ in 0..count {
        tx.send(()).unwrap();
    }
    ManualTicker(rx)
}

fn contracts() -> ContractLoader {
    let mut loader = ContractLoader::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../contracts"));
    assert!(loader.load_mqtt_contracts().unwrap() >= 1);
    loader
}

#[tokio::test]
async fn test_every_frame_matches_contract() {
    init_test_logging();
    let mock = MockMqttClient::new();
    let mut publisher = Publisher::new(StubBroker(mock.clone()), StdRng::seed_from_u64(2024));

    let ticks = publisher.run(&mut manual_ticks(200), std::future::pending()).await;
    assert_eq!(ticks, 200);

    let loader = contracts();
    let messages = mock.get_published_messages();
    assert_eq!(messages.len(), 200);

    let mut per_node: HashMap<String, Vec<u32>> = HashMap::new();
    for message in &messages {
        let contract = loader
            .validate_publish(&message.topic, &message.payload)
            .unwrap_or_else(|e| panic!("{} violates contract: {}", message.topic, e));
        assert_eq!(contract.name, "mediciones@v1");
        assert_eq!(message.qos, QoS::AtMostOnce);
        assert!(!message.retain);

        let frame: LoraMessage = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(message.topic, format!("mediciones/{}", frame.origin_node));
        per_node.entry(frame.origin_node).or_default().push(frame.sequence_number);
    }

    assert_eq!(per_node.len(), NODES.len());
    for (node, sequences) in per_node {
        let expected: Vec<u32> = (1..=sequences.len() as u32).collect();
        assert_eq!(sequences, expected, "{}", node);
    }
}

#[tokio::test]
async fn test_publish_failures_do_not_stop_the_loop() {
    init_test_logging();
    let mock = MockMqttClient::new();
    mock.fail_next_publishes(3);
    let mut publisher = Publisher::new(StubBroker(mock.clone()), StdRng::seed_from_u64(7));

    let ticks = publisher.run(&mut manual_ticks(10), std::future::pending()).await;
    assert_eq!(ticks, 10);
    assert_eq!(mock.publish_attempts(), 10);
    assert_eq!(mock.get_published_messages().len(), 7);

    // dropped frames still consumed their numbers
    let total: u32 = NODES.iter().map(|n| publisher.counters().current(n)).sum();
    assert_eq!(total, 10);

    let mut highest: HashMap<String, u32> = HashMap::new();
    for message in mock.get_published_messages() {
        let frame: LoraMessage = serde_json::from_slice(&message.payload).unwrap();
        let last = highest.entry(frame.origin_node.clone()).or_insert(0);
        assert!(frame.sequence_number > *last);
        *last = frame.sequence_number;
    }
}

#[tokio::test]
async fn test_shutdown_then_disconnect() {
    init_test_logging();
    let mock = MockMqttClient::new();
    let mut publisher = Publisher::new(StubBroker(mock.clone()), StdRng::seed_from_u64(1));

    // ticker that never fires; the shutdown future ends the loop
    let (_tx, rx) = mpsc::unbounded_channel();
    let mut ticker = ManualTicker(rx);
    let ticks = publisher
        .run(&mut ticker, tokio::time::sleep(Duration::from_millis(20)))
        .await;
    assert_eq!(ticks, 0);

    publisher.into_broker().disconnect(Duration::from_millis(250)).await;
    assert!(mock.is_disconnected());
    assert!(mock.get_published_messages().is_empty());
}
