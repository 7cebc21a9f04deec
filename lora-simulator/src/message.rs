//! LoRa P2P frame assembled on every tick.
//!
//! The radio fields (RSSI, SNR, frequency, SF, bandwidth) are cosmetic: they are drawn
//! independently of each other and of the readings. Only the sequence number carries
//! state, through [`MessageCounters`].

use crate::error::SerializationError;
use crate::readings::{generate_readings, SensorReading};
use chrono::{DateTime, FixedOffset, SubsecRound};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;

pub const NODES: [&str; 4] = [
    "agri-sensor-01",
    "agri-sensor-02",
    "agri-sensor-03",
    "greenhouse-sensor-01",
];

/// Central collector every frame is addressed to.
pub const DESTINATION_NODE: &str = "gateway-central";

pub const TOPIC_NAMESPACE: &str = "mediciones";

// 915 MHz band channels
pub const FREQUENCIES: [u32; 4] = [915_200_000, 915_400_000, 915_600_000, 915_800_000];
pub const SPREADING_FACTORS: [u8; 6] = [7, 8, 9, 10, 11, 12];
pub const BANDWIDTHS: [u32; 3] = [125_000, 250_000, 500_000];

pub const RSSI_RANGE: RangeInclusive<i32> = -130..=-70;
pub const BATTERY_RANGE: RangeInclusive<u8> = 85..=100;

/// Topic a node publishes on: `mediciones/<node>`.
pub fn topic_for(node: &str) -> String {
    format!("{}/{}", TOPIC_NAMESPACE, node)
}

/// Per-node message numbers, in memory only. Starts empty, never shrinks.
#[derive(Debug, Default, Clone)]
pub struct MessageCounters {
    counts: HashMap<String, u32>,
}

impl MessageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the node's counter and returns the new value (first call gives 1).
    pub fn next(&mut self, node: &str) -> u32 {
        let count = self.counts.entry(node.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Last number handed out for `node`, 0 if it never sent anything.
    pub fn current(&self, node: &str) -> u32 {
        self.counts.get(node).copied().unwrap_or(0)
    }

    pub fn nodes_seen(&self) -> usize {
        self.counts.len()
    }
}

/// Outbound frame (matches mediciones@v1 contract)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraMessage {
    #[serde(rename = "nodo")]
    pub node: String,
    #[serde(rename = "sensores")]
    pub readings: Vec<SensorReading>,

    #[serde(with = "rfc3339_seconds")]
    pub timestamp: DateTime<FixedOffset>,
    #[serde(rename = "rssi")]
    pub signal_strength: i32,
    #[serde(rename = "snr")]
    pub signal_to_noise: f64,
    #[serde(rename = "frecuencia")]
    pub frequency: u32,
    #[serde(rename = "spreadingFactor")]
    pub spreading_factor: u8,
    pub bandwidth: u32,

    #[serde(rename = "nodoOrigen")]
    pub origin_node: String,
    #[serde(rename = "nodoDestino")]
    pub destination_node: String,
    #[serde(rename = "numeroMensaje")]
    pub sequence_number: u32,
    #[serde(rename = "nivelBateria")]
    pub battery_level: u8,
}

impl LoraMessage {
    pub fn topic(&self) -> String {
        topic_for(&self.origin_node)
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(self).map_err(|source| SerializationError {
            node: self.origin_node.clone(),
            sequence: self.sequence_number,
            source,
        })
    }

    /// One-line console summary of a transmission.
    pub fn summary(&self, topic: &str) -> String {
        let sensors = self
            .readings
            .iter()
            .map(|r| format!("{}={:.1}", r.sensor, r.value))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "📦 - {} → {} | {} sensors [{}] | SF{} | RSSI:{} dBm | Bat:{}% | Topic:{}",
            self.origin_node,
            self.destination_node,
            self.readings.len(),
            sensors,
            self.spreading_factor,
            self.signal_strength,
            self.battery_level,
            topic
        )
    }
}

/// Picks a random origin node and builds its next frame.
pub fn build_message<R: Rng + ?Sized>(
    rng: &mut R,
    counters: &mut MessageCounters,
    now: DateTime<FixedOffset>,
) -> LoraMessage {
    let node = NODES[rng.gen_range(0..NODES.len())];
    build_message_for(rng, counters, node, now)
}

/// Builds the next frame of a given node. The counter is bumped before anything
/// else, so a frame that later fails to publish still consumes its number.
pub fn build_message_for<R: Rng + ?Sized>(
    rng: &mut R,
    counters: &mut MessageCounters,
    node: &str,
    now: DateTime<FixedOffset>,
) -> LoraMessage {
    let sequence_number = counters.next(node);
    let readings = generate_readings(rng);

    LoraMessage {
        node: node.to_string(),
        readings,
        // the wire format carries whole seconds only
        timestamp: now.trunc_subsecs(0),
        signal_strength: rng.gen_range(RSSI_RANGE),
        signal_to_noise: f64::from(rng.gen_range(-15i32..15)) + rng.gen::<f64>(),
        frequency: FREQUENCIES[rng.gen_range(0..FREQUENCIES.len())],
        spreading_factor: SPREADING_FACTORS[rng.gen_range(0..SPREADING_FACTORS.len())],
        bandwidth: BANDWIDTHS[rng.gen_range(0..BANDWIDTHS.len())],
        origin_node: node.to_string(),
        destination_node: DESTINATION_NODE.to_string(),
        sequence_number,
        battery_level: rng.gen_range(BATTERY_RANGE),
    }
}

mod rfc3339_seconds {
    use chrono::{DateTime, FixedOffset, SecondsFormat};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<FixedOffset>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)
    }
}
