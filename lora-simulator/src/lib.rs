//! LoRa P2P multi-sensor simulator.
//!
//! Fabricates agricultural sensor frames wrapped in LoRa radio metadata and
//! publishes them on `mediciones/<node>` so gateways and dashboards can be
//! exercised without hardware.

pub mod broker;
pub mod config;
pub mod error;
pub mod message;
pub mod publisher;
pub mod readings;
pub mod schedule;

pub use broker::{Broker, MqttConnection};
pub use config::{BrokerAddress, SimulatorConfig};
pub use message::{build_message, build_message_for, topic_for, LoraMessage, MessageCounters};
pub use publisher::{Publisher, TickOutcome};
pub use readings::{generate_readings, SensorReading, SensorType};
pub use schedule::{IntervalTicker, Ticker};
