/*!
# Simulator DevKit - stubs and helpers for development without a broker

- MQTT stub recording publishes, with failure injection
- JSON contract loader and payload validator
*/

pub mod contract_helpers;
pub mod mqtt_stub;

pub use contract_helpers::{Contract, ContractLoader};
pub use mqtt_stub::{MockMessage, MockMqttClient};

/// Initialises `env_logger` for tests; repeated calls are harmless.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
