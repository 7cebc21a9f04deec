//! LoRa P2P simulator - periodic MQTT publisher of synthetic agricultural frames
//!
//! Connects once to the broker (fatal on failure), then publishes one frame per
//! interval until Ctrl-C / SIGTERM, and disconnects gracefully.

use anyhow::{Context, Result};
use lora_simulator::{Broker, IntervalTicker, MqttConnection, Publisher, SimulatorConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lora_simulator=info")),
        )
        .init();

    let config = SimulatorConfig::load()
        .await
        .context("Invalid simulator configuration")?;
    let address = config.broker_address()?;

    let connection = MqttConnection::connect(&address, &config.client_id, config.keep_alive)
        .await
        .with_context(|| format!("Failed to connect to MQTT broker {}", address))?;

    info!(
        interval = %humantime::format_duration(config.publish_interval),
        "📡 LoRa P2P multi-sensor simulator started"
    );

    let mut publisher = Publisher::new(connection, StdRng::from_entropy());
    let mut ticker = IntervalTicker::new(config.publish_interval);
    let ticks = publisher.run(&mut ticker, shutdown_signal()).await;

    info!(ticks, "stopping simulator");
    publisher
        .into_broker()
        .disconnect(config.disconnect_grace)
        .await;

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
