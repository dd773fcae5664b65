use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use plant_simulator::controller::config::{
    AmsNetId, ConnectionConfig, DEFAULT_AMS_NET_ID, DEFAULT_AMS_PORT,
};
use plant_simulator::controller::Connector;
use plant_simulator::controller::ads::AdsConnector;
use plant_simulator::controller::loopback::{LoopbackConnector, LoopbackPlc};
use plant_simulator::engine::config::{DEFAULT_SYMBOL_PREFIX, SimConfig};
use plant_simulator::engine::event::SimEvent;
use plant_simulator::session::Simulator;
use plant_simulator::symbol_path;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let connection = connection_config()?;
    let config = sim_config()?;
    let groups = config.groups;
    let prefix = config.symbol_prefix.clone();

    info!(
        ams_net_id = %connection.ams_net_id,
        ams_port = connection.ams_port,
        groups,
        publish_ms = config.publish_interval.as_millis() as u64,
        "Plant simulator starting"
    );

    match std::env::var("SIM_TRANSPORT").as_deref() {
        Ok("ads") => {
            let router = std::env::var("PLC_ADS_ROUTER")
                .map(AdsConnector::new)
                .unwrap_or_else(|_| AdsConnector::local());
            info!(router = router.router(), "Using ADS transport");
            run(Simulator::new(router, config)?, connection).await
        }
        Ok("loopback") | Err(_) => {
            // The in-process controller only answers at the default address, like a runtime
            // that was never configured for anything else.
            let plc = LoopbackPlc::new(DEFAULT_AMS_NET_ID, DEFAULT_AMS_PORT);
            tokio::spawn(demo_program(Arc::clone(&plc), groups, prefix));
            info!("Using in-process loopback controller");
            run(Simulator::new(LoopbackConnector::new(plc), config)?, connection).await
        }
        Ok(other) => anyhow::bail!("SIM_TRANSPORT must be 'ads' or 'loopback', got '{other}'"),
    }
}

async fn run<K: Connector>(mut simulator: Simulator<K>, connection: ConnectionConfig) -> Result<()> {
    let session_id = simulator
        .establish(connection)
        .await
        .context("failed to connect, check PLC_AMS_NET_ID and PLC_AMS_PORT")?;
    info!(%session_id, "Simulator is online");

    // Log simulation events as they happen.
    let mut events = Box::pin(simulator.core().event_stream());
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                SimEvent::TransitionStarted {
                    actuator_id,
                    kind,
                    from,
                    target,
                    duration,
                } => info!(
                    actuator_id = %actuator_id,
                    from = from.name(kind),
                    target = target.name(kind),
                    ?duration,
                    "Actuator moving"
                ),
                SimEvent::TransitionCompleted { actuator_id, bound } => {
                    info!(actuator_id = %actuator_id, ?bound, "Actuator arrived");
                }
                SimEvent::ConnectionLost { reason } => {
                    warn!(%reason, "Connection lost");
                }
            }
        }
    });

    let mut status = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = status.tick() => {
                let sensors = simulator.core().sensors(simulator.catalog());
                info!(inputs = %sensors.labels().join(" "), "I/O status");
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    simulator.shutdown();
    info!("Plant simulator stopped");
    Ok(())
}

/// Stand-in controller program toggling random outputs.
async fn demo_program(plc: Arc<LoopbackPlc>, groups: usize, prefix: String) {
    let mut rng = StdRng::from_os_rng();
    loop {
        tokio::time::sleep(Duration::from_secs(rng.random_range(2..6))).await;

        let group = rng.random_range(1..=groups);
        if rng.random_bool(0.5) {
            toggle_cylinder(&plc, &prefix, group);
        } else {
            toggle_motor(&plc, &prefix, group);
        }
    }
}

fn connection_config() -> Result<ConnectionConfig> {
    let ams_net_id = std::env::var("PLC_AMS_NET_ID")
        .ok()
        .map(|value| value.parse::<AmsNetId>())
        .transpose()?
        .unwrap_or(DEFAULT_AMS_NET_ID);
    let ams_port = std::env::var("PLC_AMS_PORT")
        .ok()
        .map(|value| value.parse::<u16>())
        .transpose()
        .context("PLC_AMS_PORT must be a port number")?
        .unwrap_or(DEFAULT_AMS_PORT);

    Ok(ConnectionConfig::builder()
        .ams_net_id(ams_net_id)
        .ams_port(ams_port)
        .build())
}

fn sim_config() -> Result<SimConfig> {
    let groups = std::env::var("SIM_GROUPS")
        .ok()
        .map(|value| value.parse::<usize>())
        .transpose()
        .context("SIM_GROUPS must be a number")?
        .unwrap_or(4);
    anyhow::ensure!(groups > 0, "SIM_GROUPS must be at least 1");
    let publish_ms = std::env::var("SIM_PUBLISH_MS")
        .ok()
        .map(|value| value.parse::<u64>())
        .transpose()
        .context("SIM_PUBLISH_MS must be a number of milliseconds")?
        .unwrap_or(300);
    let symbol_prefix =
        std::env::var("SIM_SYMBOL_PREFIX").unwrap_or_else(|_| DEFAULT_SYMBOL_PREFIX.to_string());

    Ok(SimConfig::builder()
        .groups(groups)
        .publish_interval(Duration::from_millis(publish_ms))
        .symbol_prefix(symbol_prefix)
        .build())
}

/// Send a resting cylinder to its other end.
fn toggle_cylinder(plc: &LoopbackPlc, prefix: &str, group: usize) {
    let at_minus = plc.read(&symbol_path(prefix, &format!("iCyl{group}minus")));
    let at_plus = plc.read(&symbol_path(prefix, &format!("iCyl{group}plus")));
    let to_minus = symbol_path(prefix, &format!("qCyl{group}toMinus"));
    let to_plus = symbol_path(prefix, &format!("qCyl{group}toPlus"));

    match (at_minus, at_plus) {
        (Some(true), _) => {
            plc.set_output(&to_minus, false);
            plc.set_output(&to_plus, true);
            debug!(group, "Program: cylinder to plus");
        }
        (_, Some(true)) => {
            plc.set_output(&to_plus, false);
            plc.set_output(&to_minus, true);
            debug!(group, "Program: cylinder to minus");
        }
        _ => debug!(group, "Program: cylinder still moving"),
    }
}

fn toggle_motor(plc: &LoopbackPlc, prefix: &str, group: usize) {
    let start = symbol_path(prefix, &format!("qMot{group}start"));
    let running = !plc.read(&start).unwrap_or(false);

    plc.set_output(&start, running);
    debug!(group, running, "Program: motor start toggled");
}
