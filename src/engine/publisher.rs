use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::SyncCore;
use super::event::SimEvent;
use crate::controller::Controller;
use crate::controller::error::ControllerError;
use crate::sensors::SensorVector;
use crate::signals::SignalCatalog;

/// Periodically writes the derived sensor values to the controller.
#[derive(Debug)]
pub struct InputPublisher<C> {
    core: Arc<SyncCore>,
    catalog: Arc<SignalCatalog>,
    controller: Arc<C>,
    period: Duration,
    write_timeout: Duration,
}

impl<C: Controller> InputPublisher<C> {
    pub fn new(
        core: Arc<SyncCore>,
        catalog: Arc<SignalCatalog>,
        controller: Arc<C>,
        write_timeout: Duration,
    ) -> Self {
        let period = core.config().publish_interval;

        Self {
            core,
            catalog,
            controller,
            period,
            write_timeout,
        }
    }

    /// Derive every sensor from fresh snapshots and write them all.
    ///
    /// Stops at the first failed or timed out write; the remaining sensors go out on the next
    /// tick.
    pub async fn publish_once(&self) -> Result<SensorVector, ControllerError> {
        let sensors = self.core.sensors(&self.catalog);

        for sensor in &sensors {
            tokio::time::timeout(
                self.write_timeout,
                self.controller.write_bool(&sensor.name, sensor.value),
            )
            .await??;
        }

        Ok(sensors)
    }

    /// Publish once per period until the task is aborted.
    ///
    /// A failing tick is skipped. The first failure of a streak is logged at warn and reported as
    /// [`SimEvent::ConnectionLost`], the rest only at debug. Publishing carries on so a recovered
    /// connection is picked up again.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut failing = false;

        loop {
            ticker.tick().await;

            match self.publish_once().await {
                Ok(sensors) => {
                    if failing {
                        info!("Publishing inputs recovered");
                        failing = false;
                    }
                    trace!(labels = ?sensors.labels(), "Published inputs");
                }
                Err(err) if failing => {
                    debug!(error = %err, "Publishing inputs still failing, skipping tick");
                }
                Err(err) => {
                    warn!(error = %err, "Failed to publish inputs, skipping tick");
                    self.core.report(SimEvent::ConnectionLost {
                        reason: err.to_string(),
                    });
                    failing = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::config::{ConnectionConfig, DEFAULT_AMS_NET_ID, DEFAULT_AMS_PORT};
    use crate::controller::loopback::{LoopbackConnector, LoopbackController, LoopbackPlc};
    use crate::controller::Connector;
    use crate::engine::config::SimConfig;

    async fn setup() -> (Arc<LoopbackPlc>, InputPublisher<LoopbackController>) {
        let plc = LoopbackPlc::new(DEFAULT_AMS_NET_ID, DEFAULT_AMS_PORT);
        let controller = LoopbackConnector::new(Arc::clone(&plc))
            .connect(&ConnectionConfig::default())
            .await
            .unwrap();

        let config = SimConfig::builder().groups(1).build();
        let catalog = Arc::new(SignalCatalog::new(config.groups, &config.symbol_prefix));
        let core = Arc::new(SyncCore::new(&catalog, config).unwrap());

        let publisher =
            InputPublisher::new(core, catalog, controller, Duration::from_millis(100));
        (plc, publisher)
    }

    #[tokio::test]
    async fn test_publish_writes_every_sensor() {
        let (plc, publisher) = setup().await;

        let sensors = publisher.publish_once().await.unwrap();

        assert_eq!(sensors.len(), 3);
        assert_eq!(plc.write_count(), 3);
        assert_eq!(plc.read("MAIN.iCyl1minus"), Some(true));
        assert_eq!(plc.read("MAIN.iCyl1plus"), Some(false));
        assert_eq!(plc.read("MAIN.iMot1running"), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_write_times_out() {
        let (plc, publisher) = setup().await;
        plc.set_hang_writes(true);

        let err = publisher.publish_once().await.unwrap_err();
        assert!(matches!(err, ControllerError::Timeout(_)));
        assert!(err.to_string().contains("timeout"));
        assert_eq!(plc.write_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_surfaces_error() {
        let (plc, publisher) = setup().await;
        plc.set_fail_writes(true);

        assert!(matches!(
            publisher.publish_once().await,
            Err(ControllerError::Io { .. })
        ));
        assert_eq!(plc.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_failure_once_and_recovers() {
        let (plc, publisher) = setup().await;
        let mut events = publisher.core.subscribe();
        plc.set_fail_writes(true);

        let task = tokio::spawn(publisher.run());

        assert!(matches!(
            events.recv().await.unwrap(),
            SimEvent::ConnectionLost { .. }
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(events.try_recv().is_err());

        plc.set_fail_writes(false);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(plc.read("MAIN.iCyl1minus"), Some(true));

        task.abort();
    }
}
