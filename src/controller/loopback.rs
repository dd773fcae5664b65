//! An in-process controller.
//!
//! [`LoopbackPlc`] stands in for the controller runtime: it owns the symbol table, reports its
//! runtime state and publishes a change feed. Connections to it are opened through
//! [`LoopbackConnector`] exactly like a remote controller, which makes it the transport used by
//! the demo binary and by the tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_stream::stream;
use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::config::{AmsNetId, ConnectionConfig};
use super::error::ControllerError;
use super::{Connector, Controller, ControllerState, Notification, NotificationStream};

const CHANGE_FEED_CAPACITY: usize = 1024;

/// The simulated controller runtime.
#[derive(Debug)]
pub struct LoopbackPlc {
    net_id: AmsNetId,
    runtime_port: u16,
    symbols: DashMap<String, bool, ahash::RandomState>,
    changes: broadcast::Sender<Notification>,
    online: watch::Sender<bool>,
    state: Mutex<ControllerState>,
    fail_writes: AtomicBool,
    hang_writes: watch::Sender<bool>,
    writes: AtomicU64,
}

impl LoopbackPlc {
    /// A running controller reachable at `net_id`, executing its program on `runtime_port`.
    pub fn new(net_id: AmsNetId, runtime_port: u16) -> Arc<Self> {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let (online, _) = watch::channel(true);
        let (hang_writes, _) = watch::channel(false);

        Arc::new(Self {
            net_id,
            runtime_port,
            symbols: DashMap::default(),
            changes,
            online,
            state: Mutex::new(ControllerState::Run),
            fail_writes: AtomicBool::new(false),
            hang_writes,
            writes: AtomicU64::new(0),
        })
    }

    pub fn net_id(&self) -> AmsNetId {
        self.net_id
    }

    pub fn runtime_port(&self) -> u16 {
        self.runtime_port
    }

    /// Current value of `name`, `None` if it was never written.
    pub fn read(&self, name: &str) -> Option<bool> {
        self.symbols.get(name).map(|entry| *entry)
    }

    /// Set an output as the controller program would, notifying subscribers on change.
    pub fn set_output(&self, name: &str, value: bool) {
        self.store(name, value);
    }

    pub fn set_state(&self, state: ControllerState) {
        *self.state.lock().expect("plc state lock poisoned") = state;
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().expect("plc state lock poisoned")
    }

    /// Make every write fail with an I/O error until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make writes stall without an answer until reset, like a controller that stopped
    /// responding without dropping the connection. Stalled writes finish once released.
    pub fn set_hang_writes(&self, hang: bool) {
        self.hang_writes.send_replace(hang);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Drop every open connection; new connections are refused until [`bring_online`](Self::bring_online).
    pub fn go_offline(&self) {
        self.online.send_replace(false);
    }

    pub fn bring_online(&self) {
        self.online.send_replace(true);
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    fn store(&self, name: &str, value: bool) {
        let previous = self.symbols.insert(name.to_string(), value);
        if previous == Some(value) {
            return;
        }

        // No receivers is fine, nobody is subscribed yet.
        let _ = self.changes.send(Notification {
            name: name.to_string(),
            value,
            timestamp: SystemTime::now(),
        });
    }
}

/// A connection to a [`LoopbackPlc`] on a given port.
#[derive(Debug)]
pub struct LoopbackController {
    plc: Arc<LoopbackPlc>,
    port: u16,
}

impl LoopbackController {
    pub fn plc(&self) -> &Arc<LoopbackPlc> {
        &self.plc
    }

    fn ensure_online(&self) -> Result<(), ControllerError> {
        if self.plc.is_online() {
            Ok(())
        } else {
            Err(ControllerError::ConnectionClosed)
        }
    }
}

impl Controller for LoopbackController {
    async fn read_state(&self) -> Result<ControllerState, ControllerError> {
        self.ensure_online()?;

        if self.port != self.plc.runtime_port {
            return Ok(ControllerState::Invalid);
        }

        Ok(self.plc.state())
    }

    async fn write_bool(&self, name: &str, value: bool) -> Result<(), ControllerError> {
        self.ensure_online()?;

        let mut hang = self.plc.hang_writes.subscribe();
        let mut online = self.plc.online.subscribe();
        tokio::select! {
            _ = hang.wait_for(|hang| !*hang) => {}
            () = wait_offline(&mut online) => return Err(ControllerError::ConnectionClosed),
        }

        if self.plc.fail_writes.load(Ordering::SeqCst) {
            return Err(ControllerError::Io {
                symbol: name.to_string(),
                reason: "device not responding".to_string(),
            });
        }

        if self.port != self.plc.runtime_port {
            return Err(ControllerError::Io {
                symbol: name.to_string(),
                reason: format!("no runtime on port {}", self.port),
            });
        }

        self.plc.store(name, value);
        self.plc.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&self, names: &[String]) -> Result<NotificationStream, ControllerError> {
        self.ensure_online()?;

        let mut changes = self.plc.changes.subscribe();
        let mut online = self.plc.online.subscribe();
        let names: HashSet<String> = names.iter().cloned().collect();

        let now = SystemTime::now();
        let initial: Vec<Notification> = names
            .iter()
            .map(|name| Notification {
                name: name.clone(),
                value: self.plc.read(name).unwrap_or(false),
                timestamp: now,
            })
            .collect();

        debug!(symbols = names.len(), "Loopback subscription opened");

        let notifications = stream! {
            for notification in initial {
                yield notification;
            }

            loop {
                let received = tokio::select! {
                    _ = wait_offline(&mut online) => None,
                    received = changes.recv() => Some(received),
                };

                match received {
                    Some(Ok(notification)) => {
                        if names.contains(&notification.name) {
                            yield notification;
                        }
                    }
                    Some(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                        warn!(skipped, "Loopback subscription lagged, notifications lost");
                    }
                    Some(Err(broadcast::error::RecvError::Closed)) | None => {
                        debug!("Loopback subscription closed");
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(notifications))
    }
}

async fn wait_offline(online: &mut watch::Receiver<bool>) {
    // A dropped sender counts as offline too.
    let _ = online.wait_for(|up| !*up).await;
}

/// Opens [`LoopbackController`] connections to one [`LoopbackPlc`].
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    plc: Arc<LoopbackPlc>,
}

impl LoopbackConnector {
    pub fn new(plc: Arc<LoopbackPlc>) -> Self {
        Self { plc }
    }

    pub fn plc(&self) -> &Arc<LoopbackPlc> {
        &self.plc
    }
}

impl Connector for LoopbackConnector {
    type Controller = LoopbackController;

    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Arc<LoopbackController>, ControllerError> {
        if config.ams_net_id != self.plc.net_id || !self.plc.is_online() {
            return Err(ControllerError::Unreachable {
                net_id: config.ams_net_id,
            });
        }

        Ok(Arc::new(LoopbackController {
            plc: Arc::clone(&self.plc),
            port: config.ams_port,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::config::{DEFAULT_AMS_NET_ID, DEFAULT_AMS_PORT};
    use futures::StreamExt;

    async fn connect(plc: &Arc<LoopbackPlc>, port: u16) -> Arc<LoopbackController> {
        let config = ConnectionConfig::builder()
            .ams_net_id(plc.net_id())
            .ams_port(port)
            .build();
        LoopbackConnector::new(Arc::clone(plc))
            .connect(&config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let plc = LoopbackPlc::new(DEFAULT_AMS_NET_ID, DEFAULT_AMS_PORT);
        let controller = connect(&plc, DEFAULT_AMS_PORT).await;

        controller.write_bool("MAIN.iCyl1minus", true).await.unwrap();

        assert_eq!(plc.read("MAIN.iCyl1minus"), Some(true));
        assert_eq!(plc.write_count(), 1);
        assert_eq!(controller.read_state().await.unwrap(), ControllerState::Run);
    }

    #[tokio::test]
    async fn test_wrong_net_id_unreachable() {
        let plc = LoopbackPlc::new(DEFAULT_AMS_NET_ID, DEFAULT_AMS_PORT);
        let config = ConnectionConfig::builder()
            .ams_net_id(AmsNetId([10, 0, 0, 1, 1, 1]))
            .build();

        let result = LoopbackConnector::new(plc).connect(&config).await;
        assert!(matches!(result, Err(ControllerError::Unreachable { .. })));
    }

    #[tokio::test]
    async fn test_wrong_port_not_running() {
        let plc = LoopbackPlc::new(DEFAULT_AMS_NET_ID, DEFAULT_AMS_PORT);
        let controller = connect(&plc, 852).await;

        assert_eq!(controller.read_state().await.unwrap(), ControllerState::Invalid);
        assert!(matches!(
            controller.write_bool("MAIN.iCyl1minus", true).await,
            Err(ControllerError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_subscription_yields_initial_then_changes() {
        let plc = LoopbackPlc::new(DEFAULT_AMS_NET_ID, DEFAULT_AMS_PORT);
        plc.set_output("MAIN.qMot1start", true);
        let controller = connect(&plc, DEFAULT_AMS_PORT).await;

        let mut stream = controller
            .subscribe(&["MAIN.qMot1start".to_string()])
            .await
            .unwrap();

        let initial = stream.next().await.unwrap();
        assert_eq!(initial.name, "MAIN.qMot1start");
        assert!(initial.value);

        // Unsubscribed symbols and unchanged values are filtered out
        plc.set_output("MAIN.qCyl1toPlus", true);
        plc.set_output("MAIN.qMot1start", true);
        plc.set_output("MAIN.qMot1start", false);

        let change = stream.next().await.unwrap();
        assert_eq!(change.name, "MAIN.qMot1start");
        assert!(!change.value);
    }

    #[tokio::test]
    async fn test_going_offline_ends_stream() {
        let plc = LoopbackPlc::new(DEFAULT_AMS_NET_ID, DEFAULT_AMS_PORT);
        let controller = connect(&plc, DEFAULT_AMS_PORT).await;
        let mut stream = controller.subscribe(&[]).await.unwrap();

        plc.go_offline();

        assert!(stream.next().await.is_none());
        assert!(matches!(
            controller.write_bool("MAIN.iCyl1minus", true).await,
            Err(ControllerError::ConnectionClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_write_waits_for_release() {
        let plc = LoopbackPlc::new(DEFAULT_AMS_NET_ID, DEFAULT_AMS_PORT);
        let controller = connect(&plc, DEFAULT_AMS_PORT).await;

        plc.set_hang_writes(true);
        let stalled = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            controller.write_bool("MAIN.iCyl1plus", true),
        )
        .await;
        assert!(stalled.is_err());
        assert_eq!(plc.write_count(), 0);

        let pending = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.write_bool("MAIN.iCyl1plus", true).await }
        });
        tokio::task::yield_now().await;
        plc.set_hang_writes(false);

        pending.await.unwrap().unwrap();
        assert_eq!(plc.read("MAIN.iCyl1plus"), Some(true));
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let plc = LoopbackPlc::new(DEFAULT_AMS_NET_ID, DEFAULT_AMS_PORT);
        let controller = connect(&plc, DEFAULT_AMS_PORT).await;

        plc.set_fail_writes(true);
        assert!(controller.write_bool("MAIN.iCyl1plus", true).await.is_err());

        plc.set_fail_writes(false);
        assert!(controller.write_bool("MAIN.iCyl1plus", true).await.is_ok());
    }
}
