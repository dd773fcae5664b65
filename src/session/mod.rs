pub mod error;

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::info;
use uuid::Uuid;

use self::error::{ConnectionError, SessionAlreadyActive};
use crate::controller::config::ConnectionConfig;
use crate::controller::{Connector, Controller};
use crate::engine::SyncCore;
use crate::engine::config::SimConfig;
use crate::engine::error::EngineError;
use crate::engine::event::SimEvent;
use crate::engine::listener::OutputListener;
use crate::engine::publisher::InputPublisher;
use crate::signals::SignalCatalog;

/// Tags the log lines and errors of one controller session. A reconnect gets a fresh id.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct SessionId(Uuid);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Prints the compact form, e.g. `9f1c2e...`, to keep log lines short.
impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.simple().fmt(f)
    }
}

/// The loops of one established connection. Dropping it stops both.
#[derive(Debug)]
struct ActiveSession {
    session_id: SessionId,
    config: ConnectionConfig,
    publisher: JoinHandle<()>,
    listener: JoinHandle<()>,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.publisher.abort();
        self.listener.abort();
    }
}

/// Owns the simulated plant and at most one controller session driving it.
///
/// The actuators outlive sessions: reconnecting keeps every position and commanded state.
#[derive(Debug)]
pub struct Simulator<K> {
    connector: K,
    catalog: Arc<SignalCatalog>,
    core: Arc<SyncCore>,
    session: Option<ActiveSession>,
}

impl<K: Connector> Simulator<K> {
    pub fn new(connector: K, config: SimConfig) -> Result<Self, EngineError> {
        let catalog = Arc::new(SignalCatalog::new(config.groups, &config.symbol_prefix));
        let core = Arc::new(SyncCore::new(&catalog, config)?);

        Ok(Self {
            connector,
            catalog,
            core,
            session: None,
        })
    }

    /// Connect to the controller described by `config` and start publishing and listening.
    ///
    /// Fails with [`ConnectionError::WrongPort`] if the runtime behind the port is not running;
    /// nothing is started in that case.
    pub async fn establish(&mut self, config: ConnectionConfig) -> Result<SessionId, ConnectionError> {
        if let Some(active) = &self.session {
            return Err(SessionAlreadyActive {
                session_id: active.session_id,
            }
            .into());
        }

        let controller = timeout(config.timeout, self.connector.connect(&config)).await??;

        let state = timeout(config.timeout, controller.read_state()).await??;
        if !state.is_running() {
            return Err(ConnectionError::WrongPort {
                port: config.ams_port,
                state,
            });
        }

        let notifications = timeout(
            config.timeout,
            controller.subscribe(&self.catalog.output_names()),
        )
        .await??;

        let publisher = InputPublisher::new(
            Arc::clone(&self.core),
            Arc::clone(&self.catalog),
            controller,
            config.timeout,
        );
        let listener = OutputListener::new(Arc::clone(&self.core), Arc::clone(&self.catalog));

        let session_id = SessionId::generate();
        info!(
            %session_id,
            ams_net_id = %config.ams_net_id,
            ams_port = config.ams_port,
            "Session established"
        );

        self.session = Some(ActiveSession {
            session_id,
            config,
            publisher: tokio::spawn(publisher.run()),
            listener: tokio::spawn(listener.run(notifications)),
        });

        Ok(session_id)
    }

    /// Drop the current session, if any, and establish a new one with `config`.
    pub async fn reconfigure(&mut self, config: ConnectionConfig) -> Result<SessionId, ConnectionError> {
        self.shutdown();
        self.establish(config).await
    }

    /// Stop the loops of the current session. Returns its id if one was active.
    pub fn shutdown(&mut self) -> Option<SessionId> {
        let session = self.session.take()?;
        info!(session_id = %session.session_id, "Session shut down");
        Some(session.session_id)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|session| session.session_id)
    }

    pub fn connection_config(&self) -> Option<&ConnectionConfig> {
        self.session.as_ref().map(|session| &session.config)
    }

    /// Whether a session is established and both of its loops are still running.
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(|session| {
            !session.publisher.is_finished() && !session.listener.is_finished()
        })
    }

    pub fn catalog(&self) -> &Arc<SignalCatalog> {
        &self.catalog
    }

    pub fn core(&self) -> &Arc<SyncCore> {
        &self.core
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.core.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_unique() {
        let first = SessionId::generate();
        let second = SessionId::generate();

        assert_ne!(first, second);

        let shown = first.to_string();
        assert_eq!(shown.len(), 32);
        assert!(shown.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
