use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, trace, warn};

use super::error::{EngineError, ListenerError};
use super::event::SimEvent;
use super::{CommandOutcome, SyncCore};
use crate::controller::{Notification, NotificationStream};
use crate::signals::SignalCatalog;

/// Turns controller output notifications into actuator commands.
#[derive(Debug, Clone)]
pub struct OutputListener {
    core: Arc<SyncCore>,
    catalog: Arc<SignalCatalog>,
}

impl OutputListener {
    pub fn new(core: Arc<SyncCore>, catalog: Arc<SignalCatalog>) -> Self {
        Self { core, catalog }
    }

    /// Resolve and apply a single notification.
    ///
    /// `Ok(None)` for changes that carry no command, like a cylinder output dropping to `false`.
    pub fn handle(&self, notification: &Notification) -> Result<Option<CommandOutcome>, ListenerError> {
        let Some(command) = self.catalog.resolve(
            &notification.name,
            notification.value,
            notification.timestamp,
        )?
        else {
            return Ok(None);
        };

        Ok(Some(self.core.apply_command(&command)?))
    }

    /// Handle notifications until the stream ends, then report the lost connection.
    pub async fn run(self, mut notifications: NotificationStream) {
        while let Some(notification) = notifications.next().await {
            match self.handle(&notification) {
                Ok(Some(CommandOutcome::Started(transit))) => {
                    trace!(name = %notification.name, target = ?transit.target, "Command applied");
                }
                Ok(Some(CommandOutcome::Unchanged) | None) => {
                    trace!(name = %notification.name, value = notification.value, "No new command");
                }
                Err(ListenerError::Engine(EngineError::Transition(err))) => {
                    debug!(error = %err, "Command ignored");
                }
                Err(ListenerError::Unrecognized(err)) => {
                    warn!(error = %err, "Dropping notification");
                }
                Err(err) => {
                    warn!(error = %err, name = %notification.name, "Failed to apply command");
                }
            }
        }

        info!("Output notifications ended");
        self.core.report(SimEvent::ConnectionLost {
            reason: "output notification stream closed".to_string(),
        });
    }
}
