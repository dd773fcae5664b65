//! The synchronization engine.
//!
//! [`SyncCore`] owns every actuator and is the only place commands reach them. Two loops run
//! against it: the [`OutputListener`](listener::OutputListener) feeding controller commands in and
//! the [`InputPublisher`](publisher::InputPublisher) writing derived sensors out. Transitions are
//! completed by the [`TransitionScheduler`](scheduler::TransitionScheduler).

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use self::config::SimConfig;
use self::error::EngineError;
use self::event::SimEvent;
use self::scheduler::TransitionScheduler;
use crate::actuator_context::ActuatorContext;
use crate::actuator_id::ActuatorId;
use crate::actuator_map::ActuatorMap;
use crate::sensors::SensorVector;
use crate::signals::{CommandEvent, SignalCatalog};
use crate::state_machine::actuator::{ActuatorSnapshot, Transit};

pub mod config;
pub mod error;
pub mod event;
pub mod listener;
pub mod publisher;
pub mod scheduler;

/// What applying a command did.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The command was an edge and the actuator started moving.
    Started(Transit),

    /// The actuator was already commanded that way.
    Unchanged,
}

/// Shared state of the simulation.
#[derive(Debug)]
pub struct SyncCore {
    actuators: ActuatorMap<ActuatorContext>,
    order: Vec<ActuatorId>,
    scheduler: TransitionScheduler,
    events: broadcast::Sender<SimEvent>,
    config: SimConfig,
}

impl SyncCore {
    /// Create one idle actuator at its left bound for every actuator in `catalog`.
    pub fn new(catalog: &SignalCatalog, config: SimConfig) -> Result<Self, EngineError> {
        let actuators = ActuatorMap::new();
        let mut order = Vec::with_capacity(catalog.actuators().len());

        for (actuator_id, kind) in catalog.actuators() {
            actuators.insert_actuator(
                *actuator_id,
                ActuatorContext::new(*actuator_id, *kind),
            )?;
            order.push(*actuator_id);
        }

        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let scheduler = TransitionScheduler::new(events.clone(), config.animation_frame);

        Ok(Self {
            actuators,
            order,
            scheduler,
            events,
            config,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Actuator ids in catalog order.
    pub fn actuator_ids(&self) -> &[ActuatorId] {
        &self.order
    }

    /// Record a controller command and start a transition if it is an edge.
    ///
    /// A command arriving while the actuator is still moving is recorded but rejected with
    /// [`TransitionError::AlreadyInTransit`](crate::state_machine::actuator::error::TransitionError::AlreadyInTransit).
    /// It is not replayed once the running transition completes.
    pub fn apply_command(&self, command: &CommandEvent) -> Result<CommandOutcome, EngineError> {
        let actuator = self.actuators.get_actuator(&command.actuator_id)?;

        let Some(target) = actuator.record_command(command.commanded_state)? else {
            return Ok(CommandOutcome::Unchanged);
        };

        let duration = self.config.travel_time(command.commanded_state.kind());
        let transit = self.scheduler.start(actuator, target, duration)?;

        Ok(CommandOutcome::Started(transit))
    }

    pub fn snapshot(&self, actuator_id: &ActuatorId) -> Result<ActuatorSnapshot, EngineError> {
        let actuator = self.actuators.get_actuator(actuator_id)?;
        Ok(actuator.snapshot()?)
    }

    /// Snapshot every actuator, in catalog order.
    ///
    /// Each snapshot is consistent on its own; different actuators may be captured at slightly
    /// different instants.
    pub fn snapshots(&self) -> Vec<ActuatorSnapshot> {
        self.order
            .iter()
            .filter_map(|actuator_id| match self.snapshot(actuator_id) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    warn!(error = %err, "Skipping actuator in snapshot");
                    None
                }
            })
            .collect()
    }

    /// Derive the current sensor vector of `catalog`.
    pub fn sensors(&self, catalog: &SignalCatalog) -> SensorVector {
        SensorVector::derive(catalog, &self.snapshots())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.events.subscribe()
    }

    /// Simulation events as a stream. Events missed by a lagging consumer are skipped.
    pub fn event_stream(&self) -> impl Stream<Item = SimEvent> + Send + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(err) => {
                debug!(error = %err, "Event consumer lagged");
                None
            }
        })
    }

    pub(crate) fn report(&self, event: SimEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
