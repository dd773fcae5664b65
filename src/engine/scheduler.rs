use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use super::error::EngineError;
use super::event::SimEvent;
use crate::actuator_context::ActuatorContext;
use crate::actuator_map::actuator_ref::ActuatorRef;
use crate::state_machine::actuator::{Bound, Transit};

/// Starts transitions and completes them on time.
///
/// Each transition gets its own task holding only a weak [`ActuatorRef`]. The task never touches
/// the actuator lock across an `.await`, so concurrent commands and publish ticks stay responsive
/// while transitions are in flight.
///
/// An observer reading the actuator at the deadline may finish the transition before the task
/// wakes. The task still collects that completion and reports it, exactly once.
#[derive(Debug, Clone)]
pub struct TransitionScheduler {
    events: broadcast::Sender<SimEvent>,
    animation_frame: Option<Duration>,
}

impl TransitionScheduler {
    pub fn new(events: broadcast::Sender<SimEvent>, animation_frame: Option<Duration>) -> Self {
        Self {
            events,
            animation_frame,
        }
    }

    /// Begin a transition of `actuator` towards `target` and arrange its completion after
    /// `duration`.
    ///
    /// Fails without side effects if the actuator is already in transit or rests at `target`.
    pub fn start(
        &self,
        actuator: ActuatorRef<ActuatorContext>,
        target: Bound,
        duration: Duration,
    ) -> Result<Transit, EngineError> {
        let kind = actuator.kind()?;
        let transit = actuator.begin_transition(target, duration)?;

        debug!(
            actuator_id = %actuator.actuator_id(),
            from = transit.from.name(kind),
            target = transit.target.name(kind),
            ?duration,
            "Transition started"
        );

        // No subscribers is fine.
        let _ = self.events.send(SimEvent::TransitionStarted {
            actuator_id: actuator.actuator_id(),
            kind,
            from: transit.from,
            target: transit.target,
            duration,
        });

        tokio::spawn(run_transition(
            actuator,
            transit,
            self.animation_frame,
            self.events.clone(),
        ));

        Ok(transit)
    }
}

async fn run_transition(
    actuator: ActuatorRef<ActuatorContext>,
    transit: Transit,
    animation_frame: Option<Duration>,
    events: broadcast::Sender<SimEvent>,
) {
    let deadline = transit.deadline();

    if let Some(frame) = animation_frame {
        if !animate(&actuator, deadline, transit.started_at + frame, frame).await {
            return;
        }
    }

    tokio::time::sleep_until(deadline).await;

    match actuator.complete_transition(&transit) {
        Ok(Some(bound)) => {
            debug!(actuator_id = %actuator.actuator_id(), ?bound, "Transition completed");
            let _ = events.send(SimEvent::TransitionCompleted {
                actuator_id: actuator.actuator_id(),
                bound,
            });
        }
        Ok(None) => {
            warn!(actuator_id = %actuator.actuator_id(), "Transition completion already collected");
        }
        Err(err) => {
            debug!(error = %err, "Actuator removed before its transition completed");
        }
    }
}

/// Move the in-flight position once per `frame` until `deadline`. Returns `false` if the actuator
/// went away meanwhile.
async fn animate(
    actuator: &ActuatorRef<ActuatorContext>,
    deadline: Instant,
    first_frame: Instant,
    frame: Duration,
) -> bool {
    let mut ticker = tokio::time::interval_at(first_frame, frame);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = tokio::time::sleep_until(deadline) => return true,
            _ = ticker.tick() => {
                match actuator.advance() {
                    Ok(snapshot) => trace!(
                        actuator_id = %actuator.actuator_id(),
                        position = snapshot.position,
                        "Transition frame"
                    ),
                    Err(_) => return false,
                }
            }
        }
    }
}
