use super::{ActuatorKind, Bound, CommandedState};
use crate::actuator_id::ActuatorId;

/// Indicates that a transition could not be started or a command could not be applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    /// A transition is already running; transitions are never restarted or queued.
    #[error("actuator {actuator_id} is already in transit towards {target:?}")]
    AlreadyInTransit { actuator_id: ActuatorId, target: Bound },

    /// The actuator already rests at the requested bound.
    #[error("actuator {actuator_id} already rests at {bound:?}")]
    AlreadyAtBound { actuator_id: ActuatorId, bound: Bound },

    /// A cylinder command was routed to a motor or vice versa.
    #[error("actuator {actuator_id} is a {kind:?} and cannot accept {command:?}")]
    CommandMismatch {
        actuator_id: ActuatorId,
        kind: ActuatorKind,
        command: CommandedState,
    },

    /// The container never provided a clock reading before asking for a transition.
    #[error("actuator {actuator_id} has not been provided a clock reading")]
    ClockNotProvided { actuator_id: ActuatorId },
}
