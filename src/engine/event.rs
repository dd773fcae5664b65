use std::time::Duration;

use crate::actuator_id::ActuatorId;
use crate::state_machine::actuator::{ActuatorKind, Bound};

/// Events published by the engine for renderers and supervisors.
///
/// Delivery is best effort: a slow subscriber lags and loses events, the engine never waits.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// An actuator left `from` and will reach `target` after `duration`.
    TransitionStarted {
        actuator_id: ActuatorId,
        kind: ActuatorKind,
        from: Bound,
        target: Bound,
        duration: Duration,
    },

    TransitionCompleted {
        actuator_id: ActuatorId,
        bound: Bound,
    },

    /// Publishing or receiving stopped working; the connection owner decides what happens next.
    ConnectionLost { reason: String },
}
