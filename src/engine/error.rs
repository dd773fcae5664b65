use thiserror::Error;

use crate::actuator_map::actuator_ref::error::ActuatorViewInvalid;
use crate::actuator_map::error::{ActuatorAlreadyPresent, ActuatorNotFound};
use crate::signals::error::UnrecognizedSignal;
use crate::state_machine::actuator::error::TransitionError;

/// Errors of the synchronization core.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    ActuatorNotFound(#[from] ActuatorNotFound),

    #[error(transparent)]
    ActuatorAlreadyPresent(#[from] ActuatorAlreadyPresent),

    #[error(transparent)]
    ActuatorViewInvalid(#[from] ActuatorViewInvalid),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Reasons a single controller notification was dropped by the output listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error(transparent)]
    Unrecognized(#[from] UnrecognizedSignal),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
