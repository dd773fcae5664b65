use std::sync::{Arc, Weak};
use std::time::Duration;

use self::error::ActuatorViewInvalid;
use super::ActuatorId;
use crate::actuator_context::ActuatorContext;
use crate::engine::error::EngineError;
use crate::state_machine::actuator::{
    ActuatorKind, ActuatorSnapshot, Bound, CommandedState, Transit,
};

pub mod error;

/// A weak handle on an actuator owned by an [`ActuatorMap`](super::ActuatorMap).
///
/// Transition tasks keep one of these while they wait, so dropping the map ends them instead of
/// keeping the actuator alive. Every operation fails with [`ActuatorViewInvalid`] once the map is
/// gone.
#[derive(Debug)]
pub struct ActuatorRef<T> {
    actuator_id: ActuatorId,
    weak_context: Weak<T>,
}

impl<T> ActuatorRef<T> {
    pub(super) fn new(actuator_id: ActuatorId, weak_context: Weak<T>) -> ActuatorRef<T> {
        Self {
            actuator_id,
            weak_context,
        }
    }

    pub fn actuator_id(&self) -> ActuatorId {
        self.actuator_id
    }

    fn upgrade(&self) -> Result<Arc<T>, ActuatorViewInvalid> {
        self.weak_context.upgrade().ok_or(ActuatorViewInvalid {
            actuator_id: self.actuator_id,
        })
    }
}

impl ActuatorRef<ActuatorContext> {
    pub fn kind(&self) -> Result<ActuatorKind, ActuatorViewInvalid> {
        Ok(self.upgrade()?.kind())
    }

    /// See [`ActuatorContext::record_command`].
    pub fn record_command(&self, command: CommandedState) -> Result<Option<Bound>, EngineError> {
        Ok(self.upgrade()?.record_command(command)?)
    }

    /// See [`ActuatorContext::begin_transition`].
    pub fn begin_transition(&self, target: Bound, duration: Duration) -> Result<Transit, EngineError> {
        Ok(self.upgrade()?.begin_transition(target, duration)?)
    }

    /// See [`ActuatorContext::complete_transition`].
    pub fn complete_transition(&self, transit: &Transit) -> Result<Option<Bound>, ActuatorViewInvalid> {
        Ok(self.upgrade()?.complete_transition(transit))
    }

    pub fn advance(&self) -> Result<ActuatorSnapshot, ActuatorViewInvalid> {
        Ok(self.upgrade()?.advance())
    }

    pub fn snapshot(&self) -> Result<ActuatorSnapshot, ActuatorViewInvalid> {
        Ok(self.upgrade()?.snapshot())
    }
}

impl<T> Clone for ActuatorRef<T> {
    fn clone(&self) -> Self {
        Self {
            actuator_id: self.actuator_id,
            weak_context: self.weak_context.clone(),
        }
    }
}
