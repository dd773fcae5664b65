use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::actuator_id::ActuatorId;
use crate::state_machine::StateMachine;
use crate::state_machine::actuator::error::TransitionError;
use crate::state_machine::actuator::{
    ActuatorInput, ActuatorKind, ActuatorModel, ActuatorOutput, ActuatorSnapshot, Bound,
    CommandedState, Transit,
};
use crate::state_machine::wrappers::input::system::{SystemInput, SystemResource};

/// The exclusive-access container of one [`ActuatorModel`].
///
/// Every method takes the lock once, feeds the current time followed by the actual input, and
/// drains the produced output before releasing it. Feeding the time finishes a transition whose
/// deadline has passed, so any observer sees the actuator at its target from the deadline on.
/// No method holds the lock across an `.await`.
pub struct ActuatorContext {
    model: Mutex<ActuatorModel>,
}

impl std::fmt::Debug for ActuatorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuatorContext")
            .field("model", &"<ActuatorModel>")
            .finish()
    }
}

impl ActuatorContext {
    pub fn new(id: ActuatorId, kind: ActuatorKind) -> Self {
        Self {
            model: Mutex::new(ActuatorModel::new(id, kind)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ActuatorModel> {
        self.model.lock().expect("actuator model lock poisoned")
    }

    /// Lock, feed the current time and then `input`.
    fn drive(&self, input: Option<ActuatorInput>) -> MutexGuard<'_, ActuatorModel> {
        let mut machine = self.lock();
        machine.process_input(SystemInput::System(Instant::generate()));
        if let Some(input) = input {
            machine.process_input(SystemInput::Input(input));
        }
        machine
    }

    pub fn kind(&self) -> ActuatorKind {
        self.lock().kind()
    }

    /// Record `command` and return the bound to travel to if the command is an edge.
    pub fn record_command(&self, command: CommandedState) -> Result<Option<Bound>, TransitionError> {
        match self.drive(Some(ActuatorInput::Command(command))).poll_output() {
            Some(ActuatorOutput::TransitionWanted(target)) => Ok(Some(target)),
            Some(ActuatorOutput::TransitionRejected(err)) => Err(err),
            _ => Ok(None),
        }
    }

    /// Start a transition towards `target`, failing if one is already running.
    pub fn begin_transition(
        &self,
        target: Bound,
        duration: Duration,
    ) -> Result<Transit, TransitionError> {
        match self
            .drive(Some(ActuatorInput::Begin { target, duration }))
            .poll_output()
        {
            Some(ActuatorOutput::TransitionStarted(transit)) => Ok(transit),
            Some(ActuatorOutput::TransitionRejected(err)) => Err(err),
            other => unreachable!("begin produced unexpected output {other:?}"),
        }
    }

    /// Collect the completion of `transit`. Returns the reached bound the first time only, even
    /// if an observer already saw the actuator arrive.
    pub fn complete_transition(&self, transit: &Transit) -> Option<Bound> {
        match self
            .drive(Some(ActuatorInput::Complete(*transit)))
            .poll_output()
        {
            Some(ActuatorOutput::TransitionCompleted(bound)) => Some(bound),
            _ => None,
        }
    }

    /// Move an in-flight position along its path and return the fresh snapshot.
    pub fn advance(&self) -> ActuatorSnapshot {
        self.drive(Some(ActuatorInput::Frame)).snapshot()
    }

    /// The actuator as of now.
    pub fn snapshot(&self) -> ActuatorSnapshot {
        self.drive(None).snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::actuator::MotionState;

    #[tokio::test(start_paused = true)]
    async fn test_transition_through_context() {
        let context = ActuatorContext::new(ActuatorId::motor(2), ActuatorKind::Motor);

        let target = context.record_command(CommandedState::Start).unwrap();
        assert_eq!(target, Some(Bound::RIGHT));

        let transit = context
            .begin_transition(Bound::RIGHT, Duration::from_secs(3))
            .unwrap();
        assert_eq!(transit.deadline() - transit.started_at, Duration::from_secs(3));

        tokio::time::advance(Duration::from_secs(1)).await;
        let snapshot = context.advance();
        assert_eq!(snapshot.motion, MotionState::InTransit);
        assert!((snapshot.position - 1.0 / 3.0).abs() < 1e-6);

        assert_eq!(context.complete_transition(&transit), Some(Bound::RIGHT));
        assert!(context.snapshot().is_at(Bound::RIGHT));
        assert_eq!(context.complete_transition(&transit), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_at_deadline_sees_arrival() {
        let context = ActuatorContext::new(ActuatorId::cylinder(1), ActuatorKind::Cylinder);
        let transit = context
            .begin_transition(Bound::Plus, Duration::from_millis(1500))
            .unwrap();

        tokio::time::advance(Duration::from_millis(1500)).await;
        let snapshot = context.snapshot();
        assert_eq!(snapshot.motion, MotionState::Idle);
        assert!(snapshot.is_at(Bound::Plus));

        // The arrival is still reported to whoever owns the transition, once
        assert_eq!(context.complete_transition(&transit), Some(Bound::Plus));
        assert_eq!(context.complete_transition(&transit), None);
    }

    #[test]
    fn test_mismatched_command_surfaces_error() {
        let context = ActuatorContext::new(ActuatorId::cylinder(1), ActuatorKind::Cylinder);

        assert!(matches!(
            context.record_command(CommandedState::Stop),
            Err(TransitionError::CommandMismatch { .. })
        ));
    }
}
