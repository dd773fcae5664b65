use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use self::error::TransitionError;
use super::StateMachine;
use super::wrappers::input::system::SystemInput;
use crate::actuator_id::ActuatorId;

pub mod error;

/// The two kinds of simulated actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActuatorKind {
    /// A double acting linear cylinder with a limit switch at each end of its stroke.
    Cylinder,
    /// A motor whose spin-up and spin-down is modelled as travel between a left and right bound.
    Motor,
}

/// One end of an actuator's range of motion.
///
/// For a cylinder these are the minus and plus end positions, for a motor the left (stopped) and
/// right (running) positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    Minus,
    Plus,
}

impl Bound {
    /// Motor alias of [`Bound::Minus`].
    pub const LEFT: Bound = Bound::Minus;
    /// Motor alias of [`Bound::Plus`].
    pub const RIGHT: Bound = Bound::Plus;

    /// Normalized position of the bound.
    pub const fn position(self) -> f64 {
        match self {
            Bound::Minus => 0.0,
            Bound::Plus => 1.0,
        }
    }

    pub const fn opposite(self) -> Bound {
        match self {
            Bound::Minus => Bound::Plus,
            Bound::Plus => Bound::Minus,
        }
    }

    /// Human readable name of the bound for the given actuator kind.
    pub const fn name(self, kind: ActuatorKind) -> &'static str {
        match (kind, self) {
            (ActuatorKind::Cylinder, Bound::Minus) => "minus",
            (ActuatorKind::Cylinder, Bound::Plus) => "plus",
            (ActuatorKind::Motor, Bound::Minus) => "left",
            (ActuatorKind::Motor, Bound::Plus) => "right",
        }
    }
}

/// The last command received from the controller for an actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandedState {
    ToMinus,
    ToPlus,
    Start,
    /// Falling edge of a motor's start signal.
    Stop,
}

impl CommandedState {
    /// The actuator kind this command is meant for.
    pub const fn kind(self) -> ActuatorKind {
        match self {
            CommandedState::ToMinus | CommandedState::ToPlus => ActuatorKind::Cylinder,
            CommandedState::Start | CommandedState::Stop => ActuatorKind::Motor,
        }
    }

    /// The bound an actuator moves to when obeying this command.
    pub const fn target(self) -> Bound {
        match self {
            CommandedState::ToMinus | CommandedState::Stop => Bound::Minus,
            CommandedState::ToPlus | CommandedState::Start => Bound::Plus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionState {
    Idle,
    InTransit,
}

/// A running transition from one bound to the other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transit {
    pub from: Bound,
    pub target: Bound,
    pub started_at: Instant,
    pub duration: Duration,
}

impl Transit {
    /// The instant at which the transition completes.
    pub fn deadline(&self) -> Instant {
        self.started_at + self.duration
    }

    /// Fraction of the travel covered at `now`, clamped to `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }

        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Linearly interpolated position at `now`.
    pub fn position_at(&self, now: Instant) -> f64 {
        let start = self.from.position();
        let end = self.target.position();
        start + (end - start) * self.progress(now)
    }
}

/// A consistent copy of one actuator's state taken under its lock.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorSnapshot {
    pub id: ActuatorId,
    pub kind: ActuatorKind,
    pub position: f64,
    pub motion: MotionState,
    pub commanded: Option<CommandedState>,
    pub transit: Option<Transit>,
}

impl ActuatorSnapshot {
    /// Whether the actuator rests exactly at `bound`.
    pub fn is_at(&self, bound: Bound) -> bool {
        self.motion == MotionState::Idle && self.position == bound.position()
    }
}

/// Pure position and command model of one cylinder or motor.
///
/// The model rests at a bound while idle. Starting a transition hands the position over to the
/// transition until its deadline puts it on the target bound again. In between
/// [`advance`](Self::advance) may move it along the linear path.
///
/// A transition finishes the first time the model sees a time at or past its deadline, whoever
/// feeds that time. The finished transition is kept until its owner collects it through
/// [`complete_transition`](Self::complete_transition), so completion is reported exactly once.
#[derive(Debug)]
pub struct ActuatorModel {
    id: ActuatorId,
    kind: ActuatorKind,
    position: f64,
    commanded: Option<CommandedState>,
    transit: Option<Transit>,
    finished: Vec<Transit>,
    clock: Option<Instant>,
    pending: VecDeque<ActuatorOutput>,
}

impl ActuatorModel {
    /// A new idle actuator resting at its minus (left) bound.
    pub fn new(id: ActuatorId, kind: ActuatorKind) -> Self {
        Self {
            id,
            kind,
            position: Bound::Minus.position(),
            commanded: None,
            transit: None,
            finished: Vec::new(),
            clock: None,
            pending: VecDeque::new(),
        }
    }

    pub fn id(&self) -> ActuatorId {
        self.id
    }

    pub fn kind(&self) -> ActuatorKind {
        self.kind
    }

    pub fn current_position(&self) -> f64 {
        self.position
    }

    pub fn commanded_state(&self) -> Option<CommandedState> {
        self.commanded
    }

    pub fn transit(&self) -> Option<&Transit> {
        self.transit.as_ref()
    }

    pub fn motion_state(&self) -> MotionState {
        match self.transit {
            Some(_) => MotionState::InTransit,
            None => MotionState::Idle,
        }
    }

    /// Idle at the minus bound; for a motor this is the stopped position.
    pub fn is_at_minus_or_stop(&self) -> bool {
        self.transit.is_none() && self.position == Bound::Minus.position()
    }

    /// Idle at the plus bound; for a motor this is the running position.
    pub fn is_at_plus_or_run(&self) -> bool {
        self.transit.is_none() && self.position == Bound::Plus.position()
    }

    pub fn snapshot(&self) -> ActuatorSnapshot {
        ActuatorSnapshot {
            id: self.id,
            kind: self.kind,
            position: self.position,
            motion: self.motion_state(),
            commanded: self.commanded,
            transit: self.transit,
        }
    }

    /// The bound the actuator rests at, or is travelling towards.
    pub fn heading(&self) -> Bound {
        match self.transit {
            Some(transit) => transit.target,
            None => self.resting_bound(),
        }
    }

    fn resting_bound(&self) -> Bound {
        if self.position == Bound::Plus.position() {
            Bound::Plus
        } else {
            Bound::Minus
        }
    }

    /// Record a command from the controller.
    ///
    /// Returns the bound to travel to when the command asks for a different bound than the one
    /// the actuator rests at or is already heading to. Repeating a command yields `None`.
    pub fn record_command(
        &mut self,
        command: CommandedState,
    ) -> Result<Option<Bound>, TransitionError> {
        if command.kind() != self.kind {
            return Err(TransitionError::CommandMismatch {
                actuator_id: self.id,
                kind: self.kind,
                command,
            });
        }

        self.commanded = Some(command);

        let target = command.target();
        if self.heading() == target {
            trace!(actuator_id = %self.id, ?command, "command does not change heading");
            return Ok(None);
        }

        Ok(Some(target))
    }

    /// Hand the position over to a new transition towards `target`.
    pub fn begin_transition(
        &mut self,
        target: Bound,
        duration: Duration,
        now: Instant,
    ) -> Result<Transit, TransitionError> {
        if let Some(transit) = self.transit {
            return Err(TransitionError::AlreadyInTransit {
                actuator_id: self.id,
                target: transit.target,
            });
        }

        let from = self.resting_bound();
        if from == target {
            return Err(TransitionError::AlreadyAtBound {
                actuator_id: self.id,
                bound: target,
            });
        }

        let transit = Transit {
            from,
            target,
            started_at: now,
            duration,
        };
        self.transit = Some(transit);

        Ok(transit)
    }

    /// Finish the running transition if `now` is at or past its deadline.
    pub fn settle(&mut self, now: Instant) {
        if let Some(transit) = self.transit
            && now >= transit.deadline()
        {
            self.finish(transit);
        }
    }

    /// Settle, then move a still running transition along its linear path.
    pub fn advance(&mut self, now: Instant) {
        self.settle(now);

        if let Some(transit) = self.transit {
            self.position = transit.position_at(now);
        }
    }

    /// Collect the completion of `transit`, finishing it first if it is still running.
    ///
    /// Returns the reached bound once per transition, `None` for a transition that is unknown or
    /// was already collected.
    pub fn complete_transition(&mut self, transit: &Transit) -> Option<Bound> {
        if self.transit.as_ref() == Some(transit) {
            self.finish(*transit);
        }

        let index = self.finished.iter().position(|done| done == transit)?;
        Some(self.finished.swap_remove(index).target)
    }

    fn finish(&mut self, transit: Transit) {
        self.transit = None;
        self.position = transit.target.position();
        self.finished.push(transit);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorInput {
    Command(CommandedState),
    Begin { target: Bound, duration: Duration },
    /// Move an in-flight position to the current time.
    Frame,
    Complete(Transit),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorOutput {
    TransitionWanted(Bound),
    TransitionStarted(Transit),
    TransitionRejected(TransitionError),
    TransitionCompleted(Bound),
}

impl StateMachine for ActuatorModel {
    type Input = SystemInput<ActuatorInput, Instant>;
    type Output = ActuatorOutput;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            SystemInput::System(now) => {
                self.clock = Some(now);
                self.settle(now);
            }

            SystemInput::Input(ActuatorInput::Command(command)) => {
                match self.record_command(command) {
                    Ok(Some(target)) => {
                        self.pending.push_back(ActuatorOutput::TransitionWanted(target));
                    }
                    Ok(None) => {}
                    Err(err) => self.pending.push_back(ActuatorOutput::TransitionRejected(err)),
                }
            }

            SystemInput::Input(ActuatorInput::Begin { target, duration }) => {
                let result = match self.clock {
                    Some(now) => self.begin_transition(target, duration, now),
                    None => Err(TransitionError::ClockNotProvided {
                        actuator_id: self.id,
                    }),
                };

                self.pending.push_back(match result {
                    Ok(transit) => ActuatorOutput::TransitionStarted(transit),
                    Err(err) => ActuatorOutput::TransitionRejected(err),
                });
            }

            SystemInput::Input(ActuatorInput::Frame) => {
                if let Some(now) = self.clock {
                    self.advance(now);
                }
            }

            SystemInput::Input(ActuatorInput::Complete(transit)) => {
                if let Some(bound) = self.complete_transition(&transit) {
                    self.pending
                        .push_back(ActuatorOutput::TransitionCompleted(bound));
                }
            }
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.pop_front()
    }
}
