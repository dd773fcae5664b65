use tokio::time::Instant;

/// The [`SystemResource`] trait indicates that a type is a resource inherently provided by the
/// system context of the application.
///
/// This is intended for usage with [`SystemInput`] so a container can hand the resource to a
/// [`StateMachine`](crate::state_machine::StateMachine) without the machine reading it itself.
pub trait SystemResource {
    /// Produce an instance of this resource drawing only from the implicit system context.
    fn generate() -> Self;
}

/// Uses the tokio clock so paused-time tests drive transitions deterministically.
impl SystemResource for Instant {
    fn generate() -> Self {
        Instant::now()
    }
}

/// A [`StateMachine`](crate::state_machine::StateMachine) input wrapper for providing
/// [`SystemResource`] to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemInput<I, S> {
    Input(I),
    System(S),
}
