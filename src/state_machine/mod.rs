pub mod actuator;
pub mod wrappers;

/// The [`StateMachine`] trait provides calling semantics and indicates the upholding of invariants
/// that guarantee deterministic behavior of the simulated plant.
///
/// # Functionality
/// State machines operate on defined inputs and outputs. A simulated actuator for instance accepts
/// commands from the controller and completion notices from its transition timer, and reports
/// transitions that were wanted, started, rejected or completed. In Rust this is represented with
/// an enum for each direction.
///
/// The type groupings are provided by the associated types of [`Input`](StateMachine::Input) and
/// [`Output`](StateMachine::Output). Method dispatch is defined by
/// [`process_input`](StateMachine::process_input) and [`poll_output`](StateMachine::poll_output).
///
/// # Invariants
/// A [`StateMachine`] must be pure in that its operation does not depend on any external behavior
/// of the broader system. Two identical sequences of input always produce identical output.
///
/// Implementors of this trait *must* uphold all the following invariants.
///
/// ## No Interior Mutability
/// All data is either immutable or mutated only through `&mut` access. No [`std::cell`] like
/// containers, no [`std::sync`] locks, no reference counted sharing. The container holding the
/// machine (see [`ActuatorContext`](crate::actuator_context::ActuatorContext)) is the single place
/// where locking happens.
///
/// ## No IO
/// The machine never talks to the controller, the filesystem or the network. Publishing sensor
/// values and receiving commands is done by the engine loops around it.
///
/// ### No System Time
/// Reading [`Instant::now`](tokio::time::Instant::now) from inside the machine would make a
/// transition's interpolated position depend on when the code happened to run. Time is therefore
/// provided as input via [`SystemInput`](wrappers::input::system::SystemInput), and the machine
/// only ever does arithmetic on the instants it was handed.
///
/// ## No Concurrency
/// No threads and no async. Transition timing is driven by the
/// [`TransitionScheduler`](crate::engine::scheduler::TransitionScheduler), which feeds the
/// resulting inputs back into the machine.
///
/// ## No Blocking
/// Processing an input is a bounded amount of work. This keeps the time spent holding an
/// actuator's lock short enough for the publish loop to never stall on it.
///
/// # Side Effects
/// Side effects which do not affect the logic of the state machine, like `tracing` events, are
/// allowed. The logic *must not* rely on the outcome of calling into them.
pub trait StateMachine {
    /// The type of input that is [processed](StateMachine::process_input) by the state machine.
    type Input;
    /// The type of output that is [polled](StateMachine::poll_output) by the state machine.
    type Output;

    /// Process the provided `input` into the state machine.
    fn process_input(&mut self, input: Self::Input);

    /// Poll the state machine for output, returning the first available output if present.
    fn poll_output(&mut self) -> Option<Self::Output>;
}
