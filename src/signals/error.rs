/// Indicates that a notification named a symbol that is not one of the simulator's outputs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized output signal '{name}'")]
pub struct UnrecognizedSignal {
    pub name: String,
}
