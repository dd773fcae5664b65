use super::ActuatorId;

/// Indicates that an operation on a lent actuator failed because the owning
/// map has been torn down.
#[derive(Debug, thiserror::Error)]
#[error("the actuator context ({actuator_id}) is no longer valid")]
pub struct ActuatorViewInvalid {
    pub actuator_id: ActuatorId,
}
