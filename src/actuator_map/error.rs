use super::ActuatorId;

/// Indicates that an actuator could not be registered because its id is already taken.
#[derive(Debug, thiserror::Error)]
#[error("the provided actuator id ({actuator_id}) is already present")]
pub struct ActuatorAlreadyPresent {
    pub actuator_id: ActuatorId,
}

/// Indicates that an operation to retrieve an actuator failed because it doesn't exist.
#[derive(Debug, thiserror::Error)]
#[error("the provided actuator id ({actuator_id}) could not be found")]
pub struct ActuatorNotFound {
    pub actuator_id: ActuatorId,
}
