use std::sync::Arc;

pub use crate::actuator_id::ActuatorId;
use dashmap::{DashMap, Entry};

use self::{
    actuator_ref::ActuatorRef,
    error::{ActuatorAlreadyPresent, ActuatorNotFound},
};

pub mod actuator_ref;
pub mod error;

/// A map of actuators identified by an [`ActuatorId`] and their associated context `T`.
///
/// When an actuator is added to the map it is turned into a shared resource for which only
/// references can be obtained through the [`ActuatorRef`] interface. Transition tasks hold such a
/// reference while they run, so tearing down the map never keeps an actuator alive behind its back.
#[derive(Debug)]
pub struct ActuatorMap<T> {
    entity_map: DashMap<ActuatorId, Arc<T>, ahash::RandomState>,
}

impl<T> ActuatorMap<T> {
    /// Construct a new empty [`ActuatorMap`].
    pub fn new() -> ActuatorMap<T> {
        Self::default()
    }

    /// Track `context` under `actuator_id`.
    pub fn insert_actuator(
        &self,
        actuator_id: ActuatorId,
        context: T,
    ) -> Result<(), ActuatorAlreadyPresent> {
        match self.entity_map.entry(actuator_id) {
            Entry::Occupied(entry) => Err(ActuatorAlreadyPresent {
                actuator_id: *entry.key(),
            }),

            Entry::Vacant(slot) => {
                slot.insert(Arc::new(context));
                Ok(())
            }
        }
    }

    /// Lend the context for the provided `actuator_id`.
    pub fn get_actuator(&self, actuator_id: &ActuatorId) -> Result<ActuatorRef<T>, ActuatorNotFound> {
        self.entity_map
            .view(actuator_id, |_, entity| {
                ActuatorRef::new(*actuator_id, Arc::downgrade(entity))
            })
            .ok_or_else(|| ActuatorNotFound {
                actuator_id: *actuator_id,
            })
    }

    pub fn len(&self) -> usize {
        self.entity_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_map.is_empty()
    }
}

impl<T> Default for ActuatorMap<T> {
    fn default() -> Self {
        Self {
            entity_map: DashMap::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator_context::ActuatorContext;
    use crate::state_machine::actuator::{ActuatorKind, Bound};

    fn cylinder(group: usize) -> (ActuatorId, ActuatorContext) {
        let id = ActuatorId::cylinder(group);
        (id, ActuatorContext::new(id, ActuatorKind::Cylinder))
    }

    #[test]
    fn test_insert_and_lend() {
        let map = ActuatorMap::new();
        let (id, context) = cylinder(1);

        map.insert_actuator(id, context).unwrap();
        assert_eq!(map.len(), 1);

        let actuator = map.get_actuator(&id).unwrap();
        assert_eq!(actuator.actuator_id(), id);
        assert_eq!(actuator.kind().unwrap(), ActuatorKind::Cylinder);
        assert!(actuator.snapshot().unwrap().is_at(Bound::Minus));
    }

    #[test]
    fn test_duplicate_insert_error() {
        let map = ActuatorMap::new();
        let (id, context) = cylinder(2);

        map.insert_actuator(id, context).unwrap();
        let err = map
            .insert_actuator(id, ActuatorContext::new(id, ActuatorKind::Cylinder))
            .unwrap_err();

        assert_eq!(err.actuator_id, id);
    }

    #[test]
    fn test_missing_actuator_error() {
        let map: ActuatorMap<ActuatorContext> = ActuatorMap::new();

        assert!(map.is_empty());
        assert!(matches!(
            map.get_actuator(&ActuatorId::motor(9)),
            Err(ActuatorNotFound { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lent_actuator_invalid_after_map_dropped() {
        let map = ActuatorMap::new();
        let (id, context) = cylinder(1);
        map.insert_actuator(id, context).unwrap();

        let actuator = map.get_actuator(&id).unwrap();
        drop(map);

        assert!(actuator.snapshot().is_err());
        assert!(matches!(
            actuator.record_command(crate::state_machine::actuator::CommandedState::ToPlus),
            Err(crate::engine::error::EngineError::ActuatorViewInvalid(_))
        ));
    }
}
