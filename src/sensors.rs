//! Derivation of the controller's digital inputs from actuator state.

use std::sync::Arc;

use crate::actuator_id::ActuatorId;
use crate::signals::{IoAddress, SensorRole, SignalCatalog};
use crate::state_machine::actuator::{ActuatorSnapshot, Bound, CommandedState};

/// The value of one sensor for the given actuator snapshot.
///
/// A cylinder reports an end position only while resting there, so a travelling cylinder reports
/// neither. A motor reports running only while it rests at the right bound *and* is still being
/// commanded to run; it reports stopped while travelling in either direction.
pub fn derive_sensor(role: SensorRole, snapshot: &ActuatorSnapshot) -> bool {
    match role {
        SensorRole::CylinderMinus => snapshot.is_at(Bound::Minus),
        SensorRole::CylinderPlus => snapshot.is_at(Bound::Plus),
        SensorRole::MotorRunning => {
            snapshot.commanded == Some(CommandedState::Start) && snapshot.is_at(Bound::RIGHT)
        }
    }
}

/// One derived sensor value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorValue {
    pub name: Arc<str>,
    pub address: IoAddress,
    pub value: bool,
}

/// Snapshot of every sensor, in I/O image order.
///
/// Always recomputed from actuator snapshots, never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SensorVector {
    values: Vec<SensorValue>,
}

impl SensorVector {
    /// Derive the sensor vector of `catalog` from `snapshots`.
    ///
    /// Sensors whose actuator has no snapshot report `false`.
    pub fn derive(catalog: &SignalCatalog, snapshots: &[ActuatorSnapshot]) -> Self {
        let values = catalog
            .inputs()
            .iter()
            .map(|signal| SensorValue {
                name: Arc::clone(&signal.name),
                address: signal.address,
                value: find_snapshot(snapshots, &signal.actuator_id)
                    .is_some_and(|snapshot| derive_sensor(signal.role, snapshot)),
            })
            .collect();

        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.values
            .iter()
            .find(|sensor| &*sensor.name == name)
            .map(|sensor| sensor.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `I0.0:true` style labels, as shown next to each actuator.
    pub fn labels(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|sensor| format!("{}:{}", sensor.address, sensor.value))
            .collect()
    }

    /// Pack the values into the bytes of the input image.
    pub fn to_image(&self) -> Vec<u8> {
        let len = self
            .values
            .iter()
            .map(|sensor| sensor.address.byte + 1)
            .max()
            .unwrap_or(0);

        let mut image = vec![0_u8; len];
        for sensor in self.values.iter().filter(|sensor| sensor.value) {
            image[sensor.address.byte] |= 1 << sensor.address.bit;
        }
        image
    }
}

fn find_snapshot<'a>(
    snapshots: &'a [ActuatorSnapshot],
    actuator_id: &ActuatorId,
) -> Option<&'a ActuatorSnapshot> {
    snapshots.iter().find(|snapshot| &snapshot.id == actuator_id)
}

impl<'a> IntoIterator for &'a SensorVector {
    type Item = &'a SensorValue;
    type IntoIter = std::slice::Iter<'a, SensorValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::actuator::{ActuatorKind, MotionState, Transit};
    use std::time::Duration;
    use tokio::time::Instant;

    fn snapshot(
        id: &str,
        kind: ActuatorKind,
        position: f64,
        commanded: Option<CommandedState>,
        in_transit: bool,
    ) -> ActuatorSnapshot {
        let transit = in_transit.then(|| Transit {
            from: Bound::Minus,
            target: Bound::Plus,
            started_at: Instant::now(),
            duration: Duration::from_secs(1),
        });

        ActuatorSnapshot {
            id: id.parse().unwrap(),
            kind,
            position,
            motion: if in_transit {
                MotionState::InTransit
            } else {
                MotionState::Idle
            },
            commanded,
            transit,
        }
    }

    #[test]
    fn test_cylinder_end_sensors() {
        let at_minus = snapshot("cyl1", ActuatorKind::Cylinder, 0.0, None, false);
        let at_plus = snapshot("cyl1", ActuatorKind::Cylinder, 1.0, None, false);
        let travelling = snapshot("cyl1", ActuatorKind::Cylinder, 0.0, None, true);

        assert!(derive_sensor(SensorRole::CylinderMinus, &at_minus));
        assert!(!derive_sensor(SensorRole::CylinderPlus, &at_minus));

        assert!(!derive_sensor(SensorRole::CylinderMinus, &at_plus));
        assert!(derive_sensor(SensorRole::CylinderPlus, &at_plus));

        // Leaving the minus bound drops the minus sensor right away
        assert!(!derive_sensor(SensorRole::CylinderMinus, &travelling));
        assert!(!derive_sensor(SensorRole::CylinderPlus, &travelling));
    }

    #[test]
    fn test_motor_running_needs_command_and_position() {
        let start = Some(CommandedState::Start);
        let stop = Some(CommandedState::Stop);

        let running = snapshot("mot1", ActuatorKind::Motor, 1.0, start, false);
        let spinning_up = snapshot("mot1", ActuatorKind::Motor, 0.5, start, true);
        let stopped_at_right = snapshot("mot1", ActuatorKind::Motor, 1.0, stop, false);
        let idle = snapshot("mot1", ActuatorKind::Motor, 0.0, None, false);

        assert!(derive_sensor(SensorRole::MotorRunning, &running));
        assert!(!derive_sensor(SensorRole::MotorRunning, &spinning_up));
        assert!(!derive_sensor(SensorRole::MotorRunning, &stopped_at_right));
        assert!(!derive_sensor(SensorRole::MotorRunning, &idle));
    }

    #[test]
    fn test_vector_labels_and_image() {
        let catalog = SignalCatalog::new(2, "MAIN");
        let snapshots = vec![
            snapshot("cyl1", ActuatorKind::Cylinder, 1.0, None, false),
            snapshot("mot1", ActuatorKind::Motor, 0.0, None, false),
            snapshot("cyl2", ActuatorKind::Cylinder, 0.0, None, false),
            snapshot("mot2", ActuatorKind::Motor, 1.0, Some(CommandedState::Start), false),
        ];

        let sensors = SensorVector::derive(&catalog, &snapshots);

        assert_eq!(sensors.len(), 6);
        assert_eq!(sensors.get("MAIN.iCyl1plus"), Some(true));
        assert_eq!(sensors.get("MAIN.iCyl1minus"), Some(false));
        assert_eq!(sensors.get("MAIN.iMot2running"), Some(true));
        assert_eq!(sensors.get("MAIN.iMot3running"), None);

        assert_eq!(
            sensors.labels(),
            vec![
                "I0.0:false",
                "I0.1:true",
                "I0.2:false",
                "I0.3:true",
                "I0.4:false",
                "I0.5:true",
            ]
        );
        // bits 1, 3 and 5
        assert_eq!(sensors.to_image(), vec![0b0010_1010]);
    }

    #[test]
    fn test_missing_snapshot_reads_false() {
        let catalog = SignalCatalog::new(1, "MAIN");
        let sensors = SensorVector::derive(&catalog, &[]);

        assert!(sensors.iter().all(|sensor| !sensor.value));
    }
}
