//! The fixed mapping between controller symbols and simulated actuators.
//!
//! The plant is laid out in groups. Group `g` holds cylinder `cyl{g}` and motor `mot{g}` and
//! owns three consecutive bits in both the input and output image:
//!
//! | bit | input           | output           |
//! |-----|-----------------|------------------|
//! | +0  | `iCyl{g}minus`  | `qCyl{g}toMinus` |
//! | +1  | `iCyl{g}plus`   | `qCyl{g}toPlus`  |
//! | +2  | `iMot{g}running`| `qMot{g}start`   |
//!
//! Two groups share a byte, so `iCyl2minus` is `I0.3` and `iCyl3minus` is `I1.0`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use self::error::UnrecognizedSignal;
use crate::actuator_id::ActuatorId;
use crate::state_machine::actuator::{ActuatorKind, CommandedState};
use crate::symbol_path;

pub mod error;

/// Bits occupied by one cylinder + motor group.
pub const SIGNALS_PER_GROUP: u8 = 3;
/// Groups packed into one byte of the I/O image.
pub const GROUPS_PER_BYTE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IoArea {
    Input,
    Output,
}

/// Position of a signal in the controller's byte oriented I/O image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IoAddress {
    pub area: IoArea,
    pub byte: usize,
    pub bit: u8,
}

impl IoAddress {
    /// Address of `slot` within the 0-based `group_index`.
    pub fn in_group(area: IoArea, group_index: usize, slot: u8) -> Self {
        Self {
            area,
            byte: group_index / GROUPS_PER_BYTE,
            bit: (group_index % GROUPS_PER_BYTE) as u8 * SIGNALS_PER_GROUP + slot,
        }
    }
}

impl fmt::Display for IoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let area = match self.area {
            IoArea::Input => 'I',
            IoArea::Output => 'Q',
        };
        write!(f, "{area}{}.{}", self.byte, self.bit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorRole {
    CylinderMinus,
    CylinderPlus,
    MotorRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandRole {
    CylinderToMinus,
    CylinderToPlus,
    MotorStart,
}

impl CommandRole {
    /// The command carried by a change of this signal to `value`.
    ///
    /// Releasing a cylinder direction carries no command, the cylinder simply stays where it is.
    /// A motor's start signal is the only one with meaning on both edges.
    pub fn command_for(self, value: bool) -> Option<CommandedState> {
        match (self, value) {
            (CommandRole::CylinderToMinus, true) => Some(CommandedState::ToMinus),
            (CommandRole::CylinderToPlus, true) => Some(CommandedState::ToPlus),
            (CommandRole::CylinderToMinus | CommandRole::CylinderToPlus, false) => None,
            (CommandRole::MotorStart, true) => Some(CommandedState::Start),
            (CommandRole::MotorStart, false) => Some(CommandedState::Stop),
        }
    }
}

/// A sensor written to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSignal {
    pub name: Arc<str>,
    pub address: IoAddress,
    pub actuator_id: ActuatorId,
    pub role: SensorRole,
}

/// A command read from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSignal {
    pub name: Arc<str>,
    pub address: IoAddress,
    pub actuator_id: ActuatorId,
    pub role: CommandRole,
}

/// A resolved controller command, consumed exactly once by the output listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    pub actuator_id: ActuatorId,
    pub commanded_state: CommandedState,
    pub timestamp: SystemTime,
}

/// Every actuator of the plant together with its input and output signals.
#[derive(Debug)]
pub struct SignalCatalog {
    actuators: Vec<(ActuatorId, ActuatorKind)>,
    inputs: Vec<InputSignal>,
    outputs: Vec<OutputSignal>,
    output_index: HashMap<Arc<str>, usize, ahash::RandomState>,
}

impl SignalCatalog {
    /// Build the catalog for `groups` cylinder + motor groups, qualifying every symbol with
    /// `prefix` (e.g. `MAIN`). An empty prefix leaves the symbols unqualified.
    pub fn new(groups: usize, prefix: &str) -> Self {
        let mut actuators = Vec::with_capacity(groups * 2);
        let mut inputs = Vec::with_capacity(groups * SIGNALS_PER_GROUP as usize);
        let mut outputs = Vec::with_capacity(groups * SIGNALS_PER_GROUP as usize);

        for index in 0..groups {
            let group = index + 1;
            let cylinder = ActuatorId::cylinder(group);
            let motor = ActuatorId::motor(group);

            let sensors = [
                (format!("iCyl{group}minus"), &cylinder, SensorRole::CylinderMinus),
                (format!("iCyl{group}plus"), &cylinder, SensorRole::CylinderPlus),
                (format!("iMot{group}running"), &motor, SensorRole::MotorRunning),
            ];
            for (slot, (symbol, actuator_id, role)) in sensors.into_iter().enumerate() {
                inputs.push(InputSignal {
                    name: symbol_path(prefix, &symbol).into(),
                    address: IoAddress::in_group(IoArea::Input, index, slot as u8),
                    actuator_id: *actuator_id,
                    role,
                });
            }

            let commands = [
                (format!("qCyl{group}toMinus"), &cylinder, CommandRole::CylinderToMinus),
                (format!("qCyl{group}toPlus"), &cylinder, CommandRole::CylinderToPlus),
                (format!("qMot{group}start"), &motor, CommandRole::MotorStart),
            ];
            for (slot, (symbol, actuator_id, role)) in commands.into_iter().enumerate() {
                outputs.push(OutputSignal {
                    name: symbol_path(prefix, &symbol).into(),
                    address: IoAddress::in_group(IoArea::Output, index, slot as u8),
                    actuator_id: *actuator_id,
                    role,
                });
            }

            actuators.push((cylinder, ActuatorKind::Cylinder));
            actuators.push((motor, ActuatorKind::Motor));
        }

        let output_index = outputs
            .iter()
            .enumerate()
            .map(|(index, signal)| (Arc::clone(&signal.name), index))
            .collect();

        Self {
            actuators,
            inputs,
            outputs,
            output_index,
        }
    }

    pub fn actuators(&self) -> &[(ActuatorId, ActuatorKind)] {
        &self.actuators
    }

    /// Sensor signals in I/O image order.
    pub fn inputs(&self) -> &[InputSignal] {
        &self.inputs
    }

    /// Command signals in I/O image order.
    pub fn outputs(&self) -> &[OutputSignal] {
        &self.outputs
    }

    /// The names to subscribe to for command notifications.
    pub fn output_names(&self) -> Vec<String> {
        self.outputs
            .iter()
            .map(|signal| signal.name.to_string())
            .collect()
    }

    pub fn output(&self, name: &str) -> Result<&OutputSignal, UnrecognizedSignal> {
        self.output_index
            .get(name)
            .map(|&index| &self.outputs[index])
            .ok_or_else(|| UnrecognizedSignal {
                name: name.to_string(),
            })
    }

    /// Turn a change of output `name` to `value` into a [`CommandEvent`].
    ///
    /// `Ok(None)` means the change is known but carries no command.
    pub fn resolve(
        &self,
        name: &str,
        value: bool,
        timestamp: SystemTime,
    ) -> Result<Option<CommandEvent>, UnrecognizedSignal> {
        let signal = self.output(name)?;

        Ok(signal
            .role
            .command_for(value)
            .map(|commanded_state| CommandEvent {
                actuator_id: signal.actuator_id,
                commanded_state,
                timestamp,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_address(catalog: &SignalCatalog, name: &str) -> String {
        catalog
            .inputs()
            .iter()
            .find(|signal| &*signal.name == name)
            .map(|signal| signal.address.to_string())
            .unwrap()
    }

    #[test]
    fn test_standard_layout() {
        let catalog = SignalCatalog::new(4, "MAIN");

        assert_eq!(catalog.actuators().len(), 8);
        assert_eq!(catalog.inputs().len(), 12);
        assert_eq!(catalog.outputs().len(), 12);

        assert_eq!(input_address(&catalog, "MAIN.iCyl1minus"), "I0.0");
        assert_eq!(input_address(&catalog, "MAIN.iCyl1plus"), "I0.1");
        assert_eq!(input_address(&catalog, "MAIN.iMot1running"), "I0.2");
        assert_eq!(input_address(&catalog, "MAIN.iCyl2minus"), "I0.3");
        assert_eq!(input_address(&catalog, "MAIN.iMot2running"), "I0.5");
        assert_eq!(input_address(&catalog, "MAIN.iCyl3minus"), "I1.0");
        assert_eq!(input_address(&catalog, "MAIN.iMot4running"), "I1.5");

        let start = catalog.output("MAIN.qMot4start").unwrap();
        assert_eq!(start.address.to_string(), "Q1.5");
        assert_eq!(start.actuator_id, ActuatorId::motor(4));

        let to_plus = catalog.output("MAIN.qCyl2toPlus").unwrap();
        assert_eq!(to_plus.address.to_string(), "Q0.4");
    }

    #[test]
    fn test_unprefixed_symbols() {
        let catalog = SignalCatalog::new(1, "");

        assert_eq!(
            catalog.output_names(),
            vec!["qCyl1toMinus", "qCyl1toPlus", "qMot1start"]
        );
    }

    #[test]
    fn test_resolve_edges() {
        let catalog = SignalCatalog::new(4, "MAIN");
        let now = SystemTime::now();

        let event = catalog.resolve("MAIN.qCyl3toMinus", true, now).unwrap().unwrap();
        assert_eq!(event.actuator_id, ActuatorId::cylinder(3));
        assert_eq!(event.commanded_state, CommandedState::ToMinus);

        // Releasing a cylinder direction is not a command
        assert!(catalog.resolve("MAIN.qCyl3toMinus", false, now).unwrap().is_none());

        let stop = catalog.resolve("MAIN.qMot1start", false, now).unwrap().unwrap();
        assert_eq!(stop.commanded_state, CommandedState::Stop);
    }

    #[test]
    fn test_unrecognized_signal() {
        let catalog = SignalCatalog::new(4, "MAIN");

        let err = catalog
            .resolve("MAIN.qCyl5toPlus", true, SystemTime::now())
            .unwrap_err();
        assert_eq!(err.name, "MAIN.qCyl5toPlus");

        // Inputs are not commands
        assert!(catalog.output("MAIN.iCyl1minus").is_err());
    }
}
