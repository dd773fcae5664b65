use std::fmt;
use std::str::FromStr;

use crate::state_machine::actuator::ActuatorKind;

/// Identifies a simulated actuator by its kind and 1-based I/O group.
///
/// Displays as `cyl{group}` or `mot{group}`, the names the controller program uses.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ActuatorId {
    kind: ActuatorKind,
    group: usize,
}

impl ActuatorId {
    pub const fn cylinder(group: usize) -> Self {
        Self {
            kind: ActuatorKind::Cylinder,
            group,
        }
    }

    pub const fn motor(group: usize) -> Self {
        Self {
            kind: ActuatorKind::Motor,
            group,
        }
    }

    pub const fn kind(&self) -> ActuatorKind {
        self.kind
    }

    pub const fn group(&self) -> usize {
        self.group
    }

    const fn tag(kind: ActuatorKind) -> &'static str {
        match kind {
            ActuatorKind::Cylinder => "cyl",
            ActuatorKind::Motor => "mot",
        }
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::tag(self.kind), self.group)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not an actuator id, expected cyl<group> or mot<group>")]
pub struct InvalidActuatorId(String);

impl FromStr for ActuatorId {
    type Err = InvalidActuatorId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidActuatorId(s.to_string());

        let (kind, group) = if let Some(group) = s.strip_prefix(Self::tag(ActuatorKind::Cylinder)) {
            (ActuatorKind::Cylinder, group)
        } else if let Some(group) = s.strip_prefix(Self::tag(ActuatorKind::Motor)) {
            (ActuatorKind::Motor, group)
        } else {
            return Err(invalid());
        };

        match group.parse::<usize>() {
            Ok(group) if group > 0 => Ok(Self { kind, group }),
            _ => Err(invalid()),
        }
    }
}
