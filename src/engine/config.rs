use std::time::Duration;

use bon::Builder;

use crate::state_machine::actuator::ActuatorKind;

/// Symbol prefix of the controller program's variables.
pub const DEFAULT_SYMBOL_PREFIX: &str = "MAIN";

/// Layout and timing of the simulated plant.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct SimConfig {
    /// Number of cylinder + motor groups.
    #[builder(default = 4)]
    pub groups: usize,

    /// Prefix the controller program's symbols are qualified with, e.g. `MAIN`.
    #[builder(default = DEFAULT_SYMBOL_PREFIX.to_string())]
    pub symbol_prefix: String,

    /// Period of the input publish loop.
    #[builder(default = Duration::from_millis(300))]
    pub publish_interval: Duration,

    #[builder(default = Duration::from_millis(1500))]
    pub cylinder_travel: Duration,

    #[builder(default = Duration::from_millis(3000))]
    pub motor_travel: Duration,

    /// If set, in-flight positions are updated at this period for rendering. Otherwise the
    /// position jumps to the target bound on completion.
    pub animation_frame: Option<Duration>,

    /// Capacity of the simulation event channel.
    #[builder(default = 256)]
    pub event_capacity: usize,
}

impl SimConfig {
    /// How long a full stroke takes for the given kind of actuator.
    pub fn travel_time(&self, kind: ActuatorKind) -> Duration {
        match kind {
            ActuatorKind::Cylinder => self.cylinder_travel,
            ActuatorKind::Motor => self.motor_travel,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
