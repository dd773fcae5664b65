//! The seam between the simulator and the automation controller.
//!
//! The simulator only needs three things from a controller connection: write a named boolean,
//! subscribe to changes of named booleans, and read the runtime state. [`ads`] talks to a real
//! TwinCAT runtime, [`loopback`] runs a controller in-process.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use futures::Stream;

use self::config::ConnectionConfig;
use self::error::ControllerError;

pub mod ads;
pub mod config;
pub mod error;
pub mod loopback;

/// One change of a subscribed symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub name: String,
    pub value: bool,
    pub timestamp: SystemTime,
}

/// Change notifications, ending when the connection drops.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Notification> + Send>>;

/// Runtime state of the controller, numbered as ADS reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerState {
    Invalid,
    Idle,
    Reset,
    Init,
    Start,
    Run,
    Stop,
    SaveConfig,
    LoadConfig,
    PowerFailure,
    PowerGood,
    Error,
    Shutdown,
    Suspend,
    Resume,
    Config,
    Reconfig,
    Unknown(u16),
}

impl ControllerState {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => Self::Invalid,
            1 => Self::Idle,
            2 => Self::Reset,
            3 => Self::Init,
            4 => Self::Start,
            5 => Self::Run,
            6 => Self::Stop,
            7 => Self::SaveConfig,
            8 => Self::LoadConfig,
            9 => Self::PowerFailure,
            10 => Self::PowerGood,
            11 => Self::Error,
            12 => Self::Shutdown,
            13 => Self::Suspend,
            14 => Self::Resume,
            15 => Self::Config,
            16 => Self::Reconfig,
            other => Self::Unknown(other),
        }
    }

    pub fn is_running(self) -> bool {
        self == Self::Run
    }
}

/// An open connection to a controller.
pub trait Controller: Send + Sync + 'static {
    /// Read the runtime state of the controller.
    fn read_state(&self) -> impl Future<Output = Result<ControllerState, ControllerError>> + Send;

    /// Write `value` to the boolean symbol `name`.
    fn write_bool(
        &self,
        name: &str,
        value: bool,
    ) -> impl Future<Output = Result<(), ControllerError>> + Send;

    /// Subscribe to changes of the boolean symbols `names`.
    ///
    /// The stream first yields the current value of every symbol, then one notification per
    /// change.
    fn subscribe(
        &self,
        names: &[String],
    ) -> impl Future<Output = Result<NotificationStream, ControllerError>> + Send;
}

/// Opens controller connections from a [`ConnectionConfig`].
pub trait Connector: Send + Sync + 'static {
    type Controller: Controller;

    fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> impl Future<Output = Result<Arc<Self::Controller>, ControllerError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        assert_eq!(ControllerState::from_code(5), ControllerState::Run);
        assert!(ControllerState::from_code(5).is_running());
        assert!(!ControllerState::from_code(6).is_running());
        assert_eq!(ControllerState::from_code(42), ControllerState::Unknown(42));
    }
}
