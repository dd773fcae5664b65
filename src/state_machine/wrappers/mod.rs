//! Common wrappers to provide generic functionality to [`StateMachine`](super::StateMachine)
//! containers that inject system resources into otherwise pure state machines.

pub mod input;
