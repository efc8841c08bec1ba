//! Actuator drivers.

pub mod outputs;
