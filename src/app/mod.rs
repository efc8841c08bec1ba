//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the poll loop for the BrewOS sensor core: sensor
//! conversion, safety evaluation, output gating and calibration commands.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
