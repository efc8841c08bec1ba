//! BrewOS sensor core for the ECM Synchronika retrofit board.
//!
//! Converts raw ADC counts and the level-probe input into calibrated,
//! fault-checked readings, derives the heater interlocks from them, and
//! gates the relay/SSR outputs accordingly. Hardware is reached only
//! through the traits in [`app::ports`], so everything here runs on the
//! host against [`adapters::sim::SimBoard`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod calibration;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod safety;
pub mod sensors;
