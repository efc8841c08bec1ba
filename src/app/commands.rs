//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (companion
//! module, service menu, test harness) that the
//! [`AppService`](super::service::AppService) interprets and acts upon.

use crate::config::SystemConfig;
use crate::drivers::outputs::Output;
use crate::sensors::SensorChannel;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Request an output state. Heater requests are held back while a
    /// gating fault is active and applied once it clears.
    SetOutput { output: Output, on: bool },

    /// Withdraw every output request and drive all outputs low.
    AllOff,

    /// Store an explicit offset for a channel.
    SetCalibrationOffset { channel: SensorChannel, offset: f32 },

    /// Single-point calibration: the offset that makes the latest
    /// uncorrected reading equal `reference`.
    CalibrateAgainstReference { channel: SensorChannel, reference: f32 },

    /// Drop a channel's offset.
    ClearCalibration(SensorChannel),

    /// Acknowledge a heater stall so the SSR may be driven again.
    ClearHeaterStall,

    /// Hot-reload configuration; rebuilds the converters.
    UpdateConfig(SystemConfig),

    /// Explicitly persist the current config immediately.
    SaveConfig,
}
