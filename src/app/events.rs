//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them: log to serial, forward to the
//! companion module, record in a test.

use crate::error::SensorFault;
use crate::sensors::SensorChannel;
use crate::sensors::level::LevelState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The application service has started.
    Started,

    /// Channel has no calibration offset; readings carry the ADC leakage bias.
    Uncalibrated(SensorChannel),

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),

    /// The fault bitmask gained one or more bits (carries the full mask).
    FaultDetected(u8),

    /// All safety faults have been cleared.
    FaultCleared,

    /// A channel reached the consecutive-failure threshold.
    SensorFault {
        channel: SensorChannel,
        fault: SensorFault,
    },

    /// A channel produced a good reading after having tripped.
    SensorRecovered(SensorChannel),

    /// Debounced steam level changed.
    LevelChanged(LevelState),

    /// Offset stored (`None` = cleared).
    CalibrationUpdated {
        channel: SensorChannel,
        offset: Option<f32>,
    },

    /// Runtime configuration replaced.
    ConfigUpdated,
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
/// Faulted channels read `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryData {
    pub brew_c: Option<f32>,
    pub steam_c: Option<f32>,
    pub pressure_bar: Option<f32>,
    pub level: LevelState,
    pub fault_flags: u8,
    /// Bit per [`Output::index`](crate::drivers::outputs::Output::index).
    pub outputs_on: u8,
    pub calibrated: [bool; 3],
}
