//! Unified error types for the BrewOS sensor core.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! poll loop's error handling uniform. The sensor and safety fault enums are
//! `Copy` so they travel inside every [`SensorSnapshot`](crate::sensors::SensorSnapshot)
//! without allocation.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    /// An output pin could not be driven.
    Actuator(ActuatorError),
    /// A calibration offset was rejected or could not be persisted.
    Calibration(CalibrationError),
    /// Configuration is invalid or could not be loaded/saved.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Calibration(e) => write!(f, "calibration: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor faults
// ---------------------------------------------------------------------------

/// Why a channel produced no value this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFault {
    /// The channel has not been polled yet.
    NotSampled,
    /// The ADC driver reported a read error.
    AdcReadFailed,
    /// The level-probe input pin could not be read.
    GpioReadFailed,
    /// Raw count exceeds the converter's full-scale value.
    InvalidCount,
    /// NTC divider reads the reference voltage (thermistor disconnected).
    OpenCircuit,
    /// NTC divider reads zero volts (thermistor or wiring shorted).
    ShortCircuit,
    /// Converted value is outside the physically plausible range.
    Implausible,
    /// Pressure transducer output below its 0.5 V live-zero.
    BrokenWire,
    /// Pressure transducer output above its 4.5 V full-scale.
    OverRange,
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSampled => write!(f, "not sampled"),
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
            Self::InvalidCount => write!(f, "ADC count out of range"),
            Self::OpenCircuit => write!(f, "open circuit"),
            Self::ShortCircuit => write!(f, "short circuit"),
            Self::Implausible => write!(f, "implausible reading"),
            Self::BrokenWire => write!(f, "broken wire"),
            Self::OverRange => write!(f, "over range"),
        }
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Safety faults are accumulated in a bitfield by the safety supervisor so
/// that multiple simultaneous faults can be tracked and individually cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// Brew boiler NTC reads open, short or implausible.
    BrewNtcFault = 0b0000_0001,
    /// Steam boiler NTC reads open, short or implausible.
    SteamNtcFault = 0b0000_0010,
    /// Pressure transducer wiring fault.
    PressureFault = 0b0000_0100,
    /// Steam boiler water below the level probe.
    LevelUnsafe = 0b0000_1000,
    /// Brew boiler at or above its cutoff; clears below the hysteresis band.
    BrewOverTemp = 0b0001_0000,
    /// Steam boiler at or above its cutoff; clears below the hysteresis band.
    SteamOverTemp = 0b0010_0000,
    /// Brew SSR held on without the boiler warming. Latched.
    BrewHeaterStall = 0b0100_0000,
    /// Steam SSR held on without the boiler warming. Latched.
    SteamHeaterStall = 0b1000_0000,
}

impl SafetyFault {
    pub const ALL: [Self; 8] = [
        Self::BrewNtcFault,
        Self::SteamNtcFault,
        Self::PressureFault,
        Self::LevelUnsafe,
        Self::BrewOverTemp,
        Self::SteamOverTemp,
        Self::BrewHeaterStall,
        Self::SteamHeaterStall,
    ];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }

    /// Latched faults stay set until explicitly cleared.
    pub const fn is_latched(self) -> bool {
        matches!(self, Self::BrewHeaterStall | Self::SteamHeaterStall)
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BrewNtcFault => write!(f, "brew NTC fault"),
            Self::SteamNtcFault => write!(f, "steam NTC fault"),
            Self::PressureFault => write!(f, "pressure sensor fault"),
            Self::LevelUnsafe => write!(f, "water below level probe"),
            Self::BrewOverTemp => write!(f, "brew boiler over temperature"),
            Self::SteamOverTemp => write!(f, "steam boiler over temperature"),
            Self::BrewHeaterStall => write!(f, "brew SSR on without temperature rise"),
            Self::SteamHeaterStall => write!(f, "steam SSR on without temperature rise"),
        }
    }
}

// ---------------------------------------------------------------------------
// Calibration errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum CalibrationError {
    /// Offset or reference value is NaN or infinite.
    NotFinite,
    /// Offset magnitude exceeds the channel's plausible bound.
    OutOfBounds { bound: f32 },
    /// No valid reading to compare the reference against.
    NoReading(SensorFault),
    /// The offset could not be persisted.
    Storage(StorageError),
    /// The stored record failed its magic, version or CRC check.
    Corrupted,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFinite => write!(f, "value not finite"),
            Self::OutOfBounds { bound } => write!(f, "offset exceeds ±{bound}"),
            Self::NoReading(fault) => write!(f, "no valid reading ({fault})"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Corrupted => write!(f, "stored record corrupted"),
        }
    }
}

impl From<CalibrationError> for Error {
    fn from(e: CalibrationError) -> Self {
        Self::Calibration(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
