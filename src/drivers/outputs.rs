//! Logic-level outputs: relays K1–K4, boiler SSR triggers, status LED and
//! buzzer.
//!
//! Every output is active-high and defaults low. The bank is a dumb
//! actuator; which outputs may actually go high is decided by the safety
//! supervisor in the application service.

use embedded_hal::digital::OutputPin;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::app::ports::ActuatorPort;
use crate::error::ActuatorError;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Output {
    /// K2, vibratory pump.
    PumpRelay,
    /// K3, 3-way brew solenoid.
    BrewSolenoid,
    /// K1, water-level indicator LED.
    WaterLed,
    /// K4, unassigned.
    SpareRelay,
    BrewSsr,
    SteamSsr,
    StatusLed,
    Buzzer,
}

impl Output {
    pub const COUNT: usize = 8;

    pub const ALL: [Self; Self::COUNT] = [
        Self::PumpRelay,
        Self::BrewSolenoid,
        Self::WaterLed,
        Self::SpareRelay,
        Self::BrewSsr,
        Self::SteamSsr,
        Self::StatusLed,
        Self::Buzzer,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn gpio(self) -> u8 {
        match self {
            Self::PumpRelay => pins::RELAY_PUMP_GPIO,
            Self::BrewSolenoid => pins::RELAY_BREW_SOLENOID_GPIO,
            Self::WaterLed => pins::RELAY_WATER_LED_GPIO,
            Self::SpareRelay => pins::RELAY_SPARE_GPIO,
            Self::BrewSsr => pins::SSR_BREW_GPIO,
            Self::SteamSsr => pins::SSR_STEAM_GPIO,
            Self::StatusLed => pins::STATUS_LED_GPIO,
            Self::Buzzer => pins::BUZZER_GPIO,
        }
    }

    /// Boiler heater SSR.
    pub const fn is_heater(self) -> bool {
        matches!(self, Self::BrewSsr | Self::SteamSsr)
    }
}

impl core::fmt::Display for Output {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::PumpRelay => "pump relay",
            Self::BrewSolenoid => "brew solenoid",
            Self::WaterLed => "water LED",
            Self::SpareRelay => "spare relay",
            Self::BrewSsr => "brew SSR",
            Self::SteamSsr => "steam SSR",
            Self::StatusLed => "status LED",
            Self::Buzzer => "buzzer",
        };
        f.write_str(name)
    }
}

/// Output pins indexed by [`Output::index`]. Pins are type-erased on the
/// board so they fit one array.
pub struct GpioOutputBank<P> {
    pins: [P; Output::COUNT],
    on: [bool; Output::COUNT],
}

impl<P: OutputPin> GpioOutputBank<P> {
    /// Take ownership of the pins and drive them all low. The pin level is
    /// unknown until a write succeeds, so a pin that refuses `set_low` here
    /// keeps reporting on.
    pub fn new(pins: [P; Output::COUNT]) -> Self {
        let mut bank = Self {
            pins,
            on: [true; Output::COUNT],
        };
        if let Err(e) = bank.all_off() {
            warn!("output bank init: {e}");
        }
        bank
    }

    pub fn is_on(&self, output: Output) -> bool {
        self.on[output.index()]
    }
}

impl<P: OutputPin> ActuatorPort for GpioOutputBank<P> {
    fn set_output(&mut self, output: Output, on: bool) -> Result<(), ActuatorError> {
        let pin = &mut self.pins[output.index()];
        let res = if on { pin.set_high() } else { pin.set_low() };
        res.map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.on[output.index()] = on;
        Ok(())
    }
}
