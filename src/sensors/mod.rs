//! Sensor subsystem: per-channel converters and the aggregating [`SensorHub`].
//!
//! The hub owns every converter, filter and debouncer and produces one
//! [`SensorSnapshot`] per poll. Raw samples come in through the
//! [`AdcPort`] and [`LevelInputPort`] traits so the same code runs against
//! the RP2354 peripherals and the host simulator.

pub mod adc;
pub mod filter;
pub mod health;
pub mod level;
pub mod pressure;
pub mod thermistor;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::app::ports::{AdcPort, LevelInputPort};
use crate::calibration::CalibrationStore;
use crate::config::SystemConfig;
use crate::error::SensorFault;
use crate::pins;
use filter::{BREW_FILTER_LEN, MovingAverage, PRESSURE_FILTER_LEN, STEAM_FILTER_LEN};
use health::{ChannelHealth, HealthTransition};
use level::{LevelDetector, LevelState};
use pressure::PressureConverter;
use thermistor::ThermistorConverter;

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorChannel {
    BrewNtc,
    SteamNtc,
    Pressure,
}

impl SensorChannel {
    pub const ALL: [Self; 3] = [Self::BrewNtc, Self::SteamNtc, Self::Pressure];

    /// Stable index used for offset tables and failure counters.
    pub const fn index(self) -> usize {
        match self {
            Self::BrewNtc => 0,
            Self::SteamNtc => 1,
            Self::Pressure => 2,
        }
    }

    pub const fn gpio(self) -> u8 {
        match self {
            Self::BrewNtc => pins::BREW_NTC_GPIO,
            Self::SteamNtc => pins::STEAM_NTC_GPIO,
            Self::Pressure => pins::PRESSURE_GPIO,
        }
    }

    /// ADC mux input (ADC0..ADC2).
    pub const fn adc_input(self) -> u8 {
        self.gpio() - pins::ADC_GPIO_BASE
    }

    pub const fn is_temperature(self) -> bool {
        !matches!(self, Self::Pressure)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::BrewNtc => "brew NTC",
            Self::SteamNtc => "steam NTC",
            Self::Pressure => "pressure",
        }
    }
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReading {
    pub raw: u16,
    /// Beta-model value before the calibration offset.
    pub uncorrected_c: f32,
    pub celsius: f32,
    /// Moving average of `celsius`.
    pub filtered_c: f32,
    pub calibrated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureReading {
    pub raw: u16,
    pub sensor_volts: f32,
    pub uncorrected_bar: f32,
    pub bar: f32,
    pub filtered_bar: f32,
    pub calibrated: bool,
}

/// Result of one poll of every channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSnapshot {
    pub brew: Result<TemperatureReading, SensorFault>,
    pub steam: Result<TemperatureReading, SensorFault>,
    pub pressure: Result<PressureReading, SensorFault>,
    /// Debounced level state.
    pub level: LevelState,
    /// Raw probe sample this poll (`true` also for a failed GPIO read).
    pub level_probe_high: bool,
    /// Indexed by [`SensorChannel::index`].
    pub consecutive_failures: [u16; 3],
}

impl SensorSnapshot {
    /// State before the first poll.
    pub const fn unread() -> Self {
        Self {
            brew: Err(SensorFault::NotSampled),
            steam: Err(SensorFault::NotSampled),
            pressure: Err(SensorFault::NotSampled),
            level: LevelState::Below,
            level_probe_high: true,
            consecutive_failures: [0; 3],
        }
    }

    pub fn temperature(&self, channel: SensorChannel) -> Option<&Result<TemperatureReading, SensorFault>> {
        match channel {
            SensorChannel::BrewNtc => Some(&self.brew),
            SensorChannel::SteamNtc => Some(&self.steam),
            SensorChannel::Pressure => None,
        }
    }

    /// Fault on `channel`, if any.
    pub fn fault(&self, channel: SensorChannel) -> Option<SensorFault> {
        match channel {
            SensorChannel::BrewNtc => self.brew.err(),
            SensorChannel::SteamNtc => self.steam.err(),
            SensorChannel::Pressure => self.pressure.err(),
        }
    }

    /// Latest reading before calibration, in the channel's unit.
    pub fn uncorrected(&self, channel: SensorChannel) -> Result<f32, SensorFault> {
        match channel {
            SensorChannel::BrewNtc => self.brew.map(|r| r.uncorrected_c),
            SensorChannel::SteamNtc => self.steam.map(|r| r.uncorrected_c),
            SensorChannel::Pressure => self.pressure.map(|r| r.uncorrected_bar),
        }
    }
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self::unread()
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

pub struct SensorHub {
    brew: ThermistorConverter,
    steam: ThermistorConverter,
    pressure: PressureConverter,
    level: LevelDetector,
    brew_filter: MovingAverage<BREW_FILTER_LEN>,
    steam_filter: MovingAverage<STEAM_FILTER_LEN>,
    pressure_filter: MovingAverage<PRESSURE_FILTER_LEN>,
    health: [ChannelHealth; 3],
    transitions: [HealthTransition; 3],
    error_threshold: u16,
    snapshot: SensorSnapshot,
}

impl SensorHub {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            brew: ThermistorConverter::new(config.adc, &config.brew),
            steam: ThermistorConverter::new(config.adc, &config.steam),
            pressure: PressureConverter::new(config.adc, &config.pressure),
            level: LevelDetector::new(config.level),
            brew_filter: MovingAverage::new(),
            steam_filter: MovingAverage::new(),
            pressure_filter: MovingAverage::new(),
            health: [
                ChannelHealth::new(SensorChannel::BrewNtc.name()),
                ChannelHealth::new(SensorChannel::SteamNtc.name()),
                ChannelHealth::new(SensorChannel::Pressure.name()),
            ],
            transitions: [HealthTransition::None; 3],
            error_threshold: config.sensor_error_threshold,
            snapshot: SensorSnapshot::unread(),
        }
    }

    /// Rebuild converters from a new config. Filter history is dropped
    /// because old samples were produced by different parameters; the
    /// debounced level and failure counts carry over.
    pub fn reconfigure(&mut self, config: &SystemConfig) {
        self.brew = ThermistorConverter::new(config.adc, &config.brew);
        self.steam = ThermistorConverter::new(config.adc, &config.steam);
        self.pressure = PressureConverter::new(config.adc, &config.pressure);
        self.level.set_config(config.level);
        self.brew_filter.clear();
        self.steam_filter.clear();
        self.pressure_filter.clear();
        self.error_threshold = config.sensor_error_threshold;
    }

    pub fn brew_converter(&self) -> &ThermistorConverter {
        &self.brew
    }

    pub fn steam_converter(&self) -> &ThermistorConverter {
        &self.steam
    }

    pub fn pressure_converter(&self) -> &PressureConverter {
        &self.pressure
    }

    pub fn snapshot(&self) -> &SensorSnapshot {
        &self.snapshot
    }

    /// Health changes produced by the most recent [`read_all`](Self::read_all).
    pub fn transitions(&self) -> &[HealthTransition; 3] {
        &self.transitions
    }

    /// Sample and convert every channel once.
    pub fn read_all(
        &mut self,
        hw: &mut (impl AdcPort + LevelInputPort),
        cal: &CalibrationStore,
    ) -> SensorSnapshot {
        let offsets = cal.table();

        let brew = read_temperature(
            hw,
            SensorChannel::BrewNtc,
            &self.brew,
            &mut self.brew_filter,
            offsets.get(SensorChannel::BrewNtc),
        );
        let steam = read_temperature(
            hw,
            SensorChannel::SteamNtc,
            &self.steam,
            &mut self.steam_filter,
            offsets.get(SensorChannel::SteamNtc),
        );
        let pressure = read_pressure(
            hw,
            &self.pressure,
            &mut self.pressure_filter,
            offsets.get(SensorChannel::Pressure),
        );

        // A failed GPIO read is indistinguishable from a dry probe.
        let level_probe_high = hw.level_probe_high().unwrap_or(true);
        let level = self.level.update(level_probe_high);

        let threshold = self.error_threshold;
        self.transitions = [
            self.health[0].record(&brew, threshold),
            self.health[1].record(&steam, threshold),
            self.health[2].record(&pressure, threshold),
        ];

        self.snapshot = SensorSnapshot {
            brew,
            steam,
            pressure,
            level,
            level_probe_high,
            consecutive_failures: [
                self.health[0].consecutive_failures(),
                self.health[1].consecutive_failures(),
                self.health[2].consecutive_failures(),
            ],
        };
        self.snapshot
    }
}

fn read_temperature<const N: usize>(
    hw: &mut impl AdcPort,
    channel: SensorChannel,
    conv: &ThermistorConverter,
    filter: &mut MovingAverage<N>,
    offset: Option<f32>,
) -> Result<TemperatureReading, SensorFault> {
    let result = hw.read_raw(channel).and_then(|raw| {
        let uncorrected_c = conv.convert(raw)?;
        let celsius = conv.check_plausible(uncorrected_c + offset.unwrap_or(0.0))?;
        Ok((raw, uncorrected_c, celsius))
    });
    match result {
        Ok((raw, uncorrected_c, celsius)) => Ok(TemperatureReading {
            raw,
            uncorrected_c,
            celsius,
            filtered_c: filter.push(celsius),
            calibrated: offset.is_some(),
        }),
        Err(fault) => {
            filter.clear();
            Err(fault)
        }
    }
}

fn read_pressure<const N: usize>(
    hw: &mut impl AdcPort,
    conv: &PressureConverter,
    filter: &mut MovingAverage<N>,
    offset: Option<f32>,
) -> Result<PressureReading, SensorFault> {
    let result = hw.read_raw(SensorChannel::Pressure).and_then(|raw| {
        let sensor_volts = conv.sensor_volts(raw)?;
        let uncorrected_bar = conv.convert(raw)?;
        Ok((raw, sensor_volts, uncorrected_bar))
    });
    match result {
        Ok((raw, sensor_volts, uncorrected_bar)) => {
            let bar = uncorrected_bar + offset.unwrap_or(0.0);
            Ok(PressureReading {
                raw,
                sensor_volts,
                uncorrected_bar,
                bar,
                filtered_bar: filter.push(bar),
                calibrated: offset.is_some(),
            })
        }
        Err(fault) => {
            filter.clear();
            Err(fault)
        }
    }
}
