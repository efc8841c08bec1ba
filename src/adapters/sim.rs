//! Simulated ECM board for host runs and tests.
//!
//! Sensor inputs are set in engineering units and turned into the ADC
//! counts the real dividers would produce, using the inverse converters
//! built from the same [`SystemConfig`]. Outputs are recorded rather than
//! driven.
//!
//! Inputs and recorded outputs live in atomics, so setters and observers
//! only need `&self`.

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use crate::app::ports::{ActuatorPort, AdcPort, LevelInputPort, WatchdogPort};
use crate::config::SystemConfig;
use crate::drivers::outputs::Output;
use crate::error::{ActuatorError, SensorFault};
use crate::sensors::SensorChannel;
use crate::sensors::pressure::PressureConverter;
use crate::sensors::thermistor::ThermistorConverter;

pub struct SimBoard {
    brew: ThermistorConverter,
    steam: ThermistorConverter,
    pressure: PressureConverter,
    raw: [AtomicU16; 3],
    adc_fail: [AtomicBool; 3],
    level_high: AtomicBool,
    level_fail: AtomicBool,
    outputs: [AtomicBool; Output::COUNT],
    output_fail: [AtomicBool; Output::COUNT],
    writes: AtomicU32,
    feeds: AtomicU32,
}

impl SimBoard {
    /// Board at room temperature, no pressure, probe dry.
    pub fn new(config: &SystemConfig) -> Self {
        let brew = ThermistorConverter::new(config.adc, &config.brew);
        let steam = ThermistorConverter::new(config.adc, &config.steam);
        let pressure = PressureConverter::new(config.adc, &config.pressure);
        Self {
            raw: [
                AtomicU16::new(brew.count_for_celsius(25.0)),
                AtomicU16::new(steam.count_for_celsius(25.0)),
                AtomicU16::new(pressure.count_for_bar(0.0)),
            ],
            brew,
            steam,
            pressure,
            adc_fail: [const { AtomicBool::new(false) }; 3],
            level_high: AtomicBool::new(true),
            level_fail: AtomicBool::new(false),
            outputs: [const { AtomicBool::new(false) }; Output::COUNT],
            output_fail: [const { AtomicBool::new(false) }; Output::COUNT],
            writes: AtomicU32::new(0),
            feeds: AtomicU32::new(0),
        }
    }

    // ── Inputs ────────────────────────────────────────────────

    pub fn set_raw(&self, channel: SensorChannel, count: u16) {
        self.raw[channel.index()].store(count, Ordering::Relaxed);
    }

    pub fn set_brew_raw(&self, count: u16) {
        self.set_raw(SensorChannel::BrewNtc, count);
    }

    pub fn set_brew_celsius(&self, celsius: f32) {
        self.set_raw(SensorChannel::BrewNtc, self.brew.count_for_celsius(celsius));
    }

    pub fn set_steam_celsius(&self, celsius: f32) {
        self.set_raw(SensorChannel::SteamNtc, self.steam.count_for_celsius(celsius));
    }

    pub fn set_pressure_bar(&self, bar: f32) {
        self.set_raw(SensorChannel::Pressure, self.pressure.count_for_bar(bar));
    }

    /// `true` = probe dry (comparator HIGH).
    pub fn set_level_probe_high(&self, high: bool) {
        self.level_high.store(high, Ordering::Relaxed);
    }

    pub fn fail_adc(&self, channel: SensorChannel, fail: bool) {
        self.adc_fail[channel.index()].store(fail, Ordering::Relaxed);
    }

    pub fn fail_level_probe(&self, fail: bool) {
        self.level_fail.store(fail, Ordering::Relaxed);
    }

    pub fn fail_output(&self, output: Output, fail: bool) {
        self.output_fail[output.index()].store(fail, Ordering::Relaxed);
    }

    // ── Observations ─────────────────────────────────────────

    pub fn is_on(&self, output: Output) -> bool {
        self.outputs[output.index()].load(Ordering::Relaxed)
    }

    /// Successful output writes so far.
    pub fn output_writes(&self) -> u32 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn watchdog_feeds(&self) -> u32 {
        self.feeds.load(Ordering::Relaxed)
    }
}

impl AdcPort for SimBoard {
    fn read_raw(&mut self, channel: SensorChannel) -> Result<u16, SensorFault> {
        if self.adc_fail[channel.index()].load(Ordering::Relaxed) {
            return Err(SensorFault::AdcReadFailed);
        }
        Ok(self.raw[channel.index()].load(Ordering::Relaxed))
    }
}

impl LevelInputPort for SimBoard {
    fn level_probe_high(&mut self) -> Result<bool, SensorFault> {
        if self.level_fail.load(Ordering::Relaxed) {
            return Err(SensorFault::GpioReadFailed);
        }
        Ok(self.level_high.load(Ordering::Relaxed))
    }
}

impl ActuatorPort for SimBoard {
    fn set_output(&mut self, output: Output, on: bool) -> Result<(), ActuatorError> {
        if self.output_fail[output.index()].load(Ordering::Relaxed) {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.outputs[output.index()].store(on, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl WatchdogPort for SimBoard {
    fn feed(&mut self) {
        self.feeds.fetch_add(1, Ordering::Relaxed);
    }
}
