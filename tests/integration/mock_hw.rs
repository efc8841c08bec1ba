//! Mock hardware adapter for integration tests.
//!
//! Serves raw ADC counts and a probe level set by the test, and records
//! every output call and watchdog feed so tests can assert on the full
//! command history without touching real GPIO registers.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use brewos::app::events::AppEvent;
use brewos::app::ports::{
    ActuatorPort, AdcPort, ConfigError, ConfigPort, EventSink, LevelInputPort, StorageError,
    StoragePort, WatchdogPort,
};
use brewos::config::SystemConfig;
use brewos::drivers::outputs::Output;
use brewos::error::{ActuatorError, SensorFault};
use brewos::sensors::SensorChannel;
use brewos::sensors::pressure::PressureConverter;
use brewos::sensors::thermistor::ThermistorConverter;

// ── Output call record ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputCall {
    pub output: Output,
    pub on: bool,
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub raw: [u16; 3],
    pub adc_error: [bool; 3],
    /// `None` = GPIO read error.
    pub probe_high: Option<bool>,
    pub failing_output: Option<Output>,
    pub calls: Vec<OutputCall>,
    pub feeds: u32,
    brew: ThermistorConverter,
    steam: ThermistorConverter,
    pressure: PressureConverter,
}

#[allow(dead_code)]
impl MockHardware {
    /// Healthy machine at operating temperature with water over the probe.
    pub fn new(config: &SystemConfig) -> Self {
        let mut hw = Self {
            raw: [0; 3],
            adc_error: [false; 3],
            probe_high: Some(false),
            failing_output: None,
            calls: Vec::new(),
            feeds: 0,
            brew: ThermistorConverter::new(config.adc, &config.brew),
            steam: ThermistorConverter::new(config.adc, &config.steam),
            pressure: PressureConverter::new(config.adc, &config.pressure),
        };
        hw.set_brew_c(93.0);
        hw.set_steam_c(140.0);
        hw.set_pressure_bar(1.0);
        hw
    }

    pub fn set_brew_c(&mut self, c: f32) {
        self.raw[SensorChannel::BrewNtc.index()] = self.brew.count_for_celsius(c);
    }

    pub fn set_steam_c(&mut self, c: f32) {
        self.raw[SensorChannel::SteamNtc.index()] = self.steam.count_for_celsius(c);
    }

    pub fn set_pressure_bar(&mut self, bar: f32) {
        self.raw[SensorChannel::Pressure.index()] = self.pressure.count_for_bar(bar);
    }

    /// Last commanded state of `output` (false if never written).
    pub fn is_on(&self, output: Output) -> bool {
        self.calls
            .iter()
            .rev()
            .find(|c| c.output == output)
            .is_some_and(|c| c.on)
    }

    /// Whether `output` was ever driven high.
    pub fn ever_on(&self, output: Output) -> bool {
        self.calls.iter().any(|c| c.output == output && c.on)
    }
}

impl AdcPort for MockHardware {
    fn read_raw(&mut self, channel: SensorChannel) -> Result<u16, SensorFault> {
        if self.adc_error[channel.index()] {
            Err(SensorFault::AdcReadFailed)
        } else {
            Ok(self.raw[channel.index()])
        }
    }
}

impl LevelInputPort for MockHardware {
    fn level_probe_high(&mut self) -> Result<bool, SensorFault> {
        self.probe_high.ok_or(SensorFault::GpioReadFailed)
    }
}

impl ActuatorPort for MockHardware {
    fn set_output(&mut self, output: Output, on: bool) -> Result<(), ActuatorError> {
        if self.failing_output == Some(output) {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.calls.push(OutputCall { output, on });
        Ok(())
    }
}

impl WatchdogPort for MockHardware {
    fn feed(&mut self) {
        self.feeds += 1;
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    pub fail_writes: bool,
    pub saved: RefCell<Option<SystemConfig>>,
    pub saves: Cell<u32>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one bit of a stored blob.
    pub fn corrupt(&mut self, namespace: &str, key: &str, byte: usize) {
        if let Some(v) = self.store.get_mut(&format!("{}::{}", namespace, key)) {
            v[byte] ^= 0x01;
        }
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let k = format!("{}::{}", namespace, key);
        match self.store.get(&k) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        let k = format!("{}::{}", namespace, key);
        self.store.insert(k, data.to_vec());
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", namespace, key))
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(self.saved.borrow().clone().unwrap_or_default())
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.saved.borrow_mut() = Some(config.clone());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

// ── Recording event sink ─────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
