//! Brew-circuit pressure transducer (YD4060, 0.5–4.5 V ratiometric, 0–16 bar).
//!
//! The 5 V transducer output reaches the ADC through a 10k/15.6k divider
//! (ratio 0.641), so the sensor-side voltage is recovered first and then
//! mapped linearly. A live-zero output below 0.5 V means a broken wire;
//! above 4.5 V means the transducer is saturated or shorted to 5 V.

use serde::{Deserialize, Serialize};

use super::adc::AdcScale;
use crate::error::SensorFault;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureConfig {
    /// V_adc / V_sensor.
    pub divider_ratio: f32,
    pub sensor_min_volts: f32,
    pub sensor_max_volts: f32,
    pub full_scale_bar: f32,
    /// Tolerance around the live-zero and full-scale voltages before a
    /// reading is classified as a wiring fault.
    pub fault_margin_volts: f32,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            divider_ratio: 0.641,
            sensor_min_volts: 0.5,
            sensor_max_volts: 4.5,
            full_scale_bar: 16.0,
            fault_margin_volts: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PressureConverter {
    cfg: PressureConfig,
    adc: AdcScale,
}

impl PressureConverter {
    pub fn new(adc: AdcScale, cfg: &PressureConfig) -> Self {
        Self { cfg: *cfg, adc }
    }

    fn span_volts(&self) -> f32 {
        self.cfg.sensor_max_volts - self.cfg.sensor_min_volts
    }

    /// Transducer output voltage before the divider.
    pub fn sensor_volts(&self, count: u16) -> Result<f32, SensorFault> {
        if !self.adc.is_valid_count(count) {
            return Err(SensorFault::InvalidCount);
        }
        Ok(self.adc.volts(count) / self.cfg.divider_ratio)
    }

    /// Pressure in bar. Values just inside the fault margin may be slightly
    /// negative or above full scale; they are reported as-is.
    pub fn convert(&self, count: u16) -> Result<f32, SensorFault> {
        let v = self.sensor_volts(count)?;
        if v < self.cfg.sensor_min_volts - self.cfg.fault_margin_volts {
            return Err(SensorFault::BrokenWire);
        }
        if v > self.cfg.sensor_max_volts + self.cfg.fault_margin_volts {
            return Err(SensorFault::OverRange);
        }
        Ok((v - self.cfg.sensor_min_volts) / self.span_volts() * self.cfg.full_scale_bar)
    }

    pub fn count_for_bar(&self, bar: f32) -> u16 {
        let v_sensor = self.cfg.sensor_min_volts + bar / self.cfg.full_scale_bar * self.span_volts();
        self.adc.count_for_volts(v_sensor * self.cfg.divider_ratio)
    }
}
