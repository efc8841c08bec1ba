//! NTC boiler thermistor conversion (Beta model).
//!
//! Each boiler probe sits at the bottom of a divider: pull-up to the 3.0 V
//! reference, NTC to ground, ADC at the midpoint. So
//!
//! ```text
//! V     = count / max_count × Vref
//! R_ntc = R_pullup × V / (Vref − V)
//! 1/T   = 1/T0 + ln(R_ntc / R0) / β
//! ```
//!
//! A higher count means a higher NTC resistance, i.e. a colder boiler.
//!
//! The stock ECM probes are 50 kΩ @ 25 °C. Jumpers JP1 (brew) and JP2
//! (steam) swap in pull-ups for the 10 kΩ probe family, so the active
//! parameter set is chosen at runtime from [`NtcChannelConfig::jumper`].
//! β = 3950 K has not been verified against the fitted probes and is
//! configuration like everything else here.

use serde::{Deserialize, Serialize};

use super::adc::AdcScale;
use crate::error::SensorFault;

const KELVIN_OFFSET: f32 = 273.15;

/// Beta-model parameters for one probe + pull-up combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NtcParams {
    pub pullup_ohms: f32,
    pub beta_kelvin: f32,
    pub r0_ohms: f32,
    pub t0_kelvin: f32,
}

impl NtcParams {
    pub const fn new(pullup_ohms: f32, r0_ohms: f32) -> Self {
        Self {
            pullup_ohms,
            beta_kelvin: 3950.0,
            r0_ohms,
            t0_kelvin: 298.15,
        }
    }
}

/// Probe family selected by the per-channel jumper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeFamily {
    /// Stock 50 kΩ probe, jumper open.
    Standard,
    /// 10 kΩ probe, jumper fitted.
    Alternate,
}

/// Conversion settings for one NTC channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NtcChannelConfig {
    pub standard: NtcParams,
    pub alternate: NtcParams,
    pub jumper: ProbeFamily,
    /// Readings below this are reported as [`SensorFault::Implausible`].
    pub plausible_min_c: f32,
    /// Readings above this are reported as [`SensorFault::Implausible`].
    pub plausible_max_c: f32,
}

impl NtcChannelConfig {
    /// Brew boiler: 3.3 kΩ pull-up (50k probe) / 1 kΩ (10k probe).
    pub const fn brew_default() -> Self {
        Self {
            standard: NtcParams::new(3_300.0, 50_000.0),
            alternate: NtcParams::new(1_000.0, 10_000.0),
            jumper: ProbeFamily::Standard,
            plausible_min_c: 0.0,
            plausible_max_c: 200.0,
        }
    }

    /// Steam boiler: 1.2 kΩ pull-up (50k probe) / 470 Ω (10k probe).
    pub const fn steam_default() -> Self {
        Self {
            standard: NtcParams::new(1_200.0, 50_000.0),
            alternate: NtcParams::new(470.0, 10_000.0),
            jumper: ProbeFamily::Standard,
            plausible_min_c: 0.0,
            plausible_max_c: 200.0,
        }
    }

    /// Parameter set for the currently fitted probe.
    pub fn active(&self) -> &NtcParams {
        match self.jumper {
            ProbeFamily::Standard => &self.standard,
            ProbeFamily::Alternate => &self.alternate,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThermistorConverter {
    params: NtcParams,
    adc: AdcScale,
    min_c: f32,
    max_c: f32,
}

impl ThermistorConverter {
    pub fn new(adc: AdcScale, channel: &NtcChannelConfig) -> Self {
        Self {
            params: *channel.active(),
            adc,
            min_c: channel.plausible_min_c,
            max_c: channel.plausible_max_c,
        }
    }

    pub fn params(&self) -> &NtcParams {
        &self.params
    }

    /// Thermistor resistance recovered from the divider voltage.
    pub fn resistance_ohms(&self, count: u16) -> Result<f32, SensorFault> {
        if !self.adc.is_valid_count(count) {
            return Err(SensorFault::InvalidCount);
        }
        let vref = self.adc.vref_volts;
        let volts = self.adc.volts(count);
        if volts <= 0.0 {
            return Err(SensorFault::ShortCircuit);
        }
        if volts >= vref {
            return Err(SensorFault::OpenCircuit);
        }
        Ok(self.params.pullup_ohms * volts / (vref - volts))
    }

    /// Beta-equation temperature with only the open/short checks applied.
    pub fn raw_celsius(&self, count: u16) -> Result<f32, SensorFault> {
        let r_ntc = self.resistance_ohms(count)?;
        let p = &self.params;
        let inv_t = (1.0 / p.t0_kelvin) + (r_ntc / p.r0_ohms).ln() / p.beta_kelvin;
        if !inv_t.is_finite() || inv_t <= 0.0 {
            return Err(SensorFault::Implausible);
        }
        let celsius = (1.0 / inv_t) - KELVIN_OFFSET;
        if celsius.is_finite() {
            Ok(celsius)
        } else {
            Err(SensorFault::Implausible)
        }
    }

    /// Temperature in °C, rejecting anything outside the plausible window.
    pub fn convert(&self, count: u16) -> Result<f32, SensorFault> {
        self.check_plausible(self.raw_celsius(count)?)
    }

    /// Reject a temperature outside the plausible window. Applied again
    /// after the calibration offset.
    pub fn check_plausible(&self, celsius: f32) -> Result<f32, SensorFault> {
        if celsius < self.min_c || celsius > self.max_c {
            return Err(SensorFault::Implausible);
        }
        Ok(celsius)
    }

    /// Count the ADC would read with the boiler at `celsius`.
    pub fn count_for_celsius(&self, celsius: f32) -> u16 {
        let p = &self.params;
        let t = celsius + KELVIN_OFFSET;
        let r_ntc = p.r0_ohms * (p.beta_kelvin * (1.0 / t - 1.0 / p.t0_kelvin)).exp();
        let volts = self.adc.vref_volts * r_ntc / (r_ntc + p.pullup_ohms);
        self.adc.count_for_volts(volts)
    }
}
