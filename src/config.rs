//! System configuration parameters
//!
//! Every conversion constant lives here rather than in the converters, so a
//! probe swap or board revision is a config change. The companion module
//! pushes updates as JSON; flash keeps them postcard-encoded.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins::WATCHDOG_TIMEOUT_MS;
use crate::safety::SafetyLimits;
use crate::sensors::adc::AdcScale;
use crate::sensors::level::LevelConfig;
use crate::sensors::pressure::PressureConfig;
use crate::sensors::thermistor::{NtcChannelConfig, NtcParams};

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Converters ---
    pub adc: AdcScale,
    /// Brew boiler NTC (JP1 selects the probe family).
    pub brew: NtcChannelConfig,
    /// Steam boiler NTC (JP2 selects the probe family).
    pub steam: NtcChannelConfig,
    pub pressure: PressureConfig,
    pub level: LevelConfig,

    // --- Interlocks ---
    pub safety: SafetyLimits,

    // --- Health ---
    /// Consecutive failed reads before a channel is reported unhealthy.
    pub sensor_error_threshold: u16,

    // --- Timing ---
    /// Poll period (milliseconds)
    pub sample_interval_ms: u32,
    /// Telemetry event period (milliseconds)
    pub telemetry_interval_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            adc: AdcScale::default(),
            brew: NtcChannelConfig::brew_default(),
            steam: NtcChannelConfig::steam_default(),
            pressure: PressureConfig::default(),
            level: LevelConfig::default(),

            safety: SafetyLimits::default(),

            sensor_error_threshold: 10,

            sample_interval_ms: 50,       // 20 Hz
            telemetry_interval_ms: 1_000, // 1 Hz
        }
    }
}

impl SystemConfig {
    /// Range-check every field. Bad values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1.0..=5.5).contains(&self.adc.vref_volts) {
            return Err(ConfigError::ValidationFailed("adc.vref_volts must be 1.0-5.5"));
        }
        if self.adc.max_count < 255 {
            return Err(ConfigError::ValidationFailed("adc.max_count must be >= 255"));
        }

        validate_ntc(&self.brew)?;
        validate_ntc(&self.steam)?;

        let p = &self.pressure;
        if !(0.05..=1.0).contains(&p.divider_ratio) {
            return Err(ConfigError::ValidationFailed("pressure.divider_ratio must be 0.05-1.0"));
        }
        if !(0.0..=10.0).contains(&p.sensor_min_volts) || p.sensor_max_volts <= p.sensor_min_volts {
            return Err(ConfigError::ValidationFailed(
                "pressure sensor voltage window must be 0-10 V with min < max",
            ));
        }
        if p.sensor_max_volts * p.divider_ratio >= self.adc.vref_volts {
            return Err(ConfigError::ValidationFailed(
                "pressure full-scale must stay below the ADC reference after the divider",
            ));
        }
        if !(0.5..=100.0).contains(&p.full_scale_bar) {
            return Err(ConfigError::ValidationFailed("pressure.full_scale_bar must be 0.5-100"));
        }
        let half_span = (p.sensor_max_volts - p.sensor_min_volts) / 2.0;
        if !(0.0..half_span).contains(&p.fault_margin_volts) || p.fault_margin_volts > p.sensor_min_volts {
            return Err(ConfigError::ValidationFailed(
                "pressure.fault_margin_volts must be >= 0, below live-zero and half the span",
            ));
        }

        if !(1..=50).contains(&self.level.samples_to_clear) {
            return Err(ConfigError::ValidationFailed("level.samples_to_clear must be 1-50"));
        }
        if !(1..=50).contains(&self.level.samples_to_trip) {
            return Err(ConfigError::ValidationFailed("level.samples_to_trip must be 1-50"));
        }

        let s = &self.safety;
        if !(50.0..=self.brew.plausible_max_c).contains(&s.brew_max_c)
            || !(50.0..=self.steam.plausible_max_c).contains(&s.steam_max_c)
        {
            return Err(ConfigError::ValidationFailed(
                "safety cutoffs must be >= 50 °C and within the NTC plausible range",
            ));
        }
        if !(1.0..=30.0).contains(&s.hysteresis_c) {
            return Err(ConfigError::ValidationFailed("safety.hysteresis_c must be 1-30"));
        }
        if !(5_000..=600_000).contains(&s.heater_stall_ms) || s.heater_stall_ms < self.sample_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "safety.heater_stall_ms must be 5000-600000 and above the poll period",
            ));
        }
        if !(0.1..=10.0).contains(&s.stall_min_change_c) {
            return Err(ConfigError::ValidationFailed("safety.stall_min_change_c must be 0.1-10"));
        }

        if !(1..=1000).contains(&self.sensor_error_threshold) {
            return Err(ConfigError::ValidationFailed("sensor_error_threshold must be 1-1000"));
        }
        if !(10..WATCHDOG_TIMEOUT_MS).contains(&self.sample_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "sample_interval_ms must be >= 10 and below the watchdog timeout",
            ));
        }
        if self.telemetry_interval_ms < self.sample_interval_ms || self.telemetry_interval_ms > 60_000 {
            return Err(ConfigError::ValidationFailed(
                "telemetry_interval_ms must be between sample_interval_ms and 60000",
            ));
        }
        Ok(())
    }

    /// Parse and validate a config pushed over the companion link.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|_| ConfigError::Malformed)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string(self).map_err(|_| ConfigError::Malformed)
    }
}

fn validate_ntc(ch: &NtcChannelConfig) -> Result<(), ConfigError> {
    validate_ntc_params(&ch.standard)?;
    validate_ntc_params(&ch.alternate)?;
    if !(-40.0..=300.0).contains(&ch.plausible_min_c)
        || !(-40.0..=300.0).contains(&ch.plausible_max_c)
        || ch.plausible_min_c >= ch.plausible_max_c
    {
        return Err(ConfigError::ValidationFailed(
            "NTC plausible range must lie in -40..300 °C with min < max",
        ));
    }
    Ok(())
}

fn validate_ntc_params(p: &NtcParams) -> Result<(), ConfigError> {
    if !(10.0..=1_000_000.0).contains(&p.pullup_ohms) {
        return Err(ConfigError::ValidationFailed("NTC pullup_ohms must be 10-1M"));
    }
    if !(1_000.0..=10_000.0).contains(&p.beta_kelvin) {
        return Err(ConfigError::ValidationFailed("NTC beta_kelvin must be 1000-10000"));
    }
    if !(100.0..=1_000_000.0).contains(&p.r0_ohms) {
        return Err(ConfigError::ValidationFailed("NTC r0_ohms must be 100-1M"));
    }
    if !(200.0..=400.0).contains(&p.t0_kelvin) {
        return Err(ConfigError::ValidationFailed("NTC t0_kelvin must be 200-400"));
    }
    Ok(())
}
