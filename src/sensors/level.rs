//! Steam boiler level probe.
//!
//! A conductive probe feeds a comparator whose output is HIGH when the probe
//! tip is dry. A broken wire or unpowered comparator also reads HIGH, so the
//! raw mapping is fail-safe by construction.
//!
//! The debounced state is asymmetric: leaving `Below` needs a longer run of
//! LOW samples than entering it needs HIGH samples. Boiling water splashes
//! the probe, and a single wet sample must not enable the heater.

use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelState {
    /// Water below the probe. Heaters must stay off.
    Below,
    /// Water at or above the probe.
    AtOrAbove,
}

impl LevelState {
    /// HIGH → Below, LOW → AtOrAbove.
    pub const fn from_gpio(high: bool) -> Self {
        if high { Self::Below } else { Self::AtOrAbove }
    }

    pub const fn is_safe(self) -> bool {
        matches!(self, Self::AtOrAbove)
    }
}

impl core::fmt::Display for LevelState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Below => write!(f, "below probe"),
            Self::AtOrAbove => write!(f, "at/above probe"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Consecutive LOW samples before the level is reported safe.
    pub samples_to_clear: u8,
    /// Consecutive HIGH samples before the level is reported unsafe.
    pub samples_to_trip: u8,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            samples_to_clear: 5,
            samples_to_trip: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LevelDetector {
    cfg: LevelConfig,
    state: LevelState,
    /// Consecutive samples disagreeing with `state`.
    pending: u8,
}

impl LevelDetector {
    pub const fn new(cfg: LevelConfig) -> Self {
        Self {
            cfg,
            state: LevelState::Below,
            pending: 0,
        }
    }

    pub fn state(&self) -> LevelState {
        self.state
    }

    /// Feed one probe sample; returns the debounced state.
    pub fn update(&mut self, probe_high: bool) -> LevelState {
        let sample = LevelState::from_gpio(probe_high);
        if sample == self.state {
            self.pending = 0;
            return self.state;
        }

        self.pending = self.pending.saturating_add(1);
        let needed = match sample {
            LevelState::AtOrAbove => self.cfg.samples_to_clear,
            LevelState::Below => self.cfg.samples_to_trip,
        };
        if self.pending >= needed.max(1) {
            info!("Steam level: {} -> {}", self.state, sample);
            self.state = sample;
            self.pending = 0;
        }
        self.state
    }

    /// Back to `Below` with no pending samples.
    pub fn reset(&mut self) {
        self.state = LevelState::Below;
        self.pending = 0;
    }

    /// A changed debounce policy restarts from `Below`.
    pub fn set_config(&mut self, cfg: LevelConfig) {
        if cfg != self.cfg {
            self.cfg = cfg;
            self.reset();
        }
    }
}
