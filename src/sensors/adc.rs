//! ADC count ↔ voltage scaling.
//!
//! The RP2354 ADC is 12-bit and referenced to the board's buffered 3.0 V
//! rail. Both values are runtime configuration so a later board revision
//! only needs a config change, not new constants in every converter.

use serde::{Deserialize, Serialize};

/// Full-scale count of the 12-bit converter.
pub const ADC_MAX_COUNT: u16 = 4095;
/// Buffered reference voltage.
pub const ADC_VREF_VOLTS: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdcScale {
    pub vref_volts: f32,
    pub max_count: u16,
}

impl Default for AdcScale {
    fn default() -> Self {
        Self {
            vref_volts: ADC_VREF_VOLTS,
            max_count: ADC_MAX_COUNT,
        }
    }
}

impl AdcScale {
    pub fn is_valid_count(&self, count: u16) -> bool {
        count <= self.max_count
    }

    /// Measured voltage for a raw count. Counts above full scale are not
    /// clamped; callers check [`is_valid_count`](Self::is_valid_count) first.
    pub fn volts(&self, count: u16) -> f32 {
        count as f32 / self.max_count as f32 * self.vref_volts
    }

    /// Nearest count for a voltage, saturating at 0 and full scale.
    pub fn count_for_volts(&self, volts: f32) -> u16 {
        if !volts.is_finite() || volts <= 0.0 {
            return 0;
        }
        let count = (volts / self.vref_volts * self.max_count as f32).round();
        if count >= self.max_count as f32 {
            self.max_count
        } else {
            count as u16
        }
    }
}
