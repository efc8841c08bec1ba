//! Per-channel consecutive failure tracking.
//!
//! The poll loop never retries a failed read. Instead each channel keeps a
//! run-length of failures; crossing the threshold is logged once, and the
//! first good reading afterwards is logged as a recovery.

use log::{info, warn};

use crate::error::SensorFault;

/// What changed on this update, for the caller to turn into events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    None,
    /// The failure run just reached the threshold.
    Tripped(SensorFault),
    /// First good sample after having tripped.
    Recovered,
}

#[derive(Debug, Clone)]
pub struct ChannelHealth {
    name: &'static str,
    consecutive_failures: u16,
    tripped: bool,
}

impl ChannelHealth {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            consecutive_failures: 0,
            tripped: false,
        }
    }

    pub fn consecutive_failures(&self) -> u16 {
        self.consecutive_failures
    }

    pub fn record<T>(&mut self, result: &Result<T, SensorFault>, threshold: u16) -> HealthTransition {
        match result {
            Ok(_) => {
                self.consecutive_failures = 0;
                if self.tripped {
                    self.tripped = false;
                    info!("{} sensor recovered", self.name);
                    return HealthTransition::Recovered;
                }
                HealthTransition::None
            }
            Err(fault) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if !self.tripped && self.consecutive_failures >= threshold.max(1) {
                    self.tripped = true;
                    warn!(
                        "{} sensor: {} consecutive failures ({})",
                        self.name, self.consecutive_failures, fault
                    );
                    return HealthTransition::Tripped(*fault);
                }
                HealthTransition::None
            }
        }
    }
}
