//! Safety supervisor.
//!
//! Runs **every poll, right after the sensors are read** and derives a fault
//! bitmask from the snapshot. The application service consults it before
//! driving any output.
//!
//! ## Fault lifecycle
//!
//! 1. A condition triggers a fault (e.g. water below the level probe).
//! 2. The supervisor sets the corresponding bit.
//! 3. Heater SSRs gated by that bit are forced off and stay off.
//! 4. Each poll the supervisor re-evaluates. When the condition clears,
//!    the bit clears and previously requested outputs are restored.
//!
//! Heater stall faults are the exception: they latch until
//! [`SafetySupervisor::clear_stall`] is called.
//!
//! Multiple simultaneous faults are tracked independently. Gating:
//!
//! | Fault              | Brew SSR | Steam SSR |
//! |--------------------|----------|-----------|
//! | `LevelUnsafe`      | off      | off       |
//! | `BrewNtcFault`     | off      | –         |
//! | `SteamNtcFault`    | –        | off       |
//! | `BrewOverTemp`     | off      | –         |
//! | `SteamOverTemp`    | –        | off       |
//! | `BrewHeaterStall`  | off      | –         |
//! | `SteamHeaterStall` | –        | off       |
//! | `PressureFault`    | –        | –         |

use heapless::Vec;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::drivers::outputs::Output;
use crate::error::{SafetyFault, SensorFault};
use crate::sensors::{SensorSnapshot, TemperatureReading};

/// Faults set before the first evaluation. Stall faults need an SSR on-time
/// history, so they start clear.
const STARTUP_FAULTS: u8 = 0x3F;

/// Faults that only [`SafetySupervisor::clear_stall`] can clear.
const LATCHED_FAULTS: u8 = 0xC0;

const BREW_GATE: u8 = SafetyFault::LevelUnsafe.mask()
    | SafetyFault::BrewNtcFault.mask()
    | SafetyFault::BrewOverTemp.mask()
    | SafetyFault::BrewHeaterStall.mask();

const STEAM_GATE: u8 = SafetyFault::LevelUnsafe.mask()
    | SafetyFault::SteamNtcFault.mask()
    | SafetyFault::SteamOverTemp.mask()
    | SafetyFault::SteamHeaterStall.mask();

/// Thermal interlock thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// Brew boiler cutoff (°C). Trips at or above.
    pub brew_max_c: f32,
    /// Steam boiler cutoff (°C). Trips at or above.
    pub steam_max_c: f32,
    /// Over-temperature clears at `max - hysteresis_c` or below.
    pub hysteresis_c: f32,
    /// Longest an SSR may stay on without the boiler moving (ms).
    pub heater_stall_ms: u32,
    /// Temperature change that counts as the boiler responding (°C).
    pub stall_min_change_c: f32,
}

impl SafetyLimits {
    pub const DEFAULT: Self = Self {
        brew_max_c: 130.0,
        steam_max_c: 165.0,
        hysteresis_c: 10.0,
        heater_stall_ms: 60_000,
        stall_min_change_c: 1.0,
    };
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// On-time bookkeeping for one heater SSR.
#[derive(Debug, Clone, Copy, Default)]
struct HeaterWatch {
    on_ms: u32,
    /// Temperature when the current no-change window began.
    reference_c: Option<f32>,
}

impl HeaterWatch {
    /// Returns true once the heater has been on past `limits.heater_stall_ms`
    /// without a `stall_min_change_c` move.
    fn update(
        &mut self,
        limits: &SafetyLimits,
        on: bool,
        reading: &Result<TemperatureReading, SensorFault>,
        dt_ms: u32,
    ) -> bool {
        if !on {
            *self = Self::default();
            return false;
        }
        let Ok(r) = reading else {
            return false;
        };
        match self.reference_c {
            Some(reference) if (r.celsius - reference).abs() < limits.stall_min_change_c => {
                self.on_ms = self.on_ms.saturating_add(dt_ms);
            }
            _ => {
                self.reference_c = Some(r.celsius);
                self.on_ms = 0;
            }
        }
        self.on_ms > limits.heater_stall_ms
    }
}

/// Safety supervisor.
#[derive(Debug)]
pub struct SafetySupervisor {
    /// Current fault bitmask.
    faults: u8,
    limits: SafetyLimits,
    brew_watch: HeaterWatch,
    steam_watch: HeaterWatch,
}

impl SafetySupervisor {
    /// Nothing has been measured yet, so every non-latched fault starts set.
    pub const fn new() -> Self {
        Self::with_limits(SafetyLimits::DEFAULT)
    }

    pub const fn with_limits(limits: SafetyLimits) -> Self {
        Self {
            faults: STARTUP_FAULTS,
            limits,
            brew_watch: HeaterWatch { on_ms: 0, reference_c: None },
            steam_watch: HeaterWatch { on_ms: 0, reference_c: None },
        }
    }

    /// New thresholds apply from the next evaluation.
    pub fn set_limits(&mut self, limits: SafetyLimits) {
        self.limits = limits;
    }

    /// Evaluate all safety conditions against the latest sensor snapshot.
    /// Returns the updated fault bitmask.
    pub fn evaluate(&mut self, snap: &SensorSnapshot) -> u8 {
        // ── Water level ───────────────────────────────────────────
        self.eval_fault(SafetyFault::LevelUnsafe, !snap.level.is_safe());

        // ── Boiler NTCs ───────────────────────────────────────────
        self.eval_fault(SafetyFault::BrewNtcFault, snap.brew.is_err());
        self.eval_fault(SafetyFault::SteamNtcFault, snap.steam.is_err());

        // ── Over-temperature ──────────────────────────────────────
        let limits = self.limits;
        self.eval_over_temp(SafetyFault::BrewOverTemp, &snap.brew, limits.brew_max_c);
        self.eval_over_temp(SafetyFault::SteamOverTemp, &snap.steam, limits.steam_max_c);

        // ── Pressure (reported only) ──────────────────────────────
        self.eval_fault(SafetyFault::PressureFault, snap.pressure.is_err());

        self.faults
    }

    /// Track how long each heater SSR has been on without its boiler
    /// responding. `brew_on`/`steam_on` are the levels actually on the pins;
    /// `dt_ms` is the time since the previous call.
    pub fn watch_heaters(&mut self, snap: &SensorSnapshot, brew_on: bool, steam_on: bool, dt_ms: u32) -> u8 {
        let limits = self.limits;
        if self.brew_watch.update(&limits, brew_on, &snap.brew, dt_ms) {
            self.latch(SafetyFault::BrewHeaterStall);
        }
        if self.steam_watch.update(&limits, steam_on, &snap.steam, dt_ms) {
            self.latch(SafetyFault::SteamHeaterStall);
        }
        self.faults
    }

    /// Operator acknowledgement of a heater stall.
    pub fn clear_stall(&mut self) {
        for fault in SafetyFault::ALL.into_iter().filter(|f| f.is_latched()) {
            if self.has_fault(fault) {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
        }
        self.faults &= !LATCHED_FAULTS;
        self.brew_watch = HeaterWatch::default();
        self.steam_watch = HeaterWatch::default();
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    pub fn active_faults(&self) -> Vec<SafetyFault, 8> {
        SafetyFault::ALL
            .into_iter()
            .filter(|f| self.has_fault(*f))
            .collect()
    }

    /// Whether `output` may be driven high under the current faults.
    /// Non-heater outputs are never gated.
    pub fn output_permitted(&self, output: Output) -> bool {
        match output {
            Output::BrewSsr => self.faults & BREW_GATE == 0,
            Output::SteamSsr => self.faults & STEAM_GATE == 0,
            _ => true,
        }
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }

    /// Trip at `max_c`, clear at `max_c - hysteresis_c`. A faulted reading
    /// leaves the bit alone; the NTC fault gates the heater meanwhile.
    fn eval_over_temp(
        &mut self,
        fault: SafetyFault,
        reading: &Result<TemperatureReading, SensorFault>,
        max_c: f32,
    ) {
        let Ok(r) = reading else {
            return;
        };
        if r.celsius >= max_c {
            self.eval_fault(fault, true);
        } else if r.celsius <= max_c - self.limits.hysteresis_c {
            self.eval_fault(fault, false);
        }
    }

    fn latch(&mut self, fault: SafetyFault) {
        if !self.has_fault(fault) {
            warn!("heater on for > {} ms without temperature change", self.limits.heater_stall_ms);
            error!("SAFETY FAULT SET: {fault}");
        }
        self.faults |= fault.mask();
    }
}

impl Default for SafetySupervisor {
    fn default() -> Self {
        Self::new()
    }
}
