//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the sensor hub, safety supervisor and calibration
//! table. It exposes a clean, hardware-agnostic API. All I/O flows through
//! port traits injected at call sites, making the entire service testable
//! with mock adapters.
//!
//! ```text
//!      AdcPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//! LevelInputPort ─▶│        AppService         │
//! ActuatorPort ◀───│ Sensors · Safety · Gating │ ◀── AppCommand
//! WatchdogPort ◀───└──────────────────────────┘ ◀─▶ StoragePort / ConfigPort
//! ```

use log::{info, warn};

use crate::calibration::{CalibrationStore, offset_from_reference};
use crate::config::SystemConfig;
use crate::drivers::outputs::Output;
use crate::error::{ActuatorError, CalibrationError, Error};
use crate::safety::SafetySupervisor;
use crate::sensors::health::HealthTransition;
use crate::sensors::level::LevelState;
use crate::sensors::{SensorChannel, SensorHub, SensorSnapshot};

use super::commands::AppCommand;
use super::events::{AppEvent, TelemetryData};
use super::ports::{
    ActuatorPort, AdcPort, ConfigPort, EventSink, LevelInputPort, StoragePort, WatchdogPort,
};

/// Seconds after the last config change before it is written to flash.
const AUTO_SAVE_DELAY_SECS: f32 = 5.0;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: SystemConfig,
    sensors: SensorHub,
    safety: SafetySupervisor,
    calibration: CalibrationStore,
    snapshot: SensorSnapshot,
    /// Output states asked for by commands.
    requested: [bool; Output::COUNT],
    /// Output states last written successfully; `None` until a write to
    /// that pin has succeeded.
    applied: [Option<bool>; Output::COUNT],
    last_faults: u8,
    last_level: LevelState,
    tick_count: u64,
    ticks_since_telemetry: u32,
    config_dirty: bool,
    dirty_since_tick: u64,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** load calibration; call [`start`](Self::start) next.
    pub fn new(config: SystemConfig) -> Self {
        let sensors = SensorHub::new(&config);
        let safety = SafetySupervisor::with_limits(config.safety);
        Self {
            config,
            sensors,
            safety,
            calibration: CalibrationStore::new(),
            snapshot: SensorSnapshot::unread(),
            requested: [false; Output::COUNT],
            applied: [None; Output::COUNT],
            last_faults: 0,
            last_level: LevelState::Below,
            tick_count: 0,
            ticks_since_telemetry: 0,
            config_dirty: false,
            dirty_since_tick: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load persisted calibration and announce which channels lack it.
    pub fn start(&mut self, storage: &impl StoragePort, sink: &mut impl EventSink) {
        if let Err(e) = self.calibration.load(storage) {
            warn!("Calibration unavailable: {e}");
        }
        sink.emit(&AppEvent::Started);
        info!("AppService started");

        for channel in SensorChannel::ALL {
            if !self.calibration.is_calibrated(channel) {
                warn!("{channel} uncalibrated; readings include ADC leakage bias");
                sink.emit(&AppEvent::Uncalibrated(channel));
            }
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one poll: read sensors → safety → gate outputs → telemetry →
    /// feed watchdog.
    ///
    /// The `hw` parameter satisfies every hardware port at once, which
    /// avoids a double mutable borrow while keeping the port boundary
    /// explicit.
    pub fn tick(
        &mut self,
        hw: &mut (impl AdcPort + LevelInputPort + ActuatorPort + WatchdogPort),
        sink: &mut impl EventSink,
    ) -> SensorSnapshot {
        self.tick_count += 1;

        // 1. Sensors
        let snapshot = self.sensors.read_all(hw, &self.calibration);
        self.snapshot = snapshot;
        for (channel, transition) in SensorChannel::ALL.into_iter().zip(*self.sensors.transitions()) {
            match transition {
                HealthTransition::Tripped(fault) => {
                    sink.emit(&AppEvent::SensorFault { channel, fault });
                }
                HealthTransition::Recovered => sink.emit(&AppEvent::SensorRecovered(channel)),
                HealthTransition::None => {}
            }
        }
        if snapshot.level != self.last_level {
            self.last_level = snapshot.level;
            sink.emit(&AppEvent::LevelChanged(snapshot.level));
        }

        // 2. Safety evaluation
        self.safety.evaluate(&snapshot);
        let brew_on = self.is_applied_on(Output::BrewSsr);
        let steam_on = self.is_applied_on(Output::SteamSsr);
        let faults = self
            .safety
            .watch_heaters(&snapshot, brew_on, steam_on, self.config.sample_interval_ms);
        if faults & !self.last_faults != 0 {
            warn!("Safety fault! flags=0b{:08b}", faults);
            sink.emit(&AppEvent::FaultDetected(faults));
        } else if faults == 0 && self.last_faults != 0 {
            sink.emit(&AppEvent::FaultCleared);
        }
        self.last_faults = faults;

        // 3. Gate and apply outputs
        if let Err(e) = self.apply_outputs(hw) {
            warn!("Output update failed: {e}");
        }

        // 4. Telemetry
        self.ticks_since_telemetry = self.ticks_since_telemetry.saturating_add(1);
        let elapsed_ms = self.ticks_since_telemetry.saturating_mul(self.config.sample_interval_ms);
        if elapsed_ms >= self.config.telemetry_interval_ms {
            self.ticks_since_telemetry = 0;
            sink.emit(&AppEvent::Telemetry(self.build_telemetry()));
        }

        // 5. Poll completed
        hw.feed();
        snapshot
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (companion module, service menu, etc.).
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl ActuatorPort,
        store: &mut (impl StoragePort + ConfigPort),
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        match cmd {
            AppCommand::SetOutput { output, on } => {
                self.requested[output.index()] = on;
                if on && !self.safety.output_permitted(output) {
                    warn!("{output} request held: faults=0b{:08b}", self.safety.faults());
                }
                self.apply_outputs(hw)?;
            }
            AppCommand::AllOff => {
                self.requested = [false; Output::COUNT];
                let mut first_err = None;
                for output in Output::ALL {
                    if let Err(e) = self.drive(hw, output, false) {
                        first_err.get_or_insert(e);
                    }
                }
                if let Some(e) = first_err {
                    return Err(e.into());
                }
            }
            AppCommand::SetCalibrationOffset { channel, offset } => {
                self.calibration.set_offset(store, channel, offset)?;
                sink.emit(&AppEvent::CalibrationUpdated {
                    channel,
                    offset: Some(offset),
                });
            }
            AppCommand::CalibrateAgainstReference { channel, reference } => {
                let measured = self
                    .snapshot
                    .uncorrected(channel)
                    .map_err(CalibrationError::NoReading)?;
                let offset = offset_from_reference(channel, reference, measured)?;
                self.calibration.set_offset(store, channel, offset)?;
                sink.emit(&AppEvent::CalibrationUpdated {
                    channel,
                    offset: Some(offset),
                });
            }
            AppCommand::ClearCalibration(channel) => {
                self.calibration.clear_offset(store, channel)?;
                sink.emit(&AppEvent::CalibrationUpdated {
                    channel,
                    offset: None,
                });
            }
            AppCommand::ClearHeaterStall => {
                self.safety.clear_stall();
                info!("Heater stall acknowledged");
                self.apply_outputs(hw)?;
            }
            AppCommand::UpdateConfig(new_config) => {
                new_config.validate()?;
                self.sensors.reconfigure(&new_config);
                self.safety.set_limits(new_config.safety);
                self.config = new_config;
                self.mark_config_dirty();
                sink.emit(&AppEvent::ConfigUpdated);
                info!("Configuration updated at runtime");
            }
            AppCommand::SaveConfig => {
                store.save(&self.config)?;
                self.config_dirty = false;
                info!("Config saved on request");
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the latest poll.
    pub fn build_telemetry(&self) -> TelemetryData {
        let snap = &self.snapshot;
        let mut outputs_on = 0u8;
        for output in Output::ALL {
            if self.is_applied_on(output) {
                outputs_on |= 1 << output.index();
            }
        }
        let table = self.calibration.table();
        TelemetryData {
            brew_c: snap.brew.ok().map(|r| r.filtered_c),
            steam_c: snap.steam.ok().map(|r| r.filtered_c),
            pressure_bar: snap.pressure.ok().map(|r| r.filtered_bar),
            level: snap.level,
            fault_flags: self.safety.faults(),
            outputs_on,
            calibrated: SensorChannel::ALL.map(|ch| table.get(ch).is_some()),
        }
    }

    /// Result of the most recent poll.
    pub fn snapshot(&self) -> &SensorSnapshot {
        &self.snapshot
    }

    /// Current active fault bitmask (0 = no faults).
    pub fn fault_flags(&self) -> u8 {
        self.safety.faults()
    }

    pub fn requested_outputs(&self) -> [bool; Output::COUNT] {
        self.requested
    }

    /// Output states as last driven on the pins; `None` where no write
    /// has succeeded yet.
    pub fn applied_outputs(&self) -> [Option<bool>; Output::COUNT] {
        self.applied
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    /// Total polls executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Clone of the live configuration (for read-back or delta updates).
    pub fn current_config(&self) -> SystemConfig {
        self.config.clone()
    }

    // ── Internal ──────────────────────────────────────────────

    fn is_applied_on(&self, output: Output) -> bool {
        self.applied[output.index()] == Some(true)
    }

    /// Drive every output whose gated state differs from what is on the
    /// pin. Pins in an unknown state are always driven, and failed writes
    /// are retried on the next poll.
    fn apply_outputs(&mut self, hw: &mut impl ActuatorPort) -> Result<(), ActuatorError> {
        let mut first_err = None;
        for output in Output::ALL {
            let want = self.requested[output.index()] && self.safety.output_permitted(output);
            if self.applied[output.index()] != Some(want) {
                if let Err(e) = self.drive(hw, output, want) {
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn drive(&mut self, hw: &mut impl ActuatorPort, output: Output, on: bool) -> Result<(), ActuatorError> {
        match hw.set_output(output, on) {
            Ok(()) => {
                self.applied[output.index()] = Some(on);
                Ok(())
            }
            Err(e) => {
                warn!("{output} -> {}: {e}", if on { "on" } else { "off" });
                Err(e)
            }
        }
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified and restart the auto-save delay.
    pub fn mark_config_dirty(&mut self) {
        self.config_dirty = true;
        self.dirty_since_tick = self.tick_count;
    }

    /// Check if auto-save should trigger (5 seconds after last change).
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        let ticks_since_dirty = self.tick_count.saturating_sub(self.dirty_since_tick);
        let secs_since_dirty = ticks_since_dirty as f32 * self.config.sample_interval_ms as f32 / 1000.0;
        if secs_since_dirty < AUTO_SAVE_DELAY_SECS {
            return false;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config auto-saved to flash");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {}", e);
                false
            }
        }
    }

    /// Force-save if dirty (call before a controlled reset).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config force-saved before shutdown");
            }
            Err(e) => {
                warn!("Config force-save failed: {}", e);
            }
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}
