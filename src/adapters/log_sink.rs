//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (which goes to the debug UART in production).
//! The companion-module link implements the same trait.

use log::{info, warn};

use crate::app::events::{AppEvent, TelemetryData};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn fmt_opt(v: Option<f32>) -> OptF32 {
    OptF32(v)
}

struct OptF32(Option<f32>);

impl core::fmt::Display for OptF32 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:.1}", v),
            None => f.write_str("--"),
        }
    }
}

fn log_telemetry(t: &TelemetryData) {
    info!(
        "TELEM | brew={}\u{00b0}C steam={}\u{00b0}C P={}bar | level={} | \
         outputs=0b{:08b} | faults=0b{:08b} | cal={:?}",
        fmt_opt(t.brew_c),
        fmt_opt(t.steam_c),
        fmt_opt(t.pressure_bar),
        t.level,
        t.outputs_on,
        t.fault_flags,
        t.calibrated,
    );
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => log_telemetry(t),
            AppEvent::Started => {
                info!("START | sensor core running");
            }
            AppEvent::Uncalibrated(ch) => {
                warn!("CAL   | {} uncalibrated", ch);
            }
            AppEvent::FaultDetected(flags) => {
                warn!("FAULT | detected, flags=0b{:08b}", flags);
            }
            AppEvent::FaultCleared => {
                info!("FAULT | all cleared");
            }
            AppEvent::SensorFault { channel, fault } => {
                warn!("SENSOR| {} failing: {}", channel, fault);
            }
            AppEvent::SensorRecovered(ch) => {
                info!("SENSOR| {} recovered", ch);
            }
            AppEvent::LevelChanged(level) => {
                info!("LEVEL | {}", level);
            }
            AppEvent::CalibrationUpdated { channel, offset } => match offset {
                Some(o) => info!("CAL   | {} offset {:+.3}", channel, o),
                None => info!("CAL   | {} cleared", channel),
            },
            AppEvent::ConfigUpdated => {
                info!("CONFIG| updated");
            }
        }
    }
}
