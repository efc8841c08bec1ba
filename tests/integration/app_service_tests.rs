//! Integration tests for the AppService → sensors → safety → outputs pipeline.
//!
//! These run on the host and drive the service exactly as the board loop
//! does: one `tick` per sample period plus the occasional command.

use crate::mock_hw::{MockHardware, MockNvs, RecordingSink};

use brewos::app::commands::AppCommand;
use brewos::app::events::AppEvent;
use brewos::app::ports::ConfigPort;
use brewos::app::service::AppService;
use brewos::config::SystemConfig;
use brewos::drivers::outputs::Output;
use brewos::error::{ActuatorError, Error, SafetyFault, SensorFault};
use brewos::sensors::SensorChannel;
use brewos::sensors::level::LevelState;
use brewos::sensors::thermistor::ProbeFamily;

fn make_app() -> (AppService, MockHardware, MockNvs, RecordingSink) {
    let config = SystemConfig::default();
    let hw = MockHardware::new(&config);
    let mut app = AppService::new(config);
    let nvs = MockNvs::new();
    let mut sink = RecordingSink::new();
    app.start(&nvs, &mut sink);
    (app, hw, nvs, sink)
}

/// Enough wet samples for the level debounce to clear.
fn settle(app: &mut AppService, hw: &mut MockHardware, sink: &mut RecordingSink) {
    for _ in 0..5 {
        app.tick(hw, sink);
    }
}

fn heat_both(app: &mut AppService, hw: &mut MockHardware, nvs: &mut MockNvs, sink: &mut RecordingSink) {
    for output in [Output::BrewSsr, Output::SteamSsr] {
        app.handle_command(AppCommand::SetOutput { output, on: true }, hw, nvs, sink)
            .unwrap();
    }
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_announces_uncalibrated_channels() {
    let (_app, _hw, _nvs, sink) = make_app();
    assert_eq!(sink.events[0], AppEvent::Started);
    for ch in SensorChannel::ALL {
        assert!(sink.events.contains(&AppEvent::Uncalibrated(ch)));
    }
}

#[test]
fn heaters_held_until_level_debounce_clears() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    heat_both(&mut app, &mut hw, &mut nvs, &mut sink);
    assert!(!hw.ever_on(Output::BrewSsr), "no heater before the first poll");
    assert!(app.requested_outputs()[Output::BrewSsr.index()]);

    for _ in 0..4 {
        app.tick(&mut hw, &mut sink);
        assert!(!hw.ever_on(Output::BrewSsr));
        assert!(!hw.ever_on(Output::SteamSsr));
    }
    assert_eq!(app.fault_flags(), SafetyFault::LevelUnsafe.mask());

    app.tick(&mut hw, &mut sink);
    assert!(hw.is_on(Output::BrewSsr));
    assert!(hw.is_on(Output::SteamSsr));
    assert_eq!(app.fault_flags(), 0);
    assert_eq!(sink.count(|e| *e == AppEvent::LevelChanged(LevelState::AtOrAbove)), 1);
    assert_eq!(sink.count(|e| *e == AppEvent::FaultCleared), 1);
    assert_eq!(
        sink.count(|e| *e == AppEvent::FaultDetected(SafetyFault::LevelUnsafe.mask())),
        1
    );
}

// ── Gating ────────────────────────────────────────────────────

#[test]
fn open_brew_ntc_gates_only_brew_ssr() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    settle(&mut app, &mut hw, &mut sink);
    heat_both(&mut app, &mut hw, &mut nvs, &mut sink);
    assert!(hw.is_on(Output::BrewSsr));

    hw.raw[SensorChannel::BrewNtc.index()] = 4095;
    let snap = app.tick(&mut hw, &mut sink);
    assert_eq!(snap.brew, Err(SensorFault::OpenCircuit));
    assert!(!hw.is_on(Output::BrewSsr));
    assert!(hw.is_on(Output::SteamSsr));
    assert!(sink.events.contains(&AppEvent::FaultDetected(SafetyFault::BrewNtcFault.mask())));

    // Repaired: the standing request is honoured again.
    hw.set_brew_c(93.0);
    app.tick(&mut hw, &mut sink);
    assert!(hw.is_on(Output::BrewSsr));
}

#[test]
fn shorted_steam_ntc_gates_only_steam_ssr() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    settle(&mut app, &mut hw, &mut sink);
    heat_both(&mut app, &mut hw, &mut nvs, &mut sink);

    hw.raw[SensorChannel::SteamNtc.index()] = 0;
    let snap = app.tick(&mut hw, &mut sink);
    assert_eq!(snap.steam, Err(SensorFault::ShortCircuit));
    assert!(hw.is_on(Output::BrewSsr));
    assert!(!hw.is_on(Output::SteamSsr));
}

#[test]
fn broken_pressure_wire_is_reported_but_not_gated() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    settle(&mut app, &mut hw, &mut sink);
    heat_both(&mut app, &mut hw, &mut nvs, &mut sink);

    hw.raw[SensorChannel::Pressure.index()] = 0;
    let snap = app.tick(&mut hw, &mut sink);
    assert_eq!(snap.pressure, Err(SensorFault::BrokenWire));
    assert_ne!(app.fault_flags() & SafetyFault::PressureFault.mask(), 0);
    assert!(hw.is_on(Output::BrewSsr));
    assert!(hw.is_on(Output::SteamSsr));
}

#[test]
fn brew_over_temperature_cuts_heater_until_cooled() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    settle(&mut app, &mut hw, &mut sink);
    heat_both(&mut app, &mut hw, &mut nvs, &mut sink);

    hw.set_brew_c(131.0);
    app.tick(&mut hw, &mut sink);
    assert!(!hw.is_on(Output::BrewSsr));
    assert!(hw.is_on(Output::SteamSsr));
    assert!(sink.events.contains(&AppEvent::FaultDetected(SafetyFault::BrewOverTemp.mask())));

    // Still inside the 10 °C band.
    hw.set_brew_c(125.0);
    app.tick(&mut hw, &mut sink);
    assert!(!hw.is_on(Output::BrewSsr));

    hw.set_brew_c(118.0);
    app.tick(&mut hw, &mut sink);
    assert!(hw.is_on(Output::BrewSsr));
    assert_eq!(app.fault_flags(), 0);
}

#[test]
fn low_water_drops_both_heaters_after_two_samples() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    settle(&mut app, &mut hw, &mut sink);
    heat_both(&mut app, &mut hw, &mut nvs, &mut sink);

    hw.probe_high = Some(true);
    app.tick(&mut hw, &mut sink);
    assert!(hw.is_on(Output::BrewSsr), "one dry sample is a splash");
    app.tick(&mut hw, &mut sink);
    assert!(!hw.is_on(Output::BrewSsr));
    assert!(!hw.is_on(Output::SteamSsr));
    assert_eq!(app.snapshot().level, LevelState::Below);
    assert!(sink.events.contains(&AppEvent::LevelChanged(LevelState::Below)));
}

#[test]
fn probe_read_error_counts_as_dry() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    settle(&mut app, &mut hw, &mut sink);
    heat_both(&mut app, &mut hw, &mut nvs, &mut sink);

    hw.probe_high = None;
    app.tick(&mut hw, &mut sink);
    app.tick(&mut hw, &mut sink);
    assert!(!hw.is_on(Output::SteamSsr));
    assert!(app.snapshot().level_probe_high);
}

#[test]
fn non_heater_outputs_ignore_faults() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    app.tick(&mut hw, &mut sink);
    assert_ne!(app.fault_flags(), 0);
    app.handle_command(
        AppCommand::SetOutput { output: Output::PumpRelay, on: true },
        &mut hw,
        &mut nvs,
        &mut sink,
    )
    .unwrap();
    assert!(hw.is_on(Output::PumpRelay));
}

// ── Poll loop housekeeping ────────────────────────────────────

#[test]
fn watchdog_fed_once_per_tick() {
    let (mut app, mut hw, _nvs, mut sink) = make_app();
    for _ in 0..7 {
        app.tick(&mut hw, &mut sink);
    }
    assert_eq!(hw.feeds, 7);
    assert_eq!(app.tick_count(), 7);
}

#[test]
fn repeated_failures_reported_once_then_recovery() {
    let (mut app, mut hw, _nvs, mut sink) = make_app();
    hw.adc_error[SensorChannel::SteamNtc.index()] = true;
    for _ in 0..15 {
        app.tick(&mut hw, &mut sink);
    }
    assert_eq!(app.snapshot().consecutive_failures[SensorChannel::SteamNtc.index()], 15);
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::SensorFault {
                channel: SensorChannel::SteamNtc,
                fault: SensorFault::AdcReadFailed
            }
        )),
        1
    );

    hw.adc_error[SensorChannel::SteamNtc.index()] = false;
    app.tick(&mut hw, &mut sink);
    assert_eq!(sink.count(|e| *e == AppEvent::SensorRecovered(SensorChannel::SteamNtc)), 1);
    assert_eq!(app.snapshot().consecutive_failures[SensorChannel::SteamNtc.index()], 0);
}

#[test]
fn telemetry_carries_filtered_values() {
    let (mut app, mut hw, _nvs, mut sink) = make_app();
    // 1000 ms / 50 ms
    for _ in 0..20 {
        app.tick(&mut hw, &mut sink);
    }
    let telem = sink
        .events
        .iter()
        .find_map(|e| match e {
            AppEvent::Telemetry(t) => Some(t.clone()),
            _ => None,
        })
        .expect("one telemetry event");
    assert!((telem.brew_c.unwrap() - 93.0).abs() < 1.0);
    assert!((telem.steam_c.unwrap() - 140.0).abs() < 1.0);
    assert!((telem.pressure_bar.unwrap() - 1.0).abs() < 0.05);
    assert_eq!(telem.level, LevelState::AtOrAbove);
    assert_eq!(telem.calibrated, [false; 3]);
}

// ── Output commands ───────────────────────────────────────────

#[test]
fn all_off_withdraws_every_request() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    settle(&mut app, &mut hw, &mut sink);
    heat_both(&mut app, &mut hw, &mut nvs, &mut sink);
    app.handle_command(
        AppCommand::SetOutput { output: Output::PumpRelay, on: true },
        &mut hw,
        &mut nvs,
        &mut sink,
    )
    .unwrap();

    app.handle_command(AppCommand::AllOff, &mut hw, &mut nvs, &mut sink)
        .unwrap();
    for output in Output::ALL {
        assert!(!hw.is_on(output), "{output} still on");
    }
    assert_eq!(app.requested_outputs(), [false; Output::COUNT]);

    app.tick(&mut hw, &mut sink);
    assert!(!hw.is_on(Output::BrewSsr));
}

#[test]
fn failed_output_write_is_reported_and_retried() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    hw.failing_output = Some(Output::PumpRelay);
    let res = app.handle_command(
        AppCommand::SetOutput { output: Output::PumpRelay, on: true },
        &mut hw,
        &mut nvs,
        &mut sink,
    );
    assert!(matches!(res, Err(Error::Actuator(ActuatorError::GpioWriteFailed))));
    assert_eq!(app.applied_outputs()[Output::PumpRelay.index()], None);

    hw.failing_output = None;
    app.tick(&mut hw, &mut sink);
    assert!(hw.is_on(Output::PumpRelay));
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn invalid_config_is_rejected_unchanged() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    let mut bad = SystemConfig::default();
    bad.brew.standard.pullup_ohms = 0.0;
    let res = app.handle_command(AppCommand::UpdateConfig(bad), &mut hw, &mut nvs, &mut sink);
    assert!(matches!(res, Err(Error::Config(_))));
    assert_eq!(app.current_config(), SystemConfig::default());
    assert!(!app.is_config_dirty());
}

#[test]
fn jumper_change_rebuilds_brew_converter() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    settle(&mut app, &mut hw, &mut sink);
    let before = app.snapshot().brew.unwrap().celsius;

    let mut cfg = app.current_config();
    cfg.brew.jumper = ProbeFamily::Alternate;
    app.handle_command(AppCommand::UpdateConfig(cfg), &mut hw, &mut nvs, &mut sink)
        .unwrap();
    assert!(sink.events.contains(&AppEvent::ConfigUpdated));
    assert!(app.is_config_dirty());

    let after = app.tick(&mut hw, &mut sink).brew.unwrap().celsius;
    assert!((before - after).abs() > 5.0, "{before} vs {after}");
}

#[test]
fn safety_limits_follow_config_update() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    settle(&mut app, &mut hw, &mut sink);
    heat_both(&mut app, &mut hw, &mut nvs, &mut sink);
    assert!(hw.is_on(Output::SteamSsr));

    let mut cfg = app.current_config();
    cfg.safety.steam_max_c = 135.0;
    app.handle_command(AppCommand::UpdateConfig(cfg), &mut hw, &mut nvs, &mut sink)
        .unwrap();
    app.tick(&mut hw, &mut sink);
    assert!(!hw.is_on(Output::SteamSsr));
    assert_eq!(app.fault_flags(), SafetyFault::SteamOverTemp.mask());
}

#[test]
fn level_debounce_change_rearms_from_dry() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    settle(&mut app, &mut hw, &mut sink);
    heat_both(&mut app, &mut hw, &mut nvs, &mut sink);

    let mut cfg = app.current_config();
    cfg.level.samples_to_clear = 3;
    app.handle_command(AppCommand::UpdateConfig(cfg), &mut hw, &mut nvs, &mut sink)
        .unwrap();

    for _ in 0..2 {
        app.tick(&mut hw, &mut sink);
        assert!(!hw.is_on(Output::BrewSsr));
        assert_eq!(app.snapshot().level, LevelState::Below);
    }
    app.tick(&mut hw, &mut sink);
    assert!(hw.is_on(Output::BrewSsr));
    assert_eq!(sink.count(|e| *e == AppEvent::LevelChanged(LevelState::Below)), 1);
}

#[test]
fn save_config_persists_and_clears_dirty() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    let cfg = SystemConfig {
        sensor_error_threshold: 4,
        ..SystemConfig::default()
    };
    app.handle_command(AppCommand::UpdateConfig(cfg), &mut hw, &mut nvs, &mut sink)
        .unwrap();
    app.handle_command(AppCommand::SaveConfig, &mut hw, &mut nvs, &mut sink)
        .unwrap();
    assert!(!app.is_config_dirty());
    assert_eq!(nvs.saves.get(), 1);
    assert_eq!(nvs.load().unwrap().sensor_error_threshold, 4);
}

#[test]
fn force_save_only_when_dirty() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();
    app.force_save_if_dirty(&nvs);
    assert_eq!(nvs.saves.get(), 0);

    let cfg = SystemConfig {
        telemetry_interval_ms: 2_000,
        ..SystemConfig::default()
    };
    app.handle_command(AppCommand::UpdateConfig(cfg), &mut hw, &mut nvs, &mut sink)
        .unwrap();
    app.force_save_if_dirty(&nvs);
    assert_eq!(nvs.saves.get(), 1);
    assert!(!app.is_config_dirty());
}
