//! End-to-end calibration: reference comparison, persistence across a
//! restart, and fallback when the stored record is damaged.

use crate::mock_hw::{MockHardware, MockNvs, RecordingSink};

use brewos::app::commands::AppCommand;
use brewos::app::events::AppEvent;
use brewos::app::service::AppService;
use brewos::calibration::{CALIBRATION_KEY, CALIBRATION_NAMESPACE};
use brewos::config::SystemConfig;
use brewos::error::{CalibrationError, Error, SensorFault};
use brewos::sensors::SensorChannel;

fn boot(nvs: &MockNvs) -> (AppService, MockHardware, RecordingSink) {
    let config = SystemConfig::default();
    let hw = MockHardware::new(&config);
    let mut app = AppService::new(config);
    let mut sink = RecordingSink::new();
    app.start(nvs, &mut sink);
    (app, hw, sink)
}

fn uncalibrated_count(sink: &RecordingSink) -> usize {
    sink.count(|e| matches!(e, AppEvent::Uncalibrated(_)))
}

#[test]
fn reference_comparison_corrects_following_readings() {
    let mut nvs = MockNvs::new();
    let (mut app, mut hw, mut sink) = boot(&nvs);
    app.tick(&mut hw, &mut sink);
    let measured = app.snapshot().brew.unwrap().uncorrected_c;

    // Reference thermometer reads 1.5 °C lower than the probe.
    let reference = measured - 1.5;
    app.handle_command(
        AppCommand::CalibrateAgainstReference { channel: SensorChannel::BrewNtc, reference },
        &mut hw,
        &mut nvs,
        &mut sink,
    )
    .unwrap();

    let offset = sink
        .events
        .iter()
        .find_map(|e| match e {
            AppEvent::CalibrationUpdated { channel: SensorChannel::BrewNtc, offset } => *offset,
            _ => None,
        })
        .expect("calibration event");
    assert!((offset + 1.5).abs() < 1e-3);

    let r = app.tick(&mut hw, &mut sink).brew.unwrap();
    assert!(r.calibrated);
    assert!((r.celsius - reference).abs() < 1e-3);
    assert!((r.uncorrected_c - measured).abs() < 1e-3);
    assert!(!app.snapshot().steam.unwrap().calibrated);
}

#[test]
fn reference_against_faulted_channel_fails() {
    let mut nvs = MockNvs::new();
    let (mut app, mut hw, mut sink) = boot(&nvs);
    hw.raw[SensorChannel::BrewNtc.index()] = 0;
    app.tick(&mut hw, &mut sink);

    let res = app.handle_command(
        AppCommand::CalibrateAgainstReference { channel: SensorChannel::BrewNtc, reference: 93.0 },
        &mut hw,
        &mut nvs,
        &mut sink,
    );
    assert!(matches!(
        res,
        Err(Error::Calibration(CalibrationError::NoReading(SensorFault::ShortCircuit)))
    ));
    assert!(!app.calibration().is_calibrated(SensorChannel::BrewNtc));
}

#[test]
fn reference_before_first_poll_fails() {
    let mut nvs = MockNvs::new();
    let (mut app, mut hw, mut sink) = boot(&nvs);
    let res = app.handle_command(
        AppCommand::CalibrateAgainstReference { channel: SensorChannel::Pressure, reference: 1.0 },
        &mut hw,
        &mut nvs,
        &mut sink,
    );
    assert!(matches!(
        res,
        Err(Error::Calibration(CalibrationError::NoReading(SensorFault::NotSampled)))
    ));
}

#[test]
fn offset_survives_restart() {
    let mut nvs = MockNvs::new();
    {
        let (mut app, mut hw, mut sink) = boot(&nvs);
        app.handle_command(
            AppCommand::SetCalibrationOffset { channel: SensorChannel::SteamNtc, offset: 2.0 },
            &mut hw,
            &mut nvs,
            &mut sink,
        )
        .unwrap();
    }

    let (app, _hw, sink) = boot(&nvs);
    assert_eq!(app.calibration().offset(SensorChannel::SteamNtc), Some(2.0));
    assert_eq!(uncalibrated_count(&sink), 2);
    assert!(!sink.events.contains(&AppEvent::Uncalibrated(SensorChannel::SteamNtc)));
}

#[test]
fn damaged_record_boots_uncalibrated() {
    let mut nvs = MockNvs::new();
    {
        let (mut app, mut hw, mut sink) = boot(&nvs);
        app.handle_command(
            AppCommand::SetCalibrationOffset { channel: SensorChannel::BrewNtc, offset: -0.75 },
            &mut hw,
            &mut nvs,
            &mut sink,
        )
        .unwrap();
    }
    nvs.corrupt(CALIBRATION_NAMESPACE, CALIBRATION_KEY, 5);

    let (app, _hw, sink) = boot(&nvs);
    assert!(!app.calibration().is_calibrated(SensorChannel::BrewNtc));
    assert_eq!(uncalibrated_count(&sink), 3);
}

#[test]
fn failed_persist_leaves_offset_unchanged() {
    let mut nvs = MockNvs::new();
    let (mut app, mut hw, mut sink) = boot(&nvs);
    nvs.fail_writes = true;
    sink.clear();

    let res = app.handle_command(
        AppCommand::SetCalibrationOffset { channel: SensorChannel::BrewNtc, offset: 1.0 },
        &mut hw,
        &mut nvs,
        &mut sink,
    );
    assert!(matches!(res, Err(Error::Calibration(CalibrationError::Storage(_)))));
    assert!(!app.calibration().is_calibrated(SensorChannel::BrewNtc));
    assert!(sink.events.is_empty());
}

#[test]
fn out_of_bounds_offset_is_rejected() {
    let mut nvs = MockNvs::new();
    let (mut app, mut hw, mut sink) = boot(&nvs);
    let res = app.handle_command(
        AppCommand::SetCalibrationOffset { channel: SensorChannel::Pressure, offset: 0.75 },
        &mut hw,
        &mut nvs,
        &mut sink,
    );
    assert!(matches!(
        res,
        Err(Error::Calibration(CalibrationError::OutOfBounds { .. }))
    ));
}

#[test]
fn pressure_offset_applies_in_bar() {
    let mut nvs = MockNvs::new();
    let (mut app, mut hw, mut sink) = boot(&nvs);
    hw.set_pressure_bar(9.0);
    app.handle_command(
        AppCommand::SetCalibrationOffset { channel: SensorChannel::Pressure, offset: 0.2 },
        &mut hw,
        &mut nvs,
        &mut sink,
    )
    .unwrap();
    let p = app.tick(&mut hw, &mut sink).pressure.unwrap();
    assert!(p.calibrated);
    assert!((p.bar - p.uncorrected_bar - 0.2).abs() < 1e-4);
}

#[test]
fn clearing_returns_channel_to_uncalibrated() {
    let mut nvs = MockNvs::new();
    let (mut app, mut hw, mut sink) = boot(&nvs);
    app.handle_command(
        AppCommand::SetCalibrationOffset { channel: SensorChannel::BrewNtc, offset: 1.0 },
        &mut hw,
        &mut nvs,
        &mut sink,
    )
    .unwrap();
    app.handle_command(
        AppCommand::ClearCalibration(SensorChannel::BrewNtc),
        &mut hw,
        &mut nvs,
        &mut sink,
    )
    .unwrap();
    assert!(sink.events.contains(&AppEvent::CalibrationUpdated {
        channel: SensorChannel::BrewNtc,
        offset: None,
    }));
    let r = app.tick(&mut hw, &mut sink).brew.unwrap();
    assert!(!r.calibrated);
    assert_eq!(r.celsius, r.uncorrected_c);
}
