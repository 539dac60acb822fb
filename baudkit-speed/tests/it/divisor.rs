use baudkit_device::Request;
use baudkit_sim::{SimConfig, SimTty};
use baudkit_speed::{
    ControlState, SpeedController, SpeedError, SpeedOptions, SpeedStrategy, StrategyKind,
};
use baudkit_wire::serial::ASYNC_SPD_CUST;
use nix::errno::Errno;

use crate::helpers::{FailingSetState, SilentlyIgnoring};

const BASE: u32 = 1_843_200;

fn divisor_tty() -> SimTty {
    SimTty::new(SimConfig::divisor_only())
}

#[test]
fn divisor_only_device_detects_divisor() {
    let _ = tracing_subscriber::fmt::try_init();

    let tty = divisor_tty();
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();

    assert_eq!(speed.strategies(), &[SpeedStrategy::Divisor]);
}

#[test]
fn exact_divisor_round_trip() {
    let tty = divisor_tty();

    let written = SpeedStrategy::Divisor.apply(&tty, 38_400).unwrap();
    let ControlState::Divisor { serial, .. } = &written else { unreachable!() };
    assert_eq!(serial.custom_divisor(), 48);

    assert_eq!(tty.divisor_state(), (48, ASYNC_SPD_CUST));
    assert_eq!(SpeedStrategy::Divisor.current_rate(&tty).unwrap(), BASE / 48);
    assert_eq!(tty.effective_rate(), 38_400);
}

#[test]
fn rounding_deviation_stays_within_a_step() {
    let tty = divisor_tty();

    // 3000000 is a catalog rate, so drive the strategy directly.
    SpeedStrategy::Divisor.apply(&tty, 3_000_000).unwrap();

    let achieved = SpeedStrategy::Divisor.current_rate(&tty).unwrap();
    assert_eq!(achieved, BASE);
    assert_eq!(tty.divisor_state().0, 1);

    // The achieved rate is off, but the chosen divisor is the nearest one.
    let ideal = f64::from(BASE) / 3_000_000.0;
    assert!((ideal - 1.0).abs() <= 0.5);
}

#[test]
fn non_integral_rate() {
    let tty = divisor_tty();
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();

    speed.set_rate(250_000).unwrap();

    let divisor = tty.divisor_state().0 as u32;
    assert_eq!(divisor, 7);
    assert_eq!(speed.get_rate().unwrap(), BASE / 7);
    assert_eq!(tty.effective_rate(), BASE / 7);
}

#[test]
fn rate_above_clock_range() {
    let tty = divisor_tty();
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();

    let err = speed.set_rate(3_700_000).unwrap_err();

    assert!(matches!(err, SpeedError::InvalidRate { rate: 3_700_000, .. }));
    assert_eq!(tty.effective_rate(), 9_600);
}

#[test]
fn standard_rate_releases_divisor() {
    let tty = divisor_tty();
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();
    speed.set_rate(250_000).unwrap();

    speed.set_rate(38_400).unwrap();

    assert_eq!(tty.divisor_state().1, 0);
    assert_eq!(speed.get_rate().unwrap(), 38_400);
    assert_eq!(tty.effective_rate(), 38_400);
}

#[test]
fn failed_alias_restores_descriptor() {
    let dev = FailingSetState(divisor_tty());
    let before = dev.0.divisor_state();

    let err = SpeedStrategy::Divisor.apply(&dev, 250_000).unwrap_err();

    assert_eq!(err, SpeedError::OsCallFailed(Errno::EIO));
    assert_eq!(dev.0.divisor_state(), before);
    assert_eq!(dev.0.effective_rate(), 9_600);
    let writes = dev.0.requests().into_iter().filter(|r| *r == Request::SetSerial).count();
    assert_eq!(writes, 2);
}

#[test]
fn divisor_refused_by_driver() {
    let tty = divisor_tty();
    let speed = SpeedController::with_strategies(
        &tty,
        SpeedOptions::default().with_strategy(StrategyKind::Divisor),
        vec![SpeedStrategy::Divisor],
    );
    tty.fail_next_write(Errno::EPERM);

    assert_eq!(speed.set_rate(250_000), Err(SpeedError::OsCallFailed(Errno::EPERM)));
    assert_eq!(tty.divisor_state(), (0, 0));
}

#[test]
fn preferred_strategy_is_tried_first() {
    let dev = SilentlyIgnoring(SimTty::new(SimConfig::default().with_clock_base(BASE)));
    let speed = SpeedController::new(dev.clone(), SpeedOptions::default()).unwrap();

    // Wide-flag fails its canary, the divisor takes over.
    speed.set_rate(250_000).unwrap();
    assert_eq!(speed.active_strategy(), SpeedStrategy::Divisor);

    dev.0.clear_requests();
    speed.set_rate(307_200).unwrap();

    assert_eq!(dev.0.requests().first(), Some(&Request::GetSerial));
    assert_eq!(speed.get_rate().unwrap(), 307_200);
}

#[test]
fn failed_standard_write_keeps_custom_divisor() {
    let tty = divisor_tty();
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();
    speed.set_rate(250_000).unwrap();

    let failing = SpeedController::with_strategies(
        FailingSetState(tty.clone()),
        SpeedOptions::default(),
        vec![SpeedStrategy::Divisor],
    );
    let err = failing.set_rate(9_600).unwrap_err();

    assert_eq!(err, SpeedError::OsCallFailed(Errno::EIO));
    assert_eq!(tty.divisor_state(), (7, ASYNC_SPD_CUST));
    assert_eq!(speed.get_rate().unwrap(), BASE / 7);
    assert_eq!(tty.effective_rate(), BASE / 7);
}
