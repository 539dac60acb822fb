use baudkit_device::{Interface, Request};
use baudkit_sim::{SimConfig, SimTty};
use baudkit_speed::{
    get_rate, set_rate, Sentinel, SpeedController, SpeedError, SpeedOptions, SpeedStrategy,
    StrategyKind,
};
use baudkit_wire::termios::{BOTHER, CBAUD, LIBC_NCCS};
use nix::{errno::Errno, libc};
use rand::Rng;

use crate::helpers::{ClampingSpeeds, SilentlyIgnoring};

#[test]
fn wide_flag_round_trip_is_exact() {
    let _ = tracing_subscriber::fmt::try_init();

    let tty = SimTty::default();

    set_rate(&tty, 500_000).unwrap();

    assert_eq!(get_rate(&tty).unwrap(), 500_000);
    assert_eq!(tty.cflag() & CBAUD, BOTHER);
    assert_eq!(tty.speeds(), (500_000, 500_000));
}

#[test]
fn random_custom_rates_round_trip() {
    let tty = SimTty::default();
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();
    let mut rng = rand::thread_rng();

    for _ in 0..256 {
        let rate = rng.gen_range(1..=12_000_000);
        speed.set_rate(rate).unwrap();
        assert_eq!(speed.get_rate().unwrap(), rate);
    }
}

#[test]
fn variable_array_on_wide_kernel() {
    let tty = SimTty::new(SimConfig::default().with_cc_len(LIBC_NCCS).with_serial(false));
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();
    assert_eq!(
        speed.strategies(),
        &[SpeedStrategy::VariableArray { sentinel: Sentinel::Other, cc_len: LIBC_NCCS }]
    );

    speed.set_rate(31_250).unwrap();

    assert_eq!(speed.get_rate().unwrap(), 31_250);
    assert_eq!(tty.effective_rate(), 31_250);
}

#[test]
fn extended_sentinel_convention() {
    let tty = SimTty::default();
    let options = SpeedOptions::default()
        .with_strategy(StrategyKind::WideFlag)
        .with_sentinel(Sentinel::Extended);
    let speed = SpeedController::new(&tty, options).unwrap();

    speed.set_rate(250_000).unwrap();

    assert_eq!(tty.cflag() & CBAUD, libc::CBAUDEX as u32);
    assert_eq!(speed.get_rate().unwrap(), 250_000);
}

#[test]
fn custom_then_standard() {
    let tty = SimTty::default();
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();

    speed.set_rate(250_000).unwrap();
    speed.set_rate(19_200).unwrap();

    assert_eq!(speed.get_rate().unwrap(), 19_200);
    assert_eq!(tty.speeds(), (19_200, 19_200));
}

#[test]
fn failed_write_keeps_previous_rate() {
    let tty = SimTty::default();
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();
    speed.set_rate(500_000).unwrap();

    tty.fail_next_write(Errno::EIO);
    assert_eq!(speed.set_rate(250_000), Err(SpeedError::OsCallFailed(Errno::EIO)));

    assert_eq!(speed.get_rate().unwrap(), 500_000);
}

#[test]
fn fixed_strategy_missing_from_kernel() {
    let tty = SimTty::new(SimConfig::default().with_extended(false));
    let speed =
        SpeedController::new(&tty, SpeedOptions::default().with_strategy(StrategyKind::WideFlag))
            .unwrap();

    assert!(speed.strategies().is_empty());
    assert_eq!(speed.set_rate(500_000), Err(SpeedError::NoStrategy { rate: 500_000 }));
}

#[test]
fn unsupported_write_without_fallback_is_surfaced() {
    let tty = SimTty::default();
    let strategy = SpeedStrategy::WideFlag { sentinel: Sentinel::Other };
    let speed = SpeedController::with_strategies(
        &tty,
        SpeedOptions::default().with_strategy(StrategyKind::WideFlag),
        vec![strategy],
    );

    tty.fail_interface(Interface::Extended, Errno::ENOTTY);

    assert_eq!(
        speed.set_rate(500_000),
        Err(SpeedError::UnsupportedInterface {
            interface: Interface::Extended,
            errno: Errno::ENOTTY
        })
    );
}

#[test]
fn canary_catches_silently_ignored_writes() {
    let dev = SilentlyIgnoring::default();
    let options = SpeedOptions::default().with_strategy(StrategyKind::WideFlag);
    let speed = SpeedController::new(dev.clone(), options).unwrap();

    let err = speed.set_rate(500_000).unwrap_err();

    assert_eq!(err, SpeedError::LayoutMismatch { requested: 500_000, observed: 9_600 });
}

#[test]
fn canary_mismatch_falls_back_to_divisor() {
    let dev = SilentlyIgnoring(SimTty::new(SimConfig::default().with_clock_base(1_843_200)));
    let speed = SpeedController::new(dev.clone(), SpeedOptions::default()).unwrap();

    speed.set_rate(307_200).unwrap();

    assert_eq!(speed.active_strategy(), SpeedStrategy::Divisor);
    assert_eq!(dev.0.effective_rate(), 307_200);
    assert_eq!(speed.get_rate().unwrap(), 307_200);
}

#[test]
fn canary_runs_once_per_strategy() {
    let tty = SimTty::default();
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();

    speed.set_rate(500_000).unwrap();
    tty.clear_requests();
    speed.set_rate(250_000).unwrap();

    let requests = tty.requests();
    assert_eq!(requests.iter().filter(|r| r.is_read()).count(), 1);
    assert!(matches!(
        requests.as_slice(),
        [Request::GetExtended { .. }, Request::SetExtended { .. }]
    ));
}

#[test]
fn canary_mismatch_restores_previous_rate() {
    let dev = ClampingSpeeds { tty: SimTty::default(), ceiling: 230_400 };
    let options = SpeedOptions::default().with_strategy(StrategyKind::WideFlag);
    let speed = SpeedController::new(dev.clone(), options).unwrap();

    let err = speed.set_rate(500_000).unwrap_err();

    assert_eq!(err, SpeedError::LayoutMismatch { requested: 500_000, observed: 230_400 });
    assert_eq!(speed.get_rate().unwrap(), 9_600);
    assert_eq!(dev.tty.effective_rate(), 9_600);
}

#[test]
fn free_functions_read_back_custom_divisor() {
    let dev = SilentlyIgnoring(SimTty::new(SimConfig::default().with_clock_base(1_843_200)));

    set_rate(&dev, 307_200).unwrap();

    assert_eq!(dev.0.effective_rate(), 307_200);
    assert_eq!(get_rate(&dev).unwrap(), 307_200);
}
