use baudkit_sim::{SimConfig, SimTty};
use baudkit_speed::{get_rate, set_rate, SpeedController, SpeedError, SpeedOptions};
use baudkit_wire::{catalog, termios::CBAUD};
use nix::{fcntl::OFlag, libc};

#[test]
fn standard_round_trip() {
    let _ = tracing_subscriber::fmt::try_init();

    let tty = SimTty::new(SimConfig::default().with_initial_rate(115_200));

    set_rate(&tty, 9_600).unwrap();

    assert_eq!(get_rate(&tty).unwrap(), 9_600);
    assert_eq!(tty.effective_rate(), 9_600);
}

#[test]
fn every_catalog_rate_round_trips() {
    let tty = SimTty::default();
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();

    for entry in catalog::entries() {
        speed.set_rate(entry.rate).unwrap();
        assert_eq!(speed.get_rate().unwrap(), entry.rate);
        assert_eq!(tty.cflag() & CBAUD, entry.code);
    }
}

#[test]
fn standard_rates_use_the_portable_interface_only() {
    let tty = SimTty::new(SimConfig::default().with_serial(false));
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();
    tty.clear_requests();

    speed.set_rate(115_200).unwrap();

    assert!(tty.requests().iter().all(|r| r.interface() == baudkit_device::Interface::Legacy));
}

#[test]
fn unrelated_control_flags_survive() {
    let tty = SimTty::default();
    let framing = libc::CS7 as u32 | libc::PARENB as u32 | libc::CSTOPB as u32;
    tty.set_cflag(libc::B9600 as u32 | framing);

    set_rate(&tty, 57_600).unwrap();

    assert_eq!(tty.cflag() & !CBAUD, framing);
    assert_eq!(get_rate(&tty).unwrap(), 57_600);
}

#[test]
fn legacy_only_kernel() {
    let tty = SimTty::new(SimConfig::default().with_extended(false).with_serial(false));
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();
    assert!(speed.strategies().is_empty());

    speed.set_rate(230_400).unwrap();
    assert_eq!(speed.get_rate().unwrap(), 230_400);

    assert_eq!(speed.set_rate(250_000), Err(SpeedError::NoStrategy { rate: 250_000 }));
    assert_eq!(speed.get_rate().unwrap(), 230_400);
}

#[test]
fn zero_rate_is_rejected() {
    let tty = SimTty::default();
    assert!(matches!(set_rate(&tty, 0), Err(SpeedError::InvalidRate { rate: 0, .. })));
    assert_eq!(tty.effective_rate(), 9_600);
}

#[test]
fn clear_nonblocking_through_controller() {
    let tty = SimTty::default();
    let speed = SpeedController::new(&tty, SpeedOptions::default()).unwrap();
    assert!(speed.status_flags().unwrap().contains(OFlag::O_NONBLOCK));

    speed.clear_nonblocking().unwrap();
    speed.clear_nonblocking().unwrap();

    assert_eq!(speed.status_flags().unwrap(), OFlag::empty());
    // Speed configuration is unaffected.
    assert_eq!(speed.get_rate().unwrap(), 9_600);
}
