use std::{env, fs::OpenOptions, os::unix::fs::OpenOptionsExt};

use baudkit::{SpeedOptions, SpeedStrategy, Tty};
use nix::libc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let Some(path) = env::args().nth(1) else {
        return Err("usage: getbaudrate <device>".into());
    };

    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(&path)?;
    let tty = Tty::new(file);

    // Every strategy the device answers to, and what each one reads back.
    let mut strategies = vec![SpeedStrategy::Portable];
    strategies.extend(baudkit::probe::detect(&tty, &SpeedOptions::default())?);

    println!("{:<40} rate", "strategy");
    for strategy in strategies {
        println!("{:<40} {}", format!("{strategy:?}"), strategy.current_rate(&tty)?);
    }

    Ok(())
}
