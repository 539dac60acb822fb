use std::{env, fs::OpenOptions, os::unix::fs::OpenOptionsExt};

use baudkit::{SpeedController, SpeedOptions, Tty};
use nix::libc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let (Some(path), Some(rate)) = (args.next(), args.next()) else {
        return Err("usage: setbaudrate <device> <rate>".into());
    };
    let rate: u32 = rate.parse()?;

    // Don't become the controlling terminal and don't wait for carrier detect on open.
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(&path)?;

    let speed = SpeedController::new(Tty::new(file), SpeedOptions::default())?;
    speed.clear_nonblocking()?;

    tracing::info!(strategies = ?speed.strategies(), "detected");

    speed.set_rate(rate)?;
    println!("set baud rate of {path:?} to {rate} baud, reading back {}", speed.get_rate()?);

    Ok(())
}
