#![doc(issue_tracker_base_url = "https://github.com/chainbound/baudkit/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Serial line speed configuration on Linux.
//!
//! The kernel exposes line speed through several incompatible control-interface generations:
//! enumerated speed codes in the legacy `termios`, numeric speed fields in `termios2` (whose
//! layout depends on how the kernel was built), and a custom divisor in the UART's hardware
//! descriptor. This crate picks the right one per rate:
//!
//! - Rates in the [catalog](baudkit_wire::catalog) use the portable enumerated-code interface.
//! - Other rates use one of the custom [`SpeedStrategy`] variants, detected per device.
//!
//! ```no_run
//! use std::fs::OpenOptions;
//!
//! use baudkit_device::Tty;
//! use baudkit_speed::{SpeedController, SpeedOptions};
//!
//! let file = OpenOptions::new().read(true).write(true).open("/dev/ttyUSB0")?;
//! let speed = SpeedController::new(Tty::new(file), SpeedOptions::default())?;
//!
//! speed.set_rate(250_000)?;
//! assert_eq!(speed.get_rate()?, 250_000);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Nothing here retries. A kernel that silently misinterprets a guessed layout without failing the
//! request cannot be detected beyond the read-back canary a [`SpeedController`] performs on first
//! use of each strategy.

mod blocking;
mod controller;
mod error;
mod options;
pub mod probe;
mod strategy;

pub use blocking::{clear_nonblocking, status_flags};
pub use controller::{get_rate, set_rate, SpeedController};
pub use error::{Result, SpeedError};
pub use options::{CustomPath, SpeedOptions, StrategyKind};
pub use strategy::{release_divisor, restore_serial, ControlState, SpeedStrategy};

pub use baudkit_wire::{lookup_code, lookup_rate, Sentinel};
