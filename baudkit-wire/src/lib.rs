#![doc(issue_tracker_base_url = "https://github.com/chainbound/baudkit/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Binary shapes exchanged with the kernel when configuring serial line speed, and the catalog of
//! standard rates.

pub mod catalog;
pub mod serial;
pub mod termios;

pub use catalog::{is_standard, lookup_code, lookup_rate, CatalogEntry};
pub use serial::{divisor_for, effective_rate, SerialBlock};
pub use termios::{ControlBlock, Layout, Sentinel};
