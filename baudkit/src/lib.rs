#![doc(issue_tracker_base_url = "https://github.com/chainbound/baudkit/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub use baudkit_device::*;
pub use baudkit_speed::*;
pub use baudkit_wire::{catalog, serial, termios};
