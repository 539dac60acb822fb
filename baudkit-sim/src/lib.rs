#![doc(issue_tracker_base_url = "https://github.com/chainbound/baudkit/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! An in-memory serial device that answers control requests the way a Linux tty driver would.
//!
//! The emulated kernel is configurable along the axes that make speed configuration hard on real
//! hosts: which control-interface generations it implements, the control-character array length
//! it was "compiled" with, and the UART clock base. Failures can be injected per request.
//!
//! ```
//! use baudkit_device::{Device, Interface, Request};
//! use baudkit_sim::{SimConfig, SimTty};
//!
//! let tty = SimTty::new(SimConfig::default().with_extended(false));
//! let mut buf = [0u8; 64];
//! assert!(tty.request(Request::GetExtended { len: 44 }, &mut buf).is_err());
//! ```

mod config;
mod kernel;

pub use config::SimConfig;

use std::sync::Arc;

use baudkit_device::{Device, Interface, Request};
use nix::{errno::Errno, fcntl::OFlag};
use parking_lot::Mutex;

use kernel::KernelState;

/// An emulated serial device. Clones share the same kernel state, like duplicated descriptors.
#[derive(Debug, Clone)]
pub struct SimTty {
    config: SimConfig,
    state: Arc<Mutex<KernelState>>,
}

impl Default for SimTty {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl SimTty {
    /// Creates a device in the state `config` describes.
    pub fn new(config: SimConfig) -> Self {
        let state = KernelState::new(&config);
        Self { config, state: Arc::new(Mutex::new(state)) }
    }

    /// The configuration this device was created with.
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The rate the emulated UART is actually clocked at, taking divisor aliasing into account.
    pub fn effective_rate(&self) -> u32 {
        self.state.lock().effective_rate()
    }

    /// The stored control-mode flags.
    pub fn cflag(&self) -> u32 {
        self.state.lock().cflag
    }

    /// Overwrites the stored control-mode flags, e.g. to seed parity bits.
    pub fn set_cflag(&self, cflag: u32) {
        self.state.lock().cflag = cflag;
    }

    /// The stored numeric input and output speeds.
    pub fn speeds(&self) -> (u32, u32) {
        let state = self.state.lock();
        (state.ispeed, state.ospeed)
    }

    /// The hardware descriptor's custom divisor and speed-source flags.
    pub fn divisor_state(&self) -> (i32, i32) {
        let state = self.state.lock();
        (state.serial.custom_divisor(), state.serial.speed_source())
    }

    /// Makes the next state-changing request fail with `errno`, leaving state untouched.
    pub fn fail_next_write(&self, errno: Errno) {
        self.state.lock().fail_next_write = Some(errno);
    }

    /// Makes every request (reads included) on `interface` fail with `errno`.
    pub fn fail_interface(&self, interface: Interface, errno: Errno) {
        self.state.lock().failing.push((interface, errno));
    }

    /// Every request issued so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().requests.clone()
    }

    /// Forgets the request log.
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }
}

impl Device for SimTty {
    fn request(&self, request: Request, buf: &mut [u8]) -> nix::Result<()> {
        let mut state = self.state.lock();
        state.requests.push(request);

        let res = state.handle(&self.config, request, buf);
        tracing::debug!(?request, ?res, "emulated control request");
        res
    }

    fn status_flags(&self) -> nix::Result<OFlag> {
        Ok(self.state.lock().status)
    }

    fn set_status_flags(&self, flags: OFlag) -> nix::Result<()> {
        self.state.lock().status = flags;
        Ok(())
    }
}
