#![doc(issue_tracker_base_url = "https://github.com/chainbound/baudkit/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! The device seam: everything speed configuration needs from an open serial descriptor.
//!
//! [`Device`] abstracts the handful of kernel control requests involved, so that the same
//! strategies run against a real descriptor ([`Tty`]) or an emulated one.

use std::fmt;

use nix::fcntl::OFlag;

mod tty;
pub use tty::Tty;

/// A kernel control-interface generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    /// `TCGETS` / `TCSETS` with the legacy `struct termios`.
    Legacy,
    /// `TCGETS2` / `TCSETS2` with `struct termios2` and numeric speed fields.
    Extended,
    /// `TIOCGSERIAL` / `TIOCSSERIAL` with `struct serial_struct`.
    Serial,
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "termios"),
            Self::Extended => write!(f, "termios2"),
            Self::Serial => write!(f, "serial_struct"),
        }
    }
}

/// A control request on a serial descriptor. The argument buffer is the request's control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    /// Read the legacy termios. The kernel copies out its own struct size, so the buffer must
    /// carry guard capacity.
    GetState,
    /// Write the legacy termios, applied immediately.
    SetState,
    /// Read a termios2 block of exactly `len` bytes. The size is encoded in the request number,
    /// so a kernel compiled with a different layout rejects the request.
    GetExtended { len: usize },
    /// Write a termios2 block of exactly `len` bytes.
    SetExtended { len: usize },
    /// Read the hardware descriptor.
    GetSerial,
    /// Write the hardware descriptor.
    SetSerial,
}

impl Request {
    /// The interface generation this request belongs to.
    pub const fn interface(&self) -> Interface {
        match self {
            Self::GetState | Self::SetState => Interface::Legacy,
            Self::GetExtended { .. } | Self::SetExtended { .. } => Interface::Extended,
            Self::GetSerial | Self::SetSerial => Interface::Serial,
        }
    }

    /// Whether the kernel fills the buffer (as opposed to reading it).
    pub const fn is_read(&self) -> bool {
        matches!(self, Self::GetState | Self::GetExtended { .. } | Self::GetSerial)
    }
}

/// An open serial descriptor that accepts control requests.
///
/// Implementations must not retry: a failed request is reported as-is.
pub trait Device {
    /// Issues `request` with `buf` as its argument block.
    fn request(&self, request: Request, buf: &mut [u8]) -> nix::Result<()>;

    /// Returns the descriptor's file status flags.
    fn status_flags(&self) -> nix::Result<OFlag>;

    /// Overwrites the descriptor's file status flags.
    fn set_status_flags(&self, flags: OFlag) -> nix::Result<()>;
}

impl<D: Device + ?Sized> Device for &D {
    fn request(&self, request: Request, buf: &mut [u8]) -> nix::Result<()> {
        (**self).request(request, buf)
    }

    fn status_flags(&self) -> nix::Result<OFlag> {
        (**self).status_flags()
    }

    fn set_status_flags(&self, flags: OFlag) -> nix::Result<()> {
        (**self).set_status_flags(flags)
    }
}
