use baudkit_device::{Interface, Request};
use nix::errno::Errno;
use thiserror::Error;

/// Errors returned by speed configuration. Nothing is retried internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpeedError {
    /// The kernel or driver does not implement the control interface a strategy needs.
    #[error("{interface} interface unsupported: {errno}")]
    UnsupportedInterface { interface: Interface, errno: Errno },
    /// The rate cannot be expressed through the chosen path.
    #[error("Invalid rate {rate}: {reason}")]
    InvalidRate { rate: u32, reason: &'static str },
    /// A control request failed for a reason other than missing support.
    #[error("OS call failed: {0}")]
    OsCallFailed(#[from] Errno),
    /// Reading back a freshly written rate returned something else, which points at a layout the
    /// kernel interprets differently than we do.
    #[error("Layout mismatch: wrote {requested}, read back {observed}")]
    LayoutMismatch { requested: u32, observed: u32 },
    /// None of the configured custom-rate strategies is available on this device.
    #[error("No custom-rate strategy available for rate {rate}")]
    NoStrategy { rate: u32 },
}

impl SpeedError {
    /// Classifies a failed control request.
    ///
    /// `ENOTTY`/`ENOSYS` always mean the interface is missing. `EINVAL` on a read means the
    /// request (and with it the layout encoded in it) was rejected; on a write it may just as well
    /// be the value, so it stays an OS failure.
    pub fn from_request(request: Request, errno: Errno) -> Self {
        match errno {
            Errno::ENOTTY | Errno::ENOSYS => {
                Self::UnsupportedInterface { interface: request.interface(), errno }
            }
            Errno::EINVAL if request.is_read() => {
                Self::UnsupportedInterface { interface: request.interface(), errno }
            }
            errno => Self::OsCallFailed(errno),
        }
    }

    /// Whether a different strategy might succeed where this one failed.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnsupportedInterface { .. } | Self::LayoutMismatch { .. })
    }

    /// The underlying OS error code, if any.
    pub const fn errno(&self) -> Option<Errno> {
        match self {
            Self::UnsupportedInterface { errno, .. } => Some(*errno),
            Self::OsCallFailed(errno) => Some(*errno),
            _ => None,
        }
    }
}

/// Result alias for speed operations.
pub type Result<T> = std::result::Result<T, SpeedError>;
