use std::os::fd::{AsFd, AsRawFd};

use baudkit_wire::{serial::serial_struct_size, termios::LEGACY_GUARD_SIZE};
use nix::{
    errno::Errno,
    fcntl::{fcntl, FcntlArg, OFlag},
    libc,
    sys::ioctl::ioctl_num_type,
};

use crate::{Device, Request};

/// A serial device backed by an open file descriptor.
///
/// The descriptor is borrowed or owned through `F`; opening and closing it is the caller's
/// business. Requests go straight to `ioctl(2)` and `fcntl(2)`.
#[derive(Debug)]
pub struct Tty<F> {
    fd: F,
}

impl<F: AsFd> Tty<F> {
    /// Wraps an open descriptor.
    pub const fn new(fd: F) -> Self {
        Self { fd }
    }

    /// Returns the underlying descriptor.
    pub fn into_inner(self) -> F {
        self.fd
    }

    fn ioctl(&self, code: ioctl_num_type, buf: &mut [u8]) -> nix::Result<()> {
        // SAFETY: every request code used here copies at most `buf.len()` bytes, which
        // `checked_code` verified against the request's block size.
        let res = unsafe { libc::ioctl(self.fd.as_fd().as_raw_fd(), code, buf.as_mut_ptr()) };
        Errno::result(res).map(drop)
    }
}

/// Maps a request to its ioctl number, refusing buffers the kernel could overrun.
fn checked_code(request: Request, buf_len: usize) -> nix::Result<ioctl_num_type> {
    let min = match request {
        Request::GetState | Request::SetState => LEGACY_GUARD_SIZE,
        Request::GetExtended { len } | Request::SetExtended { len } => len,
        Request::GetSerial | Request::SetSerial => serial_struct_size(),
    };
    if buf_len < min {
        return Err(Errno::EFAULT);
    }

    let code = match request {
        Request::GetState => libc::TCGETS as ioctl_num_type,
        Request::SetState => libc::TCSETS as ioctl_num_type,
        Request::GetExtended { len } => {
            let (ty, nr) = split(libc::TCGETS2 as ioctl_num_type);
            nix::request_code_read!(ty, nr, len)
        }
        Request::SetExtended { len } => {
            let (ty, nr) = split(libc::TCSETS2 as ioctl_num_type);
            nix::request_code_write!(ty, nr, len)
        }
        Request::GetSerial => libc::TIOCGSERIAL as ioctl_num_type,
        Request::SetSerial => libc::TIOCSSERIAL as ioctl_num_type,
    };

    Ok(code)
}

/// Splits an ioctl number into its type and sequence number, so that the same request can be
/// re-encoded with a different argument size.
const fn split(code: ioctl_num_type) -> (ioctl_num_type, ioctl_num_type) {
    ((code >> 8) & 0xff, code & 0xff)
}

impl<F: AsFd> Device for Tty<F> {
    fn request(&self, request: Request, buf: &mut [u8]) -> nix::Result<()> {
        let code = checked_code(request, buf.len())?;
        tracing::trace!(?request, code, "ioctl");
        self.ioctl(code, buf)
    }

    fn status_flags(&self) -> nix::Result<OFlag> {
        let bits = fcntl(self.fd.as_fd().as_raw_fd(), FcntlArg::F_GETFL)?;
        Ok(OFlag::from_bits_truncate(bits))
    }

    fn set_status_flags(&self, flags: OFlag) -> nix::Result<()> {
        fcntl(self.fd.as_fd().as_raw_fd(), FcntlArg::F_SETFL(flags)).map(drop)
    }
}
