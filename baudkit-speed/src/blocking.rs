use baudkit_device::Device;
use nix::fcntl::OFlag;

use crate::Result;

/// Puts the descriptor in blocking mode by overwriting its file status flags with the empty set.
///
/// This is not a single-bit clear: every other status flag, such as `O_APPEND` or `O_ASYNC`, is
/// discarded as well. Applying it twice has the same effect as applying it once.
pub fn clear_nonblocking<D: Device>(dev: &D) -> Result<()> {
    dev.set_status_flags(OFlag::empty())?;
    Ok(())
}

/// Returns the descriptor's current file status flags.
pub fn status_flags<D: Device>(dev: &D) -> Result<OFlag> {
    Ok(dev.status_flags()?)
}
