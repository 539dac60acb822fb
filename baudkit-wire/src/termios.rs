//! Kernel termios control blocks.
//!
//! The kernel's `struct termios` / `struct termios2` layout is an environment fact: the length of
//! the control-character array (`NCCS`) is whatever the running kernel was compiled with, and the
//! offsets of the numeric speed fields follow from it. Instead of a fixed `#[repr(C)]` type, a
//! [`ControlBlock`] is a byte buffer paired with a [`Layout`] that knows where each field lives.
//!
//! ```text
//! ┌────────┬────────┬────────┬────────┬──────┬──────────────┬─────┬────────┬────────┐
//! │ iflag  │ oflag  │ cflag  │ lflag  │ line │ cc[cc_len]   │ pad │ ispeed │ ospeed │
//! │ u32 @0 │ u32 @4 │ u32 @8 │ u32 @12│ u8@16│ u8 @17..     │     │ u32    │ u32    │
//! └────────┴────────┴────────┴────────┴──────┴──────────────┴─────┴────────┴────────┘
//!                                                            └── extended layout only ──┘
//! ```

use std::ops::Range;

use bytes::BytesMut;
use nix::libc;

/// Control-character array length of asm-generic kernels.
pub const KERNEL_NCCS: usize = 19;

/// Control-character array length of the C library's `struct termios`, which is 13 entries longer
/// than what most kernels expect.
pub const LIBC_NCCS: usize = KERNEL_NCCS + 13;

/// Capacity allocated for reads through the size-less legacy request. The kernel copies out its
/// own struct size regardless of what the caller allocated, so the buffer must be at least as
/// large as any plausible kernel termios.
pub const LEGACY_GUARD_SIZE: usize = 64;

/// Output speed selector bits in the control-mode field.
pub const CBAUD: u32 = libc::CBAUD as u32;

/// Input speed selector bits in the control-mode field. Zero means "same as output".
pub const CIBAUD: u32 = libc::CIBAUD as u32;

/// Shift from the output selector to the input selector.
pub const IBSHIFT: u32 = 16;

/// Selector value meaning "use the numeric speed fields".
pub const BOTHER: u32 = libc::BOTHER as u32;

/// Selector bit flagging a speed beyond the original legacy table.
pub const CBAUDEX: u32 = libc::CBAUDEX as u32;

const IFLAG: usize = 0;
const OFLAG: usize = 4;
const CFLAG: usize = 8;
const LFLAG: usize = 12;
const LINE: usize = 16;
const CC: usize = 17;

/// How a custom numeric speed is flagged in the control-mode selector bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sentinel {
    /// `BOTHER`: the selector is cleared and replaced by a value that frees the numeric
    /// `ispeed`/`ospeed` fields to carry any integer. Targets kernels with `termios2` support.
    #[default]
    Other,
    /// `CBAUDEX`: the "extended table" flag, which only says the rate lies beyond the original
    /// legacy table while still requiring the numeric fields. Identical to [`Sentinel::Other`] on
    /// asm-generic architectures, but distinct on e.g. powerpc.
    Extended,
}

impl Sentinel {
    /// The selector bits written for this convention.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Other => BOTHER,
            Self::Extended => CBAUDEX,
        }
    }

    /// Whether the output selector in `cflag` carries this sentinel.
    ///
    /// The full selector field is compared, not a single bit: legacy codes such as `B57600`
    /// contain the `CBAUDEX` bit too.
    pub const fn matches(self, cflag: u32) -> bool {
        cflag & CBAUD == self.bits()
    }
}

/// Describes the binary shape of a kernel termios block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    cc_len: usize,
    speed_fields: bool,
}

impl Layout {
    /// The legacy `struct termios` shape for a kernel compiled with `cc_len` control characters.
    pub const fn legacy(cc_len: usize) -> Self {
        Self { cc_len, speed_fields: false }
    }

    /// The `struct termios2` shape (with numeric speed fields) for `cc_len` control characters.
    pub const fn extended(cc_len: usize) -> Self {
        Self { cc_len, speed_fields: true }
    }

    /// The length of the control-character array.
    pub const fn cc_len(&self) -> usize {
        self.cc_len
    }

    /// Whether this layout carries the numeric `ispeed`/`ospeed` fields.
    pub const fn has_speed_fields(&self) -> bool {
        self.speed_fields
    }

    /// Byte range of the control-character array.
    pub const fn cc_range(&self) -> Range<usize> {
        CC..CC + self.cc_len
    }

    /// Offset of `ispeed`, aligned to the 4-byte boundary after the control characters.
    pub const fn ispeed_offset(&self) -> Option<usize> {
        if self.speed_fields {
            Some(align4(CC + self.cc_len))
        } else {
            None
        }
    }

    /// Offset of `ospeed`.
    pub const fn ospeed_offset(&self) -> Option<usize> {
        match self.ispeed_offset() {
            Some(off) => Some(off + 4),
            None => None,
        }
    }

    /// Size in bytes of the C struct this layout describes, including trailing padding.
    pub const fn size(&self) -> usize {
        match self.ospeed_offset() {
            Some(off) => off + 4,
            None => align4(CC + self.cc_len),
        }
    }
}

const fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// A termios control block: an owned, zero-initialised byte buffer interpreted through a
/// [`Layout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlBlock {
    layout: Layout,
    buf: BytesMut,
}

impl ControlBlock {
    /// Allocates a zeroed block exactly [`Layout::size`] bytes long.
    pub fn new(layout: Layout) -> Self {
        Self::with_capacity(layout, layout.size())
    }

    /// Allocates a zeroed block of `capacity` bytes (at least [`Layout::size`]), for requests
    /// where the kernel decides how much it copies out.
    pub fn with_capacity(layout: Layout, capacity: usize) -> Self {
        let len = capacity.max(layout.size());
        Self { layout, buf: BytesMut::zeroed(len) }
    }

    /// The layout used to interpret this block.
    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// The raw bytes, including any guard capacity beyond the layout size.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The raw bytes, mutably. Used as the argument buffer for control requests.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    fn read_u32(&self, off: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.buf[off..off + 4]);
        u32::from_ne_bytes(word)
    }

    fn write_u32(&mut self, off: usize, value: u32) {
        self.buf[off..off + 4].copy_from_slice(&value.to_ne_bytes());
    }

    /// Input mode flags.
    pub fn iflag(&self) -> u32 {
        self.read_u32(IFLAG)
    }

    /// Output mode flags.
    pub fn oflag(&self) -> u32 {
        self.read_u32(OFLAG)
    }

    /// Control mode flags, which hold the speed selector bits.
    pub fn cflag(&self) -> u32 {
        self.read_u32(CFLAG)
    }

    /// Local mode flags.
    pub fn lflag(&self) -> u32 {
        self.read_u32(LFLAG)
    }

    /// Line discipline.
    pub fn line(&self) -> u8 {
        self.buf[LINE]
    }

    /// Control characters.
    pub fn cc(&self) -> &[u8] {
        &self.buf[self.layout.cc_range()]
    }

    /// Numeric input speed, if the layout has one.
    pub fn ispeed(&self) -> Option<u32> {
        self.layout.ispeed_offset().map(|off| self.read_u32(off))
    }

    /// Numeric output speed, if the layout has one.
    pub fn ospeed(&self) -> Option<u32> {
        self.layout.ospeed_offset().map(|off| self.read_u32(off))
    }

    /// Sets the input mode flags.
    pub fn set_iflag(&mut self, value: u32) {
        self.write_u32(IFLAG, value);
    }

    /// Sets the output mode flags.
    pub fn set_oflag(&mut self, value: u32) {
        self.write_u32(OFLAG, value);
    }

    /// Sets the control mode flags, speed selector bits included.
    pub fn set_cflag(&mut self, value: u32) {
        self.write_u32(CFLAG, value);
    }

    /// Sets the local mode flags.
    pub fn set_lflag(&mut self, value: u32) {
        self.write_u32(LFLAG, value);
    }

    /// Sets the line discipline.
    pub fn set_line(&mut self, value: u8) {
        self.buf[LINE] = value;
    }

    /// Copies `cc` into the control-character array, truncating or zero-filling to its length.
    pub fn set_cc(&mut self, cc: &[u8]) {
        let range = self.layout.cc_range();
        let n = cc.len().min(range.len());
        self.buf[range.clone()].fill(0);
        self.buf[range.start..range.start + n].copy_from_slice(&cc[..n]);
    }

    /// Writes both numeric speed fields. Returns `false` (and writes nothing) if the layout has
    /// no speed fields.
    pub fn set_speeds(&mut self, ispeed: u32, ospeed: u32) -> bool {
        match (self.layout.ispeed_offset(), self.layout.ospeed_offset()) {
            (Some(i), Some(o)) => {
                self.write_u32(i, ispeed);
                self.write_u32(o, ospeed);
                true
            }
            _ => false,
        }
    }

    /// The output speed selector (`cflag & CBAUD`).
    pub fn speed_code(&self) -> u32 {
        self.cflag() & CBAUD
    }

    /// Replaces both speed selectors with `code`: the output selector is set and the input
    /// selector cleared, meaning the input speed follows the output speed.
    pub fn set_speed_code(&mut self, code: u32) {
        let cflag = self.cflag() & !(CBAUD | CIBAUD);
        self.set_cflag(cflag | (code & CBAUD));
    }
}
