//! The legacy `struct serial_struct` hardware descriptor and divisor arithmetic.
//!
//! Reference: <linux/serial.h>. Only the fields that take part in speed selection have typed
//! accessors; the rest of the block is carried through a read-modify-write untouched.

use bytes::BytesMut;

/// `flags`: speed-source bits, cleared before selecting a new source.
pub const ASYNC_SPD_MASK: i32 = 0x1030;
/// `flags`: 38400 aliases to 57600.
pub const ASYNC_SPD_HI: i32 = 0x0010;
/// `flags`: 38400 aliases to 115200.
pub const ASYNC_SPD_VHI: i32 = 0x0020;
/// `flags`: 38400 aliases to 230400.
pub const ASYNC_SPD_SHI: i32 = 0x1000;
/// `flags`: 38400 aliases to 460800.
pub const ASYNC_SPD_WARP: i32 = 0x1010;
/// `flags`: 38400 aliases to `baud_base / custom_divisor`.
pub const ASYNC_SPD_CUST: i32 = 0x0030;

/// The termios rate that the driver replaces with the custom divisor rate.
pub const ALIAS_RATE: u32 = 38_400;

const FLAGS: usize = 16;
const CUSTOM_DIVISOR: usize = 24;
const BAUD_BASE: usize = 28;
// `iomem_base` is the first pointer-sized member and starts right after `closing_wait2`.
const POINTER_TAIL: usize = 44;

/// Size of `struct serial_struct` for the pointer width of this target.
pub const fn serial_struct_size() -> usize {
    let ptr = std::mem::size_of::<usize>();
    let iomem_base = align(POINTER_TAIL, ptr);
    // iomem_base, iomem_reg_shift (u16), port_high (u32), iomap_base (ulong)
    let port_high = align(iomem_base + ptr + 2, 4);
    let iomap_base = align(port_high + 4, ptr);
    align(iomap_base + ptr, ptr)
}

const fn align(n: usize, to: usize) -> usize {
    (n + to - 1) & !(to - 1)
}

/// A `serial_struct` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialBlock {
    buf: BytesMut,
}

impl Default for SerialBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialBlock {
    /// Allocates a zeroed block.
    pub fn new() -> Self {
        Self { buf: BytesMut::zeroed(serial_struct_size()) }
    }

    /// The raw struct bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The raw struct bytes, for handing to the kernel.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    fn read_i32(&self, off: usize) -> i32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.buf[off..off + 4]);
        i32::from_ne_bytes(word)
    }

    fn write_i32(&mut self, off: usize, value: i32) {
        self.buf[off..off + 4].copy_from_slice(&value.to_ne_bytes());
    }

    /// `ASYNC_*` flags word.
    pub fn flags(&self) -> i32 {
        self.read_i32(FLAGS)
    }

    /// Overwrites the flags word.
    pub fn set_flags(&mut self, flags: i32) {
        self.write_i32(FLAGS, flags);
    }

    /// Divisor applied to `baud_base` when the custom speed source is selected.
    pub fn custom_divisor(&self) -> i32 {
        self.read_i32(CUSTOM_DIVISOR)
    }

    /// Sets the custom divisor without touching the flags.
    pub fn set_custom_divisor(&mut self, divisor: i32) {
        self.write_i32(CUSTOM_DIVISOR, divisor);
    }

    /// The UART reference clock divided by 16, in baud.
    pub fn baud_base(&self) -> i32 {
        self.read_i32(BAUD_BASE)
    }

    /// Sets the clock base.
    pub fn set_baud_base(&mut self, base: i32) {
        self.write_i32(BAUD_BASE, base);
    }

    /// The active speed source (`flags & ASYNC_SPD_MASK`).
    pub fn speed_source(&self) -> i32 {
        self.flags() & ASYNC_SPD_MASK
    }

    /// Switches the speed source to the custom divisor, leaving unrelated flags intact.
    pub fn select_custom_divisor(&mut self, divisor: i32) {
        let flags = (self.flags() & !ASYNC_SPD_MASK) | ASYNC_SPD_CUST;
        self.set_flags(flags);
        self.set_custom_divisor(divisor);
    }
}

/// Rounds `base / rate` half-up: `(base + rate / 2) / rate`.
///
/// Returns `None` if `rate` is zero or the rounded divisor would be zero (rate above twice the
/// base) or does not fit the descriptor's `int` field.
pub fn divisor_for(base: u32, rate: u32) -> Option<u32> {
    if rate == 0 {
        return None;
    }
    let divisor = (u64::from(base) + u64::from(rate / 2)) / u64::from(rate);
    match u32::try_from(divisor) {
        Ok(0) | Err(_) => None,
        Ok(d) if d > i32::MAX as u32 => None,
        Ok(d) => Some(d),
    }
}

/// The rate a UART actually runs at for a given clock base and divisor.
pub const fn effective_rate(base: u32, divisor: u32) -> Option<u32> {
    if divisor == 0 {
        None
    } else {
        Some(base / divisor)
    }
}
