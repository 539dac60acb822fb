//! The standard rate catalog.
//!
//! Maps the numeric baud rates the kernel knows as enumerated `B*` speed codes to those codes and
//! back. Lookups are exact: a rate that is not in the table is "custom", never rounded to the
//! nearest standard entry.

use nix::libc;

/// A single catalog entry: a numeric rate and the kernel speed code selecting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CatalogEntry {
    /// The numeric rate in baud.
    pub rate: u32,
    /// The enumerated speed code (`B*` constant) stored in the control-mode selector bits.
    pub code: u32,
}

const fn entry(rate: u32, code: libc::speed_t) -> CatalogEntry {
    CatalogEntry { rate, code: code as u32 }
}

/// Every standard rate, in ascending order. Code `B0` (hang up) is deliberately absent.
pub const CATALOG: [CatalogEntry; 30] = [
    entry(50, libc::B50),
    entry(75, libc::B75),
    entry(110, libc::B110),
    // B134 is really 134.5 baud.
    entry(134, libc::B134),
    entry(150, libc::B150),
    entry(200, libc::B200),
    entry(300, libc::B300),
    entry(600, libc::B600),
    entry(1_200, libc::B1200),
    entry(1_800, libc::B1800),
    entry(2_400, libc::B2400),
    entry(4_800, libc::B4800),
    entry(9_600, libc::B9600),
    entry(19_200, libc::B19200),
    entry(38_400, libc::B38400),
    entry(57_600, libc::B57600),
    entry(115_200, libc::B115200),
    entry(230_400, libc::B230400),
    entry(460_800, libc::B460800),
    entry(500_000, libc::B500000),
    entry(576_000, libc::B576000),
    entry(921_600, libc::B921600),
    entry(1_000_000, libc::B1000000),
    entry(1_152_000, libc::B1152000),
    entry(1_500_000, libc::B1500000),
    entry(2_000_000, libc::B2000000),
    entry(2_500_000, libc::B2500000),
    entry(3_000_000, libc::B3000000),
    entry(3_500_000, libc::B3500000),
    entry(4_000_000, libc::B4000000),
];

/// Returns the speed code for `rate`, or `None` if `rate` is not a standard rate.
pub fn lookup_code(rate: u32) -> Option<u32> {
    CATALOG.iter().find(|e| e.rate == rate).map(|e| e.code)
}

/// Returns the numeric rate selected by `code`, or `None` if `code` is not a catalog code.
pub fn lookup_rate(code: u32) -> Option<u32> {
    CATALOG.iter().find(|e| e.code == code).map(|e| e.rate)
}

/// Whether `rate` can be configured through the portable, enumerated-code interface.
pub fn is_standard(rate: u32) -> bool {
    lookup_code(rate).is_some()
}

/// Iterates over all catalog entries in ascending rate order.
pub fn entries() -> impl Iterator<Item = CatalogEntry> {
    CATALOG.iter().copied()
}
