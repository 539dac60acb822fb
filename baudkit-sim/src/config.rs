use baudkit_wire::termios::KERNEL_NCCS;

/// Describes the emulated kernel and driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// The control-character array length the kernel was built with.
    pub cc_len: usize,
    /// Whether `TCGETS2`/`TCSETS2` are implemented.
    pub extended: bool,
    /// Whether the driver implements `TIOCGSERIAL`/`TIOCSSERIAL`.
    pub serial: bool,
    /// The UART's `baud_base`.
    pub clock_base: u32,
    /// The rate the line starts at. Must be a standard rate.
    pub initial_rate: u32,
    /// Initial file status flags, as raw `O_*` bits.
    pub initial_status: i32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cc_len: KERNEL_NCCS,
            extended: true,
            serial: true,
            clock_base: 115_200,
            initial_rate: 9_600,
            initial_status: nix::libc::O_RDWR | nix::libc::O_NONBLOCK,
        }
    }
}

impl SimConfig {
    /// A 16550-style UART with a 1.8432 MHz clock (`baud_base` 1843200) and no `termios2`.
    pub fn divisor_only() -> Self {
        Self { extended: false, clock_base: 1_843_200, ..Default::default() }
    }

    /// Sets the control-character array length the emulated kernel was built with.
    pub fn with_cc_len(mut self, cc_len: usize) -> Self {
        self.cc_len = cc_len;
        self
    }

    /// Whether `TCGETS2`/`TCSETS2` are recognised.
    pub fn with_extended(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }

    /// Whether the driver answers serial descriptor requests.
    pub fn with_serial(mut self, serial: bool) -> Self {
        self.serial = serial;
        self
    }

    /// Sets the reported `baud_base`.
    pub fn with_clock_base(mut self, clock_base: u32) -> Self {
        self.clock_base = clock_base;
        self
    }

    /// Sets the speed the line starts at.
    pub fn with_initial_rate(mut self, rate: u32) -> Self {
        self.initial_rate = rate;
        self
    }
}
