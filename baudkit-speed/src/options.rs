use baudkit_device::Interface;
use baudkit_wire::{
    termios::{KERNEL_NCCS, LIBC_NCCS},
    Sentinel,
};

/// The custom-rate strategies, without their detected parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// `termios2` with the kernel's standard control-character array length.
    WideFlag,
    /// `termios2` with a probed control-character array length.
    VariableArray,
    /// `serial_struct` custom divisor, aliased to 38400.
    Divisor,
}

impl StrategyKind {
    /// The control interface this kind of strategy drives.
    pub const fn interface(&self) -> Interface {
        match self {
            Self::WideFlag | Self::VariableArray => Interface::Extended,
            Self::Divisor => Interface::Serial,
        }
    }
}

/// Which custom-rate strategies a controller may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomPath {
    /// Commit to a single strategy.
    Fixed(StrategyKind),
    /// Try strategies in order and keep the first that succeeds.
    Preference(Vec<StrategyKind>),
}

impl CustomPath {
    /// The strategies in the order they are tried.
    pub fn kinds(&self) -> &[StrategyKind] {
        match self {
            Self::Fixed(kind) => std::slice::from_ref(kind),
            Self::Preference(kinds) => kinds,
        }
    }
}

impl Default for CustomPath {
    fn default() -> Self {
        Self::Preference(vec![
            StrategyKind::WideFlag,
            StrategyKind::VariableArray,
            StrategyKind::Divisor,
        ])
    }
}

/// Speed configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedOptions {
    /// Strategies used for rates outside the standard catalog.
    pub custom_path: CustomPath,
    /// How custom numeric speeds are flagged in the control-mode field.
    pub sentinel: Sentinel,
    /// Control-character array lengths the variable-array strategy probes, in order.
    pub cc_len_candidates: Vec<usize>,
    /// Read back the first custom-path write of each strategy and compare.
    pub canary: bool,
}

impl Default for SpeedOptions {
    fn default() -> Self {
        Self {
            custom_path: CustomPath::default(),
            sentinel: Sentinel::default(),
            cc_len_candidates: vec![KERNEL_NCCS, LIBC_NCCS],
            canary: true,
        }
    }
}

impl SpeedOptions {
    /// Commits to a single custom-rate strategy.
    pub fn with_strategy(mut self, kind: StrategyKind) -> Self {
        self.custom_path = CustomPath::Fixed(kind);
        self
    }

    /// Sets the custom-rate strategy preference order.
    pub fn with_preference(mut self, kinds: impl IntoIterator<Item = StrategyKind>) -> Self {
        self.custom_path = CustomPath::Preference(kinds.into_iter().collect());
        self
    }

    /// Sets the selector bit the extended strategies write.
    pub fn with_sentinel(mut self, sentinel: Sentinel) -> Self {
        self.sentinel = sentinel;
        self
    }

    /// Sets the control-character array lengths the variable-array probe tries, in order.
    pub fn with_cc_len_candidates(mut self, candidates: impl IntoIterator<Item = usize>) -> Self {
        self.cc_len_candidates = candidates.into_iter().collect();
        self
    }

    /// Enables or disables the first-write read-back check.
    pub fn with_canary(mut self, canary: bool) -> Self {
        self.canary = canary;
        self
    }
}
