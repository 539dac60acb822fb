//! Structural probe strategies.
//!
//! Each [`SpeedStrategy`] variant is tied to one kernel control-interface generation and knows
//! the binary shape of that generation's control block. All of them follow the same
//! read-modify-write cycle:
//!
//! 1. [`read_state`](SpeedStrategy::read_state) copies the kernel's current block out,
//! 2. [`encode`](SpeedStrategy::encode) rewrites the speed-relevant fields for a rate,
//! 3. [`write_state`](SpeedStrategy::write_state) hands the block back.
//!
//! The cycle is not atomic: another writer changing unrelated fields (parity, say) between steps
//! 1 and 3 has its change overwritten. Callers configuring the same descriptor concurrently must
//! serialise access themselves.

use baudkit_device::{Device, Interface, Request};
use baudkit_wire::{
    catalog,
    serial::{
        divisor_for, effective_rate, SerialBlock, ALIAS_RATE, ASYNC_SPD_CUST, ASYNC_SPD_MASK,
    },
    termios::{ControlBlock, Layout, KERNEL_NCCS, LEGACY_GUARD_SIZE},
    Sentinel,
};

use crate::{options::StrategyKind, Result, SpeedError};

/// A way of reading and writing a device's speed-relevant control state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeedStrategy {
    /// Legacy `termios` with enumerated speed codes. Standard rates only.
    Portable,
    /// `termios2` with the kernel's standard control-character array length.
    WideFlag { sentinel: Sentinel },
    /// `termios2` with a probed control-character array length.
    VariableArray { sentinel: Sentinel, cc_len: usize },
    /// `serial_struct` custom divisor. The achieved rate is `baud_base / divisor`, which may
    /// deviate from the requested rate by rounding.
    Divisor,
}

/// Control state as read by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlState {
    /// A termios block of the strategy's layout.
    Termios(ControlBlock),
    /// The hardware descriptor plus the legacy termios carrying the alias rate.
    Divisor {
        /// The descriptor to write.
        serial: SerialBlock,
        /// The legacy termios to write after the descriptor.
        termios: ControlBlock,
        /// The descriptor as read, restored if the termios half of a write fails.
        previous: SerialBlock,
    },
}

impl SpeedStrategy {
    /// The custom-rate kind of this strategy, `None` for [`SpeedStrategy::Portable`].
    pub const fn kind(&self) -> Option<StrategyKind> {
        match self {
            Self::Portable => None,
            Self::WideFlag { .. } => Some(StrategyKind::WideFlag),
            Self::VariableArray { .. } => Some(StrategyKind::VariableArray),
            Self::Divisor => Some(StrategyKind::Divisor),
        }
    }

    /// The control interface this strategy drives.
    pub const fn interface(&self) -> Interface {
        match self {
            Self::Portable => Interface::Legacy,
            Self::WideFlag { .. } | Self::VariableArray { .. } => Interface::Extended,
            Self::Divisor => Interface::Serial,
        }
    }

    /// The termios2 layout, for the extended strategies.
    pub const fn extended_layout(&self) -> Option<Layout> {
        match self {
            Self::WideFlag { .. } => Some(Layout::extended(KERNEL_NCCS)),
            Self::VariableArray { cc_len, .. } => Some(Layout::extended(*cc_len)),
            Self::Portable | Self::Divisor => None,
        }
    }

    const fn sentinel(&self) -> Option<Sentinel> {
        match self {
            Self::WideFlag { sentinel } | Self::VariableArray { sentinel, .. } => Some(*sentinel),
            Self::Portable | Self::Divisor => None,
        }
    }

    /// Copies the device's current control state out.
    pub fn read_state<D: Device>(&self, dev: &D) -> Result<ControlState> {
        match self.extended_layout() {
            Some(layout) => {
                let mut block = ControlBlock::new(layout);
                issue(dev, Request::GetExtended { len: layout.size() }, block.as_bytes_mut())?;
                Ok(ControlState::Termios(block))
            }
            None if *self == Self::Portable => Ok(ControlState::Termios(read_legacy(dev)?)),
            None => {
                let mut serial = SerialBlock::new();
                issue(dev, Request::GetSerial, serial.as_bytes_mut())?;
                let termios = read_legacy(dev)?;
                Ok(ControlState::Divisor { previous: serial.clone(), serial, termios })
            }
        }
    }

    /// Hands `state` back to the device.
    ///
    /// For the divisor strategy the descriptor is written first and the alias rate second. If the
    /// second write fails, the descriptor read earlier is written back before the error is
    /// returned, so no half-applied state survives.
    pub fn write_state<D: Device>(&self, dev: &D, state: &mut ControlState) -> Result<()> {
        match state {
            ControlState::Termios(block) => {
                let request = match self.extended_layout() {
                    Some(layout) => Request::SetExtended { len: layout.size() },
                    None => Request::SetState,
                };
                issue(dev, request, block.as_bytes_mut())
            }
            ControlState::Divisor { serial, termios, previous } => {
                issue(dev, Request::SetSerial, serial.as_bytes_mut())?;

                if let Err(e) = issue(dev, Request::SetState, termios.as_bytes_mut()) {
                    if let Err(restore) = restore_serial(dev, previous) {
                        tracing::debug!(?restore, "failed to restore serial descriptor");
                    }
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    /// Rewrites the speed-relevant fields of `state` for `rate`, leaving every other field as
    /// read.
    pub fn encode(&self, state: &mut ControlState, rate: u32) -> Result<()> {
        if rate == 0 {
            return Err(SpeedError::InvalidRate { rate, reason: "rate must be positive" });
        }

        match (self, state) {
            (Self::Portable, ControlState::Termios(block)) => {
                let code = catalog::lookup_code(rate)
                    .ok_or(SpeedError::InvalidRate { rate, reason: "not a standard rate" })?;
                block.set_speed_code(code);
                Ok(())
            }
            (
                Self::WideFlag { sentinel } | Self::VariableArray { sentinel, .. },
                ControlState::Termios(block),
            ) => {
                block.set_speed_code(sentinel.bits());
                block.set_speeds(rate, rate);
                Ok(())
            }
            (Self::Divisor, ControlState::Divisor { serial, termios, .. }) => {
                let base = u32::try_from(serial.baud_base()).ok().filter(|base| *base > 0).ok_or(
                    SpeedError::InvalidRate { rate, reason: "device reports no clock base" },
                )?;
                let divisor = divisor_for(base, rate).ok_or(SpeedError::InvalidRate {
                    rate,
                    reason: "rate out of range for the clock base",
                })?;

                tracing::debug!(base, divisor, achieved = base / divisor, "custom divisor");

                // Validated against i32::MAX by divisor_for.
                serial.select_custom_divisor(divisor as i32);
                termios.set_speed_code(alias_code());
                Ok(())
            }
            _ => Err(SpeedError::InvalidRate {
                rate,
                reason: "control state was read by a different strategy",
            }),
        }
    }

    /// Decodes the rate described by `state`. Returns `0` if the state selects a speed code that
    /// is not in the catalog.
    pub fn decode(&self, state: &ControlState) -> u32 {
        match state {
            ControlState::Termios(block) => match (self.sentinel(), block.ispeed()) {
                (Some(sentinel), Some(ispeed)) if sentinel.matches(block.cflag()) => ispeed,
                _ => catalog::lookup_rate(block.speed_code()).unwrap_or(0),
            },
            ControlState::Divisor { serial, termios, .. } => {
                if serial.speed_source() == ASYNC_SPD_CUST && termios.speed_code() == alias_code() {
                    let base = u32::try_from(serial.baud_base()).unwrap_or(0);
                    let divisor = u32::try_from(serial.custom_divisor()).unwrap_or(0);
                    if let Some(rate) = effective_rate(base, divisor) {
                        return rate;
                    }
                }
                catalog::lookup_rate(termios.speed_code()).unwrap_or(0)
            }
        }
    }

    /// Reads, encodes and writes `rate`. Returns the state as written.
    pub fn apply<D: Device>(&self, dev: &D, rate: u32) -> Result<ControlState> {
        let mut state = self.read_state(dev)?;
        self.encode(&mut state, rate)?;
        self.write_state(dev, &mut state)?;
        Ok(state)
    }

    /// Reads and decodes the current rate.
    pub fn current_rate<D: Device>(&self, dev: &D) -> Result<u32> {
        self.read_state(dev).map(|state| self.decode(&state))
    }
}

/// Puts the hardware descriptor back on the normal speed source, if a custom divisor or another
/// alias is active. Returns the descriptor as it was before, if anything was written, so the
/// caller can [`restore_serial`] it.
pub fn release_divisor<D: Device>(dev: &D) -> Result<Option<SerialBlock>> {
    let mut serial = SerialBlock::new();
    issue(dev, Request::GetSerial, serial.as_bytes_mut())?;
    if serial.speed_source() == 0 {
        return Ok(None);
    }

    let previous = serial.clone();
    serial.set_flags(serial.flags() & !ASYNC_SPD_MASK);
    serial.set_custom_divisor(0);
    issue(dev, Request::SetSerial, serial.as_bytes_mut())?;
    Ok(Some(previous))
}

/// Writes a previously read hardware descriptor back.
pub fn restore_serial<D: Device>(dev: &D, serial: &SerialBlock) -> Result<()> {
    let mut serial = serial.clone();
    issue(dev, Request::SetSerial, serial.as_bytes_mut())
}

fn read_legacy<D: Device>(dev: &D) -> Result<ControlBlock> {
    let mut block = ControlBlock::with_capacity(Layout::legacy(KERNEL_NCCS), LEGACY_GUARD_SIZE);
    issue(dev, Request::GetState, block.as_bytes_mut())?;
    Ok(block)
}

fn alias_code() -> u32 {
    catalog::lookup_code(ALIAS_RATE).unwrap_or(0)
}

/// Issues a control request, classifying any failure.
pub(crate) fn issue<D: Device>(dev: &D, request: Request, buf: &mut [u8]) -> Result<()> {
    dev.request(request, buf).map_err(|errno| SpeedError::from_request(request, errno))
}
