use baudkit_device::Device;
use baudkit_wire::{
    catalog,
    serial::{ALIAS_RATE, ASYNC_SPD_CUST},
};
use nix::fcntl::OFlag;
use parking_lot::Mutex;

use crate::{
    blocking,
    options::{CustomPath, SpeedOptions},
    probe,
    strategy::{release_divisor, restore_serial},
    ControlState, Result, SpeedError, SpeedStrategy,
};

/// Configures the line speed of a single serial device.
///
/// Standard rates always go through the portable interface. Other rates go through the custom
/// strategies detected at construction, tried in the configured order. The controller remembers
/// which strategy last succeeded and which strategies passed their canary check.
///
/// Speed changes are read-modify-write sequences on kernel state and are not atomic with respect
/// to other writers of the same device.
#[derive(Debug)]
pub struct SpeedController<D> {
    device: D,
    options: SpeedOptions,
    strategies: Vec<SpeedStrategy>,
    state: Mutex<ControllerState>,
}

#[derive(Debug, Default)]
struct ControllerState {
    /// The strategy that last applied a custom rate.
    preferred: Option<SpeedStrategy>,
    /// Strategies whose first write was read back successfully.
    verified: Vec<SpeedStrategy>,
}

impl<D: Device> SpeedController<D> {
    /// Detects the custom-rate strategies `device` supports.
    pub fn new(device: D, options: SpeedOptions) -> Result<Self> {
        let strategies = probe::detect(&device, &options)?;
        Ok(Self::with_strategies(device, options, strategies))
    }

    /// Uses the given strategies as-is, without probing. For deployments that know their kernel.
    pub fn with_strategies(
        device: D,
        options: SpeedOptions,
        strategies: Vec<SpeedStrategy>,
    ) -> Self {
        Self { device, options, strategies, state: Mutex::new(ControllerState::default()) }
    }

    /// The underlying device.
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// Gives the device back.
    pub fn into_inner(self) -> D {
        self.device
    }

    /// The options this controller was built with.
    pub const fn options(&self) -> &SpeedOptions {
        &self.options
    }

    /// The custom-rate strategies available, in preference order.
    pub fn strategies(&self) -> &[SpeedStrategy] {
        &self.strategies
    }

    /// The strategy the getter reads through: the one that last applied a custom rate, or the
    /// most preferred one, or the portable interface if there is none.
    pub fn active_strategy(&self) -> SpeedStrategy {
        self.state
            .lock()
            .preferred
            .or_else(|| self.strategies.first().copied())
            .unwrap_or(SpeedStrategy::Portable)
    }

    /// Sets input and output speed to `rate`.
    pub fn set_rate(&self, rate: u32) -> Result<()> {
        if rate == 0 {
            return Err(SpeedError::InvalidRate { rate, reason: "rate must be positive" });
        }

        if catalog::is_standard(rate) {
            return self.set_standard(rate);
        }

        self.set_custom(rate)
    }

    /// Reads the current rate back. Returns `0` if the device is set to a speed code outside the
    /// catalog that the active strategy cannot decode.
    ///
    /// A termios reporting the 38400 alias is checked against the hardware descriptor when the
    /// divisor strategy is available, since an active custom divisor replaces the alias rate.
    pub fn get_rate(&self) -> Result<u32> {
        let active = self.active_strategy();
        let rate = active.current_rate(&self.device)?;

        if rate != ALIAS_RATE
            || active == SpeedStrategy::Divisor
            || !self.strategies.contains(&SpeedStrategy::Divisor)
        {
            return Ok(rate);
        }

        let state = SpeedStrategy::Divisor.read_state(&self.device)?;
        match &state {
            ControlState::Divisor { serial, .. } if serial.speed_source() == ASYNC_SPD_CUST => {
                match SpeedStrategy::Divisor.decode(&state) {
                    0 => Ok(rate),
                    divided => Ok(divided),
                }
            }
            _ => Ok(rate),
        }
    }

    /// See [`blocking::clear_nonblocking`].
    pub fn clear_nonblocking(&self) -> Result<()> {
        blocking::clear_nonblocking(&self.device)
    }

    /// See [`blocking::status_flags`].
    pub fn status_flags(&self) -> Result<OFlag> {
        blocking::status_flags(&self.device)
    }

    fn set_standard(&self, rate: u32) -> Result<()> {
        // A custom divisor left active would hijack the 38400 alias.
        let released = if self.strategies.contains(&SpeedStrategy::Divisor) {
            release_divisor(&self.device)?
        } else {
            None
        };
        if released.is_some() {
            tracing::debug!("released custom divisor");
        }

        if let Err(e) = SpeedStrategy::Portable.apply(&self.device, rate) {
            if let Some(previous) = released {
                if let Err(restore) = restore_serial(&self.device, &previous) {
                    tracing::debug!(?restore, "failed to restore custom divisor");
                }
            }
            return Err(e);
        }
        tracing::debug!(rate, "applied standard rate");

        Ok(())
    }

    fn set_custom(&self, rate: u32) -> Result<()> {
        let fallback = matches!(self.options.custom_path, CustomPath::Preference(_));
        let mut last_err = None;

        for strategy in self.candidates() {
            match self.try_strategy(strategy, rate) {
                Ok(()) => {
                    tracing::debug!(rate, ?strategy, "applied custom rate");
                    self.state.lock().preferred = Some(strategy);
                    return Ok(());
                }
                Err(e) if fallback && e.is_recoverable() => {
                    tracing::debug!(rate, ?strategy, ?e, "strategy failed, trying next");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(SpeedError::NoStrategy { rate }))
    }

    /// The strategies to try, the last successful one first.
    fn candidates(&self) -> Vec<SpeedStrategy> {
        let preferred = self.state.lock().preferred;

        let mut candidates = Vec::with_capacity(self.strategies.len());
        candidates.extend(preferred);
        candidates.extend(self.strategies.iter().copied().filter(|s| Some(*s) != preferred));
        candidates
    }

    fn try_strategy(&self, strategy: SpeedStrategy, rate: u32) -> Result<()> {
        let mut original = strategy.read_state(&self.device)?;
        let mut written = original.clone();
        strategy.encode(&mut written, rate)?;
        strategy.write_state(&self.device, &mut written)?;

        let verified = self.state.lock().verified.contains(&strategy);
        if !self.options.canary || verified {
            return Ok(());
        }

        let requested = strategy.decode(&written);
        let observed = strategy.current_rate(&self.device)?;
        if observed != requested {
            tracing::debug!(?strategy, requested, observed, "canary read-back mismatch");
            // Put back what was read so the next strategy starts from the old rate.
            if let Err(restore) = strategy.write_state(&self.device, &mut original) {
                tracing::debug!(?strategy, ?restore, "failed to restore control state");
            }
            return Err(SpeedError::LayoutMismatch { requested, observed });
        }

        tracing::debug!(?strategy, "canary passed");
        self.state.lock().verified.push(strategy);

        Ok(())
    }
}

/// Sets `rate` on `dev`, detecting capabilities afresh with default options.
pub fn set_rate<D: Device>(dev: &D, rate: u32) -> Result<()> {
    SpeedController::new(dev, SpeedOptions::default())?.set_rate(rate)
}

/// Reads the rate of `dev`, detecting capabilities afresh with default options.
pub fn get_rate<D: Device>(dev: &D) -> Result<u32> {
    SpeedController::new(dev, SpeedOptions::default())?.get_rate()
}
