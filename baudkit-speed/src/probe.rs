//! Capability detection.
//!
//! The kernel offers no way to ask which control-interface generations it implements or how its
//! structs are laid out. Every candidate is instead probed with a harmless read: a request the
//! kernel rejects as unknown means "unsupported, try the next one".

use baudkit_device::{Device, Request};
use baudkit_wire::{
    serial::SerialBlock,
    termios::{ControlBlock, Layout, KERNEL_NCCS, LEGACY_GUARD_SIZE},
};

use crate::{
    options::{SpeedOptions, StrategyKind},
    strategy::issue,
    Result, SpeedError, SpeedStrategy,
};

/// Upper bound on probed control-character array lengths. Anything larger is not a termios any
/// kernel ships and is skipped rather than handed to the kernel.
pub const MAX_CC_LEN: usize = LEGACY_GUARD_SIZE - 17;

/// Resolves the configured custom-rate strategies against `dev`, in preference order.
///
/// Strategies whose probe is rejected as unsupported are left out. Any other failure (a bad
/// descriptor, say) is returned. Strategies that end up with the same control-block shape are
/// kept only once.
pub fn detect<D: Device>(dev: &D, options: &SpeedOptions) -> Result<Vec<SpeedStrategy>> {
    let mut resolved: Vec<SpeedStrategy> = Vec::new();

    for kind in options.custom_path.kinds() {
        let Some(strategy) = resolve(dev, *kind, options)? else {
            continue;
        };

        let duplicate = resolved.iter().any(|s| {
            s.extended_layout().is_some() && s.extended_layout() == strategy.extended_layout()
        });
        if duplicate || resolved.contains(&strategy) {
            tracing::trace!(?strategy, "skipping strategy with an already resolved layout");
            continue;
        }

        resolved.push(strategy);
    }

    tracing::debug!(?resolved, "detected custom-rate strategies");

    Ok(resolved)
}

/// Probes a single strategy kind. Returns `Ok(None)` if the device does not support it.
pub fn resolve<D: Device>(
    dev: &D,
    kind: StrategyKind,
    options: &SpeedOptions,
) -> Result<Option<SpeedStrategy>> {
    let sentinel = options.sentinel;

    match kind {
        StrategyKind::WideFlag => {
            let supported = probe_extended(dev, KERNEL_NCCS)?;
            Ok(supported.then_some(SpeedStrategy::WideFlag { sentinel }))
        }
        StrategyKind::VariableArray => {
            // Any failure moves on to the next candidate. A hard failure is only reported once
            // every candidate has been tried.
            let mut hard_err = None;
            for &cc_len in &options.cc_len_candidates {
                if cc_len == 0 || cc_len > MAX_CC_LEN {
                    tracing::debug!(cc_len, "ignoring implausible control-character array length");
                    continue;
                }
                match probe_extended(dev, cc_len) {
                    Ok(true) => return Ok(Some(SpeedStrategy::VariableArray { sentinel, cc_len })),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::debug!(cc_len, ?e, "candidate length failed");
                        hard_err = Some(e);
                    }
                }
            }
            hard_err.map_or(Ok(None), Err)
        }
        StrategyKind::Divisor => {
            let mut serial = SerialBlock::new();
            let supported = probe(dev, Request::GetSerial, serial.as_bytes_mut())?;
            Ok(supported.then_some(SpeedStrategy::Divisor))
        }
    }
}

/// Whether the portable interface answers at all.
pub fn probe_portable<D: Device>(dev: &D) -> Result<bool> {
    let mut block = ControlBlock::with_capacity(Layout::legacy(KERNEL_NCCS), LEGACY_GUARD_SIZE);
    probe(dev, Request::GetState, block.as_bytes_mut())
}

fn probe_extended<D: Device>(dev: &D, cc_len: usize) -> Result<bool> {
    let layout = Layout::extended(cc_len);
    let mut block = ControlBlock::new(layout);
    probe(dev, Request::GetExtended { len: layout.size() }, block.as_bytes_mut())
}

fn probe<D: Device>(dev: &D, request: Request, buf: &mut [u8]) -> Result<bool> {
    match issue(dev, request, buf) {
        Ok(()) => {
            tracing::trace!(?request, "probe accepted");
            Ok(true)
        }
        Err(SpeedError::UnsupportedInterface { errno, .. }) => {
            tracing::debug!(?request, %errno, "probe rejected");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
