//! The emulated tty layer.
//!
//! Mirrors what the kernel does with each request: legacy reads copy out the kernel's own struct
//! size, extended requests are only recognised when their encoded size matches the compiled
//! layout, and the hardware descriptor refuses unprivileged changes to `baud_base`.

use baudkit_device::{Interface, Request};
use baudkit_wire::{
    catalog,
    serial::{effective_rate, serial_struct_size, SerialBlock, ALIAS_RATE, ASYNC_SPD_CUST},
    termios::{ControlBlock, Layout, BOTHER, CBAUD, IBSHIFT},
};
use nix::{errno::Errno, fcntl::OFlag, libc};

use crate::SimConfig;

#[derive(Debug)]
pub(crate) struct KernelState {
    pub(crate) iflag: u32,
    pub(crate) oflag: u32,
    pub(crate) cflag: u32,
    pub(crate) lflag: u32,
    pub(crate) line: u8,
    pub(crate) cc: Vec<u8>,
    pub(crate) ispeed: u32,
    pub(crate) ospeed: u32,
    pub(crate) serial: SerialBlock,
    pub(crate) status: OFlag,
    pub(crate) fail_next_write: Option<Errno>,
    pub(crate) failing: Vec<(Interface, Errno)>,
    pub(crate) requests: Vec<Request>,
}

impl KernelState {
    pub(crate) fn new(config: &SimConfig) -> Self {
        let code = catalog::lookup_code(config.initial_rate).unwrap_or(libc::B9600 as u32);
        let rate = catalog::lookup_rate(code).unwrap_or(9_600);

        let mut serial = SerialBlock::new();
        serial.set_baud_base(config.clock_base as i32);

        Self {
            iflag: 0,
            oflag: 0,
            cflag: code | libc::CS8 as u32 | libc::CREAD as u32 | libc::CLOCAL as u32,
            lflag: 0,
            line: 0,
            cc: vec![0; config.cc_len],
            ispeed: rate,
            ospeed: rate,
            serial,
            status: OFlag::from_bits_truncate(config.initial_status),
            fail_next_write: None,
            failing: Vec::new(),
            requests: Vec::new(),
        }
    }

    pub(crate) fn handle(
        &mut self,
        config: &SimConfig,
        request: Request,
        buf: &mut [u8],
    ) -> nix::Result<()> {
        if let Some((_, errno)) = self.failing.iter().find(|(i, _)| *i == request.interface()) {
            return Err(*errno);
        }

        match request {
            Request::GetExtended { len } | Request::SetExtended { len } => {
                // An unknown request number: the encoded size does not match the compiled struct.
                if !config.extended || len != Layout::extended(config.cc_len).size() {
                    return Err(Errno::ENOTTY);
                }
            }
            Request::GetSerial | Request::SetSerial if !config.serial => {
                return Err(Errno::ENOTTY);
            }
            _ => {}
        }

        if !request.is_read() {
            if let Some(errno) = self.fail_next_write.take() {
                return Err(errno);
            }
        }

        match request {
            Request::GetState => self.copy_out(Layout::legacy(config.cc_len), buf),
            Request::SetState => self.copy_in(Layout::legacy(config.cc_len), buf),
            Request::GetExtended { .. } => self.copy_out(Layout::extended(config.cc_len), buf),
            Request::SetExtended { .. } => self.copy_in(Layout::extended(config.cc_len), buf),
            Request::GetSerial => {
                let out = buf.get_mut(..serial_struct_size()).ok_or(Errno::EFAULT)?;
                out.copy_from_slice(self.serial.as_bytes());
                Ok(())
            }
            Request::SetSerial => self.set_serial(buf),
        }
    }

    fn copy_out(&self, layout: Layout, buf: &mut [u8]) -> nix::Result<()> {
        let out = buf.get_mut(..layout.size()).ok_or(Errno::EFAULT)?;

        let mut block = ControlBlock::new(layout);
        block.set_iflag(self.iflag);
        block.set_oflag(self.oflag);
        block.set_cflag(self.cflag);
        block.set_lflag(self.lflag);
        block.set_line(self.line);
        block.set_cc(&self.cc);
        block.set_speeds(self.ispeed, self.ospeed);

        out.copy_from_slice(&block.as_bytes()[..layout.size()]);
        Ok(())
    }

    fn copy_in(&mut self, layout: Layout, buf: &[u8]) -> nix::Result<()> {
        let src = buf.get(..layout.size()).ok_or(Errno::EFAULT)?;

        let mut block = ControlBlock::new(layout);
        block.as_bytes_mut()[..layout.size()].copy_from_slice(src);

        let (ispeed, ospeed) = self.decode_speeds(&block)?;

        self.iflag = block.iflag();
        self.oflag = block.oflag();
        self.cflag = block.cflag();
        self.lflag = block.lflag();
        self.line = block.line();
        self.cc = block.cc().to_vec();
        self.ispeed = ispeed;
        self.ospeed = ospeed;

        Ok(())
    }

    /// Works out the line speeds a written block asks for.
    fn decode_speeds(&self, block: &ControlBlock) -> nix::Result<(u32, u32)> {
        let cflag = block.cflag();

        let ospeed = match cflag & CBAUD {
            // The legacy block has no numeric fields; the previous numeric speed stays.
            BOTHER => block.ospeed().unwrap_or(self.ospeed),
            code => catalog::lookup_rate(code).unwrap_or(0),
        };
        if cflag & CBAUD != 0 && ospeed == 0 {
            return Err(Errno::EINVAL);
        }

        let ispeed = match (cflag >> IBSHIFT) & CBAUD {
            0 => ospeed,
            BOTHER => block.ispeed().unwrap_or(self.ispeed),
            code => catalog::lookup_rate(code).ok_or(Errno::EINVAL)?,
        };

        Ok((ispeed, ospeed))
    }

    fn set_serial(&mut self, buf: &[u8]) -> nix::Result<()> {
        let src = buf.get(..serial_struct_size()).ok_or(Errno::EFAULT)?;

        let mut block = SerialBlock::new();
        block.as_bytes_mut().copy_from_slice(src);

        // Unprivileged callers may not touch the clock base.
        if block.baud_base() != self.serial.baud_base() {
            return Err(Errno::EPERM);
        }

        self.serial = block;
        Ok(())
    }

    /// The rate the emulated UART is clocked at.
    pub(crate) fn effective_rate(&self) -> u32 {
        if self.ospeed == ALIAS_RATE && self.serial.speed_source() == ASYNC_SPD_CUST {
            let base = u32::try_from(self.serial.baud_base()).unwrap_or(0);
            let divisor = u32::try_from(self.serial.custom_divisor()).unwrap_or(0);
            if let Some(rate) = effective_rate(base, divisor) {
                return rate;
            }
        }
        self.ospeed
    }
}
