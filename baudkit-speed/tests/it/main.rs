mod custom;
mod divisor;
mod standard;

/// Helper devices wrapping the simulator.
mod helpers {
    use baudkit_device::{Device, Request};
    use baudkit_sim::SimTty;
    use baudkit_wire::termios::{Layout, KERNEL_NCCS};
    use nix::{errno::Errno, fcntl::OFlag};

    /// Accepts termios2 writes without applying them, like a kernel that reads the speed fields
    /// from somewhere other than where we wrote them.
    #[derive(Debug, Clone, Default)]
    pub struct SilentlyIgnoring(pub SimTty);

    impl Device for SilentlyIgnoring {
        fn request(&self, request: Request, buf: &mut [u8]) -> nix::Result<()> {
            match request {
                Request::SetExtended { .. } => Ok(()),
                _ => self.0.request(request, buf),
            }
        }

        fn status_flags(&self) -> nix::Result<OFlag> {
            self.0.status_flags()
        }

        fn set_status_flags(&self, flags: OFlag) -> nix::Result<()> {
            self.0.set_status_flags(flags)
        }
    }

    /// Fails every legacy termios write with `EIO`.
    #[derive(Debug, Clone, Default)]
    pub struct FailingSetState(pub SimTty);

    impl Device for FailingSetState {
        fn request(&self, request: Request, buf: &mut [u8]) -> nix::Result<()> {
            match request {
                Request::SetState => Err(Errno::EIO),
                _ => self.0.request(request, buf),
            }
        }

        fn status_flags(&self) -> nix::Result<OFlag> {
            self.0.status_flags()
        }

        fn set_status_flags(&self, flags: OFlag) -> nix::Result<()> {
            self.0.set_status_flags(flags)
        }
    }

    /// Applies termios2 writes but caps the numeric speeds at `ceiling`, like a driver that
    /// quietly clamps what it cannot generate.
    #[derive(Debug, Clone, Default)]
    pub struct ClampingSpeeds {
        pub tty: SimTty,
        pub ceiling: u32,
    }

    impl Device for ClampingSpeeds {
        fn request(&self, request: Request, buf: &mut [u8]) -> nix::Result<()> {
            let layout = Layout::extended(KERNEL_NCCS);
            if matches!(request, Request::SetExtended { len } if len == layout.size()) {
                for off in [layout.ispeed_offset(), layout.ospeed_offset()].into_iter().flatten() {
                    let mut word = [0u8; 4];
                    word.copy_from_slice(&buf[off..off + 4]);
                    let speed = u32::from_ne_bytes(word).min(self.ceiling);
                    buf[off..off + 4].copy_from_slice(&speed.to_ne_bytes());
                }
            }
            self.tty.request(request, buf)
        }

        fn status_flags(&self) -> nix::Result<OFlag> {
            self.tty.status_flags()
        }

        fn set_status_flags(&self, flags: OFlag) -> nix::Result<()> {
            self.tty.set_status_flags(flags)
        }
    }
}
