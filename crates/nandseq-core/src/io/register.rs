//! Register-mapped NAND controller
//!
//! A typical host-side NAND controller exposes a handful of 32-bit
//! registers: a command latch, an address latch, a DMA engine and a status
//! register. [`RegisterMap`] lowers each command-level event into the
//! register accesses that perform it, and [`RegisterController`] runs them
//! on a [`RegisterBus`], checking the status register after every data
//! phase and every busy wait.

use bitflags::bitflags;
use maybe_async::maybe_async;

use super::{CommandSink, RegisterBus};
use crate::error::{Error, IoFault, Result};
use crate::event::{CommandEvent, RegisterEvent};

bitflags! {
    /// Controller status register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusBits: u32 {
        /// Device ready (R/B# high)
        const READY   = 1 << 0;
        /// Last array operation failed
        const FAIL    = 1 << 1;
        /// Last DMA transfer failed
        const DMA_ERR = 1 << 2;
    }
}

bitflags! {
    /// DMA control register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DmaControl: u32 {
        /// Start the transfer
        const START     = 1 << 0;
        /// Host to device (DATA_IN); clear for device to host
        const TO_DEVICE = 1 << 1;
    }
}

impl StatusBits {
    /// Map a status register value to a result
    ///
    /// FAIL wins over a DMA error, which wins over a busy device.
    pub fn check(self) -> Result<()> {
        if self.contains(Self::FAIL) {
            Err(Error::Io(IoFault::DeviceFailed))
        } else if self.contains(Self::DMA_ERR) {
            Err(Error::Io(IoFault::Dma))
        } else if !self.contains(Self::READY) {
            Err(Error::Io(IoFault::Busy))
        } else {
            Ok(())
        }
    }
}

/// Most register accesses one command event lowers to
pub const MAX_REGISTER_EVENTS: usize = 8;

/// Register accesses for one command event
pub type RegisterPlan = heapless::Vec<RegisterEvent, MAX_REGISTER_EVENTS>;

/// Controller register offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    /// Command latch
    pub cmd: u32,
    /// Address latch, one cycle per write
    pub addr: u32,
    /// DMA host address
    pub dma_addr: u32,
    /// DMA length in bytes
    pub dma_len: u32,
    /// DMA control ([`DmaControl`])
    pub dma_ctrl: u32,
    /// Status ([`StatusBits`])
    pub status: u32,
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            cmd: 0x00,
            addr: 0x04,
            dma_addr: 0x08,
            dma_len: 0x0C,
            dma_ctrl: 0x10,
            status: 0x14,
        }
    }
}

impl RegisterMap {
    /// Lower one command event into register accesses, in bus order
    pub fn lower(&self, event: &CommandEvent) -> Result<RegisterPlan> {
        let mut plan = RegisterPlan::new();
        let mut push = |e: RegisterEvent| plan.push(e).map_err(|_| Error::EmissionOverflow);
        let write = |offset: u32, value: u32| RegisterEvent::WriteRegister { offset, value };

        match event {
            CommandEvent::Cmd(opcode) => push(write(self.cmd, *opcode as u32))?,
            CommandEvent::Addr(cycles) => {
                for cycle in cycles {
                    push(write(self.addr, *cycle as u32))?;
                }
            }
            CommandEvent::DataIn { size, buf } | CommandEvent::DataOut { size, buf } => {
                let mut ctrl = DmaControl::START;
                if matches!(event, CommandEvent::DataIn { .. }) {
                    ctrl |= DmaControl::TO_DEVICE;
                }
                push(write(self.dma_addr, buf.0))?;
                push(write(self.dma_len, *size))?;
                push(write(self.dma_ctrl, ctrl.bits()))?;
                push(RegisterEvent::ReadRegister {
                    offset: self.status,
                })?;
            }
            CommandEvent::TimeWait(us) => {
                push(RegisterEvent::TimeWait(*us))?;
                push(RegisterEvent::ReadRegister {
                    offset: self.status,
                })?;
            }
        }
        Ok(plan)
    }
}

/// Perform one register event on a bus
///
/// Returns the value read for `READ_REGISTER`, `None` otherwise.
#[maybe_async]
pub async fn dispatch<B: RegisterBus + ?Sized>(
    bus: &mut B,
    event: &RegisterEvent,
) -> Result<Option<u32>> {
    match *event {
        RegisterEvent::TimeWait(us) => {
            bus.delay_us(us).await;
            Ok(None)
        }
        RegisterEvent::ReadRegister { offset } => bus.read_register(offset).await.map(Some),
        RegisterEvent::WriteRegister { offset, value } => {
            bus.write_register(offset, value).await?;
            Ok(None)
        }
    }
}

/// [`CommandSink`] for register-mapped controllers
pub struct RegisterController<B> {
    bus: B,
    map: RegisterMap,
}

impl<B: RegisterBus> RegisterController<B> {
    /// Create a controller with the default register map
    pub fn new(bus: B) -> Self {
        Self::with_map(bus, RegisterMap::default())
    }

    /// Create a controller with a custom register map
    pub fn with_map(bus: B, map: RegisterMap) -> Self {
        Self { bus, map }
    }

    /// The register map in use
    pub fn map(&self) -> &RegisterMap {
        &self.map
    }

    /// Access the underlying bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutable access to the underlying bus
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Release the bus
    pub fn into_inner(self) -> B {
        self.bus
    }
}

#[maybe_async(AFIT)]
impl<B: RegisterBus> CommandSink for RegisterController<B> {
    async fn execute(&mut self, event: &CommandEvent) -> Result<()> {
        let plan = self.map.lower(event)?;
        for reg in &plan {
            log::trace!("    {}", reg);
            let value = dispatch(&mut self.bus, reg).await?;
            if let (RegisterEvent::ReadRegister { offset }, Some(value)) = (reg, value) {
                if *offset == self.map.status {
                    StatusBits::from_bits_truncate(value).check()?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::BufferAddr;
    use std::string::{String, ToString};
    use std::vec::Vec;

    fn rendered(plan: &RegisterPlan) -> Vec<String> {
        plan.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_status_check() {
        assert!(StatusBits::READY.check().is_ok());
        assert_eq!(StatusBits::empty().check(), Err(Error::Io(IoFault::Busy)));
        assert_eq!(
            (StatusBits::READY | StatusBits::DMA_ERR).check(),
            Err(Error::Io(IoFault::Dma))
        );
        assert_eq!(
            (StatusBits::READY | StatusBits::FAIL | StatusBits::DMA_ERR).check(),
            Err(Error::Io(IoFault::DeviceFailed))
        );
    }

    #[test]
    fn test_lower_cmd_and_addr() {
        let map = RegisterMap::default();
        assert_eq!(
            rendered(&map.lower(&CommandEvent::Cmd(0x30)).unwrap()),
            ["WRITE_REGISTER(offset=0x00, value=0x30)"]
        );
        let addr = CommandEvent::addr(&[0x0a, 0x00, 0x85]).unwrap();
        assert_eq!(
            rendered(&map.lower(&addr).unwrap()),
            [
                "WRITE_REGISTER(offset=0x04, value=0x0a)",
                "WRITE_REGISTER(offset=0x04, value=0x00)",
                "WRITE_REGISTER(offset=0x04, value=0x85)",
            ]
        );
    }

    #[test]
    fn test_lower_data_phases() {
        let map = RegisterMap::default();
        let out = CommandEvent::DataOut {
            size: 16,
            buf: BufferAddr(0x2000),
        };
        assert_eq!(
            rendered(&map.lower(&out).unwrap()),
            [
                "WRITE_REGISTER(offset=0x08, value=0x2000)",
                "WRITE_REGISTER(offset=0x0c, value=0x10)",
                "WRITE_REGISTER(offset=0x10, value=0x01)",
                "READ_REGISTER(offset=0x14)",
            ]
        );
        let into = CommandEvent::DataIn {
            size: 1,
            buf: BufferAddr(0),
        };
        let plan = map.lower(&into).unwrap();
        assert_eq!(
            plan[2],
            RegisterEvent::WriteRegister {
                offset: 0x10,
                value: (DmaControl::START | DmaControl::TO_DEVICE).bits()
            }
        );
    }

    #[test]
    fn test_lower_time_wait() {
        let plan = RegisterMap::default()
            .lower(&CommandEvent::TimeWait(110))
            .unwrap();
        assert_eq!(
            rendered(&plan),
            ["TIME_WAIT(110)", "READ_REGISTER(offset=0x14)"]
        );
    }

    #[cfg(feature = "is_sync")]
    mod controller {
        use super::*;

        /// Register file that records accesses and answers status reads
        struct ScriptedBus {
            log: Vec<RegisterEvent>,
            status: u32,
        }

        impl RegisterBus for ScriptedBus {
            fn read_register(&mut self, offset: u32) -> Result<u32> {
                self.log.push(RegisterEvent::ReadRegister { offset });
                Ok(self.status)
            }

            fn write_register(&mut self, offset: u32, value: u32) -> Result<()> {
                self.log.push(RegisterEvent::WriteRegister { offset, value });
                Ok(())
            }

            fn delay_us(&mut self, us: u32) {
                self.log.push(RegisterEvent::TimeWait(us));
            }
        }

        fn controller(status: StatusBits) -> RegisterController<ScriptedBus> {
            RegisterController::new(ScriptedBus {
                log: Vec::new(),
                status: status.bits(),
            })
        }

        #[test]
        fn test_executes_plan_in_order() {
            let mut ctrl = controller(StatusBits::READY);
            ctrl.execute(&CommandEvent::Cmd(0x00)).unwrap();
            ctrl.execute(&CommandEvent::TimeWait(50)).unwrap();
            assert_eq!(
                ctrl.bus().log,
                [
                    RegisterEvent::WriteRegister {
                        offset: 0x00,
                        value: 0x00
                    },
                    RegisterEvent::TimeWait(50),
                    RegisterEvent::ReadRegister { offset: 0x14 },
                ]
            );
        }

        #[test]
        fn test_status_failure_propagates() {
            let mut ctrl = controller(StatusBits::READY | StatusBits::FAIL);
            // Commands never read status
            ctrl.execute(&CommandEvent::Cmd(0x10)).unwrap();
            assert_eq!(
                ctrl.execute(&CommandEvent::TimeWait(660)),
                Err(Error::Io(IoFault::DeviceFailed))
            );

            let mut ctrl = controller(StatusBits::empty());
            let data = CommandEvent::DataOut {
                size: 1,
                buf: BufferAddr(0),
            };
            assert_eq!(ctrl.execute(&data), Err(Error::Io(IoFault::Busy)));
        }
    }
}
