//! Protocol state machine
//!
//! A [`Machine`] validates one operation's L2 events against the
//! [transition table](table::TRANSITIONS) and lowers every accepted event
//! into L1 events. It owns the operation [`Context`] and never performs
//! I/O: emitted events and suspension requests are handed back in a
//! [`Step`] for the caller to execute.
//!
//! The machine keeps a logical clock in microseconds. It only moves on
//! `TIME_WAIT`s, both the ones submitted at L2 and the busy waits the
//! lowering emits, and stamps every recorded action.

mod lower;
mod state;
pub mod table;

pub use lower::{Emission, MAX_EMITTED};
pub use state::State;
pub use table::{Action, Guard, Source, Target, Transition};

use core::fmt;

use crate::config::DeviceConfig;
use crate::context::{ActionKind, AddressKinds, Context, Operation};
use crate::error::{Error, Result};
use crate::event::{DeviceEvent, DeviceEventKind};

/// Why an event was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// No transition exists for the event in this state
    NoTransition,
    /// The machine already reached its terminal state
    Terminal,
    /// The initial event does not match the requested operation
    OperationMismatch,
    /// The host buffer is outside the DMA window
    BufferOutOfWindow,
    /// The address was already frozen by the transfer start
    AddressFrozen,
    /// The address kind is not permitted for this operation
    AddressNotPermitted,
    /// The address component or the next data unit lies past the device
    AddressOutOfRange,
    /// DO_TRANSFER arrived before every required component was set
    IncompleteAddress {
        /// Components still missing
        missing: AddressKinds,
    },
    /// The DO_* event does not match the recorded operation
    ActionMismatch,
    /// The required length was already reached
    TransferComplete,
    /// END_TRANSFER arrived before the required length was reached
    TransferIncomplete,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTransition => write!(f, "no transition"),
            Self::Terminal => write!(f, "operation already finished"),
            Self::OperationMismatch => write!(f, "does not match the requested operation"),
            Self::BufferOutOfWindow => write!(f, "buffer outside the DMA window"),
            Self::AddressFrozen => write!(f, "address is frozen"),
            Self::AddressNotPermitted => write!(f, "address kind not permitted"),
            Self::AddressOutOfRange => write!(f, "address out of range"),
            Self::IncompleteAddress { missing } => write!(f, "incomplete address, missing {}", missing),
            Self::ActionMismatch => write!(f, "action does not match the operation"),
            Self::TransferComplete => write!(f, "transfer length already reached"),
            Self::TransferIncomplete => write!(f, "transfer length not reached"),
        }
    }
}

/// A rejected event, the state it was rejected in, and why
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    /// The offending event
    pub event: DeviceEvent,
    /// State of the machine when the event arrived (and still)
    pub state: State,
    /// Why
    pub reason: Reason,
}

impl Rejection {
    /// Returns true for a DO_TRANSFER with required components missing
    pub fn is_incomplete_address(&self) -> bool {
        matches!(self.reason, Reason::IncompleteAddress { .. })
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rejected in state {}: {}",
            self.event, self.state, self.reason
        )
    }
}

/// Outcome of one accepted event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// The accepted event
    pub event: DeviceEvent,
    /// State before
    pub from: State,
    /// State after
    pub to: State,
    /// L1 events to execute, in order
    pub emitted: Emission,
    /// Suspension requested by a `TIME_WAIT`, in microseconds
    pub suspend: Option<u32>,
}

/// State machine for a single operation
#[derive(Debug, Clone)]
pub struct Machine<'c> {
    config: &'c DeviceConfig,
    requested: Operation,
    required_len: usize,
    state: State,
    ctx: Context,
    clock_us: u64,
}

impl<'c> Machine<'c> {
    /// Create a machine in [`State::Idle`] for one operation
    ///
    /// `required_len` is the number of data steps after the action: units
    /// for READ/PROGRAM, additional blocks for ERASE.
    pub fn new(config: &'c DeviceConfig, requested: Operation, required_len: usize) -> Self {
        Self {
            config,
            requested,
            required_len,
            state: State::Idle,
            ctx: Context::new(),
            clock_us: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns true once the operation finished
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// The operation context
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Consume the machine, keeping the context
    pub fn into_context(self) -> Context {
        self.ctx
    }

    /// The operation this machine was created for
    pub fn requested(&self) -> Operation {
        self.requested
    }

    /// Number of data steps the transfer loop must run
    pub fn required_len(&self) -> usize {
        self.required_len
    }

    /// Logical time spent waiting so far
    pub fn elapsed_us(&self) -> u64 {
        self.clock_us
    }

    /// Submit one L2 event
    ///
    /// On rejection nothing changes: state, context and clock stay as they
    /// were and the error names the event, the state and the reason.
    pub fn step(&mut self, event: DeviceEvent) -> Result<Step> {
        let from = self.state;
        let reject = |reason: Reason| {
            let rejection = Rejection {
                event,
                state: from,
                reason,
            };
            log::warn!("{}", rejection);
            Error::ProtocolViolation(rejection)
        };

        if from.is_terminal() {
            return Err(reject(Reason::Terminal));
        }
        let transition =
            table::lookup(from, event.kind()).ok_or_else(|| reject(Reason::NoTransition))?;
        self.check(transition.guard, &event).map_err(reject)?;

        let mut emitted = Emission::new();
        let suspend = self.perform(transition.action, &event, &mut emitted)?;
        let to = transition.to.resolve(from);
        self.state = to;

        log::trace!("{}: {} -> {}", event, from, to);
        for e in &emitted {
            log::trace!("  emit {}", e);
        }

        Ok(Step {
            event,
            from,
            to,
            emitted,
            suspend,
        })
    }

    fn check(&self, guard: Guard, event: &DeviceEvent) -> core::result::Result<(), Reason> {
        let ctx = &self.ctx;
        let geometry = &self.config.geometry;
        match guard {
            Guard::Always => Ok(()),
            Guard::RequestedOperation => {
                if table::operation_of(event.kind()) != self.requested {
                    return Err(Reason::OperationMismatch);
                }
                match event {
                    DeviceEvent::InitialRead(buf) | DeviceEvent::InitialProgram(buf) => {
                        let len = self.required_len as u64 * geometry.transfer_unit as u64;
                        if self.config.buffer.contains_range(*buf, len) {
                            Ok(())
                        } else {
                            Err(Reason::BufferOutOfWindow)
                        }
                    }
                    _ => Ok(()),
                }
            }
            Guard::AddressAccepted => {
                let DeviceEvent::SetAddress { kind, value } = *event else {
                    return Err(Reason::NoTransition);
                };
                if ctx.is_frozen() {
                    return Err(Reason::AddressFrozen);
                }
                let policy = self.config.address.for_operation(ctx.operation());
                if !policy.permitted.contains(kind.flag()) {
                    return Err(Reason::AddressNotPermitted);
                }
                if value >= geometry.limit(kind) {
                    return Err(Reason::AddressOutOfRange);
                }
                Ok(())
            }
            Guard::AddressComplete => {
                let policy = self.config.address.for_operation(ctx.operation());
                let missing = policy.required.difference(ctx.set_kinds());
                if !missing.is_empty() {
                    return Err(Reason::IncompleteAddress { missing });
                }
                let addr = ctx.address();
                let page = match ctx.operation() {
                    Operation::Erase => 0,
                    _ => addr.page,
                };
                match geometry.row(addr.block, page) {
                    Some(_) => Ok(()),
                    None => Err(Reason::AddressOutOfRange),
                }
            }
            Guard::ActionMatches => {
                if table::operation_of(event.kind()) == ctx.operation() {
                    Ok(())
                } else {
                    Err(Reason::ActionMismatch)
                }
            }
            Guard::TransferPending => {
                if ctx.cursor() >= self.required_len {
                    return Err(Reason::TransferComplete);
                }
                let fits = match ctx.operation() {
                    Operation::Erase => {
                        let next = ctx.address().block as u64 + ctx.cursor() as u64 + 1;
                        next < geometry.blocks as u64 && geometry.row(next as u32, 0).is_some()
                    }
                    _ => {
                        let unit = geometry.transfer_unit as u64;
                        ctx.column(geometry.transfer_unit) as u64 + unit <= geometry.page_size as u64
                    }
                };
                if fits {
                    Ok(())
                } else {
                    Err(Reason::AddressOutOfRange)
                }
            }
            Guard::TransferDone => {
                if ctx.cursor() == self.required_len {
                    Ok(())
                } else {
                    Err(Reason::TransferIncomplete)
                }
            }
        }
    }

    fn perform(
        &mut self,
        action: Action,
        event: &DeviceEvent,
        out: &mut Emission,
    ) -> Result<Option<u32>> {
        let config = self.config;
        match action {
            Action::BeginOperation => {
                let buffer = match event {
                    DeviceEvent::InitialRead(buf) | DeviceEvent::InitialProgram(buf) => Some(*buf),
                    _ => None,
                };
                self.ctx.begin(self.requested, buffer);
            }
            Action::WriteAddress => {
                if let DeviceEvent::SetAddress { kind, value } = *event {
                    self.ctx.set_component(kind, value);
                    self.ctx.record(ActionKind::Address, self.clock_us);
                }
            }
            Action::StartTransfer => {
                self.ctx.freeze();
                lower::setup(config, &self.ctx, out)?;
                self.ctx.record(ActionKind::Transfer, self.clock_us);
            }
            Action::Launch => {
                let kind = match event.kind() {
                    DeviceEventKind::DoRead => ActionKind::Read,
                    DeviceEventKind::DoProgram => ActionKind::Program,
                    _ => ActionKind::Erase,
                };
                self.ctx.record(kind, self.clock_us);
                let busy = lower::launch(config, &self.ctx, out)?;
                self.clock_us += busy as u64;
            }
            Action::TransferUnit => {
                let index = self.ctx.cursor();
                self.ctx.record(ActionKind::Transfer, self.clock_us);
                let busy = lower::data(config, &self.ctx, index, out)?;
                self.ctx.advance(1);
                self.clock_us += busy as u64;
            }
            Action::Finish => {
                let busy = lower::finish(config, &self.ctx, out)?;
                self.clock_us += busy as u64;
            }
            Action::Suspend => {
                if let DeviceEvent::TimeWait(us) = *event {
                    self.clock_us += us as u64;
                    return Ok(Some(us));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Address, AddressKind};
    use crate::event::BufferAddr;
    use std::string::{String, ToString};
    use std::vec::Vec;

    const BUF: BufferAddr = BufferAddr(0x2000);

    fn set(kind: AddressKind, value: u32) -> DeviceEvent {
        DeviceEvent::set_address(kind, value)
    }

    fn read_scenario() -> [DeviceEvent; 8] {
        [
            DeviceEvent::InitialRead(BUF),
            set(AddressKind::Block, 2),
            set(AddressKind::Page, 5),
            set(AddressKind::Byte, 10),
            DeviceEvent::DoTransfer,
            DeviceEvent::DoRead,
            DeviceEvent::DoTransfer,
            DeviceEvent::EndTransfer,
        ]
    }

    fn drive<'c>(machine: &mut Machine<'c>, events: &[DeviceEvent]) -> Vec<String> {
        let mut l1 = Vec::new();
        for event in events {
            let step = machine.step(*event).unwrap();
            l1.extend(step.emitted.iter().map(|e| e.to_string()));
        }
        l1
    }

    /// Drive a fresh machine into `state` with a single-unit READ
    fn machine_in<'c>(config: &'c DeviceConfig, state: State) -> Machine<'c> {
        let mut m = Machine::new(config, Operation::Read, 1);
        let path = read_scenario();
        let n = match state {
            State::Idle => 0,
            State::AwaitingAddress => 4,
            State::AwaitingAction => 5,
            State::Transferring => 6,
            State::Terminal => 8,
        };
        drive(&mut m, &path[..n]);
        assert_eq!(m.state(), state);
        m
    }

    fn one_of_each() -> [DeviceEvent; 10] {
        [
            DeviceEvent::TimeWait(50),
            DeviceEvent::InitialRead(BUF),
            DeviceEvent::InitialProgram(BUF),
            DeviceEvent::InitialErase,
            set(AddressKind::Block, 1),
            DeviceEvent::DoTransfer,
            DeviceEvent::DoRead,
            DeviceEvent::DoProgram,
            DeviceEvent::DoErase,
            DeviceEvent::EndTransfer,
        ]
    }

    #[test]
    fn test_read_scenario() {
        let config = DeviceConfig::default();
        let mut m = Machine::new(&config, Operation::Read, 1);
        let l1 = drive(&mut m, &read_scenario());

        assert!(m.is_terminal());
        assert_eq!(m.context().cursor(), 1);
        assert_eq!(m.context().operation(), Operation::Read);
        assert_eq!(m.context().address(), Address::new(2, 5, 10));
        assert_eq!(
            l1,
            [
                "CMD(opcode=0x00)",
                "ADDR(0x0a, 0x00, 0x85, 0x00, 0x00)",
                "CMD(opcode=0x30)",
                "TIME_WAIT(110)",
                "DATA_OUT(size=1, buf=8192)",
            ]
        );
        assert_eq!(m.elapsed_us(), 110);
    }

    #[test]
    fn test_do_read_in_idle_is_rejected() {
        let config = DeviceConfig::default();
        let mut m = Machine::new(&config, Operation::Read, 1);
        let err = m.step(DeviceEvent::DoRead).unwrap_err();
        assert_eq!(
            err,
            Error::ProtocolViolation(Rejection {
                event: DeviceEvent::DoRead,
                state: State::Idle,
                reason: Reason::NoTransition,
            })
        );
        assert_eq!(m.state(), State::Idle);
        assert_eq!(m.context(), &Context::new());
    }

    #[test]
    fn test_invalid_pairs_leave_state_unchanged() {
        let config = DeviceConfig::default();
        for state in State::ALL {
            for event in one_of_each() {
                let mut m = machine_in(&config, state);
                let before = m.context().clone();
                let clock = m.elapsed_us();
                let valid = table::lookup(state, event.kind()).is_some();
                match m.step(event) {
                    Ok(_) => assert!(valid, "{} accepted in {}", event, state),
                    Err(e) => {
                        let r = e.rejection().copied().unwrap();
                        assert_eq!(r.event, event);
                        assert_eq!(r.state, state);
                        assert_eq!(m.state(), state);
                        assert_eq!(m.context(), &before);
                        assert_eq!(m.elapsed_us(), clock);
                        if !valid {
                            assert!(matches!(r.reason, Reason::NoTransition | Reason::Terminal));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_terminal_is_absorbing() {
        let config = DeviceConfig::default();
        let mut m = machine_in(&config, State::Terminal);
        for event in one_of_each() {
            let err = m.step(event).unwrap_err();
            assert_eq!(err.rejection().unwrap().reason, Reason::Terminal);
            assert!(m.is_terminal());
        }
    }

    #[test]
    fn test_time_wait_suspends_without_state_change() {
        let config = DeviceConfig::default();
        for state in [State::Idle, State::AwaitingAddress, State::AwaitingAction, State::Transferring] {
            let mut m = machine_in(&config, state);
            let clock = m.elapsed_us();
            let step = m.step(DeviceEvent::TimeWait(50)).unwrap();
            assert_eq!(step.suspend, Some(50));
            assert_eq!(step.from, state);
            assert_eq!(step.to, state);
            assert!(step.emitted.is_empty());
            assert_eq!(m.elapsed_us(), clock + 50);
        }
    }

    #[test]
    fn test_address_order_does_not_matter() {
        let config = DeviceConfig::default();
        let orders = [
            [AddressKind::Block, AddressKind::Page, AddressKind::Byte],
            [AddressKind::Byte, AddressKind::Page, AddressKind::Block],
            [AddressKind::Page, AddressKind::Byte, AddressKind::Block],
        ];
        let expected = Address::new(7, 3, 100);
        let mut outputs = Vec::new();
        for order in orders {
            let mut m = Machine::new(&config, Operation::Read, 2);
            m.step(DeviceEvent::InitialRead(BUF)).unwrap();
            for kind in order {
                m.step(set(kind, expected.get(kind))).unwrap();
                // Repeats are idempotent
                m.step(set(kind, expected.get(kind))).unwrap();
            }
            assert_eq!(m.context().address(), expected);
            outputs.push(drive(&mut m, &[DeviceEvent::DoTransfer]));
        }
        assert!(outputs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_last_address_write_wins() {
        let config = DeviceConfig::default();
        let mut m = Machine::new(&config, Operation::Read, 1);
        m.step(DeviceEvent::InitialRead(BUF)).unwrap();
        m.step(set(AddressKind::Page, 1)).unwrap();
        m.step(set(AddressKind::Page, 9)).unwrap();
        assert_eq!(m.context().component(AddressKind::Page), Some(9));
        assert_eq!(m.context().last_action(), Some(ActionKind::Address));
    }

    #[test]
    fn test_incomplete_address() {
        let config = DeviceConfig::default();
        let mut m = Machine::new(&config, Operation::Read, 1);
        m.step(DeviceEvent::InitialRead(BUF)).unwrap();
        m.step(set(AddressKind::Block, 2)).unwrap();
        let err = m.step(DeviceEvent::DoTransfer).unwrap_err();
        assert!(err.is_incomplete_address());
        assert_eq!(
            err.rejection().unwrap().reason,
            Reason::IncompleteAddress {
                missing: AddressKinds::PAGE | AddressKinds::BYTE
            }
        );
        assert_eq!(m.state(), State::AwaitingAddress);
        assert!(!m.context().is_frozen());
    }

    #[test]
    fn test_transfer_loop_bounds() {
        let config = DeviceConfig::default();
        let mut m = Machine::new(&config, Operation::Read, 3);
        drive(&mut m, &read_scenario()[..6]);

        m.step(DeviceEvent::DoTransfer).unwrap();
        let early = m.step(DeviceEvent::EndTransfer).unwrap_err();
        assert_eq!(early.rejection().unwrap().reason, Reason::TransferIncomplete);

        m.step(DeviceEvent::DoTransfer).unwrap();
        m.step(DeviceEvent::DoTransfer).unwrap();
        let extra = m.step(DeviceEvent::DoTransfer).unwrap_err();
        assert_eq!(extra.rejection().unwrap().reason, Reason::TransferComplete);
        assert_eq!(m.context().cursor(), 3);

        m.step(DeviceEvent::EndTransfer).unwrap();
        assert!(m.is_terminal());
    }

    #[test]
    fn test_transfer_stops_at_page_end() {
        let config = DeviceConfig::default();
        let mut m = Machine::new(&config, Operation::Read, 2);
        m.step(DeviceEvent::InitialRead(BUF)).unwrap();
        m.step(set(AddressKind::Block, 0)).unwrap();
        m.step(set(AddressKind::Page, 0)).unwrap();
        m.step(set(AddressKind::Byte, 2047)).unwrap();
        m.step(DeviceEvent::DoTransfer).unwrap();
        m.step(DeviceEvent::DoRead).unwrap();
        m.step(DeviceEvent::DoTransfer).unwrap();
        let err = m.step(DeviceEvent::DoTransfer).unwrap_err();
        assert_eq!(err.rejection().unwrap().reason, Reason::AddressOutOfRange);
    }

    #[test]
    fn test_operation_mismatch() {
        let config = DeviceConfig::default();
        let mut m = Machine::new(&config, Operation::Program, 1);
        let err = m.step(DeviceEvent::InitialRead(BUF)).unwrap_err();
        assert_eq!(err.rejection().unwrap().reason, Reason::OperationMismatch);

        // An INVALID machine accepts no initial event at all
        let mut m = Machine::new(&config, Operation::Invalid, 1);
        assert!(m.step(DeviceEvent::InitialErase).is_err());
        assert_eq!(m.state(), State::Idle);
    }

    #[test]
    fn test_action_mismatch() {
        let config = DeviceConfig::default();
        let mut m = machine_in(&config, State::AwaitingAction);
        let err = m.step(DeviceEvent::DoProgram).unwrap_err();
        assert_eq!(err.rejection().unwrap().reason, Reason::ActionMismatch);
        assert_eq!(m.state(), State::AwaitingAction);
    }

    #[test]
    fn test_buffer_outside_window() {
        let config = DeviceConfig::default();
        let mut m = Machine::new(&config, Operation::Read, 1);
        let err = m
            .step(DeviceEvent::InitialRead(BufferAddr(0x10_0000)))
            .unwrap_err();
        assert_eq!(err.rejection().unwrap().reason, Reason::BufferOutOfWindow);

        // The whole transfer has to fit, not just its start
        let mut m = Machine::new(&config, Operation::Program, 0x100);
        let err = m
            .step(DeviceEvent::InitialProgram(BufferAddr(0xf_ff80)))
            .unwrap_err();
        assert_eq!(err.rejection().unwrap().reason, Reason::BufferOutOfWindow);
    }

    #[test]
    fn test_address_out_of_range() {
        let config = DeviceConfig::default();
        let mut m = Machine::new(&config, Operation::Read, 1);
        m.step(DeviceEvent::InitialRead(BUF)).unwrap();
        for (kind, limit) in [
            (AddressKind::Block, 1024),
            (AddressKind::Page, 64),
            (AddressKind::Byte, 2048),
        ] {
            let err = m.step(set(kind, limit)).unwrap_err();
            assert_eq!(err.rejection().unwrap().reason, Reason::AddressOutOfRange);
            m.step(set(kind, limit - 1)).unwrap();
        }
    }

    #[test]
    fn test_erase_rejects_page_and_byte() {
        let config = DeviceConfig::default();
        let mut m = Machine::new(&config, Operation::Erase, 0);
        m.step(DeviceEvent::InitialErase).unwrap();
        for kind in [AddressKind::Page, AddressKind::Byte] {
            let err = m.step(set(kind, 0)).unwrap_err();
            assert_eq!(err.rejection().unwrap().reason, Reason::AddressNotPermitted);
        }
        m.step(set(AddressKind::Block, 4)).unwrap();
        assert_eq!(m.context().set_kinds(), AddressKinds::BLOCK);
    }

    #[test]
    fn test_multi_block_erase() {
        let config = DeviceConfig::default();
        let mut m = Machine::new(&config, Operation::Erase, 1);
        let l1 = drive(
            &mut m,
            &[
                DeviceEvent::InitialErase,
                set(AddressKind::Block, 1),
                DeviceEvent::DoTransfer,
                DeviceEvent::DoErase,
                DeviceEvent::DoTransfer,
                DeviceEvent::EndTransfer,
            ],
        );
        assert!(m.is_terminal());
        assert_eq!(
            l1,
            [
                "CMD(opcode=0x60)",
                "ADDR(0x40, 0x00, 0x00)",
                "CMD(opcode=0xd0)",
                "TIME_WAIT(2200)",
                "CMD(opcode=0x60)",
                "ADDR(0x80, 0x00, 0x00)",
                "CMD(opcode=0xd0)",
                "TIME_WAIT(2200)",
            ]
        );
        assert_eq!(m.elapsed_us(), 4400);
        assert_eq!(m.context().buffer(), None);
    }

    #[test]
    fn test_erase_stops_at_last_block() {
        let config = DeviceConfig::default();
        let mut m = Machine::new(&config, Operation::Erase, 1);
        drive(
            &mut m,
            &[
                DeviceEvent::InitialErase,
                set(AddressKind::Block, 1023),
                DeviceEvent::DoTransfer,
                DeviceEvent::DoErase,
            ],
        );
        let err = m.step(DeviceEvent::DoTransfer).unwrap_err();
        assert_eq!(err.rejection().unwrap().reason, Reason::AddressOutOfRange);
    }

    #[test]
    fn test_unaddressable_row_is_rejected() {
        // Geometry that never went through validate(): 2^33 rows
        let mut config = DeviceConfig::default();
        config.geometry.blocks = 1 << 20;
        config.geometry.pages_per_block = 1 << 13;
        assert!(config.validate().is_err());

        let mut m = Machine::new(&config, Operation::Read, 1);
        drive(
            &mut m,
            &[
                DeviceEvent::InitialRead(BUF),
                set(AddressKind::Block, (1 << 20) - 1),
                set(AddressKind::Page, 0),
                set(AddressKind::Byte, 0),
            ],
        );
        let err = m.step(DeviceEvent::DoTransfer).unwrap_err();
        assert_eq!(err.rejection().unwrap().reason, Reason::AddressOutOfRange);
        assert_eq!(m.state(), State::AwaitingAddress);
        assert!(!m.context().is_frozen());

        // Multi-block erase stops where the next row no longer fits
        let mut m = Machine::new(&config, Operation::Erase, 1);
        drive(
            &mut m,
            &[
                DeviceEvent::InitialErase,
                set(AddressKind::Block, (1 << 11) - 1),
                DeviceEvent::DoTransfer,
                DeviceEvent::DoErase,
            ],
        );
        let err = m.step(DeviceEvent::DoTransfer).unwrap_err();
        assert_eq!(err.rejection().unwrap().reason, Reason::AddressOutOfRange);
    }

    #[test]
    fn test_program_finish_and_timestamps() {
        let config = DeviceConfig::default();
        let mut m = Machine::new(&config, Operation::Program, 2);
        m.step(DeviceEvent::TimeWait(5)).unwrap();
        let l1 = drive(
            &mut m,
            &[
                DeviceEvent::InitialProgram(BUF),
                set(AddressKind::Block, 0),
                set(AddressKind::Page, 1),
                set(AddressKind::Byte, 0),
                DeviceEvent::DoTransfer,
                DeviceEvent::DoProgram,
            ],
        );
        assert_eq!(m.context().last_action(), Some(ActionKind::Program));
        assert_eq!(m.context().action_timestamp(), 5);
        assert_eq!(
            l1,
            ["CMD(opcode=0x80)", "ADDR(0x00, 0x00, 0x01, 0x00, 0x00)"]
        );

        let l1 = drive(
            &mut m,
            &[DeviceEvent::DoTransfer, DeviceEvent::DoTransfer, DeviceEvent::EndTransfer],
        );
        assert_eq!(
            l1,
            [
                "DATA_IN(size=1, buf=8192)",
                "DATA_IN(size=1, buf=8193)",
                "CMD(opcode=0x10)",
                "TIME_WAIT(660)",
            ]
        );
        assert_eq!(m.context().last_action(), Some(ActionKind::Transfer));
        assert_eq!(m.elapsed_us(), 665);
    }

    #[test]
    fn test_rejection_display() {
        let r = Rejection {
            event: DeviceEvent::DoRead,
            state: State::Idle,
            reason: Reason::NoTransition,
        };
        assert_eq!(r.to_string(), "DO_READ() rejected in state idle: no transition");
    }
}
