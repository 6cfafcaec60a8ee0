//! Operation orchestrator
//!
//! The [`Orchestrator`] is the entry point for running whole operations.
//! Given an operation, an address and a payload it builds the canonical L2
//! sequence, feeds it through a fresh [`Machine`], tracks every event's
//! status and forwards everything the machine emits to a [`CommandSink`].
//!
//! Processing is strictly sequential. The first rejected event or sink
//! failure abandons the operation: every event that did not complete is
//! marked FAILED, the context is dropped and the error is returned.

use alloc::vec::Vec;
use core::iter;

use maybe_async::maybe_async;

use crate::config::{AddressPolicy, DeviceConfig};
use crate::context::{Address, Context, Operation};
use crate::error::{Error, Result};
use crate::event::{BufferAddr, CommandEvent, DeviceEvent};
use crate::io::CommandSink;
use crate::machine::Machine;
use crate::status::{Status, StatusLog};

/// Operation-specific input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Read `units` transfer units into the host buffer at `buf`
    Read {
        /// Destination buffer
        buf: BufferAddr,
        /// Number of transfer units
        units: usize,
    },
    /// Program `units` transfer units from the host buffer at `buf`
    Program {
        /// Source buffer
        buf: BufferAddr,
        /// Number of transfer units
        units: usize,
    },
    /// Erase `blocks` consecutive blocks starting at the addressed one
    Erase {
        /// Number of blocks
        blocks: usize,
    },
}

impl Payload {
    /// The operation this payload belongs to
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Read { .. } => Operation::Read,
            Self::Program { .. } => Operation::Program,
            Self::Erase { .. } => Operation::Erase,
        }
    }

    /// Number of data steps after the action
    ///
    /// The addressed block is erased by the action itself, so an erase of
    /// `n` blocks needs `n - 1` further steps.
    pub const fn required_len(&self) -> usize {
        match *self {
            Self::Read { units, .. } | Self::Program { units, .. } => units,
            Self::Erase { blocks } => blocks.saturating_sub(1),
        }
    }

    const fn initial_event(&self) -> DeviceEvent {
        match *self {
            Self::Read { buf, .. } => DeviceEvent::InitialRead(buf),
            Self::Program { buf, .. } => DeviceEvent::InitialProgram(buf),
            Self::Erase { .. } => DeviceEvent::InitialErase,
        }
    }

    const fn action_event(&self) -> DeviceEvent {
        match self {
            Self::Read { .. } => DeviceEvent::DoRead,
            Self::Program { .. } => DeviceEvent::DoProgram,
            Self::Erase { .. } => DeviceEvent::DoErase,
        }
    }
}

fn check_payload(operation: Operation, payload: &Payload) -> Result<()> {
    if operation == Operation::Invalid {
        return Err(Error::InvalidOperation);
    }
    if payload.operation() != operation {
        return Err(Error::PayloadMismatch);
    }
    Ok(())
}

/// Check a request against the device before anything is submitted
fn validate(
    config: &DeviceConfig,
    operation: Operation,
    address: Address,
    payload: &Payload,
) -> Result<()> {
    check_payload(operation, payload)?;
    let geometry = &config.geometry;
    match *payload {
        Payload::Read { buf, units } | Payload::Program { buf, units } => {
            if units == 0 {
                return Err(Error::InvalidLength);
            }
            let bytes = units as u64 * geometry.transfer_unit as u64;
            // A start byte past the page is left for the machine to reject
            if address.byte < geometry.page_size
                && address.byte as u64 + bytes > geometry.page_size as u64
            {
                return Err(Error::InvalidLength);
            }
            if !config.buffer.contains_range(buf, bytes) {
                return Err(Error::BufferOutOfWindow);
            }
        }
        Payload::Erase { blocks } => {
            if blocks == 0 {
                return Err(Error::InvalidLength);
            }
            // An out-of-range start block is left for the machine to reject
            if address.block < geometry.blocks
                && address.block as u64 + blocks as u64 > geometry.blocks as u64
            {
                return Err(Error::InvalidLength);
            }
        }
    }
    Ok(())
}

/// The canonical L2 sequence for an operation, produced lazily
///
/// Initial event, one `SET_ADDRESS` per required component in Block, Page,
/// Byte order, `DO_TRANSFER`, the `DO_*` action, one `DO_TRANSFER` per data
/// step, `END_TRANSFER`.
pub fn canonical_sequence(
    operation: Operation,
    address: Address,
    payload: Payload,
    policy: &AddressPolicy,
) -> Result<impl Iterator<Item = DeviceEvent>> {
    check_payload(operation, &payload)?;
    let required = policy.for_operation(operation).required;

    Ok(iter::once(payload.initial_event())
        .chain(
            required
                .kinds()
                .map(move |kind| DeviceEvent::set_address(kind, address.get(kind))),
        )
        .chain(iter::once(DeviceEvent::DoTransfer))
        .chain(iter::once(payload.action_event()))
        .chain(iter::repeat(DeviceEvent::DoTransfer).take(payload.required_len()))
        .chain(iter::once(DeviceEvent::EndTransfer)))
}

/// Result of a completed operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Aggregate status (COMPLETED on success)
    pub status: Status,
    /// Number of L2 events processed
    pub events: usize,
    /// Final context
    pub context: Context,
    /// Logical time spent waiting, in microseconds
    pub elapsed_us: u64,
}

/// Runs operations against a command sink
pub struct Orchestrator<'c, S> {
    sink: S,
    config: &'c DeviceConfig,
    log: StatusLog<DeviceEvent>,
}

impl<'c, S: CommandSink> Orchestrator<'c, S> {
    /// Create an orchestrator
    pub fn new(sink: S, config: &'c DeviceConfig) -> Self {
        Self {
            sink,
            config,
            log: StatusLog::new(),
        }
    }

    /// The device configuration
    pub fn config(&self) -> &DeviceConfig {
        self.config
    }

    /// Access the sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the sink
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Release the sink
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Per-event statuses of the most recent run
    ///
    /// Empty after a request that [`execute`](Self::execute) refused
    /// before submitting anything; the refusal is only in its error.
    pub fn statuses(&self) -> &StatusLog<DeviceEvent> {
        &self.log
    }

    /// Run one operation in its canonical form
    ///
    /// The request is checked against the device first. A refused request
    /// submits no events and returns `InvalidLength`, `BufferOutOfWindow`,
    /// `PayloadMismatch` or `InvalidOperation`.
    #[maybe_async]
    pub async fn execute(
        &mut self,
        operation: Operation,
        address: Address,
        payload: Payload,
    ) -> Result<Report> {
        self.log.clear();
        validate(self.config, operation, address, &payload)?;
        let events = canonical_sequence(operation, address, payload, &self.config.address)?;
        self.run(operation, payload.required_len(), events).await
    }

    /// Drive an arbitrary L2 sequence through a fresh machine
    ///
    /// The sequence must take the machine to its terminal state; one that
    /// stops short is abandoned.
    #[maybe_async]
    pub async fn run<I>(
        &mut self,
        operation: Operation,
        required_len: usize,
        events: I,
    ) -> Result<Report>
    where
        I: IntoIterator<Item = DeviceEvent>,
    {
        let config = self.config;
        let mut machine = Machine::new(config, operation, required_len);

        self.log.clear();
        let events: Vec<DeviceEvent> = events.into_iter().collect();
        for event in &events {
            self.log.push(*event);
        }
        log::debug!(
            "{}: {} events, length {}",
            operation,
            events.len(),
            required_len
        );

        for (index, event) in events.iter().enumerate() {
            if let Err(e) = self.submit(&mut machine, index, *event).await {
                self.log.fail_outstanding();
                log::debug!("{} abandoned at event {}: {}", operation, index, e);
                return Err(e);
            }
        }

        if !machine.is_terminal() {
            log::warn!(
                "{} abandoned in state {} after {} events",
                operation,
                machine.state(),
                events.len()
            );
            return Err(Error::Abandoned);
        }

        let report = Report {
            status: self.log.aggregate(),
            events: self.log.len(),
            elapsed_us: machine.elapsed_us(),
            context: machine.into_context(),
        };
        log::debug!(
            "{} {} after {} us",
            operation,
            report.status,
            report.elapsed_us
        );
        Ok(report)
    }

    #[maybe_async]
    async fn submit(
        &mut self,
        machine: &mut Machine<'_>,
        index: usize,
        event: DeviceEvent,
    ) -> Result<()> {
        if let Some(entry) = self.log.get_mut(index) {
            entry.submit()?;
        }

        let step = machine.step(event)?;
        for l1 in &step.emitted {
            if let Err(e) = self.sink.execute(l1).await {
                log::error!("{} failed while handling {}: {}", l1, event, e);
                return Err(e);
            }
        }
        if let Some(us) = step.suspend {
            self.sink.execute(&CommandEvent::TimeWait(us)).await?;
        }

        if let Some(entry) = self.log.get_mut(index) {
            entry.complete()?;
        }
        Ok(())
    }
}
