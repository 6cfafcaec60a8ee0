//! Command event recorder

use alloc::vec::Vec;

use nandseq_core::error::Result;
use nandseq_core::event::CommandEvent;
use nandseq_core::io::CommandSink;

/// Sink wrapper that records every command event before forwarding it
///
/// The event is recorded even if the inner sink then fails, so the last
/// recorded event is the one that broke the operation.
pub struct RecordingSink<S> {
    inner: S,
    events: Vec<CommandEvent>,
}

impl<S> RecordingSink<S> {
    /// Wrap a sink
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            events: Vec::new(),
        }
    }

    /// Events recorded so far
    pub fn events(&self) -> &[CommandEvent] {
        &self.events
    }

    /// Drain the recorded events
    pub fn take_events(&mut self) -> Vec<CommandEvent> {
        core::mem::take(&mut self.events)
    }

    /// The wrapped sink
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Mutable access to the wrapped sink
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: CommandSink> CommandSink for RecordingSink<S> {
    fn execute(&mut self, event: &CommandEvent) -> Result<()> {
        self.events.push(event.clone());
        self.inner.execute(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nandseq_core::error::{Error, IoFault};

    struct Broken;

    impl CommandSink for Broken {
        fn execute(&mut self, _event: &CommandEvent) -> Result<()> {
            Err(Error::Io(IoFault::Bus))
        }
    }

    #[test]
    fn test_records_failing_event() {
        let mut sink = RecordingSink::new(Broken);
        assert!(sink.execute(&CommandEvent::Cmd(0x60)).is_err());
        assert_eq!(sink.events(), [CommandEvent::Cmd(0x60)]);
        assert_eq!(sink.take_events().len(), 1);
        assert!(sink.events().is_empty());
    }
}
