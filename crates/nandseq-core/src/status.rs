//! Event and operation status tracking
//!
//! Every submitted event moves through
//! `PENDING -> SUBMITTED -> {COMPLETED | FAILED}`. The two final states are
//! irreversible. An event that is abandoned before it was ever submitted
//! may go straight from `PENDING` to `FAILED`.

use core::fmt;

use crate::error::{Error, Result};

/// Lifecycle status of an event or operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Created, not yet handed to the state machine
    #[default]
    Pending,
    /// Handed to the state machine
    Submitted,
    /// Accepted and its action ran
    Completed,
    /// Rejected, or abandoned
    Failed,
}

impl Status {
    /// Returns true for COMPLETED and FAILED
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check whether moving from `self` to `to` is a legal transition
    pub const fn can_transition(self, to: Status) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Submitted)
                | (Self::Pending, Self::Failed)
                | (Self::Submitted, Self::Completed)
                | (Self::Submitted, Self::Failed)
        )
    }

    /// Move to `to`, or fail with [`Error::InvalidStatusTransition`]
    pub fn transition(self, to: Status) -> Result<Status> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(Error::InvalidStatusTransition { from: self, to })
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// An event paired with its lifecycle status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracked<E> {
    event: E,
    status: Status,
}

impl<E> Tracked<E> {
    /// Start tracking an event in PENDING
    pub fn new(event: E) -> Self {
        Self {
            event,
            status: Status::Pending,
        }
    }

    /// The tracked event
    pub fn event(&self) -> &E {
        &self.event
    }

    /// Current status
    pub fn status(&self) -> Status {
        self.status
    }

    /// PENDING -> SUBMITTED
    pub fn submit(&mut self) -> Result<()> {
        self.set(Status::Submitted)
    }

    /// SUBMITTED -> COMPLETED
    pub fn complete(&mut self) -> Result<()> {
        self.set(Status::Completed)
    }

    /// PENDING or SUBMITTED -> FAILED
    pub fn fail(&mut self) -> Result<()> {
        self.set(Status::Failed)
    }

    fn set(&mut self, to: Status) -> Result<()> {
        self.status = self.status.transition(to)?;
        Ok(())
    }
}

impl<E: fmt::Display> fmt::Display for Tracked<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.event, self.status)
    }
}

/// Per-event status log of one operation
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLog<E> {
    entries: alloc::vec::Vec<Tracked<E>>,
}

#[cfg(feature = "alloc")]
impl<E> Default for StatusLog<E> {
    fn default() -> Self {
        Self {
            entries: alloc::vec::Vec::new(),
        }
    }
}

#[cfg(feature = "alloc")]
impl<E> StatusLog<E> {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event in PENDING, returning its index
    pub fn push(&mut self, event: E) -> usize {
        self.entries.push(Tracked::new(event));
        self.entries.len() - 1
    }

    /// Mutable access to one entry
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Tracked<E>> {
        self.entries.get_mut(index)
    }

    /// All entries, in submission order
    pub fn entries(&self) -> &[Tracked<E>] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was logged
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fail every entry that never reached a final status
    pub fn fail_outstanding(&mut self) {
        for entry in &mut self.entries {
            if !entry.status.is_terminal() {
                entry.status = Status::Failed;
            }
        }
    }

    /// The first failed entry, if any
    pub fn first_failure(&self) -> Option<&Tracked<E>> {
        self.entries.iter().find(|e| e.status == Status::Failed)
    }

    /// Operation status: COMPLETED only if every entry completed
    ///
    /// An empty log is still PENDING.
    pub fn aggregate(&self) -> Status {
        if self.entries.is_empty() {
            Status::Pending
        } else if self.entries.iter().all(|e| e.status == Status::Completed) {
            Status::Completed
        } else if self.entries.iter().any(|e| e.status == Status::Failed) {
            Status::Failed
        } else {
            Status::Submitted
        }
    }

    /// Remove all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_lifecycle() {
        let mut t = Tracked::new("DO_READ()");
        assert_eq!(t.status(), Status::Pending);
        t.submit().unwrap();
        assert_eq!(t.status(), Status::Submitted);
        t.complete().unwrap();
        assert_eq!(t.status(), Status::Completed);
        assert!(t.status().is_terminal());
    }

    #[test]
    fn test_terminal_states_are_irreversible() {
        let mut t = Tracked::new(1u8);
        t.submit().unwrap();
        t.fail().unwrap();
        assert_eq!(
            t.complete(),
            Err(Error::InvalidStatusTransition {
                from: Status::Failed,
                to: Status::Completed
            })
        );
        assert!(t.submit().is_err());
        assert_eq!(t.status(), Status::Failed);
    }

    #[test]
    fn test_cannot_complete_without_submit() {
        let mut t = Tracked::new(1u8);
        assert!(t.complete().is_err());
        assert_eq!(t.status(), Status::Pending);
        // Abandoned before submission
        t.fail().unwrap();
        assert_eq!(t.status(), Status::Failed);
    }

    #[test]
    fn test_transition_table() {
        use Status::*;
        let all = [Pending, Submitted, Completed, Failed];
        let legal = [
            (Pending, Submitted),
            (Pending, Failed),
            (Submitted, Completed),
            (Submitted, Failed),
        ];
        for from in all {
            for to in all {
                assert_eq!(from.can_transition(to), legal.contains(&(from, to)));
            }
        }
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn test_log_aggregation() {
        let mut log = StatusLog::new();
        assert_eq!(log.aggregate(), Status::Pending);

        let a = log.push('a');
        let b = log.push('b');
        log.get_mut(a).unwrap().submit().unwrap();
        log.get_mut(a).unwrap().complete().unwrap();
        log.get_mut(b).unwrap().submit().unwrap();
        assert_eq!(log.aggregate(), Status::Submitted);

        log.get_mut(b).unwrap().complete().unwrap();
        assert_eq!(log.aggregate(), Status::Completed);
        assert!(log.first_failure().is_none());

        let c = log.push('c');
        log.get_mut(c).unwrap().submit().unwrap();
        log.get_mut(c).unwrap().fail().unwrap();
        log.push('d');
        log.fail_outstanding();
        assert_eq!(log.aggregate(), Status::Failed);
        assert_eq!(*log.first_failure().unwrap().event(), 'c');
        assert_eq!(log.entries()[3].status(), Status::Failed);
    }
}
