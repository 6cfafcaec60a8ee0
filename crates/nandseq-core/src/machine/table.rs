//! Transition table
//!
//! The whole protocol as data: each row maps a (state, L2 event kind) pair
//! to a guard, an action and a target. The machine looks rows up in order
//! and takes the first match, so the table can be printed, inspected and
//! tested without running anything.

use core::fmt;

use super::State;
use crate::context::Operation;
use crate::event::DeviceEventKind;

/// Where a transition may start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Exactly this state
    State(State),
    /// Any state except [`State::Terminal`]
    Live,
}

impl Source {
    /// Check if the machine in `state` may take this transition
    pub const fn matches(self, state: State) -> bool {
        match self {
            Self::State(s) => s as u8 == state as u8,
            Self::Live => !state.is_terminal(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(s) => f.pad(s.name()),
            Self::Live => f.pad("*"),
        }
    }
}

/// Where a transition leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Move to this state
    State(State),
    /// Self-loop
    Stay,
}

impl Target {
    /// Resolve the next state from the current one
    pub const fn resolve(self, current: State) -> State {
        match self {
            Self::State(s) => s,
            Self::Stay => current,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(s) => f.pad(s.name()),
            Self::Stay => f.pad("="),
        }
    }
}

/// Predicate over the context and the incoming event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Always passes
    Always,
    /// The initial event matches the requested operation, and its buffer
    /// (if any) lies in the DMA window
    RequestedOperation,
    /// Address not frozen, kind permitted for the operation, value inside
    /// the geometry
    AddressAccepted,
    /// Every component the operation requires has been set
    AddressComplete,
    /// The DO_* event matches the recorded operation
    ActionMatches,
    /// Cursor below the required length and the next unit stays on the device
    TransferPending,
    /// Cursor reached the required length
    TransferDone,
}

impl Guard {
    /// Short description used when printing the table
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::RequestedOperation => "requested operation",
            Self::AddressAccepted => "address accepted",
            Self::AddressComplete => "address complete",
            Self::ActionMatches => "action matches operation",
            Self::TransferPending => "cursor < length",
            Self::TransferDone => "cursor == length",
        }
    }
}

/// Side effect run when a transition is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Record the operation (and buffer) in the context
    BeginOperation,
    /// Write one address component
    WriteAddress,
    /// Freeze the address and emit the setup command and address cycles
    StartTransfer,
    /// Record the action and its timestamp, emit the launch events
    Launch,
    /// Emit one data unit and advance the cursor
    TransferUnit,
    /// Emit the closing events
    Finish,
    /// Ask the caller to suspend; no state change
    Suspend,
}

impl Action {
    /// Short description used when printing the table
    pub const fn describe(self) -> &'static str {
        match self {
            Self::BeginOperation => "begin operation",
            Self::WriteAddress => "write address",
            Self::StartTransfer => "freeze address, emit setup",
            Self::Launch => "record action, emit launch",
            Self::TransferUnit => "advance cursor, emit data",
            Self::Finish => "emit finish",
            Self::Suspend => "suspend",
        }
    }
}

/// One row of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Source state(s)
    pub from: Source,
    /// Triggering L2 event kind
    pub trigger: DeviceEventKind,
    /// Guard evaluated before anything changes
    pub guard: Guard,
    /// Action run when the guard passes
    pub action: Action,
    /// Next state
    pub to: Target,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} + {:<15} [{}] / {} -> {}",
            self.from,
            self.trigger.name(),
            self.guard.describe(),
            self.action.describe(),
            self.to
        )
    }
}

const fn row(
    from: Source,
    trigger: DeviceEventKind,
    guard: Guard,
    action: Action,
    to: Target,
) -> Transition {
    Transition {
        from,
        trigger,
        guard,
        action,
        to,
    }
}

use self::Source::Live;
use crate::event::DeviceEventKind as K;

/// The protocol
pub static TRANSITIONS: &[Transition] = &[
    row(
        Source::State(State::Idle),
        K::InitialRead,
        Guard::RequestedOperation,
        Action::BeginOperation,
        Target::State(State::AwaitingAddress),
    ),
    row(
        Source::State(State::Idle),
        K::InitialProgram,
        Guard::RequestedOperation,
        Action::BeginOperation,
        Target::State(State::AwaitingAddress),
    ),
    row(
        Source::State(State::Idle),
        K::InitialErase,
        Guard::RequestedOperation,
        Action::BeginOperation,
        Target::State(State::AwaitingAddress),
    ),
    row(
        Source::State(State::AwaitingAddress),
        K::SetAddress,
        Guard::AddressAccepted,
        Action::WriteAddress,
        Target::Stay,
    ),
    row(
        Source::State(State::AwaitingAddress),
        K::DoTransfer,
        Guard::AddressComplete,
        Action::StartTransfer,
        Target::State(State::AwaitingAction),
    ),
    row(
        Source::State(State::AwaitingAction),
        K::DoRead,
        Guard::ActionMatches,
        Action::Launch,
        Target::State(State::Transferring),
    ),
    row(
        Source::State(State::AwaitingAction),
        K::DoProgram,
        Guard::ActionMatches,
        Action::Launch,
        Target::State(State::Transferring),
    ),
    row(
        Source::State(State::AwaitingAction),
        K::DoErase,
        Guard::ActionMatches,
        Action::Launch,
        Target::State(State::Transferring),
    ),
    row(
        Source::State(State::Transferring),
        K::DoTransfer,
        Guard::TransferPending,
        Action::TransferUnit,
        Target::Stay,
    ),
    row(
        Source::State(State::Transferring),
        K::EndTransfer,
        Guard::TransferDone,
        Action::Finish,
        Target::State(State::Terminal),
    ),
    row(Live, K::TimeWait, Guard::Always, Action::Suspend, Target::Stay),
];

/// Find the transition for an event kind in a state
pub fn lookup(state: State, trigger: DeviceEventKind) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.trigger == trigger && t.from.matches(state))
}

/// Operation an INITIAL_* or DO_* event kind stands for
pub const fn operation_of(kind: DeviceEventKind) -> Operation {
    match kind {
        K::InitialRead | K::DoRead => Operation::Read,
        K::InitialProgram | K::DoProgram => Operation::Program,
        K::InitialErase | K::DoErase => Operation::Erase,
        K::TimeWait | K::SetAddress | K::DoTransfer | K::EndTransfer => Operation::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_row_is_reachable() {
        // First-match lookup must find each row for its own trigger
        for t in TRANSITIONS {
            let state = match t.from {
                Source::State(s) => s,
                Source::Live => State::Idle,
            };
            assert_eq!(lookup(state, t.trigger), Some(t));
        }
    }

    #[test]
    fn test_no_duplicate_rows() {
        for state in State::ALL {
            for kind in DeviceEventKind::ALL {
                let n = TRANSITIONS
                    .iter()
                    .filter(|t| t.trigger == kind && t.from.matches(state))
                    .count();
                assert!(n <= 1, "{} + {} has {} rows", state, kind, n);
            }
        }
    }

    #[test]
    fn test_terminal_has_no_transitions() {
        for kind in DeviceEventKind::ALL {
            assert!(lookup(State::Terminal, kind).is_none());
        }
    }

    #[test]
    fn test_time_wait_valid_in_live_states() {
        for state in State::ALL {
            let t = lookup(state, DeviceEventKind::TimeWait);
            assert_eq!(t.is_some(), !state.is_terminal());
            if let Some(t) = t {
                assert_eq!(t.to.resolve(state), state);
            }
        }
    }

    #[test]
    fn test_idle_accepts_only_initial_events() {
        let accepted: std::vec::Vec<_> = DeviceEventKind::ALL
            .into_iter()
            .filter(|k| *k != DeviceEventKind::TimeWait && lookup(State::Idle, *k).is_some())
            .collect();
        assert_eq!(
            accepted,
            [K::InitialRead, K::InitialProgram, K::InitialErase]
        );
    }

    #[test]
    fn test_operation_of() {
        assert_eq!(operation_of(K::InitialRead), Operation::Read);
        assert_eq!(operation_of(K::DoProgram), Operation::Program);
        assert_eq!(operation_of(K::DoErase), Operation::Erase);
        assert_eq!(operation_of(K::EndTransfer), Operation::Invalid);
    }

    #[test]
    fn test_row_display() {
        use std::string::ToString;
        let line = TRANSITIONS[0].to_string();
        assert!(line.starts_with("idle"));
        assert!(line.contains("INITIAL_READ"));
        assert!(line.ends_with("-> awaiting_address"));
        assert!(TRANSITIONS.last().unwrap().to_string().starts_with("*"));
    }
}
