//! Machine states

use core::fmt;

/// State of the protocol machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    /// Nothing started
    #[default]
    Idle,
    /// Operation recorded, collecting address components
    AwaitingAddress,
    /// Address frozen and latched, waiting for the DO_* action
    AwaitingAction,
    /// Action launched, moving data units
    Transferring,
    /// Operation finished; absorbing
    Terminal,
}

impl State {
    /// Every state
    pub const ALL: [Self; 5] = [
        Self::Idle,
        Self::AwaitingAddress,
        Self::AwaitingAction,
        Self::Transferring,
        Self::Terminal,
    ];

    /// Canonical snake-case name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingAddress => "awaiting_address",
            Self::AwaitingAction => "awaiting_action",
            Self::Transferring => "transferring",
            Self::Terminal => "terminal",
        }
    }

    /// Returns true for the absorbing final state
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminal)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}
