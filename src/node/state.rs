//! Per-node token state machine.
//!
//! ```text
//!          arrive               begin_send
//!   Idle ----------> Holding ------------> Sending
//!    ^                  ^                    |  |
//!    |                  +---- abort_send ----+  |
//!    +---------------------- commit_send -------+
//! ```
//!
//! Every transition is a method taking `&mut self`; callers hold the node lock.
use serde::{Deserialize, Serialize};

use crate::error::{RingError, Result};
use crate::registry::MemberId;
use crate::transport::Token;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum TokenPhase {
    /// No token here
    Idle,
    /// Token present, nothing in flight
    Holding,
    /// Token handed to the transport, not yet acknowledged
    Sending,
}

impl std::fmt::Display for TokenPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenPhase::Idle => write!(f, "idle"),
            TokenPhase::Holding => write!(f, "holding"),
            TokenPhase::Sending => write!(f, "sending"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TokenState {
    phase: TokenPhase,
    wants_critical_section: bool,
    cached_successor: Option<MemberId>,
    last_token: Option<Token>,
}

impl TokenState {
    /// Initial state: the first registrant starts out holding a fresh token
    pub fn new(owner: MemberId, holding: bool) -> Self {
        if holding {
            Self {
                phase: TokenPhase::Holding,
                wants_critical_section: false,
                cached_successor: None,
                last_token: Some(Token::genesis(owner)),
            }
        } else {
            Self {
                phase: TokenPhase::Idle,
                wants_critical_section: false,
                cached_successor: None,
                last_token: None,
            }
        }
    }

    pub fn phase(&self) -> TokenPhase {
        self.phase
    }

    pub fn holds_token(&self) -> bool {
        self.phase == TokenPhase::Holding
    }

    pub fn wants_critical_section(&self) -> bool {
        self.wants_critical_section
    }

    pub fn cached_successor(&self) -> Option<MemberId> {
        self.cached_successor
    }

    pub fn last_token(&self) -> Option<Token> {
        self.last_token
    }

    /// The token arrived. Returns the phase the node was in before.
    ///
    /// Arriving while `Holding` only refreshes the token. Arriving while
    /// `Sending` means the token went around the ring before our own send
    /// committed; the node holds it now and the pending commit keeps it.
    pub fn arrive(&mut self, token: Token) -> TokenPhase {
        let previous = self.phase;
        self.phase = TokenPhase::Holding;
        self.last_token = Some(token);
        previous
    }

    /// Flag a pending critical-section request. Returns `false` if one was already pending.
    pub fn request_critical_section(&mut self) -> bool {
        let newly_requested = !self.wants_critical_section;
        self.wants_critical_section = true;
        newly_requested
    }

    /// Clear the request after the critical section ran. Only legal while holding the token.
    pub fn complete_critical_section(&mut self) -> Result<()> {
        if !self.holds_token() {
            return Err(RingError::InvalidTransition(format!(
                "cannot complete a critical section while {}",
                self.phase
            )));
        }
        self.wants_critical_section = false;
        Ok(())
    }

    /// `Holding -> Sending`: the token leaves `sender` for `successor`.
    pub fn begin_send(&mut self, sender: MemberId, successor: MemberId) -> Result<Token> {
        if self.phase != TokenPhase::Holding {
            return Err(RingError::InvalidTransition(format!(
                "cannot send the token while {}",
                self.phase
            )));
        }
        let token = self
            .last_token
            .unwrap_or_else(|| Token::genesis(sender))
            .next_hop(sender);
        self.phase = TokenPhase::Sending;
        self.cached_successor = Some(successor);
        Ok(token)
    }

    /// The successor acknowledged. Returns the resulting phase.
    pub fn commit_send(&mut self) -> TokenPhase {
        if self.phase == TokenPhase::Sending {
            self.phase = TokenPhase::Idle;
        }
        self.phase
    }

    /// The send failed: keep the token. Returns the resulting phase.
    pub fn abort_send(&mut self) -> TokenPhase {
        if self.phase == TokenPhase::Sending {
            self.phase = TokenPhase::Holding;
        }
        self.phase
    }
}
