//! Token transport
//!
//! Wire types for the single `receive_token` RPC and the outbound side that
//! delivers the token to a successor. The inbound side is served by
//! [`crate::api`] and handled by [`crate::node::RingNode::receive_token`].

pub mod http;
pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::registry::MemberId;
pub use http::HttpTokenSender;
pub use local::LocalTransport;

/// The circulating permission. `from` and `hops` are carried for logging only.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Token {
    pub from: MemberId,
    pub hops: u64,
}

impl Token {
    /// The token as minted by the first registrant
    pub fn genesis(holder: MemberId) -> Self {
        Self {
            from: holder,
            hops: 0,
        }
    }

    /// The token as it leaves `sender` on its next hop
    pub fn next_hop(&self, sender: MemberId) -> Self {
        Self {
            from: sender,
            hops: self.hops + 1,
        }
    }
}

/// Acknowledgment of a `receive_token` call
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Ack {
    pub accepted: bool,
    pub member: MemberId,
}

/// Outbound half of the token RPC
#[async_trait]
pub trait TokenSender: Send + Sync {
    /// Deliver `token` to `target`, returning once the target acknowledged it.
    /// Any failure is a `RingError::Transport`.
    async fn send_token(&self, target: MemberId, token: Token) -> Result<Ack>;
}
