//! Ring membership: who is in the ring and in which order.
//!
//! The registry is an append-only list of member ids shared by every process.
//! Ring order is insertion order and wraps around at the end.
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod file;
pub mod memory;

use crate::error::{RingError, Result};
pub use file::FileRegistry;
pub use memory::InMemoryRegistry;

/// Identifier of a ring member. It is also the port of the member's RPC endpoint.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, PartialOrd, Ord, Eq, Hash,
)]
pub struct MemberId(u16);

impl MemberId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u16 {
        self.0
    }

    /// The id directly after this one, if there is one
    pub fn checked_next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl From<u16> for MemberId {
    fn from(id: u16) -> Self {
        MemberId::new(id)
    }
}

impl FromStr for MemberId {
    type Err = RingError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u16>()
            .map(MemberId)
            .map_err(|e| RingError::MemberParse(format!("{:?}: {}", s, e)))
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered member and the position it was given at registration.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Member {
    pub id: MemberId,
    pub join_order: usize,
    /// Set only when this registration appended to an empty registry
    pub founder: bool,
}

impl Member {
    /// Only the founding registration mints the token. Re-registering an id
    /// that is already present never does, whatever its position.
    pub fn starts_with_token(&self) -> bool {
        self.founder
    }
}

#[async_trait]
pub trait MembershipRegistry: Send + Sync {
    /// Append `candidate` and return its position. A candidate that is already
    /// registered keeps its original position.
    async fn register(&self, candidate: MemberId) -> Result<Member>;

    /// Allocate the id after the highest registered one (or `base` on an empty
    /// registry) and append it in the same atomic step.
    async fn register_next(&self, base: MemberId) -> Result<Member>;

    /// Current membership in ring order.
    async fn snapshot(&self) -> Result<Vec<MemberId>>;
}

/// Next member after `id` in ring order, wrapping to the front.
///
/// A lone member is its own successor. Returns `None` when `id` is not part
/// of `snapshot`, e.g. when a registration is not visible yet.
pub fn successor_of(id: MemberId, snapshot: &[MemberId]) -> Option<MemberId> {
    let position = snapshot.iter().position(|member| *member == id)?;
    let next = (position + 1) % snapshot.len();
    Some(snapshot[next])
}

/// Parse registry lines, skipping (and logging) entries that are not member ids.
pub(crate) fn parse_entries(contents: &str) -> Vec<MemberId> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match line.parse::<MemberId>() {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!("Skipping registry entry: {}", err);
                None
            }
        })
        .collect()
}

/// Shared bookkeeping for stores that keep a plain ordered list of ids.
pub(crate) fn append_candidate(entries: &mut Vec<MemberId>, candidate: MemberId) -> Member {
    match entries.iter().position(|member| *member == candidate) {
        Some(join_order) => Member {
            id: candidate,
            join_order,
            founder: false,
        },
        None => {
            let founder = entries.is_empty();
            entries.push(candidate);
            Member {
                id: candidate,
                join_order: entries.len() - 1,
                founder,
            }
        }
    }
}

pub(crate) fn next_candidate(entries: &[MemberId], base: MemberId) -> Result<MemberId> {
    match entries.iter().max() {
        None => Ok(base),
        Some(highest) => highest.checked_next().ok_or_else(|| {
            crate::config_error!("member id space exhausted after {}", highest)
        }),
    }
}
