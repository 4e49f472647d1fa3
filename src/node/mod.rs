use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub mod gate;
pub mod reachability;
pub mod scheduler;
pub mod state;

use crate::audit::{AuditEvent, AuditLog};
use crate::error::Result;
use crate::registry::{Member, MemberId, MembershipRegistry};
use crate::settings::RingSettings;
use crate::transport::{Ack, Token, TokenSender};
pub use gate::CriticalSectionGate;
pub use reachability::Reachability;
pub use scheduler::RingScheduler;
pub use state::{TokenPhase, TokenState};

/// What a single forwarding attempt did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Nothing to forward
    NotHolding,
    /// This member is the whole ring; the token stays here
    Alone,
    /// This member is not in the registry snapshot yet
    NotRegistered,
    /// The successor acknowledged the token
    Forwarded { to: MemberId, hops: u64 },
    /// The hand-off failed and the token was kept
    Retained {
        to: MemberId,
        failures: u32,
        error: String,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub member: MemberId,
    pub join_order: usize,
    pub phase: TokenPhase,
    pub holds_token: bool,
    pub wants_critical_section: bool,
    pub cached_successor: Option<MemberId>,
    pub hops: Option<u64>,
}

/// One member of the ring.
///
/// All token bookkeeping lives in a single guarded [`TokenState`]. The lock is
/// held for state transitions and critical-section execution only; registry
/// reads and the outbound hand-off happen with it released.
#[derive(Clone)]
pub struct RingNode {
    member: Member,
    state: Arc<Mutex<TokenState>>,
    reachability: Arc<Mutex<Reachability>>,
    gate: Arc<CriticalSectionGate>,
    registry: Arc<dyn MembershipRegistry>,
    sender: Arc<dyn TokenSender>,
    audit: Arc<dyn AuditLog>,
}

impl std::fmt::Debug for RingNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingNode")
            .field("member", &self.member)
            .finish()
    }
}

impl RingNode {
    /// Build a node for an already registered member. Only the founding registration holds the token.
    pub fn new(
        member: Member,
        registry: Arc<dyn MembershipRegistry>,
        sender: Arc<dyn TokenSender>,
        audit: Arc<dyn AuditLog>,
        settings: &RingSettings,
    ) -> Self {
        let state = TokenState::new(member.id, member.starts_with_token());
        if state.holds_token() {
            info!("[{}] First member of the ring, starting with the token", member.id);
        }
        Self {
            member,
            state: Arc::new(Mutex::new(state)),
            reachability: Arc::new(Mutex::new(Reachability::new(
                settings.max_send_failures,
                settings.suspect_timeout(),
            ))),
            gate: Arc::new(CriticalSectionGate::new(member.id, audit.clone())),
            registry,
            sender,
            audit,
        }
    }

    /// Register with the registry (a fixed id, or the next free one after
    /// `base`) and build the node.
    pub async fn join(
        candidate: Option<MemberId>,
        base: MemberId,
        registry: Arc<dyn MembershipRegistry>,
        sender: Arc<dyn TokenSender>,
        audit: Arc<dyn AuditLog>,
        settings: &RingSettings,
    ) -> Result<Self> {
        let member = match candidate {
            Some(id) => registry.register(id).await?,
            None => registry.register_next(base).await?,
        };
        info!(
            "[{}] Joined the ring at position {}",
            member.id, member.join_order
        );
        Ok(Self::new(member, registry, sender, audit, settings))
    }

    pub fn member(&self) -> Member {
        self.member
    }

    pub fn member_id(&self) -> MemberId {
        self.member.id
    }

    pub async fn holds_token(&self) -> bool {
        self.state.lock().await.holds_token()
    }

    pub async fn phase(&self) -> TokenPhase {
        self.state.lock().await.phase()
    }

    pub async fn wants_critical_section(&self) -> bool {
        self.state.lock().await.wants_critical_section()
    }

    pub async fn status(&self) -> StatusResponse {
        let state = self.state.lock().await;
        StatusResponse {
            member: self.member.id,
            join_order: self.member.join_order,
            phase: state.phase(),
            holds_token: state.holds_token(),
            wants_critical_section: state.wants_critical_section(),
            cached_successor: state.cached_successor(),
            hops: state.last_token().map(|token| token.hops),
        }
    }

    /// Ask for the critical section; it runs the next time the token arrives.
    pub async fn request_critical_section(&self) -> bool {
        let mut state = self.state.lock().await;
        self.gate.request_critical_section(&mut state)
    }

    /// Inbound side of the token RPC.
    pub async fn receive_token(&self, token: Token) -> Result<Ack> {
        let mut state = self.state.lock().await;
        match state.arrive(token) {
            TokenPhase::Idle => debug!(
                "[{}] Received token from {} (hop {})",
                self.member.id, token.from, token.hops
            ),
            TokenPhase::Holding => debug!(
                "[{}] Token arrived again while holding, refreshing",
                self.member.id
            ),
            TokenPhase::Sending => info!(
                "[{}] Token came back from {} before our hand-off committed",
                self.member.id, token.from
            ),
        }
        self.gate.on_token_arrival(&mut state).await?;
        Ok(Ack {
            accepted: true,
            member: self.member.id,
        })
    }

    /// One attempt of the forwarding loop.
    ///
    /// Transport failures are not errors here: the token is kept and the
    /// outcome is `Retained`. A registry failure is returned as an error with
    /// the token still held.
    pub async fn forward_once(&self) -> Result<ForwardOutcome> {
        let me = self.member.id;
        if !self.holds_token().await {
            return Ok(ForwardOutcome::NotHolding);
        }

        let snapshot = self.registry.snapshot().await?;
        let target = self.reachability.lock().await.choose_target(me, &snapshot);
        let target = match target {
            None => {
                warn!("[{}] Not in the registry snapshot yet, keeping the token", me);
                return Ok(ForwardOutcome::NotRegistered);
            }
            Some(target) if target == me => {
                debug!("[{}] All alone...", me);
                return Ok(ForwardOutcome::Alone);
            }
            Some(target) => target,
        };

        let token = {
            let mut state = self.state.lock().await;
            if !state.holds_token() {
                return Ok(ForwardOutcome::NotHolding);
            }
            state.begin_send(me, target)?
        };

        match self.sender.send_token(target, token).await {
            Ok(_ack) => {
                let phase = self.state.lock().await.commit_send();
                self.reachability.lock().await.record_success(target);
                info!("[{}] Passed the token to {} (hop {})", me, target, token.hops);
                if phase == TokenPhase::Holding {
                    debug!("[{}] Token already back before commit", me);
                }
                if let Err(err) = self
                    .audit
                    .record(AuditEvent::transfer(me, target, token.hops))
                    .await
                {
                    warn!("[{}] Failed to audit transfer to {}: {}", me, target, err);
                }
                Ok(ForwardOutcome::Forwarded {
                    to: target,
                    hops: token.hops,
                })
            }
            Err(err) => {
                self.state.lock().await.abort_send();
                let failures = self.reachability.lock().await.record_failure(target);
                warn!(
                    "[{}] Could not pass the token to {} ({} in a row), keeping it: {}",
                    me, target, failures, err
                );
                Ok(ForwardOutcome::Retained {
                    to: target,
                    failures,
                    error: err.to_string(),
                })
            }
        }
    }
}
