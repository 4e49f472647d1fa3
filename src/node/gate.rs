use std::sync::Arc;

use tracing::{info, warn};

use super::state::TokenState;
use crate::audit::{AuditEvent, AuditLog, CriticalSectionPhase};
use crate::error::Result;
use crate::registry::MemberId;

/// Decides when a held token lets this node run its critical section.
///
/// At most one execution happens per token visit: the request flag is only
/// consumed on arrival, so a request made while already holding waits for the
/// token to come around again.
pub struct CriticalSectionGate {
    member: MemberId,
    audit: Arc<dyn AuditLog>,
}

impl std::fmt::Debug for CriticalSectionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriticalSectionGate")
            .field("member", &self.member)
            .finish()
    }
}

impl CriticalSectionGate {
    pub fn new(member: MemberId, audit: Arc<dyn AuditLog>) -> Self {
        Self { member, audit }
    }

    /// Mark the node as wanting the critical section. Does not need the token.
    pub fn request_critical_section(&self, state: &mut TokenState) -> bool {
        state.request_critical_section()
    }

    /// Runs once per token arrival, with the node lock held.
    /// Returns whether the critical section ran.
    pub async fn on_token_arrival(&self, state: &mut TokenState) -> Result<bool> {
        if !state.holds_token() || !state.wants_critical_section() {
            return Ok(false);
        }
        self.record(CriticalSectionPhase::Enter).await;
        info!("[{}] Performed action in critical section", self.member);
        self.record(CriticalSectionPhase::Perform).await;
        self.record(CriticalSectionPhase::Leave).await;
        state.complete_critical_section()?;
        Ok(true)
    }

    async fn record(&self, phase: CriticalSectionPhase) {
        let event = AuditEvent::critical_section(self.member, phase);
        if let Err(err) = self.audit.record(event).await {
            warn!("[{}] Failed to audit critical section {:?}: {}", self.member, phase, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::transport::Token;

    const ME: MemberId = MemberId::new(5);

    #[tokio::test]
    async fn test_runs_once_per_arrival() {
        let audit = Arc::new(MemoryAuditLog::new());
        let gate = CriticalSectionGate::new(ME, audit.clone());
        let mut state = TokenState::new(ME, false);

        assert!(gate.request_critical_section(&mut state));
        state.arrive(Token::genesis(MemberId::new(4)));
        assert!(gate.on_token_arrival(&mut state).await.unwrap());
        assert!(!state.wants_critical_section());

        // nothing pending: a second arrival does not run again
        assert!(!gate.on_token_arrival(&mut state).await.unwrap());

        let phases: Vec<_> = audit
            .critical_sections()
            .await
            .into_iter()
            .map(|event| event.phase)
            .collect();
        assert_eq!(
            phases,
            vec![
                CriticalSectionPhase::Enter,
                CriticalSectionPhase::Perform,
                CriticalSectionPhase::Leave
            ]
        );
    }

    #[tokio::test]
    async fn test_does_not_run_without_token() {
        let audit = Arc::new(MemoryAuditLog::new());
        let gate = CriticalSectionGate::new(ME, audit.clone());
        let mut state = TokenState::new(ME, false);
        gate.request_critical_section(&mut state);

        assert!(!gate.on_token_arrival(&mut state).await.unwrap());
        assert!(state.wants_critical_section());
        assert!(audit.events().await.is_empty());
    }
}
