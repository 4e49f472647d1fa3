//! End-to-end ring behavior on in-process rings
use std::sync::Arc;

use tokenring::audit::{CriticalSectionPhase, MemoryAuditLog};
use tokenring::node::{ForwardOutcome, RingNode, TokenPhase};
use tokenring::registry::{InMemoryRegistry, MemberId, MembershipRegistry};
use tokenring::settings::RingSettings;
use tokenring::transport::LocalTransport;

const BASE: MemberId = MemberId::new(50000);

struct Ring {
    nodes: Vec<RingNode>,
    transport: Arc<LocalTransport>,
    audit: Arc<MemoryAuditLog>,
    registry: Arc<InMemoryRegistry>,
}

impl Ring {
    async fn new(size: usize, settings: RingSettings) -> Self {
        let registry = Arc::new(InMemoryRegistry::new());
        let transport = Arc::new(LocalTransport::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let mut nodes = Vec::new();
        for _ in 0..size {
            let node = RingNode::join(
                None,
                BASE,
                registry.clone(),
                transport.clone(),
                audit.clone(),
                &settings,
            )
            .await
            .unwrap();
            transport.attach(node.clone()).await;
            nodes.push(node);
        }
        Self {
            nodes,
            transport,
            audit,
            registry,
        }
    }

    fn id(&self, index: usize) -> MemberId {
        self.nodes[index].member_id()
    }

    async fn holders(&self) -> Vec<MemberId> {
        let mut holders = Vec::new();
        for node in &self.nodes {
            if node.holds_token().await {
                holders.push(node.member_id());
            }
        }
        holders
    }

    /// Let whoever holds the token forward it once
    async fn step(&self) -> ForwardOutcome {
        for node in &self.nodes {
            if node.holds_token().await {
                return node.forward_once().await.unwrap();
            }
        }
        panic!("nobody holds the token");
    }
}

#[tokio::test]
async fn test_successor_order_follows_registration() {
    let ring = Ring::new(3, RingSettings::default()).await;
    assert_eq!(
        ring.registry.snapshot().await.unwrap(),
        vec![BASE, MemberId::new(50001), MemberId::new(50002)]
    );
    assert!(ring.nodes[0].member().starts_with_token());
    assert!(!ring.nodes[1].member().starts_with_token());
    assert_eq!(ring.holders().await, vec![BASE]);
}

#[tokio::test]
async fn test_token_visits_every_member_in_order() {
    let ring = Ring::new(3, RingSettings::default()).await;

    for _ in 0..3 {
        assert!(matches!(ring.step().await, ForwardOutcome::Forwarded { .. }));
        assert_eq!(ring.holders().await.len(), 1);
    }

    let hops: Vec<_> = ring
        .audit
        .transfers()
        .await
        .into_iter()
        .map(|transfer| (transfer.from, transfer.to, transfer.hops))
        .collect();
    assert_eq!(
        hops,
        vec![
            (ring.id(0), ring.id(1), 1),
            (ring.id(1), ring.id(2), 2),
            (ring.id(2), ring.id(0), 3),
        ]
    );
    assert_eq!(ring.holders().await, vec![ring.id(0)]);
}

#[tokio::test]
async fn test_single_member_never_calls_out() {
    let ring = Ring::new(1, RingSettings::default()).await;
    for _ in 0..5 {
        assert_eq!(ring.nodes[0].forward_once().await.unwrap(), ForwardOutcome::Alone);
    }
    assert!(ring.transport.attempts().await.is_empty());
    assert!(ring.nodes[0].holds_token().await);
}

#[tokio::test]
async fn test_requested_section_runs_once_on_arrival() {
    let ring = Ring::new(3, RingSettings::default()).await;
    let requester = &ring.nodes[1];
    assert!(requester.request_critical_section().await);
    assert!(ring.audit.critical_sections().await.is_empty());

    ring.step().await;

    let events = ring.audit.critical_sections().await;
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| event.member == requester.member_id()));
    assert_eq!(
        events.iter().map(|event| event.phase).collect::<Vec<_>>(),
        vec![
            CriticalSectionPhase::Enter,
            CriticalSectionPhase::Perform,
            CriticalSectionPhase::Leave
        ]
    );
    assert!(!requester.wants_critical_section().await);

    // a full round without a new request runs nothing more
    for _ in 0..3 {
        ring.step().await;
    }
    assert_eq!(ring.audit.critical_sections().await.len(), 3);
}

#[tokio::test]
async fn test_request_while_holding_waits_for_next_visit() {
    let ring = Ring::new(2, RingSettings::default()).await;
    let holder = &ring.nodes[0];
    holder.request_critical_section().await;

    ring.step().await;
    assert!(ring.audit.critical_sections().await.is_empty());
    assert!(holder.wants_critical_section().await);

    ring.step().await;
    assert_eq!(ring.audit.critical_sections().await.len(), 3);
    assert!(!holder.wants_critical_section().await);
}

#[tokio::test]
async fn test_every_requester_served_within_ring_size_hops() {
    let size = 5;
    for requester in 0..size {
        let ring = Ring::new(size, RingSettings::default()).await;
        ring.nodes[requester].request_critical_section().await;

        let mut hops = 0;
        while ring.audit.critical_sections().await.is_empty() {
            ring.step().await;
            hops += 1;
            assert!(hops <= size, "member {} starved", requester);
        }
    }
}

#[tokio::test]
async fn test_failed_hand_off_keeps_token() {
    let ring = Ring::new(3, RingSettings::default()).await;
    ring.transport.set_reachable(ring.id(1), false).await;

    let outcome = ring.nodes[0].forward_once().await.unwrap();
    assert!(matches!(
        outcome,
        ForwardOutcome::Retained { to, failures: 1, .. } if to == ring.id(1)
    ));
    assert_eq!(ring.nodes[0].phase().await, TokenPhase::Holding);
    assert_eq!(ring.holders().await, vec![ring.id(0)]);
}

#[tokio::test]
async fn test_unreachable_successor_is_skipped() {
    let settings = RingSettings {
        max_send_failures: 2,
        ..RingSettings::default()
    };
    let ring = Ring::new(3, settings).await;
    let (p1, p2, p3) = (ring.id(0), ring.id(1), ring.id(2));
    ring.transport.set_reachable(p2, false).await;

    for _ in 0..2 {
        assert!(matches!(
            ring.nodes[0].forward_once().await.unwrap(),
            ForwardOutcome::Retained { .. }
        ));
        assert!(ring.nodes[0].holds_token().await);
    }

    assert_eq!(
        ring.nodes[0].forward_once().await.unwrap(),
        ForwardOutcome::Forwarded { to: p3, hops: 1 }
    );
    assert_eq!(ring.holders().await, vec![p3]);
    assert_eq!(
        ring.transport.attempts().await,
        vec![(p1, p2), (p1, p2), (p1, p3)]
    );
}

#[tokio::test]
async fn test_late_joiner_becomes_reachable() {
    let ring = Ring::new(1, RingSettings::default()).await;
    assert_eq!(ring.step().await, ForwardOutcome::Alone);

    let joiner = RingNode::join(
        None,
        BASE,
        ring.registry.clone(),
        ring.transport.clone(),
        ring.audit.clone(),
        &RingSettings::default(),
    )
    .await
    .unwrap();
    ring.transport.attach(joiner.clone()).await;
    assert!(!joiner.holds_token().await);

    assert_eq!(
        ring.nodes[0].forward_once().await.unwrap(),
        ForwardOutcome::Forwarded {
            to: joiner.member_id(),
            hops: 1
        }
    );
    assert!(joiner.holds_token().await);
}

#[tokio::test]
async fn test_restarted_first_member_rejoins_without_token() {
    let ring = Ring::new(2, RingSettings::default()).await;
    let (p1, p2) = (ring.id(0), ring.id(1));
    assert_eq!(
        ring.step().await,
        ForwardOutcome::Forwarded { to: p2, hops: 1 }
    );

    // p1 comes back with its fixed id while p2 holds the token
    let restarted = RingNode::join(
        Some(p1),
        BASE,
        ring.registry.clone(),
        ring.transport.clone(),
        ring.audit.clone(),
        &RingSettings::default(),
    )
    .await
    .unwrap();
    ring.transport.attach(restarted.clone()).await;

    assert_eq!(restarted.member().join_order, 0);
    assert!(!restarted.holds_token().await);
    assert_eq!(ring.registry.snapshot().await.unwrap(), vec![p1, p2]);

    // the token still makes its way back to the restarted member
    assert_eq!(
        ring.nodes[1].forward_once().await.unwrap(),
        ForwardOutcome::Forwarded { to: p1, hops: 2 }
    );
    assert!(restarted.holds_token().await);
    assert!(!ring.nodes[1].holds_token().await);
}
