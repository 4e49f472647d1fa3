use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::{Ack, Token, TokenSender};
use crate::error::Result;
use crate::node::RingNode;
use crate::registry::MemberId;
use crate::transport_error;

/// In-process transport: delivers the token straight to attached nodes.
///
/// Members can be marked unreachable to simulate a dead or partitioned peer.
#[derive(Debug, Default)]
pub struct LocalTransport {
    nodes: RwLock<HashMap<MemberId, RingNode>>,
    unreachable: RwLock<HashSet<MemberId>>,
    // (sender, target) of every attempted hand-off, in order
    attempts: Mutex<Vec<(MemberId, MemberId)>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attach(&self, node: RingNode) {
        self.nodes.write().await.insert(node.member_id(), node);
    }

    pub async fn set_reachable(&self, member: MemberId, reachable: bool) {
        let mut unreachable = self.unreachable.write().await;
        if reachable {
            unreachable.remove(&member);
        } else {
            unreachable.insert(member);
        }
    }

    pub async fn attempts(&self) -> Vec<(MemberId, MemberId)> {
        self.attempts.lock().await.clone()
    }
}

#[async_trait]
impl TokenSender for LocalTransport {
    async fn send_token(&self, target: MemberId, token: Token) -> Result<Ack> {
        self.attempts.lock().await.push((token.from, target));
        if self.unreachable.read().await.contains(&target) {
            return Err(transport_error!("member {} is unreachable", target));
        }
        let node = self.nodes.read().await.get(&target).cloned();
        match node {
            Some(node) => node.receive_token(token).await,
            None => Err(transport_error!("no member listening at {}", target)),
        }
    }
}
