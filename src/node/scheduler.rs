//! Background loops driving a ring node
//!
//! Two periodic tasks share the node with the inbound HTTP handler:
//! 1. the request generator, asking for the critical section
//! 2. the forwarding loop, passing the token on whenever it is held
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::{ForwardOutcome, RingNode};
use crate::settings::RingSettings;

#[derive(Clone, Debug)]
pub struct RingScheduler {
    forward_interval: Duration,
    request_interval: Duration,
}

impl RingScheduler {
    pub fn new(settings: &RingSettings) -> Self {
        Self {
            forward_interval: settings.forward_interval(),
            request_interval: settings.request_interval(),
        }
    }

    /// Spawn both loops. They run until the returned handles are aborted.
    pub fn start(&self, node: RingNode) -> Vec<JoinHandle<()>> {
        info!(
            "[{}] Starting ring scheduler: forward every {}ms, request every {}ms",
            node.member_id(),
            self.forward_interval.as_millis(),
            self.request_interval.as_millis()
        );
        vec![
            self.spawn_request_loop(node.clone()),
            self.spawn_forward_loop(node),
        ]
    }

    fn spawn_request_loop(&self, node: RingNode) -> JoinHandle<()> {
        let request_interval = self.request_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(request_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if node.request_critical_section().await {
                    debug!("[{}] Wants the critical section", node.member_id());
                }
            }
        })
    }

    fn spawn_forward_loop(&self, node: RingNode) -> JoinHandle<()> {
        let forward_interval = self.forward_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(forward_interval);
            // a slow hand-off delays the next attempt instead of bursting
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match node.forward_once().await {
                    Ok(ForwardOutcome::Retained { to, failures, .. }) => {
                        debug!(
                            "[{}] Retrying hand-off next tick ({} failures against {})",
                            node.member_id(),
                            failures,
                            to
                        );
                    }
                    Ok(_) => {}
                    Err(err) if err.is_transient() => {
                        warn!(
                            "[{}] Forwarding attempt failed, retrying: {}",
                            node.member_id(),
                            err
                        );
                    }
                    Err(err) => {
                        error!("[{}] Forwarding attempt failed: {}", node.member_id(), err);
                    }
                }
            }
        })
    }
}
