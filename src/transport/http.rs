use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Ack, Token, TokenSender};
use crate::api::paths;
use crate::error::Result;
use crate::registry::MemberId;
use crate::transport_error;

/// Sends the token over HTTP to `http://{peer_host}:{member_id}/token`.
#[derive(Clone, Debug)]
pub struct HttpTokenSender {
    client: reqwest::Client,
    peer_host: String,
}

impl HttpTokenSender {
    /// `timeout` bounds every hand-off, connect included
    pub fn new(peer_host: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            peer_host: peer_host.into(),
        })
    }

    pub fn endpoint(&self, target: MemberId) -> String {
        format!("http://{}:{}{}", self.peer_host, target, paths::TOKEN)
    }
}

#[async_trait]
impl TokenSender for HttpTokenSender {
    async fn send_token(&self, target: MemberId, token: Token) -> Result<Ack> {
        let url = self.endpoint(target);
        debug!("[{}] Sending token (hop {}) to {}", token.from, token.hops, url);
        let resp = self.client.post(url).json(&token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(transport_error!("member {} answered {}", target, status));
        }
        let ack: Ack = resp.json().await?;
        if !ack.accepted {
            return Err(transport_error!("member {} refused the token", target));
        }
        Ok(ack)
    }
}
