use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::node::RingNode;
use crate::registry::MemberId;
use crate::settings::{APP_NAME, APP_VERSION};

pub async fn root(State(node): State<RingNode>) -> String {
    format!("Welcome to tokenring, member {}", node.member_id())
}

pub async fn health() -> &'static str {
    "OK"
}

/// Service identity plus where this member sits in the ring
#[derive(Debug, Serialize, Deserialize)]
pub struct AboutResponse {
    pub name: String,
    pub version: String,
    pub member: MemberId,
    pub join_order: usize,
}

#[instrument(skip(node))]
pub async fn about(State(node): State<RingNode>) -> Json<AboutResponse> {
    let member = node.member();
    Json(AboutResponse {
        name: APP_NAME.to_string(),
        version: APP_VERSION.to_string(),
        member: member.id,
        join_order: member.join_order,
    })
}
