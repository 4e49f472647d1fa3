use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::Result;
use crate::node::{RingNode, StatusResponse};
use crate::registry::MemberId;
use crate::transport::{Ack, Token};

/// Inbound `receive_token` RPC
#[instrument(skip(node), level = "debug")]
pub async fn receive_token(
    State(node): State<RingNode>,
    Json(token): Json<Token>,
) -> Result<Json<Ack>> {
    node.receive_token(token).await.map(Json)
}

#[instrument(skip(node), level = "debug")]
pub async fn status(State(node): State<RingNode>) -> Json<StatusResponse> {
    Json(node.status().await)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CriticalSectionResponse {
    pub member: MemberId,
    pub newly_requested: bool,
}

/// Ask for the critical section; it runs on the next token arrival
#[instrument(skip(node), level = "debug")]
pub async fn request_critical_section(
    State(node): State<RingNode>,
) -> (StatusCode, Json<CriticalSectionResponse>) {
    let newly_requested = node.request_critical_section().await;
    (
        StatusCode::ACCEPTED,
        Json(CriticalSectionResponse {
            member: node.member_id(),
            newly_requested,
        }),
    )
}
