mod base;
mod token;

use std::borrow::Cow;

use axum::{
    error_handling::HandleErrorLayer, http::StatusCode, response::IntoResponse, routing, Router,
};
use tokio::time::Duration;
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;

pub mod paths;

use crate::error::Result;
use crate::node::RingNode;
pub use token::CriticalSectionResponse;

/// Build the API serving one ring node
pub async fn api(node: RingNode) -> Result<Router> {
    let api = Router::new()
        .route(paths::base::ROOT, routing::get(base::root))
        .route(paths::base::HEALTH, routing::get(base::health))
        .route(paths::base::ABOUT, routing::get(base::about))
        // Token ring
        .route(paths::TOKEN, routing::post(token::receive_token))
        .route(paths::STATUS, routing::get(token::status))
        .route(
            paths::CRITICAL_SECTION,
            routing::post(token::request_critical_section),
        )
        .layer(
            ServiceBuilder::new()
                // Handle errors from middleware
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .timeout(Duration::from_secs(10)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(node);

    Ok(api)
}

async fn handle_error(error: BoxError) -> impl IntoResponse {
    if error.is::<tower::timeout::error::Elapsed>() {
        return (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out"));
    }

    if error.is::<tower::load_shed::error::Overloaded>() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Cow::from("service is overloaded, try again later"),
        );
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Cow::from(format!("Unhandled internal error: {}", error)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::extract::State;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::audit::MemoryAuditLog;
    use crate::registry::{InMemoryRegistry, Member, MemberId};
    use crate::settings::RingSettings;
    use crate::transport::LocalTransport;

    fn idle_node() -> RingNode {
        RingNode::new(
            Member {
                id: MemberId::new(50001),
                join_order: 1,
                founder: false,
            },
            Arc::new(InMemoryRegistry::new()),
            Arc::new(LocalTransport::new()),
            Arc::new(MemoryAuditLog::new()),
            &RingSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let app = api(idle_node()).await.unwrap();
        let resp = app
            .oneshot(Request::get(paths::base::HEALTH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_about_reports_member() {
        let about = base::about(State(idle_node())).await.0;
        assert_eq!(about.name, "tokenring");
        assert_eq!(about.member, MemberId::new(50001));
        assert_eq!(about.join_order, 1);
    }

    #[tokio::test]
    async fn test_post_token_makes_node_hold() {
        let node = idle_node();
        let app = api(node.clone()).await.unwrap();
        let resp = app
            .oneshot(
                Request::post(paths::TOKEN)
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"from":50000,"hops":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(node.holds_token().await);
    }

    #[tokio::test]
    async fn test_malformed_token_is_rejected() {
        let node = idle_node();
        let app = api(node.clone()).await.unwrap();
        let resp = app
            .oneshot(
                Request::post(paths::TOKEN)
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"hops":"many"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
        assert!(!node.holds_token().await);
    }

    #[tokio::test]
    async fn test_request_critical_section() {
        let node = idle_node();
        let app = api(node.clone()).await.unwrap();
        let resp = app
            .oneshot(
                Request::post(paths::CRITICAL_SECTION)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert!(node.wants_critical_section().await);
    }
}
