// Game wager backend
// HTTP API in front of the on-chain wager escrow contract

pub mod auth;
pub mod chain;
pub mod config;
pub mod error;
pub mod escrow;
pub mod indexer;
pub mod models;
pub mod wagers;

#[cfg(test)]
mod test_support;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::JwtVerifier;
use escrow::ContractBootstrap;
use indexer::WagerIndex;

/// Application state shared across handlers
pub struct AppState {
    pub bootstrap: Arc<ContractBootstrap>,
    /// Present when the event indexer is enabled
    pub index: Option<Arc<WagerIndex>>,
    pub jwt: JwtVerifier,
}

impl AppState {
    /// The event index, while it is fully caught up with the chain
    pub fn synced_index(&self) -> Option<&Arc<WagerIndex>> {
        self.index.as_ref().filter(|index| index.is_synced())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/wagers", post(wagers::handlers::create_wager))
        .route("/api/wagers/active", get(wagers::handlers::get_active_wagers))
        .route("/api/wagers/activity", get(wagers::handlers::get_activity))
        .route("/api/wagers/:wager_id", get(wagers::handlers::get_wager))
        .route("/api/wagers/:wager_id/accept", post(wagers::handlers::accept_wager))
        .route("/api/wagers/:wager_id/resolve", post(wagers::handlers::resolve_wager))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let contract = state.bootstrap.state();
    let indexer = match &state.index {
        None => "disabled",
        Some(index) if index.is_synced() => "synced",
        Some(_) => "syncing",
    };
    let status = if contract.label() == "ready" {
        "healthy"
    } else {
        "degraded"
    };

    let mut body = json!({
        "status": status,
        "contract": contract.label(),
        "indexer": indexer,
    });
    if let Some(reason) = contract.failure() {
        body["error"] = json!(reason);
    }
    Json(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::issue_token;
    use crate::test_support::{addr, DownConnector, FakeEscrow, FixedConnector};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    const SECRET: &str = "router-secret";

    fn app(fake: Option<Arc<FakeEscrow>>) -> Router {
        let bootstrap = match fake {
            Some(fake) => ContractBootstrap::new(Box::new(FixedConnector(fake))),
            None => ContractBootstrap::new(Box::new(DownConnector)),
        };
        router(Arc::new(AppState {
            bootstrap: Arc::new(bootstrap),
            index: None,
            jwt: JwtVerifier::new(SECRET),
        }))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_contract_state() {
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(None), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["contract"], "uninitialized");
        assert_eq!(body["indexer"], "disabled");
    }

    #[tokio::test]
    async fn test_health_reports_failure_reason() {
        let app = app(None);
        let token = issue_token(SECRET, "u1", None);
        let request = Request::get("/api/wagers/activity")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (_, body) = send(app, request).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["contract"], "failed");
        assert_eq!(body["error"], "contract unavailable: connection refused");
    }

    #[tokio::test]
    async fn test_requests_without_token_are_rejected() {
        let request = Request::get("/api/wagers/active").body(Body::empty()).unwrap();
        let (status, body) = send(app(None), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "No token, authorization denied");
    }

    #[tokio::test]
    async fn test_unavailable_contract_over_http() {
        let token = issue_token(SECRET, "u1", Some(&addr(1).to_rpc()));
        let request = Request::get("/api/wagers/active")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(None), request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body["message"],
            "Wager service not available - contract initialization failed"
        );
    }

    #[tokio::test]
    async fn test_create_over_http() {
        let fake = Arc::new(FakeEscrow::new());
        let token = issue_token(SECRET, "u1", Some(&addr(1).to_rpc()));
        let payload = json!({ "opponent": addr(2).to_rpc(), "amount": 0.1, "gameHash": "m1" });
        let request = Request::post("/api/wagers")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let (status, body) = send(app(Some(fake)), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["wagerId"], 0);
        assert!(body["transactionHash"].as_str().unwrap().starts_with("0x"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let token = issue_token(SECRET, "u1", Some(&addr(1).to_rpc()));
        let request = Request::post("/api/wagers")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(app(None), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().starts_with("Invalid request body"));
    }
}
