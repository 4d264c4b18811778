use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use revolve_engine::TaskRunner;
use revolve_store::Store;
use tower_http::trace::TraceLayer;

use crate::auth::require_bearer_token;
use crate::handlers;
use crate::state::AppState;

/// Builds the HTTP surface: health, status, reconcile trigger, and
/// resource/transition/event introspection. Grounded on
/// `nclav-api::app::build_app`'s route table and bearer-auth layering.
pub fn build_app(store: Arc<dyn Store>, runner: Arc<TaskRunner>, auth_token: Arc<String>) -> Router {
    let state = AppState { store, runner, auth_token };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/status", get(handlers::status))
        .route("/reconcile", axum::routing::post(handlers::post_reconcile))
        .route("/resources", get(handlers::list_resources))
        .route("/resources/:id", get(handlers::get_resource))
        .route("/resources/:id/events", get(handlers::list_resource_events))
        .route("/transitions", get(handlers::list_transitions))
        .route("/transitions/:id", get(handlers::get_transition))
        .route("/transitions/:id/events", get(handlers::list_transition_events))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use revolve_adapter::AdapterRegistry;
    use revolve_domain::{DesiredState, ProjectId, Resource};
    use revolve_engine::CheckpointCache;
    use revolve_store::InMemoryStore;
    use serde_json::json;
    use tower::util::ServiceExt;

    const TEST_TOKEN: &str = "test-token";

    fn test_app(store: Arc<dyn Store>) -> Router {
        let runner = Arc::new(TaskRunner::new(store.clone(), AdapterRegistry::new(), CheckpointCache::default()));
        build_app(store, runner, Arc::new(TEST_TOKEN.to_string()))
    }

    fn authed(req: axum::http::request::Builder) -> axum::http::request::Builder {
        req.header("Authorization", format!("Bearer {TEST_TOKEN}"))
    }

    #[tokio::test]
    async fn unauthenticated_request_returns_401() {
        let app = test_app(Arc::new(InMemoryStore::new()));
        let resp = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_token_returns_401() {
        let app = test_app(Arc::new(InMemoryStore::new()));
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Authorization", "Bearer wrong-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_returns_200() {
        let app = test_app(Arc::new(InMemoryStore::new()));
        let resp = app.oneshot(authed(Request::builder().uri("/health")).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_returns_200_with_empty_store() {
        let app = test_app(Arc::new(InMemoryStore::new()));
        let resp = app.oneshot(authed(Request::builder().uri("/ready")).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn resources_empty_list() {
        let app = test_app(Arc::new(InMemoryStore::new()));
        let resp = app.oneshot(authed(Request::builder().uri("/resources")).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn resource_not_found_returns_404() {
        let app = test_app(Arc::new(InMemoryStore::new()));
        let resp = app
            .oneshot(authed(Request::builder().uri("/resources/nonexistent")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_returns_200_with_counts() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let mut resource = Resource::new(ProjectId::new("p"), "vpc_network", "net-a", json!({}));
        resource.desired_state = DesiredState::Healthy;
        store.upsert_resource(&resource).await.unwrap();

        let app = test_app(store);
        let resp = app.oneshot(authed(Request::builder().uri("/status")).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn transitions_empty_list() {
        let app = test_app(Arc::new(InMemoryStore::new()));
        let resp = app.oneshot(authed(Request::builder().uri("/transitions")).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn transition_invalid_id_returns_400() {
        let app = test_app(Arc::new(InMemoryStore::new()));
        let resp = app
            .oneshot(authed(Request::builder().uri("/transitions/not-a-uuid")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
