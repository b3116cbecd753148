use crate::AppState;
use crate::api::handlers::{health, traces};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Routes mounted under `/api/v1`
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/trace", post(traces::create_trace))
        .route("/trace/batch", post(traces::create_batch))
        .route(
            "/trace/{trace_id}",
            get(traces::get_trace).delete(traces::delete_trace),
        )
        .route("/trace/{trace_id}/execute", post(traces::execute_trace))
        .route("/trace/{trace_id}/summary", get(traces::get_summary))
        .route("/trace/{trace_id}/stages", get(traces::get_stages))
        .route("/traces", get(traces::list_traces))
        .route("/traces/stats", get(traces::trace_stats))
}

/// Full application router with health check, tracing and CORS layers
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", create_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
