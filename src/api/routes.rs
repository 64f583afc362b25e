use crate::AppState;
use crate::api::handlers::{agents, health, query};
use crate::types::{AgentInfo, HealthResponse, QueryRequest};
use axum::{
    Json, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "healthscope",
        description = "Multi-agent health data research server"
    ),
    paths(query::query, health::health_check, agents::list_agents),
    components(schemas(QueryRequest, HealthResponse, AgentInfo)),
    tags(
        (name = "query", description = "Streaming query execution"),
        (name = "agents", description = "Agent roster"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

/// Routes mounted under `/api`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/query", post(query::query))
        // Original endpoint name, kept for existing frontends.
        .route("/chat", post(query::query))
        .route("/agents", get(agents::list_agents))
        .route("/health", get(health::health_check))
        .route("/openapi.json", get(openapi))
}

/// Full application: `/api` routes, root health check, CORS and request tracing.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", create_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
