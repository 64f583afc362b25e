use crate::{AppState, types::AgentInfo};
use axum::{Json, extract::State};

/// List the configured agent roster and each agent's tools
#[utoipa::path(
    get,
    path = "/api/agents",
    responses((status = 200, description = "Configured agents", body = Vec<AgentInfo>)),
    tag = "agents"
)]
pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<AgentInfo>> {
    Json(state.coordinator.agents().agent_infos())
}
