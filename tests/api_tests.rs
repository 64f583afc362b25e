mod common;

use axum_test::TestServer;
use common::mocks::*;
use healthscope::agents::{AgentKind, AgentRegistry};
use healthscope::research::events::EventKind;
use healthscope::research::{Coordinator, CoordinatorConfig};
use healthscope::{AppState, HealthscopeConfig, build_app};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

fn test_server() -> TestServer {
    let kinds = [AgentKind::Medlineplus, AgentKind::Openfda];
    let decider = kinds.iter().fold(ScriptedDecider::new(), |d, kind| {
        d.script(
            kind.id(),
            AgentScript::calls(&tool_name(*kind), 1, format!("{} findings", kind.id())),
        )
    });
    let registry = AgentRegistry::from_specs(kinds.iter().map(|k| static_spec(*k)).collect()).unwrap();
    let config = CoordinatorConfig {
        agent_timeout: Duration::from_secs(5),
        synthesis_backoff: Duration::from_millis(1),
        ..CoordinatorConfig::default()
    };
    let coordinator = Coordinator::new(
        config,
        Arc::new(ScriptedLLMClient::new()),
        Arc::new(decider),
        Arc::new(registry),
    );
    let state = AppState::new(Arc::new(HealthscopeConfig::default()), Arc::new(coordinator));
    TestServer::new(build_app(state)).unwrap()
}

#[tokio::test]
async fn test_query_streams_events_until_final_report() {
    let server = test_server();

    let response = server
        .post("/api/query")
        .json(&json!({"query": "metformin safety"}))
        .await;

    response.assert_status_ok();
    assert!(
        response
            .header("content-type")
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let events = parse_sse(&response.text());
    assert!(!events.is_empty());
    assert_eq!(events[0].kind, EventKind::PhaseUpdate);
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    let last = events.last().unwrap();
    assert_eq!(last.kind, EventKind::FinalReport);
    assert!(last.content.as_str().unwrap().contains("Health Data Report"));
    assert_eq!(events.iter().filter(|e| e.kind == EventKind::ToolCall).count(), 2);
}

#[tokio::test]
async fn test_chat_alias_streams_the_same_run() {
    let server = test_server();

    let response = server
        .post("/api/chat")
        .json(&json!({"query": "drug label for ibuprofen"}))
        .await;

    response.assert_status_ok();
    let events = parse_sse(&response.text());
    assert_eq!(events.last().unwrap().kind, EventKind::FinalReport);
}

#[tokio::test]
async fn test_empty_query_streams_single_fatal_error() {
    let server = test_server();

    let response = server.post("/api/query").json(&json!({"query": "  "})).await;

    response.assert_status_ok();
    let events = parse_sse(&response.text());
    assert_eq!(events.len(), 1);
    assert!(events[0].is_fatal_error());
    assert_eq!(events[0].error_code(), Some("invalid_input"));
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let server = test_server();

    server
        .post("/api/query")
        .content_type("application/json")
        .text("{not json")
        .expect_failure()
        .await;

    server
        .post("/api/query")
        .json(&json!({"question": "missing field"}))
        .expect_failure()
        .await;
}

#[tokio::test]
async fn test_health_endpoints() {
    let server = test_server();

    for path in ["/health", "/api/health"] {
        let response = server.get(path).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert!(body["version"].is_string());
    }
}

#[tokio::test]
async fn test_agents_lists_roster_in_order() {
    let server = test_server();

    let response = server.get("/api/agents").await;
    response.assert_status_ok();
    let agents: Vec<Value> = response.json();
    let ids: Vec<&str> = agents.iter().filter_map(|a| a["id"].as_str()).collect();
    assert_eq!(ids, vec!["medlineplus", "openfda"]);
    assert_eq!(agents[1]["tools"], json!(["openfda_lookup"]));
}

#[tokio::test]
async fn test_openapi_document_lists_query_route() {
    let server = test_server();

    let response = server.get("/api/openapi.json").await;
    response.assert_status_ok();
    let doc: Value = response.json();
    assert!(doc["paths"].get("/api/query").is_some());
    assert!(doc["paths"].get("/api/agents").is_some());
}
