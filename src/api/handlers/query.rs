use crate::{AppState, research::events::EventSender, types::QueryRequest};
use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use std::convert::Infallible;
use tokio::sync::mpsc;

/// Run a query and stream its progress events
///
/// The run executes on its own task. The response is a pure consumer of the
/// run's event channel, so a client disconnect only stops the stream; the run
/// still completes and its report is persisted.
#[utoipa::path(
    post,
    path = "/api/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Stream of progress events ending with final_report or a fatal error", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Malformed request body"),
        (status = 422, description = "Request body missing the query field")
    ),
    tag = "query"
)]
pub async fn query(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let coordinator = state.coordinator.clone();

    tokio::spawn(async move {
        match coordinator.run(&payload.query, EventSender::new(tx)).await {
            Ok(run) => tracing::info!(run_id = %run.run_id, phase = %run.phase, "run finished"),
            Err(e) => tracing::info!(error = %e, "run rejected"),
        }
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            match Event::default().json_data(&event) {
                Ok(sse) => yield Ok(sse),
                Err(e) => tracing::warn!(error = %e, "failed to encode progress event"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
