//! HTTP API handlers

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::server::AppState;
use crate::assistant::AssistantEvent;
use crate::stations::Station;
use crate::status::StatusSnapshot;

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Get appliance status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatusSnapshot>> {
    Json(ApiResponse::ok(state.status.snapshot()))
}

/// Get stations in playlist order
pub async fn get_stations(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<Station>>> {
    Json(ApiResponse::ok(state.status.snapshot().stations))
}

/// Deliver an assistant lifecycle event
pub async fn post_assistant_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<AssistantEvent>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    let Some(events) = state.assistant_tx.as_ref() else {
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse::error("assistant integration is disabled")),
        );
    };

    match events.send(event) {
        Ok(()) => (StatusCode::ACCEPTED, Json(ApiResponse::ok(()))),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error("assistant dispatcher is not running")),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusBoard;
    use crossbeam_channel::unbounded;

    fn app_state(assistant: bool) -> (Arc<AppState>, Option<crossbeam_channel::Receiver<AssistantEvent>>) {
        let (tx, rx) = unbounded();
        let state = AppState {
            status: StatusBoard::new(),
            assistant_tx: assistant.then_some(tx),
        };
        (Arc::new(state), assistant.then_some(rx))
    }

    #[tokio::test]
    async fn test_assistant_event_forwarded() {
        let (state, rx) = app_state(true);
        let (code, _) = post_assistant_event(State(state), Json(AssistantEvent::TurnTimeout)).await;

        assert_eq!(code, StatusCode::ACCEPTED);
        assert_eq!(rx.unwrap().try_recv().unwrap(), AssistantEvent::TurnTimeout);
    }

    #[tokio::test]
    async fn test_assistant_event_rejected_when_disabled() {
        let (state, _) = app_state(false);
        let (code, Json(body)) =
            post_assistant_event(State(state), Json(AssistantEvent::TurnStarted)).await;

        assert_eq!(code, StatusCode::CONFLICT);
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_status_reports_selection() {
        let (state, _) = app_state(false);
        state.status.update(|s| s.supervisor_state = "running".into());

        let Json(body) = get_status(State(state)).await;
        assert!(body.success);
        assert_eq!(body.data.unwrap().supervisor_state, "running");
    }
}
