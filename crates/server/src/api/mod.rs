//! JSON API mounted under `/api`.
//!
//! Every handler returns [`ApiResult`]; failures carry a correlation id that is
//! also written to the log so a user report can be matched to a log line.

use axum::http::StatusCode;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use opsdesk_core::domain::activity::AgentActivity;
use opsdesk_core::errors::{ApplicationError, DomainError, InterfaceError};
use opsdesk_db::repositories::RepositoryError;

use crate::state::AppState;

pub mod analytics;
pub mod chat;
pub mod inventory;
pub mod leads;
pub mod orders;
pub mod staff;
pub mod suppliers;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

pub type ApiRejection = (StatusCode, Json<ApiError>);
pub type ApiResult<T> = Result<Json<T>, ApiRejection>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self { success: true, message: message.into() })
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/leads", leads::router())
        .nest("/chat", chat::router())
        .nest("/orders", orders::router())
        .nest("/inventory", inventory::router())
        .nest("/suppliers", suppliers::router())
        .nest("/staff", staff::router())
        .nest("/analytics", analytics::router())
}

pub fn correlation_id() -> String {
    format!("req_{}", &Uuid::new_v4().simple().to_string()[..12])
}

pub fn status_for(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Client errors echo the domain message; server-side failures only show the safe
/// user message and keep the detail in the log.
pub fn reject(error: impl Into<ApplicationError>) -> ApiRejection {
    let interface = error.into().into_interface(correlation_id());
    let status = status_for(&interface);

    let message = if status.is_server_error() {
        error!(
            event_name = "api.request_failed",
            correlation_id = %interface.correlation_id(),
            status = status.as_u16(),
            detail = %interface.message(),
            "request failed"
        );
        interface.user_message().to_string()
    } else {
        warn!(
            event_name = "api.request_rejected",
            correlation_id = %interface.correlation_id(),
            status = status.as_u16(),
            detail = %interface.message(),
            "request rejected"
        );
        interface.message().to_string()
    };

    (status, Json(ApiError { error: message, correlation_id: interface.correlation_id().to_string() }))
}

pub fn persistence(error: RepositoryError) -> ApiRejection {
    match error {
        RepositoryError::Conflict(message) => reject(DomainError::InvariantViolation(message)),
        other => reject(ApplicationError::Persistence(other.to_string())),
    }
}

pub fn not_found(kind: &'static str, id: impl Into<String>) -> ApiRejection {
    reject(DomainError::NotFound { kind, id: id.into() })
}

pub fn bad_request(message: impl Into<String>) -> ApiRejection {
    reject(DomainError::InvariantViolation(message.into()))
}

/// Activity entries are an audit trail; a failed write never fails the request.
pub async fn record_activity(state: &AppState, activity: AgentActivity) {
    if let Err(error) = state.activities.record(&activity).await {
        warn!(
            event_name = "activity.record_failed",
            agent = %activity.agent_name,
            action = %activity.action,
            error = %error,
            "failed to record agent activity"
        );
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use opsdesk_agent::{LlmClient, ScriptedLlm};
    use opsdesk_core::config::{AppConfig, LlmProvider};
    use opsdesk_core::outreach::KeywordQualifier;
    use opsdesk_db::{connect_with_settings, migrations, DemoSeedDataset};

    use crate::state::AppState;

    pub async fn seeded_state(llm: Arc<ScriptedLlm>) -> AppState {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoSeedDataset::load(&pool).await.expect("seed");

        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Offline;
        config.whatsapp.enabled = true;
        config.outreach.report_dir = std::env::temp_dir().join("opsdesk-test-reports");

        let llm: Arc<dyn LlmClient> = llm;
        AppState::new(config, &pool, llm, Arc::new(KeywordQualifier::default()))
    }

    pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }
}
