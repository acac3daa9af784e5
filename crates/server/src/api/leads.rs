//! Lead outreach endpoints driving the shared [`LeadSequencer`].

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use opsdesk_core::domain::lead::{Lead, LeadId, LeadList};
use opsdesk_core::errors::ApplicationError;
use opsdesk_core::outreach::{
    LeadSequencer, PotentialLead, ReplyOutcome, SequencerStatus, SkipOutcome, StartOutcome,
};
use opsdesk_db::DemoSeedDataset;

use crate::api::{persistence, reject, Ack, ApiResult};
use crate::report;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_leads))
        .route("/context", post(set_context))
        .route("/load", post(load_leads))
        .route("/load-demo", post(load_demo))
        .route("/start", post(start_next))
        .route("/skip", post(skip))
        .route("/status", get(status))
        .route("/potential", get(potential))
        .route("/report", post(write_report))
        .route("/{lead_id}/message", post(respond))
}

#[derive(Debug, Deserialize)]
pub struct ContextRequest {
    pub context: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LoadResponse {
    pub success: bool,
    pub leads_loaded: usize,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    #[serde(flatten)]
    pub outcome: ReplyOutcome,
    pub report_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SkipResponse {
    #[serde(flatten)]
    pub outcome: SkipOutcome,
    pub report_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub success: bool,
    pub report_path: String,
    pub potential_leads: usize,
}

async fn set_context(
    State(state): State<AppState>,
    Json(request): Json<ContextRequest>,
) -> ApiResult<Ack> {
    state.sequencer.lock().await.set_context(&request.context).map_err(reject)?;
    info!(event_name = "outreach.context.set", "sales context updated");
    Ok(Ack::ok("Sales context saved"))
}

async fn load_leads(
    State(state): State<AppState>,
    Json(list): Json<LeadList>,
) -> ApiResult<LoadResponse> {
    load_into_sequencer(&state, list).await
}

async fn load_demo(State(state): State<AppState>) -> ApiResult<LoadResponse> {
    let list = DemoSeedDataset::demo_leads().map_err(persistence)?;
    load_into_sequencer(&state, list).await
}

async fn load_into_sequencer(state: &AppState, list: LeadList) -> ApiResult<LoadResponse> {
    let mut sequencer = state.sequencer.lock().await;
    let leads_loaded = sequencer.load(list).map_err(reject)?;
    if let Err(error) = state.leads.replace_all(sequencer.leads()).await {
        warn!(
            event_name = "outreach.leads.persist_failed",
            leads_loaded,
            error = %error,
            "could not persist loaded leads"
        );
    }

    info!(event_name = "outreach.leads.loaded", leads_loaded, "lead list loaded");
    Ok(Json(LoadResponse { success: true, leads_loaded }))
}

async fn start_next(State(state): State<AppState>) -> ApiResult<StartOutcome> {
    let mut sequencer = state.sequencer.lock().await;
    let outcome = sequencer.start_next().map_err(reject)?;
    if let StartOutcome::Started { lead, resumed: false, .. } = &outcome {
        mirror_lead(&state, lead).await;
    }
    Ok(Json(outcome))
}

async fn respond(
    State(state): State<AppState>,
    Path(lead_id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> ApiResult<ReplyResponse> {
    let lead_id = LeadId(lead_id);
    let mut sequencer = state.sequencer.lock().await;
    let outcome = sequencer
        .respond(&lead_id, &request.message, state.qualifier.as_ref())
        .await
        .map_err(reject)?;

    if let Some(lead) = sequencer.lead(&lead_id).cloned() {
        mirror_lead(&state, &lead).await;
    }

    let report_path = if outcome.all_done { finish_run(&state, &sequencer).await } else { None };
    Ok(Json(ReplyResponse { outcome, report_path }))
}

async fn skip(State(state): State<AppState>) -> ApiResult<SkipResponse> {
    let mut sequencer = state.sequencer.lock().await;
    let outcome = sequencer.skip().map_err(reject)?;

    let Some(skipped) = outcome.skipped.clone() else {
        return Ok(Json(SkipResponse { outcome, report_path: None }));
    };
    if let Some(lead) = sequencer.lead(&skipped).cloned() {
        mirror_lead(&state, &lead).await;
    }

    let report_path = if outcome.has_next { None } else { finish_run(&state, &sequencer).await };
    Ok(Json(SkipResponse { outcome, report_path }))
}

async fn status(State(state): State<AppState>) -> Json<SequencerStatus> {
    Json(state.sequencer.lock().await.status())
}

async fn list_leads(State(state): State<AppState>) -> Json<Vec<Lead>> {
    Json(state.sequencer.lock().await.leads().to_vec())
}

async fn potential(State(state): State<AppState>) -> Json<Vec<PotentialLead>> {
    Json(state.sequencer.lock().await.potential_leads().to_vec())
}

async fn write_report(State(state): State<AppState>) -> ApiResult<ReportResponse> {
    let potential = state.sequencer.lock().await.potential_leads().to_vec();
    let path = report::write_report(&state.config.outreach.report_dir, &potential, Utc::now())
        .await
        .map_err(|error| reject(ApplicationError::Persistence(error.to_string())))?;

    Ok(Json(ReportResponse {
        success: true,
        report_path: path.display().to_string(),
        potential_leads: potential.len(),
    }))
}

/// The lead table mirrors the sequencer; a failed write is logged and the run goes on.
async fn mirror_lead(state: &AppState, lead: &Lead) {
    if let Err(error) = state.leads.save(lead).await {
        warn!(
            event_name = "outreach.lead.persist_failed",
            lead_id = %lead.id,
            error = %error,
            "could not persist lead status"
        );
    }
}

async fn finish_run(state: &AppState, sequencer: &LeadSequencer) -> Option<String> {
    let potential = sequencer.potential_leads();
    match report::write_report(&state.config.outreach.report_dir, potential, Utc::now()).await {
        Ok(path) => {
            info!(
                event_name = "outreach.run.finished",
                qualified = potential.len(),
                report = %path.display(),
                "outreach run finished"
            );
            Some(path.display().to_string())
        }
        Err(error) => {
            warn!(event_name = "outreach.report.write_failed", error = %error, "could not write lead report");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;

    use async_trait::async_trait;
    use opsdesk_agent::ScriptedLlm;
    use opsdesk_core::domain::lead::Lead;
    use opsdesk_db::repositories::{LeadRepository, RepositoryError};

    use crate::api::test_support::{seeded_state, send};
    use crate::state::AppState;

    struct UnavailableLeadStore;

    #[async_trait]
    impl LeadRepository for UnavailableLeadStore {
        async fn replace_all(&self, _leads: &[Lead]) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("lead table is locked".to_string()))
        }

        async fn save(&self, _lead: &Lead) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("lead table is locked".to_string()))
        }

        async fn list(&self) -> Result<Vec<Lead>, RepositoryError> {
            Err(RepositoryError::Decode("lead table is locked".to_string()))
        }
    }

    fn leads_app(state: AppState) -> axum::Router {
        axum::Router::new().nest("/leads", super::router()).with_state(state)
    }

    async fn app() -> axum::Router {
        leads_app(seeded_state(Arc::new(ScriptedLlm::default())).await)
    }

    #[tokio::test]
    async fn reload_succeeds_when_lead_store_is_unavailable() {
        let mut state = seeded_state(Arc::new(ScriptedLlm::default())).await;
        let app = leads_app(state.clone());
        send(&app, "POST", "/leads/context", Some(json!({ "context": "Inventory software" }))).await;
        send(&app, "POST", "/leads/load-demo", None).await;
        let (_, started) = send(&app, "POST", "/leads/start", None).await;
        assert_eq!(started["lead"]["id"], "LEAD_001");

        state.leads = Arc::new(UnavailableLeadStore);
        let app = leads_app(state);

        let (status, body) = send(&app, "POST", "/leads/load-demo", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["leads_loaded"], 5);

        let (_, run) = send(&app, "GET", "/leads/status", None).await;
        assert_eq!(run["current_index"], 0);
        assert!(run["active_lead"].is_null());

        let (status, restarted) = send(&app, "POST", "/leads/start", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(restarted["lead"]["id"], "LEAD_001");
    }

    #[tokio::test]
    async fn start_requires_context() {
        let app = app().await;
        send(&app, "POST", "/leads/load-demo", None).await;

        let (status, body) = send(&app, "POST", "/leads/start", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "sales context has not been set");
    }

    #[tokio::test]
    async fn stop_declines_and_moves_to_next_lead() {
        let app = app().await;
        send(&app, "POST", "/leads/context", Some(json!({ "context": "Inventory software" }))).await;
        let (status, body) = send(&app, "POST", "/leads/load-demo", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["leads_loaded"], 5);

        let (_, started) = send(&app, "POST", "/leads/start", None).await;
        assert_eq!(started["state"], "started");
        assert_eq!(started["lead"]["id"], "LEAD_001");

        let (status, reply) =
            send(&app, "POST", "/leads/LEAD_001/message", Some(json!({ "message": "STOP" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["stopped"], true);
        assert_eq!(reply["status"], "declined");
        assert_eq!(reply["has_next"], true);

        let (_, next) = send(&app, "POST", "/leads/start", None).await;
        assert_eq!(next["lead"]["id"], "LEAD_002");
    }

    #[tokio::test]
    async fn interested_reply_marks_lead_potential() {
        let app = app().await;
        send(&app, "POST", "/leads/context", Some(json!({ "context": "Inventory software" }))).await;
        send(&app, "POST", "/leads/load-demo", None).await;
        send(&app, "POST", "/leads/start", None).await;

        let (_, gate) =
            send(&app, "POST", "/leads/LEAD_001/message", Some(json!({ "message": "continue" }))).await;
        assert_eq!(gate["status"], "engaged");

        let (_, reply) = send(
            &app,
            "POST",
            "/leads/LEAD_001/message",
            Some(json!({ "message": "We are interested, send pricing" })),
        )
        .await;
        assert_eq!(reply["is_potential"], true);

        let (_, potential) = send(&app, "GET", "/leads/potential", None).await;
        assert_eq!(potential[0]["summary"], "We are interested, send pricing");
    }

    #[tokio::test]
    async fn message_to_inactive_lead_conflicts() {
        let app = app().await;
        send(&app, "POST", "/leads/context", Some(json!({ "context": "Inventory software" }))).await;
        send(&app, "POST", "/leads/load-demo", None).await;
        send(&app, "POST", "/leads/start", None).await;

        let (status, _) =
            send(&app, "POST", "/leads/LEAD_004/message", Some(json!({ "message": "hi" }))).await;

        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn skipping_every_lead_finishes_with_report() {
        let app = app().await;
        send(&app, "POST", "/leads/context", Some(json!({ "context": "Inventory software" }))).await;
        send(&app, "POST", "/leads/load-demo", None).await;

        let mut last = serde_json::Value::Null;
        for _ in 0..5 {
            last = send(&app, "POST", "/leads/skip", None).await.1;
        }

        assert_eq!(last["has_next"], false);
        assert!(last["report_path"].as_str().is_some_and(|path| path.ends_with(".txt")));
        let (_, status) = send(&app, "GET", "/leads/status", None).await;
        assert_eq!(status["finished"], true);
    }
}
