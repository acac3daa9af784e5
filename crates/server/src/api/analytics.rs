use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use opsdesk_core::domain::activity::AgentActivity;
use opsdesk_core::domain::bottleneck::Bottleneck;
use opsdesk_core::ops::{
    format_findings, unrecorded_findings, BottleneckDetector, DashboardStats, OperationsSnapshot,
};
use opsdesk_db::repositories::ProductFilter;

use crate::api::{not_found, persistence, record_activity, ApiRejection, ApiResult};
use crate::state::AppState;

const BOTTLENECK_LIST_LIMIT: u32 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/overview", get(overview))
        .route("/bottlenecks", get(active_bottlenecks))
        .route("/bottlenecks/analyze", post(analyze))
        .route("/bottlenecks/stats", get(bottleneck_stats))
        .route("/bottlenecks/{bottleneck_id}/resolve", put(resolve))
        .route("/activities", get(activities))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default = "default_activity_limit")]
    pub limit: u32,
}

fn default_activity_limit() -> u32 {
    50
}

#[derive(Debug, Serialize)]
pub struct Analysis {
    pub summary: String,
    pub detected: usize,
    pub recorded: Vec<Bottleneck>,
    pub active: Vec<Bottleneck>,
}

#[derive(Debug, Serialize)]
pub struct BottleneckStats {
    pub total: usize,
    pub active: usize,
    pub resolved: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
}

/// Reads everything the dashboard numbers and the detector work from.
pub(crate) async fn snapshot(state: &AppState) -> Result<OperationsSnapshot, ApiRejection> {
    Ok(OperationsSnapshot {
        orders: state.orders.list_all().await.map_err(persistence)?,
        products: state.products.list(&ProductFilter::default()).await.map_err(persistence)?,
        staff: state.staff.list().await.map_err(persistence)?,
        supplier_queries: state.supplier_queries.list_pending().await.map_err(persistence)?,
        taken_at: Utc::now(),
    })
}

pub(crate) async fn dashboard_stats(state: &AppState) -> Result<DashboardStats, ApiRejection> {
    let snapshot = snapshot(state).await?;
    let active =
        state.bottlenecks.list(true, BOTTLENECK_LIST_LIMIT).await.map_err(persistence)?.len();
    Ok(snapshot.dashboard(active))
}

async fn overview(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    Ok(Json(dashboard_stats(&state).await?))
}

async fn active_bottlenecks(State(state): State<AppState>) -> ApiResult<Vec<Bottleneck>> {
    Ok(Json(state.bottlenecks.list(true, BOTTLENECK_LIST_LIMIT).await.map_err(persistence)?))
}

/// Runs the detector and records findings of a type that has no open bottleneck yet.
async fn analyze(State(state): State<AppState>) -> ApiResult<Analysis> {
    let snapshot = snapshot(&state).await?;
    let findings = BottleneckDetector::default().analyze(&snapshot);
    let detected = findings.len();
    let summary = format_findings(&findings);

    let open = state.bottlenecks.list(true, BOTTLENECK_LIST_LIMIT).await.map_err(persistence)?;
    let now = Utc::now();
    let mut recorded = Vec::new();
    for finding in unrecorded_findings(findings, &open) {
        let bottleneck = finding.into_bottleneck(Uuid::new_v4().to_string(), now);
        state.bottlenecks.save(&bottleneck).await.map_err(persistence)?;
        recorded.push(bottleneck);
    }

    record_activity(
        &state,
        AgentActivity::new(
            "bottleneck_agent",
            "analyze",
            format!("{detected} bottlenecks detected, {} newly recorded", recorded.len()),
        ),
    )
    .await;
    info!(
        event_name = "analytics.bottlenecks_analyzed",
        detected,
        recorded = recorded.len(),
        "bottleneck analysis finished"
    );

    let active = state.bottlenecks.list(true, BOTTLENECK_LIST_LIMIT).await.map_err(persistence)?;
    Ok(Json(Analysis { summary, detected, recorded, active }))
}

async fn bottleneck_stats(State(state): State<AppState>) -> ApiResult<BottleneckStats> {
    let all = state.bottlenecks.list(false, u32::MAX).await.map_err(persistence)?;

    let mut by_type = BTreeMap::new();
    let mut by_severity = BTreeMap::new();
    for bottleneck in &all {
        *by_type.entry(bottleneck.kind.as_str().to_string()).or_default() += 1;
        *by_severity.entry(bottleneck.severity.as_str().to_string()).or_default() += 1;
    }
    let resolved = all.iter().filter(|bottleneck| bottleneck.is_resolved).count();

    Ok(Json(BottleneckStats {
        total: all.len(),
        active: all.len() - resolved,
        resolved,
        by_type,
        by_severity,
    }))
}

async fn resolve(
    State(state): State<AppState>,
    Path(bottleneck_id): Path<String>,
) -> ApiResult<Bottleneck> {
    let Some(mut bottleneck) =
        state.bottlenecks.find_by_id(&bottleneck_id).await.map_err(persistence)?
    else {
        return Err(not_found("bottleneck", bottleneck_id));
    };

    if !bottleneck.is_resolved {
        bottleneck.resolve(Utc::now());
        state.bottlenecks.save(&bottleneck).await.map_err(persistence)?;
    }
    Ok(Json(bottleneck))
}

async fn activities(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Vec<AgentActivity>> {
    Ok(Json(state.activities.recent(query.limit).await.map_err(persistence)?))
}
