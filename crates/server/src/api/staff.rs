use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use opsdesk_core::domain::activity::AgentActivity;
use opsdesk_core::domain::order::OrderId;
use opsdesk_core::domain::staff::{
    Staff, StaffId, StaffTask, TaskId, TaskStatus, DEFAULT_MAX_WORKLOAD,
};
use opsdesk_core::errors::DomainError;
use opsdesk_core::ops::{pick_assignee_mut, workload_summary, WorkloadSummary};

use crate::api::{
    bad_request, not_found, persistence, record_activity, reject, Ack, ApiRejection, ApiResult,
};
use crate::state::AppState;

const DEFAULT_PRIORITY: u8 = 1;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_staff).post(create_staff))
        .route("/workload", get(workload))
        .route("/assign", post(auto_assign))
        .route("/{staff_id}", get(get_staff).delete(delete_staff))
        .route("/{staff_id}/assign", post(assign))
        .route("/{staff_id}/tasks/{task_id}/status", put(update_task_status))
}

#[derive(Debug, Deserialize)]
pub struct NewStaff {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub max_workload: Option<u32>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub description: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub priority: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusUpdate {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct Assignment {
    pub staff_id: StaffId,
    pub staff_name: String,
    pub task: StaffTask,
    pub current_workload: u32,
}

async fn list_staff(State(state): State<AppState>) -> ApiResult<Vec<Staff>> {
    Ok(Json(state.staff.list().await.map_err(persistence)?))
}

async fn workload(State(state): State<AppState>) -> ApiResult<WorkloadSummary> {
    let staff = state.staff.list().await.map_err(persistence)?;
    Ok(Json(workload_summary(&staff)))
}

async fn load_member(state: &AppState, staff_id: String) -> Result<Staff, ApiRejection> {
    let id = StaffId(staff_id);
    let found = state.staff.find_by_id(&id).await.map_err(persistence)?;
    found.ok_or_else(|| not_found("staff member", id.0))
}

async fn get_staff(State(state): State<AppState>, Path(staff_id): Path<String>) -> ApiResult<Staff> {
    Ok(Json(load_member(&state, staff_id).await?))
}

async fn create_staff(State(state): State<AppState>, Json(input): Json<NewStaff>) -> ApiResult<Staff> {
    if input.name.trim().is_empty() {
        return Err(bad_request("staff name must not be empty"));
    }

    let member = Staff {
        id: StaffId(format!("stf-{}", &Uuid::new_v4().simple().to_string()[..8])),
        name: input.name.trim().to_string(),
        role: input.role,
        phone: input.phone,
        email: input.email,
        is_available: true,
        current_workload: 0,
        max_workload: input.max_workload.unwrap_or(DEFAULT_MAX_WORKLOAD),
        skills: input.skills,
        tasks: Vec::new(),
        created_at: Utc::now(),
    };
    state.staff.save(&member).await.map_err(persistence)?;

    info!(event_name = "staff.created", staff_id = %member.id.0, "staff member created");
    Ok(Json(member))
}

async fn delete_staff(State(state): State<AppState>, Path(staff_id): Path<String>) -> ApiResult<Ack> {
    let id = StaffId(staff_id);
    if !state.staff.delete(&id).await.map_err(persistence)? {
        return Err(not_found("staff member", id.0));
    }
    Ok(Ack::ok(format!("Staff member {} deleted", id.0)))
}

async fn assign(
    State(state): State<AppState>,
    Path(staff_id): Path<String>,
    Json(request): Json<TaskRequest>,
) -> ApiResult<Assignment> {
    let mut member = load_member(&state, staff_id).await?;
    Ok(Json(commit_assignment(&state, &mut member, request).await?))
}

/// Hands the task to the available member with the lowest workload.
async fn auto_assign(
    State(state): State<AppState>,
    Json(request): Json<TaskRequest>,
) -> ApiResult<Assignment> {
    let mut staff = state.staff.list().await.map_err(persistence)?;
    let Some(member) = pick_assignee_mut(&mut staff) else {
        return Err(reject(DomainError::InvariantViolation(
            "no staff member has spare capacity".to_string(),
        )));
    };
    Ok(Json(commit_assignment(&state, member, request).await?))
}

async fn commit_assignment(
    state: &AppState,
    member: &mut Staff,
    request: TaskRequest,
) -> Result<Assignment, ApiRejection> {
    if request.description.trim().is_empty() {
        return Err(bad_request("task description must not be empty"));
    }

    let task = StaffTask::new(
        request.description.trim(),
        request.order_id.clone(),
        request.priority.unwrap_or(DEFAULT_PRIORITY),
    );
    member.assign(task.clone());
    state.staff.save(member).await.map_err(persistence)?;

    if let Some(order_id) = &request.order_id {
        let id = OrderId(order_id.clone());
        if let Some(mut order) = state.orders.find_by_id(&id).await.map_err(persistence)? {
            order.assigned_staff_id = Some(member.id.0.clone());
            order.updated_at = Utc::now();
            state.orders.save(&order).await.map_err(persistence)?;
        }
    }

    let mut activity = AgentActivity::new(
        "workload_agent",
        "assign_task",
        format!("{} assigned to {}", task.description, member.name),
    );
    if let Some(order_id) = &request.order_id {
        activity = activity.for_order(order_id.clone());
    }
    record_activity(state, activity).await;

    Ok(Assignment {
        staff_id: member.id.clone(),
        staff_name: member.name.clone(),
        task,
        current_workload: member.current_workload,
    })
}

async fn update_task_status(
    State(state): State<AppState>,
    Path((staff_id, task_id)): Path<(String, String)>,
    Json(update): Json<TaskStatusUpdate>,
) -> ApiResult<StaffTask> {
    let status = update.status.parse::<TaskStatus>().map_err(reject)?;
    let mut member = load_member(&state, staff_id).await?;

    let task = member.set_task_status(&TaskId(task_id), status).map_err(reject)?.clone();
    state.staff.save(&member).await.map_err(persistence)?;
    Ok(Json(task))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;

    use opsdesk_agent::ScriptedLlm;

    use crate::api::test_support::{seeded_state, send};

    async fn app() -> axum::Router {
        let state = seeded_state(Arc::new(ScriptedLlm::default())).await;
        axum::Router::new().nest("/staff", super::router()).with_state(state)
    }

    #[tokio::test]
    async fn completing_a_task_releases_capacity() {
        let app = app().await;

        let (status, assignment) = send(
            &app,
            "POST",
            "/staff/stf-003/assign",
            Some(json!({ "description": "Pack order ORD-20260301-A1B2C3", "priority": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(assignment["current_workload"], 1);
        let task_id = assignment["task"]["id"].as_str().expect("task id").to_string();

        let (_, task) = send(
            &app,
            "PUT",
            &format!("/staff/stf-003/tasks/{task_id}/status"),
            Some(json!({ "status": "completed" })),
        )
        .await;
        assert_eq!(task["status"], "completed");

        let (_, member) = send(&app, "GET", "/staff/stf-003", None).await;
        assert_eq!(member["current_workload"], 0);
        assert_eq!(member["tasks"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn auto_assign_spreads_work() {
        let app = app().await;

        let (_, first) =
            send(&app, "POST", "/staff/assign", Some(json!({ "description": "Count shelf A" }))).await;
        let (_, second) =
            send(&app, "POST", "/staff/assign", Some(json!({ "description": "Count shelf B" }))).await;

        assert_ne!(first["staff_id"], second["staff_id"]);
        let (_, workload) = send(&app, "GET", "/staff/workload", None).await;
        assert_eq!(workload["total_current"], 2);
        assert_eq!(workload["members"].as_array().map(Vec::len), Some(8));
    }

    #[tokio::test]
    async fn unknown_task_status_is_rejected() {
        let app = app().await;
        let (status, _) = send(
            &app,
            "PUT",
            "/staff/stf-001/tasks/TASK-MISSING/status",
            Some(json!({ "status": "archived" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "PUT",
            "/staff/stf-001/tasks/TASK-MISSING/status",
            Some(json!({ "status": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
