//! Server-rendered overview page at `/`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::{error, warn};

use opsdesk_core::domain::bottleneck::Bottleneck;

use crate::api::analytics::dashboard_stats;
use crate::state::AppState;

const DASHBOARD_TEMPLATE: &str = "dashboard.html";
const BOTTLENECKS_SHOWN: u32 = 10;

pub fn templates() -> Arc<Tera> {
    let mut tera = Tera::default();
    if let Err(err) =
        tera.add_raw_template(DASHBOARD_TEMPLATE, include_str!("../../../templates/dashboard.html"))
    {
        warn!(event_name = "dashboard.template_invalid", error = %err, "dashboard template did not parse");
    }
    Arc::new(tera)
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

#[derive(Debug, Serialize)]
struct StatCard {
    label: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct BottleneckRow {
    severity: &'static str,
    title: String,
    description: String,
    detected_at: String,
}

impl From<&Bottleneck> for BottleneckRow {
    fn from(bottleneck: &Bottleneck) -> Self {
        Self {
            severity: bottleneck.severity.as_str(),
            title: bottleneck.title.clone(),
            description: bottleneck.description.clone(),
            detected_at: bottleneck.detected_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

fn page_error(status: StatusCode, message: &str) -> (StatusCode, Html<String>) {
    (status, Html(format!("<h1>OpsDesk</h1><p>{message}</p>")))
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let stats = dashboard_stats(&state)
        .await
        .map_err(|(status, body)| page_error(status, &body.0.error))?;
    let bottlenecks = state
        .bottlenecks
        .list(true, BOTTLENECKS_SHOWN)
        .await
        .map_err(|_| page_error(StatusCode::SERVICE_UNAVAILABLE, "Storage is unavailable."))?;
    let outreach = state.sequencer.lock().await.status();

    let cards = vec![
        StatCard { label: "Orders", value: stats.total_orders.to_string() },
        StatCard { label: "Pending", value: stats.pending_orders.to_string() },
        StatCard { label: "Processing", value: stats.processing_orders.to_string() },
        StatCard { label: "Orders today", value: stats.orders_today.to_string() },
        StatCard { label: "Products", value: stats.total_products.to_string() },
        StatCard { label: "Low stock", value: stats.low_stock_count.to_string() },
        StatCard { label: "Open bottlenecks", value: stats.active_bottlenecks.to_string() },
        StatCard { label: "Staff utilization", value: format!("{:.1}%", stats.staff_utilization) },
    ];
    let rows: Vec<BottleneckRow> = bottlenecks.iter().map(BottleneckRow::from).collect();
    let outreach_line = if outreach.leads_loaded == 0 {
        "No leads loaded.".to_string()
    } else if outreach.finished {
        format!(
            "Run finished: {} of {} leads qualified.",
            outreach.qualified_count, outreach.leads_loaded
        )
    } else {
        format!(
            "Lead {} of {} in progress, {} qualified so far.",
            (outreach.current_index + 1).min(outreach.leads_loaded),
            outreach.leads_loaded,
            outreach.qualified_count
        )
    };

    let mut context = Context::new();
    context.insert("cards", &cards);
    context.insert("bottlenecks", &rows);
    context.insert("outreach", &outreach_line);
    context.insert("whatsapp_enabled", &state.config.whatsapp.enabled);

    let html = state.templates.render(DASHBOARD_TEMPLATE, &context).map_err(|err| {
        error!(event_name = "dashboard.render_failed", error = %err, "dashboard render failed");
        page_error(StatusCode::INTERNAL_SERVER_ERROR, "The dashboard could not be rendered.")
    })?;
    Ok(Html(html))
}
