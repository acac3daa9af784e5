use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use opsdesk_core::domain::activity::AgentActivity;
use opsdesk_core::domain::order::{CustomerInfo, Order, OrderId, OrderStatus};
use opsdesk_core::domain::supplier::SupplierQuery;
use opsdesk_core::ops::{
    order_stats, plan_order, supplier_queries_for, OrderStats, RequestedItem, StockShortage,
};
use opsdesk_db::repositories::{OrderFilter, ProductFilter};

use crate::api::{not_found, persistence, record_activity, reject, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/stats", get(stats))
        .route("/tracking/{order_number}", get(track))
        .route("/{order_id}", get(get_order))
        .route("/{order_id}/status", put(update_status))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub skip: u32,
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer: CustomerInfo,
    pub items: Vec<RequestedItem>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: Order,
    pub shortages: Vec<StockShortage>,
    pub supplier_queries: Vec<SupplierQuery>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct Tracking {
    pub order_number: String,
    pub status: OrderStatus,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub items: usize,
    pub total_amount: Decimal,
    pub updated_at: DateTime<Utc>,
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Order>> {
    let status = query.status.as_deref().map(str::parse::<OrderStatus>).transpose().map_err(reject)?;
    let filter = OrderFilter { status, limit: query.limit, skip: query.skip };
    Ok(Json(state.orders.list(&filter).await.map_err(persistence)?))
}

async fn stats(State(state): State<AppState>) -> ApiResult<OrderStats> {
    let orders = state.orders.list_all().await.map_err(persistence)?;
    Ok(Json(order_stats(&orders, Utc::now())))
}

/// Prices the order, takes what is on hand out of stock and raises supplier queries
/// for whatever is short.
async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> ApiResult<CreateOrderResponse> {
    let catalog = state.products.list(&ProductFilter::default()).await.map_err(persistence)?;
    let plan = plan_order(&request.items, &catalog).map_err(reject)?;

    let now = Utc::now();
    let order = Order {
        id: OrderId(Uuid::new_v4().to_string()),
        order_number: Order::generate_number(now),
        customer: request.customer,
        items: plan.items,
        total_amount: plan.total_amount,
        status: plan.status,
        assigned_staff_id: None,
        conversation_id: request.conversation_id,
        estimated_delivery: Some(now + Duration::days(plan.delivery_days)),
        created_at: now,
        updated_at: now,
    };
    state.orders.place(&order, &plan.deductions).await.map_err(persistence)?;

    let mut queries = Vec::new();
    if !plan.shortages.is_empty() {
        let suppliers = state.suppliers.list(true).await.map_err(persistence)?;
        queries = supplier_queries_for(&plan.shortages, &suppliers, &order, now);
        for query in &queries {
            state.supplier_queries.save(query).await.map_err(persistence)?;
        }
    }

    record_activity(
        &state,
        AgentActivity::new(
            "order_agent",
            "create_order",
            format!("Order {} placed ({})", order.order_number, order.status.as_str()),
        )
        .for_order(order.id.0.clone()),
    )
    .await;
    info!(
        event_name = "orders.created",
        order_number = %order.order_number,
        status = order.status.as_str(),
        shortages = plan.shortages.len(),
        supplier_queries = queries.len(),
        "order placed"
    );

    Ok(Json(CreateOrderResponse { order, shortages: plan.shortages, supplier_queries: queries }))
}

async fn get_order(State(state): State<AppState>, Path(order_id): Path<String>) -> ApiResult<Order> {
    let id = OrderId(order_id);
    match state.orders.find_by_id(&id).await.map_err(persistence)? {
        Some(order) => Ok(Json(order)),
        None => Err(not_found("order", id.0)),
    }
}

async fn update_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<Order> {
    let status = update.status.parse::<OrderStatus>().map_err(reject)?;
    let id = OrderId(order_id);
    let Some(mut order) = state.orders.find_by_id(&id).await.map_err(persistence)? else {
        return Err(not_found("order", id.0));
    };

    let previous = order.status;
    order.status = status;
    order.updated_at = Utc::now();
    state.orders.save(&order).await.map_err(persistence)?;

    record_activity(
        &state,
        AgentActivity::new(
            "order_agent",
            "update_status",
            format!("Order {}: {} -> {}", order.order_number, previous.as_str(), status.as_str()),
        )
        .for_order(order.id.0.clone()),
    )
    .await;
    Ok(Json(order))
}

async fn track(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> ApiResult<Tracking> {
    let Some(order) = state.orders.find_by_number(&order_number).await.map_err(persistence)? else {
        return Err(not_found("order", order_number));
    };

    Ok(Json(Tracking {
        order_number: order.order_number,
        status: order.status,
        estimated_delivery: order.estimated_delivery,
        items: order.items.len(),
        total_amount: order.total_amount,
        updated_at: order.updated_at,
    }))
}
