use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use opsdesk_core::domain::activity::AgentActivity;
use opsdesk_core::domain::order::{OrderId, OrderStatus};
use opsdesk_core::domain::product::ProductCategory;
use opsdesk_core::domain::supplier::{Supplier, SupplierId, SupplierQuery, SupplierQueryStatus};
use opsdesk_core::ops::fulfillment::STANDARD_DELIVERY_DAYS;
use opsdesk_core::ops::{
    restock_deductions, restock_outcome, settle_sibling_queries, RestockOutcome,
};

use crate::api::{
    bad_request, not_found, persistence, record_activity, reject, Ack, ApiRejection, ApiResult,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route("/pending-queries", get(pending_queries))
        .route("/{supplier_id}", get(get_supplier).put(update_supplier).delete(delete_supplier))
        .route("/{supplier_id}/queries", get(supplier_queries))
        .route("/{supplier_id}/respond", post(respond_to_query))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_true")]
    pub active_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default = "default_true")]
    pub soft_delete: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueriesFilter {
    pub status: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub contact_person: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub categories: Vec<ProductCategory>,
    #[serde(default)]
    pub products_offered: Vec<String>,
    #[serde(default)]
    pub avg_response_time_hours: Option<f64>,
    #[serde(default)]
    pub reliability_score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SupplierUpdate {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub categories: Option<Vec<ProductCategory>>,
    pub products_offered: Option<Vec<String>>,
    pub avg_response_time_hours: Option<f64>,
    pub reliability_score: Option<f64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SupplierResponse {
    pub query_id: String,
    pub available: bool,
    #[serde(default)]
    pub quantity_available: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RespondResult {
    pub message: String,
    pub result: String,
    pub outcome: Option<RestockOutcome>,
    pub query: SupplierQuery,
}

async fn list_suppliers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Supplier>> {
    Ok(Json(state.suppliers.list(query.active_only).await.map_err(persistence)?))
}

async fn pending_queries(State(state): State<AppState>) -> ApiResult<Vec<SupplierQuery>> {
    Ok(Json(state.supplier_queries.list_pending().await.map_err(persistence)?))
}

async fn load_supplier(state: &AppState, supplier_id: String) -> Result<Supplier, ApiRejection> {
    let id = SupplierId(supplier_id);
    let found = state.suppliers.find_by_id(&id).await.map_err(persistence)?;
    found.ok_or_else(|| not_found("supplier", id.0))
}

async fn get_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
) -> ApiResult<Supplier> {
    Ok(Json(load_supplier(&state, supplier_id).await?))
}

async fn create_supplier(
    State(state): State<AppState>,
    Json(input): Json<NewSupplier>,
) -> ApiResult<Supplier> {
    if input.name.trim().is_empty() {
        return Err(bad_request("supplier name must not be empty"));
    }
    if input.categories.is_empty() {
        return Err(bad_request("a supplier needs at least one category"));
    }

    let supplier = Supplier {
        id: SupplierId(format!("sup-{}", &Uuid::new_v4().simple().to_string()[..8])),
        name: input.name.trim().to_string(),
        contact_person: input.contact_person,
        phone: input.phone,
        email: input.email,
        address: input.address,
        categories: input.categories,
        products_offered: input.products_offered,
        avg_response_time_hours: input
            .avg_response_time_hours
            .unwrap_or(Supplier::DEFAULT_RESPONSE_HOURS),
        reliability_score: input.reliability_score.unwrap_or(Supplier::DEFAULT_RELIABILITY),
        is_active: true,
        created_at: Utc::now(),
    };
    state.suppliers.save(&supplier).await.map_err(persistence)?;

    info!(event_name = "suppliers.created", supplier_id = %supplier.id.0, "supplier created");
    Ok(Json(supplier))
}

async fn update_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
    Json(update): Json<SupplierUpdate>,
) -> ApiResult<Supplier> {
    let mut supplier = load_supplier(&state, supplier_id).await?;

    if let Some(name) = update.name {
        supplier.name = name;
    }
    if let Some(contact_person) = update.contact_person {
        supplier.contact_person = contact_person;
    }
    if let Some(phone) = update.phone {
        supplier.phone = phone;
    }
    if update.email.is_some() {
        supplier.email = update.email;
    }
    if update.address.is_some() {
        supplier.address = update.address;
    }
    if let Some(categories) = update.categories {
        supplier.categories = categories;
    }
    if let Some(products) = update.products_offered {
        supplier.products_offered = products;
    }
    if let Some(hours) = update.avg_response_time_hours {
        supplier.avg_response_time_hours = hours;
    }
    if let Some(score) = update.reliability_score {
        supplier.reliability_score = score;
    }
    if let Some(active) = update.is_active {
        supplier.is_active = active;
    }

    state.suppliers.save(&supplier).await.map_err(persistence)?;
    Ok(Json(supplier))
}

/// Soft delete deactivates the supplier so past queries keep their reference.
async fn delete_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Ack> {
    let mut supplier = load_supplier(&state, supplier_id).await?;

    if query.soft_delete {
        supplier.is_active = false;
        state.suppliers.save(&supplier).await.map_err(persistence)?;
        return Ok(Ack::ok(format!("Supplier {} deactivated", supplier.id.0)));
    }

    state.suppliers.delete(&supplier.id).await.map_err(persistence)?;
    Ok(Ack::ok(format!("Supplier {} deleted", supplier.id.0)))
}

async fn supplier_queries(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
    Query(filter): Query<QueriesFilter>,
) -> ApiResult<Vec<SupplierQuery>> {
    let supplier = load_supplier(&state, supplier_id).await?;
    let status =
        filter.status.as_deref().map(str::parse::<SupplierQueryStatus>).transpose().map_err(reject)?;

    let mut queries =
        state.supplier_queries.list_for_supplier(&supplier.id).await.map_err(persistence)?;
    if let Some(status) = status {
        queries.retain(|query| query.status == status);
    }
    Ok(Json(queries))
}

/// Records a supplier's answer, restocks what was accepted and settles the other queries
/// for the same product. The order is released once every shortage is covered.
async fn respond_to_query(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
    Json(response): Json<SupplierResponse>,
) -> ApiResult<RespondResult> {
    let supplier_id = SupplierId(supplier_id);
    let found = state.supplier_queries.find_by_id(&response.query_id).await.map_err(persistence)?;
    let mut query = match found {
        Some(query) if query.supplier_id == supplier_id => query,
        _ => return Err(not_found("supplier query", response.query_id)),
    };

    query
        .respond(response.available, response.quantity_available, response.message)
        .map_err(reject)?;
    state.supplier_queries.save(&query).await.map_err(persistence)?;

    let restocked = match query.accepted_quantity() {
        0 => None,
        quantity => {
            state
                .products
                .adjust_stock(&query.product_id, i64::from(quantity))
                .await
                .map_err(persistence)?;
            let mut activity = AgentActivity::new(
                "supplier_agent",
                "stock_received_from_supplier",
                format!("+{quantity} units of {} from {}", query.product_name, query.supplier_name),
            );
            if let Some(order_id) = &query.order_id {
                activity = activity.for_order(order_id.clone());
            }
            record_activity(&state, activity).await;
            Some(quantity)
        }
    };

    let Some(order_id) = query.order_id.clone() else {
        let result = restocked
            .map(|quantity| format!("Inventory updated with {quantity} units."))
            .unwrap_or_else(|| "Response recorded.".to_string());
        return Ok(Json(RespondResult {
            message: "Response recorded successfully".to_string(),
            result,
            outcome: None,
            query,
        }));
    };

    let mut order_queries =
        state.supplier_queries.list_for_order(&order_id).await.map_err(persistence)?;
    for sibling in settle_sibling_queries(&query, &mut order_queries) {
        state.supplier_queries.save(&sibling).await.map_err(persistence)?;
    }
    let outcome = restock_outcome(&query, &order_queries);

    match &outcome {
        RestockOutcome::OrderReady { order_number } => {
            let id = OrderId(order_id.clone());
            if let Some(mut order) = state.orders.find_by_id(&id).await.map_err(persistence)? {
                if order.status == OrderStatus::AwaitingStock {
                    for (product_id, units) in restock_deductions(&order_queries) {
                        state
                            .products
                            .adjust_stock(&product_id, -i64::from(units))
                            .await
                            .map_err(persistence)?;
                    }
                    let now = Utc::now();
                    order.status = OrderStatus::Pending;
                    order.estimated_delivery = Some(now + Duration::days(STANDARD_DELIVERY_DAYS));
                    order.updated_at = now;
                    state.orders.save(&order).await.map_err(persistence)?;
                }
            }
            record_activity(
                &state,
                AgentActivity::new(
                    "order_agent",
                    "stock_fulfilled_by_supplier",
                    format!("Order {order_number} stock fulfilled by {}", query.supplier_name),
                )
                .for_order(order_id.clone()),
            )
            .await;
        }
        RestockOutcome::NoSupplierStock { order_number } => {
            record_activity(
                &state,
                AgentActivity::new(
                    "order_agent",
                    "stock_unavailable_all_suppliers",
                    format!("Order {order_number}: suppliers could not cover the shortage"),
                )
                .for_order(order_id.clone())
                .failed(),
            )
            .await;
        }
        RestockOutcome::AwaitingResponses { .. } => {}
    }

    info!(
        event_name = "suppliers.query_answered",
        query_id = %query.id,
        supplier = %query.supplier_name,
        available = response.available,
        "supplier answered stock query"
    );

    Ok(Json(RespondResult {
        message: "Response recorded successfully".to_string(),
        result: outcome.message(restocked),
        outcome: Some(outcome),
        query,
    }))
}
