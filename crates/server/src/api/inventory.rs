use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use opsdesk_core::domain::activity::AgentActivity;
use opsdesk_core::domain::product::{
    Product, ProductCategory, ProductId, DEFAULT_LOW_STOCK_THRESHOLD,
};
use opsdesk_core::ops::{inventory_stats, InventoryStats};
use opsdesk_db::repositories::ProductFilter;

use crate::api::{bad_request, not_found, persistence, record_activity, reject, Ack, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/stats", get(stats))
        .route("/low-stock", get(low_stock))
        .route("/categories", get(categories))
        .route("/{product_id}", get(get_product).put(update_product).delete(delete_product))
        .route("/{product_id}/stock", put(adjust_stock))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub low_stock: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: ProductCategory,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub low_stock_threshold: Option<u32>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<ProductCategory>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<u32>,
    pub low_stock_threshold: Option<u32>,
    pub supplier_id: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    pub delta: i64,
}

#[derive(Debug, Serialize)]
pub struct CategoryEntry {
    pub value: &'static str,
    pub label: &'static str,
    pub products: usize,
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Product>> {
    let category =
        query.category.as_deref().map(str::parse::<ProductCategory>).transpose().map_err(reject)?;
    let filter = ProductFilter { category, low_stock_only: query.low_stock };
    Ok(Json(state.products.list(&filter).await.map_err(persistence)?))
}

async fn low_stock(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    let filter = ProductFilter { low_stock_only: true, ..ProductFilter::default() };
    Ok(Json(state.products.list(&filter).await.map_err(persistence)?))
}

async fn stats(State(state): State<AppState>) -> ApiResult<InventoryStats> {
    let products = state.products.list(&ProductFilter::default()).await.map_err(persistence)?;
    Ok(Json(inventory_stats(&products)))
}

async fn categories(State(state): State<AppState>) -> ApiResult<Vec<CategoryEntry>> {
    let products = state.products.list(&ProductFilter::default()).await.map_err(persistence)?;
    Ok(Json(
        ProductCategory::ALL
            .into_iter()
            .map(|category| CategoryEntry {
                value: category.as_str(),
                label: category.label(),
                products: products.iter().filter(|product| product.category == category).count(),
            })
            .collect(),
    ))
}

async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Product> {
    let id = ProductId(product_id);
    match state.products.find_by_id(&id).await.map_err(persistence)? {
        Some(product) => Ok(Json(product)),
        None => Err(not_found("product", id.0)),
    }
}

async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<NewProduct>,
) -> ApiResult<Product> {
    if input.name.trim().is_empty() {
        return Err(bad_request("product name must not be empty"));
    }
    if input.price < Decimal::ZERO {
        return Err(bad_request("price must not be negative"));
    }

    let now = Utc::now();
    let product = Product {
        id: ProductId(format!("prod-{}", &Uuid::new_v4().simple().to_string()[..8])),
        name: input.name.trim().to_string(),
        category: input.category,
        description: input.description,
        price: input.price,
        quantity: input.quantity,
        low_stock_threshold: input.low_stock_threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD),
        supplier_id: input.supplier_id,
        image_url: input.image_url,
        created_at: now,
        updated_at: now,
    };
    state.products.save(&product).await.map_err(persistence)?;

    info!(event_name = "inventory.product_created", product_id = %product.id, "product created");
    Ok(Json(product))
}

async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(update): Json<ProductUpdate>,
) -> ApiResult<Product> {
    let id = ProductId(product_id);
    let Some(mut product) = state.products.find_by_id(&id).await.map_err(persistence)? else {
        return Err(not_found("product", id.0));
    };

    if let Some(price) = update.price {
        if price < Decimal::ZERO {
            return Err(bad_request("price must not be negative"));
        }
        product.price = price;
    }
    if let Some(name) = update.name {
        product.name = name;
    }
    if let Some(category) = update.category {
        product.category = category;
    }
    if let Some(description) = update.description {
        product.description = description;
    }
    if let Some(quantity) = update.quantity {
        product.quantity = quantity;
    }
    if let Some(threshold) = update.low_stock_threshold {
        product.low_stock_threshold = threshold;
    }
    if update.supplier_id.is_some() {
        product.supplier_id = update.supplier_id;
    }
    if update.image_url.is_some() {
        product.image_url = update.image_url;
    }
    product.updated_at = Utc::now();

    state.products.save(&product).await.map_err(persistence)?;
    Ok(Json(product))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Ack> {
    let id = ProductId(product_id);
    if !state.products.delete(&id).await.map_err(persistence)? {
        return Err(not_found("product", id.0));
    }
    Ok(Ack::ok(format!("Product {id} deleted")))
}

/// Stock never goes below zero; an oversized negative delta empties the shelf.
async fn adjust_stock(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(adjustment): Json<StockAdjustment>,
) -> ApiResult<Product> {
    let id = ProductId(product_id);
    let Some(product) =
        state.products.adjust_stock(&id, adjustment.delta).await.map_err(persistence)?
    else {
        return Err(not_found("product", id.0));
    };

    record_activity(
        &state,
        AgentActivity::new(
            "inventory_agent",
            "adjust_stock",
            format!("{}: {:+} -> {} units", product.name, adjustment.delta, product.quantity),
        ),
    )
    .await;
    Ok(Json(product))
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
        axum::Router::new().nest("/inventory", super::router()).with_state(state)
    }

    #[tokio::test]
    async fn lists_by_category() {
        let app = app().await;

        let (status, makeup) = send(&app, "GET", "/inventory?category=makeup", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(makeup.as_array().map(Vec::len), Some(6));

        let (status, _) = send(&app, "GET", "/inventory?category=garden", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, categories) = send(&app, "GET", "/inventory/categories", None).await;
        assert_eq!(categories[1]["value"], "kitchen_appliances");
        assert_eq!(categories[1]["products"], 6);
    }

    #[tokio::test]
    async fn stock_adjustments_clamp_at_zero() {
        let app = app().await;

        let (_, product) =
            send(&app, "PUT", "/inventory/prod-jw-005/stock", Some(json!({ "delta": -100 }))).await;
        assert_eq!(product["quantity"], 0);

        let (_, low) = send(&app, "GET", "/inventory/low-stock", None).await;
        assert!(low.as_array().expect("list").iter().any(|item| item["id"] == "prod-jw-005"));

        let (_, stats) = send(&app, "GET", "/inventory/stats", None).await;
        assert_eq!(stats["out_of_stock"], 1);
        assert_eq!(stats["total_products"], 18);
    }

    #[tokio::test]
    async fn product_lifecycle() {
        let app = app().await;
        let (status, created) = send(
            &app,
            "POST",
            "/inventory",
            Some(json!({ "name": "Bangle Set", "category": "jewelry", "price": "549.00", "quantity": 9 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["low_stock_threshold"], 5);
        let id = created["id"].as_str().expect("id").to_string();

        let (_, updated) =
            send(&app, "PUT", &format!("/inventory/{id}"), Some(json!({ "quantity": 3 }))).await;
        assert_eq!(updated["quantity"], 3);
        assert_eq!(updated["name"], "Bangle Set");

        let (status, _) = send(&app, "DELETE", &format!("/inventory/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "GET", &format!("/inventory/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
