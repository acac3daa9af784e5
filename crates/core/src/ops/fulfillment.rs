use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::{Order, OrderItem, OrderStatus};
use crate::domain::product::{Product, ProductCategory, ProductId};
use crate::domain::supplier::{Supplier, SupplierQuery, SupplierQueryStatus};
use crate::errors::DomainError;

pub const STANDARD_DELIVERY_DAYS: i64 = 5;
pub const DELAYED_DELIVERY_DAYS: i64 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortage {
    pub product_id: ProductId,
    pub product_name: String,
    pub category: ProductCategory,
    pub quantity_needed: u32,
    pub in_stock: u32,
    pub shortage: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentPlan {
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    /// Stock to take out of inventory now; never more than what is on hand.
    pub deductions: Vec<(ProductId, u32)>,
    pub shortages: Vec<StockShortage>,
    pub delivery_days: i64,
}

/// Prices the requested lines against the catalog and splits each line into the part
/// that can ship from stock and the part that has to be sourced from suppliers.
pub fn plan_order(
    requested: &[RequestedItem],
    catalog: &[Product],
) -> Result<FulfillmentPlan, DomainError> {
    if requested.is_empty() {
        return Err(DomainError::InvariantViolation(
            "an order needs at least one item".to_string(),
        ));
    }

    let mut remaining: HashMap<&ProductId, u32> = HashMap::new();
    let mut items = Vec::with_capacity(requested.len());
    let mut deductions = Vec::new();
    let mut shortages = Vec::new();

    for line in requested {
        if line.quantity == 0 {
            return Err(DomainError::InvariantViolation(format!(
                "quantity for product `{}` must be greater than zero",
                line.product_id
            )));
        }
        let product = catalog
            .iter()
            .find(|product| product.id == line.product_id)
            .ok_or_else(|| DomainError::NotFound { kind: "product", id: line.product_id.0.clone() })?;

        let on_hand = remaining.entry(&product.id).or_insert(product.quantity);
        let take = line.quantity.min(*on_hand);
        *on_hand -= take;

        if take > 0 {
            deductions.push((product.id.clone(), take));
        }
        if take < line.quantity {
            shortages.push(StockShortage {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                category: product.category,
                quantity_needed: line.quantity,
                in_stock: take,
                shortage: line.quantity - take,
            });
        }

        items.push(OrderItem::new(product.id.clone(), product.name.clone(), line.quantity, product.price));
    }

    let short = !shortages.is_empty();
    Ok(FulfillmentPlan {
        total_amount: Order::total_of(&items),
        items,
        status: if short { OrderStatus::AwaitingStock } else { OrderStatus::Pending },
        deductions,
        shortages,
        delivery_days: if short { DELAYED_DELIVERY_DAYS } else { STANDARD_DELIVERY_DAYS },
    })
}

/// One pending query per active supplier that carries the short product's category.
pub fn supplier_queries_for(
    shortages: &[StockShortage],
    suppliers: &[Supplier],
    order: &Order,
    now: DateTime<Utc>,
) -> Vec<SupplierQuery> {
    shortages
        .iter()
        .flat_map(|shortage| {
            suppliers.iter().filter(|supplier| supplier.supplies(shortage.category)).map(
                move |supplier| SupplierQuery {
                    id: SupplierQuery::generate_id(),
                    supplier_id: supplier.id.clone(),
                    supplier_name: supplier.name.clone(),
                    order_id: Some(order.id.0.clone()),
                    order_number: Some(order.order_number.clone()),
                    product_id: shortage.product_id.clone(),
                    product_name: shortage.product_name.clone(),
                    quantity_needed: shortage.shortage,
                    status: SupplierQueryStatus::Pending,
                    response_quantity: None,
                    response_message: None,
                    created_at: now,
                    responded_at: None,
                },
            )
        })
        .collect()
}

pub fn supplier_request_message(query: &SupplierQuery) -> String {
    format!(
        "Hello {}!\n\nWe have an urgent stock requirement for an order we're processing.\n\n\
         Product needed: {}\nQuantity required: {} units\nOrder reference: {}\nQuery ID: {}\n\n\
         Could you let us know whether you have it available, how many units you can supply, \
         and your price and delivery timeline?",
        query.supplier_name,
        query.product_name,
        query.quantity_needed,
        query.order_number.as_deref().unwrap_or("n/a"),
        query.id,
    )
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RestockOutcome {
    OrderReady { order_number: String },
    AwaitingResponses { pending: usize },
    NoSupplierStock { order_number: String },
}

impl RestockOutcome {
    pub fn message(&self, restocked: Option<u32>) -> String {
        let prefix = restocked
            .map(|quantity| format!("Inventory updated with {quantity} units. "))
            .unwrap_or_default();
        match self {
            Self::OrderReady { order_number } => {
                format!("{prefix}Order {order_number} is now ready for processing!")
            }
            Self::AwaitingResponses { pending } => {
                format!("{prefix}Waiting for {pending} more supplier responses.")
            }
            Self::NoSupplierStock { order_number } => format!(
                "No stock available. Customer will be notified of a 7-day delay for order {order_number}."
            ),
        }
    }
}

/// Applies a positive answer to the other pending queries raised for the same order and
/// product. A full cover expires them, a partial one lowers what they still ask for.
/// Returns the queries that changed.
pub fn settle_sibling_queries(
    answered: &SupplierQuery,
    order_queries: &mut [SupplierQuery],
) -> Vec<SupplierQuery> {
    let accepted = answered.accepted_quantity();
    if accepted == 0 {
        return Vec::new();
    }
    let remaining = answered.quantity_needed.saturating_sub(accepted);

    order_queries
        .iter_mut()
        .filter(|query| {
            query.id != answered.id
                && query.product_id == answered.product_id
                && query.status == SupplierQueryStatus::Pending
        })
        .map(|query| {
            if remaining == 0 {
                query.status = SupplierQueryStatus::Expired;
            } else {
                query.quantity_needed = remaining;
            }
            query.clone()
        })
        .collect()
}

/// Shortage per product for an order, in the order the queries were raised. Sibling queries
/// only ever shrink, so the largest amount asked for is the original shortage.
pub fn restock_deductions(order_queries: &[SupplierQuery]) -> Vec<(ProductId, u32)> {
    let mut shortages: Vec<(ProductId, u32)> = Vec::new();
    for query in order_queries {
        match shortages.iter_mut().find(|(product_id, _)| *product_id == query.product_id) {
            Some((_, shortage)) => *shortage = (*shortage).max(query.quantity_needed),
            None => shortages.push((query.product_id.clone(), query.quantity_needed)),
        }
    }
    shortages
}

/// Decides what an answered query means for its order, given every query raised for
/// that order (including the one just answered).
pub fn restock_outcome(answered: &SupplierQuery, order_queries: &[SupplierQuery]) -> RestockOutcome {
    let pending = order_queries
        .iter()
        .filter(|query| query.status == SupplierQueryStatus::Pending)
        .count();
    let order_number = answered.order_number.clone().unwrap_or_default();

    if pending > 0 {
        return RestockOutcome::AwaitingResponses { pending };
    }

    let covered = restock_deductions(order_queries).iter().all(|(product_id, shortage)| {
        let supplied: u32 = order_queries
            .iter()
            .filter(|query| query.product_id == *product_id)
            .map(SupplierQuery::accepted_quantity)
            .sum();
        supplied >= *shortage
    });
    if covered {
        RestockOutcome::OrderReady { order_number }
    } else {
        RestockOutcome::NoSupplierStock { order_number }
    }
}
