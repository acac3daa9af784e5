use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::product::ProductId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    AwaitingStock,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::AwaitingStock,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::AwaitingStock => "awaiting_stock",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Orders that still wait for someone to pick them up.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| DomainError::UnknownVariant { kind: "order status", value: value.to_owned() })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub address: String,
    pub city: String,
    pub pincode: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl OrderItem {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            total_price: unit_price * Decimal::from(quantity),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub customer: CustomerInfo,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub assigned_staff_id: Option<String>,
    pub conversation_id: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// `ORD-YYYYMMDD-XXXXXX` with six upper-case hex characters.
    pub fn generate_number(now: DateTime<Utc>) -> String {
        let hex = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        format!("ORD-{}-{}", now.format("%Y%m%d"), &hex[..6])
    }

    pub fn total_of(items: &[OrderItem]) -> Decimal {
        items.iter().map(|item| item.total_price).sum()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{Order, OrderItem, OrderStatus};
    use crate::domain::product::ProductId;

    #[test]
    fn order_number_embeds_date() {
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 10, 0, 0).single().expect("valid date");
        let number = Order::generate_number(now);
        assert!(number.starts_with("ORD-20260309-"));
        assert_eq!(number.len(), "ORD-20260309-".len() + 6);
    }

    #[test]
    fn item_total_is_quantity_times_price() {
        let item = OrderItem::new(ProductId("p".to_owned()), "Blender", 3, Decimal::new(49_99, 2));
        assert_eq!(item.total_price, Decimal::new(149_97, 2));
        assert_eq!(Order::total_of(&[item.clone(), item]), Decimal::new(299_94, 2));
    }

    #[test]
    fn status_parses_snake_case() {
        assert_eq!("awaiting_stock".parse::<OrderStatus>().expect("parse"), OrderStatus::AwaitingStock);
        assert!("lost".parse::<OrderStatus>().is_err());
        assert!(OrderStatus::Confirmed.is_open());
        assert!(!OrderStatus::Shipped.is_open());
    }
}
