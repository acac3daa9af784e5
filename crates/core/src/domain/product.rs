use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Jewelry,
    KitchenAppliances,
    Makeup,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 3] = [Self::Jewelry, Self::KitchenAppliances, Self::Makeup];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jewelry => "jewelry",
            Self::KitchenAppliances => "kitchen_appliances",
            Self::Makeup => "makeup",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Jewelry => "Jewelry",
            Self::KitchenAppliances => "Kitchen Appliances",
            Self::Makeup => "Makeup",
        }
    }
}

impl FromStr for ProductCategory {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "jewelry" => Ok(Self::Jewelry),
            "kitchen_appliances" => Ok(Self::KitchenAppliances),
            "makeup" => Ok(Self::Makeup),
            other => {
                Err(DomainError::UnknownVariant { kind: "product category", value: other.to_owned() })
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: ProductCategory,
    pub description: String,
    pub price: Decimal,
    pub quantity: u32,
    pub low_stock_threshold: u32,
    pub supplier_id: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity == 0
    }

    pub fn stock_value(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Applies a signed stock change, clamping at zero. Returns the new quantity.
    pub fn apply_stock_delta(&mut self, delta: i64) -> u32 {
        let next = (i64::from(self.quantity) + delta).clamp(0, i64::from(u32::MAX));
        self.quantity = u32::try_from(next).unwrap_or(0);
        self.updated_at = Utc::now();
        self.quantity
    }
}
