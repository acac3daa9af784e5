use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::product::{ProductCategory, ProductId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub String);

impl fmt::Display for SupplierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact_person: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub categories: Vec<ProductCategory>,
    pub products_offered: Vec<String>,
    pub avg_response_time_hours: f64,
    pub reliability_score: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Supplier {
    pub const DEFAULT_RESPONSE_HOURS: f64 = 24.0;
    pub const DEFAULT_RELIABILITY: f64 = 0.8;

    pub fn supplies(&self, category: ProductCategory) -> bool {
        self.is_active && self.categories.contains(&category)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierQueryStatus {
    Pending,
    Available,
    Unavailable,
    Expired,
}

impl SupplierQueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for SupplierQueryStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "available" => Ok(Self::Available),
            "unavailable" => Ok(Self::Unavailable),
            "expired" => Ok(Self::Expired),
            other => Err(DomainError::UnknownVariant {
                kind: "supplier query status",
                value: other.to_owned(),
            }),
        }
    }
}

/// A request for stock sent to one supplier on behalf of an order that could not be filled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierQuery {
    pub id: String,
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub order_id: Option<String>,
    pub order_number: Option<String>,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity_needed: u32,
    pub status: SupplierQueryStatus,
    pub response_quantity: Option<u32>,
    pub response_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl SupplierQuery {
    pub fn generate_id() -> String {
        let hex = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        format!("SQ-{}", &hex[..8])
    }

    pub fn respond(
        &mut self,
        available: bool,
        quantity: Option<u32>,
        message: Option<String>,
    ) -> Result<(), DomainError> {
        if self.status != SupplierQueryStatus::Pending {
            return Err(DomainError::InvariantViolation(format!(
                "supplier query {} was already answered",
                self.id
            )));
        }

        let needed = self.quantity_needed;
        self.status =
            if available { SupplierQueryStatus::Available } else { SupplierQueryStatus::Unavailable };
        self.response_quantity = if available {
            Some(quantity.unwrap_or(needed).min(needed))
        } else {
            quantity.map(|offered| offered.min(needed))
        };
        self.response_message = message;
        self.responded_at = Some(Utc::now());
        Ok(())
    }

    /// Units this answer contributes towards the shortage.
    pub fn accepted_quantity(&self) -> u32 {
        match self.status {
            SupplierQueryStatus::Available => self.response_quantity.unwrap_or(0),
            _ => 0,
        }
    }
}
