use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use opsdesk_core::domain::activity::AgentActivity;
use opsdesk_core::domain::bottleneck::Bottleneck;
use opsdesk_core::domain::conversation::{
    Conversation, ConversationId, ConversationMessage, ConversationSummary,
};
use opsdesk_core::domain::lead::Lead;
use opsdesk_core::domain::order::{Order, OrderId, OrderStatus};
use opsdesk_core::domain::product::{Product, ProductCategory, ProductId};
use opsdesk_core::domain::staff::{Staff, StaffId};
use opsdesk_core::domain::supplier::{Supplier, SupplierId, SupplierQuery};

pub mod activity;
pub mod bottleneck;
pub mod conversation;
pub mod lead;
pub mod order;
pub mod product;
pub mod staff;
pub mod supplier;

pub use activity::SqlActivityRepository;
pub use bottleneck::SqlBottleneckRepository;
pub use conversation::SqlConversationRepository;
pub use lead::SqlLeadRepository;
pub use order::SqlOrderRepository;
pub use product::SqlProductRepository;
pub use staff::SqlStaffRepository;
pub use supplier::{SqlSupplierQueryRepository, SqlSupplierRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[derive(Clone, Debug, Default)]
pub struct ProductFilter {
    pub category: Option<ProductCategory>,
    pub low_stock_only: bool,
}

#[derive(Clone, Debug)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub limit: u32,
    pub skip: u32,
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self { status: None, limit: 50, skip: 0 }
    }
}

/// Mirror of the sequencer's lead list so runs survive in the database for reporting.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn replace_all(&self, leads: &[Lead]) -> Result<(), RepositoryError>;
    async fn save(&self, lead: &Lead) -> Result<(), RepositoryError>;
    async fn list(&self) -> Result<Vec<Lead>, RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find(&self, id: &ConversationId) -> Result<Option<Conversation>, RepositoryError>;

    /// Creates the conversation header when it does not exist yet and appends `messages`
    /// after whatever is already stored.
    async fn append(
        &self,
        conversation: &Conversation,
        messages: &[ConversationMessage],
    ) -> Result<(), RepositoryError>;

    async fn list(&self, limit: u32) -> Result<Vec<ConversationSummary>, RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError>;
    async fn save(&self, product: &Product) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError>;

    /// Atomically adds `delta` to the stock level, never going below zero.
    async fn adjust_stock(
        &self,
        id: &ProductId,
        delta: i64,
    ) -> Result<Option<Product>, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
    async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError>;
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError>;
    async fn save(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Inserts a new order and takes `deductions` out of stock in one transaction.
    /// Fails with [`RepositoryError::Conflict`] when stock moved underneath the caller.
    async fn place(
        &self,
        order: &Order,
        deductions: &[(ProductId, u32)],
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SupplierRepository: Send + Sync {
    async fn find_by_id(&self, id: &SupplierId) -> Result<Option<Supplier>, RepositoryError>;
    async fn list(&self, active_only: bool) -> Result<Vec<Supplier>, RepositoryError>;
    async fn save(&self, supplier: &Supplier) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &SupplierId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait SupplierQueryRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<SupplierQuery>, RepositoryError>;
    async fn save(&self, query: &SupplierQuery) -> Result<(), RepositoryError>;
    async fn list_pending(&self) -> Result<Vec<SupplierQuery>, RepositoryError>;
    async fn list_for_supplier(
        &self,
        supplier_id: &SupplierId,
    ) -> Result<Vec<SupplierQuery>, RepositoryError>;
    async fn list_for_order(&self, order_id: &str) -> Result<Vec<SupplierQuery>, RepositoryError>;
}

#[async_trait]
pub trait StaffRepository: Send + Sync {
    async fn find_by_id(&self, id: &StaffId) -> Result<Option<Staff>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Staff>, RepositoryError>;
    async fn save(&self, staff: &Staff) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &StaffId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait BottleneckRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Bottleneck>, RepositoryError>;
    async fn save(&self, bottleneck: &Bottleneck) -> Result<(), RepositoryError>;
    async fn list(&self, active_only: bool, limit: u32) -> Result<Vec<Bottleneck>, RepositoryError>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn record(&self, activity: &AgentActivity) -> Result<(), RepositoryError>;
    async fn recent(&self, limit: u32) -> Result<Vec<AgentActivity>, RepositoryError>;
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

pub(crate) fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_enum<T>(column: &str, value: String) -> Result<T, RepositoryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|error| RepositoryError::Decode(format!("invalid `{column}`: {error}")))
}

pub(crate) fn parse_json_list<T: DeserializeOwned>(
    column: &str,
    value: String,
) -> Result<Vec<T>, RepositoryError> {
    serde_json::from_str(&value)
        .map_err(|error| RepositoryError::Decode(format!("invalid json in `{column}`: {error}")))
}

pub(crate) fn json_list<T: Serialize>(values: &[T]) -> Result<String, RepositoryError> {
    serde_json::to_string(values).map_err(|error| RepositoryError::Decode(error.to_string()))
}
