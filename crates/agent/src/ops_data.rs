use anyhow::Result;
use async_trait::async_trait;

use opsdesk_core::domain::activity::AgentActivity;
use opsdesk_core::domain::conversation::{Conversation, ConversationId, ConversationMessage};
use opsdesk_core::domain::order::Order;
use opsdesk_core::domain::product::Product;
use opsdesk_core::domain::staff::Staff;
use opsdesk_core::domain::supplier::{Supplier, SupplierId, SupplierQuery, SupplierQueryStatus};
use opsdesk_core::ops::OperationsSnapshot;

/// Read access to the business records handlers use as prompt context.
#[async_trait]
pub trait OperationsSource: Send + Sync {
    async fn products(&self) -> Result<Vec<Product>>;
    async fn find_orders(&self, order_numbers: &[String]) -> Result<Vec<Order>>;
    async fn recent_orders(&self, limit: u32) -> Result<Vec<Order>>;
    async fn suppliers(&self) -> Result<Vec<Supplier>>;
    async fn supplier(&self, id: &SupplierId) -> Result<Option<Supplier>>;
    async fn pending_supplier_queries(&self) -> Result<Vec<SupplierQuery>>;
    async fn staff(&self) -> Result<Vec<Staff>>;
    async fn snapshot(&self) -> Result<OperationsSnapshot>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, id: &ConversationId) -> Result<Option<Conversation>>;
    async fn append(&self, conversation: &Conversation, messages: &[ConversationMessage])
        -> Result<()>;
}

#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, activity: &AgentActivity) -> Result<()>;
}

/// Fixed in-memory records, for tests and for running the chat runtime without a database.
#[derive(Clone, Debug, Default)]
pub struct StaticOperations {
    pub products: Vec<Product>,
    pub orders: Vec<Order>,
    pub suppliers: Vec<Supplier>,
    pub supplier_queries: Vec<SupplierQuery>,
    pub staff: Vec<Staff>,
}

#[async_trait]
impl OperationsSource for StaticOperations {
    async fn products(&self) -> Result<Vec<Product>> {
        Ok(self.products.clone())
    }

    async fn find_orders(&self, order_numbers: &[String]) -> Result<Vec<Order>> {
        Ok(self
            .orders
            .iter()
            .filter(|order| order_numbers.contains(&order.order_number))
            .cloned()
            .collect())
    }

    async fn recent_orders(&self, limit: u32) -> Result<Vec<Order>> {
        let mut orders = self.orders.clone();
        orders.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        orders.truncate(limit as usize);
        Ok(orders)
    }

    async fn suppliers(&self) -> Result<Vec<Supplier>> {
        Ok(self.suppliers.clone())
    }

    async fn supplier(&self, id: &SupplierId) -> Result<Option<Supplier>> {
        Ok(self.suppliers.iter().find(|supplier| &supplier.id == id).cloned())
    }

    async fn pending_supplier_queries(&self) -> Result<Vec<SupplierQuery>> {
        Ok(self
            .supplier_queries
            .iter()
            .filter(|query| query.status == SupplierQueryStatus::Pending)
            .cloned()
            .collect())
    }

    async fn staff(&self) -> Result<Vec<Staff>> {
        Ok(self.staff.clone())
    }

    async fn snapshot(&self) -> Result<OperationsSnapshot> {
        Ok(OperationsSnapshot {
            orders: self.orders.clone(),
            products: self.products.clone(),
            staff: self.staff.clone(),
            supplier_queries: self.supplier_queries.clone(),
            taken_at: chrono::Utc::now(),
        })
    }
}
