//! Bridges the chat runtime's data traits onto the SQL repositories.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use opsdesk_agent::{ActivityLog, ConversationStore, OperationsSource};
use opsdesk_core::domain::activity::AgentActivity;
use opsdesk_core::domain::conversation::{Conversation, ConversationId, ConversationMessage};
use opsdesk_core::domain::order::Order;
use opsdesk_core::domain::product::Product;
use opsdesk_core::domain::staff::Staff;
use opsdesk_core::domain::supplier::{Supplier, SupplierId, SupplierQuery};
use opsdesk_core::ops::OperationsSnapshot;
use opsdesk_db::repositories::{
    ActivityRepository, ConversationRepository, OrderFilter, OrderRepository, ProductFilter,
    ProductRepository, StaffRepository, SupplierQueryRepository, SupplierRepository,
};

pub struct RepositoryOperations {
    pub products: Arc<dyn ProductRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub suppliers: Arc<dyn SupplierRepository>,
    pub supplier_queries: Arc<dyn SupplierQueryRepository>,
    pub staff: Arc<dyn StaffRepository>,
}

#[async_trait]
impl OperationsSource for RepositoryOperations {
    async fn products(&self) -> Result<Vec<Product>> {
        Ok(self.products.list(&ProductFilter::default()).await?)
    }

    async fn find_orders(&self, order_numbers: &[String]) -> Result<Vec<Order>> {
        let mut found = Vec::with_capacity(order_numbers.len());
        for number in order_numbers {
            if let Some(order) = self.orders.find_by_number(number).await? {
                found.push(order);
            }
        }
        Ok(found)
    }

    async fn recent_orders(&self, limit: u32) -> Result<Vec<Order>> {
        Ok(self.orders.list(&OrderFilter { limit, ..OrderFilter::default() }).await?)
    }

    async fn suppliers(&self) -> Result<Vec<Supplier>> {
        Ok(self.suppliers.list(false).await?)
    }

    async fn supplier(&self, id: &SupplierId) -> Result<Option<Supplier>> {
        Ok(self.suppliers.find_by_id(id).await?)
    }

    async fn pending_supplier_queries(&self) -> Result<Vec<SupplierQuery>> {
        Ok(self.supplier_queries.list_pending().await?)
    }

    async fn staff(&self) -> Result<Vec<Staff>> {
        Ok(self.staff.list().await?)
    }

    async fn snapshot(&self) -> Result<OperationsSnapshot> {
        Ok(OperationsSnapshot {
            orders: self.orders.list_all().await?,
            products: self.products.list(&ProductFilter::default()).await?,
            staff: self.staff.list().await?,
            supplier_queries: self.supplier_queries.list_pending().await?,
            taken_at: Utc::now(),
        })
    }
}

pub struct RepositoryConversationStore(pub Arc<dyn ConversationRepository>);

#[async_trait]
impl ConversationStore for RepositoryConversationStore {
    async fn load(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        Ok(self.0.find(id).await?)
    }

    async fn append(
        &self,
        conversation: &Conversation,
        messages: &[ConversationMessage],
    ) -> Result<()> {
        Ok(self.0.append(conversation, messages).await?)
    }
}

pub struct RepositoryActivityLog(pub Arc<dyn ActivityRepository>);

#[async_trait]
impl ActivityLog for RepositoryActivityLog {
    async fn record(&self, activity: &AgentActivity) -> Result<()> {
        Ok(self.0.record(activity).await?)
    }
}
