use std::sync::Arc;

use tera::Tera;
use tokio::sync::Mutex;

use opsdesk_agent::{ChatRuntime, LlmClient};
use opsdesk_core::config::AppConfig;
use opsdesk_core::outreach::{LeadSequencer, Qualifier};
use opsdesk_db::repositories::{
    ActivityRepository, BottleneckRepository, ConversationRepository, LeadRepository,
    OrderRepository, ProductRepository, SqlActivityRepository, SqlBottleneckRepository,
    SqlConversationRepository, SqlLeadRepository, SqlOrderRepository, SqlProductRepository,
    SqlStaffRepository, SqlSupplierQueryRepository, SqlSupplierRepository, StaffRepository,
    SupplierQueryRepository, SupplierRepository,
};
use opsdesk_db::DbPool;

use crate::adapters::{RepositoryActivityLog, RepositoryConversationStore, RepositoryOperations};
use crate::dashboard;

/// Shared handles for every route. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub products: Arc<dyn ProductRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub suppliers: Arc<dyn SupplierRepository>,
    pub supplier_queries: Arc<dyn SupplierQueryRepository>,
    pub staff: Arc<dyn StaffRepository>,
    pub bottlenecks: Arc<dyn BottleneckRepository>,
    pub activities: Arc<dyn ActivityRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub leads: Arc<dyn LeadRepository>,
    pub chat: Arc<ChatRuntime>,
    /// One outreach run per process; the lock is held across the qualifier call.
    pub sequencer: Arc<Mutex<LeadSequencer>>,
    pub qualifier: Arc<dyn Qualifier>,
    pub templates: Arc<Tera>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db_pool: &DbPool,
        llm: Arc<dyn LlmClient>,
        qualifier: Arc<dyn Qualifier>,
    ) -> Self {
        let products: Arc<dyn ProductRepository> =
            Arc::new(SqlProductRepository::new(db_pool.clone()));
        let orders: Arc<dyn OrderRepository> = Arc::new(SqlOrderRepository::new(db_pool.clone()));
        let suppliers: Arc<dyn SupplierRepository> =
            Arc::new(SqlSupplierRepository::new(db_pool.clone()));
        let supplier_queries: Arc<dyn SupplierQueryRepository> =
            Arc::new(SqlSupplierQueryRepository::new(db_pool.clone()));
        let staff: Arc<dyn StaffRepository> = Arc::new(SqlStaffRepository::new(db_pool.clone()));
        let activities: Arc<dyn ActivityRepository> =
            Arc::new(SqlActivityRepository::new(db_pool.clone()));
        let conversations: Arc<dyn ConversationRepository> =
            Arc::new(SqlConversationRepository::new(db_pool.clone()));

        let chat = ChatRuntime::new(
            llm,
            Arc::new(RepositoryOperations {
                products: products.clone(),
                orders: orders.clone(),
                suppliers: suppliers.clone(),
                supplier_queries: supplier_queries.clone(),
                staff: staff.clone(),
            }),
            Arc::new(RepositoryConversationStore(conversations.clone())),
            Arc::new(RepositoryActivityLog(activities.clone())),
        );

        let policy = config.outreach.policy();
        Self {
            bottlenecks: Arc::new(SqlBottleneckRepository::new(db_pool.clone())),
            leads: Arc::new(SqlLeadRepository::new(db_pool.clone())),
            config: Arc::new(config),
            products,
            orders,
            suppliers,
            supplier_queries,
            staff,
            activities,
            conversations,
            chat: Arc::new(chat),
            sequencer: Arc::new(Mutex::new(LeadSequencer::new(policy))),
            qualifier,
            templates: dashboard::templates(),
        }
    }
}
