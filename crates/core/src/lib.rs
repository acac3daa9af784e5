pub mod config;
pub mod domain;
pub mod errors;
pub mod ops;
pub mod outreach;

pub use domain::conversation::{
    Conversation, ConversationId, ConversationKind, ConversationMessage, MessageRole,
};
pub use domain::lead::{Lead, LeadId, LeadList, LeadRecord, LeadStatus};
pub use domain::order::{Order, OrderId, OrderStatus};
pub use domain::product::{Product, ProductCategory, ProductId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use outreach::{LeadSequencer, Qualifier, SequencerPolicy};
