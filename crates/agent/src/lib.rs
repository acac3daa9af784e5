//! Chat side of OpsDesk: an LLM-backed router that hands each inbound message
//! to one of six specialist handlers, plus the LLM qualifier used by lead outreach.
//!
//! # Flow
//!
//! 1. **Routing** (`router`) - classify the message into an [`Intent`]
//! 2. **Context** (`handlers`) - the matching handler reads current records
//!    through [`OperationsSource`] and formats them for the prompt
//! 3. **Reply** (`runtime`) - one completion call, then the turn is appended
//!    to the conversation store and an agent activity is recorded
//!
//! The model only writes prose. Stock, order state and bottleneck findings are
//! computed by `opsdesk-core` before the prompt is built.

pub mod handlers;
pub mod llm;
pub mod ops_data;
pub mod prompt;
pub mod qualifier;
pub mod router;
pub mod runtime;

pub use handlers::{Handler, HandlerRegistry, HandlerRequest};
pub use llm::{client_from_config, GeminiClient, LlmClient, OfflineLlm, ScriptedLlm};
pub use ops_data::{ActivityLog, ConversationStore, OperationsSource, StaticOperations};
pub use qualifier::LlmQualifier;
pub use router::{Intent, Router};
pub use runtime::{AgentError, ChatReply, ChatRequest, ChatRuntime};
