use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use opsdesk_core::domain::activity::AgentActivity;
use opsdesk_core::domain::conversation::{
    Conversation, ConversationId, ConversationKind, ConversationMessage,
};
use opsdesk_core::domain::supplier::SupplierId;
use opsdesk_core::errors::{ApplicationError, DomainError};

use crate::handlers::{HandlerRegistry, HandlerRequest};
use crate::llm::LlmClient;
use crate::ops_data::{ActivityLog, ConversationStore, OperationsSource};
use crate::prompt::Prompt;
use crate::router::{Intent, Router};

const HANDLER_HISTORY_WINDOW: usize = 10;
const ACTIVITY_DETAIL_CHARS: usize = 120;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatRequest {
    pub conversation_id: Option<ConversationId>,
    pub message: String,
    pub kind: ConversationKind,
    pub supplier_id: Option<SupplierId>,
}

impl ChatRequest {
    pub fn consumer(conversation_id: Option<ConversationId>, message: impl Into<String>) -> Self {
        Self {
            conversation_id,
            message: message.into(),
            kind: ConversationKind::Consumer,
            supplier_id: None,
        }
    }

    pub fn supplier(
        supplier_id: SupplierId,
        conversation_id: Option<ConversationId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            message: message.into(),
            kind: ConversationKind::Supplier,
            supplier_id: Some(supplier_id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub conversation_id: ConversationId,
    pub intent: Intent,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("no handler registered for {0}")]
    NoHandler(Intent),
    #[error("language model call failed: {0}")]
    Llm(String),
    #[error("failed to load operations data: {0}")]
    Data(String),
    #[error("conversation store failed: {0}")]
    Store(String),
}

impl From<AgentError> for ApplicationError {
    fn from(error: AgentError) -> Self {
        match error {
            AgentError::EmptyMessage => ApplicationError::Domain(DomainError::InvariantViolation(
                "message must not be empty".to_string(),
            )),
            AgentError::NoHandler(intent) => {
                ApplicationError::Configuration(format!("no handler registered for {intent}"))
            }
            AgentError::Llm(message) => ApplicationError::Integration(message),
            AgentError::Data(message) | AgentError::Store(message) => {
                ApplicationError::Persistence(message)
            }
        }
    }
}

/// Routes chat turns to specialists and keeps the conversation log.
pub struct ChatRuntime {
    router: Router,
    handlers: HandlerRegistry,
    llm: Arc<dyn LlmClient>,
    ops: Arc<dyn OperationsSource>,
    store: Arc<dyn ConversationStore>,
    activity: Arc<dyn ActivityLog>,
}

impl ChatRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        ops: Arc<dyn OperationsSource>,
        store: Arc<dyn ConversationStore>,
        activity: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            router: Router::new(llm.clone()),
            handlers: HandlerRegistry::standard(),
            llm,
            ops,
            store,
            activity,
        }
    }

    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Handles one inbound message. Supplier conversations always go to the
    /// supplier handler; everything else is classified by the router first.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply, AgentError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AgentError::EmptyMessage);
        }

        let conversation_id = request.conversation_id.clone().unwrap_or_else(ConversationId::generate);
        let mut conversation = self
            .store
            .load(&conversation_id)
            .await
            .map_err(|error| AgentError::Store(format!("{error:#}")))?
            .unwrap_or_else(|| {
                let mut fresh = Conversation::new(conversation_id.clone(), request.kind);
                fresh.supplier_id = request.supplier_id.as_ref().map(|id| id.0.clone());
                fresh
            });

        let intent = match request.kind {
            ConversationKind::Supplier => Intent::Supplier,
            ConversationKind::Consumer => self
                .router
                .classify(message, &conversation.messages)
                .await
                .map_err(|error| AgentError::Llm(format!("{error:#}")))?,
        };

        let handler = self.handlers.get(intent).ok_or(AgentError::NoHandler(intent))?;
        let history = conversation.recent(HANDLER_HISTORY_WINDOW);
        let handler_request = HandlerRequest {
            message,
            history,
            kind: request.kind,
            supplier_id: request.supplier_id.as_ref(),
        };
        let context = handler
            .context(&handler_request, self.ops.as_ref())
            .await
            .map_err(|error| AgentError::Data(format!("{error:#}")))?;

        let prompt = Prompt::new(handler.instructions(), message)
            .with_context(context)
            .with_history(history)
            .render();

        let agent_name = format!("{intent}_agent");
        let response = match self.llm.complete(&prompt).await {
            Ok(response) => response,
            Err(error) => {
                let detail = format!("{error:#}");
                self.record(
                    AgentActivity::new(&agent_name, "respond", &detail)
                        .in_conversation(conversation_id.0.clone())
                        .failed(),
                )
                .await;
                return Err(AgentError::Llm(detail));
            }
        };

        let turn = [
            ConversationMessage::user(message),
            ConversationMessage::agent(response.clone()).with_agent(&agent_name),
        ];
        self.store
            .append(&conversation, &turn)
            .await
            .map_err(|error| AgentError::Store(format!("{error:#}")))?;
        for message in turn {
            conversation.append(message);
        }

        self.record(
            AgentActivity::new(&agent_name, "respond", preview(message, ACTIVITY_DETAIL_CHARS))
                .in_conversation(conversation_id.0.clone()),
        )
        .await;

        info!(
            event_name = "chat.responded",
            conversation_id = %conversation_id,
            intent = %intent,
            kind = request.kind.as_str(),
            messages = conversation.messages.len(),
            "chat turn handled"
        );

        Ok(ChatReply { response, conversation_id, intent })
    }

    async fn record(&self, activity: AgentActivity) {
        if let Err(error) = self.activity.record(&activity).await {
            warn!(
                event_name = "chat.activity_not_recorded",
                agent = %activity.agent_name,
                error = %error,
                "failed to record agent activity"
            );
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut preview: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        preview.push_str("...");
    }
    preview
}
