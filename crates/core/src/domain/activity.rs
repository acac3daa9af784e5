use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit trail entry written whenever an agent acts on behalf of a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentActivity {
    pub agent_name: String,
    pub action: String,
    pub details: String,
    pub conversation_id: Option<String>,
    pub order_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

impl AgentActivity {
    pub fn new(
        agent_name: impl Into<String>,
        action: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            action: action.into(),
            details: details.into(),
            conversation_id: None,
            order_id: None,
            timestamp: Utc::now(),
            success: true,
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn for_order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}
