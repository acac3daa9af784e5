use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("conv_{}", &hex[..12]))
    }

    /// Stable id for a WhatsApp sender so repeat messages continue one thread.
    /// Accepts `whatsapp:+15550101`, `+15550101` or bare digits.
    pub fn for_whatsapp(sender: &str) -> Self {
        let number = sender.trim().trim_start_matches("whatsapp:");
        Self(format!("wa_{}", number.replace('+', "")))
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Agent,
    User,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::User => "user",
            Self::System => "system",
        }
    }
}

impl FromStr for MessageRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "agent" => Ok(Self::Agent),
            "user" => Ok(Self::User),
            "system" => Ok(Self::System),
            other => {
                Err(DomainError::UnknownVariant { kind: "message role", value: other.to_owned() })
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), agent: None, timestamp: Utc::now() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Agent, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Consumer,
    Supplier,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consumer => "consumer",
            Self::Supplier => "supplier",
        }
    }
}

impl FromStr for ConversationKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "consumer" => Ok(Self::Consumer),
            "supplier" => Ok(Self::Supplier),
            other => Err(DomainError::UnknownVariant {
                kind: "conversation kind",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub kind: ConversationKind,
    pub supplier_id: Option<String>,
    pub messages: Vec<ConversationMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, kind: ConversationKind) -> Self {
        let now = Utc::now();
        Self { id, kind, supplier_id: None, messages: Vec::new(), created_at: now, updated_at: now }
    }

    pub fn append(&mut self, message: ConversationMessage) {
        self.updated_at = message.timestamp;
        self.messages.push(message);
    }

    pub fn recent(&self, count: usize) -> &[ConversationMessage] {
        let start = self.messages.len().saturating_sub(count);
        &self.messages[start..]
    }
}

/// Listing row for the conversations overview; messages are not loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub kind: ConversationKind,
    pub supplier_id: Option<String>,
    pub message_count: usize,
    pub last_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{Conversation, ConversationId, ConversationKind, ConversationMessage};

    #[test]
    fn generated_ids_are_prefixed_and_short() {
        let id = ConversationId::generate();
        assert!(id.0.starts_with("conv_"));
        assert_eq!(id.0.len(), "conv_".len() + 12);
    }

    #[test]
    fn whatsapp_ids_strip_channel_prefix_and_plus() {
        assert_eq!(ConversationId::for_whatsapp("whatsapp:+15550101").0, "wa_15550101");
        assert_eq!(ConversationId::for_whatsapp("+44 20").0, "wa_44 20");
    }

    #[test]
    fn recent_returns_tail_window() {
        let mut conversation =
            Conversation::new(ConversationId("conv_test".to_owned()), ConversationKind::Consumer);
        for index in 0..7 {
            conversation.append(ConversationMessage::user(format!("m{index}")));
        }

        let recent = conversation.recent(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].content, "m2");
        assert_eq!(conversation.recent(50).len(), 7);
    }
}
