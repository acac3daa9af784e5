use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use opsdesk_core::domain::conversation::ConversationMessage;

use crate::llm::LlmClient;
use crate::prompt::Prompt;

/// Phrase every routing prompt carries; the offline client keys on it.
pub const ROUTING_MARKER: &str = "Respond with just the agent name, nothing else.";

const ROUTER_INSTRUCTIONS: &str = "You route messages for a small business that sells jewelry, kitchen appliances and makeup products.
Pick the specialist that should handle the latest message.

Available agents:
1. CUSTOMER_AGENT - product questions, browsing, prices, availability
2. ORDER_AGENT - placing orders, delivery details, order status and tracking
3. INVENTORY_AGENT - stock levels and low-stock items (internal)
4. SUPPLIER_AGENT - supplier communication and procurement (internal)
5. WORKLOAD_AGENT - task assignment and staff capacity (internal)
6. BOTTLENECK_AGENT - operational analysis and delays (internal)

Use the conversation so far for context.";

const HISTORY_WINDOW: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Customer,
    Order,
    Inventory,
    Supplier,
    Workload,
    Bottleneck,
}

impl Intent {
    pub const ALL: [Intent; 6] = [
        Self::Customer,
        Self::Order,
        Self::Inventory,
        Self::Supplier,
        Self::Workload,
        Self::Bottleneck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Order => "order",
            Self::Inventory => "inventory",
            Self::Supplier => "supplier",
            Self::Workload => "workload",
            Self::Bottleneck => "bottleneck",
        }
    }

    /// Label the router prompt asks the model to answer with.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER_AGENT",
            Self::Order => "ORDER_AGENT",
            Self::Inventory => "INVENTORY_AGENT",
            Self::Supplier => "SUPPLIER_AGENT",
            Self::Workload => "WORKLOAD_AGENT",
            Self::Bottleneck => "BOTTLENECK_AGENT",
        }
    }

    /// Reads a model answer. Tolerates surrounding whitespace, quotes and case.
    pub fn parse_label(raw: &str) -> Option<Self> {
        let cleaned = raw.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.');
        let upper = cleaned.to_ascii_uppercase();
        Self::ALL.into_iter().find(|intent| intent.label() == upper)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const KEYWORDS: &[(Intent, &[&str])] = &[
    (Intent::Bottleneck, &["bottleneck", "delay", "backlog", "slow down", "stuck"]),
    (Intent::Workload, &["staff", "workload", "assign", "capacity", "team"]),
    (Intent::Supplier, &["supplier", "procure", "restock", "vendor"]),
    (Intent::Inventory, &["inventory", "stock level", "low stock", "how many units"]),
    (Intent::Order, &["order", "buy", "purchase", "deliver", "track", "ord-"]),
];

/// Keyword classification; anything unmatched is a customer question.
pub fn keyword_intent(message: &str) -> Intent {
    let lowered = message.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|word| lowered.contains(word)))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::Customer)
}

pub struct Router {
    llm: Arc<dyn LlmClient>,
}

impl Router {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// One classification call over the message and the last few turns.
    /// Labels the model invents fall back to [`Intent::Customer`].
    pub async fn classify(&self, message: &str, history: &[ConversationMessage]) -> Result<Intent> {
        let window = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
        let prompt = Prompt::new(format!("{ROUTER_INSTRUCTIONS}\n\n{ROUTING_MARKER}"), message)
            .with_history(window)
            .render();

        let raw = self.llm.complete(&prompt).await?;
        match Intent::parse_label(&raw) {
            Some(intent) => {
                debug!(event_name = "router.classified", intent = %intent, "message routed");
                Ok(intent)
            }
            None => {
                warn!(
                    event_name = "router.unknown_label",
                    label = %raw.trim(),
                    "unrecognised routing label, using customer handler"
                );
                Ok(Intent::Customer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use opsdesk_core::domain::conversation::ConversationMessage;

    use super::{keyword_intent, Intent, Router};
    use crate::llm::ScriptedLlm;

    #[test]
    fn parse_label_tolerates_formatting_noise() {
        assert_eq!(Intent::parse_label(" order_agent\n"), Some(Intent::Order));
        assert_eq!(Intent::parse_label("\"BOTTLENECK_AGENT\"."), Some(Intent::Bottleneck));
        assert_eq!(Intent::parse_label("SALES_AGENT"), None);
    }

    #[test]
    fn keyword_intent_defaults_to_customer() {
        assert_eq!(keyword_intent("Do you have lipsticks?"), Intent::Customer);
        assert_eq!(keyword_intent("I want to buy the mixer"), Intent::Order);
        assert_eq!(keyword_intent("show low stock items"), Intent::Inventory);
        assert_eq!(keyword_intent("which staff is free to assign?"), Intent::Workload);
    }

    #[tokio::test]
    async fn classify_falls_back_to_customer_for_unknown_labels() {
        let llm = Arc::new(ScriptedLlm::new(["SALES_AGENT"]));
        let router = Router::new(llm);

        let intent = router.classify("hello", &[]).await.expect("classify");
        assert_eq!(intent, Intent::Customer);
    }

    #[tokio::test]
    async fn classify_sends_only_recent_history() {
        let llm = Arc::new(ScriptedLlm::new(["INVENTORY_AGENT"]));
        let router = Router::new(llm.clone());
        let history: Vec<_> =
            (0..8).map(|index| ConversationMessage::user(format!("turn-{index}"))).collect();

        let intent = router.classify("stock?", &history).await.expect("classify");
        assert_eq!(intent, Intent::Inventory);

        let prompt = &llm.prompts()[0];
        assert!(!prompt.contains("turn-2"));
        assert!(prompt.contains("turn-3") && prompt.contains("turn-7"));
    }

    #[tokio::test]
    async fn classify_propagates_llm_failures() {
        let llm = Arc::new(ScriptedLlm::default());
        llm.push_failure("timeout");
        let router = Router::new(llm);

        assert!(router.classify("hi", &[]).await.is_err());
    }
}
