use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::conversation::ConversationMessage;
use crate::domain::lead::Lead;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Qualified,
    NotQualified,
    Undecided,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifierReply {
    pub message: String,
    pub verdict: Verdict,
}

/// Everything a qualifier may look at when producing the next agent turn.
/// `transcript` already ends with the lead's latest reply.
#[derive(Clone, Copy, Debug)]
pub struct QualificationRequest<'a> {
    pub sales_context: &'a str,
    pub lead: &'a Lead,
    pub transcript: &'a [ConversationMessage],
    pub latest_reply: &'a str,
    pub user_turns: usize,
    pub must_decide: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QualifierError {
    #[error("qualifier backend failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Qualifier: Send + Sync {
    async fn assess(
        &self,
        request: QualificationRequest<'_>,
    ) -> Result<QualifierReply, QualifierError>;
}

const QUALIFIED_TAGS: [&str; 2] = ["[QUALIFIED]", "[POTENTIAL_YES]"];
const NOT_QUALIFIED_TAGS: [&str; 2] = ["[NOT_QUALIFIED]", "[POTENTIAL_NO]"];

/// Reads a verdict tag out of model output and strips every tag from the visible reply.
pub fn parse_tagged_reply(raw: &str) -> QualifierReply {
    let verdict = if NOT_QUALIFIED_TAGS.iter().any(|tag| raw.contains(tag)) {
        Verdict::NotQualified
    } else if QUALIFIED_TAGS.iter().any(|tag| raw.contains(tag)) {
        Verdict::Qualified
    } else {
        Verdict::Undecided
    };

    let mut message = raw.to_owned();
    for tag in QUALIFIED_TAGS.iter().chain(NOT_QUALIFIED_TAGS.iter()) {
        message = message.replace(tag, "");
    }

    QualifierReply { message: message.trim().to_owned(), verdict }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordQualifierConfig {
    pub interest_keywords: Vec<String>,
    pub rejection_keywords: Vec<String>,
    pub follow_up_questions: Vec<String>,
}

impl Default for KeywordQualifierConfig {
    fn default() -> Self {
        Self {
            interest_keywords: vec![
                "interested".to_string(),
                "pricing".to_string(),
                "price".to_string(),
                "demo".to_string(),
                "features".to_string(),
                "tell me more".to_string(),
                "how much".to_string(),
                "sounds good".to_string(),
                "follow up".to_string(),
                "call me".to_string(),
            ],
            rejection_keywords: vec![
                "not interested".to_string(),
                "no budget".to_string(),
                "no thanks".to_string(),
                "not now".to_string(),
                "wrong person".to_string(),
                "unsubscribe".to_string(),
                "don't contact".to_string(),
            ],
            follow_up_questions: vec![
                "Thanks for continuing! What is the biggest operational challenge your team is facing right now?".to_string(),
                "Got it. Is improving that something you are planning to invest in this quarter?".to_string(),
                "Would a short demo or a pricing overview be useful for you?".to_string(),
            ],
        }
    }
}

/// Deterministic qualifier used when no language model is configured.
#[derive(Clone, Debug, Default)]
pub struct KeywordQualifier {
    config: KeywordQualifierConfig,
}

impl KeywordQualifier {
    pub fn new(config: KeywordQualifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KeywordQualifierConfig {
        &self.config
    }

    pub fn evaluate(&self, request: &QualificationRequest<'_>) -> QualifierReply {
        let normalized = request.latest_reply.to_ascii_lowercase();

        // Rejections are checked first so "not interested" never reads as "interested".
        if self.matches(&self.config.rejection_keywords, &normalized) {
            return QualifierReply {
                message: "I understand this isn't a priority for you right now. Thank you for your time!"
                    .to_string(),
                verdict: Verdict::NotQualified,
            };
        }

        if self.matches(&self.config.interest_keywords, &normalized) {
            return QualifierReply {
                message: format!(
                    "Thank you for your interest, {}! I'll have our team reach out with more details.",
                    request.lead.name
                ),
                verdict: Verdict::Qualified,
            };
        }

        if request.must_decide {
            return QualifierReply {
                message: "Thanks for the chat. It sounds like the timing isn't right, so I won't take more of your time."
                    .to_string(),
                verdict: Verdict::NotQualified,
            };
        }

        let index = request.user_turns.saturating_sub(1);
        let question = self
            .config
            .follow_up_questions
            .get(index)
            .or_else(|| self.config.follow_up_questions.last())
            .cloned()
            .unwrap_or_else(|| "Could you tell me a bit more about your needs?".to_string());

        QualifierReply { message: question, verdict: Verdict::Undecided }
    }

    fn matches(&self, keywords: &[String], normalized: &str) -> bool {
        keywords.iter().any(|keyword| normalized.contains(keyword.as_str()))
    }
}

#[async_trait]
impl Qualifier for KeywordQualifier {
    async fn assess(
        &self,
        request: QualificationRequest<'_>,
    ) -> Result<QualifierReply, QualifierError> {
        Ok(self.evaluate(&request))
    }
}
