use opsdesk_core::domain::conversation::{ConversationMessage, MessageRole};

pub const INSTRUCTIONS_HEADER: &str = "### Instructions";
pub const CONTEXT_HEADER: &str = "### Context";
pub const CONVERSATION_HEADER: &str = "### Conversation";
pub const MESSAGE_HEADER: &str = "### Latest message";

/// Plain-text prompt with fixed section headers, so every backend (and the offline
/// stand-in) sees the same layout.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Prompt {
    pub instructions: String,
    pub context: Option<String>,
    pub history: Vec<(MessageRole, String)>,
    pub message: String,
}

impl Prompt {
    pub fn new(instructions: impl Into<String>, message: impl Into<String>) -> Self {
        Self { instructions: instructions.into(), message: message.into(), ..Self::default() }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_history(mut self, history: &[ConversationMessage]) -> Self {
        self.history =
            history.iter().map(|message| (message.role, message.content.clone())).collect();
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!("{INSTRUCTIONS_HEADER}\n{}\n", self.instructions.trim());

        if let Some(context) = &self.context {
            out.push_str(&format!("\n{CONTEXT_HEADER}\n{}\n", context.trim()));
        }

        if !self.history.is_empty() {
            out.push_str(&format!("\n{CONVERSATION_HEADER}\n"));
            for (role, content) in &self.history {
                out.push_str(&format!("{}: {}\n", speaker(*role), content.trim()));
            }
        }

        out.push_str(&format!("\n{MESSAGE_HEADER}\n{}\n", self.message.trim()));
        out
    }
}

fn speaker(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "User",
        MessageRole::Agent => "Assistant",
        MessageRole::System => "System",
    }
}

/// Returns the body of a `### ...` section from a rendered prompt.
pub fn section<'a>(rendered: &'a str, header: &str) -> Option<&'a str> {
    let start = rendered.find(header)? + header.len();
    let body = &rendered[start..];
    let end = body.find("\n### ").unwrap_or(body.len());
    Some(body[..end].trim())
}
