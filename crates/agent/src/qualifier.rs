use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use opsdesk_core::domain::conversation::MessageRole;
use opsdesk_core::outreach::{
    parse_tagged_reply, QualificationRequest, Qualifier, QualifierError, QualifierReply,
};

use crate::llm::LlmClient;

const DECISION_SIGNALS: &str = "Signs of a potential lead:
- asks questions about the product or service
- shows interest or curiosity
- wants pricing, features or details
- agrees to a demo or a follow-up call

Signs of a poor fit:
- short dismissive answers
- clearly not interested
- wrong person or industry
- no engagement";

/// Qualifier that asks the language model for the next outreach turn and reads
/// its `[QUALIFIED]` / `[NOT_QUALIFIED]` tag.
pub struct LlmQualifier {
    llm: Arc<dyn LlmClient>,
}

impl LlmQualifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Qualifier for LlmQualifier {
    async fn assess(
        &self,
        request: QualificationRequest<'_>,
    ) -> Result<QualifierReply, QualifierError> {
        let prompt = qualification_prompt(&request);
        let raw = self.llm.complete(&prompt).await.map_err(|error| {
            warn!(
                event_name = "outreach.qualifier_failed",
                lead_id = %request.lead.id.0,
                error = %error,
                "qualifier backend call failed"
            );
            QualifierError::Backend(error.to_string())
        })?;

        Ok(parse_tagged_reply(&raw))
    }
}

pub fn qualification_prompt(request: &QualificationRequest<'_>) -> String {
    let lead = request.lead;
    let mut prompt = format!(
        "You are a sales agent qualifying a prospect. What you sell: {}\n\n\
         You are talking to:\nName: {}\nCompany: {}\nIndustry: {}\nRole: {}\n\n\
         Client messages so far: {}\n\nConversation history:\n",
        request.sales_context.trim(),
        lead.name,
        lead.company,
        lead.industry,
        lead.role.as_deref().unwrap_or("N/A"),
        request.user_turns,
    );

    for message in request.transcript {
        let speaker = match message.role {
            MessageRole::Agent => "Agent",
            MessageRole::User => "Client",
            MessageRole::System => "System",
        };
        prompt.push_str(&format!("{speaker}: {}\n", message.content.trim()));
    }

    if request.must_decide {
        prompt.push_str(&format!(
            "\nThis is client message {}. Make a final decision now.\n\n{DECISION_SIGNALS}\n\n\
             Client's message: {}\n\n\
             Reply with a brief closing message that ends with either [QUALIFIED] or [NOT_QUALIFIED].\n\
             Your response:",
            request.user_turns,
            request.latest_reply.trim(),
        ));
    } else {
        prompt.push_str(&format!(
            "\nAsk ONE short qualifying question (1-2 sentences) to gauge their interest.\n\
             If they have already shown clear interest you may end with [QUALIFIED]; \
             if they are clearly not a fit end with [NOT_QUALIFIED].\n\n\
             Client's response: {}\n\nYour response:",
            request.latest_reply.trim(),
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use opsdesk_core::domain::conversation::ConversationMessage;
    use opsdesk_core::domain::lead::{Lead, LeadId, LeadStatus};
    use opsdesk_core::outreach::{QualificationRequest, Qualifier, QualifierError, Verdict};

    use super::{qualification_prompt, LlmQualifier};
    use crate::llm::ScriptedLlm;

    fn lead() -> Lead {
        Lead {
            id: LeadId("LEAD_002".to_string()),
            name: "Sarah Mitchell".to_string(),
            email: "sarah.mitchell@retailmax.com".to_string(),
            phone: "+1-555-0102".to_string(),
            company: "RetailMax Solutions".to_string(),
            industry: "Retail".to_string(),
            role: Some("VP of Operations".to_string()),
            status: LeadStatus::Engaged,
            summary: None,
        }
    }

    fn request<'a>(
        lead: &'a Lead,
        transcript: &'a [ConversationMessage],
        must_decide: bool,
    ) -> QualificationRequest<'a> {
        QualificationRequest {
            sales_context: "Inventory software for retail chains",
            lead,
            transcript,
            latest_reply: "How much does it cost?",
            user_turns: if must_decide { 3 } else { 1 },
            must_decide,
        }
    }

    #[test]
    fn prompt_forces_a_decision_when_required() {
        let lead = lead();
        let transcript = [ConversationMessage::agent("Hi"), ConversationMessage::user("CONTINUE")];

        let open = qualification_prompt(&request(&lead, &transcript, false));
        assert!(open.contains("Ask ONE short qualifying question"));
        assert!(open.contains("Client: CONTINUE"));

        let forced = qualification_prompt(&request(&lead, &transcript, true));
        assert!(forced.contains("Make a final decision now"));
        assert!(forced.contains("Role: VP of Operations"));
    }

    #[tokio::test]
    async fn assess_reads_verdict_tag() {
        let llm = Arc::new(ScriptedLlm::new([
            "Great, I'll have our team send pricing. [QUALIFIED]",
        ]));
        let qualifier = LlmQualifier::new(llm);
        let lead = lead();

        let reply = qualifier.assess(request(&lead, &[], true)).await.expect("assess");
        assert_eq!(reply.verdict, Verdict::Qualified);
        assert_eq!(reply.message, "Great, I'll have our team send pricing.");
    }

    #[tokio::test]
    async fn backend_errors_are_reported_not_swallowed() {
        let llm = Arc::new(ScriptedLlm::default());
        llm.push_failure("503 from upstream");
        let qualifier = LlmQualifier::new(llm);
        let lead = lead();

        let error = qualifier.assess(request(&lead, &[], false)).await.expect_err("fails");
        assert!(matches!(error, QualifierError::Backend(message) if message.contains("503")));
    }
}
