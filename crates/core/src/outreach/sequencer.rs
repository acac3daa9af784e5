use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::conversation::{ConversationMessage, MessageRole};
use crate::domain::lead::{Lead, LeadId, LeadList, LeadStatus};
use crate::errors::{ApplicationError, DomainError};
use crate::outreach::gate::{classify_reply, GateReply};
use crate::outreach::qualifier::{QualificationRequest, Qualifier, QualifierReply, Verdict};

pub const OPENING_MESSAGE: &str = "Hello! I'm reaching out to discuss an opportunity that might interest you.\n\nWould you like to continue this conversation or would you prefer I don't contact you further?\nPlease reply with 'CONTINUE' to proceed or 'STOP' to end this conversation.";

pub const FAREWELL_MESSAGE: &str = "Thank you for your time. Have a great day!";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerPolicy {
    /// User turn from which the qualifier is told to commit to a verdict.
    pub decision_turn: usize,
    /// User turn after which an undecided lead is declined.
    pub max_turns: usize,
}

impl Default for SequencerPolicy {
    fn default() -> Self {
        Self { decision_turn: 3, max_turns: 6 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    AwaitingGate,
    Engaged,
}

#[derive(Clone, Debug)]
struct ActiveLead {
    index: usize,
    phase: Phase,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotentialLead {
    pub id: LeadId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub industry: String,
    pub role: Option<String>,
    pub summary: String,
}

impl PotentialLead {
    fn from_lead(lead: &Lead, summary: String) -> Self {
        Self {
            id: lead.id.clone(),
            name: lead.name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            company: lead.company.clone(),
            industry: lead.industry.clone(),
            role: lead.role.clone(),
            summary,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StartOutcome {
    Started {
        lead: Lead,
        message: String,
        current_index: usize,
        total_leads: usize,
        resumed: bool,
    },
    Finished {
        qualified_count: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyOutcome {
    pub lead_id: LeadId,
    pub message: String,
    pub status: LeadStatus,
    pub stopped: bool,
    pub is_potential: bool,
    pub conversation_ended: bool,
    pub has_next: bool,
    pub all_done: bool,
    pub qualified_count: usize,
    pub user_turns: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipOutcome {
    pub skipped: Option<LeadId>,
    pub has_next: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerStatus {
    pub leads_loaded: usize,
    pub current_index: usize,
    pub context_set: bool,
    pub qualified_count: usize,
    pub active_lead: Option<LeadId>,
    pub finished: bool,
}

/// One outreach run: walks the loaded leads in order, one active conversation at a time.
///
/// All mutation goes through `&mut self`; callers that share a sequencer between tasks
/// serialize access themselves (the server keeps it behind a `tokio::sync::Mutex`).
#[derive(Clone, Debug, Default)]
pub struct LeadSequencer {
    policy: SequencerPolicy,
    sales_context: Option<String>,
    leads: Vec<Lead>,
    cursor: usize,
    active: Option<ActiveLead>,
    transcripts: HashMap<LeadId, Vec<ConversationMessage>>,
    potential: Vec<PotentialLead>,
}

impl LeadSequencer {
    pub fn new(policy: SequencerPolicy) -> Self {
        Self { policy, ..Self::default() }
    }

    pub fn policy(&self) -> SequencerPolicy {
        self.policy
    }

    pub fn sales_context(&self) -> Option<&str> {
        self.sales_context.as_deref()
    }

    pub fn leads(&self) -> &[Lead] {
        &self.leads
    }

    pub fn lead(&self, lead_id: &LeadId) -> Option<&Lead> {
        self.leads.iter().find(|lead| &lead.id == lead_id)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn transcript(&self, lead_id: &LeadId) -> Option<&[ConversationMessage]> {
        self.transcripts.get(lead_id).map(Vec::as_slice)
    }

    pub fn potential_leads(&self) -> &[PotentialLead] {
        &self.potential
    }

    pub fn qualified_count(&self) -> usize {
        self.potential.len()
    }

    pub fn active_lead(&self) -> Option<&Lead> {
        self.active.as_ref().and_then(|active| self.leads.get(active.index))
    }

    pub fn is_finished(&self) -> bool {
        !self.leads.is_empty() && self.cursor >= self.leads.len()
    }

    pub fn set_context(&mut self, text: &str) -> Result<(), DomainError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptySalesContext);
        }
        self.sales_context = Some(trimmed.to_owned());
        Ok(())
    }

    /// Replaces the lead list and restarts the run. Validation happens before any state is
    /// touched, so a rejected list leaves the previous run intact.
    pub fn load(&mut self, list: LeadList) -> Result<usize, DomainError> {
        let leads = list.into_leads()?;
        let count = leads.len();

        self.leads = leads;
        self.cursor = 0;
        self.active = None;
        self.transcripts.clear();
        self.potential.clear();
        Ok(count)
    }

    pub fn start_next(&mut self) -> Result<StartOutcome, DomainError> {
        if self.sales_context.is_none() {
            return Err(DomainError::ContextNotSet);
        }
        if self.leads.is_empty() {
            return Err(DomainError::NoLeadsLoaded);
        }
        if self.cursor >= self.leads.len() {
            return Ok(StartOutcome::Finished { qualified_count: self.qualified_count() });
        }

        if let Some(active) = &self.active {
            let lead = self.leads[active.index].clone();
            let message = self
                .transcripts
                .get(&lead.id)
                .and_then(|messages| {
                    messages.iter().rev().find(|message| message.role == MessageRole::Agent)
                })
                .map(|message| message.content.clone())
                .unwrap_or_else(|| OPENING_MESSAGE.to_owned());
            return Ok(StartOutcome::Started {
                lead,
                message,
                current_index: self.cursor,
                total_leads: self.leads.len(),
                resumed: true,
            });
        }

        let lead = self.leads[self.cursor].clone();
        self.transcripts.insert(lead.id.clone(), vec![ConversationMessage::agent(OPENING_MESSAGE)]);
        self.active = Some(ActiveLead { index: self.cursor, phase: Phase::AwaitingGate });

        Ok(StartOutcome::Started {
            lead,
            message: OPENING_MESSAGE.to_owned(),
            current_index: self.cursor,
            total_leads: self.leads.len(),
            resumed: false,
        })
    }

    /// Feeds the active lead's reply through the gate and, once engaged, the qualifier.
    ///
    /// A qualifier failure is returned as `ApplicationError::Integration` and leaves the
    /// transcript, statuses and cursor exactly as they were.
    pub async fn respond(
        &mut self,
        lead_id: &LeadId,
        message: &str,
        qualifier: &dyn Qualifier,
    ) -> Result<ReplyOutcome, ApplicationError> {
        let (index, phase) = match &self.active {
            Some(active) if self.leads[active.index].id == *lead_id => (active.index, active.phase),
            _ => return Err(DomainError::NoActiveLead { lead_id: lead_id.0.clone() }.into()),
        };

        let reply = classify_reply(message);
        let declines = match phase {
            Phase::AwaitingGate => reply != GateReply::Continue,
            Phase::Engaged => reply == GateReply::Stop,
        };
        if declines {
            return self.decline_with_farewell(index, message).map_err(ApplicationError::from);
        }

        let mut candidate = self.transcripts.get(lead_id).cloned().unwrap_or_default();
        candidate.push(ConversationMessage::user(message));
        let user_turns = count_user_turns(&candidate);

        let sales_context = self.sales_context.as_deref().unwrap_or_default();
        let lead = &self.leads[index];
        let QualifierReply { message: agent_message, verdict } = qualifier
            .assess(QualificationRequest {
                sales_context,
                lead,
                transcript: &candidate,
                latest_reply: message,
                user_turns,
                must_decide: user_turns >= self.policy.decision_turn,
            })
            .await
            .map_err(|error| ApplicationError::Integration(error.to_string()))?;

        let verdict = match verdict {
            Verdict::Undecided if user_turns >= self.policy.max_turns => Verdict::NotQualified,
            other => other,
        };

        if phase == Phase::AwaitingGate {
            self.leads[index].transition_to(LeadStatus::Engaged)?;
            if let Some(active) = self.active.as_mut() {
                active.phase = Phase::Engaged;
            }
        }

        candidate.push(ConversationMessage::agent(agent_message.clone()));
        self.transcripts.insert(lead_id.clone(), candidate);

        let (status, ended) = match verdict {
            Verdict::Qualified => {
                let summary = message.trim().to_owned();
                let lead = &mut self.leads[index];
                lead.transition_to(LeadStatus::Potential)?;
                lead.summary = Some(summary.clone());
                self.potential.push(PotentialLead::from_lead(lead, summary));
                (LeadStatus::Potential, true)
            }
            Verdict::NotQualified => {
                self.leads[index].transition_to(LeadStatus::Declined)?;
                (LeadStatus::Declined, true)
            }
            Verdict::Undecided => (LeadStatus::Engaged, false),
        };

        if ended {
            self.advance();
        }

        tracing::debug!(
            event_name = "outreach.reply.assessed",
            lead_id = %lead_id,
            user_turns,
            verdict = ?verdict,
            "lead reply assessed"
        );

        Ok(ReplyOutcome {
            lead_id: lead_id.clone(),
            message: agent_message,
            status,
            stopped: false,
            is_potential: status == LeadStatus::Potential,
            conversation_ended: ended,
            has_next: self.cursor < self.leads.len(),
            all_done: ended && self.cursor >= self.leads.len(),
            qualified_count: self.qualified_count(),
            user_turns,
        })
    }

    /// Declines the active lead, or the lead waiting at the cursor when none is active.
    pub fn skip(&mut self) -> Result<SkipOutcome, DomainError> {
        if self.cursor >= self.leads.len() {
            return Ok(SkipOutcome { skipped: None, has_next: false });
        }

        let index = self.active.as_ref().map(|active| active.index).unwrap_or(self.cursor);
        self.leads[index].transition_to(LeadStatus::Declined)?;
        let skipped = self.leads[index].id.clone();
        self.advance();

        Ok(SkipOutcome { skipped: Some(skipped), has_next: self.cursor < self.leads.len() })
    }

    pub fn status(&self) -> SequencerStatus {
        SequencerStatus {
            leads_loaded: self.leads.len(),
            current_index: self.cursor,
            context_set: self.sales_context.is_some(),
            qualified_count: self.qualified_count(),
            active_lead: self.active_lead().map(|lead| lead.id.clone()),
            finished: self.is_finished(),
        }
    }

    fn decline_with_farewell(
        &mut self,
        index: usize,
        message: &str,
    ) -> Result<ReplyOutcome, DomainError> {
        self.leads[index].transition_to(LeadStatus::Declined)?;
        let lead_id = self.leads[index].id.clone();

        let transcript = self.transcripts.entry(lead_id.clone()).or_default();
        transcript.push(ConversationMessage::user(message));
        transcript.push(ConversationMessage::agent(FAREWELL_MESSAGE));
        let user_turns = count_user_turns(transcript);

        self.advance();

        Ok(ReplyOutcome {
            lead_id,
            message: FAREWELL_MESSAGE.to_owned(),
            status: LeadStatus::Declined,
            stopped: true,
            is_potential: false,
            conversation_ended: true,
            has_next: self.cursor < self.leads.len(),
            all_done: self.cursor >= self.leads.len(),
            qualified_count: self.qualified_count(),
            user_turns,
        })
    }

    fn advance(&mut self) {
        self.active = None;
        self.cursor += 1;
    }
}

fn count_user_turns(messages: &[ConversationMessage]) -> usize {
    messages.iter().filter(|message| message.role == MessageRole::User).count()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::{LeadSequencer, SequencerPolicy, StartOutcome, FAREWELL_MESSAGE, OPENING_MESSAGE};
    use crate::domain::lead::{LeadId, LeadList, LeadRecord, LeadStatus};
    use crate::errors::{ApplicationError, DomainError};
    use crate::outreach::qualifier::{
        KeywordQualifier, QualificationRequest, Qualifier, QualifierError, QualifierReply, Verdict,
    };

    fn list(ids: &[&str]) -> LeadList {
        LeadList {
            clients: ids
                .iter()
                .map(|id| LeadRecord {
                    client_id: Some((*id).to_owned()),
                    name: Some(format!("Lead {id}")),
                    company: Some("Acme".to_owned()),
                    ..LeadRecord::default()
                })
                .collect(),
        }
    }

    fn ready(ids: &[&str]) -> LeadSequencer {
        let mut sequencer = LeadSequencer::default();
        sequencer.set_context("We sell inventory software to small retailers").expect("context");
        sequencer.load(list(ids)).expect("load");
        sequencer
    }

    fn id(value: &str) -> LeadId {
        LeadId(value.to_owned())
    }

    struct FailingQualifier;

    #[async_trait]
    impl Qualifier for FailingQualifier {
        async fn assess(
            &self,
            _request: QualificationRequest<'_>,
        ) -> Result<QualifierReply, QualifierError> {
            Err(QualifierError::Backend("model offline".to_owned()))
        }
    }

    struct CountingUndecided(AtomicUsize);

    #[async_trait]
    impl Qualifier for CountingUndecided {
        async fn assess(
            &self,
            request: QualificationRequest<'_>,
        ) -> Result<QualifierReply, QualifierError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(QualifierReply {
                message: format!("question {}", request.user_turns),
                verdict: Verdict::Undecided,
            })
        }
    }

    #[test]
    fn load_resets_cursor_and_statuses() {
        let mut sequencer = ready(&["A", "B"]);
        sequencer.start_next().expect("start");
        sequencer.skip().expect("skip");
        assert_eq!(sequencer.cursor(), 1);

        let count = sequencer.load(list(&["C", "D", "E"])).expect("reload");
        assert_eq!(count, 3);
        assert_eq!(sequencer.cursor(), 0);
        assert!(sequencer.leads().iter().all(|lead| lead.status == LeadStatus::Pending));
        assert!(sequencer.active_lead().is_none());
    }

    #[test]
    fn rejected_load_keeps_previous_state() {
        let mut sequencer = ready(&["A", "B"]);
        sequencer.start_next().expect("start");

        let error = sequencer.load(LeadList::default()).expect_err("empty list");
        assert!(matches!(error, DomainError::InvalidLeadList(_)));
        assert_eq!(sequencer.leads().len(), 2);
        assert_eq!(sequencer.active_lead().map(|lead| lead.id.clone()), Some(id("A")));
    }

    #[test]
    fn empty_context_is_rejected() {
        let mut sequencer = LeadSequencer::default();
        assert_eq!(sequencer.set_context("   "), Err(DomainError::EmptySalesContext));
        assert!(!sequencer.status().context_set);
    }

    #[test]
    fn start_requires_context_and_leads() {
        let mut sequencer = LeadSequencer::default();
        assert_eq!(sequencer.start_next(), Err(DomainError::ContextNotSet));

        sequencer.set_context("context").expect("context");
        assert_eq!(sequencer.start_next(), Err(DomainError::NoLeadsLoaded));
    }

    #[test]
    fn repeated_start_is_idempotent() {
        let mut sequencer = ready(&["A", "B"]);
        let first = sequencer.start_next().expect("first start");
        let second = sequencer.start_next().expect("second start");

        match (first, second) {
            (
                StartOutcome::Started { lead: first, message, resumed: false, .. },
                StartOutcome::Started { lead: second, message: again, resumed: true, .. },
            ) => {
                assert_eq!(first.id, second.id);
                assert_eq!(message, OPENING_MESSAGE);
                assert_eq!(again, OPENING_MESSAGE);
            }
            other => panic!("unexpected outcomes: {other:?}"),
        }
        assert_eq!(sequencer.cursor(), 0);
    }

    #[tokio::test]
    async fn two_lead_scenario_counts_one_qualified() {
        let mut sequencer = ready(&["A", "B"]);
        let qualifier = KeywordQualifier::default();

        sequencer.start_next().expect("start A");
        let stopped = sequencer.respond(&id("A"), "STOP", &qualifier).await.expect("stop A");
        assert!(stopped.stopped);
        assert_eq!(stopped.message, FAREWELL_MESSAGE);
        assert_eq!(sequencer.lead(&id("A")).map(|lead| lead.status), Some(LeadStatus::Declined));
        assert_eq!(sequencer.cursor(), 1);

        sequencer.start_next().expect("start B");
        let engaged =
            sequencer.respond(&id("B"), "CONTINUE", &qualifier).await.expect("continue B");
        assert_eq!(engaged.status, LeadStatus::Engaged);
        assert!(!engaged.conversation_ended);

        let qualified = sequencer
            .respond(&id("B"), "Yes, please send pricing and book a demo", &qualifier)
            .await
            .expect("qualify B");
        assert!(qualified.is_potential);
        assert!(qualified.all_done);
        assert_eq!(sequencer.cursor(), 2);

        match sequencer.start_next().expect("finish") {
            StartOutcome::Finished { qualified_count } => assert_eq!(qualified_count, 1),
            other => panic!("expected finished, got {other:?}"),
        }
        let potential = sequencer
            .leads()
            .iter()
            .filter(|lead| lead.status == LeadStatus::Potential)
            .count();
        assert_eq!(potential, sequencer.qualified_count());
        assert_eq!(
            sequencer.potential_leads()[0].summary,
            "Yes, please send pricing and book a demo"
        );
    }

    #[tokio::test]
    async fn respond_to_never_activated_lead_is_rejected() {
        let mut sequencer = ready(&["A", "B"]);
        sequencer.start_next().expect("start A");
        let before = sequencer.status();

        let error = sequencer
            .respond(&id("B"), "CONTINUE", &KeywordQualifier::default())
            .await
            .expect_err("B is not active");

        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::NoActiveLead { ref lead_id }) if lead_id == "B"
        ));
        assert_eq!(sequencer.status(), before);
        assert_eq!(sequencer.transcript(&id("A")).map(<[_]>::len), Some(1));
    }

    #[tokio::test]
    async fn terminal_lead_cannot_be_messaged() {
        let mut sequencer = ready(&["A", "B"]);
        let qualifier = KeywordQualifier::default();
        sequencer.start_next().expect("start");
        sequencer.respond(&id("A"), "stop", &qualifier).await.expect("stop");

        let error = sequencer.respond(&id("A"), "CONTINUE", &qualifier).await.expect_err("done");
        assert!(matches!(error, ApplicationError::Domain(DomainError::NoActiveLead { .. })));
    }

    #[tokio::test]
    async fn non_continue_gate_reply_declines() {
        let mut sequencer = ready(&["A"]);
        sequencer.start_next().expect("start");
        let outcome = sequencer
            .respond(&id("A"), "who is this?", &KeywordQualifier::default())
            .await
            .expect("gate");

        assert!(outcome.stopped);
        assert!(outcome.all_done);
        assert_eq!(outcome.status, LeadStatus::Declined);
    }

    #[tokio::test]
    async fn qualifier_failure_leaves_state_untouched() {
        let mut sequencer = ready(&["A"]);
        sequencer.start_next().expect("start");
        let before = sequencer.status();

        let error = sequencer
            .respond(&id("A"), "CONTINUE", &FailingQualifier)
            .await
            .expect_err("backend down");

        assert!(matches!(error, ApplicationError::Integration(ref message) if message.contains("model offline")));
        assert_eq!(sequencer.status(), before);
        assert_eq!(sequencer.lead(&id("A")).map(|lead| lead.status), Some(LeadStatus::Pending));
        assert_eq!(sequencer.transcript(&id("A")).map(<[_]>::len), Some(1));
    }

    #[tokio::test]
    async fn undecided_conversation_is_capped() {
        let mut sequencer = LeadSequencer::new(SequencerPolicy { decision_turn: 2, max_turns: 3 });
        sequencer.set_context("context").expect("context");
        sequencer.load(list(&["A"])).expect("load");
        sequencer.start_next().expect("start");
        let qualifier = CountingUndecided(AtomicUsize::new(0));

        let first = sequencer.respond(&id("A"), "CONTINUE", &qualifier).await.expect("turn 1");
        assert!(!first.conversation_ended);
        let second = sequencer.respond(&id("A"), "hmm", &qualifier).await.expect("turn 2");
        assert!(!second.conversation_ended);
        let third = sequencer.respond(&id("A"), "maybe", &qualifier).await.expect("turn 3");

        assert!(third.conversation_ended);
        assert_eq!(third.status, LeadStatus::Declined);
        assert_eq!(qualifier.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stop_during_engagement_declines_and_advances() {
        let mut sequencer = ready(&["A", "B"]);
        let qualifier = KeywordQualifier::default();
        sequencer.start_next().expect("start");
        sequencer.respond(&id("A"), "continue", &qualifier).await.expect("continue");

        let outcome = sequencer.respond(&id("A"), "please stop", &qualifier).await.expect("stop");
        assert!(outcome.stopped);
        assert!(outcome.has_next);
        assert_eq!(sequencer.cursor(), 1);
    }

    #[test]
    fn skip_declines_and_advances_until_exhausted() {
        let mut sequencer = ready(&["A", "B"]);
        sequencer.start_next().expect("start");

        let first = sequencer.skip().expect("skip active");
        assert_eq!(first.skipped, Some(id("A")));
        assert!(first.has_next);

        let second = sequencer.skip().expect("skip at cursor");
        assert_eq!(second.skipped, Some(id("B")));
        assert!(!second.has_next);

        let third = sequencer.skip().expect("nothing left");
        assert_eq!(third.skipped, None);
        assert!(sequencer.leads().iter().all(|lead| lead.status == LeadStatus::Declined));
        assert!(sequencer.status().finished);
    }
}
