use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub String);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Pending,
    Engaged,
    Declined,
    Potential,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Engaged => "engaged",
            Self::Declined => "declined",
            Self::Potential => "potential",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Declined | Self::Potential)
    }

    pub fn can_transition_to(&self, next: LeadStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Engaged)
                | (Self::Pending, Self::Declined)
                | (Self::Engaged, Self::Declined)
                | (Self::Engaged, Self::Potential)
        )
    }
}

impl FromStr for LeadStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "engaged" => Ok(Self::Engaged),
            "declined" => Ok(Self::Declined),
            "potential" => Ok(Self::Potential),
            other => Err(DomainError::UnknownVariant { kind: "lead status", value: other.to_owned() }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub industry: String,
    pub role: Option<String>,
    pub status: LeadStatus,
    pub summary: Option<String>,
}

impl Lead {
    pub fn transition_to(&mut self, next: LeadStatus) -> Result<(), DomainError> {
        if self.status.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidLeadTransition { from: self.status, to: next })
    }
}

/// One entry of an uploaded lead list. `client_id` is the canonical key;
/// `lead_id` is accepted for lists exported by older tooling.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadList {
    #[serde(default)]
    pub clients: Vec<LeadRecord>,
}

impl LeadList {
    pub fn into_leads(self) -> Result<Vec<Lead>, DomainError> {
        if self.clients.is_empty() {
            return Err(DomainError::InvalidLeadList("lead list contains no clients".to_owned()));
        }

        let mut seen = HashSet::new();
        let mut leads = Vec::with_capacity(self.clients.len());
        for (position, record) in self.clients.into_iter().enumerate() {
            let lead = record.into_lead(position)?;
            if !seen.insert(lead.id.clone()) {
                return Err(DomainError::InvalidLeadList(format!(
                    "duplicate client_id `{}` at position {position}",
                    lead.id
                )));
            }
            leads.push(lead);
        }

        Ok(leads)
    }
}

impl LeadRecord {
    fn into_lead(self, position: usize) -> Result<Lead, DomainError> {
        let id = non_blank(self.client_id)
            .or_else(|| non_blank(self.lead_id))
            .ok_or_else(|| {
                DomainError::InvalidLeadList(format!("client at position {position} has no client_id"))
            })?;
        let name = non_blank(self.name).ok_or_else(|| {
            DomainError::InvalidLeadList(format!("client `{id}` at position {position} has no name"))
        })?;

        Ok(Lead {
            id: LeadId(id),
            name,
            email: self.email.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
            company: self.company.unwrap_or_default(),
            industry: self.industry.unwrap_or_default(),
            role: non_blank(self.role),
            status: LeadStatus::Pending,
            summary: None,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{LeadList, LeadRecord, LeadStatus};
    use crate::errors::DomainError;

    fn record(id: &str, name: &str) -> LeadRecord {
        LeadRecord {
            client_id: Some(id.to_owned()),
            name: Some(name.to_owned()),
            company: Some("Acme".to_owned()),
            ..LeadRecord::default()
        }
    }

    #[test]
    fn valid_list_produces_pending_leads() {
        let leads = LeadList { clients: vec![record("L-1", "Ada"), record("L-2", "Grace")] }
            .into_leads()
            .expect("valid list");

        assert_eq!(leads.len(), 2);
        assert!(leads.iter().all(|lead| lead.status == LeadStatus::Pending));
        assert_eq!(leads[1].company, "Acme");
    }

    #[test]
    fn lead_id_is_accepted_when_client_id_is_missing() {
        let leads = LeadList {
            clients: vec![LeadRecord {
                lead_id: Some("LEGACY-9".to_owned()),
                name: Some("Linus".to_owned()),
                ..LeadRecord::default()
            }],
        }
        .into_leads()
        .expect("legacy id");

        assert_eq!(leads[0].id.0, "LEGACY-9");
    }

    #[test]
    fn empty_list_is_rejected() {
        let error = LeadList::default().into_leads().expect_err("empty list");
        assert!(matches!(error, DomainError::InvalidLeadList(_)));
    }

    #[test]
    fn blank_name_is_rejected() {
        let error = LeadList { clients: vec![record("L-1", "   ")] }
            .into_leads()
            .expect_err("blank name");
        assert!(matches!(error, DomainError::InvalidLeadList(ref message) if message.contains("no name")));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let error = LeadList { clients: vec![record("L-1", "Ada"), record("L-1", "Bob")] }
            .into_leads()
            .expect_err("duplicate");
        assert!(matches!(error, DomainError::InvalidLeadList(ref message) if message.contains("duplicate")));
    }

    #[test]
    fn status_transitions_are_monotonic() {
        assert!(LeadStatus::Pending.can_transition_to(LeadStatus::Engaged));
        assert!(LeadStatus::Pending.can_transition_to(LeadStatus::Declined));
        assert!(LeadStatus::Engaged.can_transition_to(LeadStatus::Potential));
        assert!(!LeadStatus::Pending.can_transition_to(LeadStatus::Potential));
        assert!(!LeadStatus::Declined.can_transition_to(LeadStatus::Pending));
        assert!(!LeadStatus::Potential.can_transition_to(LeadStatus::Engaged));
    }

    #[test]
    fn list_deserializes_from_clients_document() {
        let list: LeadList = serde_json::from_str(
            r#"{"clients":[{"client_id":"C1","name":"Ada","email":"a@x.io","phone":"1","company":"X","industry":"Tech"}]}"#,
        )
        .expect("json");
        let leads = list.into_leads().expect("valid");
        assert_eq!(leads[0].email, "a@x.io");
        assert_eq!(leads[0].role, None);
    }
}
