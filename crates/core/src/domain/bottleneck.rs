use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleneckType {
    InventoryShortage,
    WorkloadImbalance,
    SupplierDelay,
    OrderBacklog,
    StaffUnavailable,
}

impl BottleneckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InventoryShortage => "inventory_shortage",
            Self::WorkloadImbalance => "workload_imbalance",
            Self::SupplierDelay => "supplier_delay",
            Self::OrderBacklog => "order_backlog",
            Self::StaffUnavailable => "staff_unavailable",
        }
    }
}

impl FromStr for BottleneckType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "inventory_shortage" => Ok(Self::InventoryShortage),
            "workload_imbalance" => Ok(Self::WorkloadImbalance),
            "supplier_delay" => Ok(Self::SupplierDelay),
            "order_backlog" => Ok(Self::OrderBacklog),
            "staff_unavailable" => Ok(Self::StaffUnavailable),
            other => {
                Err(DomainError::UnknownVariant { kind: "bottleneck type", value: other.to_owned() })
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleneckSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BottleneckSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for BottleneckSeverity {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(DomainError::UnknownVariant {
                kind: "bottleneck severity",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub id: String,
    pub kind: BottleneckType,
    pub severity: BottleneckSeverity,
    pub title: String,
    pub description: String,
    pub affected_resources: Vec<String>,
    pub suggested_actions: Vec<String>,
    pub is_resolved: bool,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Bottleneck {
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        if !self.is_resolved {
            self.is_resolved = true;
            self.resolved_at = Some(at);
        }
    }
}
