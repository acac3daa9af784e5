use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::bottleneck::{Bottleneck, BottleneckSeverity, BottleneckType};
use crate::domain::supplier::SupplierQueryStatus;
use crate::ops::snapshot::{team_utilization, OperationsSnapshot};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BottleneckThresholds {
    pub stale_after_hours: i64,
    pub stale_backlog: usize,
    pub critical_stale_backlog: usize,
    pub open_backlog: usize,
    pub low_stock_items: usize,
    pub high_out_of_stock: usize,
    pub utilization_alert_pct: f64,
    pub utilization_high_pct: f64,
    pub supplier_stale_hours: i64,
}

impl Default for BottleneckThresholds {
    fn default() -> Self {
        Self {
            stale_after_hours: 24,
            stale_backlog: 5,
            critical_stale_backlog: 10,
            open_backlog: 20,
            low_stock_items: 5,
            high_out_of_stock: 3,
            utilization_alert_pct: 85.0,
            utilization_high_pct: 95.0,
            supplier_stale_hours: 24,
        }
    }
}

/// A detected problem before it is persisted as a [`Bottleneck`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BottleneckFinding {
    pub kind: BottleneckType,
    pub severity: BottleneckSeverity,
    pub title: String,
    pub description: String,
    pub affected_resources: Vec<String>,
    pub suggested_actions: Vec<String>,
}

impl BottleneckFinding {
    pub fn into_bottleneck(self, id: impl Into<String>, detected_at: DateTime<Utc>) -> Bottleneck {
        Bottleneck {
            id: id.into(),
            kind: self.kind,
            severity: self.severity,
            title: self.title,
            description: self.description,
            affected_resources: self.affected_resources,
            suggested_actions: self.suggested_actions,
            is_resolved: false,
            detected_at,
            resolved_at: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BottleneckDetector {
    thresholds: BottleneckThresholds,
}

impl BottleneckDetector {
    pub fn new(thresholds: BottleneckThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &BottleneckThresholds {
        &self.thresholds
    }

    pub fn analyze(&self, snapshot: &OperationsSnapshot) -> Vec<BottleneckFinding> {
        [
            self.order_backlog(snapshot),
            self.inventory_shortage(snapshot),
            self.workload_imbalance(snapshot),
            self.supplier_delays(snapshot),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn order_backlog(&self, snapshot: &OperationsSnapshot) -> Option<BottleneckFinding> {
        let cutoff = snapshot.taken_at - Duration::hours(self.thresholds.stale_after_hours);
        let open: Vec<_> = snapshot.orders.iter().filter(|order| order.status.is_open()).collect();
        let stale = open.iter().filter(|order| order.created_at < cutoff).count();

        if stale <= self.thresholds.stale_backlog && open.len() <= self.thresholds.open_backlog {
            return None;
        }

        let severity = if stale > self.thresholds.critical_stale_backlog {
            BottleneckSeverity::Critical
        } else {
            BottleneckSeverity::High
        };

        Some(BottleneckFinding {
            kind: BottleneckType::OrderBacklog,
            severity,
            title: "Order Backlog Building Up".to_string(),
            description: format!(
                "{} pending orders, {stale} are older than {} hours",
                open.len(),
                self.thresholds.stale_after_hours
            ),
            affected_resources: vec![format!("{} orders", open.len())],
            suggested_actions: vec![
                "Prioritize processing oldest orders first".to_string(),
                "Assign additional staff to order processing".to_string(),
                "Consider overtime or temporary help".to_string(),
            ],
        })
    }

    fn inventory_shortage(&self, snapshot: &OperationsSnapshot) -> Option<BottleneckFinding> {
        let out_of_stock = snapshot.products.iter().filter(|product| product.is_out_of_stock()).count();
        let low_stock = snapshot
            .products
            .iter()
            .filter(|product| !product.is_out_of_stock() && product.is_low_stock())
            .count();

        if out_of_stock == 0 && low_stock <= self.thresholds.low_stock_items {
            return None;
        }

        let severity = if out_of_stock > self.thresholds.high_out_of_stock {
            BottleneckSeverity::High
        } else {
            BottleneckSeverity::Medium
        };

        Some(BottleneckFinding {
            kind: BottleneckType::InventoryShortage,
            severity,
            title: "Inventory Running Low".to_string(),
            description: format!(
                "{out_of_stock} products out of stock, {low_stock} at low stock levels"
            ),
            affected_resources: vec![format!("{} products", out_of_stock + low_stock)],
            suggested_actions: vec![
                "Contact suppliers for restocking".to_string(),
                "Review sales forecasts".to_string(),
                "Consider expedited shipping for critical items".to_string(),
            ],
        })
    }

    fn workload_imbalance(&self, snapshot: &OperationsSnapshot) -> Option<BottleneckFinding> {
        if snapshot.staff.is_empty() {
            return None;
        }

        let utilization = team_utilization(&snapshot.staff);
        let overloaded: Vec<String> = snapshot
            .staff
            .iter()
            .filter(|member| member.is_at_capacity())
            .map(|member| member.name.clone())
            .collect();

        if utilization <= self.thresholds.utilization_alert_pct
            && overloaded.len() <= snapshot.staff.len() / 2
        {
            return None;
        }

        let severity = if utilization > self.thresholds.utilization_high_pct {
            BottleneckSeverity::High
        } else {
            BottleneckSeverity::Medium
        };
        let at_max = overloaded.len();

        Some(BottleneckFinding {
            kind: BottleneckType::WorkloadImbalance,
            severity,
            title: "Staff Capacity Stretched".to_string(),
            description: format!(
                "Team at {utilization:.0}% capacity. {at_max} staff at maximum workload."
            ),
            affected_resources: if overloaded.is_empty() { vec!["Team".to_string()] } else { overloaded },
            suggested_actions: vec![
                "Rebalance tasks across team".to_string(),
                "Postpone non-urgent tasks".to_string(),
                "Consider temporary assistance".to_string(),
            ],
        })
    }

    fn supplier_delays(&self, snapshot: &OperationsSnapshot) -> Option<BottleneckFinding> {
        let cutoff = snapshot.taken_at - Duration::hours(self.thresholds.supplier_stale_hours);
        let stale = snapshot
            .supplier_queries
            .iter()
            .filter(|query| query.status == SupplierQueryStatus::Pending && query.created_at < cutoff)
            .count();

        if stale == 0 {
            return None;
        }

        Some(BottleneckFinding {
            kind: BottleneckType::SupplierDelay,
            severity: BottleneckSeverity::High,
            title: "Supplier Response Delays".to_string(),
            description: format!(
                "{stale} supplier queries awaiting response for over {} hours",
                self.thresholds.supplier_stale_hours
            ),
            affected_resources: vec![format!("{stale} pending queries")],
            suggested_actions: vec![
                "Follow up with suppliers".to_string(),
                "Consider alternative suppliers".to_string(),
                "Update affected customer orders".to_string(),
            ],
        })
    }
}

/// Drops findings whose type already has an unresolved bottleneck on record.
pub fn unrecorded_findings(
    findings: Vec<BottleneckFinding>,
    active: &[Bottleneck],
) -> Vec<BottleneckFinding> {
    findings
        .into_iter()
        .filter(|finding| {
            !active.iter().any(|existing| !existing.is_resolved && existing.kind == finding.kind)
        })
        .collect()
}

pub fn format_findings(findings: &[BottleneckFinding]) -> String {
    if findings.is_empty() {
        return "No operational bottlenecks detected. Operations running smoothly.".to_string();
    }

    let mut lines = vec!["Operational Bottlenecks Detected:".to_string(), String::new()];
    for (position, finding) in findings.iter().enumerate() {
        lines.push(format!(
            "{}. [{}] {}",
            position + 1,
            finding.severity.as_str().to_ascii_uppercase(),
            finding.title
        ));
        lines.push(format!("   {}", finding.description));
        let suggestion =
            finding.suggested_actions.first().map(String::as_str).unwrap_or("No suggestions");
        lines.push(format!("   Suggested: {suggestion}"));
        lines.push(String::new());
    }
    lines.join("\n")
}
