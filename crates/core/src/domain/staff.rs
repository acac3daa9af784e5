use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

pub const DEFAULT_MAX_WORKLOAD: u32 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffId(pub String);

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        Self(format!("TASK-{}", &hex[..8]))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

impl FromStr for TaskStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "blocked" => Ok(Self::Blocked),
            other => Err(DomainError::UnknownVariant { kind: "task status", value: other.to_owned() }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffTask {
    pub id: TaskId,
    pub description: String,
    pub order_id: Option<String>,
    pub priority: u8,
    pub status: TaskStatus,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StaffTask {
    pub fn new(description: impl Into<String>, order_id: Option<String>, priority: u8) -> Self {
        Self {
            id: TaskId::generate(),
            description: description.into(),
            order_id,
            priority,
            status: TaskStatus::Pending,
            assigned_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: StaffId,
    pub name: String,
    pub role: String,
    pub phone: String,
    pub email: Option<String>,
    pub is_available: bool,
    pub current_workload: u32,
    pub max_workload: u32,
    pub skills: Vec<String>,
    pub tasks: Vec<StaffTask>,
    pub created_at: DateTime<Utc>,
}

impl Staff {
    pub fn has_capacity(&self) -> bool {
        self.is_available && self.current_workload < self.max_workload
    }

    pub fn is_at_capacity(&self) -> bool {
        self.current_workload >= self.max_workload
    }

    /// Percentage of `max_workload` in use, 0 when the member has no capacity configured.
    pub fn utilization(&self) -> f64 {
        if self.max_workload == 0 {
            return 0.0;
        }
        f64::from(self.current_workload) / f64::from(self.max_workload) * 100.0
    }

    pub fn assign(&mut self, task: StaffTask) {
        if task.status.is_open() {
            self.current_workload += 1;
        }
        self.tasks.push(task);
    }

    /// Moves a task to `next`, keeping `current_workload` equal to the number of open tasks
    /// this member was assigned through `assign`.
    pub fn set_task_status(
        &mut self,
        task_id: &TaskId,
        next: TaskStatus,
    ) -> Result<&StaffTask, DomainError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| &task.id == task_id)
            .ok_or_else(|| DomainError::NotFound { kind: "task", id: task_id.0.clone() })?;

        let was_open = task.status.is_open();
        task.status = next;
        match (was_open, next.is_open()) {
            (true, false) => {
                task.completed_at = Some(Utc::now());
                self.current_workload = self.current_workload.saturating_sub(1);
            }
            (false, true) => {
                task.completed_at = None;
                self.current_workload += 1;
            }
            _ => {}
        }

        Ok(task)
    }
}
