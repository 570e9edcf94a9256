//! Data models for Pitwall
//!
//! Defines the domain collections carried inside the shared snapshot:
//! team members, tasks, finances, sponsors, news and simulation results.
//! The sync layer treats all of these as an opaque payload; only the
//! snapshot version participates in conflict resolution.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role a participant plays in the sync protocol
///
/// The Manager context acts as the Hub; everyone else follows as a Node.
/// Nothing enforces uniqueness of the Manager role at the protocol level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Member,
}

/// Attribution of the last store mutation (informational only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    /// Identifier of the mutator (member id or instance id)
    pub id: String,
    /// Display name
    pub name: String,
}

impl Attribution {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A member of the team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: Uuid,
    pub name: String,
    /// Free-form role label ("Aerodynamics", "Finance lead", ...)
    pub role: String,
}

impl TeamMember {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role: role.into(),
        }
    }
}

/// Lifecycle of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Done,
}

/// A task, optionally carrying a bounty that members can claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    /// Bounty in points, if the task is up for claiming
    pub bounty: Option<u32>,
    /// Display name of the member the task is assigned to
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new open task
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            status: TaskStatus::Open,
            bounty: None,
            assigned_to: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a bounty
    pub fn with_bounty(mut self, points: u32) -> Self {
        self.bounty = Some(points);
        self
    }

    /// Assign the task and mark it in progress
    pub fn claim(&mut self, claimed_by: impl Into<String>) {
        self.assigned_to = Some(claimed_by.into());
        self.status = TaskStatus::InProgress;
        self.updated_at = Utc::now();
    }

    /// Mark the task done
    pub fn complete(&mut self) {
        self.status = TaskStatus::Done;
        self.updated_at = Utc::now();
    }
}

/// A finance ledger entry; negative amounts are expenses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub description: String,
    pub amount_cents: i64,
    pub date: NaiveDate,
}

impl Transaction {
    pub fn new(description: impl Into<String>, amount_cents: i64, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            amount_cents,
            date,
        }
    }
}

/// A sponsor and their contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sponsor {
    pub id: Uuid,
    pub name: String,
    /// Sponsorship tier label ("Gold", "Silver", ...)
    pub tier: String,
    pub amount_cents: i64,
}

impl Sponsor {
    pub fn new(name: impl Into<String>, tier: impl Into<String>, amount_cents: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tier: tier.into(),
            amount_cents,
        }
    }
}

/// A news post shown on the team dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsPost {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub published_at: DateTime<Utc>,
}

impl NewsPost {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            body: body.into(),
            published_at: Utc::now(),
        }
    }
}

/// One aero simulation run result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimResult {
    pub id: Uuid,
    /// Label of the car/wing configuration that was simulated
    pub label: String,
    pub drag_coefficient: f64,
    pub downforce_n: f64,
    pub recorded_at: DateTime<Utc>,
}

impl SimResult {
    pub fn new(label: impl Into<String>, drag_coefficient: f64, downforce_n: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            drag_coefficient,
            downforce_n,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_open() {
        let task = Task::new("Build front wing mold");
        assert_eq!(task.status, TaskStatus::Open);
        assert!(task.bounty.is_none());
        assert!(task.assigned_to.is_none());
    }

    #[test]
    fn test_claim_task() {
        let mut task = Task::new("CFD mesh cleanup").with_bounty(50);
        task.claim("Jo");

        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.assigned_to.as_deref(), Some("Jo"));
        assert_eq!(task.bounty, Some(50));
    }

    #[test]
    fn test_complete_task_updates_timestamp() {
        let mut task = Task::new("Order carbon sheets");
        let created = task.updated_at;
        task.complete();

        assert_eq!(task.status, TaskStatus::Done);
        assert!(task.updated_at >= created);
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Manager).unwrap(), "\"manager\"");
        assert_eq!(serde_json::to_string(&Role::Member).unwrap(), "\"member\"");
    }

    #[test]
    fn test_task_roundtrip() {
        let task = Task::new("Wind tunnel slot booking").with_bounty(25);
        let json = serde_json::to_string(&task).unwrap();
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, task);
    }
}
