/// Core domain type definitions
///
/// Users own projects, projects own snapshots, snapshots own tasks. Subscriptions
/// hang off users and mirror the billing state held by Stripe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// An authenticated user as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
}

/// A GitHub repository registered by a user
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Repository in `owner/name` form
    pub repo_name: String,
    /// Access token for private repositories; only its presence is ever serialized
    #[serde(rename = "has_github_token", serialize_with = "serialize_presence")]
    pub github_token: Option<String>,
    pub default_branch: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn serialize_presence<S: Serializer>(
    value: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_bool(value.is_some())
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub user_id: Uuid,
    pub repo_name: String,
    pub github_token: Option<String>,
    pub default_branch: Option<String>,
}

/// Partial project update. The outer `None` leaves a field untouched,
/// `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub repo_name: Option<String>,
    pub github_token: Option<Option<String>>,
    pub default_branch: Option<Option<String>>,
}

/// Markdown rendering of a repository at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub project_id: Uuid,
    pub branch: Option<String>,
    pub markdown: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub project_id: Uuid,
    pub branch: Option<String>,
    pub markdown: String,
}

/// Work item generated from a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub snapshot_id: Uuid,
    pub title: String,
    pub description: String,
    pub markdown: String,
    pub status: TaskStatus,
    /// Order within the snapshot, assigned at insertion
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub markdown: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub markdown: Option<String>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Subscription tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Team,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Team => "team",
        }
    }

    /// Maximum number of projects a user on this plan may own; None is unlimited
    pub fn project_limit(&self) -> Option<i64> {
        match self {
            Plan::Free => Some(3),
            Plan::Pro => Some(25),
            Plan::Team => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::Free)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            "team" => Ok(Plan::Team),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);

/// Local mirror of a user's Stripe subscription
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub user_id: Uuid,
    pub plan: Plan,
    /// Stripe subscription status ("active", "trialing", "past_due", "canceled", ...)
    pub status: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Paid plans only count while Stripe considers the subscription live
    pub fn effective_plan(&self) -> Plan {
        match self.status.as_str() {
            "active" | "trialing" => self.plan,
            _ => Plan::Free,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(plan: Plan, status: &str) -> Subscription {
        Subscription {
            user_id: Uuid::new_v4(),
            plan,
            status: status.to_string(),
            stripe_customer_id: None,
            stripe_subscription_id: None,
            current_period_end: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn effective_plan_requires_live_status() {
        assert_eq!(subscription(Plan::Pro, "active").effective_plan(), Plan::Pro);
        assert_eq!(subscription(Plan::Team, "trialing").effective_plan(), Plan::Team);
        assert_eq!(subscription(Plan::Pro, "past_due").effective_plan(), Plan::Free);
        assert_eq!(subscription(Plan::Pro, "canceled").effective_plan(), Plan::Free);
    }

    #[test]
    fn project_serialization_hides_token() {
        let project = Project {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            repo_name: "octo/repo".to_string(),
            github_token: Some("ghp_secret".to_string()),
            default_branch: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["has_github_token"], true);
        assert!(!json.to_string().contains("ghp_secret"));
    }

    #[test]
    fn status_and_plan_parse_from_storage_strings() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("team".parse::<Plan>().unwrap(), Plan::Team);
        assert!("enterprise".parse::<Plan>().is_err());
        assert_eq!(Plan::Free.project_limit(), Some(3));
        assert_eq!(Plan::Team.project_limit(), None);
    }
}
