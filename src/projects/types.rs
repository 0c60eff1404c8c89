// src/projects/types.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub status: ProjectStatus,
    /// Derived: min baseline-start over live tasks.
    pub start_date: Option<NaiveDate>,
    /// Derived: max baseline-end over live tasks.
    pub end_date: Option<NaiveDate>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Draft,
    Active,
    Closed,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Draft => write!(f, "draft"),
            ProjectStatus::Active => write!(f, "active"),
            ProjectStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ProjectStatus::Draft),
            "active" => Ok(ProjectStatus::Active),
            "closed" => Ok(ProjectStatus::Closed),
            _ => Err(format!("Unknown project status: {s}")),
        }
    }
}

/// Roster row linking a resource to a project. Role "PM" marks the project
/// manager and elevates permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectResourceRow {
    pub project_id: Uuid,
    pub resource_id: String,
    pub role: Option<String>,
    pub editable: bool,
    pub created_by: String,
}

/// Dated marker attached read-only to multi-project views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMark {
    pub project_id: Uuid,
    pub name: String,
    pub mark_date: NaiveDate,
}
