//! Permission gate: one pure predicate evaluated before any mutation.
//!
//! Callers may mutate when they are an admin, the project's manager (a
//! project-resource row with role "PM"), the creator of the project or of
//! one of the targeted tasks, or a resource directly assigned to one of the
//! targeted tasks. Facts are fetched just-in-time per operation and never
//! cached across requests.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const PM_ROLE: &str = "PM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// Authenticated caller context, supplied by the request layer.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
    /// The resource record representing this user, when one exists.
    pub resource_id: Option<String>,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Ownership and assignment facts for the project/tasks a mutation targets.
#[derive(Debug, Clone, Default)]
pub struct AccessFacts {
    pub project_creator: Option<String>,
    /// Creators of the targeted tasks (empty on create).
    pub task_creators: Vec<String>,
    /// Resource ids holding the PM role on the project.
    pub pm_resource_ids: Vec<String>,
    /// Resource ids directly assigned to the targeted tasks.
    pub assigned_resource_ids: Vec<String>,
}

/// The single mutation predicate: admin, PM, creator, or assigned resource.
pub fn can_modify(caller: &Caller, facts: &AccessFacts) -> bool {
    if caller.is_admin() {
        return true;
    }
    if let Some(rid) = &caller.resource_id {
        if facts.pm_resource_ids.iter().any(|p| p == rid) {
            return true;
        }
        if facts.assigned_resource_ids.iter().any(|a| a == rid) {
            return true;
        }
    }
    facts.project_creator.as_deref() == Some(caller.user_id.as_str())
        || facts.task_creators.iter().any(|c| *c == caller.user_id)
}

/// Human-readable reason attached to a PermissionDenied error.
pub fn denial_reason() -> &'static str {
    "caller is not an admin, project manager, creator, or assigned resource"
}
