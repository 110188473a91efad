//! Core entity types for membridge
//!
//! Projects, memories, and tasks are owned by the backend for their whole
//! lifetime; this process only shuttles them between the protocol surface
//! and whichever backend variant is active.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque identifier minted by the backend
pub type ProjectId = String;
pub type MemoryId = String;
pub type TaskId = String;

/// Default importance assigned to memories stored without one
pub const DEFAULT_IMPORTANCE: i64 = 5;

/// Inclusive importance bounds
pub const IMPORTANCE_MIN: i64 = 1;
pub const IMPORTANCE_MAX: i64 = 10;

/// A top-level container isolating a set of memories and tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    /// Display name, unique within the backend
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A stored piece of text with an importance rank and a similarity-searchable
/// embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    #[serde(alias = "projectId")]
    pub project_id: ProjectId,
    pub content: String,
    /// Free-form label used for filtering; no enumeration is enforced
    #[serde(default, alias = "memoryType", skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<String>,
    /// Importance rank, 1-10 inclusive
    #[serde(default = "default_importance")]
    pub importance: i64,
    /// Embedding vector produced by the external embedding service at store
    /// time; only ever forwarded, never interpreted here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

fn default_importance() -> i64 {
    DEFAULT_IMPORTANCE
}

/// A memory annotated with its similarity score for a search query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMemory {
    #[serde(flatten)]
    pub memory: Memory,
    /// Similarity in [0, 1], higher is closer
    pub similarity: f32,
}

/// Task lifecycle status; any-to-any transitions are permitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    /// A task still eligible for `suggest_next_task`
    pub fn is_open(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// Task priority; variant order gives `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(format!("Unknown task priority: {}", s)),
        }
    }
}

/// A trackable unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(alias = "projectId")]
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    /// Ordered list of task ids this task depends on. Stored verbatim:
    /// referential integrity and cycle prevention are not enforced.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Set when this task was produced by breaking down another task
    #[serde(default, alias = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Input for storing a new memory
#[derive(Debug, Clone, Serialize)]
pub struct NewMemory {
    pub project_id: ProjectId,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<String>,
    pub importance: i64,
}

/// Input for creating a new project
#[derive(Debug, Clone, Serialize)]
pub struct NewProject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Input for creating a new task
#[derive(Debug, Clone, Serialize)]
pub struct NewTask {
    pub project_id: ProjectId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: TaskPriority,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Filters for listing memories; results are always newest-first
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    pub memory_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Filters for listing tasks
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee: Option<String>,
}

/// Default hosted API endpoint for the remote backend
pub const DEFAULT_REMOTE_URL: &str = "https://api.membridge.dev/v1";

/// Configuration for the remote (hosted API) backend
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Configuration for the direct store backend
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the store's REST surface
    pub url: String,
    /// Service credential forwarded as both apikey and bearer token
    pub service_key: String,
}

/// Configuration for the external embedding service
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
}

impl EmbeddingConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in ["pending", "in_progress", "completed", "cancelled"] {
            let parsed: TaskStatus = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
        assert!("invalid_status".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::High > TaskPriority::Medium);
        assert!(TaskPriority::Medium > TaskPriority::Low);
    }

    #[test]
    fn test_memory_importance_default() {
        let m: Memory = serde_json::from_value(serde_json::json!({
            "id": "m1",
            "project_id": "p1",
            "content": "hello",
            "created_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(m.importance, DEFAULT_IMPORTANCE);
    }

    #[test]
    fn test_task_camel_case_aliases() {
        let t: Task = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "projectId": "p1",
            "title": "Build auth",
            "parentId": "t0",
            "createdAt": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(t.project_id, "p1");
        assert_eq!(t.parent_id.as_deref(), Some("t0"));
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.priority, TaskPriority::Medium);
    }
}
