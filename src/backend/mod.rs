//! Backend adapter abstraction
//!
//! One operation set, two fulfillment paths: `DirectBackend` talks to an
//! external store plus an embedding service, `RemoteBackend` talks to the
//! hosted API. Handlers never know which variant is active.

mod direct;
mod remote;

pub use direct::DirectBackend;
pub use remote::{RemoteBackend, UsageTracker};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Memory, MemoryFilter, MemoryId, NewMemory, NewProject, NewTask, Project, ProjectId,
    ScoredMemory, Task, TaskFilter, TaskId, TaskPriority, TaskStatus,
};

/// The backend adapter trait
///
/// Arguments arrive already validated and typed; implementations normalize
/// their native result shapes into the plain entity types before returning.
#[async_trait]
pub trait Backend: Send + Sync {
    // Projects
    async fn create_project(&self, input: NewProject) -> Result<Project>;
    /// All projects, newest first
    async fn list_projects(&self) -> Result<Vec<Project>>;
    /// Previously-marked current project, if the variant persists one
    async fn current_project_marker(&self) -> Result<Option<Project>>;
    /// Persist the current-project marker for out-of-process readers.
    /// Variants with no such notion may no-op.
    async fn set_current_project_marker(&self, project_id: &ProjectId) -> Result<()>;

    // Memories
    async fn store_memory(&self, input: NewMemory) -> Result<Memory>;
    /// Top `limit` memories by descending similarity to `query`
    async fn search_memory(
        &self,
        project_id: &ProjectId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredMemory>>;
    /// Memories matching `filter`, newest first
    async fn list_memories(
        &self,
        project_id: &ProjectId,
        filter: &MemoryFilter,
    ) -> Result<Vec<Memory>>;
    async fn update_memory_importance(
        &self,
        memory_id: &MemoryId,
        importance: i64,
    ) -> Result<Memory>;

    // Tasks
    async fn create_task(&self, input: NewTask) -> Result<Task>;
    async fn get_task(&self, task_id: &TaskId) -> Result<Task>;
    async fn list_tasks(&self, project_id: &ProjectId, filter: &TaskFilter) -> Result<Vec<Task>>;
    async fn update_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        notes: Option<&str>,
    ) -> Result<Task>;
    /// Create exactly three child tasks for `parent` (see [`plan_breakdown`])
    async fn breakdown_task(
        &self,
        parent: &Task,
        target_complexity: Option<i64>,
    ) -> Result<Vec<Task>>;
    /// Highest-priority open task, ties broken by earliest creation time
    async fn suggest_next_task(&self, project_id: &ProjectId) -> Result<Option<Task>>;
}

/// Plan the three child tasks for a breakdown.
///
/// Children inherit the parent's priority except the test child, which is
/// always medium. Every child depends on the parent and carries it as
/// `parent_id`. Both backend variants create tasks from this plan so the
/// breakdown shape cannot drift between them.
pub fn plan_breakdown(parent: &Task, target_complexity: Option<i64>) -> Vec<NewTask> {
    let phases: [(&str, &str, TaskPriority); 3] = [
        (
            "Research",
            "Investigate requirements and existing approaches",
            parent.priority,
        ),
        (
            "Implement",
            "Carry out the main body of work",
            parent.priority,
        ),
        (
            "Test",
            "Verify the result against expectations",
            TaskPriority::Medium,
        ),
    ];

    phases
        .into_iter()
        .map(|(phase, description, priority)| {
            let mut metadata = std::collections::HashMap::new();
            if let Some(complexity) = target_complexity {
                metadata.insert("target_complexity".to_string(), complexity.into());
            }
            NewTask {
                project_id: parent.project_id.clone(),
                title: format!("{}: {}", phase, parent.title),
                description: Some(format!("{} for '{}'", description, parent.title)),
                priority,
                dependencies: vec![parent.id.clone()],
                parent_id: Some(parent.id.clone()),
                metadata,
            }
        })
        .collect()
}

/// Select the next task to work on from a project's task list.
///
/// Only pending and in-progress tasks are eligible; among those the highest
/// priority wins, ties broken by earliest creation time.
pub fn pick_next_task(tasks: Vec<Task>) -> Option<Task> {
    tasks
        .into_iter()
        .filter(|t| t.status.is_open())
        .min_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn task(id: &str, status: TaskStatus, priority: TaskPriority, created_secs: i64) -> Task {
        Task {
            id: id.to_string(),
            project_id: "p1".to_string(),
            title: format!("task {}", id),
            description: None,
            status,
            priority,
            dependencies: vec![],
            parent_id: None,
            metadata: Default::default(),
            created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_breakdown_plan_shape() {
        let parent = task("t1", TaskStatus::Pending, TaskPriority::High, 0);
        let plan = plan_breakdown(&parent, Some(7));

        assert_eq!(plan.len(), 3);
        for child in &plan {
            assert_eq!(child.dependencies, vec!["t1".to_string()]);
            assert_eq!(child.parent_id.as_deref(), Some("t1"));
            assert_eq!(child.project_id, "p1");
            assert_eq!(child.metadata["target_complexity"], 7);
        }
        assert!(plan[0].title.starts_with("Research:"));
        assert!(plan[1].title.starts_with("Implement:"));
        assert!(plan[2].title.starts_with("Test:"));
        assert_eq!(plan[0].priority, TaskPriority::High);
        assert_eq!(plan[1].priority, TaskPriority::High);
        assert_eq!(plan[2].priority, TaskPriority::Medium);
    }

    #[test]
    fn test_pick_next_prefers_priority() {
        let picked = pick_next_task(vec![
            task("a", TaskStatus::Pending, TaskPriority::Low, 0),
            task("b", TaskStatus::InProgress, TaskPriority::High, 10),
            task("c", TaskStatus::Pending, TaskPriority::Medium, 5),
        ])
        .unwrap();
        assert_eq!(picked.id, "b");
    }

    #[test]
    fn test_pick_next_ties_broken_by_age() {
        let picked = pick_next_task(vec![
            task("newer", TaskStatus::Pending, TaskPriority::High, 100),
            task("older", TaskStatus::Pending, TaskPriority::High, 1),
        ])
        .unwrap();
        assert_eq!(picked.id, "older");
    }

    #[test]
    fn test_pick_next_skips_closed() {
        assert!(pick_next_task(vec![
            task("a", TaskStatus::Completed, TaskPriority::High, 0),
            task("b", TaskStatus::Cancelled, TaskPriority::High, 1),
        ])
        .is_none());
    }
}
