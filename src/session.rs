//! Session state: the current-project reference and its resolution
//!
//! The session is the only mutable cross-call state in the process. It is an
//! explicit value owned by the handler and passed by `&mut`, never a global,
//! so the resolve-then-write sequence cannot race in-process.

use crate::backend::Backend;
use crate::error::{BridgeError, Result};
use crate::types::{Project, ProjectId};

/// Session-scoped state for one protocol connection
#[derive(Default)]
pub struct Session {
    current: Option<Project>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The held current project, if any, without resolving
    pub fn current(&self) -> Option<&Project> {
        self.current.as_ref()
    }

    /// Return the current project, establishing it if absent.
    ///
    /// Resolution order: held reference, then a backend-persisted marker,
    /// then the most recently created project (which also gets marked
    /// current). With zero projects this fails with `NoProjectAvailable`
    /// and guidance to create one; the failure is not retried.
    pub async fn project(&mut self, backend: &dyn Backend) -> Result<Project> {
        if let Some(project) = &self.current {
            return Ok(project.clone());
        }

        if let Some(project) = backend.current_project_marker().await? {
            tracing::debug!(project = %project.name, "Adopted backend current-project marker");
            self.current = Some(project.clone());
            return Ok(project);
        }

        let projects = backend.list_projects().await?;
        match projects.into_iter().next() {
            Some(project) => {
                backend.set_current_project_marker(&project.id).await?;
                tracing::debug!(project = %project.name, "Adopted most recent project");
                self.current = Some(project.clone());
                Ok(project)
            }
            None => Err(BridgeError::NoProjectAvailable(
                "no projects exist yet; create one with create_project".to_string(),
            )),
        }
    }

    /// Unconditionally make `project` current, informing the backend so
    /// out-of-process readers stay consistent
    pub async fn set_current(&mut self, backend: &dyn Backend, project: Project) -> Result<()> {
        backend.set_current_project_marker(&project.id).await?;
        self.current = Some(project);
        Ok(())
    }

    /// Make the project with `project_id` current, failing with `NotFound`
    /// when no such project exists
    pub async fn set_current_by_id(
        &mut self,
        backend: &dyn Backend,
        project_id: &ProjectId,
    ) -> Result<Project> {
        let project = backend
            .list_projects()
            .await?
            .into_iter()
            .find(|p| &p.id == project_id)
            .ok_or_else(|| BridgeError::NotFound(format!("Project {} does not exist", project_id)))?;
        self.set_current(backend, project.clone()).await?;
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Memory, MemoryFilter, MemoryId, NewMemory, NewProject, NewTask, ScoredMemory, Task,
        TaskFilter, TaskId, TaskStatus,
    };
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend stub exposing a fixed project list and an optional marker
    #[derive(Default)]
    struct StubBackend {
        projects: Vec<Project>,
        marker: Option<Project>,
        list_calls: AtomicUsize,
        marker_sets: AtomicUsize,
    }

    fn project(id: &str, created_secs: i64) -> Project {
        Project {
            id: id.to_string(),
            name: format!("project-{}", id),
            description: None,
            metadata: Default::default(),
            created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
        }
    }

    #[async_trait]
    impl Backend for StubBackend {
        async fn create_project(&self, _input: NewProject) -> Result<Project> {
            unimplemented!()
        }
        async fn list_projects(&self) -> Result<Vec<Project>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let mut projects = self.projects.clone();
            projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(projects)
        }
        async fn current_project_marker(&self) -> Result<Option<Project>> {
            Ok(self.marker.clone())
        }
        async fn set_current_project_marker(&self, _project_id: &ProjectId) -> Result<()> {
            self.marker_sets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn store_memory(&self, _input: NewMemory) -> Result<Memory> {
            unimplemented!()
        }
        async fn search_memory(
            &self,
            _project_id: &ProjectId,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<ScoredMemory>> {
            unimplemented!()
        }
        async fn list_memories(
            &self,
            _project_id: &ProjectId,
            _filter: &MemoryFilter,
        ) -> Result<Vec<Memory>> {
            unimplemented!()
        }
        async fn update_memory_importance(
            &self,
            _memory_id: &MemoryId,
            _importance: i64,
        ) -> Result<Memory> {
            unimplemented!()
        }
        async fn create_task(&self, _input: NewTask) -> Result<Task> {
            unimplemented!()
        }
        async fn get_task(&self, _task_id: &TaskId) -> Result<Task> {
            unimplemented!()
        }
        async fn list_tasks(
            &self,
            _project_id: &ProjectId,
            _filter: &TaskFilter,
        ) -> Result<Vec<Task>> {
            unimplemented!()
        }
        async fn update_task_status(
            &self,
            _task_id: &TaskId,
            _status: TaskStatus,
            _notes: Option<&str>,
        ) -> Result<Task> {
            unimplemented!()
        }
        async fn breakdown_task(
            &self,
            _parent: &Task,
            _target_complexity: Option<i64>,
        ) -> Result<Vec<Task>> {
            unimplemented!()
        }
        async fn suggest_next_task(&self, _project_id: &ProjectId) -> Result<Option<Task>> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_resolution_prefers_marker() {
        let backend = StubBackend {
            projects: vec![project("old", 1), project("new", 100)],
            marker: Some(project("old", 1)),
            ..Default::default()
        };
        let mut session = Session::new();
        let resolved = session.project(&backend).await.unwrap();
        assert_eq!(resolved.id, "old");
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolution_adopts_newest_and_marks_it() {
        let backend = StubBackend {
            projects: vec![project("old", 1), project("new", 100)],
            ..Default::default()
        };
        let mut session = Session::new();
        let resolved = session.project(&backend).await.unwrap();
        assert_eq!(resolved.id, "new");
        assert_eq!(backend.marker_sets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let backend = StubBackend {
            projects: vec![project("only", 5)],
            ..Default::default()
        };
        let mut session = Session::new();
        let first = session.project(&backend).await.unwrap();
        let second = session.project(&backend).await.unwrap();
        assert_eq!(first.id, second.id);
        // The second call must come from the held reference
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolution_fails_without_projects() {
        let backend = StubBackend::default();
        let mut session = Session::new();
        let err = session.project(&backend).await.unwrap_err();
        match err {
            BridgeError::NoProjectAvailable(msg) => assert!(msg.contains("create_project")),
            other => panic!("expected NoProjectAvailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_current_by_unknown_id_is_not_found() {
        let backend = StubBackend {
            projects: vec![project("p1", 1)],
            ..Default::default()
        };
        let mut session = Session::new();
        let err = session
            .set_current_by_id(&backend, &"missing".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }
}
