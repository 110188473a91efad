//! Remote backend variant
//!
//! Fulfills every operation against the hosted API over authenticated HTTP.
//! After each successful call a usage event is fired as a detached task;
//! delivery is best-effort with no ordering guarantee and no retry.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{BridgeError, Result};
use crate::types::{
    Memory, MemoryFilter, MemoryId, NewMemory, NewProject, NewTask, Project, ProjectId,
    RemoteConfig, ScoredMemory, Task, TaskFilter, TaskId, TaskStatus,
};

use super::{pick_next_task, plan_breakdown, Backend};

/// Best-effort usage telemetry for the hosted API
///
/// Events are spawned and never awaited; any failure of the tracking call
/// itself is discarded at debug level so it can never affect the tool call
/// that triggered it.
#[derive(Clone)]
pub struct UsageTracker {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl UsageTracker {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/usage", config.base_url),
            api_key: config.api_key.clone(),
        }
    }

    /// Fire a usage event without waiting for it
    pub fn record(&self, operation: &str, method: &str) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let api_key = self.api_key.clone();
        let body = json!({ "operation": operation, "method": method });

        tokio::spawn(async move {
            match client
                .post(&endpoint)
                .bearer_auth(&api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) if !response.status().is_success() => {
                    tracing::debug!(status = %response.status(), "Usage event rejected");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Usage event dropped");
                }
                _ => {}
            }
        });
    }
}

/// Backend variant fulfilled by the hosted API
pub struct RemoteBackend {
    client: reqwest::Client,
    config: RemoteConfig,
    tracker: UsageTracker,
}

impl RemoteBackend {
    pub fn new(config: RemoteConfig) -> Self {
        let tracker = UsageTracker::new(&config);
        Self {
            client: reqwest::Client::new(),
            config,
            tracker,
        }
    }

    /// One authenticated round trip to the hosted API.
    ///
    /// Non-success statuses are turned into `NotFound`/`Upstream` using the
    /// body's `message` field when present, falling back to the status text.
    /// Transport failures surface as `Network`, undecodable bodies as `Parse`.
    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(&self.config.api_key)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<Value>().await {
                Ok(body) => body
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| status.to_string()),
                Err(_) => status.to_string(),
            };
            return Err(if status == reqwest::StatusCode::NOT_FOUND {
                BridgeError::NotFound(message)
            } else {
                BridgeError::Upstream(message)
            });
        }

        let value = response.json().await?;
        self.tracker.record(path, method.as_str());
        Ok(value)
    }

    /// Probe the API with the configured credential; used once at startup
    pub async fn verify_credentials(&self) -> Result<()> {
        self.send(reqwest::Method::GET, "/projects", None, &[])
            .await?;
        Ok(())
    }
}

/// Pull an entity list out of a response that may be a bare array or wrap it
/// under a named field
fn unwrap_list<T: DeserializeOwned>(value: Value, field: &str) -> Result<Vec<T>> {
    let inner = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map
            .remove(field)
            .or_else(|| map.remove("items"))
            .ok_or_else(|| {
                BridgeError::Parse(format!("Response missing '{}' list field", field))
            })?,
        other => {
            return Err(BridgeError::Parse(format!(
                "Expected list response, got {}",
                other
            )))
        }
    };
    Ok(serde_json::from_value(inner)?)
}

/// Pull a single entity out of a response that may wrap it under a named field
fn unwrap_entity<T: DeserializeOwned>(value: Value, field: &str) -> Result<T> {
    let inner = match value {
        Value::Object(ref map) if map.contains_key(field) => value[field].clone(),
        other => other,
    };
    Ok(serde_json::from_value(inner)?)
}

#[async_trait]
impl Backend for RemoteBackend {
    async fn create_project(&self, input: NewProject) -> Result<Project> {
        let body = serde_json::to_value(&input)?;
        let value = self
            .send(reqwest::Method::POST, "/projects", Some(&body), &[])
            .await?;
        unwrap_entity(value, "project")
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let value = self
            .send(reqwest::Method::GET, "/projects", None, &[])
            .await?;
        unwrap_list(value, "projects")
    }

    async fn current_project_marker(&self) -> Result<Option<Project>> {
        match self
            .send(reqwest::Method::GET, "/projects/current", None, &[])
            .await
        {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(unwrap_entity(value, "project")?)),
            Err(BridgeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_current_project_marker(&self, project_id: &ProjectId) -> Result<()> {
        let body = json!({ "project_id": project_id });
        self.send(reqwest::Method::PUT, "/projects/current", Some(&body), &[])
            .await?;
        Ok(())
    }

    async fn store_memory(&self, input: NewMemory) -> Result<Memory> {
        // The hosted service computes the embedding on its side
        let body = serde_json::to_value(&input)?;
        let value = self
            .send(reqwest::Method::POST, "/memories", Some(&body), &[])
            .await?;
        unwrap_entity(value, "memory")
    }

    async fn search_memory(
        &self,
        project_id: &ProjectId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredMemory>> {
        let body = json!({
            "project_id": project_id,
            "query": query,
            "limit": limit,
        });
        let value = self
            .send(reqwest::Method::POST, "/memories/search", Some(&body), &[])
            .await?;
        unwrap_list(value, "memories")
    }

    async fn list_memories(
        &self,
        project_id: &ProjectId,
        filter: &MemoryFilter,
    ) -> Result<Vec<Memory>> {
        let mut query = vec![("project_id", project_id.clone())];
        if let Some(memory_type) = &filter.memory_type {
            query.push(("memory_type", memory_type.clone()));
        }
        if let Some(since) = filter.since {
            query.push(("since", since.to_rfc3339()));
        }
        if let Some(until) = filter.until {
            query.push(("until", until.to_rfc3339()));
        }
        let value = self
            .send(reqwest::Method::GET, "/memories", None, &query)
            .await?;
        unwrap_list(value, "memories")
    }

    async fn update_memory_importance(
        &self,
        memory_id: &MemoryId,
        importance: i64,
    ) -> Result<Memory> {
        let body = json!({ "importance": importance });
        let value = self
            .send(
                reqwest::Method::PATCH,
                &format!("/memories/{}", memory_id),
                Some(&body),
                &[],
            )
            .await?;
        unwrap_entity(value, "memory")
    }

    async fn create_task(&self, input: NewTask) -> Result<Task> {
        let body = serde_json::to_value(&input)?;
        let value = self
            .send(reqwest::Method::POST, "/tasks", Some(&body), &[])
            .await?;
        unwrap_entity(value, "task")
    }

    async fn get_task(&self, task_id: &TaskId) -> Result<Task> {
        let value = self
            .send(
                reqwest::Method::GET,
                &format!("/tasks/{}", task_id),
                None,
                &[],
            )
            .await?;
        unwrap_entity(value, "task")
    }

    async fn list_tasks(&self, project_id: &ProjectId, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut query = vec![("project_id", project_id.clone())];
        if let Some(status) = filter.status {
            query.push(("status", status.to_string()));
        }
        if let Some(priority) = filter.priority {
            query.push(("priority", priority.to_string()));
        }
        if let Some(assignee) = &filter.assignee {
            query.push(("assignee", assignee.clone()));
        }
        let value = self
            .send(reqwest::Method::GET, "/tasks", None, &query)
            .await?;
        unwrap_list(value, "tasks")
    }

    async fn update_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        notes: Option<&str>,
    ) -> Result<Task> {
        let mut body = json!({ "status": status });
        if let Some(notes) = notes {
            body["notes"] = notes.into();
        }
        let value = self
            .send(
                reqwest::Method::PATCH,
                &format!("/tasks/{}/status", task_id),
                Some(&body),
                &[],
            )
            .await?;
        unwrap_entity(value, "task")
    }

    async fn breakdown_task(
        &self,
        parent: &Task,
        target_complexity: Option<i64>,
    ) -> Result<Vec<Task>> {
        let mut children = Vec::with_capacity(3);
        for input in plan_breakdown(parent, target_complexity) {
            children.push(self.create_task(input).await?);
        }
        Ok(children)
    }

    async fn suggest_next_task(&self, project_id: &ProjectId) -> Result<Option<Task>> {
        let tasks = self.list_tasks(project_id, &TaskFilter::default()).await?;
        Ok(pick_next_task(tasks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_list_accepts_bare_array() {
        let value = json!([{"id": "p1", "name": "Alpha", "created_at": "2026-01-01T00:00:00Z"}]);
        let projects: Vec<Project> = unwrap_list(value, "projects").unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "Alpha");
    }

    #[test]
    fn test_unwrap_list_accepts_wrapped_field() {
        let value = json!({
            "projects": [{"id": "p1", "name": "Alpha", "created_at": "2026-01-01T00:00:00Z"}]
        });
        let projects: Vec<Project> = unwrap_list(value, "projects").unwrap();
        assert_eq!(projects.len(), 1);
    }

    #[test]
    fn test_unwrap_list_rejects_scalar() {
        assert!(unwrap_list::<Project>(json!(42), "projects").is_err());
    }

    #[test]
    fn test_unwrap_entity_wrapped_and_bare() {
        let bare = json!({"id": "t1", "project_id": "p1", "title": "x",
            "created_at": "2026-01-01T00:00:00Z"});
        let wrapped = json!({ "task": bare.clone() });
        let a: Task = unwrap_entity(bare, "task").unwrap();
        let b: Task = unwrap_entity(wrapped, "task").unwrap();
        assert_eq!(a.id, b.id);
    }
}
