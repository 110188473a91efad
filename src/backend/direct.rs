//! Direct backend variant
//!
//! Talks straight to an external store over its REST surface for CRUD and
//! listing, to the embedding service for vectors, and to the store-side
//! `match_memories` procedure for similarity ranking.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::embedding::EmbeddingClient;
use crate::error::{BridgeError, Result};
use crate::types::{
    Memory, MemoryFilter, MemoryId, NewMemory, NewProject, NewTask, Project, ProjectId,
    ScoredMemory, StoreConfig, Task, TaskFilter, TaskId, TaskStatus,
};

use super::{pick_next_task, plan_breakdown, Backend};

/// Columns fetched for memory rows. The embedding column is stored in the
/// store's native vector type and never read back by this process.
const MEMORY_COLUMNS: &str = "id,project_id,content,memory_type,importance,created_at";

/// REST client for the external store
///
/// Every request carries the service key as both `apikey` and bearer token;
/// mutations ask for the affected rows back so callers get the stored entity
/// without a second round trip.
struct StoreClient {
    client: reqwest::Client,
    config: StoreConfig,
}

impl StoreClient {
    fn new(config: StoreConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.config.url, path);
        self.client
            .request(method, url)
            .header("apikey", &self.config.service_key)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.service_key),
            )
    }

    /// Convert a non-2xx store response into the right error kind
    async fn fail(response: reqwest::Response) -> BridgeError {
        let status = response.status();
        let message = match response.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string()),
            Err(_) => status.to_string(),
        };
        if status == reqwest::StatusCode::NOT_FOUND {
            BridgeError::NotFound(message)
        } else {
            BridgeError::Upstream(message)
        }
    }

    /// Insert one row and return it
    async fn insert<T: DeserializeOwned>(&self, table: &str, body: &impl Serialize) -> Result<T> {
        self.insert_with_select(table, body, "*").await
    }

    /// Insert one row and return the listed columns of it
    async fn insert_with_select<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &impl Serialize,
        select: &str,
    ) -> Result<T> {
        let response = self
            .request(reqwest::Method::POST, table)
            .query(&[("select", select)])
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let mut rows: Vec<T> = response.json().await?;
        rows.pop()
            .ok_or_else(|| BridgeError::Parse(format!("Store returned no row for insert into {}", table)))
    }

    /// Select rows matching the given filter query pairs
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let response = self
            .request(reqwest::Method::GET, table)
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(response.json().await?)
    }

    /// Patch the row with the given id and return it; missing row is NotFound
    async fn update_by_id<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
        body: &impl Serialize,
        select: &str,
    ) -> Result<T> {
        let response = self
            .request(reqwest::Method::PATCH, table)
            .query(&[("id", format!("eq.{}", id)), ("select", select.to_string())])
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let mut rows: Vec<T> = response.json().await?;
        rows.pop()
            .ok_or_else(|| BridgeError::NotFound(format!("No row with id {} in {}", id, table)))
    }

    /// Call a store-side procedure
    async fn rpc<T: DeserializeOwned>(&self, name: &str, body: &impl Serialize) -> Result<T> {
        let response = self
            .request(reqwest::Method::POST, &format!("rpc/{}", name))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(response.json().await?)
    }
}

/// Backend variant fulfilled by a directly-connected store plus the external
/// embedding service
pub struct DirectBackend {
    store: StoreClient,
    embedder: EmbeddingClient,
}

impl DirectBackend {
    pub fn new(store_config: StoreConfig, embedder: EmbeddingClient) -> Self {
        Self {
            store: StoreClient::new(store_config),
            embedder,
        }
    }
}

#[async_trait]
impl Backend for DirectBackend {
    async fn create_project(&self, input: NewProject) -> Result<Project> {
        tracing::debug!(name = %input.name, "Creating project in store");
        self.store.insert("projects", &input).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.store
            .select("projects", &[("order", "created_at.desc".to_string())])
            .await
    }

    async fn current_project_marker(&self) -> Result<Option<Project>> {
        // The store has no notion of a session-scoped current project;
        // resolution falls back to the newest project.
        Ok(None)
    }

    async fn set_current_project_marker(&self, _project_id: &ProjectId) -> Result<()> {
        Ok(())
    }

    async fn store_memory(&self, input: NewMemory) -> Result<Memory> {
        let embedding = self.embedder.embed(&input.content).await?;
        let row = json!({
            "project_id": input.project_id,
            "content": input.content,
            "memory_type": input.memory_type,
            "importance": input.importance,
            "embedding": embedding,
        });
        self.store
            .insert_with_select("memories", &row, MEMORY_COLUMNS)
            .await
    }

    async fn search_memory(
        &self,
        project_id: &ProjectId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredMemory>> {
        let query_embedding = self.embedder.embed(query).await?;
        self.store
            .rpc(
                "match_memories",
                &json!({
                    "query_embedding": query_embedding,
                    "match_count": limit,
                    "filter_project_id": project_id,
                }),
            )
            .await
    }

    async fn list_memories(
        &self,
        project_id: &ProjectId,
        filter: &MemoryFilter,
    ) -> Result<Vec<Memory>> {
        let mut query = vec![
            ("project_id", format!("eq.{}", project_id)),
            ("select", MEMORY_COLUMNS.to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(memory_type) = &filter.memory_type {
            query.push(("memory_type", format!("eq.{}", memory_type)));
        }
        if let Some(since) = filter.since {
            query.push(("created_at", format!("gte.{}", since.to_rfc3339())));
        }
        if let Some(until) = filter.until {
            query.push(("created_at", format!("lte.{}", until.to_rfc3339())));
        }
        self.store.select("memories", &query).await
    }

    async fn update_memory_importance(
        &self,
        memory_id: &MemoryId,
        importance: i64,
    ) -> Result<Memory> {
        self.store
            .update_by_id(
                "memories",
                memory_id,
                &json!({ "importance": importance }),
                MEMORY_COLUMNS,
            )
            .await
    }

    async fn create_task(&self, input: NewTask) -> Result<Task> {
        self.store.insert("tasks", &input).await
    }

    async fn get_task(&self, task_id: &TaskId) -> Result<Task> {
        let mut rows: Vec<Task> = self
            .store
            .select("tasks", &[("id", format!("eq.{}", task_id))])
            .await?;
        rows.pop()
            .ok_or_else(|| BridgeError::NotFound(format!("Task {} does not exist", task_id)))
    }

    async fn list_tasks(&self, project_id: &ProjectId, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut query = vec![
            ("project_id", format!("eq.{}", project_id)),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(status) = filter.status {
            query.push(("status", format!("eq.{}", status)));
        }
        if let Some(priority) = filter.priority {
            query.push(("priority", format!("eq.{}", priority)));
        }
        if let Some(assignee) = &filter.assignee {
            query.push(("metadata->>assignee", format!("eq.{}", assignee)));
        }
        self.store.select("tasks", &query).await
    }

    async fn update_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        notes: Option<&str>,
    ) -> Result<Task> {
        let mut body = json!({ "status": status });
        if let Some(notes) = notes {
            // Merge the note into the task's metadata rather than replacing it
            let existing = self.get_task(task_id).await?;
            let mut metadata = existing.metadata;
            metadata.insert("status_note".to_string(), notes.into());
            body["metadata"] = serde_json::to_value(metadata)?;
        }
        self.store.update_by_id("tasks", task_id, &body, "*").await
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
        let open: Vec<Task> = self
            .store
            .select(
                "tasks",
                &[
                    ("project_id", format!("eq.{}", project_id)),
                    ("status", "in.(pending,in_progress)".to_string()),
                ],
            )
            .await?;
        Ok(pick_next_task(open))
    }
}
