//! Tool dispatch and response normalization
//!
//! `BridgeHandler` routes validated tool calls to per-tool methods and
//! renders every outcome, success or failure, into the uniform envelope.
//! Errors never escape to the protocol layer: a failed tool call is an
//! error envelope, never a dead session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::backend::Backend;
use crate::error::{BridgeError, Result};
use crate::mcp::protocol::{
    methods, InitializeResult, McpHandler, McpRequest, McpResponse, ToolCallResult,
};
use crate::mcp::tools::{find_tool, tool_definitions, validate_args};
use crate::session::Session;
use crate::types::{
    Memory, MemoryFilter, NewMemory, NewProject, NewTask, Project, TaskFilter, TaskPriority,
    TaskStatus,
};

/// MCP request handler bridging the tool catalogue to the active backend
pub struct BridgeHandler {
    backend: Arc<dyn Backend>,
    session: Session,
}

impl BridgeHandler {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            session: Session::new(),
        }
    }

    /// Validate and dispatch one tool call, normalizing the outcome
    pub async fn call_tool(&mut self, name: &str, args: Value) -> ToolCallResult {
        let Some(tool) = find_tool(name) else {
            return ToolCallResult::error(format!("Unknown tool: {}", name));
        };

        let outcome = match validate_args(tool, &args) {
            Ok(validated) => self.dispatch(name, validated).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(tool = name, error = %e, "Tool call failed");
                ToolCallResult::error(format!("Error: {}", e))
            }
        }
    }

    async fn dispatch(&mut self, name: &str, args: Map<String, Value>) -> Result<ToolCallResult> {
        match name {
            "store_memory" => self.tool_store_memory(args).await,
            "search_memory" => self.tool_search_memory(args).await,
            "get_memories" => self.tool_get_memories(args).await,
            "update_memory_importance" => self.tool_update_memory_importance(args).await,
            "create_project" => self.tool_create_project(args).await,
            "set_current_project" => self.tool_set_current_project(args).await,
            "get_current_project" => self.tool_get_current_project().await,
            "list_projects" => self.tool_list_projects().await,
            "get_project_context" => self.tool_get_project_context(args).await,
            "create_task" => self.tool_create_task(args).await,
            "list_tasks" => self.tool_list_tasks(args).await,
            "update_task_status" => self.tool_update_task_status(args).await,
            "suggest_next_task" => self.tool_suggest_next_task().await,
            "break_down_task" => self.tool_break_down_task(args).await,
            _ => Err(BridgeError::Validation(format!("Unknown tool: {}", name))),
        }
    }

    async fn current_project(&mut self) -> Result<Project> {
        self.session.project(self.backend.as_ref()).await
    }

    async fn tool_store_memory(&mut self, args: Map<String, Value>) -> Result<ToolCallResult> {
        let project = self.current_project().await?;
        let content = required_str(&args, "content")?.trim().to_string();
        let input = NewMemory {
            project_id: project.id.clone(),
            content,
            memory_type: optional_str(&args, "memoryType").map(str::to_string),
            importance: required_i64(&args, "importance")?,
        };
        let memory = self.backend.store_memory(input).await?;
        Ok(ToolCallResult::text(format!(
            "Stored memory {} in project '{}' (importance {})",
            memory.id, project.name, memory.importance
        )))
    }

    async fn tool_search_memory(&mut self, args: Map<String, Value>) -> Result<ToolCallResult> {
        let project = self.current_project().await?;
        let query = required_str(&args, "query")?;
        let limit = required_i64(&args, "limit")? as usize;
        let mut results = self
            .backend
            .search_memory(&project.id, query, limit)
            .await?;
        for scored in &mut results {
            scored.memory.embedding = None;
        }
        Ok(ToolCallResult::json(&results))
    }

    async fn tool_get_memories(&mut self, args: Map<String, Value>) -> Result<ToolCallResult> {
        let project = self.current_project().await?;
        let (since, until) = match args.get("timeRange") {
            Some(range) => (
                parse_timestamp(range, "start")?,
                parse_timestamp(range, "end")?,
            ),
            None => (None, None),
        };
        let filter = MemoryFilter {
            memory_type: optional_str(&args, "memoryType").map(str::to_string),
            since,
            until,
        };
        let mut memories = self.backend.list_memories(&project.id, &filter).await?;
        for memory in &mut memories {
            memory.embedding = None;
        }
        Ok(ToolCallResult::json(&memories))
    }

    async fn tool_update_memory_importance(
        &mut self,
        args: Map<String, Value>,
    ) -> Result<ToolCallResult> {
        let memory_id = required_str(&args, "memoryId")?.to_string();
        let importance = required_i64(&args, "importance")?;
        let memory = self
            .backend
            .update_memory_importance(&memory_id, importance)
            .await?;
        Ok(ToolCallResult::text(format!(
            "Updated importance of memory {} to {}",
            memory.id, memory.importance
        )))
    }

    async fn tool_create_project(&mut self, args: Map<String, Value>) -> Result<ToolCallResult> {
        let input = NewProject {
            name: required_str(&args, "name")?.trim().to_string(),
            description: optional_str(&args, "description").map(str::to_string),
            metadata: parse_metadata(args.get("metadata"))?,
        };
        let project = self.backend.create_project(input).await?;
        self.session
            .set_current(self.backend.as_ref(), project.clone())
            .await?;
        Ok(ToolCallResult::text(format!(
            "Created project '{}' ({}); it is now the current project",
            project.name, project.id
        )))
    }

    async fn tool_set_current_project(
        &mut self,
        args: Map<String, Value>,
    ) -> Result<ToolCallResult> {
        let project_id = required_str(&args, "projectId")?.to_string();
        let project = self
            .session
            .set_current_by_id(self.backend.as_ref(), &project_id)
            .await?;
        Ok(ToolCallResult::text(format!(
            "Current project is now '{}' ({})",
            project.name, project.id
        )))
    }

    async fn tool_get_current_project(&mut self) -> Result<ToolCallResult> {
        let project = self.current_project().await?;
        Ok(ToolCallResult::json(&project))
    }

    async fn tool_list_projects(&mut self) -> Result<ToolCallResult> {
        let projects = self.backend.list_projects().await?;
        Ok(ToolCallResult::json(&projects))
    }

    async fn tool_get_project_context(
        &mut self,
        args: Map<String, Value>,
    ) -> Result<ToolCallResult> {
        let project = match optional_str(&args, "projectId") {
            Some(project_id) => {
                let project_id = project_id.to_string();
                self.backend
                    .list_projects()
                    .await?
                    .into_iter()
                    .find(|p| p.id == project_id)
                    .ok_or_else(|| {
                        BridgeError::NotFound(format!("Project {} does not exist", project_id))
                    })?
            }
            None => self.current_project().await?,
        };

        let mut memories = self
            .backend
            .list_memories(&project.id, &MemoryFilter::default())
            .await?;
        memories.truncate(10);
        let tasks = self
            .backend
            .list_tasks(&project.id, &TaskFilter::default())
            .await?;

        let mut by_status: std::collections::HashMap<String, usize> = Default::default();
        for task in &tasks {
            *by_status.entry(task.status.to_string()).or_default() += 1;
        }

        let context = json!({
            "project": project,
            "recent_memories": memories
                .iter()
                .map(memory_digest)
                .collect::<Vec<_>>(),
            "task_summary": {
                "total": tasks.len(),
                "by_status": by_status,
            },
        });
        Ok(ToolCallResult::json(&context))
    }

    async fn tool_create_task(&mut self, args: Map<String, Value>) -> Result<ToolCallResult> {
        let project = self.current_project().await?;
        let priority = match optional_str(&args, "priority") {
            Some(p) => p.parse::<TaskPriority>().map_err(BridgeError::Validation)?,
            None => TaskPriority::default(),
        };
        let dependencies = args
            .get("dependencies")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let input = NewTask {
            project_id: project.id.clone(),
            title: required_str(&args, "title")?.trim().to_string(),
            description: optional_str(&args, "description").map(str::to_string),
            priority,
            dependencies,
            parent_id: None,
            metadata: Default::default(),
        };
        let task = self.backend.create_task(input).await?;
        Ok(ToolCallResult::text(format!(
            "Created task '{}' ({}) with priority {}",
            task.title, task.id, task.priority
        )))
    }

    async fn tool_list_tasks(&mut self, args: Map<String, Value>) -> Result<ToolCallResult> {
        let project = self.current_project().await?;
        let filter = TaskFilter {
            status: parse_enum::<TaskStatus>(&args, "status")?,
            priority: parse_enum::<TaskPriority>(&args, "priority")?,
            assignee: optional_str(&args, "assignee").map(str::to_string),
        };
        let tasks = self.backend.list_tasks(&project.id, &filter).await?;
        Ok(ToolCallResult::json(&tasks))
    }

    async fn tool_update_task_status(
        &mut self,
        args: Map<String, Value>,
    ) -> Result<ToolCallResult> {
        let task_id = required_str(&args, "taskId")?.to_string();
        let status = required_str(&args, "status")?
            .parse::<TaskStatus>()
            .map_err(BridgeError::Validation)?;
        let notes = optional_str(&args, "notes");
        let task = self
            .backend
            .update_task_status(&task_id, status, notes)
            .await?;
        let mut summary = format!("Task '{}' ({}) is now {}", task.title, task.id, task.status);
        if notes.is_some() {
            summary.push_str(" (note recorded)");
        }
        Ok(ToolCallResult::text(summary))
    }

    async fn tool_suggest_next_task(&mut self) -> Result<ToolCallResult> {
        let project = self.current_project().await?;
        match self.backend.suggest_next_task(&project.id).await? {
            Some(task) => Ok(ToolCallResult::json(&task)),
            None => Ok(ToolCallResult::text(format!(
                "No open tasks in project '{}'",
                project.name
            ))),
        }
    }

    async fn tool_break_down_task(&mut self, args: Map<String, Value>) -> Result<ToolCallResult> {
        let task_id = required_str(&args, "taskId")?.to_string();
        let target_complexity = optional_i64(&args, "targetComplexity");
        let parent = self.backend.get_task(&task_id).await?;
        let children = self
            .backend
            .breakdown_task(&parent, target_complexity)
            .await?;

        let mut summary = format!(
            "Broke down task '{}' ({}) into {} subtasks:",
            parent.title,
            parent.id,
            children.len()
        );
        for child in &children {
            summary.push_str(&format!("\n- {} ({}, {})", child.title, child.id, child.priority));
        }
        Ok(ToolCallResult::text(summary))
    }
}

/// Compact memory rendering for context summaries
fn memory_digest(memory: &Memory) -> Value {
    json!({
        "id": memory.id,
        "content": memory.content,
        "memory_type": memory.memory_type,
        "importance": memory.importance,
        "created_at": memory.created_at,
    })
}

fn required_str<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::Validation(format!("Missing required parameter '{}'", name)))
}

fn optional_str<'a>(args: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

fn required_i64(args: &Map<String, Value>, name: &str) -> Result<i64> {
    args.get(name)
        .and_then(Value::as_i64)
        .ok_or_else(|| BridgeError::Validation(format!("Missing required parameter '{}'", name)))
}

fn optional_i64(args: &Map<String, Value>, name: &str) -> Option<i64> {
    args.get(name).and_then(Value::as_i64)
}

fn parse_enum<T: std::str::FromStr<Err = String>>(
    args: &Map<String, Value>,
    name: &str,
) -> Result<Option<T>> {
    match optional_str(args, name) {
        Some(s) => Ok(Some(s.parse().map_err(BridgeError::Validation)?)),
        None => Ok(None),
    }
}

fn parse_metadata(
    value: Option<&Value>,
) -> Result<std::collections::HashMap<String, Value>> {
    match value {
        Some(Value::Object(map)) => Ok(map.clone().into_iter().collect()),
        Some(_) => Err(BridgeError::Validation(
            "Parameter 'metadata' must be an object".to_string(),
        )),
        None => Ok(Default::default()),
    }
}

fn parse_timestamp(range: &Value, field: &str) -> Result<Option<DateTime<Utc>>> {
    match range.get(field) {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| {
                BridgeError::Validation(format!("Invalid '{}' timestamp in timeRange: {}", field, e))
            }),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(BridgeError::Validation(format!(
            "timeRange '{}' must be an RFC 3339 string",
            field
        ))),
    }
}

#[async_trait::async_trait]
impl McpHandler for BridgeHandler {
    async fn handle_request(&mut self, request: McpRequest) -> McpResponse {
        match request.method.as_str() {
            methods::INITIALIZE => {
                let result = InitializeResult::default();
                McpResponse::success(request.id, json!(result))
            }
            methods::INITIALIZED => McpResponse::success(request.id, json!({})),
            methods::LIST_TOOLS => {
                let tools = tool_definitions();
                McpResponse::success(request.id, json!({ "tools": tools }))
            }
            methods::CALL_TOOL => {
                let name = request
                    .params
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let arguments = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(json!({}));

                let result = self.call_tool(&name, arguments).await;
                McpResponse::success(request.id, json!(result))
            }
            _ => McpResponse::error(
                request.id,
                -32601,
                format!("Method not found: {}", request.method),
            ),
        }
    }
}
