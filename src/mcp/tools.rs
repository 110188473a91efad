//! Tool catalogue and argument validation
//!
//! Each tool declares its parameters once; the same table renders the
//! `inputSchema` exposed through `tools/list` and validates, bounds-checks,
//! and defaults the raw argument bag before any handler runs. A schema
//! violation fails the call with a validation error and the handler is
//! never invoked.

use serde_json::{json, Map, Value};

use crate::error::{BridgeError, Result};
use crate::mcp::protocol::ToolDefinition;

/// Parameter value type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// JSON string
    String,
    /// JSON integer (floats are rejected)
    Integer,
    /// JSON object
    Object,
    /// JSON array of strings
    StringArray,
}

/// One declared tool parameter
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub description: &'static str,
    pub required: bool,
    /// Strings must be non-empty after trimming
    pub non_empty: bool,
    /// Inclusive integer bounds
    pub min: Option<i64>,
    pub max: Option<i64>,
    /// Legal values for enumerated strings
    pub allowed: Option<&'static [&'static str]>,
    /// Default applied when the parameter is absent
    pub default_int: Option<i64>,
}

/// Baseline spec: optional string with no constraints
const PARAM: ParamSpec = ParamSpec {
    name: "",
    kind: ParamType::String,
    description: "",
    required: false,
    non_empty: false,
    min: None,
    max: None,
    allowed: None,
    default_int: None,
};

/// A named tool: parameter table plus description
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

const TASK_STATUSES: &[&str] = &["pending", "in_progress", "completed", "cancelled"];
const TASK_PRIORITIES: &[&str] = &["low", "medium", "high"];

/// The complete tool catalogue; this is the entire externally callable surface
pub const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "store_memory",
        description: "Store a piece of text in the current project's memory",
        params: &[
            ParamSpec {
                name: "content",
                description: "The content to remember",
                required: true,
                non_empty: true,
                ..PARAM
            },
            ParamSpec {
                name: "memoryType",
                description: "Free-form label used for filtering",
                ..PARAM
            },
            ParamSpec {
                name: "importance",
                kind: ParamType::Integer,
                description: "Importance rank, 1-10",
                min: Some(1),
                max: Some(10),
                default_int: Some(5),
                ..PARAM
            },
        ],
    },
    ToolSpec {
        name: "search_memory",
        description: "Search the current project's memories by semantic similarity",
        params: &[
            ParamSpec {
                name: "query",
                description: "Search query",
                required: true,
                non_empty: true,
                ..PARAM
            },
            ParamSpec {
                name: "limit",
                kind: ParamType::Integer,
                description: "Maximum number of results",
                min: Some(1),
                max: Some(100),
                default_int: Some(10),
                ..PARAM
            },
        ],
    },
    ToolSpec {
        name: "get_memories",
        description: "List the current project's memories, newest first",
        params: &[
            ParamSpec {
                name: "memoryType",
                description: "Only return memories with this label",
                ..PARAM
            },
            ParamSpec {
                name: "timeRange",
                kind: ParamType::Object,
                description: "Creation-time range with optional 'start' and 'end' timestamps",
                ..PARAM
            },
        ],
    },
    ToolSpec {
        name: "update_memory_importance",
        description: "Change the importance rank of a stored memory",
        params: &[
            ParamSpec {
                name: "memoryId",
                description: "Id of the memory to update",
                required: true,
                non_empty: true,
                ..PARAM
            },
            ParamSpec {
                name: "importance",
                kind: ParamType::Integer,
                description: "New importance rank, 1-10",
                required: true,
                min: Some(1),
                max: Some(10),
                ..PARAM
            },
        ],
    },
    ToolSpec {
        name: "create_project",
        description: "Create a project and make it the current one",
        params: &[
            ParamSpec {
                name: "name",
                description: "Project name, unique within the backend",
                required: true,
                non_empty: true,
                ..PARAM
            },
            ParamSpec {
                name: "description",
                description: "Optional project description",
                ..PARAM
            },
            ParamSpec {
                name: "metadata",
                kind: ParamType::Object,
                description: "Arbitrary key-value metadata",
                ..PARAM
            },
        ],
    },
    ToolSpec {
        name: "set_current_project",
        description: "Switch the session to another project",
        params: &[ParamSpec {
            name: "projectId",
            description: "Id of the project to switch to",
            required: true,
            non_empty: true,
            ..PARAM
        }],
    },
    ToolSpec {
        name: "get_current_project",
        description: "Show the session's current project, resolving it if needed",
        params: &[],
    },
    ToolSpec {
        name: "list_projects",
        description: "List all projects, newest first",
        params: &[],
    },
    ToolSpec {
        name: "get_project_context",
        description: "Summarize a project: recent memories and task rollup",
        params: &[ParamSpec {
            name: "projectId",
            description: "Project to summarize; defaults to the current one",
            ..PARAM
        }],
    },
    ToolSpec {
        name: "create_task",
        description: "Create a task in the current project",
        params: &[
            ParamSpec {
                name: "title",
                description: "Task title",
                required: true,
                non_empty: true,
                ..PARAM
            },
            ParamSpec {
                name: "description",
                description: "Optional task description",
                ..PARAM
            },
            ParamSpec {
                name: "priority",
                description: "Task priority",
                allowed: Some(TASK_PRIORITIES),
                ..PARAM
            },
            ParamSpec {
                name: "dependencies",
                kind: ParamType::StringArray,
                description: "Ids of tasks this task depends on (stored, not validated)",
                ..PARAM
            },
        ],
    },
    ToolSpec {
        name: "list_tasks",
        description: "List the current project's tasks",
        params: &[
            ParamSpec {
                name: "status",
                description: "Only return tasks with this status",
                allowed: Some(TASK_STATUSES),
                ..PARAM
            },
            ParamSpec {
                name: "priority",
                description: "Only return tasks with this priority",
                allowed: Some(TASK_PRIORITIES),
                ..PARAM
            },
            ParamSpec {
                name: "assignee",
                description: "Only return tasks assigned to this person",
                ..PARAM
            },
        ],
    },
    ToolSpec {
        name: "update_task_status",
        description: "Set a task's status; any transition is permitted",
        params: &[
            ParamSpec {
                name: "taskId",
                description: "Id of the task to update",
                required: true,
                non_empty: true,
                ..PARAM
            },
            ParamSpec {
                name: "status",
                description: "New status",
                required: true,
                allowed: Some(TASK_STATUSES),
                ..PARAM
            },
            ParamSpec {
                name: "notes",
                description: "Free-text note recorded with the status change",
                ..PARAM
            },
        ],
    },
    ToolSpec {
        name: "suggest_next_task",
        description: "Suggest the most urgent open task in the current project",
        params: &[ParamSpec {
            name: "context",
            description: "Optional free-text context (currently unused by selection)",
            ..PARAM
        }],
    },
    ToolSpec {
        name: "break_down_task",
        description: "Split a task into research, implement, and test subtasks",
        params: &[
            ParamSpec {
                name: "taskId",
                description: "Id of the task to break down",
                required: true,
                non_empty: true,
                ..PARAM
            },
            ParamSpec {
                name: "targetComplexity",
                kind: ParamType::Integer,
                description: "Desired subtask complexity, 1-10",
                min: Some(1),
                max: Some(10),
                ..PARAM
            },
        ],
    },
];

/// Look up a tool by name
pub fn find_tool(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|t| t.name == name)
}

/// Render the catalogue as MCP tool definitions
pub fn tool_definitions() -> Vec<ToolDefinition> {
    TOOLS
        .iter()
        .map(|tool| ToolDefinition {
            name: tool.name.to_string(),
            description: tool.description.to_string(),
            input_schema: input_schema(tool),
        })
        .collect()
}

fn input_schema(tool: &ToolSpec) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in tool.params {
        let mut prop = Map::new();
        let type_name = match param.kind {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Object => "object",
            ParamType::StringArray => "array",
        };
        prop.insert("type".to_string(), json!(type_name));
        prop.insert("description".to_string(), json!(param.description));
        if param.kind == ParamType::StringArray {
            prop.insert("items".to_string(), json!({"type": "string"}));
        }
        if let Some(min) = param.min {
            prop.insert("minimum".to_string(), json!(min));
        }
        if let Some(max) = param.max {
            prop.insert("maximum".to_string(), json!(max));
        }
        if let Some(allowed) = param.allowed {
            prop.insert("enum".to_string(), json!(allowed));
        }
        if let Some(default) = param.default_int {
            prop.insert("default".to_string(), json!(default));
        }
        properties.insert(param.name.to_string(), Value::Object(prop));
        if param.required {
            required.push(param.name);
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), json!(required));
    }
    Value::Object(schema)
}

/// Validate and default a raw argument bag against a tool's parameter table.
///
/// Returns the typed, defaulted arguments; any violation is a validation
/// error raised before the handler runs. Unknown keys are ignored.
pub fn validate_args(tool: &ToolSpec, args: &Value) -> Result<Map<String, Value>> {
    let empty = Map::new();
    let input = match args {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => {
            return Err(BridgeError::Validation(
                "Tool arguments must be an object".to_string(),
            ))
        }
    };

    let mut validated = Map::new();
    for param in tool.params {
        let value = match input.get(param.name) {
            Some(Value::Null) | None => {
                if param.required {
                    return Err(BridgeError::Validation(format!(
                        "Missing required parameter '{}'",
                        param.name
                    )));
                }
                if let Some(default) = param.default_int {
                    validated.insert(param.name.to_string(), json!(default));
                }
                continue;
            }
            Some(value) => value,
        };

        match param.kind {
            ParamType::String => {
                let s = value.as_str().ok_or_else(|| {
                    BridgeError::Validation(format!("Parameter '{}' must be a string", param.name))
                })?;
                if param.non_empty && s.trim().is_empty() {
                    return Err(BridgeError::Validation(format!(
                        "Parameter '{}' must not be empty",
                        param.name
                    )));
                }
                if let Some(allowed) = param.allowed {
                    if !allowed.contains(&s) {
                        return Err(BridgeError::Validation(format!(
                            "Parameter '{}' must be one of: {}",
                            param.name,
                            allowed.join(", ")
                        )));
                    }
                }
            }
            ParamType::Integer => {
                let n = value.as_i64().ok_or_else(|| {
                    BridgeError::Validation(format!(
                        "Parameter '{}' must be an integer",
                        param.name
                    ))
                })?;
                if let Some(min) = param.min {
                    if n < min {
                        return Err(out_of_range(param));
                    }
                }
                if let Some(max) = param.max {
                    if n > max {
                        return Err(out_of_range(param));
                    }
                }
            }
            ParamType::Object => {
                if !value.is_object() {
                    return Err(BridgeError::Validation(format!(
                        "Parameter '{}' must be an object",
                        param.name
                    )));
                }
            }
            ParamType::StringArray => {
                let valid = value
                    .as_array()
                    .is_some_and(|items| items.iter().all(Value::is_string));
                if !valid {
                    return Err(BridgeError::Validation(format!(
                        "Parameter '{}' must be an array of strings",
                        param.name
                    )));
                }
            }
        }
        validated.insert(param.name.to_string(), value.clone());
    }

    Ok(validated)
}

fn out_of_range(param: &ParamSpec) -> BridgeError {
    BridgeError::Validation(format!(
        "Parameter '{}' must be between {} and {}",
        param.name,
        param.min.unwrap_or(i64::MIN),
        param.max.unwrap_or(i64::MAX),
    ))
}
