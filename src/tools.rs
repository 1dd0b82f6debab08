//! MCP (Model Context Protocol) tool definitions.
//!
//! The registry exposes a [`MemoryService`] as named tools:
//!
//! - **memory**: `read_memory`, `create_memory`, `update_memory`,
//!   `delete_memory`, `add_alias`, `search_memory`
//! - **review**: `list_sessions`, `list_snapshots`, `get_snapshot`, `diff`,
//!   `approve`, `rollback`, `clear_session`, `compare_text`
//!
//! Handlers take and return JSON. Malformed input is reported as
//! [`Error::InvalidArguments`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::graph::{AliasRequest, CreateRequest};
use crate::patch::UpdateRequest;
use crate::service::MemoryService;
use crate::uri::MemoryUri;

/// An MCP tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    /// Tool name (must be unique)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for input parameters
    pub input_schema: Value,
    /// Whether this tool requires confirmation before execution
    pub requires_confirmation: bool,
    /// Category for organization
    pub category: Option<String>,
    /// Example usage
    pub examples: Vec<ToolExample>,
}

impl McpTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: json!({ "type": "object", "properties": {} }),
            requires_confirmation: false,
            category: None,
            examples: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Mark as requiring confirmation.
    pub fn requires_confirmation(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_example(mut self, example: ToolExample) -> Self {
        self.examples.push(example);
        self
    }
}

/// An example of tool usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExample {
    pub name: String,
    pub input: Value,
    /// Expected output description
    pub expected_output: String,
}

impl ToolExample {
    pub fn new(name: impl Into<String>, input: Value, expected_output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input,
            expected_output: expected_output.into(),
        }
    }
}

/// Type alias for tool handler function.
pub type ToolHandler = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Registry of MCP tools.
pub struct McpToolRegistry {
    tools: HashMap<String, (McpTool, ToolHandler)>,
}

impl Default for McpToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== Tool inputs ====================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UriInput {
    uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateInput {
    parent_uri: String,
    content: String,
    priority: u32,
    title: Option<String>,
    disclosure: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateInput {
    uri: String,
    old_string: Option<String>,
    new_string: Option<String>,
    append: Option<String>,
    priority: Option<u32>,
    disclosure: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AliasInput {
    new_uri: String,
    target_uri: String,
    priority: Option<u32>,
    disclosure: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchInput {
    query: String,
    domain: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionInput {
    session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotInput {
    session_id: String,
    resource_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompareInput {
    text_a: String,
    text_b: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoInput {}

fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T> {
    // a missing argument object means "no arguments"
    let input = if input.is_null() { json!({}) } else { input };
    serde_json::from_value(input).map_err(|e| Error::invalid_arguments(e.to_string()))
}

impl McpToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry exposing every memory and review tool of `service`.
    pub fn for_service(service: Arc<MemoryService>) -> Self {
        let mut registry = Self::new();

        registry.register_read_memory(&service);
        registry.register_create_memory(&service);
        registry.register_update_memory(&service);
        registry.register_delete_memory(&service);
        registry.register_add_alias(&service);
        registry.register_search_memory(&service);

        registry.register_review_tools(&service);

        registry
    }

    /// Register a tool with its handler.
    pub fn register(&mut self, tool: McpTool, handler: ToolHandler) {
        self.tools.insert(tool.name.clone(), (tool, handler));
    }

    /// Register a tool whose handler takes typed input and returns a
    /// serializable value.
    fn register_typed<I, O, F>(&mut self, tool: McpTool, service: &Arc<MemoryService>, f: F)
    where
        I: DeserializeOwned,
        O: Serialize,
        F: Fn(&MemoryService, I) -> Result<O> + Send + Sync + 'static,
    {
        let service = Arc::clone(service);
        let handler: ToolHandler = Arc::new(move |input| {
            let output = f(&service, parse_input(input)?)?;
            Ok(serde_json::to_value(output)?)
        });
        self.register(tool, handler);
    }

    /// Get a tool definition by name.
    pub fn get_tool(&self, name: &str) -> Option<&McpTool> {
        self.tools.get(name).map(|(tool, _)| tool)
    }

    /// Get all tool definitions, sorted by name.
    pub fn tools(&self) -> Vec<&McpTool> {
        let mut tools: Vec<&McpTool> = self.tools.values().map(|(tool, _)| tool).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Execute a tool by name.
    pub fn execute(&self, name: &str, input: Value) -> Result<Value> {
        let (_, handler) = self
            .tools
            .get(name)
            .ok_or_else(|| Error::not_found(format!("tool '{}'", name)))?;

        handler(input)
    }

    /// Execute a tool and wrap the outcome as a response payload:
    /// `{"ok": true, "result": ..}` or `{"ok": false, "error": {"kind", "message"}}`.
    pub fn respond(&self, name: &str, input: Value) -> Value {
        match self.execute(name, input) {
            Ok(result) => json!({ "ok": true, "result": result }),
            Err(err) => json!({
                "ok": false,
                "error": { "kind": err.kind(), "message": err.to_string() }
            }),
        }
    }

    /// Get tool count.
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// Get tools by category.
    pub fn tools_by_category(&self, category: &str) -> Vec<&McpTool> {
        self.tools()
            .into_iter()
            .filter(|tool| tool.category.as_deref() == Some(category))
            .collect()
    }

    /// Export tools as JSON schema for MCP.
    pub fn export_schema(&self) -> Value {
        let tools: Vec<Value> = self
            .tools()
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.input_schema,
                })
            })
            .collect();

        json!({ "tools": tools })
    }

    // =========================================================================
    // Memory tools
    // =========================================================================

    fn register_read_memory(&mut self, service: &Arc<MemoryService>) {
        let tool = McpTool::new(
            "read_memory",
            "Read a memory by URI. Returns its content, effective priority and \
             disclosure, children, breadcrumbs and aliases. `core://` lists a \
             domain; `system://boot`, `system://index` and `system://recent/N` \
             are computed views.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "uri": {
                    "type": "string",
                    "description": "Memory URI, e.g. core://agent"
                }
            },
            "required": ["uri"]
        }))
        .with_category("memory")
        .with_example(ToolExample::new(
            "Boot context",
            json!({ "uri": "system://boot" }),
            "Content of every configured boot memory",
        ));

        self.register_typed(tool, service, |svc, input: UriInput| {
            svc.read_memory(&input.uri)
        });
    }

    fn register_create_memory(&mut self, service: &Arc<MemoryService>) {
        let tool = McpTool::new(
            "create_memory",
            "Create a memory under an existing parent (or a domain root such as \
             core://). Without a title the next free number is used.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "parent_uri": {
                    "type": "string",
                    "description": "Parent path or domain root"
                },
                "content": { "type": "string" },
                "priority": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "0 = highest precedence"
                },
                "title": {
                    "type": "string",
                    "pattern": "^[a-z0-9_-]+$",
                    "description": "Path segment for the new memory"
                },
                "disclosure": {
                    "type": "string",
                    "description": "When this memory should be recalled"
                }
            },
            "required": ["parent_uri", "content", "priority"]
        }))
        .with_category("memory")
        .with_example(ToolExample::new(
            "Named memory",
            json!({
                "parent_uri": "core://",
                "content": "Prefers short answers.",
                "priority": 1,
                "title": "my_user"
            }),
            "The created path core://my_user",
        ));

        self.register_typed(tool, service, |svc, input: CreateInput| {
            let mut request =
                CreateRequest::new(MemoryUri::parse(&input.parent_uri)?, input.content, input.priority);
            request.title = input.title;
            request.disclosure = input.disclosure;
            svc.create_memory(&request)
        });
    }

    fn register_update_memory(&mut self, service: &Arc<MemoryService>) {
        let tool = McpTool::new(
            "update_memory",
            "Edit a memory. Patch mode replaces `old_string`, which must occur \
             exactly once, with `new_string`; append mode adds text at the end. \
             Priority and disclosure may be changed in the same call or alone.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "uri": { "type": "string" },
                "old_string": {
                    "type": "string",
                    "description": "Exact text to replace; must be unique"
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement text; empty deletes the match"
                },
                "append": {
                    "type": "string",
                    "description": "Text to add at the end"
                },
                "priority": { "type": "integer", "minimum": 0 },
                "disclosure": {
                    "type": "string",
                    "description": "New disclosure; empty clears it"
                }
            },
            "required": ["uri"]
        }))
        .with_category("memory")
        .with_example(ToolExample::new(
            "Patch",
            json!({
                "uri": "core://my_user",
                "old_string": "short answers",
                "new_string": "detailed answers"
            }),
            "The updated memory",
        ));

        self.register_typed(tool, service, |svc, input: UpdateInput| {
            let request = UpdateRequest::from_parts(
                input.old_string,
                input.new_string,
                input.append,
                input.priority,
                input.disclosure,
            )?;
            svc.update_memory(&input.uri, &request)
        });
    }

    fn register_delete_memory(&mut self, service: &Arc<MemoryService>) {
        let tool = McpTool::new(
            "delete_memory",
            "Remove a path and every path beneath it. Content shared with another \
             alias survives.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": { "uri": { "type": "string" } },
            "required": ["uri"]
        }))
        .with_category("memory");

        self.register_typed(tool, service, |svc, input: UriInput| {
            let outcome = svc.delete_memory(&input.uri)?;
            let removed: Vec<String> = outcome
                .removed
                .iter()
                .map(|s| s.uri().to_string())
                .collect();
            Ok(json!({
                "removed": removed,
                "collected": outcome.collected.len(),
            }))
        });
    }

    fn register_add_alias(&mut self, service: &Arc<MemoryService>) {
        let tool = McpTool::new(
            "add_alias",
            "Make existing content reachable from another URI. The alias may carry \
             its own priority and disclosure.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "new_uri": { "type": "string" },
                "target_uri": { "type": "string" },
                "priority": { "type": "integer", "minimum": 0 },
                "disclosure": { "type": "string" }
            },
            "required": ["new_uri", "target_uri"]
        }))
        .with_category("memory");

        self.register_typed(tool, service, |svc, input: AliasInput| {
            svc.add_alias(&AliasRequest {
                new_uri: MemoryUri::parse(&input.new_uri)?,
                target_uri: MemoryUri::parse(&input.target_uri)?,
                priority: input.priority,
                disclosure: input.disclosure,
            })
        });
    }

    fn register_search_memory(&mut self, service: &Arc<MemoryService>) {
        let tool = McpTool::new(
            "search_memory",
            "Find memories whose URI or content contains the query as a literal \
             substring.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "minLength": 1 },
                "domain": { "type": "string" },
                "limit": { "type": "integer", "minimum": 1, "default": 10 }
            },
            "required": ["query"]
        }))
        .with_category("memory")
        .with_example(ToolExample::new(
            "Search one domain",
            json!({ "query": "lighthouse", "domain": "writer", "limit": 5 }),
            "Matching paths with snippets",
        ));

        self.register_typed(tool, service, |svc, input: SearchInput| {
            svc.search_memory(&input.query, input.domain.as_deref(), input.limit)
        });
    }

    // =========================================================================
    // Review tools
    // =========================================================================

    fn register_review_tools(&mut self, service: &Arc<MemoryService>) {
        let session_schema = json!({
            "type": "object",
            "properties": { "session_id": { "type": "string" } },
            "required": ["session_id"]
        });
        let snapshot_schema = json!({
            "type": "object",
            "properties": {
                "session_id": { "type": "string" },
                "resource_id": {
                    "type": "string",
                    "description": "URI of the changed path"
                }
            },
            "required": ["session_id", "resource_id"]
        });

        self.register_typed(
            McpTool::new("list_sessions", "List review sessions with pending changes.")
                .with_category("review"),
            service,
            |svc, _: NoInput| svc.list_sessions(),
        );

        self.register_typed(
            McpTool::new("list_snapshots", "List the pending changes of a session.")
                .with_schema(session_schema.clone())
                .with_category("review"),
            service,
            |svc, input: SessionInput| svc.list_snapshots(&input.session_id),
        );

        self.register_typed(
            McpTool::new(
                "get_snapshot",
                "Show the state captured before a path was first changed.",
            )
            .with_schema(snapshot_schema.clone())
            .with_category("review"),
            service,
            |svc, input: SnapshotInput| svc.get_snapshot(&input.session_id, &input.resource_id),
        );

        self.register_typed(
            McpTool::new(
                "diff",
                "Compare the captured state of a path with its current state.",
            )
            .with_schema(snapshot_schema.clone())
            .with_category("review"),
            service,
            |svc, input: SnapshotInput| svc.diff(&input.session_id, &input.resource_id),
        );

        self.register_typed(
            McpTool::new("approve", "Keep a change and discard its snapshot.")
                .with_schema(snapshot_schema.clone())
                .with_category("review"),
            service,
            |svc, input: SnapshotInput| {
                svc.approve(&input.session_id, &input.resource_id)?;
                Ok(json!({ "approved": input.resource_id }))
            },
        );

        self.register_typed(
            McpTool::new(
                "rollback",
                "Undo a change: restore the captured state, or delete a path the \
                 session created.",
            )
            .with_schema(snapshot_schema)
            .with_category("review")
            .requires_confirmation(),
            service,
            |svc, input: SnapshotInput| svc.rollback(&input.session_id, &input.resource_id),
        );

        self.register_typed(
            McpTool::new(
                "clear_session",
                "Approve every pending change of a session.",
            )
            .with_schema(session_schema)
            .with_category("review")
            .requires_confirmation(),
            service,
            |svc, input: SessionInput| {
                let cleared = svc.clear_session(&input.session_id)?;
                Ok(json!({ "cleared": cleared }))
            },
        );

        self.register_typed(
            McpTool::new("compare_text", "Unified line diff of two texts.")
                .with_schema(json!({
                    "type": "object",
                    "properties": {
                        "text_a": { "type": "string" },
                        "text_b": { "type": "string" }
                    },
                    "required": ["text_a", "text_b"]
                }))
                .with_category("review"),
            service,
            |svc, input: CompareInput| Ok(svc.compare_text(&input.text_a, &input.text_b)),
        );
    }
}
