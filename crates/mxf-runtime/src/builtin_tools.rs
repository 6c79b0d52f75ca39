// The small set of internal tools the core itself owns rather than a
// remote MCP server: channel messaging, task completion, the
// tool-recommender always kept by contextual filtering (§4.4), and the
// five ORPAR phase tools the coordinator's tool gate names (§4.7).
// Everything else reaching `ToolInvoker` is expected to be a remote
// tool discovered from an MCP server (out of scope per §1).

use async_trait::async_trait;
use mxf_core::error::{AgentLoopError, Result};
use mxf_core::tool_types::{ToolCall, ToolDefinition, ToolResult};
use mxf_core::traits::ToolExecutor;
use serde_json::json;

pub fn builtin_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::internal(
            "messaging_send",
            "Send a message on the current channel",
            json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]}),
        ),
        ToolDefinition::internal(
            "task_complete",
            "Mark the current task as complete",
            json!({"type": "object", "properties": {"summary": {"type": "string"}}}),
        ),
        ToolDefinition::internal(
            "tool_recommend",
            "Recommend a tool for the agent's next action",
            json!({"type": "object", "properties": {"intent": {"type": "string"}}}),
        ),
        ToolDefinition::internal("orpar_observe", "Record an observation", json!({"type": "object"})),
        ToolDefinition::internal("orpar_reason", "Record reasoning over current observations", json!({"type": "object"})),
        ToolDefinition::internal("orpar_plan", "Produce a plan of actions", json!({"type": "object"})),
        ToolDefinition::internal("orpar_act", "Execute the current plan's next action", json!({"type": "object"})),
        ToolDefinition::internal("orpar_reflect", "Reflect on the completed plan", json!({"type": "object"})),
    ]
}

/// Dispatches by name; anything not in `builtin_tool_definitions` is a
/// programming error on the caller's part (the registry should never
/// hand the invoker a call this executor doesn't recognize — remote
/// calls go through a different `ToolExecutor` entirely).
pub struct BuiltinToolExecutor;

#[async_trait]
impl ToolExecutor for BuiltinToolExecutor {
    async fn execute(&self, tool_call: &ToolCall, tool_def: &ToolDefinition) -> Result<ToolResult> {
        match tool_call.name.as_str() {
            "messaging_send" => {
                let text = tool_call.input.get("text").and_then(|v| v.as_str()).unwrap_or_default();
                Ok(ToolResult::success(&tool_call.id, format!("message sent: {text}")))
            }
            "task_complete" => Ok(ToolResult::success(&tool_call.id, "task marked complete")),
            "tool_recommend" | "orpar_observe" | "orpar_reason" | "orpar_plan" | "orpar_act" | "orpar_reflect" => {
                Ok(ToolResult::success(&tool_call.id, "acknowledged"))
            }
            other => Err(AgentLoopError::tool(format!("{other} is not a builtin tool (definition: {})", tool_def.name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: "c1".into(),
            name: name.into(),
            input: json!({}),
        }
    }

    #[tokio::test]
    async fn task_complete_succeeds() {
        let executor = BuiltinToolExecutor;
        let def = ToolDefinition::internal("task_complete", "", json!({}));
        let result = executor.execute(&call("task_complete"), &def).await.unwrap();
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let executor = BuiltinToolExecutor;
        let def = ToolDefinition::internal("read_file", "", json!({}));
        assert!(executor.execute(&call("read_file"), &def).await.is_err());
    }
}
