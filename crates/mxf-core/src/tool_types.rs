// Tool data model (§3 "Tool" / "ToolCall / ToolResult").
//
// `ToolResultShape` and `to_display_text` replace the dynamic-dispatch,
// runtime-sniffing approach to heterogeneous tool-result shapes with an
// explicit parse step at the invoker boundary (§9 "Dynamic dispatch over
// tool-result shapes").

use serde::{Deserialize, Serialize};

/// The explicit "empty, not missing" marker for reading an existing but
/// empty file (§4.4, scenario 2): `to_display_text` substitutes this for
/// any shape that normalizes to an empty string, so callers never mistake
/// an empty read for a missing or failed one.
pub const EMPTY_FILE_MARKER: &str = "[empty file: 0 bytes, file exists]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSource {
    Internal,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    pub source: ToolSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
}

impl ToolDefinition {
    pub fn internal(name: impl Into<String>, description: impl Into<String>, input_schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            source: ToolSource::Internal,
            server_id: None,
        }
    }

    pub fn remote(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        server_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            source: ToolSource::Remote,
            server_id: Some(server_id.into()),
        }
    }
}

/// A call carries `(id, name, input)` (§3, the MCP shape: `{type:
/// tool_use, id, name, input}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// A result carries `(toolCallId, content | error)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: Option<String>,
    pub error: Option<String>,
    /// Set when the runtime, not the tool, produced this result to
    /// preserve the pairing invariant (blocked, timed out, or errored
    /// mid-batch). See `EMPTY_FILE_MARKER` for the distinct "empty, not
    /// missing" case, which is not synthetic.
    #[serde(default)]
    pub synthetic: bool,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: Some(content.into()),
            error: None,
            synthetic: false,
        }
    }

    pub fn failure(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: None,
            error: Some(error.into()),
            synthetic: false,
        }
    }

    /// A runtime-generated result standing in for a call that never
    /// produced a real one: blocked by the breaker, timed out, or an
    /// exception mid-batch. Every call still gets exactly one result (P6).
    pub fn synthetic(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: None,
            error: Some(error.into()),
            synthetic: true,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The shapes a raw tool result can arrive in, before normalization.
/// "Legacy tool result" detection: any object with neither `content`
/// nor `data` nor `text` is legacy and gets stringified (§9).
#[derive(Debug, Clone)]
pub enum ToolResultShape {
    Legacy(serde_json::Value),
    StandardText(String),
    StandardData(serde_json::Value),
    MultiContent(Vec<ContentItem>),
    Binary { mime: String, byte_len: usize },
}

#[derive(Debug, Clone)]
pub enum ContentItem {
    Text(String),
    Data(serde_json::Value),
}

/// Total normalizer from any result shape down to a single display string.
/// A shape that normalizes to an empty string (e.g. reading an existing
/// but empty file) is mapped to `EMPTY_FILE_MARKER` rather than returned
/// as-is, so the invoker boundary never hands the loop an empty success
/// text indistinguishable from "nothing happened" (§4.4, §8 scenario 2).
pub fn to_display_text(shape: &ToolResultShape) -> String {
    let text = match shape {
        ToolResultShape::Legacy(value) => {
            serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
        }
        ToolResultShape::StandardText(text) => text.clone(),
        ToolResultShape::StandardData(value) => {
            serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
        }
        ToolResultShape::MultiContent(items) => items
            .iter()
            .map(|item| match item {
                ContentItem::Text(t) => t.clone(),
                ContentItem::Data(v) => serde_json::to_string(v).unwrap_or_default(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        ToolResultShape::Binary { mime, byte_len } => {
            format!("[binary content: {mime}, {byte_len} bytes]")
        }
    };
    if text.is_empty() {
        EMPTY_FILE_MARKER.to_string()
    } else {
        text
    }
}

/// Parses a raw JSON value returned by a tool invocation into the
/// explicit shape it actually has, per the sniffing rules of §9.
pub fn parse_tool_result_shape(raw: &serde_json::Value) -> ToolResultShape {
    if let Some(obj) = raw.as_object() {
        if let Some(content) = obj.get("content") {
            if let Some(items) = content.as_array() {
                let parsed = items
                    .iter()
                    .map(|item| match item.get("text").and_then(|v| v.as_str()) {
                        Some(text) => ContentItem::Text(text.to_string()),
                        None => ContentItem::Data(item.clone()),
                    })
                    .collect();
                return ToolResultShape::MultiContent(parsed);
            }
            if let Some(text) = content.as_str() {
                return ToolResultShape::StandardText(text.to_string());
            }
            if let Some(text) = content.get("text").and_then(|v| v.as_str()) {
                return ToolResultShape::StandardText(text.to_string());
            }
            if let Some(data) = content.get("data") {
                return ToolResultShape::StandardData(data.clone());
            }
            return ToolResultShape::StandardData(content.clone());
        }
        if let Some(data) = obj.get("data") {
            return ToolResultShape::StandardData(data.clone());
        }
        if let Some(text) = obj.get("text").and_then(|v| v.as_str()) {
            return ToolResultShape::StandardText(text.to_string());
        }
        return ToolResultShape::Legacy(raw.clone());
    }
    ToolResultShape::Legacy(raw.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_object_is_detected_by_absence() {
        let raw = serde_json::json!({"status": "ok", "temp": 72});
        let shape = parse_tool_result_shape(&raw);
        assert!(matches!(shape, ToolResultShape::Legacy(_)));
    }

    #[test]
    fn standard_text_content_is_extracted() {
        let raw = serde_json::json!({"content": {"type": "text", "text": "hello"}});
        let shape = parse_tool_result_shape(&raw);
        assert_eq!(to_display_text(&shape), "hello");
    }

    #[test]
    fn multi_content_joins_text_items() {
        let raw = serde_json::json!({"content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]});
        let shape = parse_tool_result_shape(&raw);
        assert_eq!(to_display_text(&shape), "a\nb");
    }
}
