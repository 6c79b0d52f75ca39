// Agent loop configuration.
//
// `AgentConfig` is the full recognized configuration surface (§6), not
// just the LLM-call subset the teacher's `AgentConfig` covers. It is
// separate from `mxf_contracts::AgentRuntimeConfig`: the contracts type
// is the wire/deserialization shape, this one also carries the resolved
// `ToolDefinition`s and a rendered system prompt the loop actually runs
// with.

use crate::tool_types::ToolDefinition;
use mxf_contracts::config::{AgentRuntimeConfig, ReasoningOptions};
use serde::{Deserialize, Serialize};

fn default_max_iterations() -> usize {
    10
}

/// Governs whether the completion heuristic may auto-complete a task
/// (§4.6 step 9): `reactive`/`passive` agents never auto-complete, even
/// at a score ≥ 0.8 — the loop still ends, but without marking the task
/// done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    #[default]
    Proactive,
    Reactive,
    Passive,
}

impl AgentRole {
    pub fn may_auto_complete(&self) -> bool {
        matches!(self, AgentRole::Proactive)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub system_prompt: String,
    pub model: String,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub max_history: usize,
    #[serde(default)]
    pub max_observations: usize,
    #[serde(default)]
    pub cycle_interval_ms: u64,
    #[serde(default = "default_true")]
    pub enable_tooling: bool,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub circuit_breaker_exempt_tools: Vec<String>,
    #[serde(default)]
    pub use_message_aggregate: bool,
    #[serde(default)]
    pub reasoning: ReasoningOptions,
    #[serde(default)]
    pub max_message_size: Option<u64>,
    #[serde(default)]
    pub disable_task_handling: bool,
    #[serde(default)]
    pub role: AgentRole,
}

fn default_true() -> bool {
    true
}

impl AgentConfig {
    pub fn new(system_prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            model: model.into(),
            tools: Vec::new(),
            max_iterations: default_max_iterations(),
            temperature: Some(0.7),
            max_tokens: Some(8000),
            max_history: 500,
            max_observations: 10,
            cycle_interval_ms: 30_000,
            enable_tooling: true,
            allowed_tools: Vec::new(),
            circuit_breaker_exempt_tools: Vec::new(),
            use_message_aggregate: false,
            reasoning: ReasoningOptions::default(),
            max_message_size: None,
            disable_task_handling: false,
            role: AgentRole::default(),
        }
    }

    /// Builds a loop config from the wire-level recognized configuration
    /// surface, leaving `system_prompt`/`tools` to be filled in by the
    /// caller (they are not part of the wire config).
    pub fn from_runtime_config(wire: &AgentRuntimeConfig, system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            model: wire.default_model.clone(),
            tools: Vec::new(),
            max_iterations: wire.max_iterations,
            temperature: Some(wire.temperature),
            max_tokens: Some(wire.max_tokens),
            max_history: wire.max_history,
            max_observations: wire.max_observations,
            cycle_interval_ms: wire.cycle_interval_ms,
            enable_tooling: wire.enable_tooling,
            allowed_tools: wire.allowed_tools.clone(),
            circuit_breaker_exempt_tools: wire.circuit_breaker_exempt_tools.clone(),
            use_message_aggregate: wire.use_message_aggregate,
            reasoning: wire.reasoning.clone(),
            max_message_size: wire.max_message_size,
            disable_task_handling: wire.disable_task_handling,
            role: AgentRole::default(),
        }
    }

    /// Empty/absent `allowedTools` means no restriction beyond channel
    /// policy — this is the authoritative check for the gate precedence
    /// rule in §4.4.
    pub fn has_authoritative_allow_list(&self) -> bool {
        !self.allowed_tools.is_empty()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new("You are a helpful assistant.", "gpt-5.2")
    }
}

/// Fluent builder mirroring `AgentConfigBuilder`'s shape, generalized to
/// the full configuration surface rather than only the LLM-call subset.
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AgentConfig::default(),
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.config.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = ToolDefinition>) -> Self {
        self.config.tools.extend(tools);
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    pub fn allowed_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.config.allowed_tools = tools.into_iter().collect();
        self
    }

    pub fn circuit_breaker_exempt_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.config.circuit_breaker_exempt_tools = tools.into_iter().collect();
        self
    }

    pub fn reasoning(mut self, reasoning: ReasoningOptions) -> Self {
        self.config.reasoning = reasoning;
        self
    }

    pub fn disable_task_handling(mut self, disabled: bool) -> Self {
        self.config.disable_task_handling = disabled;
        self
    }

    pub fn role(mut self, role: AgentRole) -> Self {
        self.config.role = role;
        self
    }

    pub fn build(self) -> AgentConfig {
        self.config
    }
}

impl Default for AgentConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_expected_config() {
        let config = AgentConfigBuilder::new()
            .system_prompt("be helpful")
            .model("claude")
            .max_iterations(5)
            .allowed_tools(["read_file".to_string()])
            .build();

        assert_eq!(config.system_prompt, "be helpful");
        assert_eq!(config.max_iterations, 5);
        assert!(config.has_authoritative_allow_list());
    }

    #[test]
    fn defaults_have_no_allow_list_restriction() {
        let config = AgentConfig::default();
        assert!(!config.has_authoritative_allow_list());
        assert_eq!(config.max_history, 500);
    }
}
