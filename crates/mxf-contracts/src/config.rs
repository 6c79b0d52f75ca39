// Recognized configuration surface (§6 "Configuration surface").
//
// Mirrors the builder idiom of everruns-core::config::AgentConfig /
// AgentConfigBuilder, generalized to the full option set spec.md names.

use serde::{Deserialize, Serialize};

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    8000
}
fn default_max_history() -> usize {
    500
}
fn default_max_observations() -> usize {
    10
}
fn default_max_iterations() -> usize {
    10
}
fn default_cycle_interval_ms() -> u64 {
    30_000
}
fn default_true() -> bool {
    true
}

/// Reasoning-mode options (`reasoning.{enabled, effort, maxTokens}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub effort: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// MXP (encryption protocol) options. MXP itself is out of scope (§1);
/// only the negotiation surface is represented.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MxpOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub preferred_format: Option<String>,
    #[serde(default)]
    pub force_encryption: bool,
}

/// The full recognized configuration surface for one agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentRuntimeConfig {
    pub agent_id: String,
    pub channel_id: String,
    pub llm_provider: String,
    pub default_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_max_observations")]
    pub max_observations: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,

    #[serde(default = "default_true")]
    pub enable_tooling: bool,
    /// Empty/absent ⇒ no restriction beyond channel policy (§3 "Agent").
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Merged with the circuit breaker's built-in defaults, never replaces them.
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
    pub mxp: MxpOptions,
}

impl AgentRuntimeConfig {
    pub fn new(
        agent_id: impl Into<String>,
        channel_id: impl Into<String>,
        llm_provider: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            channel_id: channel_id.into(),
            llm_provider: llm_provider.into(),
            default_model: default_model.into(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_history: default_max_history(),
            max_observations: default_max_observations(),
            max_iterations: default_max_iterations(),
            cycle_interval_ms: default_cycle_interval_ms(),
            enable_tooling: true,
            allowed_tools: Vec::new(),
            circuit_breaker_exempt_tools: Vec::new(),
            use_message_aggregate: false,
            reasoning: ReasoningOptions::default(),
            max_message_size: None,
            disable_task_handling: false,
            mxp: MxpOptions::default(),
        }
    }

    pub fn with_allowed_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.allowed_tools = tools.into_iter().collect();
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_reasoning(mut self, reasoning: ReasoningOptions) -> Self {
        self.reasoning = reasoning;
        self
    }

    /// Missing/empty `allowedTools` means "no restriction beyond channel
    /// policy" per §3 — this is the authoritative check used by the gate
    /// precedence rule in §4.4.
    pub fn has_authoritative_allow_list(&self) -> bool {
        !self.allowed_tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = AgentRuntimeConfig::new("a1", "c1", "openai", "gpt-5.2");
        assert_eq!(cfg.temperature, 0.7);
        assert_eq!(cfg.max_tokens, 8000);
        assert_eq!(cfg.max_history, 500);
        assert_eq!(cfg.max_observations, 10);
        assert_eq!(cfg.max_iterations, 10);
        assert_eq!(cfg.cycle_interval_ms, 30_000);
        assert!(cfg.enable_tooling);
        assert!(!cfg.has_authoritative_allow_list());
    }

    #[test]
    fn empty_allowed_tools_is_not_authoritative() {
        let cfg = AgentRuntimeConfig::new("a1", "c1", "openai", "gpt-5.2")
            .with_allowed_tools(Vec::new());
        assert!(!cfg.has_authoritative_allow_list());
    }

    #[test]
    fn nonempty_allowed_tools_is_authoritative() {
        let cfg = AgentRuntimeConfig::new("a1", "c1", "openai", "gpt-5.2")
            .with_allowed_tools(["read_file".to_string()]);
        assert!(cfg.has_authoritative_allow_list());
    }

    #[test]
    fn deserializes_from_partial_json() {
        let json = serde_json::json!({
            "agentId": "a1",
            "channelId": "c1",
            "llmProvider": "anthropic",
            "defaultModel": "claude",
        });
        let cfg: AgentRuntimeConfig = serde_json::from_value(json).unwrap();
        assert_eq!(cfg.max_iterations, 10);
        assert_eq!(cfg.temperature, 0.7);
    }
}
