// Loads the recognized configuration surface (§6) plus the handshake
// identity from the process environment, mirroring the
// `everruns-control-plane::config` convention of env-first
// configuration with `.env` support via `dotenvy`.

use mxf_contracts::config::AgentRuntimeConfig;
use mxf_transport::HandshakeIdentity;

use crate::error::{Result, RuntimeError};

/// Everything needed to bring one agent process up: its wire-level
/// config, the handshake identity, and where to find the exchange
/// server.
pub struct ProcessConfig {
    pub runtime: AgentRuntimeConfig,
    pub identity: HandshakeIdentity,
    pub server_url: String,
    pub system_prompt: String,
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| RuntimeError::config(format!("missing required env var {name}")))
}

fn env_var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl ProcessConfig {
    /// §7 "ConfigError — missing or invalid required configuration;
    /// fail fast at construction." Required: `agentId`, `channelId`,
    /// domain key, and credentials; everything else in §6's
    /// configuration surface has a documented default.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let agent_id = env_var("MXF_AGENT_ID")?;
        let channel_id = env_var("MXF_CHANNEL_ID")?;
        let domain_key = env_var("MXF_DOMAIN_KEY")?;
        let credentials = env_var("MXF_CREDENTIALS")?;
        let server_url = env_var_or("MXF_SERVER_URL", "wss://localhost:8080");
        let llm_provider = env_var_or("MXF_LLM_PROVIDER", "openai");
        let default_model = env_var_or("MXF_DEFAULT_MODEL", "gpt-5.2");
        let system_prompt = env_var_or("MXF_SYSTEM_PROMPT", "You are a helpful assistant.");
        let api_key = std::env::var("MXF_API_KEY").ok();

        let allowed_tools = std::env::var("MXF_ALLOWED_TOOLS")
            .map(|v| v.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        let circuit_breaker_exempt_tools = std::env::var("MXF_CIRCUIT_BREAKER_EXEMPT_TOOLS")
            .map(|v| v.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();

        let runtime = AgentRuntimeConfig {
            agent_id: agent_id.clone(),
            channel_id: channel_id.clone(),
            llm_provider,
            default_model,
            api_key,
            temperature: env_parse_or("MXF_TEMPERATURE", 0.7),
            max_tokens: env_parse_or("MXF_MAX_TOKENS", 8000),
            max_history: env_parse_or("MXF_MAX_HISTORY", 500),
            max_observations: env_parse_or("MXF_MAX_OBSERVATIONS", 10),
            max_iterations: env_parse_or("MXF_MAX_ITERATIONS", 10),
            cycle_interval_ms: env_parse_or("MXF_CYCLE_INTERVAL_MS", 30_000),
            enable_tooling: env_parse_or("MXF_ENABLE_TOOLING", true),
            allowed_tools,
            circuit_breaker_exempt_tools,
            use_message_aggregate: env_parse_or("MXF_USE_MESSAGE_AGGREGATE", false),
            reasoning: Default::default(),
            max_message_size: std::env::var("MXF_MAX_MESSAGE_SIZE").ok().and_then(|v| v.parse().ok()),
            disable_task_handling: env_parse_or("MXF_DISABLE_TASK_HANDLING", false),
            mxp: Default::default(),
        };

        let identity = HandshakeIdentity {
            agent_id,
            channel_id,
            domain_key,
            credentials,
        };

        Ok(Self {
            runtime,
            identity,
            server_url,
            system_prompt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env vars are process-global; serialize the tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [
            "MXF_AGENT_ID",
            "MXF_CHANNEL_ID",
            "MXF_DOMAIN_KEY",
            "MXF_CREDENTIALS",
            "MXF_SERVER_URL",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn missing_required_var_fails_fast() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let err = ProcessConfig::from_env().unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn reads_required_and_defaulted_fields() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("MXF_AGENT_ID", "agent-1");
        std::env::set_var("MXF_CHANNEL_ID", "channel-1");
        std::env::set_var("MXF_DOMAIN_KEY", "domain");
        std::env::set_var("MXF_CREDENTIALS", "secret");

        let config = ProcessConfig::from_env().unwrap();
        assert_eq!(config.runtime.agent_id, "agent-1");
        assert_eq!(config.runtime.max_iterations, 10);
        assert_eq!(config.server_url, "wss://localhost:8080");
        clear_env();
    }
}
