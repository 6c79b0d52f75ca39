// `updateAllowedTools` (§3 "Agent", §4.7): the only way an agent's
// allowed-tool list and system prompt are mutated after startup. Must
// (a) swap the list atomically, (b) push the change to the server,
// (c) refresh the local tool cache, and (d) regenerate the system
// prompt — in that order, since the prompt regeneration reads the
// just-swapped list.

use async_trait::async_trait;
use mxf_core::config::AgentConfig;
use mxf_core::tools::ToolRegistry;

/// Pushes an allow-list change to the exchange server (step b). The
/// coordinator stays transport-agnostic: `mxf-runtime` wires this to
/// an `mxf_transport::OutboundQueue` in production, a recording fake
/// in tests.
#[async_trait]
pub trait GatePublisher: Send + Sync {
    async fn publish_allowed_tools(&self, agent_id: &str, channel_id: &str, tools: &[String]) -> anyhow::Result<()>;
}

const TOOL_LIST_MARKER: &str = "\n\n---\nCurrently available tools: ";

/// Regenerates the system prompt's trailing tool-list block (step d).
/// Idempotent: re-running against an already-regenerated prompt
/// replaces the previous block rather than stacking another one.
pub fn regenerate_system_prompt(base_prompt: &str, allowed_tools: &[String]) -> String {
    let base = base_prompt.split(TOOL_LIST_MARKER).next().unwrap_or(base_prompt);
    if allowed_tools.is_empty() {
        return base.to_string();
    }
    format!("{base}{TOOL_LIST_MARKER}{}", allowed_tools.join(", "))
}

/// Applies an allow-list change end to end. The registry refresh
/// (step c) reloads from `config.tools` — the full discovered catalog
/// — so remote tools discovered since the last refresh become visible
/// before the list is filtered down to `tools`.
pub async fn update_allowed_tools(
    config: &mut AgentConfig,
    registry: &ToolRegistry,
    publisher: &dyn GatePublisher,
    agent_id: &str,
    channel_id: &str,
    tools: Vec<String>,
) -> anyhow::Result<()> {
    config.allowed_tools = tools.clone();
    publisher.publish_allowed_tools(agent_id, channel_id, &tools).await?;
    registry.refresh(config.tools.clone()).await;
    config.system_prompt = regenerate_system_prompt(&config.system_prompt, &tools);
    Ok(())
}
