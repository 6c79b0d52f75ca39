// Binary entry point: loads `ProcessConfig` from the environment, wires
// up the transport gateway, builds the one agent's `ReasoningLoop`/
// `ControlLoop`, and runs until the gateway exits or a fatal error
// occurs. Mirrors `everruns-worker`'s `main.rs` shape: init tracing,
// load config, build components, run to completion.

use std::process::ExitCode;
use std::sync::Arc;

use mxf_core::breaker::CircuitBreaker;
use mxf_core::config::AgentConfig;
use mxf_core::executor::ReasoningLoop;
use mxf_core::memory::ConversationMemory;
use mxf_core::testutil::EchoStreamLlmProvider;
use mxf_core::tools::{ToolInvoker, ToolRegistry};
use mxf_coordinator::{ChannelEventBus, ControlLoop};
use mxf_runtime::{AgentProcess, BusEventEmitter, JsonFileDurableStore, LoggingIndexSink, ProcessConfig, Runtime, TransportGatePublisher};
use mxf_transport::backoff::ReconnectPolicy;
use mxf_transport::{OutboundQueue, TransportGateway, WebSocketConnector};
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::try_init().ok();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "agent process exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> mxf_runtime::Result<()> {
    let process_config = ProcessConfig::from_env()?;
    let agent_id = process_config.runtime.agent_id.clone();
    let channel_id = process_config.runtime.channel_id.clone();

    let event_bus = Arc::new(mxf_core::bus::EventBus::new());
    let channel_bus = Arc::new(ChannelEventBus::new());
    let emitter = Arc::new(BusEventEmitter::new(event_bus.clone()));

    let memory = Arc::new(Mutex::new(ConversationMemory::new(
        agent_id.clone(),
        process_config.runtime.max_history,
        process_config.runtime.max_observations,
    )));
    let registry = Arc::new(ToolRegistry::new());
    registry.refresh(mxf_runtime::builtin_tools::builtin_tool_definitions()).await;

    let invoker = Arc::new(ToolInvoker::new(
        Arc::new(mxf_runtime::builtin_tools::BuiltinToolExecutor),
        CircuitBreaker::new(Default::default()),
    ));

    // Out of scope per §1: a real LLM provider adapter is a
    // production-deployment concern. This is a runnable default.
    let llm = Arc::new(EchoStreamLlmProvider {
        text: "no LLM provider configured".to_string(),
    });

    let reasoning_loop = Arc::new(ReasoningLoop::new(
        agent_id.clone(),
        memory.clone(),
        registry.clone(),
        invoker,
        emitter,
        llm,
    ));

    let outbound = Arc::new(OutboundQueue::new(256));
    let publisher = Arc::new(TransportGatePublisher::new(outbound.clone()));

    let mut loop_config = AgentConfig::from_runtime_config(&process_config.runtime, process_config.system_prompt.clone());
    loop_config.tools = mxf_runtime::builtin_tools::builtin_tool_definitions();

    let control_loop = Arc::new(ControlLoop::new(
        agent_id.clone(),
        channel_id.clone(),
        reasoning_loop,
        loop_config,
        registry,
        publisher,
    ));

    let durable = Arc::new(JsonFileDurableStore::new("./mxf-data"));
    let index = Arc::new(LoggingIndexSink);

    let agent_process = Arc::new(AgentProcess::new(
        agent_id.clone(),
        channel_id.clone(),
        memory,
        control_loop,
        durable,
        index,
        outbound.clone(),
    ));

    let mut runtime = Runtime::new(channel_bus);
    runtime.register_agent(agent_id.clone(), agent_process);

    let (inbound_tx, inbound_rx) = tokio::sync::mpsc::channel(256);
    let gateway = Arc::new(TransportGateway::new(
        process_config.identity,
        WebSocketConnector::new(process_config.server_url),
        outbound,
        inbound_tx,
        ReconnectPolicy::exponential(),
    ));

    let gateway_handle = tokio::spawn({
        let gateway = gateway.clone();
        async move { gateway.run().await }
    });

    runtime.run(inbound_rx).await?;

    match gateway_handle.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.into()),
        Err(join_err) => Err(mxf_runtime::RuntimeError::Internal(join_err.into())),
    }
}
