// Default backing for `mxf_core::memory::{DurableStore, IndexSink}`.
//
// The document store and full-text index engine are both out-of-scope
// external collaborators (§1, interface-only). These implementations
// are deliberately minimal — a JSON file per agent, a log line per
// indexing batch — so the runtime is runnable standalone; production
// deployments are expected to provide real adapters behind the same
// trait objects (constructor injection, no feature flags).

use std::path::PathBuf;

use async_trait::async_trait;
use mxf_core::error::{AgentLoopError, Result};
use mxf_core::memory::{DurableStore, IndexSink};
use mxf_core::message::ConversationMessage;
use tokio::fs;
use tokio::sync::Mutex;

pub struct JsonFileDurableStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileDurableStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn path_for(&self, agent_id: &str) -> PathBuf {
        self.dir.join(format!("{agent_id}.json"))
    }
}

#[async_trait]
impl DurableStore for JsonFileDurableStore {
    async fn persist_suffix(&self, agent_id: &str, suffix: &[ConversationMessage]) -> Result<()> {
        let _guard = self.lock.lock().await;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AgentLoopError::quota(format!("could not create durable store dir: {e}")))?;

        let path = self.path_for(agent_id);
        let mut existing = self.load_all(agent_id).await.unwrap_or_default();
        existing.extend(suffix.iter().cloned());

        let serialized = serde_json::to_vec_pretty(&existing)
            .map_err(|e| AgentLoopError::quota(format!("could not serialize durable suffix: {e}")))?;
        fs::write(&path, serialized)
            .await
            .map_err(|e| AgentLoopError::quota(format!("could not write durable store file: {e}")))
    }

    async fn load_all(&self, agent_id: &str) -> Result<Vec<ConversationMessage>> {
        let path = self.path_for(agent_id);
        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AgentLoopError::quota(format!("could not parse durable store file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AgentLoopError::quota(format!("could not read durable store file: {e}"))),
        }
    }
}

/// Logs what would have been sent to the secondary full-text index
/// (`meilisearch:index` / `meilisearch:backfill:*`, §6). Never fails —
/// `IndexError` is by definition non-fatal.
#[derive(Default)]
pub struct LoggingIndexSink;

#[async_trait]
impl IndexSink for LoggingIndexSink {
    async fn index_batch(&self, messages: &[ConversationMessage]) -> Result<()> {
        tracing::debug!(count = messages.len(), "would index batch into secondary search engine");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persists_and_reloads_a_suffix() {
        let dir = std::env::temp_dir().join(format!("mxf-runtime-test-{}", uuid::Uuid::new_v4()));
        let store = JsonFileDurableStore::new(dir.clone());

        store
            .persist_suffix("agent-1", &[ConversationMessage::user("hello")])
            .await
            .unwrap();
        let loaded = store.load_all("agent-1").await.unwrap();
        assert_eq!(loaded.len(), 1);

        let _ = fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn logging_sink_never_fails() {
        let sink = LoggingIndexSink;
        assert!(sink.index_batch(&[ConversationMessage::user("x")]).await.is_ok());
    }
}
