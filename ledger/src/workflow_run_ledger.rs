//! Per-workflow-run ledgers, keyed by run id and shared across the tasks
//! that make up a single call (pipeline runtime, telephony transport,
//! transfer manager) without a central lock serializing unrelated calls.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::chain::{Chain, EntryKind};
use crate::error::LedgerResult;
use crate::recording::{AudioBuffer, Speaker, TranscriptBuffer};

/// Everything this crate records for one workflow run: the durable,
/// hash-chained event log plus the in-memory audio/transcript buffers that
/// get flushed into it.
pub struct WorkflowRunLedger {
    pub chain: Mutex<Chain>,
    pub audio: Mutex<AudioBuffer>,
    pub transcript: Mutex<TranscriptBuffer>,
}

impl WorkflowRunLedger {
    async fn open(path: PathBuf) -> LedgerResult<Self> {
        Ok(Self {
            chain: Mutex::new(Chain::open(path).await?),
            audio: Mutex::new(AudioBuffer::new()),
            transcript: Mutex::new(TranscriptBuffer::new(10_000)),
        })
    }

    pub async fn record_turn(&self, speaker: Speaker, text: impl Into<String>) -> LedgerResult<()> {
        let text = text.into();
        self.transcript.lock().await.push(speaker, text.clone()).ok();
        let speaker_label = match speaker {
            Speaker::Caller => "caller",
            Speaker::Agent => "agent",
        };
        self.chain
            .lock()
            .await
            .append(EntryKind::TranscriptTurn, serde_json::json!({"speaker": speaker_label, "text": text}))
            .await?;
        Ok(())
    }

    pub async fn record_gathered_variable(&self, name: &str, value: serde_json::Value) -> LedgerResult<()> {
        self.chain
            .lock()
            .await
            .append(EntryKind::GatheredVariable, serde_json::json!({"name": name, "value": value}))
            .await?;
        Ok(())
    }

    pub async fn record_telephony_callback(&self, payload: serde_json::Value) -> LedgerResult<()> {
        self.chain.lock().await.append(EntryKind::TelephonyCallback, payload).await?;
        Ok(())
    }

    pub async fn record_tool_invocation(&self, tool_name: &str, arguments: serde_json::Value, result: serde_json::Value) -> LedgerResult<()> {
        self.chain
            .lock()
            .await
            .append(
                EntryKind::ToolInvocation,
                serde_json::json!({"tool": tool_name, "arguments": arguments, "result": result}),
            )
            .await?;
        Ok(())
    }
}

/// A registry of open [`WorkflowRunLedger`]s, one per in-progress call.
/// Ledgers are opened lazily and stay resident until [`LedgerRegistry::close`]
/// is called at call teardown.
#[derive(Clone)]
pub struct LedgerRegistry {
    base_dir: PathBuf,
    open: Arc<DashMap<Uuid, Arc<WorkflowRunLedger>>>,
}

impl LedgerRegistry {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            open: Arc::new(DashMap::new()),
        }
    }

    pub async fn ledger_for(&self, run_id: Uuid) -> LedgerResult<Arc<WorkflowRunLedger>> {
        if let Some(existing) = self.open.get(&run_id) {
            return Ok(existing.clone());
        }
        let path = self.base_dir.join(format!("{run_id}.jsonl"));
        let ledger = Arc::new(WorkflowRunLedger::open(path).await?);
        self.open.insert(run_id, ledger.clone());
        Ok(ledger)
    }

    /// Drop the in-memory handle for a completed run. The on-disk chain
    /// persists; only the resident buffers and open file handle are
    /// released.
    pub fn close(&self, run_id: Uuid) {
        self.open.remove(&run_id);
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ledger_for_reuses_the_same_instance() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LedgerRegistry::new(dir.path());
        let run_id = Uuid::new_v4();

        let first = registry.ledger_for(run_id).await.unwrap();
        first.record_turn(Speaker::Agent, "Hello").await.unwrap();

        let second = registry.ledger_for(run_id).await.unwrap();
        assert_eq!(second.chain.lock().await.len(), 1);
        assert_eq!(registry.open_count(), 1);
    }

    #[tokio::test]
    async fn close_releases_the_in_memory_handle() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LedgerRegistry::new(dir.path());
        let run_id = Uuid::new_v4();
        registry.ledger_for(run_id).await.unwrap();
        registry.close(run_id);
        assert_eq!(registry.open_count(), 0);
    }
}
