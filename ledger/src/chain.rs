//! Hash-chained, append-only log of call artifacts.
//!
//! Every [`Entry`] carries the SHA-256 hash of its predecessor, so a
//! `.jsonl` file written by this module can be verified after the fact:
//! recompute each entry's hash from its content and `prev_hash`, and confirm
//! it matches both what's stored and what the next entry expects. This is
//! the same approach the orchestrator's durable conversation memory uses for
//! agent thought logs, applied here to the things a workflow run needs to
//! prove it actually said and heard: transcript turns, gathered variables,
//! and telephony status callbacks.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

/// The kind of artifact an [`Entry`] records, used by
/// [`Chain::resolve_context`] to filter a replay down to one concern.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// One turn of the transcript (either speaker).
    TranscriptTurn,
    /// A variable captured by the workflow's extraction step.
    GatheredVariable,
    /// A raw status callback received from the telephony provider.
    TelephonyCallback,
    /// A tool call and its result, recorded for audit.
    ToolInvocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: EntryKind,
    pub content: serde_json::Value,
    pub prev_hash: String,
    pub hash: String,
}

impl Entry {
    fn compute_hash(id: Uuid, timestamp: DateTime<Utc>, kind: EntryKind, content: &serde_json::Value, prev_hash: &str) -> LedgerResult<String> {
        let mut hasher = Sha256::new();
        hasher.update(id.as_bytes());
        hasher.update(timestamp.to_rfc3339().as_bytes());
        hasher.update(serde_json::to_vec(&kind)?);
        hasher.update(serde_json::to_vec(content)?);
        hasher.update(prev_hash.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// An append-only, hash-chained log persisted as newline-delimited JSON.
pub struct Chain {
    path: PathBuf,
    entries: Vec<Entry>,
}

impl Chain {
    /// Open (creating if absent) the chain at `path`, replaying and
    /// verifying every existing entry.
    pub async fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut entries = Vec::new();
        if path.exists() {
            let file = File::open(&path).await?;
            let mut lines = BufReader::new(file).lines();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                entries.push(serde_json::from_str(&line)?);
            }
        }
        let chain = Self { path, entries };
        chain.verify_integrity()?;
        Ok(chain)
    }

    fn last_hash(&self) -> &str {
        self.entries.last().map(|e| e.hash.as_str()).unwrap_or(GENESIS_HASH)
    }

    /// Append a new entry and fsync it to disk before returning.
    pub async fn append(&mut self, kind: EntryKind, content: serde_json::Value) -> LedgerResult<Entry> {
        let id = Uuid::new_v4();
        let timestamp = Utc::now();
        let prev_hash = self.last_hash().to_string();
        let hash = Entry::compute_hash(id, timestamp, kind, &content, &prev_hash)?;
        let entry = Entry {
            id,
            timestamp,
            kind,
            content,
            prev_hash,
            hash,
        };

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Verify every entry's hash matches its content and that the chain of
    /// `prev_hash` links is unbroken.
    pub fn verify_integrity(&self) -> LedgerResult<()> {
        let mut expected_prev = GENESIS_HASH.to_string();
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.prev_hash != expected_prev {
                return Err(LedgerError::ChainBroken {
                    index,
                    expected: expected_prev,
                    found: entry.prev_hash.clone(),
                });
            }
            let recomputed = Entry::compute_hash(entry.id, entry.timestamp, entry.kind, &entry.content, &entry.prev_hash)?;
            if recomputed != entry.hash {
                return Err(LedgerError::TamperedEntry { index });
            }
            expected_prev = entry.hash.clone();
        }
        Ok(())
    }

    /// Replay entries of a single `kind`, in append order.
    pub fn resolve_context(&self, kind: EntryKind) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_and_reopen_preserves_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");

        {
            let mut chain = Chain::open(&path).await.unwrap();
            chain
                .append(EntryKind::TranscriptTurn, serde_json::json!({"speaker": "agent", "text": "Hello!"}))
                .await
                .unwrap();
            chain
                .append(EntryKind::GatheredVariable, serde_json::json!({"name": "confirmed", "value": true}))
                .await
                .unwrap();
        }

        let reopened = Chain::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.verify_integrity().is_ok());
    }

    #[tokio::test]
    async fn detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        {
            let mut chain = Chain::open(&path).await.unwrap();
            chain
                .append(EntryKind::TranscriptTurn, serde_json::json!({"speaker": "agent", "text": "Hi"}))
                .await
                .unwrap();
        }

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let tampered = contents.replace("Hi", "Goodbye");
        tokio::fs::write(&path, tampered).await.unwrap();

        let result = Chain::open(&path).await;
        assert!(matches!(result, Err(LedgerError::TamperedEntry { index: 0 })));
    }

    #[tokio::test]
    async fn resolve_context_filters_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let mut chain = Chain::open(&path).await.unwrap();
        chain
            .append(EntryKind::TranscriptTurn, serde_json::json!({"speaker": "caller", "text": "I'd like to cancel"}))
            .await
            .unwrap();
        chain
            .append(EntryKind::GatheredVariable, serde_json::json!({"name": "intent", "value": "cancel"}))
            .await
            .unwrap();
        chain
            .append(EntryKind::TranscriptTurn, serde_json::json!({"speaker": "agent", "text": "Understood"}))
            .await
            .unwrap();

        let turns = chain.resolve_context(EntryKind::TranscriptTurn);
        assert_eq!(turns.len(), 2);
    }
}
