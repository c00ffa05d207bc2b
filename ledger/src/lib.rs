//! Durable, hash-chained recording of call artifacts.
//!
//! Each workflow run gets an append-only `.jsonl` log ([`chain::Chain`])
//! whose entries are linked by SHA-256 hash, plus bounded in-memory buffers
//! ([`recording::AudioBuffer`], [`recording::TranscriptBuffer`]) for the raw
//! audio and transcript while the call is in progress. [`WorkflowRunLedger`]
//! ties the two together per run, and [`LedgerRegistry`] hands out shared
//! handles to callers across the pipeline and telephony layers.

pub mod chain;
pub mod error;
pub mod recording;
pub mod workflow_run_ledger;

pub use chain::{Chain, Entry, EntryKind};
pub use error::{LedgerError, LedgerResult};
pub use recording::{AudioBuffer, Speaker, TranscriptBuffer, TranscriptTurn};
pub use workflow_run_ledger::{LedgerRegistry, WorkflowRunLedger};
