//! Object storage trait boundary for call artifacts: recordings,
//! transcripts, and uploaded contact CSVs.
//!
//! Storage backend drivers (S3, GCS, local disk) are out of scope for this
//! crate, the same as [`crate::repository`]'s stance on database drivers;
//! only the trait and an in-memory reference implementation live here. Key
//! layout is fixed by convention rather than left to each caller:
//! `recordings/{workflow_run_id}.wav`, `transcripts/{workflow_run_id}.txt`,
//! `campaigns/{org_id}/{uuid}_{filename}.csv`.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::VoxResult;

pub fn recording_key(workflow_run_id: Uuid) -> String {
    format!("recordings/{workflow_run_id}.wav")
}

pub fn transcript_key(workflow_run_id: Uuid) -> String {
    format!("transcripts/{workflow_run_id}.txt")
}

pub fn campaign_upload_key(org_id: Uuid, filename: &str) -> String {
    format!("campaigns/{org_id}/{}_{filename}", Uuid::new_v4())
}

/// A content-addressed-by-key blob store. Keys are opaque strings; callers
/// are expected to build them with [`recording_key`], [`transcript_key`], or
/// [`campaign_upload_key`] rather than hand-rolling the layout.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> VoxResult<()>;
    async fn get(&self, key: &str) -> VoxResult<Vec<u8>>;
    async fn delete(&self, key: &str) -> VoxResult<()>;
    async fn exists(&self, key: &str) -> VoxResult<bool>;
}
