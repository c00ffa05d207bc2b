//! Wire protocol types carried over the event bus and job queue.
//!
//! Each sub-module defines one tagged-union event family. They share the
//! convention of an internally-tagged `event_type` discriminant so that a
//! subscriber can `serde_json::from_value` into the right family without a
//! second round of dispatch.

pub mod campaign_events;
pub mod stasis_events;
pub mod transfer_events;

pub use campaign_events::{CampaignEvent, RetryReason as CampaignRetryReason};
pub use stasis_events::{StasisEvent, WorkerHeartbeat};
pub use transfer_events::{TransferEvent, TransferKind};
