//! Reusable event-bus and job-queue runtime shared by the campaign
//! orchestrator, the conversational pipeline, and the stasis broker.
//!
//! This crate has no knowledge of campaigns, calls, or telephony providers —
//! it only provides the publish/subscribe and claimable-queue primitives
//! those higher-level systems are built on, plus the tagged-union wire
//! protocols (in [`protocol`]) that get carried over them. Keeping this
//! separation means the primitives can be exercised and tested in isolation
//! from everything they eventually carry.

pub mod error;
pub mod eventbus;
pub mod jobqueue;
pub mod protocol;

#[cfg(feature = "server")]
pub mod server;

pub use error::{BusError, BusResult};
pub use eventbus::{EventBus, Subscription};
pub use jobqueue::{Claim, JobQueue, SlidingWindowCounter};
