//! The distributed stasis event broker: one [`manager::StasisManager`] per
//! organization owns the upstream ARI WebSocket and republishes events to
//! any number of [`worker::StasisWorker`]s over the shared bus, so worker
//! processes can scale independently of provider connections.

pub mod manager;
pub mod worker;

pub use manager::{ReconnectBackoff, StasisManager};
pub use worker::StasisWorker;
