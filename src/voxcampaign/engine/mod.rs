//! The conversational engine: drives one call's LLM interaction against its
//! workflow graph, turn by turn, dispatching tool calls and deciding when
//! to move to the next node.

pub mod aggregation;
pub mod call;
pub mod idle;
pub mod session;
pub mod tools;
pub mod variable_extraction;

use bus::protocol::TransferKind;
use serde::{Deserialize, Serialize};

pub use call::CallEngine;
pub use session::EngineSession;

/// Signals a built-in tool (or the idle-timeout watcher) can raise to steer
/// the pipeline outside the normal speak/listen turn cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineControlSignal {
    EndCall { reason: String },
    Transfer { destination: String, kind: TransferKind },
}
