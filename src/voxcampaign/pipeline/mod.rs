//! The real-time conversational pipeline: frames flow from the telephony
//! transport through turn-taking, the engine session, and back out again,
//! with every frame also observed for ledger recording and latency
//! feedback.

pub mod frame;
pub mod processor;
pub mod realtime_feedback;
pub mod recording;
pub mod transport;
pub mod turn;

pub use frame::{ControlFrame, Frame, Pts};
pub use processor::PipelineProcessor;
pub use recording::FrameRecorder;
pub use transport::{ChannelTransport, PipelineTransport};
pub use turn::{StartStrategy, StopStrategy, TurnController, TurnPhase};
