//! Campaign lifecycle, scheduling, and fault-tolerance.
//!
//! [`batch`] selects the next contacts to dial, [`schedule`] decides
//! whether a campaign is allowed to dial right now, [`circuit_breaker`]
//! decides whether it should be dialing at all given recent failures,
//! [`runner`] exposes the operator-facing start/pause/resume surface, and
//! [`orchestrator`] ties the three together behind the event bus.

pub mod batch;
pub mod circuit_breaker;
pub mod orchestrator;
pub mod runner;
pub mod schedule;

pub use batch::BatchScheduler;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats};
pub use orchestrator::CampaignOrchestrator;
pub use runner::CampaignRunnerService;
pub use schedule::is_within_schedule;
