/// Monitoring engine module - handles execution of monitoring checks
///
/// This module is responsible for:
/// - Probing HTTP/HTTPS targets behind the outbound address guard
/// - Deciding which monitors are due on each tick
/// - Recording results and detecting up/down transitions
pub mod checker;
pub mod executor;
pub mod scheduler;
pub mod transitions;
pub mod types;
pub mod validation;

pub use checker::{Checker, HttpChecker};
pub use executor::{CheckOutcome, CheckPipeline};
pub use scheduler::MonitoringScheduler;
pub use transitions::TransitionTracker;
pub use types::CheckResult;
pub use validation::{ProbeError, TargetGuard};
