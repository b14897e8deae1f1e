//! Sentinel monitoring service.
//!
//! Periodically checks user-declared HTTP(S) endpoints, persists every check
//! together with a rolling daily aggregate, detects up/down transitions and
//! fans notifications out to the enabled webhooks.

pub mod config;
pub mod database;
pub mod monitoring;
pub mod notifications;
pub mod orchestrator;
pub mod pool;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use orchestrator::Orchestrator;
