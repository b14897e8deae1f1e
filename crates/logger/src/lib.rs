//! Shared tracing setup for the sentinel binaries.

mod subscriber;

pub use subscriber::{LogFormat, init_with};
