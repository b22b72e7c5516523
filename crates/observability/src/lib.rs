//! Process-wide tracing setup for orgscope binaries and tests.

pub mod subscriber;

pub use subscriber::{DEFAULT_FILTER, init, init_for_tests, init_with_default};
