//! Shared test utilities for contentflow integration tests.
//!
//! - `TestHarness`: an engine over an on-disk database in a temp directory,
//!   wired to mock providers
//! - Builders for requests and engine configuration

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
