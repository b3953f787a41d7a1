//! Vertexa Core
//!
//! This crate contains the shared utilities used by the Vertexa crates:
//! logging setup, puffin profiling scopes and hash collections.

pub mod alloc;
pub mod logging;
pub mod profiling;
