//! Shared utilities for the ticker analysis workspace
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup and environment-driven configuration helpers.

pub mod config;
pub mod logging;

pub use config::{ConfigError, env_flag, env_parse, env_string};
pub use logging::{init_tracing, init_tracing_json, try_init_tracing};
