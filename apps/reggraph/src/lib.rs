//! # reggraph
//!
//! The reggraph application: CLI commands, TOML configuration and the HTTP
//! service around `reggraph-core`.
//!
//! The library target exists so integration tests can build the router and
//! drive the commands without spawning the binary.

pub mod api;
pub mod cli;
pub mod config;
