//! # entigraph
//!
//! Application layer over [`entigraph_core`]: configuration, the HTTP API
//! and the CLI. The binary in `main.rs` wires them together.

pub mod api;
pub mod cli;
pub mod config;
