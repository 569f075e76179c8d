//! `lonelog` as a library: the binary in `main.rs` is a thin wrapper around
//! these modules, split out so the pipeline can be exercised end-to-end from
//! `tests/` without spawning the actual process.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod filters;
pub mod http;
pub mod inputs;
pub mod logging;
pub mod orchestrator;
pub mod outputs;
