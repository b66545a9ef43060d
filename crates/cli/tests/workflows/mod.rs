//! Workflow integration tests
//!
//! Each module drives one pipeline through the CLI and checks the
//! artifacts and exit codes it leaves behind.

pub mod config;
pub mod digest;
pub mod manifest;
pub mod snapshot;
