//! Treeseal proof - external timestamping for written manifests
//!
//! This crate provides:
//! - The `ProofClient` seam and the OpenTimestamps CLI client (`client`)
//! - `TimestampProofManager`, turning every request into a `ProofOutcome` (`manager`)

pub mod client;
pub mod manager;

pub use client::{OtsClient, ProofClient, ProofError, ProofSettings, UpgradeStatus};
pub use manager::{retire_stale_proof, ProofOutcome, TimestampProofManager};
