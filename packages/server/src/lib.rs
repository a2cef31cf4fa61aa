// Site Analysis Service - API Core
//
// This crate provides the backend for submitting website URLs and tracking
// the durable scrape-and-summarize workflows that analyze them.
// Architecture follows domain-driven design with durable execution via the
// ratchet workflow engine.
//
// Workflows are organized per-domain in domains/*/workflows.rs

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
