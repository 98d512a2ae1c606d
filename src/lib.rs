//! Benchkeeper - benchmark regression tracking
//!
//! Runs a repository's benchmark suite, compares the result with the stored
//! baseline, and promotes snapshots plus a change report only when something
//! statistically changed.
//!
//! The building blocks are usable on their own: [`pipeline::PipelineOrchestrator`]
//! is the one-shot pipeline, [`service::BenchmarkService`] adds request
//! validation and notification, and [`server`] exposes it over HTTP.

pub mod cli;
pub mod comparison;
pub mod config;
pub mod error;
pub mod measurement;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod server;
pub mod service;
pub mod storage;
