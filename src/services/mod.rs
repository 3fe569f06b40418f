//! Submission, orchestration and reporting services.

pub mod archive;
pub mod build_step;
pub mod cancel;
pub mod client;
pub mod fingerprint;
pub mod naming;
pub mod orchestrator;
pub mod poller;
pub mod report;
pub mod submission;
