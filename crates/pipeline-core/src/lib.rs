//! Shared data model, classifier, plan/instruction derivation and
//! artifact store for the CI failure-triage pipeline.
//!
//! Consumed by both the Log Processor (classification + persistence)
//! and the Fix-Agent (reads the persisted [`model::Analysis`] as
//! immutable input).

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod artifact_store;
pub mod classifier;
pub mod instructions;
pub mod model;
pub mod plan;
