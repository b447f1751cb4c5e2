//! Core Module - Business Logic
//!
//! Resolver state machine, score aggregation and the pipeline tying the
//! analyzers, oracles and cache together.

pub mod aggregator;
pub mod pipeline;
pub mod resolver;

pub use aggregator::{aggregate, Aggregation};
pub use pipeline::{BatchItem, Collaborators, Scanner};
pub use resolver::{Outcome, Resolution, Resolver, Stage};
