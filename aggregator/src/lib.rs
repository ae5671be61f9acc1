//! Partial-failure-tolerant aggregation engine.
//!
//! A page declares its upstream calls as a [`graph::RequestGraph`]: some
//! independent, some dependent on earlier payloads, each carrying a failure
//! policy. The [`executor::AggregationExecutor`] runs independent calls
//! concurrently, expands fan-out nodes once their prerequisite sequence is
//! known, and merges everything into a [`outcome::CompositeResult`] plus an
//! ordered diagnostic of what could not be fetched. Only the failure of a
//! node marked [`graph::FailurePolicy::Abort`] fails the whole run.

pub mod error;
pub mod executor;
pub mod graph;
pub mod metrics_defs;
pub mod outcome;
pub mod pages;

#[cfg(test)]
pub mod testutils;
