//! Outcomes of one aggregation run and their merged composite.

use crate::graph::NodeId;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use upstream::client::UpstreamError;

/// Message used when every section loaded without a diagnostic.
pub const ALL_SECTIONS_LOADED: &str = "All sections loaded successfully.";

const DIAGNOSTIC_SEPARATOR: &str = " | ";

/// Result of executing one node (or one fan-out sibling).
#[derive(Debug)]
pub enum NodeOutcome {
    Success(Arc<Value>),
    Failure(UpstreamError),
    /// A prerequisite failed or was itself skipped; the recorded id is the
    /// originally failed node.
    Skipped(NodeId),
}

impl NodeOutcome {
    pub fn success(payload: Value) -> Self {
        NodeOutcome::Success(Arc::new(payload))
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            NodeOutcome::Success(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, NodeOutcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, NodeOutcome::Failure(_))
    }
}

/// Slot recorded for one declared node: either a single outcome or the
/// outcomes of a fan-out group in element order.
#[derive(Debug)]
pub enum NodeResult {
    Single(NodeOutcome),
    Group(Vec<NodeOutcome>),
}

/// Best-effort merged output of one aggregation run: one slot per declared
/// node in declaration order, plus the diagnostics of every degraded
/// section, also in declaration order.
#[derive(Debug, Default)]
pub struct CompositeResult {
    results: IndexMap<NodeId, NodeResult>,
    diagnostics: Vec<String>,
}

impl CompositeResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: NodeId, result: NodeResult) {
        self.results.insert(id, result);
    }

    pub(crate) fn push_diagnostic(&mut self, message: String) {
        self.diagnostics.push(message);
    }

    /// The outcome recorded for a single (non-fan-out) node.
    pub fn outcome(&self, id: NodeId) -> Option<&NodeOutcome> {
        match self.results.get(id) {
            Some(NodeResult::Single(outcome)) => Some(outcome),
            _ => None,
        }
    }

    /// Successful payload of a single node, if any.
    pub fn payload(&self, id: NodeId) -> Option<&Value> {
        self.outcome(id).and_then(NodeOutcome::payload)
    }

    /// Successful payload of a single node as an owned sequence; failures,
    /// skips and non-sequence payloads all collapse to empty.
    pub fn sequence(&self, id: NodeId) -> Vec<Value> {
        self.payload(id)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    /// Outcomes of a fan-out group in element order; empty when the group
    /// never expanded.
    pub fn group(&self, id: NodeId) -> &[NodeOutcome] {
        match self.results.get(id) {
            Some(NodeResult::Group(children)) => children,
            _ => &[],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeResult)> {
        self.results.iter().map(|(id, result)| (*id, result))
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Joined diagnostic line for display, mirroring the legacy behavior of
    /// concatenating per-section notices.
    pub fn summary(&self) -> String {
        if self.diagnostics.is_empty() {
            ALL_SECTIONS_LOADED.to_string()
        } else {
            self.diagnostics.join(DIAGNOSTIC_SEPARATOR)
        }
    }
}
