//! Request graph model: declared upstream calls, their dependencies and
//! per-call failure policy.
//!
//! A graph is built fresh per page request and handed to the executor. The
//! builder rejects malformed graphs (duplicate ids, unknown dependencies,
//! cycles) so execution can assume a finite DAG.

use crate::error::GraphError;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use upstream::client::{UpstreamError, UpstreamRequest};

pub type NodeId = &'static str;

/// Snapshot of resolved dependency payloads handed to a node when its
/// request is constructed.
#[derive(Clone, Default)]
pub struct Deps {
    values: HashMap<NodeId, Arc<Value>>,
}

impl Deps {
    pub(crate) fn new(values: HashMap<NodeId, Arc<Value>>) -> Self {
        Self { values }
    }

    pub fn get(&self, id: NodeId) -> Option<&Value> {
        self.values.get(id).map(Arc::as_ref)
    }
}

/// Builds one upstream request from resolved dependencies. Returning
/// `None` means there is nothing to fetch: the node succeeds with a null
/// payload and no network activity.
pub type RequestFn = Box<dyn Fn(&Deps) -> Option<UpstreamRequest> + Send + Sync>;

/// Builds the request for one fan-out sibling from its sequence element.
pub type FanoutFn = Box<dyn Fn(usize, &Value, &Deps) -> Option<UpstreamRequest> + Send + Sync>;

/// Pure derivation from dependency payloads, no network activity.
pub type TransformFn = Box<dyn Fn(&Deps) -> Result<Value, UpstreamError> + Send + Sync>;

/// Renders the diagnostic for a failed node. Fan-out failures receive the
/// sequence element the failing sibling was instantiated for.
pub type DiagnosticFn = Box<dyn Fn(Option<&Value>) -> String + Send + Sync>;

pub enum Work {
    Request(RequestFn),
    Transform(TransformFn),
    Fanout { over: NodeId, each: FanoutFn },
}

/// What a node's failure means for the aggregation as a whole.
pub enum FailurePolicy {
    /// Failure invalidates the entire aggregation.
    Abort,
    /// Failure degrades this section only: the diagnostic is recorded and
    /// dependents are skipped.
    Degrade(DiagnosticFn),
    /// Failure is logged and otherwise invisible (fire-and-forget writes).
    Ignore,
}

impl FailurePolicy {
    pub fn degrade(message: impl Into<String>) -> Self {
        let message = message.into();
        FailurePolicy::Degrade(Box::new(move |_| message.clone()))
    }

    pub fn degrade_with(f: impl Fn(Option<&Value>) -> String + Send + Sync + 'static) -> Self {
        FailurePolicy::Degrade(Box::new(f))
    }
}

pub struct RequestNode {
    pub(crate) id: NodeId,
    pub(crate) depends_on: Vec<NodeId>,
    pub(crate) policy: FailurePolicy,
    pub(crate) work: Work,
}

impl RequestNode {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// The declared set of request nodes for one logical page, in declaration
/// order. Always a finite DAG.
pub struct RequestGraph {
    pub(crate) nodes: Vec<RequestNode>,
}

impl std::fmt::Debug for RequestGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGraph")
            .field(
                "nodes",
                &self.nodes.iter().map(|n| n.id).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl RequestGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<RequestNode>,
}

impl GraphBuilder {
    /// Declare a node that issues one upstream call.
    pub fn request(
        &mut self,
        id: NodeId,
        depends_on: &[NodeId],
        policy: FailurePolicy,
        build: impl Fn(&Deps) -> Option<UpstreamRequest> + Send + Sync + 'static,
    ) -> &mut Self {
        self.nodes.push(RequestNode {
            id,
            depends_on: depends_on.to_vec(),
            policy,
            work: Work::Request(Box::new(build)),
        });
        self
    }

    /// Declare a node that derives its payload from its dependencies
    /// without any network activity.
    pub fn transform(
        &mut self,
        id: NodeId,
        depends_on: &[NodeId],
        policy: FailurePolicy,
        derive: impl Fn(&Deps) -> Result<Value, UpstreamError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.nodes.push(RequestNode {
            id,
            depends_on: depends_on.to_vec(),
            policy,
            work: Work::Transform(Box::new(derive)),
        });
        self
    }

    /// Declare a node instantiated once per element of the `over` node's
    /// sequence payload, each sibling an independent call.
    pub fn fanout(
        &mut self,
        id: NodeId,
        over: NodeId,
        policy: FailurePolicy,
        each: impl Fn(usize, &Value, &Deps) -> Option<UpstreamRequest> + Send + Sync + 'static,
    ) -> &mut Self {
        self.nodes.push(RequestNode {
            id,
            depends_on: vec![over],
            policy,
            work: Work::Fanout {
                over,
                each: Box::new(each),
            },
        });
        self
    }

    pub fn build(self) -> Result<RequestGraph, GraphError> {
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id) {
                return Err(GraphError::DuplicateNode(node.id));
            }
        }

        for node in &self.nodes {
            for &dependency in &node.depends_on {
                if !ids.contains(dependency) {
                    return Err(GraphError::UnknownDependency {
                        node: node.id,
                        dependency,
                    });
                }
            }
        }

        self.check_acyclic()?;

        Ok(RequestGraph { nodes: self.nodes })
    }

    /// Kahn's algorithm over the dependency edges; anything left over sits
    /// on a cycle.
    fn check_acyclic(&self) -> Result<(), GraphError> {
        let index: HashMap<NodeId, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id, i))
            .collect();

        let mut indegree = vec![0usize; self.nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            indegree[i] = node.depends_on.len();
            for dependency in &node.depends_on {
                dependents[index[dependency]].push(i);
            }
        }

        let mut queue: VecDeque<usize> = indegree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(i, _)| i)
            .collect();

        let mut processed = 0;
        while let Some(i) = queue.pop_front() {
            processed += 1;
            for &dependent in &dependents[i] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if processed < self.nodes.len() {
            let stuck = self
                .nodes
                .iter()
                .enumerate()
                .find(|(i, _)| indegree[*i] > 0)
                .map(|(_, node)| node.id)
                .unwrap_or("unknown");
            return Err(GraphError::DependencyCycle(stuck));
        }

        Ok(())
    }
}
