//! Wave-scheduled execution of a request graph.
//!
//! Nodes with no unresolved dependencies run concurrently; as each
//! completes, newly-eligible nodes start. Fan-out nodes expand into
//! independent siblings once their prerequisite sequence is known. The
//! number of in-flight upstream calls is bounded by a semaphore so a wide
//! graph cannot overwhelm the backing services.

use crate::error::AggregationError;
use crate::graph::{Deps, FailurePolicy, NodeId, RequestGraph, RequestNode, Work};
use crate::metrics_defs;
use crate::outcome::{CompositeResult, NodeOutcome, NodeResult};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use upstream::client::{UpstreamCaller, UpstreamError, UpstreamRequest};

const DEFAULT_MAX_IN_FLIGHT: usize = 8;

pub struct AggregationExecutor {
    caller: Arc<dyn UpstreamCaller>,
    max_in_flight: usize,
}

impl AggregationExecutor {
    pub fn new(caller: Arc<dyn UpstreamCaller>) -> Self {
        Self {
            caller,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Run the graph to completion and merge the outcomes.
    ///
    /// Returns `RequiredNodeFailed` as soon as an `Abort` node fails:
    /// not-yet-started nodes never run, in-flight calls finish detached and
    /// their results are discarded.
    pub async fn execute(&self, graph: RequestGraph) -> Result<CompositeResult, AggregationError> {
        let started = Instant::now();
        let run = Run::new(Arc::clone(&self.caller), self.max_in_flight, graph);
        let result = run.run().await;
        shared::histogram!(metrics_defs::AGGREGATION_DURATION)
            .record(started.elapsed().as_secs_f64());
        result
    }
}

/// Failure of an `Abort` node; unwinds the whole run.
struct AbortError {
    node: NodeId,
    source: UpstreamError,
}

struct TaskOutput {
    node: usize,
    child: Option<usize>,
    result: Result<Value, UpstreamError>,
}

enum StartAction {
    Spawn(UpstreamRequest),
    Complete(NodeOutcome),
    Expand {
        elements: Vec<Value>,
        requests: Vec<Option<UpstreamRequest>>,
    },
}

struct Run {
    caller: Arc<dyn UpstreamCaller>,
    limiter: Arc<Semaphore>,
    nodes: Vec<RequestNode>,
    index: HashMap<NodeId, usize>,
    dependents: Vec<Vec<usize>>,
    remaining: Vec<usize>,
    values: Vec<Option<Arc<Value>>>,
    slots: Vec<Option<NodeResult>>,
    fanout_elements: Vec<Vec<Value>>,
    fanout_children: Vec<Vec<Option<NodeOutcome>>>,
    fanout_pending: Vec<usize>,
    join_set: JoinSet<TaskOutput>,
    task_nodes: HashMap<tokio::task::Id, (usize, Option<usize>)>,
    ready: VecDeque<usize>,
}

impl Run {
    fn new(caller: Arc<dyn UpstreamCaller>, max_in_flight: usize, graph: RequestGraph) -> Self {
        let nodes = graph.nodes;
        let count = nodes.len();

        let index: HashMap<NodeId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id, i))
            .collect();

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut remaining = vec![0usize; count];
        for (i, node) in nodes.iter().enumerate() {
            remaining[i] = node.depends_on.len();
            for dependency in &node.depends_on {
                dependents[index[dependency]].push(i);
            }
        }

        Self {
            caller,
            limiter: Arc::new(Semaphore::new(max_in_flight)),
            nodes,
            index,
            dependents,
            remaining,
            values: (0..count).map(|_| None).collect(),
            slots: (0..count).map(|_| None).collect(),
            fanout_elements: vec![Vec::new(); count],
            fanout_children: (0..count).map(|_| Vec::new()).collect(),
            fanout_pending: vec![0usize; count],
            join_set: JoinSet::new(),
            task_nodes: HashMap::new(),
            ready: VecDeque::new(),
        }
    }

    async fn run(mut self) -> Result<CompositeResult, AggregationError> {
        match self.run_inner().await {
            Ok(()) => Ok(self.into_composite()),
            Err(abort) => {
                // In-flight calls finish detached; their results are
                // discarded. Nothing else starts.
                self.join_set.detach_all();
                shared::counter!(metrics_defs::AGGREGATIONS_ABORTED).increment(1);
                tracing::warn!(
                    node = abort.node,
                    error = %abort.source,
                    "required node failed, aborting aggregation"
                );
                Err(AggregationError::RequiredNodeFailed {
                    node: abort.node,
                    source: abort.source,
                })
            }
        }
    }

    async fn run_inner(&mut self) -> Result<(), AbortError> {
        for i in 0..self.nodes.len() {
            if self.remaining[i] == 0 {
                self.ready.push_back(i);
            }
        }

        loop {
            while let Some(i) = self.ready.pop_front() {
                self.start_node(i)?;
            }

            if self.join_set.is_empty() {
                return Ok(());
            }

            match self.join_set.join_next_with_id().await {
                Some(Ok((task_id, output))) => {
                    self.task_nodes.remove(&task_id);
                    self.handle_output(output)?;
                }
                Some(Err(join_error)) => {
                    tracing::error!(error = %join_error, "aggregation task panicked");
                    if let Some((node, child)) = self.task_nodes.remove(&join_error.id()) {
                        self.handle_output(TaskOutput {
                            node,
                            child,
                            result: Err(UpstreamError::Internal(
                                "aggregation task panicked".to_string(),
                            )),
                        })?;
                    }
                }
                None => return Ok(()),
            }
        }
    }

    fn start_node(&mut self, i: usize) -> Result<(), AbortError> {
        let deps = self.deps_for(i);

        let action = match &self.nodes[i].work {
            Work::Request(build) => match build(&deps) {
                Some(request) => StartAction::Spawn(request),
                None => StartAction::Complete(NodeOutcome::success(Value::Null)),
            },
            Work::Transform(derive) => StartAction::Complete(match derive(&deps) {
                Ok(payload) => NodeOutcome::success(payload),
                Err(e) => NodeOutcome::Failure(e),
            }),
            Work::Fanout { over, each } => {
                let elements = self.sequence_of(i, *over);
                let requests = elements
                    .iter()
                    .enumerate()
                    .map(|(j, element)| each(j, element, &deps))
                    .collect();
                StartAction::Expand { elements, requests }
            }
        };

        match action {
            StartAction::Spawn(request) => {
                self.spawn_call(i, None, request);
            }
            StartAction::Complete(outcome) => {
                self.complete_single(i, outcome)?;
            }
            StartAction::Expand { elements, requests } => {
                let count = elements.len();
                self.fanout_elements[i] = elements;
                self.fanout_children[i] = (0..count).map(|_| None).collect();
                self.fanout_pending[i] = count;

                if count == 0 {
                    self.complete_group(i);
                } else {
                    for (j, request) in requests.into_iter().enumerate() {
                        match request {
                            Some(request) => self.spawn_call(i, Some(j), request),
                            None => {
                                self.complete_child(i, j, NodeOutcome::success(Value::Null))?
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Sequence payload a fan-out node expands over.
    fn sequence_of(&self, node: usize, over: NodeId) -> Vec<Value> {
        let payload = self.values[self.index[over]].as_deref();
        match payload {
            Some(Value::Array(elements)) => elements.clone(),
            Some(other) => {
                tracing::warn!(
                    node = self.nodes[node].id,
                    over,
                    payload_type = json_type_name(other),
                    "fan-out prerequisite is not a sequence, expanding to nothing"
                );
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    fn deps_for(&self, i: usize) -> Deps {
        let values = self.nodes[i]
            .depends_on
            .iter()
            .filter_map(|dependency| {
                let value = self.values[self.index[dependency]].clone()?;
                Some((*dependency, value))
            })
            .collect();
        Deps::new(values)
    }

    fn spawn_call(&mut self, node: usize, child: Option<usize>, request: UpstreamRequest) {
        let caller = Arc::clone(&self.caller);
        let limiter = Arc::clone(&self.limiter);
        let handle = self.join_set.spawn(async move {
            let _permit = limiter.acquire_owned().await.ok();
            let result = caller.call(&request).await;
            TaskOutput {
                node,
                child,
                result,
            }
        });
        self.task_nodes.insert(handle.id(), (node, child));
    }

    fn handle_output(&mut self, output: TaskOutput) -> Result<(), AbortError> {
        let outcome = match output.result {
            Ok(payload) => NodeOutcome::success(payload),
            Err(e) => NodeOutcome::Failure(e),
        };
        match output.child {
            Some(j) => self.complete_child(output.node, j, outcome),
            None => self.complete_single(output.node, outcome),
        }
    }

    fn complete_single(&mut self, i: usize, outcome: NodeOutcome) -> Result<(), AbortError> {
        match outcome {
            NodeOutcome::Success(payload) => {
                self.values[i] = Some(Arc::clone(&payload));
                self.slots[i] = Some(NodeResult::Single(NodeOutcome::Success(payload)));
                self.notify_dependents(i);
            }
            NodeOutcome::Failure(source) => {
                self.record_failure(i, source)?;
            }
            NodeOutcome::Skipped(_) => {}
        }
        Ok(())
    }

    fn complete_child(&mut self, i: usize, j: usize, outcome: NodeOutcome) -> Result<(), AbortError> {
        match outcome {
            NodeOutcome::Failure(source) => {
                if matches!(self.nodes[i].policy, FailurePolicy::Abort) {
                    return Err(AbortError {
                        node: self.nodes[i].id,
                        source,
                    });
                }
                shared::counter!(metrics_defs::NODE_FAILURES).increment(1);
                tracing::warn!(
                    node = self.nodes[i].id,
                    element = j,
                    error = %source,
                    "fan-out call failed"
                );
                self.fanout_children[i][j] = Some(NodeOutcome::Failure(source));
            }
            outcome => {
                self.fanout_children[i][j] = Some(outcome);
            }
        }

        self.fanout_pending[i] -= 1;
        if self.fanout_pending[i] == 0 {
            self.complete_group(i);
        }
        Ok(())
    }

    fn complete_group(&mut self, i: usize) {
        let children: Vec<NodeOutcome> = std::mem::take(&mut self.fanout_children[i])
            .into_iter()
            .map(|child| child.unwrap_or(NodeOutcome::Skipped(self.nodes[i].id)))
            .collect();

        // Dependents of a group see the sibling payloads in element order,
        // with nulls standing in for failed siblings.
        let value = Value::Array(
            children
                .iter()
                .map(|child| child.payload().cloned().unwrap_or(Value::Null))
                .collect(),
        );

        self.values[i] = Some(Arc::new(value));
        self.slots[i] = Some(NodeResult::Group(children));
        self.notify_dependents(i);
    }

    fn record_failure(&mut self, i: usize, source: UpstreamError) -> Result<(), AbortError> {
        match &self.nodes[i].policy {
            FailurePolicy::Abort => {
                return Err(AbortError {
                    node: self.nodes[i].id,
                    source,
                });
            }
            FailurePolicy::Degrade(_) => {
                shared::counter!(metrics_defs::NODE_FAILURES).increment(1);
                tracing::warn!(
                    node = self.nodes[i].id,
                    error = %source,
                    "optional node failed, section degrades"
                );
            }
            FailurePolicy::Ignore => {
                tracing::debug!(
                    node = self.nodes[i].id,
                    error = %source,
                    "fire-and-forget node failed"
                );
            }
        }

        self.slots[i] = Some(NodeResult::Single(NodeOutcome::Failure(source)));
        self.mark_dependents_skipped(i);
        Ok(())
    }

    /// Transitively mark everything downstream of a failed node as skipped,
    /// recording the originally failed node as the cause.
    fn mark_dependents_skipped(&mut self, failed: usize) {
        let cause = self.nodes[failed].id;
        let mut queue: VecDeque<usize> = self.dependents[failed].iter().copied().collect();

        while let Some(i) = queue.pop_front() {
            if self.slots[i].is_some() {
                continue;
            }
            self.slots[i] = Some(NodeResult::Single(NodeOutcome::Skipped(cause)));
            shared::counter!(metrics_defs::NODES_SKIPPED).increment(1);
            queue.extend(self.dependents[i].iter().copied());
        }
    }

    fn notify_dependents(&mut self, i: usize) {
        let dependents = self.dependents[i].clone();
        for dependent in dependents {
            self.remaining[dependent] -= 1;
            if self.remaining[dependent] == 0 && self.slots[dependent].is_none() {
                self.ready.push_back(dependent);
            }
        }
    }

    /// Merge slots into the composite, assembling diagnostics from
    /// declaration order so completion timing never affects the output.
    fn into_composite(mut self) -> CompositeResult {
        let mut composite = CompositeResult::new();

        for (i, node) in self.nodes.iter().enumerate() {
            let result = self.slots[i]
                .take()
                .unwrap_or(NodeResult::Single(NodeOutcome::Skipped(node.id)));

            if let FailurePolicy::Degrade(diagnostic) = &node.policy {
                match &result {
                    NodeResult::Single(NodeOutcome::Failure(_)) => {
                        composite.push_diagnostic(diagnostic(None));
                    }
                    NodeResult::Group(children) => {
                        for (j, child) in children.iter().enumerate() {
                            if child.is_failure() {
                                composite.push_diagnostic(diagnostic(
                                    self.fanout_elements[i].get(j),
                                ));
                            }
                        }
                    }
                    _ => {}
                }
            }

            composite.insert(node.id, result);
        }

        composite
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
