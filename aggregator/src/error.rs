use crate::graph::NodeId;
use thiserror::Error;
use upstream::client::UpstreamError;

/// Result type alias for aggregation operations
pub type Result<T, E = AggregationError> = std::result::Result<T, E>;

/// Errors that can surface from one aggregation run
#[derive(Error, Debug)]
pub enum AggregationError {
    /// Malformed input parameters, rejected before any network activity
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A node whose failure policy is `Abort` failed; the whole
    /// aggregation is abandoned and no composite result is produced.
    #[error("required node '{node}' failed: {source}")]
    RequiredNodeFailed {
        node: NodeId,
        source: UpstreamError,
    },

    #[error("invalid request graph: {0}")]
    InvalidGraph(#[from] GraphError),
}

/// Construction-time graph rejections
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error("node '{node}' depends on unknown node '{dependency}'")]
    UnknownDependency { node: NodeId, dependency: NodeId },

    #[error("dependency cycle involving node '{0}'")]
    DependencyCycle(NodeId),
}
