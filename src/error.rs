//! Error types for proxy queries

use std::fmt;

use crate::events::NodeId;

/// Result type alias for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors returned by read-only queries against the mirrored cluster state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryError {
    /// The node is not present in the state table
    NoSuchNode(NodeId),

    /// The node is known but the requested gauge was never received
    NoSuchMetric(NodeId),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::NoSuchNode(node) => write!(f, "no such node: {}", node),
            QueryError::NoSuchMetric(node) => {
                write!(f, "no such metric: {} has not reported this gauge", node)
            }
        }
    }
}

impl std::error::Error for QueryError {}
