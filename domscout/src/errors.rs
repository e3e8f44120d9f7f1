use thiserror::Error;

use crate::dom::NodeId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Node {0} is detached from the document")]
    ElementDetached(NodeId),

    #[error("Node {node} is not {expected}")]
    UnexpectedNodeKind { node: NodeId, expected: &'static str },

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid path expression: {0}")]
    InvalidPath(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown entry point: {0}")]
    UnknownEntryPoint(String),

    #[error("Malformed element record: {0}")]
    MalformedRecord(String),
}

impl QueryError {
    /// Faults scoped to a single node rather than to the request. The
    /// traversal core logs these at debug level and moves on.
    pub fn is_node_fault(&self) -> bool {
        matches!(
            self,
            QueryError::ElementDetached(_)
                | QueryError::UnexpectedNodeKind { .. }
                | QueryError::ElementNotFound(_)
        )
    }
}
