//! Turns matched nodes into [`ElementRecord`]s.
//!
//! Geometry is read last, only for nodes that already passed a strategy's
//! match rule.

use tracing::debug;

use crate::dom::{Document, NodeId, NodeKind};
use crate::errors::QueryError;
use crate::record::ElementRecord;
use crate::visibility::VisibilityPolicy;

/// A node reached by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Candidate {
    Element(NodeId),
    /// A bare text node; its identity comes from the containing element.
    Text(NodeId),
}

impl Candidate {
    pub fn node(self) -> NodeId {
        match self {
            Candidate::Element(node) | Candidate::Text(node) => node,
        }
    }

    /// Classifies an arbitrary node, `None` for nodes that cannot be reported.
    pub fn classify<D: Document + ?Sized>(document: &D, node: NodeId) -> Option<Candidate> {
        match document.kind(node) {
            Ok(NodeKind::Element) => Some(Candidate::Element(node)),
            Ok(NodeKind::Text) => Some(Candidate::Text(node)),
            Ok(_) => None,
            Err(e) => {
                debug!("cannot classify {node}: {e}");
                None
            }
        }
    }

    pub fn report<D: Document + ?Sized>(
        self,
        document: &D,
        policy: VisibilityPolicy,
    ) -> Result<Option<ElementRecord>, QueryError> {
        match self {
            Candidate::Element(node) => report_element(document, node, policy),
            Candidate::Text(node) => report_text_node(document, node, policy),
        }
    }

    /// The element an action lands on: the candidate itself, or the element
    /// containing a text candidate.
    pub fn target_element<D: Document + ?Sized>(self, document: &D) -> Result<NodeId, QueryError> {
        match self {
            Candidate::Element(node) => Ok(node),
            Candidate::Text(node) => containing_element(document, node)?.ok_or(
                QueryError::UnexpectedNodeKind {
                    node,
                    expected: "inside an element",
                },
            ),
        }
    }
}

/// Builds the record of an element, or `None` if it is not visible.
pub fn report_element<D: Document + ?Sized>(
    document: &D,
    node: NodeId,
    policy: VisibilityPolicy,
) -> Result<Option<ElementRecord>, QueryError> {
    let mut text = document.inner_text(node)?;
    // form controls carry their content in `value`
    if text.trim().is_empty() {
        if let Some(value) = document.value(node)? {
            text = value;
        }
    }

    let rect = document.bounding_rect(node)?;
    if !policy.is_visible(&rect) {
        debug!(?rect, "{node} is not visible");
        return Ok(None);
    }

    Ok(Some(ElementRecord {
        id: document.attribute(node, "id")?,
        text: Some(text),
        name: document.attribute(node, "name")?,
        class_name: document.attribute(node, "class")?,
        tag_name: Some(document.tag_name(node)?.to_ascii_uppercase()),
        rect,
        attributes: Some(document.attributes(node)?),
    }))
}

/// Builds the record of a bare text node, measured by its own text range.
/// Blank text nodes are never reported.
pub fn report_text_node<D: Document + ?Sized>(
    document: &D,
    node: NodeId,
    policy: VisibilityPolicy,
) -> Result<Option<ElementRecord>, QueryError> {
    let text = document.text_content(node)?;
    if text.trim().is_empty() {
        return Ok(None);
    }

    let rect = document.text_range_rect(node)?;
    if !policy.is_visible(&rect) {
        debug!(?rect, "text {node} is not visible");
        return Ok(None);
    }

    let (id, name, class_name, tag_name) = match containing_element(document, node)? {
        Some(container) => (
            document.attribute(container, "id")?,
            document.attribute(container, "name")?,
            document.attribute(container, "class")?,
            Some(document.tag_name(container)?.to_ascii_uppercase()),
        ),
        None => (None, None, None, None),
    };

    Ok(Some(ElementRecord {
        id,
        text: Some(text),
        name,
        class_name,
        tag_name,
        rect,
        attributes: None,
    }))
}

/// Nearest ancestor element of `node`.
pub fn containing_element<D: Document + ?Sized>(
    document: &D,
    node: NodeId,
) -> Result<Option<NodeId>, QueryError> {
    let mut cursor = document.parent(node)?;
    while let Some(parent) = cursor {
        if document.kind(parent)? == NodeKind::Element {
            return Ok(Some(parent));
        }
        cursor = document.parent(parent)?;
    }
    Ok(None)
}
