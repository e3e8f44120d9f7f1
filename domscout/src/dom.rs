//! The document seam.
//!
//! The engine never touches a global page object. Every request receives a
//! [`Document`] handle, which lets the traversal run against a live host or
//! against a synthetic tree in tests.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::QueryError;

/// Opaque handle to a node owned by a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    /// Comments, doctypes, processing instructions.
    Other,
}

/// Rendered bounding box in viewport coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// A synthesized mouse event as handed to [`Document::dispatch_click`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseEvent {
    pub event_type: String,
    pub bubbles: bool,
    pub cancelable: bool,
    pub detail: i32,
    pub screen_x: i32,
    pub screen_y: i32,
    pub client_x: i32,
    pub client_y: i32,
    pub ctrl_key: bool,
    pub alt_key: bool,
    pub shift_key: bool,
    pub meta_key: bool,
    pub button: u16,
}

impl MouseEvent {
    /// Single primary-button click with no modifiers at the origin.
    pub fn primary_click() -> Self {
        Self {
            event_type: "click".to_string(),
            bubbles: true,
            cancelable: true,
            detail: 1,
            screen_x: 0,
            screen_y: 0,
            client_x: 0,
            client_y: 0,
            ctrl_key: false,
            alt_key: false,
            shift_key: false,
            meta_key: false,
            button: 0,
        }
    }
}

/// The operations the query engine needs from a page.
///
/// Per-node accessors may fail (for example when a node is detached while the
/// walk is in progress). Such failures are scoped to that node: the traversal
/// core logs and skips it.
pub trait Document {
    /// The document node.
    fn root(&self) -> NodeId;

    /// The `<body>` element, if the document has one.
    fn body(&self) -> Option<NodeId>;

    fn kind(&self, node: NodeId) -> Result<NodeKind, QueryError>;

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>, QueryError>;

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, QueryError>;

    /// Lower-case local name of an element.
    fn tag_name(&self, node: NodeId) -> Result<String, QueryError>;

    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, QueryError>;

    /// All attributes in their stored order.
    fn attributes(&self, node: NodeId) -> Result<Vec<(String, String)>, QueryError>;

    /// Concatenated text of the node and all its descendants.
    fn text_content(&self, node: NodeId) -> Result<String, QueryError>;

    /// Rendered text. Hosts without a layout engine fall back to `text_content`.
    fn inner_text(&self, node: NodeId) -> Result<String, QueryError> {
        self.text_content(node)
    }

    /// The current value of a form control, `None` for elements without one.
    fn value(&self, node: NodeId) -> Result<Option<String>, QueryError>;

    fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), QueryError>;

    fn bounding_rect(&self, node: NodeId) -> Result<Rect, QueryError>;

    /// Box of the range selecting exactly the contents of a text node.
    fn text_range_rect(&self, node: NodeId) -> Result<Rect, QueryError>;

    fn dispatch_click(&mut self, node: NodeId, event: &MouseEvent) -> Result<(), QueryError>;

    /// Direct id lookup. Some hosts do not index every element, so a miss here
    /// is not authoritative.
    fn element_by_id(&self, id: &str) -> Result<Option<NodeId>, QueryError>;

    /// Elements with the given tag name, in document order.
    fn elements_by_tag_name(&self, tag: &str) -> Result<Vec<NodeId>, QueryError> {
        Ok(TreeWalker::elements(self, self.root())
            .filter(|&node| {
                self.tag_name(node)
                    .map(|name| name.eq_ignore_ascii_case(tag))
                    .unwrap_or(false)
            })
            .collect())
    }

    /// Elements matching a CSS selector, in the host's native order.
    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, QueryError>;
}

/// Which nodes a [`TreeWalker`] yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhatToShow {
    Elements,
    Text,
    All,
}

impl WhatToShow {
    fn accepts(self, kind: NodeKind) -> bool {
        match self {
            WhatToShow::Elements => kind == NodeKind::Element,
            WhatToShow::Text => kind == NodeKind::Text,
            WhatToShow::All => true,
        }
    }
}

/// Lazy pre-order walk below a root (the root itself is not yielded).
pub struct TreeWalker<'a, D: Document + ?Sized> {
    document: &'a D,
    filter: WhatToShow,
    stack: Vec<NodeId>,
}

impl<'a, D: Document + ?Sized> TreeWalker<'a, D> {
    pub fn new(document: &'a D, root: NodeId, filter: WhatToShow) -> Self {
        let mut walker = Self {
            document,
            filter,
            stack: Vec::new(),
        };
        walker.push_children(root);
        walker
    }

    pub fn elements(document: &'a D, root: NodeId) -> Self {
        Self::new(document, root, WhatToShow::Elements)
    }

    pub fn texts(document: &'a D, root: NodeId) -> Self {
        Self::new(document, root, WhatToShow::Text)
    }

    fn push_children(&mut self, node: NodeId) {
        match self.document.children(node) {
            Ok(children) => self.stack.extend(children.into_iter().rev()),
            Err(e) => tracing::debug!("skipping subtree of {node}: {e}"),
        }
    }
}

impl<D: Document + ?Sized> Iterator for TreeWalker<'_, D> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(node) = self.stack.pop() {
            self.push_children(node);
            match self.document.kind(node) {
                Ok(kind) if self.filter.accepts(kind) => return Some(node),
                Ok(_) => {}
                Err(e) => tracing::debug!("skipping {node}: {e}"),
            }
        }
        None
    }
}
