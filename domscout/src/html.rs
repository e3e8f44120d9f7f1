//! In-memory [`Document`] backed by `scraper`.
//!
//! There is no layout engine here: geometry comes from an explicit layout
//! table filled through [`HtmlDocument::set_rect`], [`HtmlDocument::layout`]
//! or a deserialized list of [`LayoutEntry`] values.

use scraper::{Html, Node};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::dom::{Document, MouseEvent, NodeId, NodeKind, Rect, TreeWalker};
use crate::errors::QueryError;

const FORM_CONTROLS: &[&str] = &["input", "button", "option", "select", "data", "output"];
const NON_RENDERED: &[&str] = &["script", "style", "template", "head", "noscript"];

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
}

/// One entry of a layout file: every element matching `selector` gets `rect`,
/// and every text node directly inside a match gets `text_rect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_rect: Option<Rect>,
}

pub struct HtmlDocument {
    html: Html,
    nodes: Vec<NodeData>,
    rects: HashMap<NodeId, Rect>,
    text_rects: HashMap<NodeId, Rect>,
    values: HashMap<NodeId, String>,
    detached: HashSet<NodeId>,
    unindexed: HashSet<NodeId>,
    clicks: Vec<(NodeId, MouseEvent)>,
}

impl std::fmt::Debug for HtmlDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlDocument")
            .field("nodes", &self.nodes.len())
            .field("rects", &self.rects.len())
            .field("text_rects", &self.text_rects.len())
            .field("detached", &self.detached)
            .finish()
    }
}

impl HtmlDocument {
    /// Parses a full HTML document. Node ids follow document order, the
    /// document node being `NodeId(0)`.
    pub fn parse(markup: &str) -> Self {
        let html = Html::parse_document(markup);
        let mut nodes: Vec<NodeData> = Vec::new();
        let mut index = HashMap::new();

        for (i, node) in html.tree.root().descendants().enumerate() {
            index.insert(node.id(), i);
            let parent = node
                .parent()
                .and_then(|p| index.get(&p.id()).copied())
                .map(NodeId);

            let data = match node.value() {
                Node::Document | Node::Fragment => NodeData::new(NodeKind::Document, parent),
                Node::Element(el) => {
                    let mut data = NodeData::new(NodeKind::Element, parent);
                    data.tag = el.name().to_ascii_lowercase();
                    data.attrs = el
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect();
                    data
                }
                Node::Text(text) => {
                    let mut data = NodeData::new(NodeKind::Text, parent);
                    data.text = String::from(&**text);
                    data
                }
                _ => NodeData::new(NodeKind::Other, parent),
            };

            if let Some(p) = parent {
                nodes[p.0].children.push(NodeId(i));
            }
            nodes.push(data);
        }

        debug!("parsed document with {} nodes", nodes.len());

        Self {
            html,
            nodes,
            rects: HashMap::new(),
            text_rects: HashMap::new(),
            values: HashMap::new(),
            detached: HashSet::new(),
            unindexed: HashSet::new(),
            clicks: Vec::new(),
        }
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.rects.insert(node, rect);
    }

    pub fn set_text_rect(&mut self, node: NodeId, rect: Rect) {
        self.text_rects.insert(node, rect);
    }

    /// Assigns `rect` to every element matching `selector`. Returns the number
    /// of elements laid out.
    pub fn layout(&mut self, selector: &str, rect: Rect) -> Result<usize, QueryError> {
        let matches = self.query_selector_all(selector)?;
        for &node in &matches {
            self.rects.insert(node, rect);
        }
        Ok(matches.len())
    }

    pub fn apply_layout(&mut self, entries: &[LayoutEntry]) -> Result<(), QueryError> {
        for entry in entries {
            let matches = self.query_selector_all(&entry.selector)?;
            if matches.is_empty() {
                debug!("layout selector {:?} matched nothing", entry.selector);
            }
            for node in matches {
                if let Some(rect) = entry.rect {
                    self.rects.insert(node, rect);
                }
                if let Some(rect) = entry.text_rect {
                    let texts: Vec<NodeId> = self.nodes[node.0]
                        .children
                        .iter()
                        .copied()
                        .filter(|c| self.nodes[c.0].kind == NodeKind::Text)
                        .collect();
                    for text in texts {
                        self.text_rects.insert(text, rect);
                    }
                }
            }
        }
        Ok(())
    }

    /// Makes every later per-node access to `node` fail, as a host does for a
    /// node removed while a walk is in progress.
    pub fn detach(&mut self, node: NodeId) {
        self.detached.insert(node);
    }

    /// Hides `node` from [`Document::element_by_id`] while leaving it in the
    /// tree, like hosts whose id index misses some elements.
    pub fn unindex(&mut self, node: NodeId) {
        self.unindexed.insert(node);
    }

    pub fn clicks(&self) -> &[(NodeId, MouseEvent)] {
        &self.clicks
    }

    pub fn find_first(&self, selector: &str) -> Result<Option<NodeId>, QueryError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    /// First text node whose trimmed content equals `text`.
    pub fn find_text(&self, text: &str) -> Option<NodeId> {
        TreeWalker::texts(self, self.root()).find(|&n| self.nodes[n.0].text.trim() == text)
    }

    fn data(&self, node: NodeId) -> Result<&NodeData, QueryError> {
        self.nodes
            .get(node.0)
            .ok_or_else(|| QueryError::ElementNotFound(node.to_string()))
    }

    /// Like `data`, but fails for detached nodes.
    fn live(&self, node: NodeId) -> Result<&NodeData, QueryError> {
        if self.detached.contains(&node) {
            return Err(QueryError::ElementDetached(node));
        }
        self.data(node)
    }

    fn element(&self, node: NodeId) -> Result<&NodeData, QueryError> {
        let data = self.live(node)?;
        if data.kind != NodeKind::Element {
            return Err(QueryError::UnexpectedNodeKind {
                node,
                expected: "an element",
            });
        }
        Ok(data)
    }

    fn collect_text(&self, node: NodeId, rendered: bool, out: &mut String) {
        let data = &self.nodes[node.0];
        match data.kind {
            NodeKind::Text => out.push_str(&data.text),
            NodeKind::Element if rendered && NON_RENDERED.contains(&data.tag.as_str()) => {}
            _ => {
                for &child in &data.children {
                    self.collect_text(child, rendered, out);
                }
            }
        }
    }
}

impl NodeData {
    fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            tag: String::new(),
            attrs: Vec::new(),
            text: String::new(),
        }
    }
}

impl Document for HtmlDocument {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn body(&self) -> Option<NodeId> {
        TreeWalker::elements(self, self.root()).find(|n| self.nodes[n.0].tag == "body")
    }

    fn kind(&self, node: NodeId) -> Result<NodeKind, QueryError> {
        Ok(self.data(node)?.kind)
    }

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>, QueryError> {
        Ok(self.data(node)?.parent)
    }

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, QueryError> {
        Ok(self.data(node)?.children.clone())
    }

    fn tag_name(&self, node: NodeId) -> Result<String, QueryError> {
        Ok(self.element(node)?.tag.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, QueryError> {
        Ok(self
            .element(node)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone()))
    }

    fn attributes(&self, node: NodeId) -> Result<Vec<(String, String)>, QueryError> {
        Ok(self.element(node)?.attrs.clone())
    }

    fn text_content(&self, node: NodeId) -> Result<String, QueryError> {
        self.live(node)?;
        let mut out = String::new();
        self.collect_text(node, false, &mut out);
        Ok(out)
    }

    fn inner_text(&self, node: NodeId) -> Result<String, QueryError> {
        self.live(node)?;
        let mut out = String::new();
        self.collect_text(node, true, &mut out);
        Ok(out)
    }

    fn value(&self, node: NodeId) -> Result<Option<String>, QueryError> {
        let data = self.element(node)?;
        if let Some(value) = self.values.get(&node) {
            return Ok(Some(value.clone()));
        }
        if data.tag == "textarea" {
            return self.text_content(node).map(Some);
        }
        if FORM_CONTROLS.contains(&data.tag.as_str()) {
            let attr = data.attrs.iter().find(|(k, _)| k == "value");
            return Ok(Some(attr.map(|(_, v)| v.clone()).unwrap_or_default()));
        }
        Ok(None)
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), QueryError> {
        self.element(node)?;
        self.values.insert(node, value.to_string());
        Ok(())
    }

    fn bounding_rect(&self, node: NodeId) -> Result<Rect, QueryError> {
        self.element(node)?;
        Ok(self.rects.get(&node).copied().unwrap_or_default())
    }

    fn text_range_rect(&self, node: NodeId) -> Result<Rect, QueryError> {
        let data = self.live(node)?;
        if data.kind != NodeKind::Text {
            return Err(QueryError::UnexpectedNodeKind {
                node,
                expected: "a text node",
            });
        }
        if let Some(rect) = self.text_rects.get(&node) {
            return Ok(*rect);
        }
        match data.parent {
            Some(parent) => Ok(self.rects.get(&parent).copied().unwrap_or_default()),
            None => Ok(Rect::default()),
        }
    }

    fn dispatch_click(&mut self, node: NodeId, event: &MouseEvent) -> Result<(), QueryError> {
        self.live(node)?;
        debug!("dispatching {} to {node}", event.event_type);
        self.clicks.push((node, event.clone()));
        Ok(())
    }

    fn element_by_id(&self, id: &str) -> Result<Option<NodeId>, QueryError> {
        Ok(TreeWalker::elements(self, self.root()).find(|n| {
            !self.unindexed.contains(n)
                && self.nodes[n.0]
                    .attrs
                    .iter()
                    .any(|(k, v)| k == "id" && v == id)
        }))
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, QueryError> {
        let parsed = scraper::Selector::parse(selector)
            .map_err(|e| QueryError::InvalidSelector(format!("{selector:?}: {e:?}")))?;
        let matched: HashSet<_> = self
            .html
            .select(&parsed)
            .map(|el| std::ops::Deref::deref(&el).id())
            .collect();
        Ok(self
            .html
            .tree
            .root()
            .descendants()
            .enumerate()
            .filter(|(_, node)| matched.contains(&node.id()))
            .map(|(i, _)| NodeId(i))
            .collect())
    }
}
