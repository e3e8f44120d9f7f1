//! The traversal core shared by every strategy.
//!
//! A [`Locator`] turns a [`Selector`] into a lazy sequence of [`Candidate`]s.
//! What happens to them (report, click, text entry) is decided by the caller;
//! the helpers at the bottom of this module implement those terminal actions.

use tracing::{debug, warn};

use crate::dom::{Document, MouseEvent, NodeId, TreeWalker};
use crate::errors::QueryError;
use crate::reporter::Candidate;
use crate::selector::Selector;
use crate::sink::Sink;
use crate::visibility::VisibilityPolicy;
use crate::xpath::PathExpr;

pub type Candidates<'a> = Box<dyn Iterator<Item = Candidate> + 'a>;

/// Finds the nodes a [`Selector`] designates within one document.
pub struct Locator<'a, D: Document + ?Sized> {
    document: &'a D,
    selector: &'a Selector,
}

impl<'a, D: Document + ?Sized + 'a> Locator<'a, D> {
    pub fn new(document: &'a D, selector: &'a Selector) -> Self {
        Self { document, selector }
    }

    /// Candidates in document order, or in the lookup mechanism's own order
    /// for CSS and path selectors.
    ///
    /// Malformed selectors and paths fail here, before any node is visited.
    pub fn candidates(&self) -> Result<Candidates<'a>, QueryError> {
        let document = self.document;
        match self.selector {
            Selector::Id(id) => self.by_id(id),
            Selector::Path(expr) => {
                let path = PathExpr::parse(expr)?;
                let nodes = path.evaluate(document);
                debug!(count = nodes.len(), "path {expr:?} evaluated");
                Ok(Box::new(
                    nodes
                        .into_iter()
                        .filter_map(move |node| Candidate::classify(document, node)),
                ))
            }
            Selector::Css(css) => {
                let nodes = document.query_selector_all(css)?;
                Ok(Box::new(nodes.into_iter().map(Candidate::Element)))
            }
            Selector::Name(name) => Ok(self.by_attribute("name", name)),
            Selector::ClassName(class) => Ok(self.by_attribute("class", class)),
            Selector::Text(text) => {
                let wanted = text.trim().to_string();
                Ok(Box::new(
                    TreeWalker::texts(document, body_or_root(document))
                        .filter(move |&node| match document.text_content(node) {
                            Ok(content) => content.trim() == wanted,
                            Err(e) => skip(node, &e),
                        })
                        .map(Candidate::Text),
                ))
            }
            Selector::TagName(tag) => {
                let nodes = document.elements_by_tag_name(tag.trim())?;
                Ok(Box::new(nodes.into_iter().map(Candidate::Element)))
            }
            Selector::Invalid(reason) => Err(QueryError::InvalidSelector(reason.clone())),
        }
    }

    /// The first candidate whose action target resolves.
    pub fn first_target(&self) -> Result<Option<NodeId>, QueryError> {
        let document = self.document;
        Ok(self
            .candidates()?
            .find_map(|candidate| match candidate.target_element(document) {
                Ok(node) => Some(node),
                Err(e) => {
                    skip(candidate.node(), &e);
                    None
                }
            }))
    }

    fn by_id(&self, id: &str) -> Result<Candidates<'a>, QueryError> {
        let document = self.document;
        match document.element_by_id(id) {
            Ok(Some(node)) => return Ok(Box::new(std::iter::once(Candidate::Element(node)))),
            Ok(None) => debug!("direct lookup missed id {id:?}, scanning document"),
            Err(e) if e.is_node_fault() => {
                debug!("direct lookup of id {id:?} failed ({e}), scanning document")
            }
            Err(e) => return Err(e),
        }

        let id = id.to_string();
        Ok(Box::new(
            TreeWalker::elements(document, document.root())
                .filter(move |&node| match document.attribute(node, "id") {
                    Ok(value) => value.as_deref() == Some(id.as_str()),
                    Err(e) => skip(node, &e),
                })
                .map(Candidate::Element),
        ))
    }

    /// Elements whose attribute, once trimmed, is non-empty and whose raw value
    /// equals the pattern.
    fn by_attribute(&self, attribute: &'static str, pattern: &str) -> Candidates<'a> {
        let document = self.document;
        let pattern = pattern.to_string();
        Box::new(
            TreeWalker::elements(document, body_or_root(document))
                .filter(move |&node| match document.attribute(node, attribute) {
                    Ok(Some(value)) => !value.trim().is_empty() && value == pattern,
                    Ok(None) => false,
                    Err(e) => skip(node, &e),
                })
                .map(Candidate::Element),
        )
    }
}

/// Every element of the document, in document order.
pub fn all_elements<D: Document + ?Sized>(document: &D) -> Candidates<'_> {
    Box::new(TreeWalker::elements(document, document.root()).map(Candidate::Element))
}

/// Every text node under the body. Blank ones are dropped by the reporter.
pub fn all_texts<D: Document + ?Sized>(document: &D) -> Candidates<'_> {
    Box::new(TreeWalker::texts(document, body_or_root(document)).map(Candidate::Text))
}

/// Reports every visible candidate through `sink`, returning how many records
/// were emitted. Faulty nodes are skipped.
pub fn report_candidates<D, S>(
    document: &D,
    candidates: Candidates<'_>,
    policy: VisibilityPolicy,
    sink: &mut S,
) -> usize
where
    D: Document + ?Sized,
    S: Sink + ?Sized,
{
    let mut reported = 0;
    for candidate in candidates {
        match candidate.report(document, policy) {
            Ok(Some(record)) => {
                sink.emit(&record.encode());
                reported += 1;
            }
            Ok(None) => {}
            Err(e) => {
                skip(candidate.node(), &e);
            }
        }
    }
    reported
}

/// Dispatches a primary click on `target`. A fault is logged, never raised.
pub fn click<D: Document + ?Sized>(document: &mut D, target: NodeId) -> bool {
    match document.dispatch_click(target, &MouseEvent::primary_click()) {
        Ok(()) => true,
        Err(e) => skip(target, &e),
    }
}

/// Assigns `text` as the value of `target`. A fault is logged, never raised.
pub fn enter_text<D: Document + ?Sized>(document: &mut D, target: NodeId, text: &str) -> bool {
    match document.set_value(target, text) {
        Ok(()) => true,
        Err(e) => skip(target, &e),
    }
}

fn body_or_root<D: Document + ?Sized>(document: &D) -> NodeId {
    document.body().unwrap_or_else(|| document.root())
}

/// Logs a per-node failure. Always `false`, so it can end a filter closure.
fn skip(node: NodeId, error: &QueryError) -> bool {
    if error.is_node_fault() {
        debug!("skipping {node}: {error}");
    } else {
        warn!("skipping {node}: {error}");
    }
    false
}
