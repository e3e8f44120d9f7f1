//! In-page element query engine for web-view test automation.
//!
//! A native test driver cannot call DOM APIs itself. It invokes one exported
//! entry point per request (`byId`, `bySelector`, `setTextByName`, ...) and
//! reads back a stream of flat element records closed by a
//! `"<tool>-finished"` sentinel. [`Engine`] runs those requests against any
//! [`Document`] and writes the stream into any [`Sink`].

use tracing::{debug, info, instrument};

pub mod collector;
pub mod config;
pub mod dom;
pub mod errors;
pub mod html;
pub mod locator;
pub mod record;
pub mod reporter;
pub mod selector;
pub mod sink;
#[cfg(test)]
mod tests;
pub mod visibility;
pub mod xpath;

pub use collector::{ElementCollector, WebElement};
pub use config::EngineConfig;
pub use dom::{Document, MouseEvent, NodeId, NodeKind, Rect};
pub use errors::QueryError;
pub use html::{HtmlDocument, LayoutEntry};
pub use locator::Locator;
pub use record::ElementRecord;
pub use reporter::Candidate;
pub use selector::{Action, Request, Selector};
pub use sink::{ChannelSink, MessageLog, Sink};
pub use visibility::VisibilityPolicy;

/// What a completed request did, besides what it emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestSummary {
    /// Element records emitted before the sentinel.
    pub reported: usize,
    /// The node a click or text entry landed on.
    pub target: Option<NodeId>,
}

/// Runs requests against one document, writing their output into one sink.
///
/// Each call is a self-contained query-and-report cycle; nothing is carried
/// over between calls.
pub struct Engine<D: Document, S: Sink> {
    document: D,
    sink: S,
    config: EngineConfig,
}

impl<D: Document, S: Sink> Engine<D, S> {
    pub fn new(document: D, sink: S) -> Self {
        Self::with_config(document, sink, EngineConfig::default())
    }

    pub fn with_config(document: D, sink: S, config: EngineConfig) -> Self {
        Self {
            document,
            sink,
            config,
        }
    }

    /// Runs one request. A successful request always ends with exactly one
    /// termination sentinel, after every record it emitted.
    ///
    /// Rejected selectors and malformed paths return an error before anything
    /// is emitted.
    #[instrument(skip(self), fields(entry_point = %request.entry_point()))]
    pub fn execute(&mut self, request: &Request) -> Result<RequestSummary, QueryError> {
        request.validate()?;
        let policy = self.config.visibility;

        let summary = match request {
            Request::AllElements => RequestSummary {
                reported: locator::report_candidates(
                    &self.document,
                    locator::all_elements(&self.document),
                    policy,
                    &mut self.sink,
                ),
                target: None,
            },
            Request::AllTexts => RequestSummary {
                reported: locator::report_candidates(
                    &self.document,
                    locator::all_texts(&self.document),
                    policy,
                    &mut self.sink,
                ),
                target: None,
            },
            Request::Find {
                selector,
                action: Action::Report,
            } => {
                let candidates = Locator::new(&self.document, selector).candidates()?;
                RequestSummary {
                    reported: locator::report_candidates(
                        &self.document,
                        candidates,
                        policy,
                        &mut self.sink,
                    ),
                    target: None,
                }
            }
            Request::Find {
                selector,
                action: Action::Click,
            } => {
                let target = Locator::new(&self.document, selector).first_target()?;
                let target = match target {
                    Some(node) => locator::click(&mut self.document, node).then_some(node),
                    None => {
                        debug!("nothing to click for {selector}");
                        None
                    }
                };
                RequestSummary {
                    reported: 0,
                    target,
                }
            }
            Request::SetText { selector, text } => {
                let target = Locator::new(&self.document, selector).first_target()?;
                let target = match target {
                    Some(node) => {
                        locator::enter_text(&mut self.document, node, text).then_some(node)
                    }
                    None => {
                        debug!("no element to enter text into for {selector}");
                        None
                    }
                };
                RequestSummary {
                    reported: 0,
                    target,
                }
            }
        };

        self.sink.terminate(&self.config.finished_sentinel());
        info!(
            reported = summary.reported,
            target_node = ?summary.target,
            "request finished"
        );
        Ok(summary)
    }

    /// Runs the exported entry point `name` with its string arguments.
    pub fn invoke(&mut self, name: &str, args: &[&str]) -> Result<RequestSummary, QueryError> {
        let request = Request::from_call(name, args)?;
        self.execute(&request)
    }

    pub fn all_elements(&mut self) -> Result<RequestSummary, QueryError> {
        self.execute(&Request::AllElements)
    }

    pub fn all_texts(&mut self) -> Result<RequestSummary, QueryError> {
        self.execute(&Request::AllTexts)
    }

    pub fn find(&mut self, selector: impl Into<Selector>) -> Result<RequestSummary, QueryError> {
        self.execute(&Request::find(selector))
    }

    pub fn click(&mut self, selector: impl Into<Selector>) -> Result<RequestSummary, QueryError> {
        self.execute(&Request::click(selector))
    }

    pub fn set_text(
        &mut self,
        selector: impl Into<Selector>,
        text: impl Into<String>,
    ) -> Result<RequestSummary, QueryError> {
        self.execute(&Request::set_text(selector, text))
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_parts(self) -> (D, S) {
        (self.document, self.sink)
    }
}
