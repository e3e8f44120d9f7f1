//! The driver's end of the stream: turns emitted messages back into elements
//! and notices when a request is finished.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::dom::Rect;
use crate::record::{ElementRecord, FIELD_DELIMITER};
use crate::sink::Sink;

/// How long a driver waits for the termination sentinel by default.
pub const DEFAULT_COLLECT_TIMEOUT: Duration = Duration::from_secs(5);

/// An element as the driver sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebElement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    pub rect: Rect,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl WebElement {
    pub fn from_record(record: ElementRecord) -> Self {
        Self {
            id: record.id,
            text: record.text.unwrap_or_default(),
            name: record.name,
            class_name: record.class_name,
            tag_name: record.tag_name,
            rect: record.rect,
            attributes: record.attributes.unwrap_or_default().into_iter().collect(),
        }
    }

    /// Screen coordinates of the element's centre, given where the web view
    /// sits on screen and its content scale.
    pub fn location_on_screen(&self, view_origin: (i32, i32), scale: f32) -> (i32, i32) {
        let scale = f64::from(scale);
        let x = (self.rect.left + (self.rect.width / 2.0).floor()) * scale;
        let y = (self.rect.top + (self.rect.height / 2.0).floor()) * scale;
        (view_origin.0 + x as i32, view_origin.1 + y as i32)
    }
}

/// Collects the records of one request until its sentinel arrives.
#[derive(Debug, Clone)]
pub struct ElementCollector {
    sentinel: String,
    elements: Vec<WebElement>,
    finished: bool,
}

impl ElementCollector {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
            elements: Vec::new(),
            finished: false,
        }
    }

    pub fn for_config(config: &EngineConfig) -> Self {
        Self::new(config.finished_sentinel())
    }

    /// Clears the previous request's results. Call before issuing a request.
    pub fn prepare_for_start(&mut self) {
        self.elements.clear();
        self.finished = false;
    }

    /// Consumes one message, returning `false` for messages that are not part
    /// of the element protocol so the caller can route them elsewhere.
    pub fn accept(&mut self, message: &str) -> bool {
        if message == self.sentinel {
            debug!(count = self.elements.len(), "request finished");
            self.finished = true;
            return true;
        }
        if !message.contains(FIELD_DELIMITER) {
            return false;
        }
        match ElementRecord::parse(message) {
            Ok(record) => self.elements.push(WebElement::from_record(record)),
            Err(e) => warn!("dropping unparseable record: {e}"),
        }
        true
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn elements(&self) -> &[WebElement] {
        &self.elements
    }

    pub fn take_elements(&mut self) -> Vec<WebElement> {
        std::mem::take(&mut self.elements)
    }

    /// Reads messages from `rx` until the sentinel arrives, the channel closes
    /// or `timeout` elapses. Returns whether the request finished.
    pub async fn collect_from(
        &mut self,
        rx: &mut UnboundedReceiver<String>,
        timeout: Duration,
    ) -> bool {
        if self.finished {
            return true;
        }
        let drained = tokio::time::timeout(timeout, async {
            while let Some(message) = rx.recv().await {
                if !self.accept(&message) {
                    debug!("ignoring foreign message {message:?}");
                }
                if self.finished {
                    break;
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                "no termination within {timeout:?}, got {} element(s)",
                self.elements.len()
            );
        }
        self.finished
    }
}

impl Sink for ElementCollector {
    fn emit(&mut self, message: &str) {
        if !self.accept(message) {
            debug!("ignoring foreign message {message:?}");
        }
    }
}
