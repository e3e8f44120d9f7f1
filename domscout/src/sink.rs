//! One-way output channel from the page to the native driver.
//!
//! Emission is fire-and-forget. The only guarantee the engine gives is
//! ordering: all records of a request precede its termination sentinel.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

pub const FINISHED_SUFFIX: &str = "-finished";

pub fn finished_sentinel(tool_name: &str) -> String {
    format!("{tool_name}{FINISHED_SUFFIX}")
}

pub trait Sink {
    fn emit(&mut self, message: &str);

    /// Closes the current request's output stream.
    fn terminate(&mut self, sentinel: &str) {
        self.emit(sentinel);
    }
}

impl<F: FnMut(&str)> Sink for F {
    fn emit(&mut self, message: &str) {
        self(message)
    }
}

/// Append-only log the driver reads after the call returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<String>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl Sink for MessageLog {
    fn emit(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

/// Forwards every message into a tokio channel, for drivers that consume the
/// stream asynchronously.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl Sink for ChannelSink {
    fn emit(&mut self, message: &str) {
        if self.tx.send(message.to_string()).is_err() {
            // nobody is listening any more; delivery is fire-and-forget
            warn!("dropping message, receiver closed");
        } else {
            debug!(bytes = message.len(), "message sent");
        }
    }
}
