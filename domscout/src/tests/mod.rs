mod engine_tests;

use crate::dom::Rect;
use crate::html::HtmlDocument;

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_test_writer()
        .try_init();
}

/// Parses `markup` and gives every element matching one of `boxes` its rect.
pub fn laid_out(markup: &str, boxes: &[(&str, Rect)]) -> HtmlDocument {
    let mut doc = HtmlDocument::parse(markup);
    for (selector, rect) in boxes {
        doc.layout(selector, *rect)
            .unwrap_or_else(|e| panic!("bad layout selector {selector:?}: {e}"));
    }
    doc
}

pub fn visible() -> Rect {
    Rect::new(10.0, 10.0, 100.0, 20.0)
}
