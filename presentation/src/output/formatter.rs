//! Output formatter trait

use chorus_domain::{OutputFormat, StreamFrame};

/// Turns streamed frames into printable text.
pub trait FrameFormatter: Send + Sync {
    /// Render one frame including its trailing newline; `None` prints nothing.
    fn format_frame(&self, frame: &StreamFrame) -> Option<String>;
}

/// One JSON object per line.
pub struct JsonLinesFormatter;

impl FrameFormatter for JsonLinesFormatter {
    fn format_frame(&self, frame: &StreamFrame) -> Option<String> {
        frame.to_json_line().ok().map(|line| line + "\n")
    }
}

/// `data:` records as sent on an event-stream response.
pub struct SseFormatter;

impl FrameFormatter for SseFormatter {
    fn format_frame(&self, frame: &StreamFrame) -> Option<String> {
        frame.to_sse().ok()
    }
}

/// Pick the formatter for `format`.
pub fn formatter_for(format: OutputFormat) -> Box<dyn FrameFormatter> {
    match format {
        OutputFormat::Text => Box::new(super::console::ConsoleFormatter),
        OutputFormat::Json => Box::new(JsonLinesFormatter),
        OutputFormat::Sse => Box::new(SseFormatter),
    }
}
