//! `[output]` section: how a round's event stream is rendered.
//!
//! ```toml
//! [output]
//! format = "sse"   # text | json | sse; `--output` wins over this
//! color = false    # also off when NO_COLOR is set
//! ```

use chorus_domain::OutputFormat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    /// Rendering of streamed frames; unset falls back to text.
    pub format: Option<OutputFormat>,
    pub color: bool,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            format: None,
            color: true,
        }
    }
}

impl FileOutputConfig {
    /// Pick the frame rendering: command line, then file, then text.
    pub fn resolve_format(&self, from_cli: Option<OutputFormat>) -> OutputFormat {
        from_cli.or(self.format).unwrap_or_default()
    }

    /// Colors only make sense for the text transcript.
    pub fn color_enabled(&self, format: OutputFormat, no_color_env: bool) -> bool {
        self.color && !no_color_env && format == OutputFormat::Text
    }
}
