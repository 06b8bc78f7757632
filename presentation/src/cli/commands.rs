//! CLI command definitions

use chorus_domain::{DiscussionMode, Model};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for streamed round events
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored transcript
    Text,
    /// One JSON object per event
    Json,
    /// Server-sent-events records
    Sse,
}

impl From<OutputFormat> for chorus_domain::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => chorus_domain::OutputFormat::Text,
            OutputFormat::Json => chorus_domain::OutputFormat::Json,
            OutputFormat::Sse => chorus_domain::OutputFormat::Sse,
        }
    }
}

/// Discussion protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Members speak in turn and see each other's replies
    Free,
    /// The manager speaks first, then everyone else at once
    Leader,
    /// Each member works on its own task at once
    Task,
    /// Everyone answers independently, fastest first
    #[value(alias = "race")]
    Qa,
}

impl From<ModeArg> for DiscussionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Free => DiscussionMode::Free,
            ModeArg::Leader => DiscussionMode::Leader,
            ModeArg::Task => DiscussionMode::Task,
            ModeArg::Qa => DiscussionMode::Qa,
        }
    }
}

/// CLI arguments for chorus
#[derive(Parser, Debug)]
#[command(name = "chorus")]
#[command(author, version, about = "Group chat for language models - several members discuss one question")]
#[command(long_about = r#"
Chorus puts several language-model members in one group conversation and
streams their replies as they arrive.

Discussion modes:
  free    Members take turns; each sees everything said before
  leader  The manager sets the direction, then the others answer at once
  task    Every member works on its own assigned task at once
  qa      Everyone answers independently; replies arrive fastest first

Long conversations are compacted automatically once the estimated token
count reaches the threshold share of the smallest member context window.

Configuration files are loaded from (in priority order):
1. CHORUS_* environment variables
2. --config <path>     Explicit config file
3. ./chorus.toml       Project-level config
4. ~/.config/chorus/config.toml   Global config

Example:
  chorus -m Critic=deepseek-chat -m Builder=qwen-plus "Should we rewrite in Rust?"
  chorus --mode leader --manager Mod=qwen-flash -m qwen-plus -m deepseek-chat "Plan the release"
  chorus --mode task -m Writer=qwen-plus --task "Writer=draft the intro" "Write a blog post"
  chorus --chat --session team
"#)]
pub struct Cli {
    /// The message to discuss (not required in chat mode)
    pub question: Option<String>,

    /// Start interactive chat mode
    #[arg(short, long)]
    pub chat: bool,

    /// Discussion mode for this run
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Passes over the roster in free mode
    #[arg(short, long, value_name = "N")]
    pub rounds: Option<usize>,

    /// Members as NAME=MODEL or MODEL (can be specified multiple times)
    #[arg(short, long = "member", value_name = "NAME=MODEL")]
    pub members: Vec<String>,

    /// Task assignments for task mode as NAME=TASK
    #[arg(long = "task", value_name = "NAME=TASK")]
    pub tasks: Vec<String>,

    /// Manager for leader mode and conclusions, as NAME=MODEL or MODEL
    #[arg(long, value_name = "NAME=MODEL")]
    pub manager: Option<String>,

    /// Compaction threshold as a share of the context window, in (0, 1]
    #[arg(long, value_name = "RATIO")]
    pub threshold: Option<f64>,

    /// Resume (or create) a named session from the session store
    #[arg(long, value_name = "ID")]
    pub session: Option<String>,

    /// Print a conclusion written by the manager after the round
    #[arg(long)]
    pub conclude: bool,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Write diagnostic logs to a daily file in this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

/// Split `NAME=VALUE`; a bare value has no name.
fn split_assignment(raw: &str) -> (Option<&str>, &str) {
    match raw.split_once('=') {
        Some((name, value)) => (Some(name.trim()), value.trim()),
        None => (None, raw.trim()),
    }
}

/// Parse a `NAME=MODEL` or `MODEL` member argument.
///
/// A bare model doubles as the member's name.
pub fn parse_member_arg(raw: &str) -> Result<(String, Model), String> {
    let (name, model) = split_assignment(raw);
    if model.is_empty() {
        return Err(format!("member '{raw}' has no model"));
    }
    let name = match name {
        Some("") => return Err(format!("member '{raw}' has an empty name")),
        Some(name) => name.to_string(),
        None => model.to_string(),
    };
    Ok((name, Model::new(model)))
}

/// Parse a `NAME=TASK` assignment.
pub fn parse_task_arg(raw: &str) -> Result<(String, String), String> {
    match split_assignment(raw) {
        (Some(name), task) if !name.is_empty() && !task.is_empty() => {
            Ok((name.to_string(), task.to_string()))
        }
        _ => Err(format!("task '{raw}' must look like NAME=TASK")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "chorus",
            "--mode",
            "race",
            "-m",
            "Critic=deepseek-chat",
            "-m",
            "qwen-plus",
            "--threshold",
            "0.6",
            "-o",
            "sse",
            "-vv",
            "Which database?",
        ])
        .unwrap();

        assert_eq!(cli.mode, Some(ModeArg::Qa));
        assert_eq!(cli.members.len(), 2);
        assert_eq!(cli.threshold, Some(0.6));
        assert_eq!(cli.output, Some(OutputFormat::Sse));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.question.as_deref(), Some("Which database?"));
    }

    #[test]
    fn test_parse_member_arg() {
        let (name, model) = parse_member_arg("Critic = deepseek-chat").unwrap();
        assert_eq!(name, "Critic");
        assert_eq!(model.as_str(), "deepseek-chat");

        let (name, model) = parse_member_arg("qwen-plus").unwrap();
        assert_eq!(name, "qwen-plus");
        assert_eq!(model, Model::qwen_plus());

        assert!(parse_member_arg("Critic=").is_err());
        assert!(parse_member_arg("=qwen-plus").is_err());
    }

    #[test]
    fn test_parse_task_arg() {
        let (name, task) = parse_task_arg("Writer=draft the intro = short").unwrap();
        assert_eq!(name, "Writer");
        assert_eq!(task, "draft the intro = short");
        assert!(parse_task_arg("just a task").is_err());
    }
}
