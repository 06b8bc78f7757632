//! CLI entrypoint for chorus
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use chorus_application::{
    CompressionTrigger, DiscussionError, DiscussionService, NewSession, RoundRequest,
    SessionStore, Summarizer,
};
use chorus_domain::{ConfigIssueCode, DiscussionMode, Member, Roster, SessionId};
use chorus_infrastructure::config::parse_roster;
use chorus_infrastructure::{
    ConfigLoader, ExtractiveSummarizer, FileConfig, FileMemberConfig, InMemorySessionStore,
    JsonFileSessionStore, JsonlConversationLogger, LoopbackInvoker, ModelSummarizer,
    StorageBackend, SummarizerKind,
};
use chorus_presentation::{
    ChatRepl, Cli, ConsoleFormatter, parse_member_arg, parse_task_arg, present_round,
};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources();
        return Ok(());
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).context("failed to load configuration")?
    };

    // Keep the guard alive so buffered log lines are flushed on exit
    let log_dir = cli.log_dir.as_deref().or(config.logging.directory.as_deref());
    let _log_guard = init_logging(cli.verbose, log_dir);

    info!("Starting chorus");

    check_config(&config, cli.manager.is_some())?;

    let format = config.output.resolve_format(cli.output.map(Into::into));
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    if !config.output.color_enabled(format, no_color_env) {
        colored::control::set_override(false);
    }

    // === Roster ===
    let roster = build_roster(&cli.members, &config)?;
    let roster = assign_tasks(roster, &cli.tasks)?;
    let manager = match &cli.manager {
        Some(raw) => Some(member_from_arg(raw, "--manager")?),
        None => config
            .manager
            .as_ref()
            .and_then(|m| m.to_member("manager").ok()),
    };

    // === Dependency Injection ===
    let (params, _) = config.discussion.to_params();
    let (catalog, _) = config.models.to_catalog();
    let invoker = Arc::new(LoopbackInvoker::new());

    let (kind, _) = config.compression.parse_summarizer();
    let (max_chars, _) = config.compression.summary_max_chars();
    let summarizer: Arc<dyn Summarizer> = match (kind, &manager) {
        (SummarizerKind::Manager, Some(speaker)) => {
            Arc::new(
                ModelSummarizer::new(invoker.clone(), speaker.clone())
                    .with_attempt_timeout(params.turn_timeout),
            )
        }
        _ => Arc::new(ExtractiveSummarizer::new(max_chars)),
    };
    let compressor = CompressionTrigger::new(summarizer, config.compression.to_params());

    let store: Arc<dyn SessionStore> = match config.storage.parse_backend().0 {
        StorageBackend::Memory => Arc::new(InMemorySessionStore::new()),
        StorageBackend::Json => Arc::new(JsonFileSessionStore::new(config.storage.sessions_dir())),
    };

    let mut service = DiscussionService::new(invoker, compressor, store, catalog, params);
    if let Some(path) = &config.logging.conversation_log {
        match JsonlConversationLogger::open(path) {
            Some(logger) => service = service.with_conversation_logger(Arc::new(logger)),
            None => warn!("Conversation log disabled: cannot open {}", path.display()),
        }
    }
    let service = Arc::new(service);

    // === Session ===
    let (default_mode, _) = config.discussion.parse_mode();
    let mode = cli.mode.map(DiscussionMode::from).unwrap_or(default_mode);
    let threshold = cli
        .threshold
        .unwrap_or_else(|| config.compression.to_threshold().0.value());

    let existing = match &cli.session {
        Some(name) => {
            let id = SessionId::new(name.as_str());
            match service.session(&id).await {
                Ok(_) => Some(id),
                Err(DiscussionError::SessionNotFound(_)) => None,
                Err(e) => return Err(e.into()),
            }
        }
        None => None,
    };

    let session_id = match existing {
        Some(id) => {
            info!("Resuming session {}", id);
            if let Some(ratio) = cli.threshold {
                service.set_threshold(&id, ratio).await?;
            }
            if cli.mode.is_some() {
                service.set_mode(&id, mode).await?;
            }
            id
        }
        None => {
            let new_session = NewSession {
                id: cli.session.as_deref().map(SessionId::new),
                name: cli.session.clone().unwrap_or_else(|| "chorus".to_string()),
                members: roster.members().to_vec(),
                manager,
                mode,
                threshold: Some(threshold),
            };
            service.create_session(new_session).await?
        }
    };

    // Chat mode
    if cli.chat {
        let mut repl = ChatRepl::new(service, session_id)
            .with_progress(!cli.quiet && config.repl.show_progress)
            .with_format(format)
            .with_history_file(config.repl.history_path())
            .with_rounds(cli.rounds);

        repl.run().await?;
        return Ok(());
    }

    // Single question mode - question is required
    let question = match cli.question {
        Some(q) => q,
        None => bail!("Question is required. Use --chat for interactive mode."),
    };

    let mut request = RoundRequest::new(question.clone()).with_mode(mode);
    if let Some(rounds) = cli.rounds {
        request = request.with_max_rounds(rounds);
    }

    let text_output = format == chorus_domain::OutputFormat::Text;
    if text_output && !cli.quiet {
        let session = service.session(&session_id).await?;
        println!("{}", ConsoleFormatter::header(&format!("chorus - {} mode", mode)));
        println!("Question: {}", question);
        println!();
        print!("{}", ConsoleFormatter::format_members(session.roster(), session.manager()));
        println!();
    }

    let outcome = present_round(&service, &session_id, request, format, !cli.quiet).await?;
    info!(
        "Round finished: {} replies, {} failures",
        outcome.replies, outcome.failures
    );

    if cli.conclude && !outcome.interrupted {
        let conclusion = service.summarize(&session_id, None).await?;
        if text_output {
            println!();
            println!("{}", ConsoleFormatter::format_message(&conclusion));
        } else {
            println!("{}", conclusion.content());
        }
    }

    if outcome.replies == 0 && outcome.failures > 0 {
        bail!("every member failed to reply");
    }

    Ok(())
}

/// Install the tracing subscriber; `-v` raises the level, `log_dir` sends
/// output to a daily rolling file instead of stderr.
fn init_logging(verbose: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "chorus.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

/// Log every config issue; abort when a fatal one remains.
///
/// A missing `[manager]` is not fatal when `--manager` supplies one.
fn check_config(config: &FileConfig, manager_on_cli: bool) -> Result<()> {
    let mut fatal = 0;
    for issue in config.validate() {
        if manager_on_cli && issue.code == ConfigIssueCode::LeaderWithoutManager {
            continue;
        }
        if issue.is_error() {
            error!("config: {}", issue.message);
            fatal += 1;
        } else {
            warn!("config: {}", issue.message);
        }
    }
    if fatal > 0 {
        bail!("configuration has {} error(s); run with -v for details", fatal);
    }
    Ok(())
}

fn member_from_arg(raw: &str, field: &str) -> Result<Member> {
    let (name, model) = parse_member_arg(raw).map_err(anyhow::Error::msg)?;
    let entry = FileMemberConfig {
        name,
        model: model.to_string(),
        ..FileMemberConfig::default()
    };
    entry
        .to_member(field)
        .map_err(|issue| anyhow::anyhow!(issue.message))
}

/// Roster from `--member` flags, else `[[members]]`, else the default models.
fn build_roster(args: &[String], config: &FileConfig) -> Result<Roster> {
    if !args.is_empty() {
        let mut roster = Roster::new();
        for (i, raw) in args.iter().enumerate() {
            let member = member_from_arg(raw, &format!("--member #{}", i + 1))?;
            roster.add(member)?;
        }
        return Ok(roster);
    }

    let (roster, _) = parse_roster(&config.members);
    if !roster.is_empty() {
        return Ok(roster);
    }

    let entries: Vec<FileMemberConfig> = chorus_domain::Model::default_models()
        .into_iter()
        .map(|model| FileMemberConfig {
            name: model.to_string(),
            model: model.to_string(),
            ..FileMemberConfig::default()
        })
        .collect();
    Ok(parse_roster(&entries).0)
}

/// Apply `--task NAME=TASK` assignments by member name.
fn assign_tasks(mut roster: Roster, args: &[String]) -> Result<Roster> {
    for raw in args {
        let (name, task) = parse_task_arg(raw).map_err(anyhow::Error::msg)?;
        let id = match roster.find_by_name(&name) {
            Some(member) => member.id().clone(),
            None => bail!("--task names unknown member '{}'", name),
        };
        roster.set_task(&id, Some(task))?;
    }
    Ok(roster)
}
