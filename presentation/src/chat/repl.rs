//! REPL (Read-Eval-Print Loop) for interactive group chat

use super::command::ChatCommand;
use super::round::present_round;
use crate::ConsoleFormatter;
use chorus_application::{DiscussionError, DiscussionService, ModelInvoker, RoundRequest};
use chorus_domain::{MemberId, OutputFormat, SessionId};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::path::PathBuf;
use std::sync::Arc;

/// Interactive chat REPL
pub struct ChatRepl<M: ModelInvoker + 'static> {
    service: Arc<DiscussionService<M>>,
    session: SessionId,
    format: OutputFormat,
    show_progress: bool,
    history_file: Option<PathBuf>,
    rounds: Option<usize>,
}

impl<M: ModelInvoker + 'static> ChatRepl<M> {
    /// Create a new ChatRepl for an existing session
    pub fn new(service: Arc<DiscussionService<M>>, session: SessionId) -> Self {
        Self {
            service,
            session,
            format: OutputFormat::Text,
            show_progress: true,
            history_file: None,
            rounds: None,
        }
    }

    /// Set whether to show progress
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_history_file(mut self, path: Option<PathBuf>) -> Self {
        self.history_file = path;
        self
    }

    /// Passes per free-mode round; the configured default when unset
    pub fn with_rounds(mut self, rounds: Option<usize>) -> Self {
        self.rounds = rounds;
        self
    }

    /// Run the interactive REPL
    pub async fn run(&mut self) -> RlResult<()> {
        let mut rl = DefaultEditor::new()?;

        if let Some(ref path) = self.history_file {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(path);
        }

        self.print_welcome().await;

        loop {
            match rl.readline(">>> ") {
                Ok(line) => {
                    let line = line.trim();

                    // Skip empty lines
                    if line.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(line);

                    if line.starts_with('/') {
                        match ChatCommand::parse(line) {
                            Ok(ChatCommand::Quit) => {
                                println!("Bye!");
                                break;
                            }
                            Ok(command) => {
                                if let Err(e) = self.handle_command(command).await {
                                    eprintln!("{} {}", "Error:".red().bold(), e);
                                }
                            }
                            Err(message) => {
                                println!("{}", message);
                                println!("Type /help for available commands");
                            }
                        }
                        continue;
                    }

                    self.process_message(line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(ref path) = self.history_file {
            let _ = rl.save_history(path);
        }

        Ok(())
    }

    async fn print_welcome(&self) {
        println!();
        println!("{}", ConsoleFormatter::header("Chorus - Group Chat"));
        println!();
        if let Ok(session) = self.service.session(&self.session).await {
            println!(
                "Session {} ({} mode)",
                self.session.as_str().bold(),
                session.mode()
            );
            print!(
                "{}",
                ConsoleFormatter::format_members(session.roster(), session.manager())
            );
        }
        println!();
        println!("Type a message to start a round, /help for commands.");
        println!();
    }

    async fn handle_command(&mut self, command: ChatCommand) -> Result<(), DiscussionError> {
        let service = &self.service;
        let id = &self.session;
        match command {
            ChatCommand::Help => println!("\n{}\n", ChatCommand::help()),
            ChatCommand::Quit => {}
            ChatCommand::Mode(None) => {
                println!("Mode: {}", service.session(id).await?.mode());
            }
            ChatCommand::Mode(Some(mode)) => {
                service.set_mode(id, mode).await?;
                println!("Mode set to {}", mode);
            }
            ChatCommand::Rounds(None) => {
                let rounds = self
                    .rounds
                    .unwrap_or(service.params().default_max_rounds);
                println!("Rounds per message: {}", rounds);
            }
            ChatCommand::Rounds(Some(n)) => {
                self.rounds = Some(n);
                println!("Rounds per message set to {}", n);
            }
            ChatCommand::Threshold(None) => {
                println!("Threshold: {}", service.session(id).await?.threshold());
            }
            ChatCommand::Threshold(Some(ratio)) => {
                service.set_threshold(id, ratio).await?;
                println!("Threshold set to {:.2} (applies from the next round)", ratio);
            }
            ChatCommand::Stats => {
                print!("{}", ConsoleFormatter::format_stats(&service.get_stats(id).await?));
                println!();
            }
            ChatCommand::Members => {
                let session = service.session(id).await?;
                print!(
                    "{}",
                    ConsoleFormatter::format_members(session.roster(), session.manager())
                );
                println!();
            }
            ChatCommand::Task { member, task } => {
                let session = service.session(id).await?;
                let member_id = session
                    .roster()
                    .find_by_name(&member)
                    .map(|m| m.id().clone())
                    .unwrap_or_else(|| MemberId::new(member.as_str()));
                let cleared = task.is_none();
                service.set_member_task(id, &member_id, task).await?;
                if cleared {
                    println!("Cleared task for {}", member);
                } else {
                    println!("Task set for {}", member);
                }
            }
            ChatCommand::Summary(note) => {
                let message = service.summarize(id, note.as_deref()).await?;
                println!();
                print!("{}", ConsoleFormatter::format_message(&message));
                println!();
            }
            ChatCommand::History(n) => {
                println!();
                for message in service.messages(id, n).await? {
                    print!("{}", ConsoleFormatter::format_message(&message));
                }
                println!();
            }
        }
        Ok(())
    }

    async fn process_message(&self, content: &str) {
        println!();

        let mut request = RoundRequest::new(content);
        if let Some(rounds) = self.rounds {
            request = request.with_max_rounds(rounds);
        }

        match present_round(
            &self.service,
            &self.session,
            request,
            self.format,
            self.show_progress,
        )
        .await
        {
            Ok(outcome) if outcome.interrupted => {
                println!("{}", "Round stopped.".yellow());
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("{} {}", "Error:".red().bold(), e);
            }
        }
        println!();
    }
}
