//! Console output formatter for discussion rounds

use crate::output::formatter::FrameFormatter;
use chorus_domain::conversation::SYSTEM_SENDER;
use chorus_domain::{
    ContextStats, DiscussionEvent, Member, Message, MessageKind, Roster, StreamFrame,
};
use colored::Colorize;

/// Formats round events and session state for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format one streamed event
    pub fn format_event(event: &DiscussionEvent) -> String {
        match event {
            DiscussionEvent::Message { sender, content, .. } if sender == SYSTEM_SENDER => {
                format!("{} {}\n", "--".dimmed(), content.italic().dimmed())
            }
            DiscussionEvent::Message {
                sender, content, ..
            } => format!(
                "{}\n{}\n",
                format!("── {} ──", sender).yellow().bold(),
                content
            ),
            DiscussionEvent::Error {
                sender,
                message,
                retryable,
            } => {
                let hint = if *retryable { " (temporary)" } else { "" };
                format!(
                    "{}\n",
                    format!("x {} failed{}: {}", sender, hint, message).red()
                )
            }
            DiscussionEvent::Stats {
                current_tokens,
                max_tokens,
                threshold_ratio,
                ..
            } => format!(
                "{}\n",
                Self::usage_line(*current_tokens, *max_tokens, *threshold_ratio).dimmed()
            ),
        }
    }

    /// Detailed context statistics for `/stats`
    pub fn format_stats(stats: &ContextStats) -> String {
        let mut output = String::new();
        output.push_str(&Self::section_header("Context"));
        output.push_str(&format!(
            "  {} ~{} / {} tokens ({:.1}%)\n",
            "Usage:".cyan().bold(),
            stats.current_tokens,
            stats.max_tokens,
            stats.usage_ratio() * 100.0
        ));
        output.push_str(&format!(
            "  {} {:.0}% (~{} tokens)\n",
            "Compaction at:".cyan().bold(),
            stats.threshold_ratio * 100.0,
            stats.threshold_tokens
        ));
        output.push_str(&format!(
            "  {} {}\n",
            "Messages:".cyan().bold(),
            stats.message_count
        ));
        let folded = stats
            .compressed_through
            .map_or_else(|| "never".to_string(), |seq| format!("through #{}", seq));
        output.push_str(&format!("  {} {}\n", "Compacted:".cyan().bold(), folded));
        output
    }

    /// Roster listing for `/members`
    pub fn format_members(roster: &Roster, manager: Option<&Member>) -> String {
        let mut output = Self::section_header("Members");
        for (slot, member) in roster.iter().enumerate() {
            output.push_str(&format!(
                "  {}. {} {}\n",
                slot + 1,
                member.name().bold(),
                format!("[{}]", member.model()).dimmed()
            ));
            if let Some(task) = member.task() {
                output.push_str(&format!("     task: {}\n", task));
            }
        }
        if roster.is_empty() {
            output.push_str(&format!("  {}\n", "(no members)".dimmed()));
        }
        if let Some(manager) = manager {
            output.push_str(&format!(
                "  {} {} {}\n",
                "Manager:".cyan().bold(),
                manager.name(),
                format!("[{}]", manager.model()).dimmed()
            ));
        }
        output
    }

    /// A logged message, as shown by `/history` and `/summary`
    pub fn format_message(message: &Message) -> String {
        let label = format!("#{} {}", message.seq(), message.sender());
        let label = match message.kind() {
            MessageKind::Turn => label.yellow().bold(),
            MessageKind::Notice => label.dimmed(),
            MessageKind::Summary => label.magenta().bold(),
        };
        format!("{}\n{}\n", label, Self::indent(message.content(), "  "))
    }

    fn usage_line(current: usize, max: usize, threshold: f64) -> String {
        let percent = if max == 0 {
            0.0
        } else {
            current as f64 / max as f64 * 100.0
        };
        format!(
            "context ~{}/{} tokens ({:.1}%, compaction at {:.0}%)",
            current,
            max,
            percent,
            threshold * 100.0
        )
    }

    pub fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FrameFormatter for ConsoleFormatter {
    fn format_frame(&self, frame: &StreamFrame) -> Option<String> {
        Some(Self::format_event(&frame.event))
    }
}
