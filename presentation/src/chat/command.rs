//! Slash commands understood by the chat REPL

use chorus_domain::DiscussionMode;

const DEFAULT_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    Help,
    Quit,
    /// Show or change the session's default mode
    Mode(Option<DiscussionMode>),
    /// Show or change passes per free-mode round
    Rounds(Option<usize>),
    /// Show or change the compaction threshold
    Threshold(Option<f64>),
    Stats,
    Members,
    /// Assign (or with no text, clear) a member's task
    Task { member: String, task: Option<String> },
    /// Ask the manager for a conclusion, with optional extra instruction
    Summary(Option<String>),
    /// Show the last N logged messages
    History(usize),
}

impl ChatCommand {
    /// Parse a line starting with `/`.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        let arg = (!rest.is_empty()).then_some(rest);

        match name {
            "/help" | "/h" | "/?" => Ok(ChatCommand::Help),
            "/quit" | "/exit" | "/q" => Ok(ChatCommand::Quit),
            "/mode" => arg
                .map(|a| a.parse::<DiscussionMode>().map_err(|e| e.to_string()))
                .transpose()
                .map(ChatCommand::Mode),
            "/rounds" => match arg {
                None => Ok(ChatCommand::Rounds(None)),
                Some(a) => match a.parse::<usize>() {
                    Ok(n) if n > 0 => Ok(ChatCommand::Rounds(Some(n))),
                    _ => Err(format!("rounds must be a positive number, got '{a}'")),
                },
            },
            "/threshold" => arg
                .map(|a| {
                    a.parse::<f64>()
                        .map_err(|_| format!("threshold must be a number, got '{a}'"))
                })
                .transpose()
                .map(ChatCommand::Threshold),
            "/stats" => Ok(ChatCommand::Stats),
            "/members" => Ok(ChatCommand::Members),
            "/task" => {
                let Some(arg) = arg else {
                    return Err("usage: /task NAME [TASK]".to_string());
                };
                let (member, task) = match arg.split_once(char::is_whitespace) {
                    Some((member, task)) => (member, Some(task.trim().to_string())),
                    None => (arg, None),
                };
                Ok(ChatCommand::Task {
                    member: member.to_string(),
                    task,
                })
            }
            "/summary" => Ok(ChatCommand::Summary(arg.map(str::to_string))),
            "/history" => match arg {
                None => Ok(ChatCommand::History(DEFAULT_HISTORY)),
                Some(a) => a
                    .parse::<usize>()
                    .map(ChatCommand::History)
                    .map_err(|_| format!("history takes a count, got '{a}'")),
            },
            other => Err(format!("Unknown command: {other}")),
        }
    }

    pub fn help() -> &'static str {
        r#"Commands:
  /help, /h, /?          Show this help
  /mode [MODE]           Show or set the mode (free, leader, task, qa)
  /rounds [N]            Show or set passes per free-mode round
  /threshold [RATIO]     Show or set the compaction threshold, in (0, 1]
  /stats                 Show context usage
  /members               List members and the manager
  /task NAME [TASK]      Assign or clear a member's task
  /summary [NOTE]        Ask the manager for a conclusion
  /history [N]           Show the last N messages
  /quit, /exit, /q       Exit chat

Press Ctrl-C while members are answering to stop the round."#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(ChatCommand::parse("/q"), Ok(ChatCommand::Quit));
        assert_eq!(ChatCommand::parse(" /stats "), Ok(ChatCommand::Stats));
        assert_eq!(ChatCommand::parse("/history"), Ok(ChatCommand::History(10)));
        assert_eq!(ChatCommand::parse("/history 3"), Ok(ChatCommand::History(3)));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(ChatCommand::parse("/mode"), Ok(ChatCommand::Mode(None)));
        assert_eq!(
            ChatCommand::parse("/mode race"),
            Ok(ChatCommand::Mode(Some(DiscussionMode::Qa)))
        );
        assert!(ChatCommand::parse("/mode debate").is_err());
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(ChatCommand::parse("/rounds 2"), Ok(ChatCommand::Rounds(Some(2))));
        assert!(ChatCommand::parse("/rounds 0").is_err());
        assert_eq!(
            ChatCommand::parse("/threshold 0.75"),
            Ok(ChatCommand::Threshold(Some(0.75)))
        );
        assert!(ChatCommand::parse("/threshold high").is_err());
    }

    #[test]
    fn test_parse_task() {
        assert_eq!(
            ChatCommand::parse("/task Alice write the   tests"),
            Ok(ChatCommand::Task {
                member: "Alice".to_string(),
                task: Some("write the   tests".to_string()),
            })
        );
        assert_eq!(
            ChatCommand::parse("/task Alice"),
            Ok(ChatCommand::Task {
                member: "Alice".to_string(),
                task: None,
            })
        );
        assert!(ChatCommand::parse("/task").is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            ChatCommand::parse("/dance"),
            Err("Unknown command: /dance".to_string())
        );
    }
}
