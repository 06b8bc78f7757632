//! Member configuration from TOML (`[[members]]` and `[manager]` sections)

use chorus_domain::{ConfigIssue, ConfigIssueCode, GenerationParams, Member, Model, Roster};
use serde::{Deserialize, Serialize};

/// One participant as written in the config file.
///
/// # Example
///
/// ```toml
/// [[members]]
/// name = "Critic"
/// model = "deepseek-chat"
/// persona = "You look for holes in every argument."
/// temperature = 0.4
///
/// [[members]]
/// name = "Builder"
/// model = "qwen-plus"
/// task = "Draft the implementation plan."
///
/// [manager]
/// name = "Moderator"
/// model = "qwen-flash"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMemberConfig {
    /// Stable id; derived from the name when omitted
    pub id: Option<String>,
    pub name: String,
    pub model: String,
    pub persona: Option<String>,
    pub temperature: f32,
    pub thinking: bool,
    pub task: Option<String>,
}

impl Default for FileMemberConfig {
    fn default() -> Self {
        let params = GenerationParams::default();
        Self {
            id: None,
            name: String::new(),
            model: Model::default().to_string(),
            persona: None,
            temperature: params.temperature,
            thinking: params.thinking,
            task: None,
        }
    }
}

impl FileMemberConfig {
    /// Build a domain member; `field` names the entry in error messages.
    pub fn to_member(&self, field: &str) -> Result<Member, ConfigIssue> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ConfigIssue::error(
                ConfigIssueCode::InvalidMember,
                format!("{field}: name cannot be empty"),
            ));
        }

        let model: Model = if self.model.trim().is_empty() {
            Model::default()
        } else {
            Model::new(self.model.trim())
        };
        let id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or_else(|| slug(name), str::to_string);

        let mut member = Member::new(id, name, model).with_params(GenerationParams {
            temperature: self.temperature,
            thinking: self.thinking,
            task: self.task.clone(),
        });
        if let Some(persona) = self.persona.as_deref().filter(|p| !p.trim().is_empty()) {
            member = member.with_persona(persona);
        }

        member.validate().map_err(|e| {
            ConfigIssue::error(ConfigIssueCode::InvalidMember, format!("{field}: {e}"))
        })?;
        Ok(member)
    }
}

/// Build the roster from `[[members]]`, dropping unusable entries.
pub fn parse_roster(members: &[FileMemberConfig]) -> (Roster, Vec<ConfigIssue>) {
    let mut issues = Vec::new();
    let mut roster = Roster::new();
    for (i, entry) in members.iter().enumerate() {
        let field = format!("members[{i}]");
        match entry.to_member(&field) {
            Ok(member) => {
                if let Err(e) = roster.add(member) {
                    issues.push(ConfigIssue::error(
                        ConfigIssueCode::InvalidMember,
                        format!("{field}: {e}"),
                    ));
                }
            }
            Err(issue) => issues.push(issue),
        }
    }
    (roster, issues)
}

/// Lowercase id from a display name: alphanumerics kept, runs of anything
/// else collapsed to `-`.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        name.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_from_toml() {
        let toml_str = r#"
[[members]]
name = "Critic"
model = "deepseek-chat"
temperature = 0.4

[[members]]
id = "b1"
name = "Builder"
task = "Draft the plan."

[manager]
name = "Moderator"
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let (roster, issues) = parse_roster(&config.members);
        assert!(issues.is_empty());
        assert_eq!(roster.len(), 2);

        let critic = &roster.members()[0];
        assert_eq!(critic.id().as_str(), "critic");
        assert_eq!(critic.model().as_str(), "deepseek-chat");
        assert_eq!(critic.params().temperature, 0.4);

        let builder = &roster.members()[1];
        assert_eq!(builder.id().as_str(), "b1");
        assert_eq!(builder.model(), &Model::default());
        assert_eq!(builder.task(), Some("Draft the plan."));

        let manager = config.manager.unwrap().to_member("manager").unwrap();
        assert_eq!(manager.name(), "Moderator");
    }

    #[test]
    fn test_invalid_members_are_reported() {
        let members = vec![
            FileMemberConfig {
                name: "  ".to_string(),
                ..Default::default()
            },
            FileMemberConfig {
                name: "Hot".to_string(),
                temperature: 3.0,
                ..Default::default()
            },
            FileMemberConfig {
                name: "Ann".to_string(),
                ..Default::default()
            },
            FileMemberConfig {
                name: "ann".to_string(),
                ..Default::default()
            },
        ];
        let (roster, issues) = parse_roster(&members);
        assert_eq!(roster.len(), 1);
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(ConfigIssue::is_error));
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Senior Reviewer #2"), "senior-reviewer-2");
        assert_eq!(slug("审稿人"), "审稿人");
        assert_eq!(slug("!!!"), "!!!");
    }
}
