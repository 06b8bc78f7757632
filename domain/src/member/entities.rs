//! Member entity and its generation parameters

use crate::core::error::ValidationError;
use crate::core::model::Model;
use serde::{Deserialize, Serialize};

/// Default sampling temperature for a new member.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Unique identifier of a member within a session (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Per-member generation parameters passed to the model invocation port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub temperature: f32,
    pub thinking: bool,
    /// Instruction this member works on in task mode.
    pub task: Option<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            thinking: false,
            task: None,
        }
    }
}

impl GenerationParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidTemperature(self.temperature));
        }
        Ok(())
    }

    pub fn has_task(&self) -> bool {
        self.task.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// A participant in a group discussion (Entity)
///
/// Members are edited only between rounds. The engine clones the roster at
/// round start, so a running turn never observes an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    id: MemberId,
    name: String,
    model: Model,
    #[serde(default)]
    persona: Option<String>,
    #[serde(default)]
    params: GenerationParams,
}

impl Member {
    pub fn new(id: impl Into<MemberId>, name: impl Into<String>, model: Model) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            model,
            persona: None,
            params: GenerationParams::default(),
        }
    }

    // ==================== Accessors ====================

    pub fn id(&self) -> &MemberId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn persona(&self) -> Option<&str> {
        self.persona.as_deref()
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn task(&self) -> Option<&str> {
        self.params.task.as_deref()
    }

    // ==================== Builder Methods ====================

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.params.temperature = temperature;
        self
    }

    pub fn with_thinking(mut self, thinking: bool) -> Self {
        self.params.thinking = thinking;
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.params.task = Some(task.into());
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn set_task(&mut self, task: Option<String>) {
        self.params.task = task;
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.params.validate()
    }
}

impl From<String> for MemberId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_defaults() {
        let member = Member::new("m1", "Alice", Model::qwen_plus());
        assert_eq!(member.id().as_str(), "m1");
        assert_eq!(member.params().temperature, DEFAULT_TEMPERATURE);
        assert!(!member.params().thinking);
        assert!(member.task().is_none());
    }

    #[test]
    fn test_temperature_bounds() {
        assert!(Member::new("m", "M", Model::default()).with_temperature(0.0).validate().is_ok());
        assert!(Member::new("m", "M", Model::default()).with_temperature(2.0).validate().is_ok());
        assert_eq!(
            Member::new("m", "M", Model::default())
                .with_temperature(2.5)
                .validate(),
            Err(ValidationError::InvalidTemperature(2.5))
        );
    }

    #[test]
    fn test_blank_task_is_not_a_task() {
        let member = Member::new("m", "M", Model::default()).with_task("   ");
        assert!(!member.params().has_task());
        let member = member.with_task("review the api");
        assert!(member.params().has_task());
    }

    #[test]
    fn test_member_deserializes_without_params() {
        let member: Member =
            serde_json::from_str(r#"{"id":"a","name":"A","model":"qwen-plus"}"#).unwrap();
        assert_eq!(member.params(), &GenerationParams::default());
    }
}
