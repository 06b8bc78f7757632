//! Group session aggregate

use super::mode::DiscussionMode;
use super::threshold::ThresholdRatio;
use crate::core::error::ValidationError;
use crate::core::model::ModelCatalog;
use crate::conversation::ContextLedger;
use crate::member::{Member, Roster};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier of a group session (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Time-ordered identifier unique within this process.
    pub fn generate() -> Self {
        let n = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}-{n:04}", Utc::now().format("%Y%m%d%H%M%S%3f")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A group discussion: roster, optional manager, default mode and ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    name: String,
    roster: Roster,
    #[serde(default)]
    manager: Option<Member>,
    #[serde(default)]
    mode: DiscussionMode,
    ledger: ContextLedger,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, name: impl Into<String>, roster: Roster) -> Self {
        Self {
            id,
            name: name.into(),
            roster,
            manager: None,
            mode: DiscussionMode::default(),
            ledger: ContextLedger::default(),
            created_at: Utc::now(),
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_manager(mut self, manager: Member) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn with_mode(mut self, mode: DiscussionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_threshold(mut self, threshold: ThresholdRatio) -> Self {
        self.ledger.set_threshold(threshold);
        self
    }

    // ==================== Accessors ====================

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    pub fn manager(&self) -> Option<&Member> {
        self.manager.as_ref()
    }

    pub fn mode(&self) -> DiscussionMode {
        self.mode
    }

    pub fn ledger(&self) -> &ContextLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut ContextLedger {
        &mut self.ledger
    }

    pub fn threshold(&self) -> ThresholdRatio {
        self.ledger.threshold()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // ==================== Mutation ====================

    pub fn set_manager(&mut self, manager: Option<Member>) -> Result<(), ValidationError> {
        if let Some(manager) = &manager {
            manager.validate()?;
        }
        self.manager = manager;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: DiscussionMode) {
        self.mode = mode;
    }

    pub fn set_threshold(&mut self, threshold: ThresholdRatio) {
        self.ledger.set_threshold(threshold);
    }

    /// Recompute the ledger budget from the current roster and manager.
    pub fn refresh_budget(&mut self, catalog: &ModelCatalog) -> usize {
        let budget = self.roster.context_budget(catalog, self.manager.as_ref());
        self.ledger.set_max_tokens(budget);
        budget
    }

    /// Members that run in the concurrent part of a leader round.
    pub fn non_manager_members(&self) -> Vec<Member> {
        let manager_id = self.manager.as_ref().map(Member::id);
        self.roster
            .iter()
            .filter(|m| Some(m.id()) != manager_id)
            .cloned()
            .collect()
    }

    /// Check that a round with these parameters can start.
    pub fn validate_round(
        &self,
        content: &str,
        max_rounds: usize,
        mode: DiscussionMode,
    ) -> Result<(), ValidationError> {
        if content.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        if max_rounds == 0 {
            return Err(ValidationError::InvalidMaxRounds);
        }
        if self.roster.is_empty() {
            return Err(ValidationError::EmptyRoster);
        }
        match mode {
            DiscussionMode::Leader if self.manager.is_none() => Err(ValidationError::MissingManager),
            DiscussionMode::Task => {
                let missing = self.roster.missing_tasks();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(ValidationError::MissingTask(missing))
                }
            }
            _ => Ok(()),
        }
    }
}
