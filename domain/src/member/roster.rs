//! Ordered roster of session members

use super::entities::{Member, MemberId};
use crate::core::error::ValidationError;
use crate::core::model::ModelCatalog;
use serde::{Deserialize, Serialize};

/// Ordered set of members; order is the speaking order in free mode and
/// the slot index in task mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    members: Vec<Member>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster, rejecting duplicate ids and invalid parameters.
    pub fn from_members(members: impl IntoIterator<Item = Member>) -> Result<Self, ValidationError> {
        let mut roster = Self::new();
        for member in members {
            roster.add(member)?;
        }
        Ok(roster)
    }

    pub fn add(&mut self, member: Member) -> Result<(), ValidationError> {
        member.validate()?;
        if self.find(member.id()).is_some() {
            return Err(ValidationError::DuplicateMember(member.id().to_string()));
        }
        self.members.push(member);
        Ok(())
    }

    pub fn remove(&mut self, id: &MemberId) -> Result<Member, ValidationError> {
        let slot = self
            .slot_of(id)
            .ok_or_else(|| ValidationError::UnknownMember(id.to_string()))?;
        Ok(self.members.remove(slot))
    }

    /// Replace the member sharing `member`'s id, keeping its position.
    pub fn update(&mut self, member: Member) -> Result<(), ValidationError> {
        member.validate()?;
        let slot = self
            .slot_of(member.id())
            .ok_or_else(|| ValidationError::UnknownMember(member.id().to_string()))?;
        self.members[slot] = member;
        Ok(())
    }

    pub fn set_task(&mut self, id: &MemberId, task: Option<String>) -> Result<(), ValidationError> {
        let member = self
            .members
            .iter_mut()
            .find(|m| m.id() == id)
            .ok_or_else(|| ValidationError::UnknownMember(id.to_string()))?;
        member.set_task(task);
        Ok(())
    }

    pub fn find(&self, id: &MemberId) -> Option<&Member> {
        self.members.iter().find(|m| m.id() == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name() == name)
    }

    pub fn slot_of(&self, id: &MemberId) -> Option<usize> {
        self.members.iter().position(|m| m.id() == id)
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Names of members that have no usable task description.
    pub fn missing_tasks(&self) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| !m.params().has_task())
            .map(|m| m.name().to_string())
            .collect()
    }

    /// Token budget for the session: the smallest context window among the
    /// members and the manager, so the tightest model governs compression.
    pub fn context_budget(&self, catalog: &ModelCatalog, manager: Option<&Member>) -> usize {
        self.members
            .iter()
            .chain(manager)
            .map(|m| catalog.context_window(m.model()))
            .min()
            .unwrap_or_else(|| catalog.default_window())
    }

    /// Per-member context windows, keyed by display name.
    pub fn member_windows(&self, catalog: &ModelCatalog) -> Vec<(String, usize)> {
        self.members
            .iter()
            .map(|m| (m.name().to_string(), catalog.context_window(m.model())))
            .collect()
    }
}
