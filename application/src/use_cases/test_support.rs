//! Test doubles for the application ports.

use crate::ports::model_invoker::{Completion, ModelInvoker, ProviderError, TurnRequest};
use crate::ports::session_store::{SessionStore, StoreError};
use crate::ports::summarizer::{Summarizer, SummarizerError};
use async_trait::async_trait;
use chorus_domain::{
    ContextLedger, DiscussionMode, Member, Message, Model, Roster, Session, SessionId,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// ==================== Model invoker ====================

pub(crate) struct Step {
    delay: Duration,
    result: Result<Completion, ProviderError>,
}

impl Step {
    pub(crate) fn reply(content: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(Completion::text(content)),
        }
    }

    pub(crate) fn consensus(content: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(Completion::text(content).with_consensus()),
        }
    }

    pub(crate) fn fail(error: ProviderError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }

    pub(crate) fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub member: String,
    pub instruction: String,
    pub history: Vec<String>,
}

/// Replies from a per-member script; unscripted calls echo "<name> reply".
pub(crate) struct ScriptedInvoker {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedInvoker {
    pub(crate) fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn script(self, member_id: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(member_id.to_string(), steps.into());
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_for(&self, member_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.member == member_id)
            .count()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn invoke(&self, request: &TurnRequest, member: &Member) -> Result<Completion, ProviderError> {
        self.calls.lock().unwrap().push(Call {
            member: member.id().to_string(),
            instruction: request.instruction.clone(),
            history: request
                .history
                .messages()
                .iter()
                .map(|m| m.content().to_string())
                .collect(),
        });
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(member.id().as_str())
            .and_then(VecDeque::pop_front);
        match step {
            Some(step) => {
                if !step.delay.is_zero() {
                    tokio::time::sleep(step.delay).await;
                }
                step.result
            }
            None => Ok(Completion::text(format!("{} reply", member.name()))),
        }
    }
}

pub(crate) fn request() -> TurnRequest {
    TurnRequest {
        system_prompt: "system".to_string(),
        history: ContextLedger::default().snapshot(),
        instruction: "go".to_string(),
        mode: DiscussionMode::Free,
    }
}

// ==================== Summarizer ====================

pub(crate) struct FixedSummarizer {
    result: Result<String, SummarizerError>,
    calls: AtomicUsize,
}

impl FixedSummarizer {
    pub(crate) fn ok(summary: &str) -> Self {
        Self {
            result: Ok(summary.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            result: Err(SummarizerError::Unavailable("offline".to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for FixedSummarizer {
    async fn summarize(&self, _prefix: &[Message]) -> Result<String, SummarizerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Never answers.
#[derive(Default)]
pub(crate) struct HangingSummarizer {
    calls: AtomicUsize,
}

impl HangingSummarizer {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for HangingSummarizer {
    async fn summarize(&self, _prefix: &[Message]) -> Result<String, SummarizerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

// ==================== Session store ====================

#[derive(Default)]
pub(crate) struct MemoryStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub(crate) fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub(crate) fn stored(&self, id: &SessionId) -> Option<Session> {
        self.sessions.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_session(&self, id: &SessionId) -> Result<Session, StoreError> {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id().clone(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), StoreError> {
        self.sessions.lock().unwrap().remove(id);
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionId>, StoreError> {
        Ok(self.sessions.lock().unwrap().keys().cloned().collect())
    }
}

// ==================== Fixtures ====================

pub(crate) fn member(id: &str, name: &str) -> Member {
    Member::new(id, name, Model::new("test-model"))
}

pub(crate) fn session_with(members: Vec<Member>) -> Session {
    let roster = Roster::from_members(members).unwrap();
    Session::new(SessionId::new("s1"), "test", roster)
}
