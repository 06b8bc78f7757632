//! Discussion service
//!
//! The handle the surrounding API or CLI layer talks to. It owns the live
//! sessions, enforces one running round per session, and wires the engine,
//! the compression trigger and the stream multiplexer together for each
//! round:
//!
//! ```text
//! start_round ─► validate ─► spawn round task ─► EventStream
//!                               │
//!                               ├─ compress (pre) ─► engine.run_round ─► mux.forward
//!                               └─ compress (post) ─► save ─► mux.finish(stats)
//! ```

use crate::config::{ActiveRoundPolicy, DiscussionParams};
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger};
use crate::ports::model_invoker::{ModelInvoker, ProviderError, TurnRequest};
use crate::ports::session_store::{SessionStore, StoreError};
use crate::use_cases::compression::{CompactionReport, CompressionTrigger};
use crate::use_cases::engine::{DiscussionEngine, RoundInput, SessionHandle};
use crate::use_cases::multiplexer::{EventStream, StreamMultiplexer};
use crate::use_cases::shared::invoke_with_retry;
use chorus_domain::{
    ContextStats, DiscussionMode, Member, MemberId, Message, ModelCatalog, NewMessage,
    PromptTemplate, Roster, Session, SessionId, ThresholdRatio, ValidationError,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors surfaced synchronously by the service
#[derive(Error, Debug)]
pub enum DiscussionError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("A round is already running in session {0}")]
    ConcurrencyConflict(SessionId),

    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error("Model call failed: {0}")]
    Provider(#[from] ProviderError),
}

impl From<StoreError> for DiscussionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => DiscussionError::SessionNotFound(id),
            other => DiscussionError::Store(other),
        }
    }
}

impl DiscussionError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DiscussionError::ConcurrencyConflict(_))
    }
}

/// A request to run one round.
#[derive(Debug, Clone, Default)]
pub struct RoundRequest {
    pub content: String,
    /// Passes over the roster in free mode; defaults to the configured value.
    pub max_rounds: Option<usize>,
    /// Protocol for this round; defaults to the session's mode.
    pub mode: Option<DiscussionMode>,
    pub user_name: Option<String>,
}

impl RoundRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = Some(rounds);
        self
    }

    pub fn with_mode(mut self, mode: DiscussionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }
}

/// Everything needed to create a session.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    /// Chosen id; generated when unset. An existing session with the same
    /// id is replaced.
    pub id: Option<SessionId>,
    pub name: String,
    pub members: Vec<Member>,
    pub manager: Option<Member>,
    pub mode: DiscussionMode,
    pub threshold: Option<f64>,
}

/// Tokens of the round currently owning a session.
struct ActiveRound {
    cancel: CancellationToken,
    /// Cancelled by a drop guard when the round task ends.
    done: CancellationToken,
}

impl ActiveRound {
    fn is_running(&self) -> bool {
        !self.done.is_cancelled()
    }
}

struct SessionEntry {
    session: SessionHandle,
    active: Mutex<Option<ActiveRound>>,
    /// Cancelled once the session is deleted; a round still winding down
    /// must not write it back to the store.
    removed: CancellationToken,
}

impl SessionEntry {
    fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            active: Mutex::new(None),
            removed: CancellationToken::new(),
        }
    }
}

pub struct DiscussionService<M: ModelInvoker + 'static> {
    engine: Arc<DiscussionEngine<M>>,
    compressor: Arc<CompressionTrigger>,
    store: Arc<dyn SessionStore>,
    catalog: ModelCatalog,
    params: DiscussionParams,
    logger: Arc<dyn ConversationLogger>,
    sessions: Mutex<HashMap<SessionId, Arc<SessionEntry>>>,
}

impl<M: ModelInvoker + 'static> DiscussionService<M> {
    pub fn new(
        invoker: Arc<M>,
        compressor: CompressionTrigger,
        store: Arc<dyn SessionStore>,
        catalog: ModelCatalog,
        params: DiscussionParams,
    ) -> Self {
        Self {
            engine: Arc::new(DiscussionEngine::new(invoker, params.clone())),
            compressor: Arc::new(compressor),
            store,
            catalog,
            params,
            logger: Arc::new(NoConversationLogger),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Set a conversation logger for structured transcript recording
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        let engine = DiscussionEngine::new(Arc::clone(self.engine.invoker()), self.params.clone())
            .with_conversation_logger(Arc::clone(&logger));
        self.engine = Arc::new(engine);
        self.logger = logger;
        self
    }

    pub fn params(&self) -> &DiscussionParams {
        &self.params
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    // ==================== Session lifecycle ====================

    pub async fn create_session(&self, new: NewSession) -> Result<SessionId, DiscussionError> {
        let roster = Roster::from_members(new.members)?;
        let id = new.id.unwrap_or_else(SessionId::generate);
        let mut session = Session::new(id.clone(), new.name, roster).with_mode(new.mode);
        session.set_manager(new.manager)?;
        if let Some(ratio) = new.threshold {
            session.set_threshold(ThresholdRatio::new(ratio)?);
        }
        session.refresh_budget(&self.catalog);

        self.store.save_session(&session).await?;
        info!("Created session {} ({} members)", id, session.roster().len());
        self.sessions
            .lock()
            .await
            .insert(id.clone(), Arc::new(SessionEntry::new(session)));
        Ok(id)
    }

    /// Cancel any running round and forget the session.
    ///
    /// Waits up to the settle timeout for the round to wind down before the
    /// stored copy is removed. A round that outlives the wait never saves.
    pub async fn delete_session(&self, id: &SessionId) -> Result<(), DiscussionError> {
        let entry = self.sessions.lock().await.remove(id);
        if let Some(entry) = entry {
            entry.removed.cancel();
            let running = {
                let active = entry.active.lock().await;
                active.as_ref().filter(|a| a.is_running()).map(|round| {
                    round.cancel.cancel();
                    round.done.clone()
                })
            };
            if let Some(done) = running {
                let settled = tokio::time::timeout(self.params.settle_timeout, done.cancelled()).await;
                if settled.is_err() {
                    warn!("Round in session {} still winding down after delete", id);
                }
            }
        }
        self.store.delete_session(id).await?;
        info!("Deleted session {}", id);
        Ok(())
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionId>, DiscussionError> {
        Ok(self.store.list_sessions().await?)
    }

    /// A copy of the session's current state.
    pub async fn session(&self, id: &SessionId) -> Result<Session, DiscussionError> {
        let entry = self.entry(id).await?;
        let session = entry.session.lock().await.clone();
        Ok(session)
    }

    /// The last `limit` messages of the session log.
    pub async fn messages(&self, id: &SessionId, limit: usize) -> Result<Vec<Message>, DiscussionError> {
        let entry = self.entry(id).await?;
        let messages = entry.session.lock().await.ledger().tail(limit).to_vec();
        Ok(messages)
    }

    // ==================== Rounds ====================

    /// Start a round and return its event stream.
    ///
    /// Validation and overlap errors are returned here, before any turn
    /// runs. Everything after that is reported on the stream, which always
    /// ends with a `stats` frame.
    pub async fn start_round(
        &self,
        id: &SessionId,
        request: RoundRequest,
    ) -> Result<EventStream, DiscussionError> {
        let entry = self.entry(id).await?;
        let mut active = entry.active.lock().await;

        if let Some(previous) = active.as_ref().filter(|a| a.is_running()) {
            match self.params.on_active_round {
                ActiveRoundPolicy::Reject => {
                    return Err(DiscussionError::ConcurrencyConflict(id.clone()));
                }
                ActiveRoundPolicy::Preempt => {
                    info!("Pre-empting running round in session {}", id);
                    previous.cancel.cancel();
                    let settled =
                        tokio::time::timeout(self.params.settle_timeout, previous.done.cancelled())
                            .await;
                    if settled.is_err() {
                        warn!("Previous round in session {} did not settle in time", id);
                        return Err(DiscussionError::ConcurrencyConflict(id.clone()));
                    }
                }
            }
        }

        let (input, threshold) = {
            let mut session = entry.session.lock().await;
            let mode = request.mode.unwrap_or(session.mode());
            let max_rounds = request.max_rounds.unwrap_or(self.params.default_max_rounds);
            session.validate_round(&request.content, max_rounds, mode)?;
            session.refresh_budget(&self.catalog);
            let input = RoundInput {
                content: request.content,
                max_rounds,
                mode,
                user_name: request
                    .user_name
                    .unwrap_or_else(|| self.params.user_name.clone()),
            };
            (input, session.threshold())
        };

        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        *active = Some(ActiveRound {
            cancel: cancel.clone(),
            done: done.clone(),
        });
        drop(active);

        let (mux, stream) = StreamMultiplexer::channel(self.params.event_buffer, cancel.clone());
        let round = RoundTask {
            engine: Arc::clone(&self.engine),
            compressor: Arc::clone(&self.compressor),
            store: Arc::clone(&self.store),
            logger: Arc::clone(&self.logger),
            session: Arc::clone(&entry.session),
            session_id: id.clone(),
            removed: entry.removed.clone(),
            event_buffer: self.params.event_buffer,
            threshold,
        };
        tokio::spawn(round.run(input, mux, cancel, done));

        Ok(stream)
    }

    /// Cancel the running round, if any. Returns whether one was running.
    pub async fn stop_round(&self, id: &SessionId) -> Result<bool, DiscussionError> {
        let entry = self.entry(id).await?;
        let active = entry.active.lock().await;
        match active.as_ref().filter(|a| a.is_running()) {
            Some(round) => {
                info!("Stopping round in session {}", id);
                round.cancel.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn is_round_active(&self, id: &SessionId) -> Result<bool, DiscussionError> {
        let entry = self.entry(id).await?;
        let running = entry.active.lock().await.as_ref().is_some_and(ActiveRound::is_running);
        Ok(running)
    }

    // ==================== Context accounting ====================

    pub async fn get_stats(&self, id: &SessionId) -> Result<ContextStats, DiscussionError> {
        let entry = self.entry(id).await?;
        let stats = entry.session.lock().await.ledger().stats();
        Ok(stats)
    }

    /// Change the compaction threshold. Applies from the next round on and
    /// never compacts retroactively.
    pub async fn set_threshold(&self, id: &SessionId, ratio: f64) -> Result<(), DiscussionError> {
        let threshold = ThresholdRatio::new(ratio)?;
        let entry = self.entry(id).await?;
        let snapshot = {
            let mut session = entry.session.lock().await;
            session.set_threshold(threshold);
            session.clone()
        };
        self.store.save_session(&snapshot).await?;
        info!("Session {} threshold set to {}", id, threshold);
        Ok(())
    }

    // ==================== Member registry ====================

    pub async fn add_member(&self, id: &SessionId, member: Member) -> Result<(), DiscussionError> {
        self.edit_between_rounds(id, |session| session.roster_mut().add(member))
            .await
    }

    pub async fn remove_member(&self, id: &SessionId, member: &MemberId) -> Result<Member, DiscussionError> {
        self.edit_between_rounds(id, |session| session.roster_mut().remove(member))
            .await
    }

    pub async fn update_member(&self, id: &SessionId, member: Member) -> Result<(), DiscussionError> {
        self.edit_between_rounds(id, |session| session.roster_mut().update(member))
            .await
    }

    pub async fn set_member_task(
        &self,
        id: &SessionId,
        member: &MemberId,
        task: Option<String>,
    ) -> Result<(), DiscussionError> {
        self.edit_between_rounds(id, |session| session.roster_mut().set_task(member, task))
            .await
    }

    pub async fn set_manager(&self, id: &SessionId, manager: Option<Member>) -> Result<(), DiscussionError> {
        self.edit_between_rounds(id, |session| session.set_manager(manager))
            .await
    }

    pub async fn set_mode(&self, id: &SessionId, mode: DiscussionMode) -> Result<(), DiscussionError> {
        self.edit_between_rounds(id, |session| {
            session.set_mode(mode);
            Ok(())
        })
        .await
    }

    // ==================== Conclusion ====================

    /// Have the manager (or the first member) write a conclusion of the
    /// discussion so far and append it to the log.
    pub async fn summarize(&self, id: &SessionId, instruction: Option<&str>) -> Result<Message, DiscussionError> {
        let entry = self.entry(id).await?;
        let active = entry.active.lock().await;
        if active.as_ref().is_some_and(ActiveRound::is_running) {
            return Err(DiscussionError::ConcurrencyConflict(id.clone()));
        }

        let (speaker, request) = {
            let session = entry.session.lock().await;
            let speaker = session
                .manager()
                .or_else(|| session.roster().members().first())
                .cloned()
                .ok_or(ValidationError::EmptyRoster)?;
            let request = TurnRequest {
                system_prompt: PromptTemplate::conclusion_system().to_string(),
                history: session.ledger().snapshot(),
                instruction: PromptTemplate::conclusion_turn(instruction),
                mode: session.mode(),
            };
            (speaker, request)
        };

        let completion =
            invoke_with_retry(self.engine.invoker().as_ref(), &request, &speaker, &self.params).await?;

        let (message, snapshot) = {
            let mut session = entry.session.lock().await;
            let draft = NewMessage::assistant(
                speaker.name(),
                speaker.id().clone(),
                completion.content,
                request.mode,
            );
            let message = session.ledger_mut().append(draft);
            (message, session.clone())
        };
        drop(active);
        self.store.save_session(&snapshot).await?;
        self.logger.log(ConversationEvent::in_session(
            "conclusion",
            id,
            json!({
                "speaker": speaker.name(),
                "seq": message.seq(),
                "content": message.content(),
            }),
        ));
        Ok(message)
    }

    // ==================== Internals ====================

    /// Find a live session, loading it from the store on first use.
    async fn entry(&self, id: &SessionId) -> Result<Arc<SessionEntry>, DiscussionError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.get(id) {
            return Ok(Arc::clone(entry));
        }

        let mut session = self.store.load_session(id).await?;
        session.ledger_mut().recompute_estimate();
        session.refresh_budget(&self.catalog);
        debug!("Loaded session {} from store", id);

        let entry = Arc::new(SessionEntry::new(session));
        sessions.insert(id.clone(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Apply a roster or manager edit, refusing while a round runs.
    async fn edit_between_rounds<T>(
        &self,
        id: &SessionId,
        edit: impl FnOnce(&mut Session) -> Result<T, ValidationError>,
    ) -> Result<T, DiscussionError> {
        let entry = self.entry(id).await?;
        let active = entry.active.lock().await;
        if active.as_ref().is_some_and(ActiveRound::is_running) {
            return Err(DiscussionError::ConcurrencyConflict(id.clone()));
        }

        let (value, snapshot) = {
            let mut session = entry.session.lock().await;
            let value = edit(&mut session)?;
            session.refresh_budget(&self.catalog);
            (value, session.clone())
        };
        drop(active);
        self.store.save_session(&snapshot).await?;
        Ok(value)
    }
}

/// Everything a spawned round needs, detached from the service borrow.
struct RoundTask<M: ModelInvoker + 'static> {
    engine: Arc<DiscussionEngine<M>>,
    compressor: Arc<CompressionTrigger>,
    store: Arc<dyn SessionStore>,
    logger: Arc<dyn ConversationLogger>,
    session: SessionHandle,
    session_id: SessionId,
    removed: CancellationToken,
    event_buffer: usize,
    /// Threshold in force when the round started.
    threshold: ThresholdRatio,
}

impl<M: ModelInvoker + 'static> RoundTask<M> {
    async fn run(
        self,
        input: RoundInput,
        mut mux: StreamMultiplexer,
        cancel: CancellationToken,
        done: CancellationToken,
    ) {
        let _done = done.drop_guard();

        self.compress("pre-round", &cancel).await;

        let (events_tx, events_rx) = mpsc::channel(self.event_buffer);
        let round = self
            .engine
            .run_round(Arc::clone(&self.session), input, events_tx, cancel.clone());
        let (report, _) = tokio::join!(round, mux.forward(events_rx));
        debug!("Round report: {:?}", report);

        self.compress("post-round", &cancel).await;

        let (stats, snapshot) = {
            let session = self.session.lock().await;
            (session.ledger().stats(), session.clone())
        };
        if self.removed.is_cancelled() {
            debug!("Session {} was deleted; not saving", self.session_id);
        } else if let Err(e) = self.store.save_session(&snapshot).await {
            warn!("Failed to save session {}: {}", snapshot.id(), e);
        }
        mux.finish(&stats).await;
    }

    /// Run the compression check; failures only log.
    ///
    /// A cancelled round abandons the summarizer call and leaves the ledger
    /// as it is; the next round's pre-round check picks the work up again.
    async fn compress(&self, stage: &str, cancel: &CancellationToken) -> Option<CompactionReport> {
        let plan = {
            let session = self.session.lock().await;
            self.compressor.plan(session.ledger(), self.threshold)?
        };
        debug!("{} compaction through #{}", stage, plan.through);

        let summarized = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("{} compaction abandoned: round cancelled", stage);
                return None;
            }
            result = self.compressor.summarize(&plan) => result,
        };
        let summary = match summarized {
            Ok(summary) => summary,
            Err(e) => {
                warn!("{} compaction skipped: {}", stage, e);
                self.logger.log(ConversationEvent::in_session(
                    "compaction_failed",
                    &self.session_id,
                    json!({ "stage": stage, "error": e.to_string() }),
                ));
                return None;
            }
        };

        let mut session = self.session.lock().await;
        let report = self.compressor.apply(session.ledger_mut(), &plan, summary)?;
        self.logger.log(ConversationEvent::in_session(
            "compaction",
            &self.session_id,
            json!({
                "stage": stage,
                "through": report.through,
                "tokens_before": report.tokens_before,
                "tokens_after": report.tokens_after,
            }),
        ));
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionParams;
    use crate::use_cases::test_support::{
        FixedSummarizer, HangingSummarizer, MemoryStore, ScriptedInvoker, Step, member,
    };
    use chorus_domain::{DiscussionEvent, MessageKind, StreamFrame};
    use std::time::Duration;

    struct Fixture {
        service: DiscussionService<ScriptedInvoker>,
        store: Arc<MemoryStore>,
        summarizer: Arc<FixedSummarizer>,
    }

    fn fixture_with(invoker: ScriptedInvoker, params: DiscussionParams, catalog: ModelCatalog) -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let summarizer = Arc::new(FixedSummarizer::ok("condensed"));
        let compressor = CompressionTrigger::new(summarizer.clone(), CompressionParams::default());
        let service =
            DiscussionService::new(Arc::new(invoker), compressor, store.clone(), catalog, params);
        Fixture {
            service,
            store,
            summarizer,
        }
    }

    fn fixture(invoker: ScriptedInvoker) -> Fixture {
        let params = DiscussionParams::default()
            .with_turn_retries(0)
            .with_turn_timeout(None);
        fixture_with(invoker, params, ModelCatalog::new())
    }

    fn new_session(members: Vec<Member>) -> NewSession {
        NewSession {
            name: "team".to_string(),
            members,
            ..NewSession::default()
        }
    }

    fn messages(frames: &[StreamFrame]) -> Vec<&DiscussionEvent> {
        frames.iter().map(|f| &f.event).filter(|e| e.kind() == "message").collect()
    }

    #[tokio::test]
    async fn test_round_streams_messages_then_stats() {
        let f = fixture(ScriptedInvoker::new());
        let id = f
            .service
            .create_session(new_session(vec![member("a", "Alice"), member("b", "Bob")]))
            .await
            .unwrap();

        let stream = f
            .service
            .start_round(&id, RoundRequest::new("hello").with_max_rounds(2))
            .await
            .unwrap();
        let frames = stream.collect_all().await;

        assert_eq!(messages(&frames).len(), 4);
        let last = frames.last().unwrap();
        assert!(last.event.is_stats());
        assert_eq!(last.index as usize, frames.len() - 1);

        let stats = f.service.get_stats(&id).await.unwrap();
        assert_eq!(stats.message_count, 5);
        assert!(stats.approximate);
        let saved = f.store.stored(&id).unwrap();
        assert_eq!(saved.ledger().len(), 5);
    }

    #[tokio::test]
    async fn test_validation_errors_are_synchronous() {
        let f = fixture(ScriptedInvoker::new());
        let id = f
            .service
            .create_session(new_session(vec![member("a", "Alice")]))
            .await
            .unwrap();

        let err = f
            .service
            .start_round(&id, RoundRequest::new("go").with_mode(DiscussionMode::Task))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DiscussionError::Validation(ValidationError::MissingTask(_))
        ));

        let err = f
            .service
            .start_round(&id, RoundRequest::new("go").with_mode(DiscussionMode::Leader))
            .await
            .unwrap_err();
        assert!(matches!(err, DiscussionError::Validation(ValidationError::MissingManager)));
        assert_eq!(f.service.get_stats(&id).await.unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let f = fixture(ScriptedInvoker::new());
        let err = f.service.get_stats(&SessionId::new("nope")).await.unwrap_err();
        assert!(matches!(err, DiscussionError::SessionNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reject_policy_refuses_overlapping_round() {
        let invoker = ScriptedInvoker::new()
            .script("a", vec![Step::reply("slow").after(Duration::from_secs(10))]);
        let params = DiscussionParams::default()
            .with_turn_retries(0)
            .with_turn_timeout(None)
            .with_active_round_policy(ActiveRoundPolicy::Reject);
        let f = fixture_with(invoker, params, ModelCatalog::new());
        let id = f
            .service
            .create_session(new_session(vec![member("a", "Alice")]))
            .await
            .unwrap();

        let first = f.service.start_round(&id, RoundRequest::new("one")).await.unwrap();
        let err = f
            .service
            .start_round(&id, RoundRequest::new("two"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let frames = first.collect_all().await;
        assert_eq!(messages(&frames).len(), 1);
        // Nothing from the rejected round reached the ledger.
        let log = f.service.messages(&id, 10).await.unwrap();
        let contents: Vec<&str> = log.iter().map(Message::content).collect();
        assert_eq!(contents, vec!["one", "slow"]);

        // Once the first round is done a new one is accepted.
        assert!(f.service.start_round(&id, RoundRequest::new("two")).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_preempt_policy_interrupts_previous_round() {
        let invoker = ScriptedInvoker::new().script(
            "a",
            vec![Step::reply("slow").after(Duration::from_secs(60)), Step::reply("second")],
        );
        let f = fixture(invoker);
        let id = f
            .service
            .create_session(new_session(vec![member("a", "Alice")]))
            .await
            .unwrap();

        let first = f.service.start_round(&id, RoundRequest::new("one")).await.unwrap();
        tokio::task::yield_now().await;
        let second = f.service.start_round(&id, RoundRequest::new("two")).await.unwrap();

        let first_frames = first.collect_all().await;
        let second_frames = second.collect_all().await;

        assert!(first_frames.last().unwrap().event.is_stats());
        assert!(second_frames.last().unwrap().event.is_stats());
        let log = f.service.messages(&id, 10).await.unwrap();
        let kinds: Vec<(MessageKind, &str)> = log.iter().map(|m| (m.kind(), m.content())).collect();
        assert_eq!(
            kinds,
            vec![
                (MessageKind::Turn, "one"),
                (MessageKind::Notice, PromptTemplate::interrupted_notice()),
                (MessageKind::Turn, "two"),
                (MessageKind::Turn, "second"),
            ]
        );
    }

    /// A round whose consumer stopped reading: the engine blocks on a full
    /// event channel and cannot wind down until the stream is drained.
    async fn stalled_round(f: &Fixture) -> (SessionId, EventStream) {
        let id = f
            .service
            .create_session(new_session(vec![
                member("a", "Alice"),
                member("b", "Bob"),
                member("c", "Carol"),
                member("d", "Dave"),
            ]))
            .await
            .unwrap();
        let stream = f.service.start_round(&id, RoundRequest::new("one")).await.unwrap();
        // Let the round run until both channels are full.
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(f.service.is_round_active(&id).await.unwrap());
        (id, stream)
    }

    fn stalling_params() -> DiscussionParams {
        DiscussionParams::default()
            .with_turn_retries(0)
            .with_turn_timeout(None)
            .with_event_buffer(1)
            .with_settle_timeout(Duration::from_millis(50))
    }

    #[tokio::test(start_paused = true)]
    async fn test_preempt_that_cannot_settle_is_a_conflict() {
        let f = fixture_with(ScriptedInvoker::new(), stalling_params(), ModelCatalog::new());
        let (id, first) = stalled_round(&f).await;

        let err = f
            .service
            .start_round(&id, RoundRequest::new("two"))
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        let log = f.service.messages(&id, 20).await.unwrap();
        assert!(log.iter().all(|m| m.content() != "two"));

        // Draining the stalled stream lets the first round finish normally.
        let frames = first.collect_all().await;
        assert!(frames.last().unwrap().event.is_stats());
        assert!(!f.service.is_round_active(&id).await.unwrap());
        let log = f.service.messages(&id, 20).await.unwrap();
        assert!(log.iter().all(|m| m.content() != "two"));
        assert!(f.service.start_round(&id, RoundRequest::new("two")).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_round_interrupts() {
        let invoker = ScriptedInvoker::new()
            .script("a", vec![Step::reply("slow").after(Duration::from_secs(60))]);
        let f = fixture(invoker);
        let id = f
            .service
            .create_session(new_session(vec![member("a", "Alice")]))
            .await
            .unwrap();

        let stream = f.service.start_round(&id, RoundRequest::new("one")).await.unwrap();
        tokio::task::yield_now().await;
        assert!(f.service.stop_round(&id).await.unwrap());

        let frames = stream.collect_all().await;
        let notice = messages(&frames);
        assert_eq!(notice.len(), 1);
        assert_eq!(notice[0].sender(), Some("system"));
        assert!(!f.service.stop_round(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_threshold_validates_and_is_not_retroactive() {
        let f = fixture(ScriptedInvoker::new());
        let id = f
            .service
            .create_session(new_session(vec![member("a", "Alice")]))
            .await
            .unwrap();
        f.service
            .start_round(&id, RoundRequest::new("hello"))
            .await
            .unwrap()
            .collect_all()
            .await;
        let before = f.service.get_stats(&id).await.unwrap();

        let err = f.service.set_threshold(&id, 1.5).await.unwrap_err();
        assert!(matches!(
            err,
            DiscussionError::Validation(ValidationError::InvalidThreshold(_))
        ));

        f.service.set_threshold(&id, 0.5).await.unwrap();
        let after = f.service.get_stats(&id).await.unwrap();
        assert_eq!(after.current_tokens, before.current_tokens);
        assert_eq!(after.compressed_through, before.compressed_through);
        assert_eq!(after.threshold_ratio, 0.5);
        assert_eq!(f.store.stored(&id).unwrap().threshold().value(), 0.5);
    }

    #[tokio::test]
    async fn test_round_compacts_when_over_budget() {
        let catalog = ModelCatalog::new().with_window("test-model", 60);
        let params = DiscussionParams::default()
            .with_turn_retries(0)
            .with_turn_timeout(None);
        let f = fixture_with(ScriptedInvoker::new(), params, catalog);
        let id = f
            .service
            .create_session(new_session(vec![member("a", "Alice"), member("b", "Bob")]))
            .await
            .unwrap();

        let frames = f
            .service
            .start_round(
                &id,
                RoundRequest::new("a fairly long opening message that eats into the tiny budget"),
            )
            .await
            .unwrap()
            .collect_all()
            .await;

        assert_eq!(f.summarizer.calls(), 1);
        let stats = f.service.get_stats(&id).await.unwrap();
        assert_eq!(stats.max_tokens, 60);
        assert_eq!(stats.compressed_through, Some(3));
        let DiscussionEvent::Stats { current_tokens, .. } = &frames.last().unwrap().event else {
            panic!("expected stats frame");
        };
        assert_eq!(*current_tokens, stats.current_tokens);
    }

    #[tokio::test]
    async fn test_summarizer_failure_leaves_round_intact() {
        let store = Arc::new(MemoryStore::default());
        let summarizer = Arc::new(FixedSummarizer::failing());
        let service = DiscussionService::new(
            Arc::new(ScriptedInvoker::new()),
            CompressionTrigger::new(summarizer.clone(), CompressionParams::default()),
            store,
            ModelCatalog::new().with_window("test-model", 20),
            DiscussionParams::default().with_turn_retries(0),
        );
        let id = service
            .create_session(new_session(vec![member("a", "Alice")]))
            .await
            .unwrap();

        let frames = service
            .start_round(&id, RoundRequest::new("something long enough to overflow"))
            .await
            .unwrap()
            .collect_all()
            .await;

        assert!(summarizer.calls() >= 1);
        assert_eq!(messages(&frames).len(), 1);
        assert!(frames.last().unwrap().event.is_stats());
        let stats = service.get_stats(&id).await.unwrap();
        assert_eq!(stats.compressed_through, None);
        assert_eq!(stats.message_count, 2);
    }

    #[tokio::test]
    async fn test_member_edits_refresh_budget() {
        let catalog = ModelCatalog::new().with_window("tiny", 4_000);
        let f = fixture_with(ScriptedInvoker::new(), DiscussionParams::default(), catalog);
        let id = f
            .service
            .create_session(new_session(vec![member("a", "Alice")]))
            .await
            .unwrap();
        let saves = f.store.saves();

        f.service
            .add_member(&id, Member::new("t", "Tiny", chorus_domain::Model::new("tiny")))
            .await
            .unwrap();
        assert_eq!(f.service.get_stats(&id).await.unwrap().max_tokens, 4_000);

        let err = f.service.add_member(&id, member("a", "Again")).await.unwrap_err();
        assert!(matches!(
            err,
            DiscussionError::Validation(ValidationError::DuplicateMember(_))
        ));

        f.service.remove_member(&id, &MemberId::new("t")).await.unwrap();
        assert_eq!(
            f.service.get_stats(&id).await.unwrap().max_tokens,
            chorus_domain::DEFAULT_CONTEXT_WINDOW
        );
        assert_eq!(f.store.saves(), saves + 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_member_edits_rejected_during_round() {
        let invoker = ScriptedInvoker::new()
            .script("a", vec![Step::reply("slow").after(Duration::from_secs(10))]);
        let f = fixture(invoker);
        let id = f
            .service
            .create_session(new_session(vec![member("a", "Alice")]))
            .await
            .unwrap();

        let stream = f.service.start_round(&id, RoundRequest::new("go")).await.unwrap();
        let err = f
            .service
            .set_member_task(&id, &MemberId::new("a"), Some("x".into()))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        stream.collect_all().await;
        f.service
            .set_member_task(&id, &MemberId::new("a"), Some("x".into()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_summarize_appends_conclusion_from_manager() {
        let invoker = ScriptedInvoker::new().script("m", vec![Step::reply("We chose option B.")]);
        let f = fixture(invoker);
        let mut request = new_session(vec![member("a", "Alice")]);
        request.manager = Some(member("m", "Mod"));
        let id = f.service.create_session(request).await.unwrap();

        let message = f.service.summarize(&id, Some("one line")).await.unwrap();

        assert_eq!(message.sender(), "Mod");
        assert_eq!(message.content(), "We chose option B.");
        assert_eq!(f.service.messages(&id, 1).await.unwrap()[0].seq(), message.seq());
    }

    #[tokio::test]
    async fn test_sessions_reload_from_store() {
        let store = Arc::new(MemoryStore::default());
        let make = |store: Arc<MemoryStore>| {
            DiscussionService::new(
                Arc::new(ScriptedInvoker::new()),
                CompressionTrigger::new(Arc::new(FixedSummarizer::ok("s")), CompressionParams::default()),
                store,
                ModelCatalog::new(),
                DiscussionParams::default(),
            )
        };
        let first = make(store.clone());
        let id = first
            .create_session(new_session(vec![member("a", "Alice")]))
            .await
            .unwrap();
        first
            .start_round(&id, RoundRequest::new("hello"))
            .await
            .unwrap()
            .collect_all()
            .await;
        let tokens = first.get_stats(&id).await.unwrap().current_tokens;

        let second = make(store);
        let stats = second.get_stats(&id).await.unwrap();

        assert_eq!(stats.message_count, 2);
        assert_eq!(stats.current_tokens, tokens);
    }

    #[tokio::test]
    async fn test_create_session_with_chosen_id() {
        let f = fixture(ScriptedInvoker::new());
        let mut request = new_session(vec![member("a", "Alice")]);
        request.id = Some(SessionId::new("team"));
        request.threshold = Some(0.5);

        let id = f.service.create_session(request).await.unwrap();

        assert_eq!(id.as_str(), "team");
        assert_eq!(f.service.get_stats(&id).await.unwrap().threshold_ratio, 0.5);
        assert_eq!(f.service.list_sessions().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_create_session_rejects_bad_threshold() {
        let f = fixture(ScriptedInvoker::new());
        let mut request = new_session(vec![member("a", "Alice")]);
        request.threshold = Some(0.0);

        let err = f.service.create_session(request).await.unwrap_err();

        assert!(matches!(
            err,
            DiscussionError::Validation(ValidationError::InvalidThreshold(_))
        ));
        assert_eq!(f.store.saves(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_session_waits_for_running_round() {
        let invoker = ScriptedInvoker::new()
            .script("a", vec![Step::reply("slow").after(Duration::from_secs(60))]);
        let f = fixture(invoker);
        let id = f
            .service
            .create_session(new_session(vec![member("a", "Alice")]))
            .await
            .unwrap();
        let stream = f.service.start_round(&id, RoundRequest::new("one")).await.unwrap();
        tokio::task::yield_now().await;
        let saves = f.store.saves();

        f.service.delete_session(&id).await.unwrap();

        let frames = stream.collect_all().await;
        assert!(frames.last().unwrap().event.is_stats());
        assert!(f.store.stored(&id).is_none());
        assert_eq!(f.store.saves(), saves);
        assert!(f.service.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleted_session_stays_deleted_when_round_outlives_delete() {
        let f = fixture_with(ScriptedInvoker::new(), stalling_params(), ModelCatalog::new());
        let (id, stream) = stalled_round(&f).await;

        f.service.delete_session(&id).await.unwrap();
        assert!(f.store.stored(&id).is_none());

        // The round only finishes now, after the store entry is gone.
        let frames = stream.collect_all().await;
        assert!(frames.last().unwrap().event.is_stats());
        assert!(f.store.stored(&id).is_none());
        assert!(matches!(
            f.service.get_stats(&id).await.unwrap_err(),
            DiscussionError::SessionNotFound(_)
        ));
    }

    fn hanging_service(params: CompressionParams) -> (DiscussionService<ScriptedInvoker>, Arc<HangingSummarizer>) {
        let summarizer = Arc::new(HangingSummarizer::default());
        let service = DiscussionService::new(
            Arc::new(ScriptedInvoker::new()),
            CompressionTrigger::new(summarizer.clone(), params),
            Arc::new(MemoryStore::default()),
            ModelCatalog::new().with_window("test-model", 20),
            DiscussionParams::default()
                .with_turn_retries(0)
                .with_turn_timeout(None),
        );
        (service, summarizer)
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_summarizer_times_out_and_round_completes() {
        let params = CompressionParams::default().with_summarize_timeout(Some(Duration::from_secs(5)));
        let (service, summarizer) = hanging_service(params);
        let id = service
            .create_session(new_session(vec![member("a", "Alice")]))
            .await
            .unwrap();

        let frames = service
            .start_round(&id, RoundRequest::new("something long enough to overflow"))
            .await
            .unwrap()
            .collect_all()
            .await;

        assert!(summarizer.calls() >= 1);
        assert!(frames.last().unwrap().event.is_stats());
        assert!(!service.is_round_active(&id).await.unwrap());
        let stats = service.get_stats(&id).await.unwrap();
        assert_eq!(stats.compressed_through, None);
        assert_eq!(stats.message_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_round_abandons_pending_compaction() {
        let params = CompressionParams::default().with_summarize_timeout(None);
        let (service, summarizer) = hanging_service(params);
        let id = service
            .create_session(new_session(vec![member("a", "Alice")]))
            .await
            .unwrap();
        let stream = service
            .start_round(&id, RoundRequest::new("something long enough to overflow"))
            .await
            .unwrap();
        for _ in 0..100 {
            if summarizer.calls() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(summarizer.calls(), 1);

        assert!(service.stop_round(&id).await.unwrap());

        let frames = stream.collect_all().await;
        assert!(frames.last().unwrap().event.is_stats());
        assert!(!service.is_round_active(&id).await.unwrap());
        assert_eq!(service.get_stats(&id).await.unwrap().compressed_through, None);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let f = fixture(ScriptedInvoker::new());
        let id = f
            .service
            .create_session(new_session(vec![member("a", "Alice")]))
            .await
            .unwrap();

        f.service.delete_session(&id).await.unwrap();

        assert!(f.store.stored(&id).is_none());
        assert!(matches!(
            f.service.get_stats(&id).await.unwrap_err(),
            DiscussionError::SessionNotFound(_)
        ));
    }
}
