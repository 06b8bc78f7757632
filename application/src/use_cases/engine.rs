//! Discussion engine
//!
//! Runs one round of a discussion protocol against a session. The engine
//! is the single writer of the session ledger for the duration of a round:
//! concurrent turns execute in a [`JoinSet`], but their results are
//! appended one at a time by the engine loop, so positions are allocated
//! in completion order without gaps.
//!
//! Every appended member turn is emitted as a [`DiscussionEvent::Message`]
//! on the event channel; failed turns are emitted as
//! [`DiscussionEvent::Error`] and append nothing.

use crate::config::DiscussionParams;
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger};
use crate::ports::model_invoker::{Completion, ModelInvoker, ProviderError, TurnRequest};
use crate::use_cases::shared::invoke_with_retry;
use chorus_domain::{
    DiscussionEvent, DiscussionMode, Member, Message, NewMessage, PromptTemplate, Session,
    SessionId,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shared, lockable session state.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Parameters of one round, already validated against the session.
#[derive(Debug, Clone)]
pub struct RoundInput {
    pub content: String,
    pub max_rounds: usize,
    pub mode: DiscussionMode,
    pub user_name: String,
}

/// Summary of how a round went.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub turns_completed: usize,
    pub turns_failed: usize,
    /// The round was cancelled before every scheduled turn finished.
    pub interrupted: bool,
    /// A member signalled consensus and the remaining turns were skipped.
    pub early_stop: bool,
}

/// A member scheduled for one turn.
#[derive(Clone)]
struct Turn {
    member: Member,
    slot: Option<usize>,
    request: TurnRequest,
}

enum TurnOutcome {
    Done { consensus: bool },
    Failed,
    Cancelled,
}

pub struct DiscussionEngine<M: ModelInvoker + 'static> {
    invoker: Arc<M>,
    params: DiscussionParams,
    logger: Arc<dyn ConversationLogger>,
}

impl<M: ModelInvoker + 'static> DiscussionEngine<M> {
    pub fn new(invoker: Arc<M>, params: DiscussionParams) -> Self {
        Self {
            invoker,
            params,
            logger: Arc::new(NoConversationLogger),
        }
    }

    /// Set a conversation logger for structured transcript recording
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn invoker(&self) -> &Arc<M> {
        &self.invoker
    }

    pub fn params(&self) -> &DiscussionParams {
        &self.params
    }

    /// Run one round. Events are sent to `events` as they happen; the
    /// returned report is available once the round has settled.
    ///
    /// Cancelling `cancel` skips turns that have not started, abandons
    /// in-flight calls and appends an interruption notice.
    pub async fn run_round(
        &self,
        session: SessionHandle,
        input: RoundInput,
        events: mpsc::Sender<DiscussionEvent>,
        cancel: CancellationToken,
    ) -> RoundReport {
        let (roster_len, session_id) = {
            let mut guard = session.lock().await;
            guard.ledger_mut().append(NewMessage::user(
                input.user_name.clone(),
                input.content.clone(),
                input.mode,
            ));
            (guard.roster().len(), guard.id().clone())
        };

        info!(
            "Round started in session {} ({} mode, {} members)",
            session_id, input.mode, roster_len
        );
        self.logger.log(ConversationEvent::in_session(
            "round_started",
            &session_id,
            json!({
                "mode": input.mode.as_str(),
                "max_rounds": input.max_rounds,
                "content": input.content,
            }),
        ));

        let mut report = RoundReport::default();
        let mut round = RoundContext {
            session: &session,
            session_id: &session_id,
            events: &events,
            cancel: &cancel,
            report: &mut report,
            mode: input.mode,
        };

        match input.mode {
            DiscussionMode::Free => self.run_free(&mut round, &input).await,
            DiscussionMode::Leader => self.run_leader(&mut round, &input).await,
            DiscussionMode::Task => self.run_task(&mut round, &input).await,
            DiscussionMode::Qa => self.run_qa(&mut round, &input).await,
        }

        if cancel.is_cancelled() {
            report.interrupted = true;
            let notice = NewMessage::notice(PromptTemplate::interrupted_notice(), Some(input.mode));
            self.append_and_emit(&session, &events, &cancel, notice, None).await;
        }

        info!(
            "Round finished in session {}: {} completed, {} failed{}",
            session_id,
            report.turns_completed,
            report.turns_failed,
            if report.interrupted { ", interrupted" } else { "" }
        );
        self.logger.log(ConversationEvent::in_session(
            "round_finished",
            &session_id,
            json!({
                "turns_completed": report.turns_completed,
                "turns_failed": report.turns_failed,
                "interrupted": report.interrupted,
                "early_stop": report.early_stop,
            }),
        ));

        report
    }

    // ==================== Mode handlers ====================

    /// Sequential round-robin: every turn sees everything before it.
    async fn run_free(&self, round: &mut RoundContext<'_>, input: &RoundInput) {
        let members: Vec<Member> = round.session.lock().await.roster().members().to_vec();
        let prompts = system_prompts(&members, DiscussionMode::Free, None);

        'passes: for pass in 1..=input.max_rounds {
            debug!("Free discussion pass {}/{}", pass, input.max_rounds);
            for (slot, member) in members.iter().enumerate() {
                if round.cancel.is_cancelled() {
                    break 'passes;
                }
                let history = round.session.lock().await.ledger().snapshot();
                let turn = Turn {
                    member: member.clone(),
                    slot: Some(slot),
                    request: TurnRequest {
                        system_prompt: prompts[slot].clone(),
                        history,
                        instruction: PromptTemplate::free_turn(pass, input.max_rounds),
                        mode: DiscussionMode::Free,
                    },
                };
                match self.run_sequential_turn(round, turn).await {
                    TurnOutcome::Cancelled => break 'passes,
                    TurnOutcome::Done { consensus: true } => {
                        round.report.early_stop = true;
                        let notice = NewMessage::notice(
                            PromptTemplate::consensus_notice(member.name()),
                            Some(DiscussionMode::Free),
                        );
                        self.append_and_emit(round.session, round.events, round.cancel, notice, None)
                            .await;
                        break 'passes;
                    }
                    TurnOutcome::Done { consensus: false } | TurnOutcome::Failed => {}
                }
            }
        }
    }

    /// Manager prelude, then every other member concurrently.
    async fn run_leader(&self, round: &mut RoundContext<'_>, input: &RoundInput) {
        let (manager, others, roster_names, manager_slot) = {
            let guard = round.session.lock().await;
            let Some(manager) = guard.manager().cloned() else {
                warn!("Leader round without a manager; nothing to run");
                return;
            };
            let others = guard.non_manager_members();
            let names: Vec<String> = guard.roster().iter().map(|m| m.name().to_string()).collect();
            let slot = guard.roster().slot_of(manager.id());
            (manager, others, names, slot)
        };

        let names: Vec<&str> = roster_names
            .iter()
            .map(String::as_str)
            .filter(|n| *n != manager.name())
            .collect();
        let history = round.session.lock().await.ledger().snapshot();
        let prelude = Turn {
            request: TurnRequest {
                system_prompt: PromptTemplate::manager_system(&manager, &names),
                history,
                instruction: input.content.clone(),
                mode: DiscussionMode::Leader,
            },
            member: manager.clone(),
            slot: manager_slot,
        };
        // A failed prelude is reported but the others still answer.
        if let TurnOutcome::Cancelled = self.run_sequential_turn(round, prelude).await {
            return;
        }

        let (history, slots) = {
            let guard = round.session.lock().await;
            let slots: Vec<Option<usize>> =
                others.iter().map(|m| guard.roster().slot_of(m.id())).collect();
            (guard.ledger().snapshot(), slots)
        };
        let prompts = system_prompts(&others, DiscussionMode::Leader, Some(manager.name()));
        let turns = others
            .into_iter()
            .zip(slots)
            .zip(prompts)
            .map(|((member, slot), system_prompt)| Turn {
                member,
                slot,
                request: TurnRequest {
                    system_prompt,
                    history: history.clone(),
                    instruction: PromptTemplate::leader_followup(manager.name()),
                    mode: DiscussionMode::Leader,
                },
            })
            .collect();
        self.run_concurrent(round, turns).await;
    }

    /// Each member works its own task concurrently.
    async fn run_task(&self, round: &mut RoundContext<'_>, input: &RoundInput) {
        let (members, history) = {
            let guard = round.session.lock().await;
            (guard.roster().members().to_vec(), guard.ledger().snapshot())
        };
        let prompts = system_prompts(&members, DiscussionMode::Task, None);
        let turns = members
            .into_iter()
            .zip(prompts)
            .enumerate()
            .map(|(slot, (member, system_prompt))| {
                let instruction =
                    PromptTemplate::task_turn(member.task().unwrap_or_default(), &input.content);
                Turn {
                    member,
                    slot: Some(slot),
                    request: TurnRequest {
                        system_prompt,
                        history: history.clone(),
                        instruction,
                        mode: DiscussionMode::Task,
                    },
                }
            })
            .collect();
        self.run_concurrent(round, turns).await;
    }

    /// Identical prompt, fully concurrent, emitted in completion order.
    async fn run_qa(&self, round: &mut RoundContext<'_>, input: &RoundInput) {
        let (members, history) = {
            let guard = round.session.lock().await;
            (guard.roster().members().to_vec(), guard.ledger().snapshot())
        };
        let prompts = system_prompts(&members, DiscussionMode::Qa, None);
        let turns = members
            .into_iter()
            .zip(prompts)
            .enumerate()
            .map(|(slot, (member, system_prompt))| Turn {
                member,
                slot: Some(slot),
                request: TurnRequest {
                    system_prompt,
                    history: history.clone(),
                    instruction: PromptTemplate::qa_turn(&input.content),
                    mode: DiscussionMode::Qa,
                },
            })
            .collect();
        self.run_concurrent(round, turns).await;
    }

    // ==================== Turn execution ====================

    /// Run one turn in the foreground, racing it against cancellation.
    async fn run_sequential_turn(&self, round: &mut RoundContext<'_>, turn: Turn) -> TurnOutcome {
        let result = tokio::select! {
            biased;
            _ = round.cancel.cancelled() => {
                debug!("Turn of {} abandoned by cancellation", turn.member.name());
                return TurnOutcome::Cancelled;
            }
            result = invoke_with_retry(self.invoker.as_ref(), &turn.request, &turn.member, &self.params) => result,
        };
        self.record_turn(round, &turn.member, turn.slot, result).await
    }

    /// Fan turns out concurrently; results are appended in completion order.
    async fn run_concurrent(&self, round: &mut RoundContext<'_>, turns: Vec<Turn>) {
        if round.cancel.is_cancelled() {
            return;
        }

        let mut join_set = JoinSet::new();
        for turn in turns {
            let invoker = Arc::clone(&self.invoker);
            let params = self.params.clone();
            join_set.spawn(async move {
                let result =
                    invoke_with_retry(invoker.as_ref(), &turn.request, &turn.member, &params).await;
                (turn.member, turn.slot, result)
            });
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = round.cancel.cancelled() => {
                    debug!("Abandoning {} in-flight turn(s)", join_set.len());
                    join_set.abort_all();
                    return;
                }
                joined = join_set.join_next() => joined,
            };

            match joined {
                Some(Ok((member, slot, result))) => {
                    if let TurnOutcome::Cancelled = self.record_turn(round, &member, slot, result).await {
                        join_set.abort_all();
                        return;
                    }
                }
                Some(Err(e)) => {
                    warn!("Task join error: {}", e);
                    round.report.turns_failed += 1;
                }
                None => return,
            }
        }
    }

    /// Append a finished turn (or report its failure) and emit the event.
    async fn record_turn(
        &self,
        round: &mut RoundContext<'_>,
        member: &Member,
        slot: Option<usize>,
        result: Result<Completion, ProviderError>,
    ) -> TurnOutcome {
        // A result that lands after cancellation is discarded.
        if round.cancel.is_cancelled() {
            return TurnOutcome::Cancelled;
        }

        match result {
            Ok(completion) => {
                let (content, marker) = PromptTemplate::strip_consensus(&completion.content);
                let consensus = completion.consensus || marker;
                let draft = NewMessage::assistant(member.name(), member.id().clone(), content, round.mode);
                let message = self
                    .append_and_emit(round.session, round.events, round.cancel, draft, slot)
                    .await;
                round.report.turns_completed += 1;
                info!("{} responded (#{})", member.name(), message.seq());
                self.logger.log(ConversationEvent::in_session(
                    "turn_completed",
                    round.session_id,
                    json!({
                        "member": member.name(),
                        "model": member.model().as_str(),
                        "seq": message.seq(),
                        "mode": round.mode.as_str(),
                        "content": message.content(),
                        "consensus": consensus,
                        "usage": completion.usage.map(|u| json!({
                            "prompt_tokens": u.prompt_tokens,
                            "completion_tokens": u.completion_tokens,
                        })),
                    }),
                ));
                TurnOutcome::Done { consensus }
            }
            Err(e) => {
                warn!("{} failed: {}", member.name(), e);
                round.report.turns_failed += 1;
                self.logger.log(ConversationEvent::in_session(
                    "turn_failed",
                    round.session_id,
                    json!({
                        "member": member.name(),
                        "model": member.model().as_str(),
                        "error": e.message,
                        "retryable": e.retryable,
                    }),
                ));
                emit(
                    round.events,
                    round.cancel,
                    DiscussionEvent::Error {
                        sender: member.name().to_string(),
                        message: e.message,
                        retryable: e.retryable,
                    },
                )
                .await;
                TurnOutcome::Failed
            }
        }
    }

    /// Append `draft` under the session lock, then emit it with the lock released.
    async fn append_and_emit(
        &self,
        session: &SessionHandle,
        events: &mpsc::Sender<DiscussionEvent>,
        cancel: &CancellationToken,
        draft: NewMessage,
        slot: Option<usize>,
    ) -> Message {
        let message = session.lock().await.ledger_mut().append(draft);
        let event = DiscussionEvent::Message {
            sender: message.sender().to_string(),
            sender_id: message.sender_id().cloned(),
            content: message.content().to_string(),
            mode: message.mode().unwrap_or_default(),
            seq: message.seq(),
            slot,
        };
        emit(events, cancel, event).await;
        message
    }
}

/// Borrowed state shared by the mode handlers of one round.
struct RoundContext<'a> {
    session: &'a SessionHandle,
    session_id: &'a SessionId,
    events: &'a mpsc::Sender<DiscussionEvent>,
    cancel: &'a CancellationToken,
    report: &'a mut RoundReport,
    mode: DiscussionMode,
}

/// Send an event; a closed channel means nobody is listening, so the
/// round is cancelled.
async fn emit(
    events: &mpsc::Sender<DiscussionEvent>,
    cancel: &CancellationToken,
    event: DiscussionEvent,
) {
    if events.send(event).await.is_err() && !cancel.is_cancelled() {
        debug!("Event consumer went away; cancelling round");
        cancel.cancel();
    }
}

/// System prompt per member, each listing the other members by name.
fn system_prompts(members: &[Member], mode: DiscussionMode, manager: Option<&str>) -> Vec<String> {
    members
        .iter()
        .map(|member| {
            let others: Vec<&str> = members
                .iter()
                .filter(|m| m.id() != member.id())
                .map(Member::name)
                .collect();
            PromptTemplate::member_system(member, &others, mode, manager)
        })
        .collect()
}
