//! Drive one round to the console.

use crate::output::formatter::formatter_for;
use crate::progress::reporter::RoundProgress;
use chorus_application::{DiscussionError, DiscussionService, ModelInvoker, RoundRequest};
use chorus_domain::{DiscussionEvent, OutputFormat, SessionId, StreamFrame};
use std::pin::pin;
use tracing::{debug, warn};

/// What a finished round looked like from the consumer side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundOutcome {
    pub frames: u64,
    pub replies: u64,
    pub failures: u64,
    /// `(current_tokens, max_tokens)` from the closing stats frame
    pub usage: Option<(usize, usize)>,
    /// Ctrl-C was pressed while the round ran
    pub interrupted: bool,
}

impl RoundOutcome {
    fn record(&mut self, frame: &StreamFrame) {
        self.frames += 1;
        match &frame.event {
            DiscussionEvent::Message { .. } => self.replies += 1,
            DiscussionEvent::Error { .. } => self.failures += 1,
            DiscussionEvent::Stats {
                current_tokens,
                max_tokens,
                ..
            } => self.usage = Some((*current_tokens, *max_tokens)),
        }
    }
}

/// Start a round, print every frame as it arrives and return once the
/// closing stats frame has been printed.
///
/// Ctrl-C stops the round; the stream still drains so the interruption
/// notice and final stats are shown.
pub async fn present_round<M: ModelInvoker + 'static>(
    service: &DiscussionService<M>,
    session: &SessionId,
    request: RoundRequest,
    format: OutputFormat,
    show_progress: bool,
) -> Result<RoundOutcome, DiscussionError> {
    let mode_label = request.mode.map(|m| m.to_string());
    let mut stream = service.start_round(session, request).await?;

    let formatter = formatter_for(format);
    let label = mode_label.unwrap_or_else(|| "round".to_string());
    let mut progress = RoundProgress::new(show_progress && format == OutputFormat::Text, &label);
    let mut outcome = RoundOutcome::default();
    let mut ctrl_c = pin!(tokio::signal::ctrl_c());
    let mut listening = true;

    loop {
        tokio::select! {
            frame = stream.next_frame() => {
                let Some(frame) = frame else { break };
                progress.on_frame(&frame);
                outcome.record(&frame);
                if let Some(text) = formatter.format_frame(&frame) {
                    progress.println(&text);
                }
            }
            signal = &mut ctrl_c, if listening => {
                listening = false;
                match signal {
                    Ok(()) => {
                        debug!("Ctrl-C received, stopping round");
                        outcome.interrupted = true;
                        progress.set_message("stopping...");
                        if let Err(e) = service.stop_round(session).await {
                            warn!("Could not stop round: {}", e);
                        }
                    }
                    Err(e) => warn!("Ctrl-C handler unavailable: {}", e),
                }
            }
        }
    }

    progress.finish();
    Ok(outcome)
}
