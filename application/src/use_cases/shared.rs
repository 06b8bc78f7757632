//! Shared helpers used across use cases.

use crate::config::DiscussionParams;
use crate::ports::model_invoker::{Completion, ModelInvoker, ProviderError, TurnRequest};
use chorus_domain::Member;
use tracing::{debug, warn};

/// Invoke a member once, bounded by the configured turn timeout.
async fn invoke_once<M: ModelInvoker + ?Sized>(
    invoker: &M,
    request: &TurnRequest,
    member: &Member,
    params: &DiscussionParams,
) -> Result<Completion, ProviderError> {
    match params.turn_timeout {
        Some(limit) => tokio::time::timeout(limit, invoker.invoke(request, member))
            .await
            .unwrap_or_else(|_| Err(ProviderError::timeout(limit))),
        None => invoker.invoke(request, member).await,
    }
}

/// Invoke a member, retrying retryable failures up to `turn_retries` times.
///
/// Cancellation is the caller's job: dropping the returned future abandons
/// the call and any pending retry.
pub(crate) async fn invoke_with_retry<M: ModelInvoker + ?Sized>(
    invoker: &M,
    request: &TurnRequest,
    member: &Member,
    params: &DiscussionParams,
) -> Result<Completion, ProviderError> {
    let mut attempt = 0;
    loop {
        match invoke_once(invoker, request, member, params).await {
            Ok(completion) => return Ok(completion),
            Err(e) if e.retryable && attempt < params.turn_retries => {
                attempt += 1;
                warn!(
                    "{} failed ({}), retry {}/{}",
                    member.name(),
                    e,
                    attempt,
                    params.turn_retries
                );
                tokio::time::sleep(params.retry_delay).await;
            }
            Err(e) => {
                debug!("{} failed after {} attempt(s): {}", member.name(), attempt + 1, e);
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{ScriptedInvoker, Step, request};
    use chorus_domain::Model;
    use std::time::Duration;

    fn params() -> DiscussionParams {
        DiscussionParams::default()
            .with_turn_retries(2)
            .with_retry_delay(Duration::from_millis(10))
            .with_turn_timeout(Some(Duration::from_secs(5)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_retryable_errors() {
        let alice = Member::new("a", "Alice", Model::default());
        let invoker = ScriptedInvoker::new().script(
            "a",
            vec![
                Step::fail(ProviderError::retryable("rate limited")),
                Step::reply("finally"),
            ],
        );

        let result = invoke_with_retry(&invoker, &request(), &alice, &params()).await;

        assert_eq!(result.unwrap().content, "finally");
        assert_eq!(invoker.calls_for("a"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_is_not_retried() {
        let alice = Member::new("a", "Alice", Model::default());
        let invoker = ScriptedInvoker::new().script(
            "a",
            vec![Step::fail(ProviderError::terminal("bad key")), Step::reply("never")],
        );

        let result = invoke_with_retry(&invoker, &request(), &alice, &params()).await;

        assert_eq!(result.unwrap_err(), ProviderError::terminal("bad key"));
        assert_eq!(invoker.calls_for("a"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_retryable() {
        let alice = Member::new("a", "Alice", Model::default());
        let invoker = ScriptedInvoker::new().script(
            "a",
            vec![
                Step::reply("slow").after(Duration::from_secs(60)),
                Step::reply("fast"),
            ],
        );

        let result = invoke_with_retry(&invoker, &request(), &alice, &params()).await;

        assert_eq!(result.unwrap().content, "fast");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_retries() {
        let alice = Member::new("a", "Alice", Model::default());
        let invoker = ScriptedInvoker::new().script(
            "a",
            vec![
                Step::fail(ProviderError::retryable("busy")),
                Step::fail(ProviderError::retryable("busy")),
                Step::fail(ProviderError::retryable("busy")),
                Step::reply("too late"),
            ],
        );

        let result = invoke_with_retry(&invoker, &request(), &alice, &params()).await;

        assert!(result.unwrap_err().retryable);
        assert_eq!(invoker.calls_for("a"), 3);
    }
}
