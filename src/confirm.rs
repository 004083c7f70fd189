//! Timed yes/no gate in front of creating and destructive operations.
//!
//! A pending confirmation is a single-fire [`oneshot`] channel registered
//! under the (user, channel) pair that asked for it. Inputs are routed with
//! [`ConfirmationFlow::signal`]; only an explicit yes or no from that same
//! user in that same channel fires it. Everything else is ignored, so chatter
//! neither confirms nor extends the deadline.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::instrument;

use crate::context::UserId;

/// How long a prompt waits for an answer
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);

const AFFIRMATIVE: &[&str] = &["yes", "y", "confirm", "✅", "👍"];
const NEGATIVE: &[&str] = &["no", "n", "cancel", "❌", "👎"];

// -----------------------------------------------------------------------------
// Types

/// Who is being asked, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromptKey {
    pub user_id: UserId,
    pub channel_id: u64,
}

/// An input that may answer a pending prompt: a text reply or a reaction.
#[derive(Debug, Clone)]
pub struct Signal {
    pub user_id: UserId,
    pub channel_id: u64,
    /// Set for reactions, which target one specific prompt
    pub prompt_id: Option<u64>,
    pub input: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Cancel,
}

impl Decision {
    /// Interpret a reply or reaction; `None` for anything that is not an
    /// explicit answer.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim().to_lowercase();
        if AFFIRMATIVE.contains(&input.as_str()) {
            Some(Self::Confirm)
        } else if NEGATIVE.contains(&input.as_str()) {
            Some(Self::Cancel)
        } else {
            None
        }
    }
}

/// Terminal state of a prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Confirmation<T> {
    /// The user said yes; carries the deferred operation's own outcome.
    Confirmed(T),
    Cancelled,
    TimedOut,
}

struct Pending {
    prompt_id: u64,
    sender: oneshot::Sender<Decision>,
}

// -----------------------------------------------------------------------------
// ConfirmationFlow

pub struct ConfirmationFlow {
    timeout: Duration,
    next_id: AtomicU64,
    pending: Mutex<HashMap<PromptKey, Pending>>,
}

impl Default for ConfirmationFlow {
    fn default() -> Self {
        Self::new(CONFIRMATION_TIMEOUT)
    }
}

impl ConfirmationFlow {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Present `prompt` and run `on_confirm` only if the user says yes
    /// before the timeout.
    #[instrument(skip(self, out, on_confirm))]
    pub async fn run<T, F, Fut>(
        &self,
        key: PromptKey,
        prompt: &str,
        out: &mut impl std::io::Write,
        on_confirm: F,
    ) -> Result<Confirmation<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let (sender, receiver) = oneshot::channel();
        let prompt_id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // A newer prompt for the same key supersedes the old one; dropping the
        // old sender resolves its wait as cancelled.
        if let Some(old) = self
            .pending
            .lock()
            .insert(key, Pending { prompt_id, sender })
        {
            debug!(prompt_id = old.prompt_id, "Superseded pending confirmation");
        }

        let written = writeln!(
            out,
            "{}\nReply `yes` to confirm or `no` to cancel ({}s).",
            prompt,
            self.timeout.as_secs()
        )
        .and_then(|_| out.flush());
        if let Err(err) = written {
            self.forget(key, prompt_id);
            return Err(err.into());
        }

        let outcome = tokio::time::timeout(self.timeout, receiver).await;
        self.forget(key, prompt_id);

        match outcome {
            Ok(Ok(Decision::Confirm)) => {
                debug!(prompt_id, "Confirmed");
                Ok(Confirmation::Confirmed(on_confirm().await))
            }
            Ok(Ok(Decision::Cancel)) | Ok(Err(_)) => {
                debug!(prompt_id, "Cancelled");
                Ok(Confirmation::Cancelled)
            }
            Err(_) => {
                debug!(prompt_id, "Timed out");
                Ok(Confirmation::TimedOut)
            }
        }
    }

    /// Route an input to the matching pending prompt. Returns whether it
    /// answered one.
    pub fn signal(&self, signal: &Signal) -> bool {
        let Some(decision) = Decision::parse(&signal.input) else {
            return false;
        };
        let key = PromptKey {
            user_id: signal.user_id,
            channel_id: signal.channel_id,
        };

        let mut pending = self.pending.lock();
        let matches = pending
            .get(&key)
            .is_some_and(|p| signal.prompt_id.is_none_or(|id| id == p.prompt_id));
        if !matches {
            return false;
        }
        match pending.remove(&key) {
            Some(p) => p.sender.send(decision).is_ok(),
            None => false,
        }
    }

    /// Whether `key` has an unanswered prompt
    pub fn is_pending(&self, key: PromptKey) -> bool {
        self.pending.lock().contains_key(&key)
    }

    /// Drop the entry for `key` if it still belongs to `prompt_id`
    fn forget(&self, key: PromptKey, prompt_id: u64) {
        let mut pending = self.pending.lock();
        if pending.get(&key).is_some_and(|p| p.prompt_id == prompt_id) {
            pending.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Arc;

    use super::*;

    const KEY: PromptKey = PromptKey {
        user_id: UserId(1),
        channel_id: 10,
    };

    fn reply(user: u64, channel: u64, input: &str) -> Signal {
        Signal {
            user_id: UserId(user),
            channel_id: channel,
            prompt_id: None,
            input: input.to_string(),
        }
    }

    /// Deliver `signals` once the prompt for `KEY` is registered.
    async fn answer(flow: &ConfirmationFlow, signals: Vec<(Duration, Signal)>) {
        while !flow.is_pending(KEY) {
            tokio::task::yield_now().await;
        }
        for (delay, signal) in signals {
            tokio::time::sleep(delay).await;
            flow.signal(&signal);
        }
    }

    #[test]
    fn test_decision_parse() {
        assert_eq!(Decision::parse(" YES "), Some(Decision::Confirm));
        assert_eq!(Decision::parse("✅"), Some(Decision::Confirm));
        assert_eq!(Decision::parse("n"), Some(Decision::Cancel));
        assert_eq!(Decision::parse("❌"), Some(Decision::Cancel));
        assert_eq!(Decision::parse("maybe"), None);
        assert_eq!(Decision::parse("yes please"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_times_out_without_mutation() {
        let flow = ConfirmationFlow::default();
        let calls = Cell::new(0);
        let mut out = Vec::new();

        let outcome = flow
            .run(KEY, "Delete a.txt?", &mut out, || async { calls.set(calls.get() + 1) })
            .await
            .unwrap();

        assert_eq!(outcome, Confirmation::TimedOut);
        assert_eq!(calls.get(), 0);
        assert!(!flow.is_pending(KEY));
        assert!(String::from_utf8(out).unwrap().starts_with("Delete a.txt?"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_answer_cancels_without_mutation() {
        let flow = ConfirmationFlow::default();
        let calls = Cell::new(0);
        let mut out = Vec::new();

        let (outcome, _) = tokio::join!(
            flow.run(KEY, "Delete a.txt?", &mut out, || async {
                calls.set(calls.get() + 1)
            }),
            answer(&flow, vec![(Duration::from_secs(1), reply(1, 10, "no"))]),
        );

        assert_eq!(outcome.unwrap(), Confirmation::Cancelled);
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_affirmative_answer_runs_once() {
        let flow = ConfirmationFlow::default();
        let calls = Cell::new(0);
        let mut out = Vec::new();

        let (outcome, _) = tokio::join!(
            flow.run(KEY, "Create branch?", &mut out, || async {
                calls.set(calls.get() + 1);
                "created"
            }),
            answer(
                &flow,
                vec![
                    (Duration::from_secs(1), reply(1, 10, "yes")),
                    // A second answer finds nothing pending
                    (Duration::from_secs(1), reply(1, 10, "yes")),
                ]
            ),
        );

        assert_eq!(outcome.unwrap(), Confirmation::Confirmed("created"));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_users_and_chatter_are_ignored() {
        let flow = ConfirmationFlow::default();
        let calls = Cell::new(0);
        let mut out = Vec::new();

        let (outcome, _) = tokio::join!(
            flow.run(KEY, "Delete a.txt?", &mut out, || async {
                calls.set(calls.get() + 1)
            }),
            answer(
                &flow,
                vec![
                    // Another user, and the same user in another channel
                    (Duration::from_secs(5), reply(2, 10, "yes")),
                    (Duration::from_secs(5), reply(1, 11, "yes")),
                    // Chatter at 25s must not push the deadline past 30s
                    (Duration::from_secs(15), reply(1, 10, "hmm, let me think")),
                    // Arrives after the original deadline
                    (Duration::from_secs(10), reply(1, 10, "yes")),
                ]
            ),
        );

        assert_eq!(outcome.unwrap(), Confirmation::TimedOut);
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaction_must_target_current_prompt() {
        let flow = Arc::new(ConfirmationFlow::default());
        let mut out = Vec::new();

        let (outcome, _) = tokio::join!(
            flow.run(KEY, "Create repo?", &mut out, || async { 1 }),
            async {
                answer(&flow, vec![]).await;
                let stale = Signal {
                    prompt_id: Some(999),
                    ..reply(1, 10, "✅")
                };
                assert!(!flow.signal(&stale));
                let current = Signal {
                    prompt_id: Some(1),
                    ..reply(1, 10, "✅")
                };
                assert!(flow.signal(&current));
            },
        );

        assert_eq!(outcome.unwrap(), Confirmation::Confirmed(1));
    }
}
