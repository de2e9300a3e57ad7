//! Chat session: drives one streamed turn at a time.
//!
//! A turn submits the prompt, feeds text deltas to a [`TextAssembler`],
//! hands audio clips to the session's [`AudioSchedulerHandle`] and stops at
//! the first terminal event. Directive markers are stripped from the visible
//! text however the turn ended; only a completed reply fires the chosen
//! expression on the avatar, without waiting for it.
//!
//! The scheduler lives as long as the session, so clips from consecutive
//! turns share one queue and never overlap.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::assembler::TextAssembler;
use super::client::ChatClient;
use super::events::StreamEvent;
use super::message::{ChatMessage, Conversation};
use crate::audio::{self, AudioScheduler, AudioSchedulerHandle};
use crate::avatar::{AvatarControlClient, DirectivePolicy, ExpressionTrigger, extract};
use crate::config::EleonorConfig;
use crate::error::Result;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    /// The stream finished and the reply is complete.
    Completed,
    /// The stream could not be opened or reported an error.
    Failed(String),
    /// The caller cancelled the turn.
    Cancelled,
}

/// Result of [`ChatSession::send`].
#[derive(Debug)]
pub struct TurnOutcome {
    /// The assistant message as shown to the user.
    pub message: ChatMessage,
    pub status: TurnStatus,
    /// Expression chosen from the reply, if any.
    pub directive: Option<String>,
    /// Handle of the detached avatar run, if one was fired.
    pub avatar_task: Option<JoinHandle<()>>,
}

/// One conversation with the chat endpoint.
pub struct ChatSession {
    client: ChatClient,
    audio: AudioSchedulerHandle,
    trigger: Option<ExpressionTrigger>,
    policy: DirectivePolicy,
    history: Conversation,
    live: Arc<watch::Sender<String>>,
}

impl ChatSession {
    /// Assemble a session from its parts.
    pub fn new(
        client: ChatClient,
        audio: AudioSchedulerHandle,
        trigger: Option<ExpressionTrigger>,
        policy: DirectivePolicy,
    ) -> Self {
        let (live, _) = watch::channel(String::new());
        Self {
            client,
            audio,
            trigger,
            policy,
            history: Conversation::new(),
            live: Arc::new(live),
        }
    }

    /// Build a session from configuration. Must run inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &EleonorConfig) -> Result<Self> {
        let client = ChatClient::new(&config.chat)?;
        let audio = AudioScheduler::spawn(audio::default_sink(&config.audio), config.audio.enabled);
        let trigger = config.avatar.enabled.then(|| {
            ExpressionTrigger::new(Arc::new(AvatarControlClient::new(config.avatar.clone())))
        });
        Ok(Self::new(
            client,
            audio,
            trigger,
            config.avatar.directive_policy,
        ))
    }

    /// Messages exchanged so far.
    pub fn history(&self) -> &Conversation {
        &self.history
    }

    /// Forget every message.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Partial content of the assistant message being streamed.
    pub fn live_view(&self) -> watch::Receiver<String> {
        self.live.subscribe()
    }

    /// The session's audio scheduler.
    pub fn audio(&self) -> &AudioSchedulerHandle {
        &self.audio
    }

    /// Turn audio playback on or off. Turning it off drops queued clips.
    pub async fn set_audio_enabled(&self, enabled: bool) {
        self.audio.set_enabled(enabled).await;
    }

    /// Run one turn for `prompt`.
    ///
    /// Never fails: stream errors end up inside the returned message and its
    /// [`TurnStatus`]. Avatar failures never reach this method at all.
    pub async fn send(&mut self, prompt: &str, cancel: CancellationToken) -> TurnOutcome {
        self.history.push(ChatMessage::user(prompt));
        let mut assembler = TextAssembler::new(ChatMessage::assistant_placeholder())
            .with_live_view(Arc::clone(&self.live));

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.client.open(prompt) => Some(result),
        };

        let status = match opened {
            None => {
                assembler.cancel();
                TurnStatus::Cancelled
            }
            Some(Err(e)) => {
                warn!(error = %e, "chat stream could not be opened");
                let reason = e.to_string();
                assembler.fail(&reason);
                TurnStatus::Failed(reason)
            }
            Some(Ok(mut stream)) => loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    event = stream.next() => Some(event),
                };
                match next {
                    None => {
                        assembler.cancel();
                        break TurnStatus::Cancelled;
                    }
                    Some(Some(StreamEvent::Text(delta))) => {
                        assembler.append(&delta);
                    }
                    Some(Some(StreamEvent::Audio(payload))) => self.audio.enqueue(payload),
                    Some(Some(StreamEvent::Done)) | Some(None) => {
                        assembler.complete();
                        break TurnStatus::Completed;
                    }
                    Some(Some(StreamEvent::Error(reason))) => {
                        warn!(error = %reason, "chat stream reported an error");
                        assembler.fail(&reason);
                        break TurnStatus::Failed(reason);
                    }
                }
            },
        };

        let found = extract(assembler.streamed());
        let directive = match status {
            TurnStatus::Completed => found.select(self.policy).map(|d| d.name.clone()),
            _ => None,
        };
        assembler.finalize_display(found.cleaned);

        let avatar_task = match (&directive, &self.trigger) {
            (Some(name), Some(trigger)) => Some(trigger.fire(name.clone())),
            _ => None,
        };

        let message = assembler.into_message();
        match &status {
            TurnStatus::Completed => info!(
                chars = message.content.len(),
                directive = directive.as_deref().unwrap_or("-"),
                "chat turn complete"
            ),
            TurnStatus::Cancelled => debug!("chat turn cancelled"),
            TurnStatus::Failed(_) => {}
        }
        self.history.push(message.clone());

        TurnOutcome {
            message,
            status,
            directive,
            avatar_task,
        }
    }
}
