//! Audio Scheduler: serial playback of stream audio clips.
//!
//! [`AudioScheduler::spawn`] starts a background task that owns a
//! [`PlaybackQueue`] and an [`AudioSink`]. The returned
//! [`AudioSchedulerHandle`] enqueues clips and toggles playback; the task
//! hands clips to the sink one at a time, in arrival order, starting the next
//! only after the previous one reported end or error.
//!
//! Disabling playback clears the queue and cancels the clip that is playing,
//! so nothing keeps sounding after the user muted the assistant. Dropping the
//! handle stops the task the same way.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::clip::AudioClip;
use super::decode::decode_clip;
use super::queue::{PlaybackQueue, SchedulerState};
use crate::error::Result;

/// Something that can play one clip to completion.
#[async_trait]
pub trait AudioSink: Send + Sync + 'static {
    /// Play `clip`, returning when it ended.
    ///
    /// Implementations must return promptly once `cancel` fires.
    async fn play(&self, clip: &AudioClip, cancel: CancellationToken) -> Result<()>;
}

/// Sink that decodes clips and discards the audio.
///
/// Used when the crate is built without the `speaker` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

#[async_trait]
impl AudioSink for DiscardSink {
    async fn play(&self, clip: &AudioClip, _cancel: CancellationToken) -> Result<()> {
        let audio = decode_clip(&clip.payload)?;
        debug!(
            position = clip.position,
            seconds = audio.duration_secs(),
            "discarding decoded audio clip"
        );
        Ok(())
    }
}

/// Snapshot of scheduler progress, published after every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatus {
    /// Whether a clip is playing.
    pub state: SchedulerState,
    /// Clips waiting behind the current one.
    pub pending: usize,
    /// Whether playback is enabled.
    pub enabled: bool,
    /// Clips handed to the sink so far.
    pub started: u64,
    /// Clips whose playback ended, failed or was cancelled.
    pub finished: u64,
    /// Enqueue requests processed, including discarded ones.
    pub received: u64,
}

enum Command {
    Enqueue(String),
    SetEnabled(bool, oneshot::Sender<()>),
}

/// Entry point for spawning the playback task.
pub struct AudioScheduler;

impl AudioScheduler {
    /// Spawn the scheduler task on the current runtime.
    pub fn spawn(sink: Arc<dyn AudioSink>, enabled: bool) -> AudioSchedulerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = PlaybackQueue::new(enabled);
        let (status_tx, status_rx) = watch::channel(SchedulerStatus {
            state: SchedulerState::Idle,
            pending: 0,
            enabled,
            started: 0,
            finished: 0,
            received: 0,
        });

        let driver = Driver {
            sink,
            queue,
            commands: rx,
            status: status_tx,
            active: None,
            started: 0,
            finished: 0,
            received: 0,
        };
        let task = tokio::spawn(driver.run());

        AudioSchedulerHandle {
            tx,
            status: status_rx,
            submitted: AtomicU64::new(0),
            task,
        }
    }
}

/// Handle to a running scheduler task.
pub struct AudioSchedulerHandle {
    tx: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SchedulerStatus>,
    submitted: AtomicU64,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for AudioSchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSchedulerHandle")
            .field("status", &*self.status.borrow())
            .finish()
    }
}

impl AudioSchedulerHandle {
    /// Append a base64 audio payload to the playback queue.
    pub fn enqueue(&self, payload: impl Into<String>) {
        if self.tx.send(Command::Enqueue(payload.into())).is_err() {
            warn!("audio scheduler stopped; dropping clip");
            return;
        }
        self.submitted.fetch_add(1, Ordering::SeqCst);
    }

    /// Enable or disable playback, returning once the change has been applied.
    ///
    /// Disabling clears every pending clip and stops the current one.
    pub async fn set_enabled(&self, enabled: bool) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::SetEnabled(enabled, ack_tx)).is_err() {
            return;
        }
        let _ = ack_rx.await;
    }

    /// Latest published status.
    pub fn status(&self) -> SchedulerStatus {
        *self.status.borrow()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.clone()
    }

    /// Wait until every clip enqueued so far has been played or discarded.
    pub async fn wait_idle(&self) {
        let target = self.submitted.load(Ordering::SeqCst);
        let mut rx = self.status.clone();
        let _ = rx
            .wait_for(|s| {
                s.received >= target && s.state == SchedulerState::Idle && s.pending == 0
            })
            .await;
    }

    /// Stop the task, cancelling any clip in progress.
    pub async fn shutdown(self) {
        let Self { tx, task, .. } = self;
        drop(tx);
        let _ = task.await;
    }
}

/// The clip handed to the sink and the means to stop it.
struct ActivePlayback {
    position: u64,
    cancel: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

struct Driver {
    sink: Arc<dyn AudioSink>,
    queue: PlaybackQueue,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<SchedulerStatus>,
    active: Option<ActivePlayback>,
    started: u64,
    finished: u64,
    received: u64,
}

impl Driver {
    async fn run(mut self) {
        loop {
            self.start_next();
            self.publish();

            let Some(active) = self.active.as_mut() else {
                match self.commands.recv().await {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                }
                continue;
            };

            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                joined = &mut active.handle => {
                    let position = active.position;
                    self.active = None;
                    match joined {
                        Ok(Ok(())) => debug!(position, "audio clip finished"),
                        Ok(Err(e)) => warn!(position, error = %e, "audio clip playback failed"),
                        Err(e) => warn!(position, error = %e, "audio clip playback task aborted"),
                    }
                    if self.queue.finish(position).is_some() {
                        self.finished += 1;
                    }
                }
            }
        }

        self.stop_active();
        debug!("audio scheduler stopped");
    }

    fn start_next(&mut self) {
        if self.active.is_some() {
            return;
        }
        let Some(clip) = self.queue.next_ready() else {
            return;
        };

        self.started += 1;
        let cancel = CancellationToken::new();
        let sink = Arc::clone(&self.sink);
        let token = cancel.clone();
        let position = clip.position;
        debug!(position, "starting audio clip");
        let handle = tokio::spawn(async move { sink.play(&clip, token).await });

        self.active = Some(ActivePlayback {
            position,
            cancel,
            handle,
        });
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Enqueue(payload) => {
                self.received += 1;
                if self.queue.enqueue(payload).is_none() {
                    debug!("playback disabled; discarding audio clip");
                }
            }
            Command::SetEnabled(enabled, ack) => {
                if let Some(stopped) = self.queue.set_enabled(enabled) {
                    info!(position = stopped.position, "playback disabled; stopping current clip");
                    self.finished += 1;
                }
                if !enabled {
                    self.stop_active();
                }
                self.publish();
                let _ = ack.send(());
            }
        }
    }

    fn stop_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.handle.abort();
        }
    }

    fn publish(&self) {
        let status = SchedulerStatus {
            state: self.queue.state(),
            pending: self.queue.pending_len(),
            enabled: self.queue.is_enabled(),
            started: self.started,
            finished: self.finished,
            received: self.received,
        };
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}
