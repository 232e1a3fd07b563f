//! Sequential playback queue.
//!
//! The queue is an actor task that owns an [`AudioOutput`]. Exactly one item
//! sounds at a time; when it ends the next queued item starts, or the queue
//! drains to idle. [`PlaybackQueue::play_now`] interrupts whatever is playing
//! and drops everything still queued, so a new request never interleaves
//! with the tail of an older one. A failed item is logged and skipped.

use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use super::output::{AudioOutput, PlaybackError};

/// How an item's time on the output ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Reached its natural end
    Finished,
    /// Replaced by a `play_now` item, while playing or still queued
    Interrupted,
    /// The output could not play it
    Failed,
}

struct PlaybackItem {
    audio: Bytes,
    on_finished: Option<oneshot::Sender<PlaybackOutcome>>,
}

enum PlaybackCommand {
    PlayNow(PlaybackItem),
    Enqueue(PlaybackItem),
}

/// Handle to the playback actor. Cheap to clone.
#[derive(Clone)]
pub struct PlaybackQueue {
    commands: mpsc::UnboundedSender<PlaybackCommand>,
    pending: Arc<watch::Sender<usize>>,
    takeovers: Arc<AtomicU64>,
}

impl PlaybackQueue {
    /// Spawn the actor on the current Tokio runtime.
    pub fn spawn<O>(output: O) -> Self
    where
        O: AudioOutput + 'static,
    {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);

        debug!(output = output.name(), "Starting playback queue");
        tokio::spawn(run_player(Box::new(output), receiver, Arc::clone(&pending)));

        Self {
            commands,
            pending,
            takeovers: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Play `audio` immediately, replacing the current item and the queue.
    pub fn play_now(&self, audio: Bytes) -> Result<(), PlaybackError> {
        self.submit(audio, None, true)
    }

    /// Like [`play_now`](Self::play_now); the receiver resolves with the
    /// item's outcome. The observer is attached before the item is submitted.
    pub fn play_now_observed(
        &self,
        audio: Bytes,
    ) -> Result<oneshot::Receiver<PlaybackOutcome>, PlaybackError> {
        let (tx, rx) = oneshot::channel();
        self.submit(audio, Some(tx), true)?;
        Ok(rx)
    }

    /// Append `audio` to the end of the queue.
    pub fn enqueue(&self, audio: Bytes) -> Result<(), PlaybackError> {
        self.submit(audio, None, false)
    }

    pub fn enqueue_observed(
        &self,
        audio: Bytes,
    ) -> Result<oneshot::Receiver<PlaybackOutcome>, PlaybackError> {
        let (tx, rx) = oneshot::channel();
        self.submit(audio, Some(tx), false)?;
        Ok(rx)
    }

    /// Number of `play_now` submissions so far. A caller that recorded the
    /// value after its own `play_now` still owns the queue while it is unchanged.
    pub fn takeovers(&self) -> u64 {
        self.takeovers.load(Ordering::SeqCst)
    }

    /// Items submitted but not yet played or dropped.
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Resolve once every submitted item has been played or dropped.
    pub async fn wait_idle(&self) {
        let mut receiver = self.pending.subscribe();
        let _ = receiver.wait_for(|pending| *pending == 0).await;
    }

    fn submit(
        &self,
        audio: Bytes,
        on_finished: Option<oneshot::Sender<PlaybackOutcome>>,
        immediate: bool,
    ) -> Result<(), PlaybackError> {
        self.pending.send_modify(|pending| *pending += 1);
        if immediate {
            self.takeovers.fetch_add(1, Ordering::SeqCst);
        }

        let item = PlaybackItem { audio, on_finished };
        let command = if immediate {
            PlaybackCommand::PlayNow(item)
        } else {
            PlaybackCommand::Enqueue(item)
        };

        if self.commands.send(command).is_err() {
            self.pending
                .send_modify(|pending| *pending = pending.saturating_sub(1));
            return Err(PlaybackError::QueueClosed);
        }
        Ok(())
    }
}

fn apply(
    command: PlaybackCommand,
    queue: &mut VecDeque<PlaybackItem>,
    pending: &watch::Sender<usize>,
) {
    match command {
        PlaybackCommand::PlayNow(item) => {
            drop_queued(queue, pending);
            queue.push_back(item);
        }
        PlaybackCommand::Enqueue(item) => queue.push_back(item),
    }
}

/// Interrupt every queued item that has not started yet.
fn drop_queued(queue: &mut VecDeque<PlaybackItem>, pending: &watch::Sender<usize>) {
    if queue.is_empty() {
        return;
    }
    let dropped = queue.len();
    for item in queue.drain(..) {
        if let Some(observer) = item.on_finished {
            let _ = observer.send(PlaybackOutcome::Interrupted);
        }
    }
    pending.send_modify(|pending| *pending = pending.saturating_sub(dropped));
    debug!(dropped = dropped, "Dropped queued playback items");
}

async fn run_player(
    mut output: Box<dyn AudioOutput>,
    mut commands: mpsc::UnboundedReceiver<PlaybackCommand>,
    pending: Arc<watch::Sender<usize>>,
) {
    let mut queue: VecDeque<PlaybackItem> = VecDeque::new();
    let mut open = true;

    loop {
        let Some(PlaybackItem { audio, on_finished }) = queue.pop_front() else {
            if !open {
                break;
            }
            match commands.recv().await {
                Some(command) => apply(command, &mut queue, &pending),
                None => open = false,
            }
            continue;
        };

        let bytes = audio.len();
        let outcome = {
            let play = output.play(audio);
            tokio::pin!(play);

            loop {
                tokio::select! {
                    result = &mut play => {
                        break match result {
                            Ok(()) => PlaybackOutcome::Finished,
                            Err(e) => {
                                warn!("Playback failed, continuing with next item: {}", e);
                                PlaybackOutcome::Failed
                            }
                        };
                    }
                    command = commands.recv(), if open => match command {
                        Some(command @ PlaybackCommand::PlayNow(_)) => {
                            apply(command, &mut queue, &pending);
                            break PlaybackOutcome::Interrupted;
                        }
                        Some(PlaybackCommand::Enqueue(item)) => queue.push_back(item),
                        None => open = false,
                    }
                }
            }
        };

        if outcome == PlaybackOutcome::Interrupted {
            output.stop().await;
        }

        debug!(bytes = bytes, outcome = ?outcome, queued = queue.len(), "Playback item done");

        if let Some(observer) = on_finished {
            let _ = observer.send(outcome);
        }
        pending.send_modify(|pending| *pending = pending.saturating_sub(1));
    }

    debug!("Playback queue stopped");
}
