use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use chrono::Utc;
use futures::Stream;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::dedup::DedupWindow;
use super::directory;
use super::history::{PollCursor, fetch_window};
use crate::client::ChatApi;
use crate::config::PollerConfig;
use crate::error::Result;
use crate::models::{ConversationRef, ConversationSet, CycleReport, Message, PollStats, millis};

/// Slots between the loop and the consumer. One slot is the closest tokio
/// mpsc gets to a rendezvous handoff.
const EMIT_BUFFER: usize = 1;

/// The loop observed a shutdown request or lost its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopped;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    SelfAuthored,
    Duplicate,
    Fresh,
}

/// State owned by one polling task: the dedup window and the cursor are the
/// only things that survive from one cycle to the next.
pub struct Poller<A: ?Sized> {
    api: Arc<A>,
    config: PollerConfig,
    dedup: DedupWindow,
    cursor: PollCursor,
}

impl<A> Poller<A>
where
    A: ChatApi + ?Sized,
{
    pub fn new(api: Arc<A>, config: PollerConfig) -> Result<Self> {
        config.validate()?;
        if api.user_id() != config.self_user_id {
            warn!(
                session_user = api.user_id(),
                self_user = %config.self_user_id,
                "self user id differs from the session user"
            );
        }
        Ok(Self {
            dedup: DedupWindow::new(config.dedup_capacity),
            cursor: PollCursor::starting_at(Utc::now()),
            api,
            config,
        })
    }

    pub fn cursor(&self) -> PollCursor {
        self.cursor
    }

    pub fn dedup(&self) -> &DedupWindow {
        &self.dedup
    }

    fn verdict(&self, message: &Message) -> Verdict {
        if message.is_authored_by(&self.config.self_user_id) {
            Verdict::SelfAuthored
        } else if self.dedup.contains(&message.id) {
            Verdict::Duplicate
        } else {
            Verdict::Fresh
        }
    }

    /// One full pass over every conversation the directory currently knows.
    pub async fn poll_once(
        &mut self,
        tx: &mpsc::Sender<Message>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> std::result::Result<CycleReport, Stopped> {
        let started = Instant::now();
        let cycle_start = Utc::now();
        let mut report = CycleReport::default();

        let api = Arc::clone(&self.api);
        let conversations = match until_shutdown(shutdown, directory::resolve(api.as_ref())).await? {
            Ok(set) => set,
            Err(e) => {
                warn!(error = %e, "conversation directory unavailable, skipping cycle");
                report.directory_failed = true;
                ConversationSet::default()
            }
        };
        report.conversations = conversations.len();

        for conversation in conversations.in_poll_order() {
            self.drain_conversation(conversation, tx, shutdown, &mut report)
                .await?;
        }

        self.cursor.advance_to(cycle_start);
        report.time_taken = started.elapsed();
        Ok(report)
    }

    async fn drain_conversation(
        &mut self,
        conversation: &ConversationRef,
        tx: &mpsc::Sender<Message>,
        shutdown: &mut broadcast::Receiver<()>,
        report: &mut CycleReport,
    ) -> std::result::Result<(), Stopped> {
        let api = Arc::clone(&self.api);
        let fetched =
            until_shutdown(shutdown, fetch_window(api.as_ref(), conversation, self.cursor)).await?;
        let messages = match fetched {
            Ok(messages) => messages,
            Err(e) => {
                warn!(
                    room_id = %conversation.id,
                    kind = %conversation.kind,
                    error = %e,
                    "history fetch failed, skipping conversation"
                );
                report.failed_fetches += 1;
                return Ok(());
            }
        };

        for message in messages {
            match self.verdict(&message) {
                Verdict::SelfAuthored => report.skipped_self += 1,
                Verdict::Duplicate => report.skipped_duplicate += 1,
                Verdict::Fresh => {
                    let id = message.id.clone();
                    trace!(message_id = %id, room_id = %message.room_id, "emitting message");
                    until_shutdown(shutdown, tx.send(message))
                        .await?
                        .map_err(|_| Stopped)?;
                    self.dedup.record(id);
                    report.emitted += 1;
                }
            }
        }
        Ok(())
    }

    /// Polls until shutdown or until the consumer goes away. Dropping `tx` on
    /// return closes the stream.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<Message>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> PollStats {
        let mut stats = PollStats::new();
        info!(
            poll_interval_ms = millis(self.config.poll_interval),
            dedup_capacity = self.config.dedup_capacity,
            "incoming stream started"
        );

        loop {
            if stop_requested(&mut shutdown) || tx.is_closed() {
                break;
            }

            match self.poll_once(&tx, &mut shutdown).await {
                Ok(report) => {
                    debug!(
                        conversations = report.conversations,
                        emitted = report.emitted,
                        skipped_self = report.skipped_self,
                        skipped_duplicate = report.skipped_duplicate,
                        failed_fetches = report.failed_fetches,
                        elapsed_ms = millis(report.time_taken),
                        "poll cycle finished"
                    );
                    stats.add_cycle(report);
                }
                Err(Stopped) => break,
            }

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tx.closed() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!(cycles = stats.cycles, emitted = stats.total_emitted, "incoming stream stopped");
        stats
    }
}

fn stop_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    // A closed or lagged channel counts as a request too.
    !matches!(shutdown.try_recv(), Err(TryRecvError::Empty))
}

async fn until_shutdown<F>(
    shutdown: &mut broadcast::Receiver<()>,
    fut: F,
) -> std::result::Result<F::Output, Stopped>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = shutdown.recv() => Err(Stopped),
        out = fut => Ok(out),
    }
}

/// Consumer side of a running poller.
///
/// Yields messages until [`IncomingStream::stop`] is called, the value is
/// dropped, or the task ends. Errors never travel through the stream; they
/// only show up in the logs and in the returned [`PollStats`].
pub struct IncomingStream {
    rx: mpsc::Receiver<Message>,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<PollStats>,
}

impl IncomingStream {
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Asks the loop to stop without waiting for it.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub async fn stop(mut self) -> PollStats {
        self.shutdown();
        self.rx.close();
        match self.handle.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "poller task ended abnormally");
                PollStats::new()
            }
        }
    }
}

impl Stream for IncomingStream {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        self.rx.poll_recv(cx)
    }
}

/// Spawns the polling loop on the current tokio runtime.
pub fn start_incoming_stream<A>(api: Arc<A>, config: PollerConfig) -> Result<IncomingStream>
where
    A: ChatApi + ?Sized + 'static,
{
    let poller = Poller::new(api, config)?;
    let (tx, rx) = mpsc::channel(EMIT_BUFFER);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(poller.run(tx, shutdown_rx));
    Ok(IncomingStream {
        rx,
        shutdown_tx,
        handle,
    })
}
