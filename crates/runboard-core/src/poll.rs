//! Periodic refresh of a remote resource.
//!
//! `Poller::spawn()` starts a tokio task that calls `fetch` right away and then
//! again `interval` after each call completes, so two calls never overlap.
//! The latest result is published on a watch channel. Dropping the handle or
//! calling `stop()` ends the task.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{Result, RunboardError};

/// Refresh period used by the dashboard views.
pub const FETCH_INTERVAL: Duration = Duration::from_secs(5);

enum PollCommand<R> {
    /// Skip the pending wait and fetch now.
    Flush(oneshot::Sender<R>),
    Stop,
}

pub struct Poller<R> {
    sender: mpsc::UnboundedSender<PollCommand<R>>,
    latest: watch::Receiver<Option<R>>,
    in_flight: Arc<AtomicUsize>,
    completed: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl<R> Poller<R>
where
    R: Clone + Send + Sync + 'static,
{
    /// Start polling. Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(interval: Duration, fetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (publisher, latest) = watch::channel(None);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(poll_loop(
            interval,
            fetch,
            receiver,
            publisher,
            in_flight.clone(),
            completed.clone(),
        ));

        info!(interval_ms = interval.as_millis() as u64, "Poller started");

        Self {
            sender,
            latest,
            in_flight,
            completed,
            task: Some(task),
        }
    }

    /// Result of the most recent completed fetch.
    pub fn latest(&self) -> Option<R> {
        self.latest.borrow().clone()
    }

    /// Receiver that is notified after every completed fetch.
    pub fn subscribe(&self) -> watch::Receiver<Option<R>> {
        self.latest.clone()
    }

    /// Fetches currently running: 0 or 1.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Fetches completed so far.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Cancel the pending wait, fetch now and return the fresh result.
    ///
    /// If a fetch is already running, the result of the one after it is returned.
    pub async fn flush(&self) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PollCommand::Flush(tx))
            .map_err(|_| RunboardError::PollerStopped)?;
        rx.await.map_err(|_| RunboardError::PollerStopped)
    }

    /// Stop polling and wait for the task to finish its current fetch.
    pub async fn stop(mut self) {
        let _ = self.sender.send(PollCommand::Stop);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl<R> Drop for Poller<R> {
    fn drop(&mut self) {
        let _ = self.sender.send(PollCommand::Stop);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn poll_loop<R, F, Fut>(
    interval: Duration,
    mut fetch: F,
    mut commands: mpsc::UnboundedReceiver<PollCommand<R>>,
    publisher: watch::Sender<Option<R>>,
    in_flight: Arc<AtomicUsize>,
    completed: Arc<AtomicU64>,
) where
    R: Clone,
    F: FnMut() -> Fut,
    Fut: Future<Output = R>,
{
    let mut waiters: Vec<oneshot::Sender<R>> = Vec::new();

    loop {
        in_flight.fetch_add(1, Ordering::SeqCst);
        let result = fetch().await;
        in_flight.fetch_sub(1, Ordering::SeqCst);
        let runs = completed.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(runs, "Poll completed");

        publisher.send_replace(Some(result.clone()));
        for waiter in waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }

        // The next fetch is only scheduled once this one has finished.
        let next = tokio::time::sleep(interval);
        tokio::pin!(next);
        tokio::select! {
            biased;

            cmd = commands.recv() => match cmd {
                Some(PollCommand::Flush(reply)) => waiters.push(reply),
                Some(PollCommand::Stop) | None => break,
            },

            _ = &mut next => {}
        }
    }

    info!("Poller stopped");
}
