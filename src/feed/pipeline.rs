use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::feed::aggregate::drain;
use crate::feed::fetcher::{FetchError, Fetcher};
use crate::feed::parser::{decode_feed, DecodeError};
use crate::feed::types::{Batch, FeedItem};

/// Why a single URL's task produced no batch.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The task died before reporting; its batch, if any, was never pushed
    #[error("task for {url} panicked")]
    Panicked { url: String },
}

impl TaskError {
    /// URL the failed task was responsible for.
    pub fn url(&self) -> &str {
        match self {
            TaskError::Fetch(e) => e.url(),
            TaskError::Decode(e) => e.url(),
            TaskError::Panicked { url } => url,
        }
    }
}

/// One or more feeds failed, so the run as a whole failed.
///
/// Holds every per-URL error in input order. The message lists each of them.
#[derive(Debug, Error)]
pub struct ParseFailure {
    pub failures: Vec<TaskError>,
    /// Number of tasks that ran, successful ones included
    pub total: usize,
}

impl ParseFailure {
    /// URLs that failed, in input order.
    pub fn urls(&self) -> Vec<&str> {
        self.failures.iter().map(TaskError::url).collect()
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} feeds failed", self.failures.len(), self.total)?;
        for failure in &self.failures {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

/// Everything a run produced, successful items and failures side by side.
#[derive(Debug)]
pub struct ParseReport {
    /// Items from every task that succeeded, in batch arrival order
    pub items: Vec<FeedItem>,
    /// Errors from every task that failed, in input order
    pub failures: Vec<TaskError>,
    /// Number of tasks spawned (one per input URL)
    pub total: usize,
}

impl ParseReport {
    /// True when no task failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// All-or-nothing view: the items if every task succeeded, otherwise
    /// every failure. Items from successful tasks are dropped on failure.
    pub fn into_result(self) -> Result<Vec<FeedItem>, ParseFailure> {
        if self.failures.is_empty() {
            Ok(self.items)
        } else {
            Err(ParseFailure {
                failures: self.failures,
                total: self.total,
            })
        }
    }
}

/// Fetches and decodes every URL concurrently and aggregates the items.
///
/// Fails if any single feed fails to fetch or decode. Use [`collect`] to keep
/// the successful items alongside the failures instead.
///
/// # Ordering
///
/// Items are grouped by feed, and feeds appear in the order their tasks
/// finished. This is not the order of `urls`.
///
/// # Errors
///
/// Returns [`ParseFailure`] naming every URL whose task failed.
pub async fn parse(
    fetcher: Arc<dyn Fetcher>,
    urls: &[String],
) -> Result<Vec<FeedItem>, ParseFailure> {
    collect(fetcher, urls).await.into_result()
}

/// Runs one task per URL and reports both items and failures.
///
/// Every URL gets its own task, duplicates included, and all tasks start at
/// once with no concurrency cap. Each task fetches, decodes, and pushes its
/// batch onto a channel with one slot per URL; failed tasks push nothing.
/// A failure never stops the other tasks. The channel is closed only after
/// every task has been joined, and then drained into a single list.
pub async fn collect(fetcher: Arc<dyn Fetcher>, urls: &[String]) -> ParseReport {
    let total = urls.len();
    if total == 0 {
        return ParseReport {
            items: Vec::new(),
            failures: Vec::new(),
            total,
        };
    }

    // One slot per task, so no send ever waits on the reader
    let (tx, rx) = mpsc::channel::<Batch>(total);

    let handles: Vec<_> = urls
        .iter()
        .map(|url| {
            let fetcher = Arc::clone(&fetcher);
            let tx = tx.clone();
            let url = url.clone();
            tokio::spawn(async move { run_task(fetcher.as_ref(), &url, tx).await })
        })
        .collect();

    let mut failures = Vec::new();
    for (url, handle) in urls.iter().zip(handles) {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(feed = %url, error = %e, "Feed task failed");
                failures.push(e);
            }
            Err(join_err) => {
                tracing::warn!(feed = %url, error = %join_err, "Feed task panicked");
                failures.push(TaskError::Panicked { url: url.clone() });
            }
        }
    }

    // Every task has finished and dropped its sender; dropping ours closes the channel
    drop(tx);
    let items = drain(rx).await;

    tracing::info!(
        urls = total,
        items = items.len(),
        failed = failures.len(),
        "Feed run complete"
    );

    ParseReport {
        items,
        failures,
        total,
    }
}

/// Fetches and decodes one feed.
///
/// On success the items go out as one [`Batch`] on `tx` and the task returns
/// `Ok(())`. On failure nothing is sent and the error is the return value.
async fn run_task(
    fetcher: &dyn Fetcher,
    url: &str,
    tx: mpsc::Sender<Batch>,
) -> Result<(), TaskError> {
    tracing::debug!(feed = %url, "Fetching feed");
    let bytes = fetcher.get(url).await?;

    let items = decode_feed(&bytes, url)?;
    let count = items.len();

    let batch = Batch {
        url: url.to_string(),
        items,
    };
    if tx.send(batch).await.is_err() {
        // Only happens when the caller stopped waiting for the run
        tracing::debug!(feed = %url, "Result channel closed, batch dropped");
        return Ok(());
    }

    tracing::debug!(feed = %url, items = count, "Feed batch pushed");
    Ok(())
}
