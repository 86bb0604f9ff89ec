use tokio::sync::mpsc;

use crate::feed::types::{Batch, FeedItem};

/// Flattens every batch on the channel into one list.
///
/// Returns once the channel is closed and empty. Items keep the order in
/// which their batches arrived, which is task completion order rather than
/// the order URLs were supplied in. Within a batch, document order is kept.
pub async fn drain(mut rx: mpsc::Receiver<Batch>) -> Vec<FeedItem> {
    let mut items = Vec::new();
    while let Some(batch) = rx.recv().await {
        tracing::trace!(feed = %batch.url, items = batch.items.len(), "Draining batch");
        items.extend(batch.items);
    }
    items
}
