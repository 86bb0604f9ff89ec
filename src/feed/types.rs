use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// One normalized entry from a feed.
///
/// Built once by the decoder and never modified afterwards; it moves from
/// the task that decoded it, through the result channel, into the
/// aggregated list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    /// Entry title, whitespace-trimmed
    pub title: String,
    /// Title of the channel the entry came from
    pub source: String,
    /// URL the feed was fetched from
    pub source_url: String,
    /// Entry URL, whitespace-trimmed
    pub link: String,
    /// Publish time with the offset the feed declared
    pub publish_date: DateTime<FixedOffset>,
    /// Description with markup tags removed, whitespace-trimmed
    pub description: String,
}

/// Every item decoded from a single feed, in document order.
///
/// This is the unit each task pushes onto the result channel.
#[derive(Debug)]
pub struct Batch {
    /// URL of the task that produced the batch
    pub url: String,
    pub items: Vec<FeedItem>,
}
