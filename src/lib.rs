//! Fetch many RSS feeds at once and fold their items into a single list.
//!
//! The entry point is [`parse`]: give it a [`Fetcher`] and a list of feed
//! URLs, and it returns every item from every feed, or an error naming each
//! feed that could not be fetched or decoded.

pub mod config;
pub mod feed;
pub mod util;

pub use feed::{collect, parse, FeedItem, Fetcher, ParseFailure, ParseReport};
