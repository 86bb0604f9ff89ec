//! Concurrent RSS fetching, decoding and aggregation.
//!
//! - **Fetching**: the [`Fetcher`] seam, with HTTP and filesystem implementations
//! - **Decoding**: RSS 2.0 XML into normalized [`FeedItem`]s
//! - **Pipeline**: one task per URL, results fanned back in over a bounded channel
//!
//! # Architecture
//!
//! - [`fetcher`] - `Fetcher` trait, `HttpFetcher`, `FileFetcher`
//! - [`parser`] - XML decoding with `quick-xml`
//! - [`pipeline`] - task fan-out, join barrier, failure collection
//! - [`aggregate`] - drains the result channel into one list
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use feedfold::feed::{parse, FetchConfig, HttpFetcher};
//!
//! let fetcher = Arc::new(HttpFetcher::new(&FetchConfig::default())?);
//! let items = parse(fetcher, &["https://example.com/rss".to_string()]).await?;
//! ```

pub mod aggregate;
pub mod fetcher;
pub mod parser;
pub mod pipeline;
mod types;

pub use fetcher::{FetchConfig, FetchError, Fetcher, FileFetcher, HttpFetcher};
pub use parser::{decode_feed, DecodeError};
pub use pipeline::{collect, parse, ParseFailure, ParseReport, TaskError};
pub use types::{Batch, FeedItem};
