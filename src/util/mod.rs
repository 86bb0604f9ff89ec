//! Text and timestamp helpers shared by the feed decoder.
//!
//! - **Timestamps**: feed dates in any of the common RFC/Unix layouts
//! - **Text**: markup tag stripping for descriptions
//!
//! # Examples
//!
//! ```
//! use feedfold::util::{parse_timestamp, strip_tags};
//!
//! let published = parse_timestamp("Tue, 10 Jun 2003 04:00:00 GMT").unwrap();
//! assert_eq!(published.timestamp(), 1_055_217_600);
//!
//! assert_eq!(strip_tags("<p>Hello</p>"), "Hello");
//! ```

mod text;
mod time;

pub use text::strip_tags;
pub use time::{parse_timestamp, TimeParseError, LAYOUTS};
