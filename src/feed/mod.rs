//! Retrieval and parsing of the watched releases feed.
//!
//! - [`parser`] turns Atom bytes into [`ReleaseEntry`] values via `feed-rs`
//! - [`fetcher`] retrieves the feed over HTTP with a timeout and a bounded
//!   body read
//!
//! Entries are produced in document order; selection of "the latest release"
//! is always by maximum `updated` timestamp and belongs to the watch cycle.

mod fetcher;
mod parser;

pub use fetcher::{fetch_releases, FetchError};
pub use parser::{parse_releases, ParseError, ReleaseEntry};
