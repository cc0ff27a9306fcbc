use feed_rs::parser;
use thiserror::Error;

/// One release entry from the watched Atom feed.
///
/// The title doubles as the version identifier; no semantic-version parsing
/// is attempted. Entries are totally ordered by `updated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEntry {
    pub title: String,
    /// Feed-provided last-modified time, unix seconds.
    pub updated: i64,
    pub author: Option<String>,
    /// Release page link as published; may be relative to github.com.
    pub link: Option<String>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid feed document: {0}")]
    Malformed(#[from] feed_rs::parser::ParseFeedError),
    #[error("Entry {0:?} has no title")]
    MissingTitle(String),
    #[error("Entry {0:?} has no timestamp")]
    MissingTimestamp(String),
}

/// Parse an Atom document into release entries, in document order.
///
/// Title and timestamp are required per entry; author and link are not.
/// Feeds that omit `<updated>` fall back to `<published>`.
pub fn parse_releases(bytes: &[u8]) -> Result<Vec<ReleaseEntry>, ParseError> {
    let feed = parser::parse(bytes)?;

    feed.entries
        .into_iter()
        .map(|entry| {
            let id = entry.id;
            let updated = entry
                .updated
                .or(entry.published)
                .map(|dt| dt.timestamp())
                .ok_or_else(|| ParseError::MissingTimestamp(id.clone()))?;
            let title = entry
                .title
                .map(|t| t.content)
                .filter(|t| !t.trim().is_empty())
                .ok_or(ParseError::MissingTitle(id))?;
            let author = entry
                .authors
                .first()
                .map(|p| p.name.clone())
                .filter(|n| !n.is_empty());
            let link = entry.links.first().map(|l| l.href.clone());

            Ok(ReleaseEntry {
                title,
                updated,
                author,
                link,
            })
        })
        .collect()
}
