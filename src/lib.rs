//! relwatch watches a GitHub releases Atom feed and posts new releases to
//! a Slack-compatible incoming webhook.
//!
//! The core is a polling/dedup/notify/reschedule cycle: fetch the feed,
//! select the newest entry by timestamp, compare it against the persisted
//! watermark, deliver a notification when something new appeared, and only
//! then advance the watermark. A fixed-interval scheduler drives the cycle
//! forever; no failure inside a cycle stops the loop.

pub mod config;
pub mod feed;
pub mod notify;
pub mod storage;
pub mod watch;
