//! Polls CCTray build status feeds and merges them into one sanitized
//! project list.
//!
//! The [`feed`] module holds the pipeline, [`util`] the URL sanitization it
//! relies on, and [`config`] the TOML configuration consumed by the binary.

pub mod config;
pub mod feed;
pub mod util;
