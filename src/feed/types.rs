use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::util::redact_url;

/// Sentinel for status attributes a feed leaves out.
pub const UNKNOWN: &str = "Unknown";

/// Sentinel for build label/time attributes a feed leaves out.
pub const NOT_AVAILABLE: &str = "N/A";

/// Display name used when a configured feed has no `name`.
pub const UNNAMED_FEED: &str = "Unknown Feed";

/// One configured CCTray source.
///
/// Loaded from the `[[feeds]]` tables of the config file. Debug output
/// redacts credentials embedded in the URLs, and hides a URL entirely when
/// it cannot be parsed.
#[derive(Clone, Deserialize)]
pub struct FeedConfig {
    /// Display label, also used to attribute projects and errors.
    #[serde(default = "default_feed_name")]
    pub name: String,
    /// CCTray XML endpoint. An empty URL is reported as a configuration error.
    #[serde(default)]
    pub url: String,
    /// Public-facing base URL used to rewrite loopback hosts. Takes priority
    /// over the host of `url`.
    #[serde(default)]
    pub main_url: Option<String>,
    /// Projects whose names match this pattern are excluded.
    #[serde(default)]
    pub filter_regex: Option<String>,
}

fn default_feed_name() -> String {
    UNNAMED_FEED.to_string()
}

impl FeedConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            main_url: None,
            filter_regex: None,
        }
    }

    pub fn with_main_url(mut self, main_url: impl Into<String>) -> Self {
        self.main_url = Some(main_url.into());
        self
    }

    pub fn with_filter_regex(mut self, pattern: impl Into<String>) -> Self {
        self.filter_regex = Some(pattern.into());
        self
    }

    /// `main_url`, or `""` when unset.
    pub fn main_url(&self) -> &str {
        self.main_url.as_deref().unwrap_or("")
    }

    /// `filter_regex` when set to a non-empty pattern.
    pub fn filter_regex(&self) -> Option<&str> {
        self.filter_regex.as_deref().filter(|p| !p.is_empty())
    }
}

impl fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedConfig")
            .field("name", &self.name)
            .field("url", &redact_url(&self.url))
            .field(
                "main_url",
                &self.main_url.as_deref().map(redact_url),
            )
            .field("filter_regex", &self.filter_regex)
            .finish()
    }
}

/// One CI project reported by a feed.
///
/// Serialized with the CCTray attribute names (`lastBuildStatus`, `webUrl`,
/// ...) plus the `feedName`/`feedBaseUrl` provenance fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub activity: String,
    pub last_build_status: String,
    pub last_build_label: String,
    pub last_build_time: String,
    /// Sanitized; never carries credentials or token query parameters.
    pub web_url: String,
    pub category: String,
    pub feed_name: String,
    pub feed_base_url: String,
}

/// Merged outcome of one aggregation pass over all configured feeds.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationResult {
    /// Feed order, then document order within each feed.
    pub projects: Vec<Project>,
    /// When the pass was finalized.
    pub timestamp: DateTime<Utc>,
    /// One message per failed feed, in feed order. `None` when every feed
    /// succeeded.
    pub errors: Option<Vec<String>>,
    #[serde(skip)]
    unconfigured: bool,
}

impl AggregationResult {
    pub(crate) fn new(projects: Vec<Project>, errors: Vec<String>) -> Self {
        Self {
            projects,
            timestamp: Utc::now(),
            errors: (!errors.is_empty()).then_some(errors),
            unconfigured: false,
        }
    }

    pub(crate) fn no_feeds_configured() -> Self {
        Self {
            projects: Vec::new(),
            timestamp: Utc::now(),
            errors: Some(vec!["No CCTray feeds configured".to_string()]),
            unconfigured: true,
        }
    }

    /// True when the pass had no feeds to poll at all. Callers treat this
    /// as a bad-request outcome rather than a partial failure.
    pub fn is_unconfigured(&self) -> bool {
        self.unconfigured
    }

    /// Errors as a slice, empty when there were none.
    pub fn errors(&self) -> &[String] {
        self.errors.as_deref().unwrap_or_default()
    }
}
