use futures::stream::{self, StreamExt};
use std::time::Duration;
use thiserror::Error;

use super::fetcher::{fetch_feed, FeedSource, FetchError, DEFAULT_FETCH_TIMEOUT};
use super::filter::{apply_name_filter, FilterError};
use super::parser::{parse_cctray, ParseError};
use super::types::{AggregationResult, FeedConfig, Project};

/// Per-feed failure, rendered into [`AggregationResult::errors`].
///
/// The `Display` output is the exact message shown to users. None of the
/// variants include the feed URL.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed '{0}' has no URL configured")]
    MissingUrl(String),

    #[error("failed to fetch feed '{name}': {source}")]
    Fetch { name: String, source: FetchError },

    #[error("failed to parse feed '{name}': {source}")]
    Parse { name: String, source: ParseError },

    #[error("invalid filter_regex for feed '{name}': {source}")]
    Filter { name: String, source: FilterError },

    /// The feed's task died without producing an outcome.
    #[error("error processing feed '{name}': {detail}")]
    Processing { name: String, detail: String },
}

/// Tuning for one aggregation pass.
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Upper bound on each feed request, body included.
    pub fetch_timeout: Duration,
    /// How many feeds are fetched at once. Values below 1 are treated as 1.
    pub max_concurrent_fetches: usize,
    /// Log every parsed project (name and sanitized URL) at debug level.
    pub log_projects: bool,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_concurrent_fetches: 8,
            log_projects: false,
        }
    }
}

/// What one feed contributed to the pass. A feed with an invalid filter
/// still contributes its projects alongside the error.
#[derive(Debug, Default)]
struct FeedOutcome {
    projects: Vec<Project>,
    errors: Vec<FeedError>,
}

impl FeedOutcome {
    fn failed(error: FeedError) -> Self {
        Self {
            projects: Vec::new(),
            errors: vec![error],
        }
    }
}

/// Drives fetch → parse → filter for every configured feed and merges the
/// results.
///
/// Each feed runs in its own spawned task, so a panic or a slow server only
/// affects that feed. At most `max_concurrent_fetches` feeds are in flight
/// and outcomes are joined in feed order, which keeps projects ordered by
/// feed and then by position in the document.
#[derive(Debug, Clone)]
pub struct Aggregator<S> {
    source: S,
    options: AggregatorOptions,
}

impl<S> Aggregator<S>
where
    S: FeedSource + Clone + Send + Sync + 'static,
{
    pub fn new(source: S, options: AggregatorOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &AggregatorOptions {
        &self.options
    }

    /// Runs one aggregation pass over `feeds`.
    ///
    /// Never fails: every per-feed problem becomes one entry in
    /// [`AggregationResult::errors`]. With no feeds at all, the result is
    /// marked [`AggregationResult::is_unconfigured`].
    pub async fn aggregate(&self, feeds: &[FeedConfig]) -> AggregationResult {
        if feeds.is_empty() {
            tracing::warn!("No CCTray feeds configured");
            return AggregationResult::no_feeds_configured();
        }

        let concurrency = self.options.max_concurrent_fetches.max(1);

        let outcomes: Vec<FeedOutcome> = stream::iter(feeds.iter().cloned())
            .map(|feed| {
                let source = self.source.clone();
                let options = self.options.clone();
                let name = feed.name.clone();
                let task = tokio::spawn(async move { process_feed(&source, &feed, &options).await });

                async move {
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::error!(feed = %name, error = %e, "Feed task failed");
                            FeedOutcome::failed(FeedError::Processing {
                                name,
                                detail: join_error_detail(e),
                            })
                        }
                    }
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut projects = Vec::new();
        let mut errors = Vec::new();
        for outcome in outcomes {
            projects.extend(outcome.projects);
            errors.extend(outcome.errors.iter().map(ToString::to_string));
        }

        tracing::info!(
            feeds = feeds.len(),
            projects = projects.len(),
            errors = errors.len(),
            "Aggregation pass complete"
        );

        AggregationResult::new(projects, errors)
    }
}

async fn process_feed<S: FeedSource + Sync>(
    source: &S,
    feed: &FeedConfig,
    options: &AggregatorOptions,
) -> FeedOutcome {
    if feed.url.is_empty() {
        tracing::warn!(feed = %feed.name, "Feed has no URL configured");
        return FeedOutcome::failed(FeedError::MissingUrl(feed.name.clone()));
    }

    let xml = match fetch_feed(source, &feed.url, options.fetch_timeout).await {
        Ok(xml) => xml,
        Err(e) => {
            tracing::warn!(feed = %feed.name, error = %e, "Failed to fetch CCTray feed");
            return FeedOutcome::failed(FeedError::Fetch {
                name: feed.name.clone(),
                source: e,
            });
        }
    };

    let projects = match parse_cctray(&xml, &feed.name, &feed.url, feed.main_url()) {
        Ok(projects) => projects,
        Err(e) => {
            tracing::warn!(feed = %feed.name, error = %e, "Failed to parse CCTray XML");
            return FeedOutcome::failed(FeedError::Parse {
                name: feed.name.clone(),
                source: e,
            });
        }
    };

    if options.log_projects {
        for project in &projects {
            tracing::debug!(
                feed = %feed.name,
                project = %project.name,
                web_url = %project.web_url,
                "Parsed project"
            );
        }
    }

    let before = projects.len();
    let (projects, filter_error) = apply_name_filter(projects, feed.filter_regex());
    let errors = match filter_error {
        Some(e) => {
            tracing::warn!(feed = %feed.name, error = %e, "Invalid filter_regex, keeping all projects");
            vec![FeedError::Filter {
                name: feed.name.clone(),
                source: e,
            }]
        }
        None => {
            if before != projects.len() {
                tracing::debug!(
                    feed = %feed.name,
                    excluded = before - projects.len(),
                    "Applied name filter"
                );
            }
            Vec::new()
        }
    };

    FeedOutcome { projects, errors }
}

fn join_error_detail(e: tokio::task::JoinError) -> String {
    if !e.is_panic() {
        return "task was cancelled".to_string();
    }
    let payload = e.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
