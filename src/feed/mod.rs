//! CCTray feed pipeline: fetch → parse → sanitize → filter → aggregate.
//!
//! - **Fetching**: bounded-time HTTP retrieval of one feed's XML
//! - **Parsing**: CCTray `<Project>` elements into [`Project`] records with
//!   sanitized URLs and per-feed provenance
//! - **Filtering**: optional per-feed regex that excludes projects by name
//! - **Aggregation**: concurrent per-feed processing merged into one
//!   [`AggregationResult`], with one error message per failing feed
//!
//! # Architecture
//!
//! - [`parser`] - CCTray XML parsing using `quick-xml`
//! - [`fetcher`] - HTTP retrieval behind the [`FeedSource`] trait
//! - [`filter`] - Name exclusion using `regex`
//! - [`aggregator`] - Orchestration and error isolation
//!
//! # Example
//!
//! ```no_run
//! use cctray_monitor::feed::{Aggregator, AggregatorOptions, FeedConfig};
//!
//! # async fn example() {
//! let feeds = vec![FeedConfig::new("TeamCity", "https://ci.example.com/cctray.xml")];
//! let aggregator = Aggregator::new(reqwest::Client::new(), AggregatorOptions::default());
//! let result = aggregator.aggregate(&feeds).await;
//! println!("{} projects, {} errors", result.projects.len(), result.errors().len());
//! # }
//! ```

pub mod aggregator;
pub mod fetcher;
pub mod filter;
pub mod parser;
mod types;

pub use aggregator::{Aggregator, AggregatorOptions, FeedError};
pub use fetcher::{fetch_feed, FeedSource, FetchError, DEFAULT_FETCH_TIMEOUT};
pub use filter::{apply_name_filter, FilterError, NameFilter};
pub use parser::{parse_cctray, ParseError};
pub use types::{AggregationResult, FeedConfig, Project, NOT_AVAILABLE, UNKNOWN, UNNAMED_FEED};
