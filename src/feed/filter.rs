use regex::Regex;
use thiserror::Error;

use super::types::Project;

/// A feed's `filter_regex` could not be compiled.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct FilterError(#[from] regex::Error);

/// Excludes projects whose name matches a pattern.
///
/// The match is unanchored: a project is dropped when the pattern matches
/// anywhere in its name. An empty pattern keeps every project.
#[derive(Debug, Clone)]
pub struct NameFilter {
    pattern: Option<Regex>,
}

impl NameFilter {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the pattern is not a valid regular expression.
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        let pattern = if pattern.is_empty() {
            None
        } else {
            Some(Regex::new(pattern)?)
        };
        Ok(Self { pattern })
    }

    /// True when `name` is kept by this filter.
    pub fn keeps(&self, name: &str) -> bool {
        self.pattern.as_ref().map_or(true, |re| !re.is_match(name))
    }

    /// Drops every excluded project, keeping the order of the rest.
    pub fn apply(&self, projects: Vec<Project>) -> Vec<Project> {
        if self.pattern.is_none() {
            return projects;
        }
        projects.into_iter().filter(|p| self.keeps(&p.name)).collect()
    }
}

/// Applies an optional exclusion pattern to `projects`.
///
/// `None` or an empty pattern returns the input unchanged. An invalid
/// pattern also returns every project, unfiltered, alongside the compile
/// error so the caller can report it.
pub fn apply_name_filter(
    projects: Vec<Project>,
    pattern: Option<&str>,
) -> (Vec<Project>, Option<FilterError>) {
    let Some(pattern) = pattern else {
        return (projects, None);
    };
    match NameFilter::new(pattern) {
        Ok(filter) => (filter.apply(projects), None),
        Err(e) => (projects, Some(e)),
    }
}
