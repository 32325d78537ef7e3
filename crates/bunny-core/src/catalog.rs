//! The fixed set of projects tickets can be filed against

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::ValidationError;

/// Projects wired to an IFTTT applet out of the box
pub const DEFAULT_PROJECTS: &[&str] = &[
    "maneko",
    "mobile2020",
    "online2020",
    "wallet",
    "micraft",
    "essencex",
];

/// A project identifier known to be in the catalog.
///
/// Only [`ProjectCatalog::lookup`] hands these out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCatalog {
    projects: BTreeSet<String>,
}

impl ProjectCatalog {
    pub fn new<I, S>(projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            projects: projects.into_iter().map(Into::into).collect(),
        }
    }

    pub fn lookup(&self, candidate: &str) -> Result<ProjectId, ValidationError> {
        if self.projects.contains(candidate) {
            Ok(ProjectId(candidate.to_string()))
        } else {
            Err(ValidationError::InvalidProject {
                project: candidate.to_string(),
            })
        }
    }

    pub fn contains(&self, candidate: &str) -> bool {
        self.projects.contains(candidate)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.projects.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

impl Default for ProjectCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECTS.iter().copied())
    }
}
