//! Mapping from repository identifiers to storage locations
//!
//! An embedding application decides where each repository lives; the core
//! only asks for a [`Location`] through [`RepositoryLocator`].

use crate::artifacts::core::error::KnotError;
use derive_new::new;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Location {
    /// Working directory root (the parent of `.knot`)
    pub root: PathBuf,
    /// Remote store the repository syncs with, if any
    pub remote: Option<PathBuf>,
}

pub trait RepositoryLocator: Send + Sync {
    fn locate(&self, repository_id: &str) -> anyhow::Result<Location>;
}

/// In-memory locator, filled up front
#[derive(Debug, Default, Clone)]
pub struct StaticLocator {
    locations: HashMap<String, Location>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, repository_id: impl Into<String>, location: Location) -> Self {
        self.locations.insert(repository_id.into(), location);
        self
    }
}

impl RepositoryLocator for StaticLocator {
    fn locate(&self, repository_id: &str) -> anyhow::Result<Location> {
        self.locations
            .get(repository_id)
            .cloned()
            .ok_or_else(|| KnotError::NotARepository(PathBuf::from(repository_id)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ids_resolve_and_unknown_ids_fail() {
        let location = Location::new(PathBuf::from("/srv/a"), Some(PathBuf::from("/srv/remote")));
        let locator = StaticLocator::new().with("a", location.clone());

        pretty_assertions::assert_eq!(locator.locate("a").unwrap(), location);
        assert!(matches!(
            locator.locate("b").unwrap_err().downcast_ref::<KnotError>(),
            Some(KnotError::NotARepository(_))
        ));
    }
}
