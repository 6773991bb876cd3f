//! Category → source-feed mapping, fixed at process start.
use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::config::CategoryConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown category: {0}")]
    NotFound(String),
}

/// A named topic bucket and its ordered source feed URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub sources: Vec<String>,
}

/// One source in iteration order, tagged with the category that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub category: String,
    pub url: String,
}

/// Immutable category registry with case-insensitive lookup.
///
/// Categories keep their configured order; that order drives both the
/// status listing and aggregate iteration.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    categories: Vec<Category>,
    index: HashMap<String, usize>,
}

impl CategoryRegistry {
    pub fn new(categories: Vec<Category>) -> Self {
        let index = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (normalize(&c.name), i))
            .collect();
        Self { categories, index }
    }

    pub fn from_config(categories: &[CategoryConfig]) -> Self {
        Self::new(
            categories
                .iter()
                .map(|c| Category {
                    name: c.name.trim().to_string(),
                    sources: c.sources.clone(),
                })
                .collect(),
        )
    }

    /// Looks up a category by name, ignoring case and surrounding whitespace.
    pub fn lookup(&self, name: &str) -> Result<&Category, RegistryError> {
        self.index
            .get(&normalize(name))
            .map(|&i| &self.categories[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Sources of one category, in configured order.
    pub fn sources_for(&self, name: &str) -> Result<Vec<SourceRef>, RegistryError> {
        let category = self.lookup(name)?;
        Ok(category
            .sources
            .iter()
            .map(|url| SourceRef {
                category: category.name.clone(),
                url: url.clone(),
            })
            .collect())
    }

    /// Union of every category's sources: categories in order, sources in
    /// order, a URL listed twice keeps its first owner.
    pub fn all_sources(&self) -> Vec<SourceRef> {
        let mut seen = HashSet::new();
        self.categories
            .iter()
            .flat_map(|c| {
                c.sources.iter().map(move |url| SourceRef {
                    category: c.name.clone(),
                    url: url.clone(),
                })
            })
            .filter(|s| seen.insert(s.url.clone()))
            .collect()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
