//! Predicates selecting which registered checks run in an evaluation

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

type Predicate = dyn Fn(&str, &BTreeSet<String>) -> bool + Send + Sync;

/// Selects checks by name and tags
#[derive(Clone, Default)]
pub enum Selector {
    /// Every registered check
    #[default]
    All,
    /// Checks whose name is listed, or that carry at least one listed tag
    Matching {
        names: BTreeSet<String>,
        tags: BTreeSet<String>,
    },
    /// Arbitrary predicate over `(name, tags)`
    Predicate(Arc<Predicate>),
}

impl Selector {
    pub fn name(name: impl Into<String>) -> Self {
        Selector::Matching {
            names: BTreeSet::from([name.into()]),
            tags: BTreeSet::new(),
        }
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Selector::Matching {
            names: BTreeSet::new(),
            tags: BTreeSet::from([tag.into()]),
        }
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str, &BTreeSet<String>) -> bool + Send + Sync + 'static,
    {
        Selector::Predicate(Arc::new(f))
    }

    /// Build from optional name and tag filters
    ///
    /// Empty filters select everything.
    pub fn from_filters<N, T>(names: N, tags: T) -> Self
    where
        N: IntoIterator<Item = String>,
        T: IntoIterator<Item = String>,
    {
        let names: BTreeSet<String> = names.into_iter().collect();
        let tags: BTreeSet<String> = tags.into_iter().collect();
        if names.is_empty() && tags.is_empty() {
            Selector::All
        } else {
            Selector::Matching { names, tags }
        }
    }

    pub fn matches(&self, name: &str, tags: &BTreeSet<String>) -> bool {
        match self {
            Selector::All => true,
            Selector::Matching {
                names,
                tags: wanted,
            } => names.contains(name) || !wanted.is_disjoint(tags),
            Selector::Predicate(f) => f(name, tags),
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => write!(f, "All"),
            Selector::Matching { names, tags } => f
                .debug_struct("Matching")
                .field("names", names)
                .field("tags", tags)
                .finish(),
            Selector::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}
