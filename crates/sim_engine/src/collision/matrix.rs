//! The collision matrix: which categories are tested against which
//!
//! Stored as directed entries because that is how designers think ("bullets
//! hit asteroids"), but evaluated as unordered pairs: a relationship listed
//! from both sides is still scanned exactly once per tick.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::entity::Category;

/// Data-defined table of category relationships
///
/// Deserializable from config files so categories and relationships can be
/// reconfigured without touching the scan algorithm. Backed by `BTreeMap`
/// so pair iteration order is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollisionMatrix {
    tests: BTreeMap<Category, BTreeSet<Category>>,
}

impl CollisionMatrix {
    /// Create a matrix with no relationships
    pub fn empty() -> Self {
        Self {
            tests: BTreeMap::new(),
        }
    }

    /// The classic asteroids table
    ///
    /// Deliberately lists the bullet/asteroid relationship from both sides;
    /// the scan must still emit one event per physical pair.
    pub fn classic() -> Self {
        let mut matrix = Self::empty();
        matrix.add(Category::Player, Category::Asteroid);
        matrix.add(Category::Player, Category::Enemy);
        matrix.add(Category::Player, Category::Powerup);
        matrix.add(Category::Bullet, Category::Asteroid);
        matrix.add(Category::Bullet, Category::Enemy);
        matrix.add(Category::Asteroid, Category::Bullet);
        matrix.add(Category::Asteroid, Category::Player);
        matrix
    }

    /// Add a directed entry: `from` is tested against `against`
    pub fn add(&mut self, from: Category, against: Category) {
        self.tests.entry(from).or_default().insert(against);
    }

    /// Builder-style [`add`](Self::add)
    #[must_use]
    pub fn with(mut self, from: Category, against: Category) -> Self {
        self.add(from, against);
        self
    }

    /// Whether two categories are related, in either direction
    pub fn relates(&self, a: Category, b: Category) -> bool {
        let directed = |x: Category, y: Category| {
            self.tests.get(&x).is_some_and(|set| set.contains(&y))
        };
        directed(a, b) || directed(b, a)
    }

    /// Every unordered category pair, each exactly once
    ///
    /// Pairs are ordered `(min, max)` and sorted, regardless of how many
    /// directed entries reference them.
    pub fn unordered_pairs(&self) -> Vec<(Category, Category)> {
        let mut pairs = BTreeSet::new();
        for (&from, against) in &self.tests {
            for &other in against {
                let pair = if from <= other {
                    (from, other)
                } else {
                    (other, from)
                };
                pairs.insert(pair);
            }
        }
        pairs.into_iter().collect()
    }

    /// Number of directed entries (for diagnostics)
    pub fn directed_entry_count(&self) -> usize {
        self.tests.values().map(BTreeSet::len).sum()
    }
}

impl Default for CollisionMatrix {
    fn default() -> Self {
        Self::classic()
    }
}
