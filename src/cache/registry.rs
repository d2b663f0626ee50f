//! Generation registry.
//!
//! Tracks which generation is live and computes the sweep set for
//! activation. Deletion always acts on whole generations.

use std::collections::HashSet;

use crate::domain::Generation;

#[derive(Debug, Clone)]
pub struct GenerationRegistry {
    current: Generation,
}

impl GenerationRegistry {
    pub fn new(current: Generation) -> Self {
        Self { current }
    }

    pub fn current(&self) -> &Generation {
        &self.current
    }

    pub fn is_current(&self, generation: &Generation) -> bool {
        generation == &self.current
    }

    /// `present − {current}`, in the order the store reported them.
    pub fn stale<'a, I>(&self, present: I) -> Vec<Generation>
    where
        I: IntoIterator<Item = &'a Generation>,
    {
        let mut seen = HashSet::new();
        present
            .into_iter()
            .filter(|generation| !self.is_current(generation))
            .filter(|generation| seen.insert((*generation).clone()))
            .cloned()
            .collect()
    }
}
