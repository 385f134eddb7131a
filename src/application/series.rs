use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Family, SeriesKey};
use crate::ports::SeriesSink;

/// Tracks which rows are exported and the poll cycle that last wrote them.
///
/// Rows are written with the current generation during a cycle. Closing the
/// cycle removes from the sink every row left on an older generation, then
/// advances the generation. A row therefore stays exported exactly as long
/// as its container keeps being observed.
pub struct SeriesRegistry {
    sink: Arc<dyn SeriesSink>,
    generations: HashMap<Family, HashMap<SeriesKey, u64>>,
    generation: u64,
}

impl SeriesRegistry {
    pub fn new(sink: Arc<dyn SeriesSink>) -> Self {
        Self {
            sink,
            generations: HashMap::new(),
            generation: 0,
        }
    }

    /// Id of the cycle currently being written
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Write a row and mark it as seen in the current cycle
    pub fn upsert(&mut self, key: SeriesKey, value: f64) {
        self.sink.write(&key, value);
        self.generations
            .entry(key.family())
            .or_default()
            .insert(key, self.generation);
    }

    /// Remove every row not written during the current cycle, then start the
    /// next one. Returns the number of rows removed.
    pub fn evict_stale(&mut self) -> usize {
        let current = self.generation;
        let mut evicted = 0;

        for rows in self.generations.values_mut() {
            let stale: Vec<SeriesKey> = rows
                .iter()
                .filter(|(_, seen)| **seen < current)
                .map(|(key, _)| key.clone())
                .collect();

            for key in stale {
                self.sink.remove(&key);
                rows.remove(&key);
                evicted += 1;
            }
        }

        self.generations.retain(|_, rows| !rows.is_empty());
        self.generation += 1;
        evicted
    }

    /// Number of tracked rows across all families
    pub fn len(&self) -> usize {
        self.generations.values().map(HashMap::len).sum()
    }
}
