//! Population statistics for observability.

use crate::types::{Mood, Species};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running min/mean/max of one scalar
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub min: f32,
    pub mean: f32,
    pub max: f32,
}

impl Summary {
    /// Fold in the `n`-th sample (1-based) using an incremental mean
    fn update(&mut self, value: f32, n: u32) {
        if n == 1 {
            *self = Summary {
                min: value,
                mean: value,
                max: value,
            };
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.mean += (value - self.mean) / n as f32;
    }
}

/// Snapshot of the live population at one tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopulationStats {
    pub tick: u64,
    pub population: u32,
    pub species: BTreeMap<String, u32>,
    pub moods: BTreeMap<String, u32>,
    pub mutated: u32,
    pub constricted: u32,
    pub energy: Summary,
    pub stress: Summary,
}

impl PopulationStats {
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Default::default()
        }
    }

    /// Add one live creature to the statistics
    pub fn record(
        &mut self,
        species: Species,
        mood: Mood,
        energy: f32,
        stress: f32,
        constricted: bool,
        mutated: bool,
    ) {
        self.population += 1;
        *self.species.entry(species.as_str().to_string()).or_insert(0) += 1;
        *self.moods.entry(mood.as_str().to_string()).or_insert(0) += 1;
        if mutated {
            self.mutated += 1;
        }
        if constricted {
            self.constricted += 1;
        }
        self.energy.update(energy, self.population);
        self.stress.update(stress, self.population);
    }

    pub fn mood_count(&self, mood: Mood) -> u32 {
        self.moods.get(mood.as_str()).copied().unwrap_or(0)
    }
}

/// Event counters accumulated over a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub births: u64,
    pub deaths: u64,
    pub respawns: u64,
    pub resources_consumed: u64,
    pub mutations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_stats_record() {
        let mut stats = PopulationStats::new(3);
        stats.record(Species::A, Mood::Happy, 8.0, 0.1, false, false);
        stats.record(Species::B, Mood::Angry, 2.0, 0.9, true, true);
        stats.record(Species::A, Mood::Neutral, 5.0, 0.2, false, false);

        assert_eq!(stats.tick, 3);
        assert_eq!(stats.population, 3);
        assert_eq!(stats.species.get("a"), Some(&2));
        assert_eq!(stats.mood_count(Mood::Angry), 1);
        assert_eq!(stats.mood_count(Mood::Stressed), 0);
        assert_eq!(stats.mutated, 1);
        assert_eq!(stats.constricted, 1);
        assert_eq!(stats.energy.min, 2.0);
        assert_eq!(stats.energy.max, 8.0);
        assert!((stats.energy.mean - 5.0).abs() < 1e-5);
        assert!((stats.stress.mean - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_empty_stats() {
        let stats = PopulationStats::new(0);
        assert_eq!(stats.population, 0);
        assert_eq!(stats.energy, Summary::default());
    }
}
