//! Creature state and the per-tick update rule.

use mind_core::{
    AgentId, Climate, ConstrictedMovement, DeathPolicy, Mood, Position, ResponsePolicy, SimConfig,
    Species, ZoneType,
};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What a creature can see and touch while it updates.
///
/// Implemented by the population manager over the live environment; movement
/// and consumption take effect immediately so later creatures in the same
/// pass observe them.
pub trait Habitat {
    /// Grid dimensions `(width, height)`
    fn bounds(&self) -> (i32, i32);
    /// Zone under `pos`; cells outside the grid read as obstacles
    fn zone_at(&self, pos: Position) -> ZoneType;
    fn climate(&self) -> Climate;
    /// Whether `mover` may step onto `pos`: in bounds, not an obstacle, and
    /// not held by any other creature or reserved newborn
    fn is_free(&self, pos: Position, mover: AgentId) -> bool;
    fn relocate(&mut self, id: AgentId, from: Position, to: Position);
    /// Release the cell of a creature that died this tick
    fn vacate(&mut self, id: AgentId, pos: Position);
    /// Resource to walk toward: a remembered one still present, else the nearest
    fn forage_target(&self, from: Position, memory: &[Position]) -> Option<Position>;
    /// Remove the resource at `pos`; false if it is already gone
    fn consume_resource(&mut self, pos: Position) -> bool;
    fn is_regen_zone(&self, pos: Position) -> bool;
    /// Reserve a free cell next to `near` for an offspring, if any
    fn reserve_birth_cell(&mut self, near: Position) -> Option<Position>;
}

/// Frozen view of a neighbour, taken before the pass starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborView {
    pub id: AgentId,
    pub position: Position,
    pub stress: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    OldAge,
    Starvation,
}

/// Offspring queued by a parent; admitted after the pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BirthIntent {
    pub parent: AgentId,
    pub species: Species,
    pub position: Position,
    pub energy: f32,
    pub habituation_rate: f32,
    pub inhibition: f32,
    pub mutated_at_birth: bool,
}

/// Everything observable that one update did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOutcome {
    pub died: Option<DeathCause>,
    pub respawned: Option<DeathCause>,
    pub moved_from: Option<Position>,
    pub consumed: Option<Position>,
    pub birth: Option<BirthIntent>,
    pub mutated: bool,
}

/// A creature in the simulation
#[derive(Debug, Clone)]
pub struct Creature {
    pub id: AgentId,
    pub position: Position,
    pub species: Species,
    pub energy: f32,
    pub stress: f32,
    pub response: f32,
    pub habituation_rate: f32,
    pub inhibition: f32,
    pub disinhibited: bool,
    pub constricted: bool,
    pub mood: Mood,
    pub age: u64,
    pub lifespan: u64,
    pub alive: bool,
    pub birth_tick: u64,
    pub offspring_count: u32,
    /// Positions of consumed resources, oldest first
    pub memory: Vec<Position>,
    pub mutation_counter: u32,
    pub mutated: bool,
    pub energy_history: VecDeque<f32>,
    pub stress_history: VecDeque<f32>,
}

impl Creature {
    /// A fresh creature with random energy and lifespan
    pub fn new(
        id: AgentId,
        position: Position,
        species: Species,
        birth_tick: u64,
        config: &SimConfig,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let energy = rng.gen_range(config.energy.initial_energy_min..=config.energy.initial_energy_max);
        let lifespan = rng.gen_range(config.behavior.lifespan_min..=config.behavior.lifespan_max);

        Self {
            id,
            position,
            species,
            energy,
            stress: 0.0,
            response: config.behavior.initial_response,
            habituation_rate: config.behavior.habituation_rate,
            inhibition: config.behavior.inhibition,
            disinhibited: false,
            constricted: false,
            mood: Mood::classify(0.0, energy),
            age: 0,
            lifespan,
            alive: true,
            birth_tick,
            offspring_count: 0,
            memory: Vec::new(),
            mutation_counter: 0,
            mutated: false,
            energy_history: VecDeque::with_capacity(config.behavior.history_len),
            stress_history: VecDeque::with_capacity(config.behavior.history_len),
        }
    }

    /// Materialise a queued offspring
    pub fn offspring(
        id: AgentId,
        intent: &BirthIntent,
        birth_tick: u64,
        config: &SimConfig,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut child = Self::new(id, intent.position, intent.species, birth_tick, config, rng);
        child.energy = intent.energy;
        child.habituation_rate = intent.habituation_rate;
        child.inhibition = intent.inhibition;
        child.mood = Mood::classify(child.stress, child.energy);
        child
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Run one tick of the update rule.
    ///
    /// Step order matters: each stage reads what the previous ones wrote.
    /// Dead creatures are left untouched.
    pub fn update<H: Habitat>(
        &mut self,
        neighbors: &[NeighborView],
        habitat: &mut H,
        config: &SimConfig,
        rng: &mut ChaCha8Rng,
    ) -> AgentOutcome {
        let mut outcome = AgentOutcome::default();
        if !self.alive {
            return outcome;
        }

        // Aging and death
        self.age += 1;
        if let Some(cause) = self.death_cause(config) {
            match config.features.death_policy {
                DeathPolicy::Remove => {
                    self.alive = false;
                    habitat.vacate(self.id, self.position);
                    outcome.died = Some(cause);
                }
                DeathPolicy::RespawnInPlace => {
                    self.respawn(config, rng);
                    outcome.respawned = Some(cause);
                }
            }
            return outcome;
        }

        self.apply_environment(habitat, config);
        self.habituate(config);
        self.absorb_neighbor_stress(neighbors, config);

        // Noise
        let amplitude = config.behavior.fluctuation_amplitude;
        self.stress = (self.stress + rng.gen_range(-amplitude..=amplitude)).clamp(0.0, 1.0);

        self.constricted = self.stress > config.behavior.constriction_threshold;
        if rng.gen::<f32>() < config.behavior.disinhibition_toggle_chance {
            self.disinhibited = !self.disinhibited;
        }

        self.energy = (self.energy - config.energy.drain_per_tick).max(0.0);

        let start = self.position;
        let target = if self.energy < config.energy.low_energy_threshold {
            let memory: &[Position] = if config.features.memory { &self.memory } else { &[] };
            habitat.forage_target(self.position, memory)
        } else {
            None
        };
        match target {
            Some(target) => outcome.consumed = self.forage(target, habitat, config),
            None => self.wander(habitat, config, rng),
        }
        if self.position != start {
            outcome.moved_from = Some(start);
        }

        if config.features.regen_zones && habitat.is_regen_zone(self.position) {
            self.gain_energy(config.energy.regen_zone_trickle, config);
        }

        if config.features.reproduction {
            outcome.birth = self.try_reproduce(habitat, config, rng);
        }

        self.mood = Mood::classify(self.stress, self.energy);

        if config.features.stress_mutation {
            outcome.mutated = self.track_stress_mutation(config, rng);
        }

        self.record_history(config.behavior.history_len);

        outcome
    }

    fn death_cause(&self, config: &SimConfig) -> Option<DeathCause> {
        if config.features.aging && self.age > self.lifespan {
            Some(DeathCause::OldAge)
        } else if self.energy <= 0.0 {
            Some(DeathCause::Starvation)
        } else {
            None
        }
    }

    /// Reset in place with fresh random state; id and position are kept
    fn respawn(&mut self, config: &SimConfig, rng: &mut ChaCha8Rng) {
        self.energy = rng.gen_range(config.energy.initial_energy_min..=config.energy.initial_energy_max);
        self.lifespan = rng.gen_range(config.behavior.lifespan_min..=config.behavior.lifespan_max);
        self.age = 0;
        self.stress = 0.0;
        self.response = config.behavior.initial_response;
        self.disinhibited = false;
        self.constricted = false;
        self.mutation_counter = 0;
        self.mood = Mood::classify(self.stress, self.energy);
    }

    /// Zone, weather, season and day phase deltas, then clamping
    fn apply_environment<H: Habitat>(&mut self, habitat: &H, config: &SimConfig) {
        if config.features.zones {
            let delta = config.effects.zone(habitat.zone_at(self.position), self.species);
            self.stress += delta.stress;
            self.energy += delta.energy;
        }
        if config.features.climate {
            let delta = config.effects.climate(&habitat.climate());
            self.stress += delta.stress;
            self.energy += delta.energy;
        }
        self.stress = self.stress.clamp(0.0, 1.0);
        self.energy = self.energy.clamp(0.0, config.energy.max_energy);
    }

    fn habituate(&mut self, config: &SimConfig) {
        self.response *= self.habituation_rate;
        if !self.disinhibited {
            self.response -= self.inhibition;
        }
        if config.behavior.response_policy == ResponsePolicy::ClampAtZero {
            self.response = self.response.max(0.0);
        }
    }

    /// Linear pull toward the neighbourhood mean stress
    fn absorb_neighbor_stress(&mut self, neighbors: &[NeighborView], config: &SimConfig) {
        if neighbors.is_empty() {
            return;
        }
        let mean = neighbors.iter().map(|n| n.stress).sum::<f32>() / neighbors.len() as f32;
        self.stress += (mean - self.stress) * config.behavior.contagion_factor;
    }

    /// Greedy step toward `target`, consuming it on arrival
    fn forage<H: Habitat>(&mut self, target: Position, habitat: &mut H, config: &SimConfig) -> Option<Position> {
        let (width, height) = habitat.bounds();
        let next = self.position.step_toward(&target).clamp(width, height);
        if next != self.position && habitat.is_free(next, self.id) {
            habitat.relocate(self.id, self.position, next);
            self.position = next;
        }

        if self.position == target && habitat.consume_resource(target) {
            self.gain_energy(config.energy.resource_recharge, config);
            if config.features.memory {
                self.remember(target, config.behavior.memory_capacity);
            }
            return Some(target);
        }
        None
    }

    /// Bounded random walk; constricted creatures freeze or only move vertically
    fn wander<H: Habitat>(&mut self, habitat: &mut H, config: &SimConfig, rng: &mut ChaCha8Rng) {
        if !self.constricted {
            for _ in 0..config.behavior.random_move_attempts {
                let dx = rng.gen_range(-1..=1);
                let dy = rng.gen_range(-1..=1);
                if self.try_step(dx, dy, habitat) {
                    break;
                }
            }
            return;
        }

        match config.behavior.constricted_movement {
            ConstrictedMovement::Frozen => {}
            ConstrictedMovement::VerticalOnly => {
                let dy = if rng.gen::<bool>() { 1 } else { -1 };
                self.try_step(0, dy, habitat);
            }
        }
    }

    /// Attempt a single step. Staying put counts as accepted.
    fn try_step<H: Habitat>(&mut self, dx: i32, dy: i32, habitat: &mut H) -> bool {
        let (width, height) = habitat.bounds();
        let next = self.position.add(dx, dy).clamp(width, height);
        if next == self.position {
            return true;
        }
        if !habitat.is_free(next, self.id) {
            return false;
        }
        habitat.relocate(self.id, self.position, next);
        self.position = next;
        true
    }

    fn try_reproduce<H: Habitat>(
        &mut self,
        habitat: &mut H,
        config: &SimConfig,
        rng: &mut ChaCha8Rng,
    ) -> Option<BirthIntent> {
        if self.energy < config.energy.min_reproduce_energy
            || self.stress > config.behavior.max_reproduce_stress
        {
            return None;
        }
        if rng.gen::<f32>() >= config.behavior.reproduce_chance {
            return None;
        }

        let position = habitat.reserve_birth_cell(self.position)?;

        // Each side gets half of what is left after the cost
        let share = ((self.energy - config.energy.reproduce_cost) / 2.0).max(0.0);
        self.energy = share;
        self.offspring_count += 1;

        let mut habituation_rate = self.habituation_rate;
        let mut inhibition = self.inhibition;
        let mutated_at_birth = rng.gen::<f32>() < config.mutation.birth_mutation_chance;
        if mutated_at_birth {
            habituation_rate = perturb(
                habituation_rate,
                config.mutation.habituation_step,
                config.mutation.habituation_bounds,
                rng,
            );
            inhibition = perturb(
                inhibition,
                config.mutation.inhibition_step,
                config.mutation.inhibition_bounds,
                rng,
            );
        }

        Some(BirthIntent {
            parent: self.id,
            species: self.species,
            position,
            energy: share,
            habituation_rate,
            inhibition,
            mutated_at_birth,
        })
    }

    /// Count sustained high stress; mutate once when the counter passes the threshold.
    ///
    /// Returns true on the tick the mutation fires.
    fn track_stress_mutation(&mut self, config: &SimConfig, rng: &mut ChaCha8Rng) -> bool {
        let mutation = &config.mutation;
        if self.stress <= mutation.stress_threshold {
            self.mutation_counter = self.mutation_counter.saturating_sub(mutation.counter_decay);
            return false;
        }

        self.mutation_counter = self.mutation_counter.saturating_add(1);
        if self.mutated || self.mutation_counter <= mutation.counter_threshold {
            return false;
        }

        self.habituation_rate = perturb(
            self.habituation_rate,
            mutation.habituation_step,
            mutation.habituation_bounds,
            rng,
        );
        self.inhibition = perturb(self.inhibition, mutation.inhibition_step, mutation.inhibition_bounds, rng);
        self.mutated = true;
        true
    }

    fn gain_energy(&mut self, amount: f32, config: &SimConfig) {
        self.energy = (self.energy + amount).min(config.energy.max_energy);
    }

    fn remember(&mut self, pos: Position, capacity: usize) {
        if capacity == 0 || self.memory.contains(&pos) {
            return;
        }
        if self.memory.len() >= capacity {
            self.memory.remove(0);
        }
        self.memory.push(pos);
    }

    fn record_history(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        for (history, value) in [
            (&mut self.energy_history, self.energy),
            (&mut self.stress_history, self.stress),
        ] {
            if history.len() >= len {
                history.pop_front();
            }
            history.push_back(value);
        }
    }
}

/// Shift `value` by a random magnitude in `step`, in a random direction.
///
/// The direction flips if the shifted value would leave `bounds`, so the
/// result always differs from the input when the bounds are wide enough.
pub fn perturb(value: f32, step: (f32, f32), bounds: (f32, f32), rng: &mut ChaCha8Rng) -> f32 {
    let magnitude = rng.gen_range(step.0..=step.1);
    let sign = if rng.gen::<bool>() { 1.0 } else { -1.0 };
    let (lo, hi) = bounds;

    let candidate = value + sign * magnitude;
    let shifted = if (lo..=hi).contains(&candidate) {
        candidate
    } else {
        value - sign * magnitude
    };
    shifted.clamp(lo, hi)
}
