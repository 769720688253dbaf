//! Population manager: the live creature collection, occupancy and the
//! snapshot/commit cycle around each tick.

use crate::agent::{AgentOutcome, BirthIntent, Creature, Habitat, NeighborView};
use crate::environment::{nearest, Environment};
use crate::event::TickEvent;
use mind_core::{
    AgentId, Climate, Direction, Error, Position, Result, SimConfig, Species, ZoneType,
};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Hands out creature ids; never reuses one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub fn allocate(&mut self) -> AgentId {
        let id = AgentId(self.next);
        self.next += 1;
        id
    }

    /// Make sure future ids are greater than `max`
    pub fn reseed_past(&mut self, max: AgentId) {
        self.next = self.next.max(max.0 + 1);
    }

    pub fn peek(&self) -> AgentId {
        AgentId(self.next)
    }
}

/// Who holds a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
    Agent(AgentId),
    /// Reserved for an offspring admitted at commit
    Newborn,
}

/// Everything a pass produced that still has to be applied
#[derive(Debug, Default)]
pub struct Pass {
    pub events: Vec<TickEvent>,
    pub births: Vec<BirthIntent>,
}

impl Pass {
    fn record(&mut self, creature: &Creature, outcome: AgentOutcome) {
        if let Some(cause) = outcome.died {
            debug!(id = %creature.id, x = creature.position.x, y = creature.position.y, ?cause, "Creature died");
            self.events.push(TickEvent::Died {
                id: creature.id,
                position: creature.position,
                cause,
            });
        }
        if let Some(cause) = outcome.respawned {
            debug!(id = %creature.id, ?cause, "Creature respawned in place");
            self.events.push(TickEvent::Respawned {
                id: creature.id,
                position: creature.position,
                cause,
            });
        }
        if let Some(position) = outcome.consumed {
            self.events.push(TickEvent::Consumed {
                id: creature.id,
                position,
            });
        }
        if outcome.mutated {
            debug!(
                id = %creature.id,
                habituation_rate = creature.habituation_rate,
                inhibition = creature.inhibition,
                "Creature mutated under sustained stress"
            );
            self.events.push(TickEvent::Mutated {
                id: creature.id,
                habituation_rate: creature.habituation_rate,
                inhibition: creature.inhibition,
            });
        }
        if let Some(birth) = outcome.birth {
            self.births.push(birth);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Population {
    agents: Vec<Creature>,
    occupancy: HashMap<Position, Occupant>,
    ids: IdAllocator,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `count` creatures of random species on random free cells
    pub fn seed(
        &mut self,
        count: usize,
        env: &Environment,
        config: &SimConfig,
        rng: &mut ChaCha8Rng,
    ) -> Result<()> {
        for placed in 0..count {
            let occupancy = &self.occupancy;
            let pos = env
                .random_open_cell(rng, |_, pos| !occupancy.contains_key(&pos))
                .ok_or_else(|| {
                    Error::ResourceExhausted(format!(
                        "no free cell for creature {} of {count}",
                        placed + 1
                    ))
                })?;
            let species = Species::ALL.choose(rng).copied().unwrap_or(Species::A);
            let id = self.ids.allocate();
            self.place(Creature::new(id, pos, species, 0, config, rng));
        }

        debug!(count, "Population seeded");
        Ok(())
    }

    /// Add one creature at a chosen cell
    pub fn spawn(
        &mut self,
        pos: Position,
        species: Species,
        env: &Environment,
        config: &SimConfig,
        rng: &mut ChaCha8Rng,
        tick: u64,
    ) -> Result<AgentId> {
        if !env.grid.in_bounds(pos) {
            return Err(Error::OutOfBounds(pos, env.width(), env.height()));
        }
        if env.grid.is_blocked(pos) || self.occupancy.contains_key(&pos) {
            return Err(Error::Occupied(pos));
        }
        if self.len() >= config.max_population {
            return Err(Error::ResourceExhausted(format!(
                "population cap of {} reached",
                config.max_population
            )));
        }

        let id = self.ids.allocate();
        self.place(Creature::new(id, pos, species, tick, config, rng));
        debug!(id = %id, x = pos.x, y = pos.y, species = %species, "Creature added");
        Ok(id)
    }

    /// Insert an already built creature, e.g. one loaded from a snapshot
    pub fn insert(&mut self, creature: Creature) -> Result<()> {
        if self.occupancy.contains_key(&creature.position) {
            return Err(Error::Occupied(creature.position));
        }
        if self.get(creature.id).is_some() {
            return Err(Error::InvalidState(format!("duplicate creature id {}", creature.id)));
        }
        self.ids.reseed_past(creature.id);
        self.place(creature);
        Ok(())
    }

    fn place(&mut self, creature: Creature) {
        self.occupancy
            .insert(creature.position, Occupant::Agent(creature.id));
        self.agents.push(creature);
    }

    pub fn agents(&self) -> &[Creature] {
        &self.agents
    }

    pub fn get(&self, id: AgentId) -> Option<&Creature> {
        self.agents.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Creature> {
        self.agents.iter_mut().find(|c| c.id == id)
    }

    pub fn occupant(&self, pos: Position) -> Option<Occupant> {
        self.occupancy.get(&pos).copied()
    }

    /// Live creatures
    pub fn len(&self) -> usize {
        self.agents.iter().filter(|c| c.alive).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.agents.iter().filter(|c| c.alive).map(|c| c.position)
    }

    /// Update every live creature once, in collection order.
    ///
    /// Neighbour stress is read from a view frozen before the pass. Movement
    /// and resource consumption land immediately, so earlier creatures claim
    /// cells and resources first. The collection itself is not resized.
    pub fn update_all(
        &mut self,
        env: &mut Environment,
        config: &SimConfig,
        rng: &mut ChaCha8Rng,
    ) -> Pass {
        let snapshot: Vec<NeighborView> = self
            .agents
            .iter()
            .filter(|c| c.alive)
            .map(|c| NeighborView {
                id: c.id,
                position: c.position,
                stress: c.stress,
            })
            .collect();

        let mut habitat = TickHabitat {
            env,
            occupancy: &mut self.occupancy,
            births_left: config.max_population.saturating_sub(snapshot.len()),
        };

        let mut pass = Pass::default();
        for creature in self.agents.iter_mut().filter(|c| c.alive) {
            let neighbors = neighbors_within(&snapshot, creature.position, creature.id);
            let outcome = creature.update(&neighbors, &mut habitat, config, rng);
            pass.record(creature, outcome);
        }
        pass
    }

    /// Apply a pass: drop the dead, then admit offspring in queue order.
    ///
    /// Returns every event of the tick, births last.
    pub fn commit(
        &mut self,
        pass: Pass,
        config: &SimConfig,
        rng: &mut ChaCha8Rng,
        tick: u64,
    ) -> Vec<TickEvent> {
        let Pass { mut events, births } = pass;

        self.agents.retain(|c| c.alive);

        for intent in births {
            let id = self.ids.allocate();
            let child = Creature::offspring(id, &intent, tick, config, rng);
            trace!(id = %id, parent = %intent.parent, x = intent.position.x, y = intent.position.y, "Offspring admitted");
            events.push(TickEvent::Born {
                id,
                parent: intent.parent,
                species: intent.species,
                position: intent.position,
                mutated: intent.mutated_at_birth,
            });
            self.place(child);
        }

        events
    }
}

/// Live creatures within Chebyshev distance 1 of `pos`, excluding `id`
pub fn neighbors_within(snapshot: &[NeighborView], pos: Position, id: AgentId) -> Vec<NeighborView> {
    snapshot
        .iter()
        .filter(|n| n.id != id && n.position.chebyshev_distance(&pos) <= 1)
        .copied()
        .collect()
}

/// The habitat seen by creatures during one pass
struct TickHabitat<'a> {
    env: &'a mut Environment,
    occupancy: &'a mut HashMap<Position, Occupant>,
    births_left: usize,
}

impl TickHabitat<'_> {
    fn is_vacant(&self, pos: Position) -> bool {
        !self.env.grid.is_blocked(pos) && !self.occupancy.contains_key(&pos)
    }
}

impl Habitat for TickHabitat<'_> {
    fn bounds(&self) -> (i32, i32) {
        (self.env.width(), self.env.height())
    }

    fn zone_at(&self, pos: Position) -> ZoneType {
        self.env.zone_at(pos).unwrap_or(ZoneType::Obstacle)
    }

    fn climate(&self) -> Climate {
        self.env.climate()
    }

    fn is_free(&self, pos: Position, mover: AgentId) -> bool {
        if self.env.grid.is_blocked(pos) {
            return false;
        }
        match self.occupancy.get(&pos) {
            None => true,
            Some(Occupant::Agent(id)) => *id == mover,
            Some(Occupant::Newborn) => false,
        }
    }

    fn relocate(&mut self, id: AgentId, from: Position, to: Position) {
        if self.occupancy.get(&from) == Some(&Occupant::Agent(id)) {
            self.occupancy.remove(&from);
        }
        self.occupancy.insert(to, Occupant::Agent(id));
    }

    fn vacate(&mut self, id: AgentId, pos: Position) {
        if self.occupancy.get(&pos) == Some(&Occupant::Agent(id)) {
            self.occupancy.remove(&pos);
        }
    }

    fn forage_target(&self, from: Position, memory: &[Position]) -> Option<Position> {
        let env = &*self.env;
        nearest(from, memory.iter().copied().filter(|&pos| env.has_resource(pos)))
            .or_else(|| env.nearest_resource(from))
    }

    fn consume_resource(&mut self, pos: Position) -> bool {
        self.env.consume_resource(pos)
    }

    fn is_regen_zone(&self, pos: Position) -> bool {
        self.env.is_regen_zone(pos)
    }

    fn reserve_birth_cell(&mut self, near: Position) -> Option<Position> {
        if self.births_left == 0 {
            trace!(x = near.x, y = near.y, "Birth refused, population cap reached");
            return None;
        }

        let cell = Direction::all()
            .iter()
            .map(|d| {
                let (dx, dy) = d.to_delta();
                near.add(dx, dy)
            })
            .find(|&pos| self.is_vacant(pos));

        match cell {
            Some(pos) => {
                self.occupancy.insert(pos, Occupant::Newborn);
                self.births_left -= 1;
                Some(pos)
            }
            None => {
                trace!(x = near.x, y = near.y, "Birth refused, no free neighbouring cell");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ZoneGrid;
    use mind_core::EffectTables;
    use rand::SeedableRng;

    fn open_env(width: i32, height: i32) -> Environment {
        Environment::new(ZoneGrid::new(width, height), Climate::default())
    }

    fn calm_config() -> SimConfig {
        let mut config = SimConfig::default();
        config.effects = EffectTables::neutral();
        config.features.aging = false;
        config.features.reproduction = false;
        config
    }

    #[test]
    fn test_id_allocator() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.allocate(), AgentId(1));
        assert_eq!(ids.allocate(), AgentId(2));
        ids.reseed_past(AgentId(10));
        assert_eq!(ids.allocate(), AgentId(11));
        ids.reseed_past(AgentId(3));
        assert_eq!(ids.peek(), AgentId(12));
    }

    #[test]
    fn test_seed_population() {
        let config = SimConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let env = Environment::generate(&config, &mut rng);
        let mut population = Population::new();

        population.seed(20, &env, &config, &mut rng).unwrap();
        assert_eq!(population.len(), 20);

        let mut seen = std::collections::HashSet::new();
        for creature in population.agents() {
            assert!(seen.insert(creature.position), "two creatures share a cell");
            assert!(!env.grid.is_blocked(creature.position));
            assert_eq!(population.occupant(creature.position), Some(Occupant::Agent(creature.id)));
        }
    }

    #[test]
    fn test_seed_fails_when_grid_full() {
        let config = calm_config();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let env = open_env(2, 2);
        let mut population = Population::new();

        let result = population.seed(5, &env, &config, &mut rng);
        assert!(matches!(result, Err(Error::ResourceExhausted(_))));
    }

    #[test]
    fn test_spawn_validation() {
        let config = calm_config();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut env = open_env(5, 5);
        env.grid.set(Position::new(1, 1), ZoneType::Obstacle);
        let mut population = Population::new();

        let id = population
            .spawn(Position::new(0, 0), Species::B, &env, &config, &mut rng, 0)
            .unwrap();
        assert_eq!(population.get(id).map(|c| c.species), Some(Species::B));

        assert!(matches!(
            population.spawn(Position::new(0, 0), Species::A, &env, &config, &mut rng, 0),
            Err(Error::Occupied(_))
        ));
        assert!(matches!(
            population.spawn(Position::new(1, 1), Species::A, &env, &config, &mut rng, 0),
            Err(Error::Occupied(_))
        ));
        assert!(matches!(
            population.spawn(Position::new(5, 0), Species::A, &env, &config, &mut rng, 0),
            Err(Error::OutOfBounds(..))
        ));
    }

    #[test]
    fn test_neighbors_within() {
        let view = |id: u64, x: i32, y: i32| NeighborView {
            id: AgentId(id),
            position: Position::new(x, y),
            stress: 0.0,
        };
        let snapshot = vec![view(1, 5, 5), view(2, 6, 6), view(3, 7, 5), view(4, 4, 4)];

        let neighbors = neighbors_within(&snapshot, Position::new(5, 5), AgentId(1));
        let ids: Vec<_> = neighbors.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn test_contagion_uses_frozen_snapshot() {
        let mut config = calm_config();
        config.behavior.fluctuation_amplitude = 0.0;
        config.behavior.random_move_attempts = 0;
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut env = open_env(5, 5);
        let mut population = Population::new();

        let calm = population
            .spawn(Position::new(1, 1), Species::A, &env, &config, &mut rng, 0)
            .unwrap();
        let tense = population
            .spawn(Position::new(2, 1), Species::A, &env, &config, &mut rng, 0)
            .unwrap();
        population.agents[1].stress = 1.0;

        let pass = population.update_all(&mut env, &config, &mut rng);
        population.commit(pass, &config, &mut rng, 1);

        let calm = population.get(calm).unwrap();
        let tense = population.get(tense).unwrap();
        assert!((calm.stress - 0.05).abs() < 1e-6);
        // Pulled toward the calm creature's pre-pass stress of 0, not 0.05
        assert!((tense.stress - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_first_mover_wins_contested_resource() {
        let mut config = calm_config();
        config.behavior.random_move_attempts = 0;
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut env = open_env(5, 5);
        env.add_resource(Position::new(2, 0)).unwrap();
        let mut population = Population::new();

        let first = population
            .spawn(Position::new(1, 0), Species::A, &env, &config, &mut rng, 0)
            .unwrap();
        let second = population
            .spawn(Position::new(3, 0), Species::B, &env, &config, &mut rng, 0)
            .unwrap();
        for creature in population.agents.iter_mut() {
            creature.energy = 1.0;
        }

        let pass = population.update_all(&mut env, &config, &mut rng);
        let events = population.commit(pass, &config, &mut rng, 1);

        let consumed: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, TickEvent::Consumed { .. }))
            .map(TickEvent::agent)
            .collect();
        assert_eq!(consumed, vec![first]);
        assert_eq!(population.get(first).map(|c| c.position), Some(Position::new(2, 0)));
        assert_eq!(population.get(second).map(|c| c.position), Some(Position::new(3, 0)));
        assert!(env.resources().is_empty());
    }

    #[test]
    fn test_dead_removed_at_commit() {
        let config = calm_config();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut env = open_env(5, 5);
        let mut population = Population::new();

        let doomed = population
            .spawn(Position::new(0, 0), Species::A, &env, &config, &mut rng, 0)
            .unwrap();
        population
            .spawn(Position::new(4, 4), Species::B, &env, &config, &mut rng, 0)
            .unwrap();
        population.agents[0].energy = 0.0;

        let pass = population.update_all(&mut env, &config, &mut rng);
        assert_eq!(population.agents().len(), 2);

        let events = population.commit(pass, &config, &mut rng, 1);
        assert!(events.iter().any(|e| matches!(e, TickEvent::Died { id, .. } if *id == doomed)));
        assert_eq!(population.agents().len(), 1);
        assert!(population.get(doomed).is_none());
        assert_eq!(population.occupant(Position::new(0, 0)), None);
    }

    #[test]
    fn test_births_admitted_after_pass() {
        let mut config = calm_config();
        config.features.reproduction = true;
        config.behavior.reproduce_chance = 1.0;
        config.behavior.fluctuation_amplitude = 0.0;
        config.behavior.random_move_attempts = 0;
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut env = open_env(6, 6);
        let mut population = Population::new();

        let parent = population
            .spawn(Position::new(3, 3), Species::B, &env, &config, &mut rng, 0)
            .unwrap();
        population.agents[0].energy = 14.0;

        let pass = population.update_all(&mut env, &config, &mut rng);
        assert_eq!(pass.births.len(), 1);
        assert_eq!(population.agents().len(), 1);
        let reserved = pass.births[0].position;
        assert_eq!(population.occupant(reserved), Some(Occupant::Newborn));

        let events = population.commit(pass, &config, &mut rng, 1);
        assert_eq!(population.len(), 2);

        let born = events
            .iter()
            .find_map(|e| match e {
                TickEvent::Born { id, parent: p, species, position, .. } => Some((*id, *p, *species, *position)),
                _ => None,
            })
            .unwrap();
        assert_eq!(born.1, parent);
        assert_eq!(born.2, Species::B);
        assert_eq!(born.3, reserved);
        assert!(born.0 > parent);
        assert_eq!(population.occupant(reserved), Some(Occupant::Agent(born.0)));
    }

    #[test]
    fn test_population_cap_blocks_births() {
        let mut config = calm_config();
        config.features.reproduction = true;
        config.behavior.reproduce_chance = 1.0;
        config.behavior.fluctuation_amplitude = 0.0;
        config.max_population = 2;
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut env = open_env(8, 8);
        let mut population = Population::new();

        for x in [1, 4, 7] {
            population
                .spawn(Position::new(x, 4), Species::A, &env, &config, &mut rng, 0)
                .ok();
        }
        assert_eq!(population.len(), 2);
        for creature in population.agents.iter_mut() {
            creature.energy = 14.0;
        }

        let pass = population.update_all(&mut env, &config, &mut rng);
        assert!(pass.births.is_empty());
    }

    #[test]
    fn test_forage_prefers_remembered_resource() {
        let mut env = open_env(10, 10);
        env.add_resource(Position::new(1, 0)).unwrap();
        env.add_resource(Position::new(6, 0)).unwrap();
        let mut occupancy = HashMap::new();
        let habitat = TickHabitat {
            env: &mut env,
            occupancy: &mut occupancy,
            births_left: 0,
        };

        let from = Position::new(0, 0);
        assert_eq!(habitat.forage_target(from, &[]), Some(Position::new(1, 0)));
        assert_eq!(
            habitat.forage_target(from, &[Position::new(6, 0)]),
            Some(Position::new(6, 0))
        );
        // Forgotten resource no longer exists
        assert_eq!(
            habitat.forage_target(from, &[Position::new(9, 9)]),
            Some(Position::new(1, 0))
        );
    }
}
