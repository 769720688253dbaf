//! Flat persistence snapshot of a running world.
//!
//! Only creatures and resources are stored. Zones are rebuilt from the seed on
//! restore, so a snapshot must be loaded with the configuration it was taken
//! under.

use crate::agent::Creature;
use crate::environment::Environment;
use crate::population::Population;
use crate::simulation::Simulation;
use mind_core::{AgentId, Error, Mood, Position, Result, SimConfig, Species};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub species: String,
    pub energy: f32,
    pub stress: f32,
    pub disinhibited: bool,
    pub response: f32,
    pub mood: String,
}

impl From<&Creature> for AgentRecord {
    fn from(creature: &Creature) -> Self {
        Self {
            id: creature.id.0,
            x: creature.position.x,
            y: creature.position.y,
            species: creature.species.as_str().to_string(),
            energy: creature.energy,
            stress: creature.stress,
            disinhibited: creature.disinhibited,
            response: creature.response,
            mood: creature.mood.as_str().to_string(),
        }
    }
}

/// A resource position. Reads `{"x": 1, "y": 2}` or `[1, 2]`, writes the former.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawResource")]
pub struct ResourceRecord {
    pub x: i32,
    pub y: i32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawResource {
    Point { x: i32, y: i32 },
    Pair(i32, i32),
}

impl From<RawResource> for ResourceRecord {
    fn from(raw: RawResource) -> Self {
        match raw {
            RawResource::Point { x, y } | RawResource::Pair(x, y) => Self { x, y },
        }
    }
}

impl ResourceRecord {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub version: u32,
    pub tick: u64,
    pub width: i32,
    pub height: i32,
    pub agents: Vec<AgentRecord>,
    pub resources: Vec<ResourceRecord>,
}

impl WorldSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Simulation {
    /// Capture live creatures and resources
    pub fn snapshot(&self) -> WorldSnapshot {
        let env = self.environment();
        WorldSnapshot {
            version: SNAPSHOT_VERSION,
            tick: self.tick(),
            width: env.width(),
            height: env.height(),
            agents: self
                .population()
                .agents()
                .iter()
                .filter(|c| c.alive)
                .map(AgentRecord::from)
                .collect(),
            resources: env
                .resources()
                .iter()
                .map(|p| ResourceRecord { x: p.x, y: p.y })
                .collect(),
        }
    }

    /// Rebuild a simulation from a snapshot taken under `config`.
    ///
    /// Energy and stress are clamped and mood is recomputed. Lifespan and age
    /// are not stored, so restored creatures start a fresh life.
    pub fn restore(config: SimConfig, snapshot: &WorldSnapshot) -> Result<Self> {
        config.validate()?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::Validation(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if snapshot.width != config.world.width || snapshot.height != config.world.height {
            return Err(Error::Validation(format!(
                "snapshot is {}x{} but config expects {}x{}",
                snapshot.width, snapshot.height, config.world.width, config.world.height
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut env = Environment::generate(&config, &mut rng);
        env.clear_resources();

        let mut population = Population::new();
        let mut ids = HashSet::new();
        for record in &snapshot.agents {
            let pos = Position::new(record.x, record.y);
            check_in_bounds(pos, &config)?;
            if !ids.insert(record.id) {
                return Err(Error::Validation(format!("duplicate creature id {}", record.id)));
            }
            for (name, value) in [
                ("energy", record.energy),
                ("stress", record.stress),
                ("response", record.response),
            ] {
                if !value.is_finite() {
                    return Err(Error::Validation(format!(
                        "creature {} has non-finite {name}",
                        record.id
                    )));
                }
            }
            let species: Species = record.species.parse()?;
            // Validated, then recomputed below
            let _: Mood = record.mood.parse()?;

            env.grid.clear_obstacle(pos);
            let mut creature = Creature::new(AgentId(record.id), pos, species, snapshot.tick, &config, &mut rng);
            creature.energy = record.energy.clamp(0.0, config.energy.max_energy);
            creature.stress = record.stress.clamp(0.0, 1.0);
            creature.response = record.response;
            creature.disinhibited = record.disinhibited;
            creature.mood = Mood::classify(creature.stress, creature.energy);
            population.insert(creature)?;
        }

        for record in &snapshot.resources {
            let pos = record.position();
            check_in_bounds(pos, &config)?;
            env.grid.clear_obstacle(pos);
            env.add_resource(pos)?;
        }

        info!(
            event = "snapshot_restored",
            tick = snapshot.tick,
            agents = population.len(),
            resources = env.resources().len(),
            next_id = %population.ids().peek(),
            "Simulation restored from snapshot"
        );

        Ok(Simulation::from_parts(config, env, population)?.with_rng(rng, snapshot.tick))
    }
}

fn check_in_bounds(pos: Position, config: &SimConfig) -> Result<()> {
    if pos.in_bounds(config.world.width, config.world.height) {
        Ok(())
    } else {
        Err(Error::OutOfBounds(pos, config.world.width, config.world.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SimConfig {
        let mut config = SimConfig {
            seed: 17,
            initial_population: 8,
            ..Default::default()
        };
        config.world.width = 12;
        config.world.height = 12;
        config
    }

    fn record(id: u64, x: i32, y: i32) -> AgentRecord {
        AgentRecord {
            id,
            x,
            y,
            species: "a".into(),
            energy: 7.0,
            stress: 0.1,
            disinhibited: false,
            response: 0.8,
            mood: "happy".into(),
        }
    }

    fn snapshot_with(agents: Vec<AgentRecord>) -> WorldSnapshot {
        WorldSnapshot {
            version: SNAPSHOT_VERSION,
            tick: 40,
            width: 12,
            height: 12,
            agents,
            resources: vec![ResourceRecord { x: 0, y: 0 }],
        }
    }

    #[test]
    fn test_resource_record_formats() {
        let point: ResourceRecord = serde_json::from_str(r#"{"x": 3, "y": 4}"#).unwrap();
        let pair: ResourceRecord = serde_json::from_str("[3, 4]").unwrap();
        assert_eq!(point, pair);
        assert_eq!(serde_json::to_string(&pair).unwrap(), r#"{"x":3,"y":4}"#);
        assert!(serde_json::from_str::<ResourceRecord>(r#"{"x": "3", "y": 4}"#).is_err());
    }

    #[test]
    fn test_snapshot_survives_json_and_restore() {
        let config = small_config();
        let mut sim = Simulation::new(config.clone()).unwrap();
        for _ in 0..25 {
            sim.step();
        }

        let snapshot = sim.snapshot();
        let parsed = WorldSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(parsed, snapshot);

        let restored = Simulation::restore(config, &parsed).unwrap();
        assert_eq!(restored.tick(), 25);
        assert_eq!(restored.snapshot().agents, snapshot.agents);
        assert_eq!(restored.environment().resources().len(), snapshot.resources.len());
        for creature in restored.population().agents() {
            assert!(!restored.environment().grid.is_blocked(creature.position));
        }
    }

    #[test]
    fn test_restore_reseeds_ids() {
        let config = small_config();
        let snapshot = snapshot_with(vec![record(3, 1, 1), record(41, 2, 2)]);

        let mut sim = Simulation::restore(config, &snapshot).unwrap();
        let id = sim.add_agent(Position::new(0, 0), Species::B).unwrap();
        assert_eq!(id, AgentId(42));
    }

    #[test]
    fn test_restore_clamps_and_recomputes_mood() {
        let config = small_config();
        let mut wild = record(1, 4, 4);
        wild.energy = 99.0;
        wild.stress = -2.0;
        wild.mood = "angry".into();
        let snapshot = snapshot_with(vec![wild]);

        let sim = Simulation::restore(config, &snapshot).unwrap();
        let creature = sim.population().get(AgentId(1)).unwrap();
        assert_eq!(creature.energy, 15.0);
        assert_eq!(creature.stress, 0.0);
        assert_eq!(creature.mood, Mood::Happy);
    }

    #[test]
    fn test_restore_rejects_bad_snapshots() {
        let config = small_config();

        let out_of_bounds = snapshot_with(vec![record(1, 12, 0)]);
        assert!(matches!(
            Simulation::restore(config.clone(), &out_of_bounds),
            Err(Error::OutOfBounds(..))
        ));

        let mut unknown = record(1, 1, 1);
        unknown.species = "c".into();
        assert!(matches!(
            Simulation::restore(config.clone(), &snapshot_with(vec![unknown])),
            Err(Error::UnknownTag { kind: "species", .. })
        ));

        let duplicate_id = snapshot_with(vec![record(1, 1, 1), record(1, 2, 2)]);
        assert!(Simulation::restore(config.clone(), &duplicate_id).is_err());

        let shared_cell = snapshot_with(vec![record(1, 1, 1), record(2, 1, 1)]);
        assert!(matches!(
            Simulation::restore(config.clone(), &shared_cell),
            Err(Error::Occupied(_))
        ));

        let mut nan = record(1, 1, 1);
        nan.response = f32::NAN;
        assert!(Simulation::restore(config.clone(), &snapshot_with(vec![nan])).is_err());

        let mut wrong_size = snapshot_with(vec![]);
        wrong_size.width = 30;
        assert!(matches!(
            Simulation::restore(config.clone(), &wrong_size),
            Err(Error::Validation(_))
        ));

        let mut bad_resource = snapshot_with(vec![]);
        bad_resource.resources.push(ResourceRecord { x: -1, y: 0 });
        assert!(Simulation::restore(config, &bad_resource).is_err());
    }

    #[test]
    fn test_malformed_json_rejected() {
        let json = r#"{"version":1,"tick":0,"width":12,"height":12,
            "agents":[{"id":1,"x":"one","y":2,"species":"a","energy":5.0,"stress":0.0,
            "disinhibited":false,"response":1.0,"mood":"neutral"}],"resources":[]}"#;
        assert!(matches!(WorldSnapshot::from_json(json), Err(Error::Serialization(_))));
    }
}
