//! Stepping engine: drives ticks over the environment and population.

use crate::environment::Environment;
use crate::event::TickEvent;
use crate::population::Population;
use mind_core::{
    AgentId, DayPhase, Error, Mood, PopulationStats, Position, Result, RunTotals, Season,
    SimConfig, Species, Weather,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

pub struct Simulation {
    env: Environment,
    population: Population,
    config: SimConfig,
    rng: ChaCha8Rng,
    tick: u64,
    totals: RunTotals,
}

/// What one tick did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub events: Vec<TickEvent>,
    pub stats: PopulationStats,
}

/// Outcome of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub ticks_run: u64,
    pub final_tick: u64,
    pub stopped_early: bool,
    pub totals: RunTotals,
    pub stats: PopulationStats,
}

impl Simulation {
    /// Generate a world and seed the initial population from `config`
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let env = Environment::generate(&config, &mut rng);
        let mut population = Population::new();
        population.seed(config.initial_population, &env, &config, &mut rng)?;

        info!(
            event = "world_created",
            seed = config.seed,
            width = config.world.width,
            height = config.world.height,
            population = population.len(),
            resources = env.resources().len(),
            "Simulation created"
        );

        Ok(Self {
            env,
            population,
            config,
            rng,
            tick: 0,
            totals: RunTotals::default(),
        })
    }

    /// Assemble a simulation around an existing world
    pub fn from_parts(config: SimConfig, env: Environment, population: Population) -> Result<Self> {
        config.validate()?;
        if env.width() != config.world.width || env.height() != config.world.height {
            return Err(Error::Validation(format!(
                "environment is {}x{} but config expects {}x{}",
                env.width(),
                env.height(),
                config.world.width,
                config.world.height
            )));
        }

        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            env,
            population,
            config,
            rng,
            tick: 0,
            totals: RunTotals::default(),
        })
    }

    pub(crate) fn with_rng(mut self, rng: ChaCha8Rng, tick: u64) -> Self {
        self.rng = rng;
        self.tick = tick;
        self
    }

    /// Run `num_ticks` ticks
    #[instrument(skip(self), fields(num_ticks = self.config.num_ticks, seed = self.config.seed))]
    pub fn run(&mut self) -> SimulationResult {
        self.run_while(|| true)
    }

    /// Run up to `num_ticks` ticks, checking `keep_going` before each one.
    ///
    /// A tick that has started always completes.
    pub fn run_while<F>(&mut self, mut keep_going: F) -> SimulationResult
    where
        F: FnMut() -> bool,
    {
        info!(
            event = "run_started",
            num_ticks = self.config.num_ticks,
            population = self.population.len(),
            "Starting simulation for {} ticks",
            self.config.num_ticks
        );

        let start = self.tick;
        let mut stopped_early = false;
        for _ in 0..self.config.num_ticks {
            if !keep_going() {
                stopped_early = true;
                info!(event = "run_stopped", tick = self.tick, "Stop requested, no further ticks");
                break;
            }
            self.step();
        }

        let result = SimulationResult {
            ticks_run: self.tick - start,
            final_tick: self.tick,
            stopped_early,
            totals: self.totals,
            stats: self.stats(),
        };
        self.emit_run_summary(&result);
        result
    }

    /// Execute one tick
    pub fn step(&mut self) -> TickReport {
        self.tick += 1;

        if self.config.features.climate
            && self
                .env
                .advance_climate(self.tick, &self.config.climate, &mut self.rng)
        {
            let climate = self.env.climate();
            debug!(
                tick = self.tick,
                weather = %climate.weather,
                season = %climate.season,
                day_phase = %climate.day_phase,
                "Climate changed"
            );
        }

        let pass = self
            .population
            .update_all(&mut self.env, &self.config, &mut self.rng);
        let events = self
            .population
            .commit(pass, &self.config, &mut self.rng, self.tick);

        for event in &events {
            event.tally(&mut self.totals);
            if let TickEvent::Born {
                id,
                parent,
                position,
                ..
            } = event
            {
                debug!(tick = self.tick, id = %id, parent = %parent, x = position.x, y = position.y, "Creature born");
            }
        }

        self.env
            .regenerate_resources(&self.config.world, &mut self.rng);

        let stats = self.stats();
        if self.config.metrics_interval > 0 && self.tick % self.config.metrics_interval == 0 {
            self.emit_population_metrics(&stats);
        }

        TickReport {
            tick: self.tick,
            events,
            stats,
        }
    }

    /// Aggregate statistics over the live population
    pub fn stats(&self) -> PopulationStats {
        let mut stats = PopulationStats::new(self.tick);
        for creature in self.population.agents().iter().filter(|c| c.alive) {
            stats.record(
                creature.species,
                creature.mood,
                creature.energy,
                creature.stress,
                creature.constricted,
                creature.mutated,
            );
        }
        stats
    }

    fn emit_population_metrics(&self, stats: &PopulationStats) {
        let climate = self.env.climate();
        info!(
            event = "population_metrics",
            tick = self.tick,
            population = stats.population,
            species_a = stats.species.get(Species::A.as_str()).copied().unwrap_or(0),
            species_b = stats.species.get(Species::B.as_str()).copied().unwrap_or(0),
            happy = stats.mood_count(Mood::Happy),
            angry = stats.mood_count(Mood::Angry),
            mutated = stats.mutated,
            constricted = stats.constricted,
            avg_energy = stats.energy.mean,
            avg_stress = stats.stress.mean,
            resources = self.env.resources().len(),
            weather = %climate.weather,
            season = %climate.season,
            births = self.totals.births,
            deaths = self.totals.deaths,
            "Population metrics snapshot"
        );
    }

    fn emit_run_summary(&self, result: &SimulationResult) {
        info!(
            event = "run_summary",
            ticks_run = result.ticks_run,
            final_tick = result.final_tick,
            stopped_early = result.stopped_early,
            survivors = result.stats.population,
            births = result.totals.births,
            deaths = result.totals.deaths,
            respawns = result.totals.respawns,
            resources_consumed = result.totals.resources_consumed,
            mutations = result.totals.mutations,
            "Simulation complete"
        );
    }

    // Control surface

    /// Place a new creature at `pos`
    pub fn add_agent(&mut self, pos: Position, species: Species) -> Result<AgentId> {
        self.population
            .spawn(pos, species, &self.env, &self.config, &mut self.rng, self.tick)
    }

    pub fn add_resource(&mut self, pos: Position) -> Result<()> {
        self.env.add_resource(pos)
    }

    /// Climate setters hold their field against auto-cycling
    pub fn set_weather(&mut self, weather: Weather) {
        self.env.set_weather(weather);
    }

    pub fn set_season(&mut self, season: Season) {
        self.env.set_season(season);
    }

    pub fn set_day_phase(&mut self, day_phase: DayPhase) {
        self.env.set_day_phase(day_phase);
    }

    /// Redraw the zone grid; no creature ends up standing on an obstacle
    pub fn reset_zones(&mut self) {
        let occupied: HashSet<Position> = self.population.positions().collect();
        self.env
            .reset_zones(&self.config.world, &mut self.rng, &occupied);
        info!(event = "zones_reset", tick = self.tick, "Zones regenerated");
    }

    // Accessors

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn totals(&self) -> RunTotals {
        self.totals
    }
}
