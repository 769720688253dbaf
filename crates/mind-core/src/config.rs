//! Configuration types for the simulation.

use crate::error::{Error, Result};
use crate::types::{Climate, DayPhase, Season, Species, Weather, ZoneType};
use serde::{Deserialize, Serialize};

/// World configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Width of the world grid
    pub width: i32,
    /// Height of the world grid
    pub height: i32,
    /// Chance a cell is drawn as water (demoted to normal next to other water)
    pub water_chance: f32,
    /// Chance a cell is an impassable obstacle
    pub obstacle_chance: f32,
    /// Chance a cell is a cold zone
    pub cold_chance: f32,
    /// Chance a cell is a hot zone
    pub hot_chance: f32,
    /// Resources placed when the world is generated
    pub initial_resources: usize,
    /// Per-tick chance that one new resource appears
    pub resource_spawn_chance: f32,
    /// Resource regeneration stops at this many live resources
    pub max_resources: usize,
    /// Number of regeneration cells that trickle energy into occupants
    pub regen_zone_count: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 30,
            height: 30,
            water_chance: 0.05,
            obstacle_chance: 0.05,
            cold_chance: 0.05,
            hot_chance: 0.05,
            initial_resources: 20,
            resource_spawn_chance: 0.1,
            max_resources: 40,
            regen_zone_count: 4,
        }
    }
}

/// Energy economy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Hard ceiling on creature energy
    pub max_energy: f32,
    /// Lower bound of the uniform draw for fresh creatures
    pub initial_energy_min: f32,
    /// Upper bound of the uniform draw for fresh creatures
    pub initial_energy_max: f32,
    /// Metabolic cost per tick
    pub drain_per_tick: f32,
    /// Below this energy a creature forages instead of wandering
    pub low_energy_threshold: f32,
    /// Energy gained from consuming one resource
    pub resource_recharge: f32,
    /// Energy gained per tick while standing on a regeneration cell
    pub regen_zone_trickle: f32,
    /// Minimum energy required to reproduce
    pub min_reproduce_energy: f32,
    /// Energy lost to the split on reproduction
    pub reproduce_cost: f32,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            max_energy: 15.0,
            initial_energy_min: 6.0,
            initial_energy_max: 10.0,
            drain_per_tick: 0.06,
            low_energy_threshold: 3.0,
            resource_recharge: 8.0,
            regen_zone_trickle: 0.2,
            min_reproduce_energy: 12.0,
            reproduce_cost: 1.0,
        }
    }
}

/// Movement allowed while stress keeps a creature constricted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstrictedMovement {
    /// No movement at all
    Frozen,
    /// A single attempt along the vertical axis
    VerticalOnly,
}

/// What happens to `response` when inhibition pushes it below zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePolicy {
    Unbounded,
    ClampAtZero,
}

/// Parameters of the per-tick creature update
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Initial multiplicative decay of `response`
    pub habituation_rate: f32,
    /// Initial subtractive dampening of `response`
    pub inhibition: f32,
    pub initial_response: f32,
    /// Fraction of the gap to the neighbourhood mean stress closed per tick
    pub contagion_factor: f32,
    /// Stress noise is uniform in `[-amplitude, amplitude]`
    pub fluctuation_amplitude: f32,
    /// Stress strictly above this constricts movement
    pub constriction_threshold: f32,
    pub disinhibition_toggle_chance: f32,
    /// Random single-step moves tried per tick before giving up
    pub random_move_attempts: u32,
    pub constricted_movement: ConstrictedMovement,
    pub response_policy: ResponsePolicy,
    pub lifespan_min: u64,
    pub lifespan_max: u64,
    /// Reproduction requires stress at or below this
    pub max_reproduce_stress: f32,
    /// Chance per eligible tick that reproduction is attempted
    pub reproduce_chance: f32,
    /// Length of the rolling energy/stress histories
    pub history_len: usize,
    /// Remembered resource positions per creature
    pub memory_capacity: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            habituation_rate: 0.95,
            inhibition: 0.01,
            initial_response: 1.0,
            contagion_factor: 0.05,
            fluctuation_amplitude: 0.025,
            constriction_threshold: 0.7,
            disinhibition_toggle_chance: 0.05,
            random_move_attempts: 3,
            constricted_movement: ConstrictedMovement::Frozen,
            response_policy: ResponsePolicy::Unbounded,
            lifespan_min: 300,
            lifespan_max: 600,
            max_reproduce_stress: 0.3,
            reproduce_chance: 0.05,
            history_len: 50,
            memory_capacity: 5,
        }
    }
}

/// Stress-driven and birth mutation of per-creature parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Stress strictly above this counts toward the mutation counter
    pub stress_threshold: f32,
    /// The one-shot mutation fires once the counter exceeds this
    pub counter_threshold: u32,
    /// Counter decrement on calm ticks
    pub counter_decay: u32,
    /// Magnitude range of a habituation rate perturbation
    pub habituation_step: (f32, f32),
    /// Magnitude range of an inhibition perturbation
    pub inhibition_step: (f32, f32),
    pub habituation_bounds: (f32, f32),
    pub inhibition_bounds: (f32, f32),
    /// Chance an offspring's parameters are perturbed at birth
    pub birth_mutation_chance: f32,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            stress_threshold: 0.7,
            counter_threshold: 50,
            counter_decay: 1,
            habituation_step: (0.02, 0.05),
            inhibition_step: (0.002, 0.005),
            habituation_bounds: (0.5, 1.0),
            inhibition_bounds: (0.0, 0.1),
            birth_mutation_chance: 0.1,
        }
    }
}

/// Weather, season and day/night scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateConfig {
    /// Rotate climate automatically; when off, values only change on request
    pub auto_cycle: bool,
    /// Ticks between weather draws (0 disables)
    pub weather_interval: u64,
    /// Ticks between season draws (0 disables)
    pub season_interval: u64,
    /// Ticks between day/night draws (0 disables)
    pub day_phase_interval: u64,
    pub initial: Climate,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            auto_cycle: true,
            weather_interval: 50,
            season_interval: 200,
            day_phase_interval: 25,
            initial: Climate::default(),
        }
    }
}

/// What happens to a creature whose age or energy runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathPolicy {
    /// Removed from the population at the end of the tick
    Remove,
    /// Reset in place with fresh random state, keeping its id
    RespawnInPlace,
}

/// Switches for optional rule families
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub zones: bool,
    pub climate: bool,
    pub reproduction: bool,
    pub memory: bool,
    pub regen_zones: bool,
    pub aging: bool,
    pub stress_mutation: bool,
    pub death_policy: DeathPolicy,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            zones: true,
            climate: true,
            reproduction: true,
            memory: true,
            regen_zones: true,
            aging: true,
            stress_mutation: true,
            death_policy: DeathPolicy::Remove,
        }
    }
}

/// A signed stress/energy adjustment applied once per tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub stress: f32,
    pub energy: f32,
}

impl Delta {
    pub const ZERO: Delta = Delta { stress: 0.0, energy: 0.0 };

    pub fn new(stress: f32, energy: f32) -> Self {
        Self { stress, energy }
    }
}

impl std::ops::Add for Delta {
    type Output = Delta;

    fn add(self, rhs: Delta) -> Delta {
        Delta::new(self.stress + rhs.stress, self.energy + rhs.energy)
    }
}

/// Per-species zone deltas
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeciesDelta {
    pub a: Delta,
    pub b: Delta,
}

impl SpeciesDelta {
    pub fn same(delta: Delta) -> Self {
        Self { a: delta, b: delta }
    }

    pub fn get(&self, species: Species) -> Delta {
        match species {
            Species::A => self.a,
            Species::B => self.b,
        }
    }
}

/// Lookup tables mapping zone, weather, season and day phase to deltas.
///
/// Every environmental effect in the creature update is read from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectTables {
    pub normal: SpeciesDelta,
    pub water: SpeciesDelta,
    pub obstacle: SpeciesDelta,
    pub cold: SpeciesDelta,
    pub hot: SpeciesDelta,
    pub sunny: Delta,
    pub cloudy: Delta,
    pub rainy: Delta,
    pub stormy: Delta,
    pub spring: Delta,
    pub summer: Delta,
    pub fall: Delta,
    pub winter: Delta,
    pub day: Delta,
    pub night: Delta,
}

impl Default for EffectTables {
    fn default() -> Self {
        Self {
            normal: SpeciesDelta::default(),
            // Species A dries out in water, species B feeds in it
            water: SpeciesDelta {
                a: Delta::new(0.01, -0.1),
                b: Delta::new(0.0, 0.1),
            },
            obstacle: SpeciesDelta::same(Delta::new(0.02, 0.0)),
            cold: SpeciesDelta::same(Delta::new(0.01, 0.0)),
            hot: SpeciesDelta::same(Delta::new(0.01, -0.02)),
            sunny: Delta::new(-0.01, 0.0),
            cloudy: Delta::ZERO,
            rainy: Delta::new(0.005, 0.0),
            stormy: Delta::new(0.02, -0.02),
            spring: Delta::new(-0.005, 0.0),
            summer: Delta::new(-0.01, 0.0),
            fall: Delta::new(0.005, 0.0),
            winter: Delta::new(0.01, -0.01),
            day: Delta::new(-0.005, 0.0),
            night: Delta::new(0.01, 0.0),
        }
    }
}

impl EffectTables {
    /// Every entry zero: the environment has no effect.
    pub fn neutral() -> Self {
        Self {
            normal: SpeciesDelta::default(),
            water: SpeciesDelta::default(),
            obstacle: SpeciesDelta::default(),
            cold: SpeciesDelta::default(),
            hot: SpeciesDelta::default(),
            sunny: Delta::ZERO,
            cloudy: Delta::ZERO,
            rainy: Delta::ZERO,
            stormy: Delta::ZERO,
            spring: Delta::ZERO,
            summer: Delta::ZERO,
            fall: Delta::ZERO,
            winter: Delta::ZERO,
            day: Delta::ZERO,
            night: Delta::ZERO,
        }
    }

    pub fn zone(&self, zone: ZoneType, species: Species) -> Delta {
        let row = match zone {
            ZoneType::Normal => &self.normal,
            ZoneType::Water => &self.water,
            ZoneType::Obstacle => &self.obstacle,
            ZoneType::Cold => &self.cold,
            ZoneType::Hot => &self.hot,
        };
        row.get(species)
    }

    pub fn weather(&self, weather: Weather) -> Delta {
        match weather {
            Weather::Sunny => self.sunny,
            Weather::Cloudy => self.cloudy,
            Weather::Rainy => self.rainy,
            Weather::Stormy => self.stormy,
        }
    }

    pub fn season(&self, season: Season) -> Delta {
        match season {
            Season::Spring => self.spring,
            Season::Summer => self.summer,
            Season::Fall => self.fall,
            Season::Winter => self.winter,
        }
    }

    pub fn day_phase(&self, phase: DayPhase) -> Delta {
        match phase {
            DayPhase::Day => self.day,
            DayPhase::Night => self.night,
        }
    }

    /// Combined weather, season and day phase delta
    pub fn climate(&self, climate: &Climate) -> Delta {
        self.weather(climate.weather) + self.season(climate.season) + self.day_phase(climate.day_phase)
    }
}

/// Full simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of ticks `Simulation::run` executes
    pub num_ticks: u64,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Creatures placed when the world is generated
    pub initial_population: usize,
    /// Births are refused at this population
    pub max_population: usize,
    /// Ticks between population metric log lines (0 disables)
    pub metrics_interval: u64,
    pub world: WorldConfig,
    pub energy: EnergyConfig,
    pub behavior: BehaviorConfig,
    pub mutation: MutationConfig,
    pub climate: ClimateConfig,
    pub features: FeatureFlags,
    pub effects: EffectTables,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_ticks: 1_000,
            seed: 0,
            initial_population: 20,
            max_population: 200,
            metrics_interval: 100,
            world: WorldConfig::default(),
            energy: EnergyConfig::default(),
            behavior: BehaviorConfig::default(),
            mutation: MutationConfig::default(),
            climate: ClimateConfig::default(),
            features: FeatureFlags::default(),
            effects: EffectTables::default(),
        }
    }
}

impl SimConfig {
    /// Reject configurations the update loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        let world = &self.world;
        if world.width <= 0 || world.height <= 0 {
            return Err(Error::Validation(format!(
                "grid must be non-empty, got {}x{}",
                world.width, world.height
            )));
        }
        if self.initial_population > self.max_population {
            return Err(Error::Validation(format!(
                "initial_population {} exceeds max_population {}",
                self.initial_population, self.max_population
            )));
        }
        let zone_total =
            world.water_chance + world.obstacle_chance + world.cold_chance + world.hot_chance;
        check_probability("zone chances (sum)", zone_total)?;
        for (name, p) in [
            ("water_chance", world.water_chance),
            ("obstacle_chance", world.obstacle_chance),
            ("cold_chance", world.cold_chance),
            ("hot_chance", world.hot_chance),
            ("resource_spawn_chance", world.resource_spawn_chance),
            ("disinhibition_toggle_chance", self.behavior.disinhibition_toggle_chance),
            ("reproduce_chance", self.behavior.reproduce_chance),
            ("birth_mutation_chance", self.mutation.birth_mutation_chance),
            ("contagion_factor", self.behavior.contagion_factor),
        ] {
            check_probability(name, p)?;
        }

        let energy = &self.energy;
        if !(energy.max_energy > 0.0) {
            return Err(Error::Validation("max_energy must be positive".into()));
        }
        check_range(
            "initial energy",
            (energy.initial_energy_min, energy.initial_energy_max),
            (0.0, energy.max_energy),
        )?;
        if energy.drain_per_tick < 0.0 || energy.reproduce_cost < 0.0 {
            return Err(Error::Validation(
                "drain_per_tick and reproduce_cost must not be negative".into(),
            ));
        }
        if !(energy.min_reproduce_energy >= energy.reproduce_cost) {
            return Err(Error::Validation(format!(
                "min_reproduce_energy {} is below reproduce_cost {}",
                energy.min_reproduce_energy, energy.reproduce_cost
            )));
        }

        let behavior = &self.behavior;
        if behavior.lifespan_min > behavior.lifespan_max {
            return Err(Error::Validation(format!(
                "lifespan range inverted: {}..{}",
                behavior.lifespan_min, behavior.lifespan_max
            )));
        }
        if !(behavior.fluctuation_amplitude >= 0.0) {
            return Err(Error::Validation(format!(
                "fluctuation_amplitude must be a non-negative number, got {}",
                behavior.fluctuation_amplitude
            )));
        }

        let mutation = &self.mutation;
        check_step("habituation", mutation.habituation_step, mutation.habituation_bounds)?;
        check_step("inhibition", mutation.inhibition_step, mutation.inhibition_bounds)?;
        check_range(
            "habituation_rate",
            (behavior.habituation_rate, behavior.habituation_rate),
            mutation.habituation_bounds,
        )?;
        check_range(
            "inhibition",
            (behavior.inhibition, behavior.inhibition),
            mutation.inhibition_bounds,
        )?;

        Ok(())
    }
}

fn check_probability(name: &str, p: f32) -> Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(Error::Validation(format!("{name} must be within [0, 1], got {p}")))
    }
}

fn check_range(name: &str, (lo, hi): (f32, f32), (min, max): (f32, f32)) -> Result<()> {
    if lo <= hi && lo >= min && hi <= max {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{name} range {lo}..{hi} must lie within {min}..{max}"
        )))
    }
}

/// A perturbation must fit inside its bounds in at least one direction.
fn check_step(name: &str, (min_step, max_step): (f32, f32), (lo, hi): (f32, f32)) -> Result<()> {
    if min_step > 0.0 && min_step <= max_step && lo < hi && 2.0 * max_step < hi - lo {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{name} step {min_step}..{max_step} does not fit bounds {lo}..{hi}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let config = SimConfig::default();
        assert_eq!(config.world.width, 30);
        assert_eq!(config.world.height, 30);
        assert_eq!(config.energy.max_energy, 15.0);
        assert_eq!(config.mutation.counter_threshold, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "seed": 7, "energy": { "drain_per_tick": 0.1 } }"#;
        let config: SimConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.energy.drain_per_tick, 0.1);
        assert_eq!(config.energy.max_energy, 15.0);
        assert_eq!(config.world.width, 30);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = SimConfig::default();
        config.world.width = 0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.energy.initial_energy_max = 20.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.behavior.lifespan_min = 700;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.mutation.inhibition_step = (0.04, 0.06);
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.initial_population = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_guards_reproduction_and_noise() {
        let mut config = SimConfig::default();
        config.energy.min_reproduce_energy = 0.5;
        config.energy.reproduce_cost = 2.0;
        assert!(matches!(config.validate(), Err(Error::Validation(_))));

        config.energy.min_reproduce_energy = 2.0;
        assert!(config.validate().is_ok());

        let mut config = SimConfig::default();
        config.behavior.fluctuation_amplitude = f32::NAN;
        assert!(matches!(config.validate(), Err(Error::Validation(_))));

        config.behavior.fluctuation_amplitude = -0.1;
        assert!(config.validate().is_err());

        config.behavior.fluctuation_amplitude = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_effect_lookup() {
        let tables = EffectTables::default();
        assert!(tables.zone(ZoneType::Water, Species::A).energy < 0.0);
        assert!(tables.zone(ZoneType::Water, Species::B).energy > 0.0);
        assert_eq!(tables.zone(ZoneType::Normal, Species::A), Delta::ZERO);

        let stormy_winter_night = Climate {
            weather: Weather::Stormy,
            season: Season::Winter,
            day_phase: DayPhase::Night,
        };
        let calm = Climate::default();
        assert!(tables.climate(&stormy_winter_night).stress > 0.0);
        assert!(tables.climate(&calm).stress < 0.0);

        let neutral = EffectTables::neutral();
        assert_eq!(neutral.climate(&stormy_winter_night), Delta::ZERO);
    }
}
