//! World context shared by every creature: zones, climate, resources.

use crate::grid::ZoneGrid;
use mind_core::{
    Climate, ClimateConfig, DayPhase, Error, Position, Result, Season, SimConfig, Weather,
    WorldConfig, ZoneType,
};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use tracing::{debug, trace};

/// Attempts made when looking for a random open cell
const PLACEMENT_ATTEMPTS: usize = 100;

/// Climate fields pinned by a manual set; auto-cycling leaves them alone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ClimateHold {
    weather: bool,
    season: bool,
    day_phase: bool,
}

#[derive(Debug, Clone)]
pub struct Environment {
    pub grid: ZoneGrid,
    climate: Climate,
    held: ClimateHold,
    /// Live resources in insertion order; the first of equally near resources wins
    resources: Vec<Position>,
    regen_zones: HashSet<Position>,
}

impl Environment {
    pub fn new(grid: ZoneGrid, climate: Climate) -> Self {
        Self {
            grid,
            climate,
            held: ClimateHold::default(),
            resources: Vec::new(),
            regen_zones: HashSet::new(),
        }
    }

    /// Build the zone grid, resources and regeneration cells from configuration
    pub fn generate(config: &SimConfig, rng: &mut ChaCha8Rng) -> Self {
        let grid = if config.features.zones {
            ZoneGrid::generate(&config.world, rng)
        } else {
            ZoneGrid::new(config.world.width, config.world.height)
        };
        let mut env = Self::new(grid, config.climate.initial);

        for _ in 0..config.world.initial_resources {
            if let Some(pos) = env.random_open_cell(rng, |env, pos| !env.has_resource(pos)) {
                env.resources.push(pos);
            }
        }

        if config.features.regen_zones {
            for _ in 0..config.world.regen_zone_count {
                if let Some(pos) = env.random_open_cell(rng, |env, pos| !env.is_regen_zone(pos)) {
                    env.regen_zones.insert(pos);
                }
            }
        }

        debug!(
            obstacles = env.grid.count(ZoneType::Obstacle),
            water = env.grid.count(ZoneType::Water),
            resources = env.resources.len(),
            regen_zones = env.regen_zones.len(),
            "Environment generated"
        );

        env
    }

    pub fn width(&self) -> i32 {
        self.grid.width
    }

    pub fn height(&self) -> i32 {
        self.grid.height
    }

    pub fn zone_at(&self, pos: Position) -> Option<ZoneType> {
        self.grid.get(pos)
    }

    /// Regenerate zones in place ("reset zones").
    ///
    /// Cells in `occupied` never become obstacles, and resources that end up
    /// on an obstacle are dropped.
    pub fn reset_zones(
        &mut self,
        config: &WorldConfig,
        rng: &mut ChaCha8Rng,
        occupied: &HashSet<Position>,
    ) {
        let mut grid = ZoneGrid::generate(config, rng);
        for pos in occupied {
            grid.clear_obstacle(*pos);
        }
        self.grid = grid;

        let before = self.resources.len();
        let grid = &self.grid;
        self.resources.retain(|pos| !grid.is_blocked(*pos));
        self.regen_zones.retain(|pos| !grid.is_blocked(*pos));

        debug!(
            obstacles = self.grid.count(ZoneType::Obstacle),
            resources_dropped = before - self.resources.len(),
            "Zones reset"
        );
    }

    // Climate

    pub fn climate(&self) -> Climate {
        self.climate
    }

    /// Set and hold the weather until it is set again
    pub fn set_weather(&mut self, weather: Weather) {
        self.climate.weather = weather;
        self.held.weather = true;
    }

    pub fn set_season(&mut self, season: Season) {
        self.climate.season = season;
        self.held.season = true;
    }

    pub fn set_day_phase(&mut self, day_phase: DayPhase) {
        self.climate.day_phase = day_phase;
        self.held.day_phase = true;
    }

    /// Redraw each climate field whose interval divides `tick`, uniformly at random.
    /// Fields set by hand are skipped.
    ///
    /// Returns whether the climate changed.
    pub fn advance_climate(&mut self, tick: u64, config: &ClimateConfig, rng: &mut ChaCha8Rng) -> bool {
        if !config.auto_cycle {
            return false;
        }

        let before = self.climate;
        if !self.held.weather && due(tick, config.weather_interval) {
            self.climate.weather = pick(Weather::ALL, rng, self.climate.weather);
        }
        if !self.held.season && due(tick, config.season_interval) {
            self.climate.season = pick(Season::ALL, rng, self.climate.season);
        }
        if !self.held.day_phase && due(tick, config.day_phase_interval) {
            self.climate.day_phase = pick(DayPhase::ALL, rng, self.climate.day_phase);
        }

        before != self.climate
    }

    // Resources

    pub fn resources(&self) -> &[Position] {
        &self.resources
    }

    pub fn has_resource(&self, pos: Position) -> bool {
        self.resources.contains(&pos)
    }

    /// Place a resource; rejects cells outside the grid, obstacles and duplicates
    pub fn add_resource(&mut self, pos: Position) -> Result<()> {
        if !self.grid.in_bounds(pos) {
            return Err(Error::OutOfBounds(pos, self.width(), self.height()));
        }
        if self.grid.is_blocked(pos) || self.has_resource(pos) {
            return Err(Error::Occupied(pos));
        }
        self.resources.push(pos);
        Ok(())
    }

    /// Remove the resource at `pos`. True exactly once per resource.
    pub fn consume_resource(&mut self, pos: Position) -> bool {
        match self.resources.iter().position(|&r| r == pos) {
            Some(index) => {
                self.resources.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear_resources(&mut self) {
        self.resources.clear();
    }

    /// Nearest live resource by Manhattan distance
    pub fn nearest_resource(&self, from: Position) -> Option<Position> {
        nearest(from, self.resources.iter().copied())
    }

    /// Maybe spawn one resource on a random open cell
    pub fn regenerate_resources(&mut self, config: &WorldConfig, rng: &mut ChaCha8Rng) -> Option<Position> {
        if self.resources.len() >= config.max_resources {
            return None;
        }
        if rng.gen::<f32>() >= config.resource_spawn_chance {
            return None;
        }

        let pos = self.random_open_cell(rng, |env, pos| !env.has_resource(pos))?;
        self.resources.push(pos);
        trace!(x = pos.x, y = pos.y, "Resource spawned");
        Some(pos)
    }

    // Regeneration cells

    pub fn is_regen_zone(&self, pos: Position) -> bool {
        self.regen_zones.contains(&pos)
    }

    pub fn regen_zone_count(&self) -> usize {
        self.regen_zones.len()
    }

    /// A random non-obstacle cell that also satisfies `accept`
    pub fn random_open_cell<F>(&self, rng: &mut ChaCha8Rng, accept: F) -> Option<Position>
    where
        F: Fn(&Self, Position) -> bool,
    {
        for _ in 0..PLACEMENT_ATTEMPTS {
            let pos = Position::new(
                rng.gen_range(0..self.width()),
                rng.gen_range(0..self.height()),
            );
            if !self.grid.is_blocked(pos) && accept(self, pos) {
                return Some(pos);
            }
        }
        None
    }
}

/// Nearest candidate by Manhattan distance; ties go to the earliest candidate
pub fn nearest(from: Position, candidates: impl Iterator<Item = Position>) -> Option<Position> {
    candidates.fold(None, |best: Option<Position>, pos| match best {
        Some(b) if b.manhattan_distance(&from) <= pos.manhattan_distance(&from) => Some(b),
        _ => Some(pos),
    })
}

fn due(tick: u64, interval: u64) -> bool {
    interval > 0 && tick > 0 && tick % interval == 0
}

fn pick<T: Copy>(values: &[T], rng: &mut ChaCha8Rng, fallback: T) -> T {
    values.choose(rng).copied().unwrap_or(fallback)
}
