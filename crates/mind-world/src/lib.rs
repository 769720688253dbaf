//! World simulation engine.
//!
//! A bounded 2D grid of zones with a climate, consumable resources and a
//! population of creatures whose stress, energy and mood evolve one tick at a
//! time.

pub mod grid;
pub mod environment;
pub mod agent;
pub mod event;
pub mod population;
pub mod simulation;
pub mod snapshot;

pub use agent::{AgentOutcome, Creature, DeathCause, Habitat};
pub use environment::Environment;
pub use event::TickEvent;
pub use grid::ZoneGrid;
pub use population::Population;
pub use simulation::{Simulation, SimulationResult, TickReport};
pub use snapshot::WorldSnapshot;
