//! Core type definitions for the simulation.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a creature. Allocated monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 2D position in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn add(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Clamp onto a bounded grid of the given dimensions
    pub fn clamp(&self, width: i32, height: i32) -> Self {
        Self {
            x: self.x.clamp(0, width - 1),
            y: self.y.clamp(0, height - 1),
        }
    }

    pub fn in_bounds(&self, width: i32, height: i32) -> bool {
        self.x >= 0 && self.x < width && self.y >= 0 && self.y < height
    }

    /// Manhattan distance to another position
    pub fn manhattan_distance(&self, other: &Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Chebyshev (king-move) distance to another position
    pub fn chebyshev_distance(&self, other: &Position) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// One greedy step toward `target`, moving by the sign of each axis delta
    pub fn step_toward(&self, target: &Position) -> Self {
        self.add((target.x - self.x).signum(), (target.y - self.y).signum())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Direction for movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Direction {
    pub fn to_delta(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::NorthWest => (-1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
        }
    }

    pub fn all() -> [Direction; 8] {
        [
            Direction::North,
            Direction::South,
            Direction::East,
            Direction::West,
            Direction::NorthEast,
            Direction::NorthWest,
            Direction::SouthEast,
            Direction::SouthWest,
        ]
    }
}

/// Implements `as_str`, `Display` and `FromStr` over a closed set of lowercase tags.
/// Unknown tags are rejected when parsed, never later.
macro_rules! closed_tags {
    ($ty:ident, $kind:literal, { $($variant:ident => $tag:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $tag),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok($ty::$variant),)+
                    other => Err(Error::UnknownTag {
                        kind: $kind,
                        tag: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Creature species. Fixed at creation; affects how zones act on the creature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    A,
    B,
}

closed_tags!(Species, "species", { A => "a", B => "b" });

/// Derived classification of a creature's (stress, energy) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Neutral,
    Stressed,
    Angry,
}

closed_tags!(Mood, "mood", {
    Happy => "happy",
    Neutral => "neutral",
    Stressed => "stressed",
    Angry => "angry",
});

impl Mood {
    /// Energy a creature needs (strictly above) to count as happy
    pub const HAPPY_ENERGY: f32 = 6.0;

    /// Pure function of stress and energy. Checked in this order.
    pub fn classify(stress: f32, energy: f32) -> Mood {
        if stress < 0.3 && energy > Self::HAPPY_ENERGY {
            Mood::Happy
        } else if stress > 0.7 {
            Mood::Angry
        } else if stress > 0.4 {
            Mood::Stressed
        } else {
            Mood::Neutral
        }
    }
}

/// Terrain type of a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneType {
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "water")]
    Water,
    #[serde(rename = "obstacle")]
    Obstacle,
    #[serde(rename = "cold_zone")]
    Cold,
    #[serde(rename = "hot_zone")]
    Hot,
}

closed_tags!(ZoneType, "zone", {
    Normal => "normal",
    Water => "water",
    Obstacle => "obstacle",
    Cold => "cold_zone",
    Hot => "hot_zone",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    Sunny,
    Cloudy,
    Rainy,
    Stormy,
}

closed_tags!(Weather, "weather", {
    Sunny => "sunny",
    Cloudy => "cloudy",
    Rainy => "rainy",
    Stormy => "stormy",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

closed_tags!(Season, "season", {
    Spring => "spring",
    Summer => "summer",
    Fall => "fall",
    Winter => "winter",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPhase {
    Day,
    Night,
}

closed_tags!(DayPhase, "day phase", { Day => "day", Night => "night" });

/// Environmental context shared by every creature during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Climate {
    pub weather: Weather,
    pub season: Season,
    pub day_phase: DayPhase,
}

impl Default for Climate {
    fn default() -> Self {
        Self {
            weather: Weather::Sunny,
            season: Season::Spring,
            day_phase: DayPhase::Day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_position_clamp() {
        let pos = Position::new(-1, 12);
        assert_eq!(pos.clamp(10, 10), Position::new(0, 9));

        let pos = Position::new(4, 4);
        assert_eq!(pos.clamp(10, 10), pos);
        assert!(pos.in_bounds(10, 10));
        assert!(!Position::new(10, 0).in_bounds(10, 10));
    }

    #[test]
    fn test_distances() {
        let pos1 = Position::new(0, 0);
        let pos2 = Position::new(3, 4);
        assert_eq!(pos1.manhattan_distance(&pos2), 7);
        assert_eq!(pos1.chebyshev_distance(&pos2), 4);
    }

    #[test]
    fn test_step_toward() {
        let pos = Position::new(2, 2);
        assert_eq!(pos.step_toward(&Position::new(5, 0)), Position::new(3, 1));
        assert_eq!(pos.step_toward(&Position::new(2, 2)), pos);
        assert_eq!(pos.step_toward(&Position::new(2, 9)), Position::new(2, 3));
    }

    #[test]
    fn test_direction_delta() {
        assert_eq!(Direction::North.to_delta(), (0, -1));
        assert_eq!(Direction::South.to_delta(), (0, 1));
        assert_eq!(Direction::East.to_delta(), (1, 0));
        assert_eq!(Direction::West.to_delta(), (-1, 0));
    }

    #[test]
    fn test_mood_thresholds() {
        assert_eq!(Mood::classify(0.1, 8.0), Mood::Happy);
        assert_eq!(Mood::classify(0.1, 6.0), Mood::Neutral);
        assert_eq!(Mood::classify(0.8, 14.0), Mood::Angry);
        assert_eq!(Mood::classify(0.5, 14.0), Mood::Stressed);
        assert_eq!(Mood::classify(0.35, 14.0), Mood::Neutral);
        assert_eq!(Mood::classify(0.7, 1.0), Mood::Stressed);
    }

    #[test]
    fn test_unknown_tags_rejected() {
        assert_eq!("cold_zone".parse::<ZoneType>().unwrap(), ZoneType::Cold);
        assert_eq!("b".parse::<Species>().unwrap(), Species::B);
        assert!("c".parse::<Species>().is_err());
        assert!("ecstatic".parse::<Mood>().is_err());
        assert!("hail".parse::<Weather>().is_err());
    }

    #[test]
    fn test_tags_match_serde() {
        for zone in ZoneType::ALL {
            let json = serde_json::to_string(zone).unwrap();
            assert_eq!(json, format!("\"{}\"", zone.as_str()));
        }
        for species in Species::ALL {
            let json = serde_json::to_string(species).unwrap();
            assert_eq!(json, format!("\"{}\"", species.as_str()));
        }
    }

    proptest! {
        #[test]
        fn prop_mood_matches_rule(stress in 0.0f32..=1.0, energy in 0.0f32..=15.0) {
            let mood = Mood::classify(stress, energy);
            let expected = if stress < 0.3 && energy > 6.0 {
                Mood::Happy
            } else if stress > 0.7 {
                Mood::Angry
            } else if stress > 0.4 {
                Mood::Stressed
            } else {
                Mood::Neutral
            };
            prop_assert_eq!(mood, expected);
        }

        #[test]
        fn prop_clamp_is_in_bounds(x in -50i32..50, y in -50i32..50, w in 1i32..30, h in 1i32..30) {
            prop_assert!(Position::new(x, y).clamp(w, h).in_bounds(w, h));
        }
    }
}
