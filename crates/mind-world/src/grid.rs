//! Bounded 2D zone grid.

use mind_core::{Position, WorldConfig, ZoneType};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Terrain type per cell of a bounded (non-wrapping) grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneGrid {
    pub width: i32,
    pub height: i32,
    cells: Vec<ZoneType>,
}

impl ZoneGrid {
    pub fn new(width: i32, height: i32) -> Self {
        let size = (width * height) as usize;
        Self {
            width,
            height,
            cells: vec![ZoneType::Normal; size],
        }
    }

    /// Draw a zone for every cell from the configured probability table.
    ///
    /// Cells are drawn in row-major order. A water draw next to an already
    /// placed water cell becomes normal, so no two water cells touch.
    pub fn generate(config: &WorldConfig, rng: &mut ChaCha8Rng) -> Self {
        let mut grid = Self::new(config.width, config.height);

        let water = config.water_chance;
        let obstacle = water + config.obstacle_chance;
        let cold = obstacle + config.cold_chance;
        let hot = cold + config.hot_chance;

        for y in 0..config.height {
            for x in 0..config.width {
                let pos = Position::new(x, y);
                let roll = rng.gen::<f32>();

                let zone = if roll < water {
                    if grid.touches(pos, ZoneType::Water) {
                        ZoneType::Normal
                    } else {
                        ZoneType::Water
                    }
                } else if roll < obstacle {
                    ZoneType::Obstacle
                } else if roll < cold {
                    ZoneType::Cold
                } else if roll < hot {
                    ZoneType::Hot
                } else {
                    ZoneType::Normal
                };

                grid.set(pos, zone);
            }
        }

        grid
    }

    /// Zone at position, `None` outside the grid
    pub fn get(&self, pos: Position) -> Option<ZoneType> {
        self.index(pos).map(|i| self.cells[i])
    }

    /// Set zone at position; out-of-bounds writes are ignored
    pub fn set(&mut self, pos: Position, zone: ZoneType) {
        if let Some(i) = self.index(pos) {
            self.cells[i] = zone;
        }
    }

    /// Obstacles and cells outside the grid both block movement
    pub fn is_blocked(&self, pos: Position) -> bool {
        !matches!(self.get(pos), Some(zone) if zone != ZoneType::Obstacle)
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.in_bounds(self.width, self.height)
    }

    /// Turn an obstacle back into normal terrain
    pub fn clear_obstacle(&mut self, pos: Position) {
        if self.get(pos) == Some(ZoneType::Obstacle) {
            self.set(pos, ZoneType::Normal);
        }
    }

    /// Whether any Chebyshev neighbour of `pos` has the given zone
    pub fn touches(&self, pos: Position, zone: ZoneType) -> bool {
        (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .any(|(dx, dy)| self.get(pos.add(dx, dy)) == Some(zone))
    }

    pub fn count(&self, zone: ZoneType) -> usize {
        self.cells.iter().filter(|&&z| z == zone).count()
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if self.in_bounds(pos) {
            Some((pos.y * self.width + pos.x) as usize)
        } else {
            None
        }
    }

    /// Get position from index
    pub fn index_to_pos(&self, index: usize) -> Position {
        let x = (index as i32) % self.width;
        let y = (index as i32) / self.width;
        Position::new(x, y)
    }

    /// Iterator over all cells with positions
    pub fn iter(&self) -> impl Iterator<Item = (Position, ZoneType)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, zone)| (self.index_to_pos(i), *zone))
    }
}
