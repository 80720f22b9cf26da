//! Position types for game objects

use serde::{Deserialize, Serialize};

/// Cell position on a map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePosition {
    pub x: i16,
    pub y: i16,
}

impl TilePosition {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance, the metric area boxes are built on
    pub fn distance_to(self, other: TilePosition) -> u16 {
        let dx = (self.x as i32 - other.x as i32).unsigned_abs();
        let dy = (self.y as i32 - other.y as i32).unsigned_abs();
        dx.max(dy).min(u16::MAX as u32) as u16
    }
}

/// Inclusive rectangle of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl AreaBox {
    /// Square of the given radius centered on `center`
    pub fn around(center: TilePosition, radius: u16) -> Self {
        let r = radius as i32;
        Self {
            x0: center.x as i32 - r,
            y0: center.y as i32 - r,
            x1: center.x as i32 + r,
            y1: center.y as i32 + r,
        }
    }

    pub fn contains(&self, pos: TilePosition) -> bool {
        let (x, y) = (pos.x as i32, pos.y as i32);
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }
}
