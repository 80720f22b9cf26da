//! # Spatial Block Index
//!
//! Maps are split into square blocks of [`BLOCK_SIZE`] cells. Each block lists
//! the units standing in it, so an area query only visits the blocks the box
//! overlaps instead of every unit on the map.

use mapgate_core::{AreaBox, MapId, TilePosition, UnitId};
use std::collections::{BTreeMap, BTreeSet};

/// Block edge length in cells
pub const BLOCK_SIZE: i32 = 8;

type BlockKey = (MapId, i32, i32);

#[inline]
fn block_of(pos: TilePosition) -> (i32, i32) {
    (
        (pos.x as i32).div_euclid(BLOCK_SIZE),
        (pos.y as i32).div_euclid(BLOCK_SIZE),
    )
}

/// Per-map block grid
#[derive(Debug, Default)]
pub struct MapBlocks {
    blocks: BTreeMap<BlockKey, BTreeSet<UnitId>>,
}

impl MapBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: UnitId, map: MapId, pos: TilePosition) {
        let (bx, by) = block_of(pos);
        self.blocks.entry((map, bx, by)).or_default().insert(id);
    }

    pub fn remove(&mut self, id: UnitId, map: MapId, pos: TilePosition) {
        let (bx, by) = block_of(pos);
        let key = (map, bx, by);
        if let Some(block) = self.blocks.get_mut(&key) {
            block.remove(&id);
            if block.is_empty() {
                self.blocks.remove(&key);
            }
        }
    }

    /// Move a unit; no-op when it stays in the same block
    pub fn relocate(&mut self, id: UnitId, map: MapId, from: TilePosition, to: TilePosition) {
        if block_of(from) != block_of(to) {
            self.remove(id, map, from);
            self.insert(id, map, to);
        }
    }

    /// Units in every block the box overlaps
    ///
    /// Candidates only: callers still test exact cell containment, since a
    /// block can stick out of the box.
    pub fn candidates(&self, map: MapId, area: &AreaBox) -> Vec<UnitId> {
        let (bx0, by0) = (area.x0.div_euclid(BLOCK_SIZE), area.y0.div_euclid(BLOCK_SIZE));
        let (bx1, by1) = (area.x1.div_euclid(BLOCK_SIZE), area.y1.div_euclid(BLOCK_SIZE));

        let mut found = Vec::new();
        for bx in bx0..=bx1 {
            let range = (map, bx, by0)..=(map, bx, by1);
            for (_, block) in self.blocks.range(range) {
                found.extend(block.iter().copied());
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_cover_box() {
        let mut blocks = MapBlocks::new();
        let map = MapId::new(1);
        blocks.insert(UnitId::new(1), map, TilePosition::new(100, 100));
        blocks.insert(UnitId::new(2), map, TilePosition::new(114, 114));
        blocks.insert(UnitId::new(3), map, TilePosition::new(200, 200));
        blocks.insert(UnitId::new(4), MapId::new(2), TilePosition::new(100, 100));

        let area = AreaBox::around(TilePosition::new(100, 100), 14);
        let mut found = blocks.candidates(map, &area);
        found.sort();
        assert_eq!(found, vec![UnitId::new(1), UnitId::new(2)]);
    }

    #[test]
    fn test_relocate_between_blocks() {
        let mut blocks = MapBlocks::new();
        let map = MapId::new(1);
        let id = UnitId::new(7);
        blocks.insert(id, map, TilePosition::new(0, 0));
        blocks.relocate(id, map, TilePosition::new(0, 0), TilePosition::new(50, 50));

        let near_origin = AreaBox::around(TilePosition::new(0, 0), 3);
        assert!(blocks.candidates(map, &near_origin).is_empty());
        let near_target = AreaBox::around(TilePosition::new(50, 50), 3);
        assert_eq!(blocks.candidates(map, &near_target), vec![id]);
    }

    #[test]
    fn test_negative_box_edges() {
        let mut blocks = MapBlocks::new();
        let map = MapId::new(1);
        blocks.insert(UnitId::new(1), map, TilePosition::new(1, 1));
        let area = AreaBox::around(TilePosition::new(2, 2), 14);
        assert_eq!(blocks.candidates(map, &area), vec![UnitId::new(1)]);
    }
}
