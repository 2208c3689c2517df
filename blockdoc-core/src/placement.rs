//! Grid placement for newly inserted blocks.
//!
//! New blocks are packed into a single active row: each one lands at the
//! right edge of the widest block already occupying that row. Gaps left by
//! deletions are never reused and the row never wraps; reflow and scrolling
//! belong to the grid widget.

use crate::{Block, GridPosition};

/// Row index new blocks are packed into unless configured otherwise.
pub const DEFAULT_ACTIVE_ROW: u32 = 0;

/// Computes coordinates for new blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementEngine {
    active_row: u32,
}

impl PlacementEngine {
    /// Create an engine packing into `active_row`.
    #[must_use]
    pub const fn new(active_row: u32) -> Self {
        Self { active_row }
    }

    /// The row new blocks are packed into.
    #[must_use]
    pub const fn active_row(&self) -> u32 {
        self.active_row
    }

    /// Position for a new block `cols` wide, given the existing blocks.
    ///
    /// The result depends only on blocks occupying the active row, so it is
    /// the same for any ordering of the same list.
    #[must_use]
    pub fn place(&self, existing: &[Block], cols: u32) -> GridPosition {
        let x = existing
            .iter()
            .filter(|block| block.occupies_row(self.active_row))
            .map(Block::right_edge)
            .max()
            .unwrap_or(0);
        tracing::trace!(x, y = self.active_row, cols, "Placed new block");
        GridPosition {
            x,
            y: self.active_row,
        }
    }
}

impl Default for PlacementEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVE_ROW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlockId, BlockKind};

    fn block(id: u64, x: u32, y: u32, cols: u32, rows: u32) -> Block {
        Block::new(
            BlockId::from_raw(id),
            BlockKind::Text,
            GridPosition { x, y },
            cols,
            rows,
        )
    }

    #[test]
    fn test_empty_grid_places_at_origin_of_active_row() {
        let engine = PlacementEngine::new(3);
        assert_eq!(engine.place(&[], 1), GridPosition { x: 0, y: 3 });
    }

    #[test]
    fn test_places_at_max_right_edge() {
        let engine = PlacementEngine::default();
        let existing = vec![block(1, 0, 0, 1, 1), block(2, 4, 0, 2, 1), block(3, 1, 0, 1, 1)];
        assert_eq!(engine.place(&existing, 1), GridPosition { x: 6, y: 0 });
    }

    #[test]
    fn test_ignores_blocks_off_the_active_row() {
        let engine = PlacementEngine::default();
        let existing = vec![block(1, 0, 0, 1, 1), block(2, 0, 1, 9, 1)];
        assert_eq!(engine.place(&existing, 1), GridPosition { x: 1, y: 0 });
    }

    #[test]
    fn test_tall_block_above_counts_when_it_reaches_the_row() {
        let engine = PlacementEngine::new(1);
        let existing = vec![block(1, 0, 0, 3, 2)];
        assert_eq!(engine.place(&existing, 1), GridPosition { x: 3, y: 1 });
    }

    #[test]
    fn test_gaps_are_not_reused() {
        let engine = PlacementEngine::default();
        let existing = vec![block(2, 1, 0, 1, 1)];
        assert_eq!(engine.place(&existing, 1), GridPosition { x: 2, y: 0 });
    }

    #[test]
    fn test_order_independent() {
        let engine = PlacementEngine::default();
        let mut existing = vec![block(1, 0, 0, 2, 1), block(2, 2, 0, 3, 1), block(3, 5, 0, 1, 1)];
        let forward = engine.place(&existing, 2);
        existing.reverse();
        assert_eq!(engine.place(&existing, 2), forward);
    }

    #[test]
    fn test_row_never_wraps() {
        let engine = PlacementEngine::default();
        let existing: Vec<_> = (0..100_u32).map(|i| block(u64::from(i), i, 0, 1, 1)).collect();
        assert_eq!(engine.place(&existing, 1), GridPosition { x: 100, y: 0 });
    }
}
