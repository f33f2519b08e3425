//! Board snapshots and per-tile movement reconstruction.
//!
//! A [`Snapshot`] is plain data: for every occupied cell, the tile ID, its
//! value and the IDs it was merged from. Two snapshots taken around a move
//! are enough to rebuild every tile's trajectory without touching the board.

use std::collections::HashMap;
use std::fmt;

use ahash::RandomState as AHasher;
use serde::{Deserialize, Serialize};

use crate::tile::{Tile, TileId};

/// A cell coordinate, row-major from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    #[inline]
    pub const fn new(row: usize, col: usize) -> Self { Self { row, col } }

    /// Signed row distance from `other` to `self`.
    #[inline]
    pub fn row_offset(self, other: Position) -> isize { self.row as isize - other.row as isize }

    /// Signed column distance from `other` to `self`.
    #[inline]
    pub fn col_offset(self, other: Position) -> isize { self.col as isize - other.col as isize }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// One tile's displacement during a move.
///
/// When two tiles merge, the destination cell receives two records, one per
/// source tile, both carrying the merged `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub from: Position,
    pub to: Position,
    pub tile_id: TileId,
    /// Value of the tile at `to` after the move.
    pub value: u32,
}

impl Movement {
    /// True if the tile stayed in its cell.
    #[inline]
    pub fn is_stationary(&self) -> bool { self.from == self.to }
}

/// Occupant of a snapshot cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTile {
    pub id: TileId,
    pub value: u32,
    pub merged_from: Vec<TileId>,
}

impl From<&Tile> for SnapshotTile {
    fn from(tile: &Tile) -> Self {
        Self { id: tile.id(), value: tile.value(), merged_from: tile.merged_from().to_vec() }
    }
}

/// Immutable copy of a board's cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    width: usize,
    height: usize,
    cells: Vec<Option<SnapshotTile>>,
}

impl Snapshot {
    /// Build a snapshot from row-major cells.
    pub fn new(width: usize, height: usize, cells: Vec<Option<SnapshotTile>>) -> Self {
        assert_eq!(cells.len(), width * height, "snapshot cell count does not match {width}x{height}");
        Self { width, height, cells }
    }

    #[inline]
    pub fn width(&self) -> usize { self.width }

    #[inline]
    pub fn height(&self) -> usize { self.height }

    pub fn get(&self, pos: Position) -> Option<&SnapshotTile> {
        if pos.row >= self.height || pos.col >= self.width {
            return None;
        }
        self.cells.get(pos.row * self.width + pos.col).and_then(Option::as_ref)
    }

    /// True if the cell count matches the dimensions. Always holds for
    /// snapshots built with [`Snapshot::new`]; decoded ones must be checked.
    pub fn is_well_formed(&self) -> bool {
        self.width.checked_mul(self.height) == Some(self.cells.len())
    }

    /// Face values row-major, 0 for empty cells.
    pub fn values(&self) -> Vec<u32> {
        self.cells.iter().map(|c| c.as_ref().map_or(0, |t| t.value)).collect()
    }

    /// Occupied cells with their positions, row-major.
    pub fn occupied(&self) -> impl Iterator<Item = (Position, &SnapshotTile)> + '_ {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(idx, c)| c.as_ref().map(|t| (Position::new(idx / width, idx % width), t)))
    }

    /// Map from tile ID to its position.
    pub fn positions(&self) -> HashMap<TileId, Position, AHasher> {
        let mut map = HashMap::with_capacity_and_hasher(self.cells.len(), AHasher::new());
        for (pos, tile) in self.occupied() {
            map.insert(tile.id, pos);
        }
        map
    }
}

/// Reconstruct tile movements between two snapshots of the same board.
///
/// Each tile in `after` contributes its `merged_from` IDs, or its own ID if
/// it was not merged. Every origin that existed in `before` yields exactly one
/// [`Movement`]; origins are consumed on first use. Tiles that did not exist
/// in `before` (fresh spawns) yield nothing. Output is row-major by
/// destination.
pub fn resolve_movements(before: &Snapshot, after: &Snapshot) -> Vec<Movement> {
    let mut origins = before.positions();
    let mut movements = Vec::with_capacity(origins.len());

    for (to, tile) in after.occupied() {
        let own = [tile.id];
        let sources: &[TileId] = if tile.merged_from.is_empty() { &own } else { &tile.merged_from };
        for &origin in sources {
            if let Some(from) = origins.remove(&origin) {
                movements.push(Movement { from, to, tile_id: origin, value: tile.value });
            }
        }
    }
    movements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::IdAllocator;

    fn tile(id: TileId, value: u32, merged_from: &[TileId]) -> Option<SnapshotTile> {
        Some(SnapshotTile { id, value, merged_from: merged_from.to_vec() })
    }

    fn empty_cells() -> Vec<Option<SnapshotTile>> { vec![None; 16] }

    #[test]
    fn merge_yields_two_records_into_one_cell() {
        let mut ids = IdAllocator::new();
        let id1 = ids.allocate();
        let id2 = ids.allocate();

        let mut pre = empty_cells();
        pre[0] = tile(id1, 2, &[]);
        pre[1] = tile(id2, 2, &[]);
        let mut post = empty_cells();
        post[0] = tile(id1, 4, &[id1, id2]);

        let moves = resolve_movements(&Snapshot::new(4, 4, pre), &Snapshot::new(4, 4, post));
        assert_eq!(moves.len(), 2);
        assert!(moves.contains(&Movement { from: Position::new(0, 0), to: Position::new(0, 0), tile_id: id1, value: 4 }));
        assert!(moves.contains(&Movement { from: Position::new(0, 1), to: Position::new(0, 0), tile_id: id2, value: 4 }));
    }

    #[test]
    fn spawned_tiles_are_not_reported() {
        let mut ids = IdAllocator::new();
        let moved = ids.allocate();
        let spawned = ids.allocate();

        let mut pre = empty_cells();
        pre[3] = tile(moved, 8, &[]);
        let mut post = empty_cells();
        post[0] = tile(moved, 8, &[]);
        post[10] = tile(spawned, 2, &[]);

        let moves = resolve_movements(&Snapshot::new(4, 4, pre), &Snapshot::new(4, 4, post));
        assert_eq!(moves, vec![Movement { from: Position::new(0, 3), to: Position::new(0, 0), tile_id: moved, value: 8 }]);
    }

    #[test]
    fn origin_is_reported_once() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();

        let mut pre = empty_cells();
        pre[0] = tile(a, 2, &[]);
        pre[1] = tile(b, 2, &[]);
        // `a` appears both as its own tile and inside another tile's sources
        let mut post = empty_cells();
        post[0] = tile(a, 4, &[a, b]);
        post[4] = tile(b, 2, &[a]);

        let moves = resolve_movements(&Snapshot::new(4, 4, pre), &Snapshot::new(4, 4, post));
        let reported: Vec<TileId> = moves.iter().map(|m| m.tile_id).collect();
        assert_eq!(reported, vec![a, b]);
    }

    #[test]
    fn identical_snapshots_are_all_stationary() {
        let mut ids = IdAllocator::new();
        let mut cells = empty_cells();
        cells[5] = tile(ids.allocate(), 2, &[]);
        cells[15] = tile(ids.allocate(), 32, &[]);
        let snap = Snapshot::new(4, 4, cells);
        let moves = resolve_movements(&snap, &snap);
        assert_eq!(moves.len(), 2);
        assert!(moves.iter().all(Movement::is_stationary));
    }

    #[test]
    fn position_offsets() {
        let a = Position::new(3, 1);
        let b = Position::new(0, 2);
        assert_eq!(a.row_offset(b), 3);
        assert_eq!(a.col_offset(b), -1);
    }

    #[derive(Serialize)]
    struct RawSnapshot {
        width: usize,
        height: usize,
        cells: Vec<Option<SnapshotTile>>,
    }

    fn short_snapshot() -> Snapshot {
        let raw = RawSnapshot { width: 4, height: 4, cells: vec![None; 3] };
        postcard::from_bytes(&postcard::to_allocvec(&raw).unwrap()).unwrap()
    }

    #[test]
    fn decoded_short_snapshot_is_not_indexed_out_of_bounds() {
        let snap = short_snapshot();
        assert!(!snap.is_well_formed());
        assert_eq!(snap.get(Position::new(3, 3)), None);
        assert_eq!(snap.get(Position::new(0, 1)), None);
    }

    #[test]
    fn snapshot_round_trips_through_postcard() {
        let mut ids = IdAllocator::new();
        let mut cells = empty_cells();
        cells[2] = tile(ids.allocate(), 1024, &[]);
        let snap = Snapshot::new(4, 4, cells);
        let bytes = postcard::to_allocvec(&snap).unwrap();
        let loaded: Snapshot = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(snap, loaded);
    }
}
