//! Tile identity and the ID-keyed tile arena.
//!
//! Board cells never hold tiles directly. They hold a [`TileId`], and the
//! tile itself lives in a [`TileStore`] owned by the board. A merge keeps
//! the front tile's entry, doubles it, and drops the absorbed tile's entry.

use std::collections::HashMap;
use std::fmt;

use ahash::RandomState as AHasher;
use serde::{Deserialize, Serialize};

/// Unique identity of a tile on one board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileId(u64);

impl TileId {
    #[inline]
    pub fn raw(self) -> u64 { self.0 }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out strictly increasing tile IDs. Each board owns its own allocator.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self { Self::default() }

    #[inline]
    pub fn allocate(&mut self) -> TileId {
        let id = TileId(self.next);
        self.next += 1;
        id
    }
}

/// A live tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    id: TileId,
    value: u32,
    merged_from: Vec<TileId>,
    merged_this_turn: bool,
}

impl Tile {
    #[inline]
    pub fn id(&self) -> TileId { self.id }

    /// Face value: 2, 4, 8, ...
    #[inline]
    pub fn value(&self) -> u32 { self.value }

    /// IDs of the two tiles consumed to produce this one during the current
    /// turn, front tile first. Empty if the tile was not produced by a merge.
    #[inline]
    pub fn merged_from(&self) -> &[TileId] { &self.merged_from }

    #[inline]
    pub fn merged_this_turn(&self) -> bool { self.merged_this_turn }

    fn clear_turn_flags(&mut self) {
        self.merged_from.clear();
        self.merged_this_turn = false;
    }
}

/// Arena of live tiles keyed by ID.
#[derive(Debug, Clone, Default)]
pub(crate) struct TileStore {
    tiles: HashMap<TileId, Tile, AHasher>,
    ids: IdAllocator,
}

impl TileStore {
    pub(crate) fn new() -> Self { Self::default() }

    /// Create a fresh tile with a newly allocated ID.
    pub(crate) fn create(&mut self, value: u32) -> TileId {
        debug_assert!(value.is_power_of_two() && value >= 2, "tile value {value} is not a power of two");
        let id = self.ids.allocate();
        self.tiles.insert(id, Tile { id, value, merged_from: Vec::new(), merged_this_turn: false });
        id
    }

    #[inline]
    pub(crate) fn get(&self, id: TileId) -> Option<&Tile> { self.tiles.get(&id) }

    #[inline]
    pub(crate) fn value(&self, id: TileId) -> u32 {
        self.tiles.get(&id).map_or(0, |t| t.value)
    }

    /// True if both tiles exist, share a value, neither merged this turn,
    /// and the doubled value still fits in a `u32`.
    pub(crate) fn can_merge(&self, front: TileId, back: TileId) -> bool {
        match (self.tiles.get(&front), self.tiles.get(&back)) {
            (Some(a), Some(b)) => {
                a.value == b.value
                    && !a.merged_this_turn
                    && !b.merged_this_turn
                    && a.value.checked_mul(2).is_some()
            }
            _ => false,
        }
    }

    /// Absorb `back` into `front`. Returns the doubled value.
    ///
    /// The caller must have checked [`Self::can_merge`].
    pub(crate) fn merge(&mut self, front: TileId, back: TileId) -> u32 {
        self.tiles.remove(&back);
        match self.tiles.get_mut(&front) {
            Some(tile) => {
                debug_assert!(tile.value.checked_mul(2).is_some(), "merging {} would overflow", tile.value);
                tile.value = tile.value.saturating_mul(2);
                tile.merged_this_turn = true;
                tile.merged_from.clear();
                tile.merged_from.push(front);
                tile.merged_from.push(back);
                tile.value
            }
            None => 0,
        }
    }

    pub(crate) fn clear_turn_flags(&mut self) {
        self.tiles.values_mut().for_each(Tile::clear_turn_flags);
    }

    #[inline]
    pub(crate) fn len(&self) -> usize { self.tiles.len() }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Tile> { self.tiles.values() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();
        let c = ids.allocate();
        assert!(a < b && b < c);
    }

    #[test]
    fn separate_allocators_do_not_share_state() {
        let mut first = IdAllocator::new();
        let mut second = IdAllocator::new();
        first.allocate();
        first.allocate();
        assert_eq!(second.allocate().raw(), 0);
    }

    #[test]
    fn merge_keeps_front_identity() {
        let mut store = TileStore::new();
        let a = store.create(2);
        let b = store.create(2);
        assert!(store.can_merge(a, b));
        assert_eq!(store.merge(a, b), 4);
        let merged = store.get(a).unwrap();
        assert_eq!(merged.value(), 4);
        assert_eq!(merged.merged_from(), &[a, b]);
        assert!(merged.merged_this_turn());
        assert!(store.get(b).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn merged_tile_is_locked_until_flags_clear() {
        let mut store = TileStore::new();
        let a = store.create(2);
        let b = store.create(2);
        let c = store.create(4);
        store.merge(a, b);
        assert!(!store.can_merge(a, c));
        store.clear_turn_flags();
        assert!(store.can_merge(a, c));
        assert!(store.get(a).unwrap().merged_from().is_empty());
    }

    #[test]
    fn largest_value_does_not_merge() {
        let mut store = TileStore::new();
        let a = store.create(1 << 31);
        let b = store.create(1 << 31);
        assert!(!store.can_merge(a, b));
        let c = store.create(1 << 30);
        let d = store.create(1 << 30);
        assert!(store.can_merge(c, d));
        assert_eq!(store.merge(c, d), 1 << 31);
    }

    #[test]
    fn unequal_values_do_not_merge() {
        let mut store = TileStore::new();
        let a = store.create(2);
        let b = store.create(4);
        assert!(!store.can_merge(a, b));
    }
}
