//! Single-line compaction and merge.
//!
//! Every direction reduces to "slide toward index 0" on a line of cells:
//! rows are used as-is for `Left`, reversed for `Right`; columns are
//! extracted top-down for `Up` and bottom-up for `Down`.

use crate::tile::{TileId, TileStore};

/// Slide `line` toward index 0, merging equal neighbours at most once each.
///
/// Returns the points earned (the sum of every merged value). Empty cells
/// end up at the back of the line.
pub(crate) fn slide_line(line: &mut [Option<TileId>], store: &mut TileStore) -> u64 {
    let occupied: Vec<TileId> = line.iter().flatten().copied().collect();
    let mut out: Vec<TileId> = Vec::with_capacity(occupied.len());
    let mut points = 0u64;

    let mut i = 0;
    while i < occupied.len() {
        let front = occupied[i];
        match occupied.get(i + 1) {
            Some(&back) if store.can_merge(front, back) => {
                points += u64::from(store.merge(front, back));
                out.push(front);
                // the merged pair is done; the next candidate is the tile after `back`
                i += 2;
            }
            _ => {
                out.push(front);
                i += 1;
            }
        }
    }

    for (slot, cell) in line.iter_mut().enumerate() {
        *cell = out.get(slot).copied();
    }
    points
}
