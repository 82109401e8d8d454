use std::collections::{HashMap, HashSet};

use spacetimedb::{ReducerContext, Table};

use crate::config::{GRID_CELL_SIZE, MAP_SIZE};
use crate::utils::segment_intersects_rect;
use crate::world_object::world_object as WorldObjectTableTrait;

// Uniform grid over the square map. Objects are registered in every cell
// their AABB overlaps, so region and sweep queries only touch nearby buckets.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridEntry {
    pub sid: u32,
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

#[derive(Debug, Default, Clone)]
pub struct SpatialGrid {
    cells: HashMap<(i32, i32), Vec<u32>>,
    entries: HashMap<u32, GridEntry>,
}

fn cell_range(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> (i32, i32, i32, i32) {
    let max_cell = (MAP_SIZE / GRID_CELL_SIZE).ceil() as i32;
    let cx0 = ((min_x / GRID_CELL_SIZE).floor() as i32).clamp(0, max_cell);
    let cy0 = ((min_y / GRID_CELL_SIZE).floor() as i32).clamp(0, max_cell);
    let cx1 = ((max_x / GRID_CELL_SIZE).floor() as i32).clamp(0, max_cell);
    let cy1 = ((max_y / GRID_CELL_SIZE).floor() as i32).clamp(0, max_cell);
    (cx0, cy0, cx1, cy1)
}

impl SpatialGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers an entry in every cell its AABB overlaps. Inserting a sid
    /// that is already present replaces the old registration instead of
    /// duplicating it.
    pub fn insert(&mut self, entry: GridEntry) {
        if self.entries.contains_key(&entry.sid) {
            self.remove(entry.sid);
        }
        let (cx0, cy0, cx1, cy1) = cell_range(
            entry.x - entry.scale,
            entry.y - entry.scale,
            entry.x + entry.scale,
            entry.y + entry.scale,
        );
        for cy in cy0..=cy1 {
            for cx in cx0..=cx1 {
                self.cells.entry((cx, cy)).or_default().push(entry.sid);
            }
        }
        self.entries.insert(entry.sid, entry);
    }

    /// Removes an entry from all of its cells. Removing an absent sid is a
    /// no-op.
    pub fn remove(&mut self, sid: u32) {
        let Some(entry) = self.entries.remove(&sid) else {
            return;
        };
        let (cx0, cy0, cx1, cy1) = cell_range(
            entry.x - entry.scale,
            entry.y - entry.scale,
            entry.x + entry.scale,
            entry.y + entry.scale,
        );
        for cy in cy0..=cy1 {
            for cx in cx0..=cx1 {
                if let Some(bucket) = self.cells.get_mut(&(cx, cy)) {
                    bucket.retain(|&s| s != sid);
                    if bucket.is_empty() {
                        self.cells.remove(&(cx, cy));
                    }
                }
            }
        }
    }

    /// Moves an entry, re-bucketing only when its covered cell range changed.
    pub fn relocate(&mut self, sid: u32, new_x: f32, new_y: f32) {
        let Some(&old) = self.entries.get(&sid) else {
            return;
        };
        let old_range = cell_range(
            old.x - old.scale,
            old.y - old.scale,
            old.x + old.scale,
            old.y + old.scale,
        );
        let new_range = cell_range(
            new_x - old.scale,
            new_y - old.scale,
            new_x + old.scale,
            new_y + old.scale,
        );
        if old_range == new_range {
            let entry = self.entries.get_mut(&sid).unwrap();
            entry.x = new_x;
            entry.y = new_y;
        } else {
            self.insert(GridEntry { sid, x: new_x, y: new_y, scale: old.scale });
        }
    }

    /// All entries whose AABB intersects the query rectangle. Duplicates from
    /// entries spanning several cells are suppressed. An empty region yields
    /// an empty vec, never an error.
    pub fn query_region(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<GridEntry> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let (cx0, cy0, cx1, cy1) = cell_range(min_x, min_y, max_x, max_y);
        for cy in cy0..=cy1 {
            for cx in cx0..=cx1 {
                let Some(bucket) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for &sid in bucket {
                    if !seen.insert(sid) {
                        continue;
                    }
                    let entry = self.entries[&sid];
                    if entry.x + entry.scale >= min_x
                        && entry.x - entry.scale <= max_x
                        && entry.y + entry.scale >= min_y
                        && entry.y - entry.scale <= max_y
                    {
                        result.push(entry);
                    }
                }
            }
        }
        result
    }

    /// Entries whose AABB, inflated by `scale`, intersects the travel segment.
    /// Used for swept projectile collision.
    pub fn query_sweep(&self, x0: f32, y0: f32, x1: f32, y1: f32, scale: f32) -> Vec<GridEntry> {
        let min_x = x0.min(x1) - scale;
        let min_y = y0.min(y1) - scale;
        let max_x = x0.max(x1) + scale;
        let max_y = y0.max(y1) + scale;

        self.query_region(min_x, min_y, max_x, max_y)
            .into_iter()
            .filter(|entry| {
                let pad = entry.scale + scale;
                segment_intersects_rect(
                    entry.x - pad,
                    entry.y - pad,
                    entry.x + pad,
                    entry.y + pad,
                    x0,
                    y0,
                    x1,
                    y1,
                )
            })
            .collect()
    }
}

// --- Cached module-level grid ---
// The grid is a derived view of the world_object table. It lives across
// reducer invocations and is lazily rebuilt after a module reload; reducer
// execution is serialized, so the static is never accessed concurrently.

static mut WORLD_GRID: Option<SpatialGrid> = None;

pub fn with_world_grid<R>(ctx: &ReducerContext, f: impl FnOnce(&mut SpatialGrid) -> R) -> R {
    unsafe {
        if WORLD_GRID.is_none() {
            let mut grid = SpatialGrid::new();
            for obj in ctx.db.world_object().iter() {
                if obj.active {
                    grid.insert(GridEntry {
                        sid: obj.sid,
                        x: obj.pos_x,
                        y: obj.pos_y,
                        scale: obj.scale,
                    });
                }
            }
            log::debug!("Rebuilt world grid with {} entries", grid.len());
            WORLD_GRID = Some(grid);
        }
        f(WORLD_GRID.as_mut().unwrap())
    }
}

pub fn invalidate_world_grid() {
    unsafe {
        WORLD_GRID = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sid: u32, x: f32, y: f32, scale: f32) -> GridEntry {
        GridEntry { sid, x, y, scale }
    }

    #[test]
    fn query_returns_exactly_intersecting_entries() {
        let mut grid = SpatialGrid::new();
        grid.insert(entry(1, 100.0, 100.0, 50.0));
        grid.insert(entry(2, 1000.0, 1000.0, 50.0));

        let hits = grid.query_region(0.0, 0.0, 200.0, 200.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sid, 1);
    }

    #[test]
    fn large_entry_spanning_cells_is_reported_once() {
        let mut grid = SpatialGrid::new();
        // Spans many cells at GRID_CELL_SIZE = 360.
        grid.insert(entry(7, 720.0, 720.0, 600.0));

        let hits = grid.query_region(0.0, 0.0, 1400.0, 1400.0);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn remove_leaves_no_stale_entries() {
        let mut grid = SpatialGrid::new();
        grid.insert(entry(3, 500.0, 500.0, 80.0));
        grid.remove(3);
        assert!(grid.query_region(0.0, 0.0, MAP_SIZE, MAP_SIZE).is_empty());
        // Removing again is a no-op.
        grid.remove(3);
    }

    #[test]
    fn reinsert_replaces_instead_of_duplicating() {
        let mut grid = SpatialGrid::new();
        grid.insert(entry(4, 100.0, 100.0, 40.0));
        grid.insert(entry(4, 2000.0, 2000.0, 40.0));

        assert!(grid.query_region(0.0, 0.0, 300.0, 300.0).is_empty());
        let hits = grid.query_region(1900.0, 1900.0, 2100.0, 2100.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn relocate_moves_across_cells() {
        let mut grid = SpatialGrid::new();
        grid.insert(entry(5, 100.0, 100.0, 30.0));
        grid.relocate(5, 5000.0, 5000.0);

        assert!(grid.query_region(0.0, 0.0, 300.0, 300.0).is_empty());
        assert_eq!(grid.query_region(4900.0, 4900.0, 5100.0, 5100.0).len(), 1);
    }

    #[test]
    fn relocate_within_cell_updates_position() {
        let mut grid = SpatialGrid::new();
        grid.insert(entry(6, 100.0, 100.0, 10.0));
        grid.relocate(6, 120.0, 110.0);
        let hits = grid.query_region(115.0, 105.0, 125.0, 115.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].x, 120.0);
    }

    #[test]
    fn sweep_hits_entries_along_segment_only() {
        let mut grid = SpatialGrid::new();
        grid.insert(entry(1, 500.0, 100.0, 50.0));
        grid.insert(entry(2, 500.0, 600.0, 50.0));

        let hits = grid.query_sweep(0.0, 100.0, 1000.0, 100.0, 10.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sid, 1);
    }

    #[test]
    fn empty_region_query_is_empty() {
        let grid = SpatialGrid::new();
        assert!(grid.query_region(0.0, 0.0, 100.0, 100.0).is_empty());
        assert!(grid.query_sweep(0.0, 0.0, 10.0, 10.0, 5.0).is_empty());
    }
}
