/// Tile grid: sparse static level geometry.
///
/// Cells are keyed by integer grid coordinate; a missing key is air.
/// Off-grid tiles (decoration placed at arbitrary pixel positions) live in
/// a separate list and never take part in collision.
///
/// World → grid conversion is floor division by `tile_size`, so negative
/// pixel coordinates map to negative cells rather than folding onto 0.

use std::collections::BTreeMap;

use super::geom::{Rect, Vec2};
use super::tile::{Favors, GridPos, Tile, TileKind};

/// The 3×3 neighbourhood, in the fixed order collision resolution walks it.
const NEIGHBOR_OFFSETS: [(i32, i32); 9] = [
    (-1, 0), (-1, -1), (0, -1), (1, -1), (1, 0), (0, 0), (-1, 1), (0, 1), (1, 1),
];

/// A decoration tile at a pixel position.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct OffgridTile {
    pub kind: TileKind,
    pub variant: u32,
    pub pos: Vec2,
}

/// A tile pulled out by `collect_by_type`, positioned in world pixels.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct PlacedTile {
    pub kind: TileKind,
    pub variant: u32,
    pub pos: Vec2,
}

/// A transition zone's bounds plus the direction it lets through.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TransitionZone {
    pub rect: Rect,
    pub variant: u32,
}

impl TransitionZone {
    pub fn favors(&self) -> Favors {
        Favors::from_variant(self.variant)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TileGrid {
    tile_size: i32,
    cells: BTreeMap<GridPos, Tile>,
    offgrid: Vec<OffgridTile>,
}

// ── Construction ──

impl TileGrid {
    pub fn new(tile_size: i32) -> Self {
        debug_assert!(tile_size > 0, "tile size must be positive");
        TileGrid { tile_size, cells: BTreeMap::new(), offgrid: vec![] }
    }

    /// Place a tile at its own `grid_pos`. Returns the tile it replaced.
    pub fn insert(&mut self, tile: Tile) -> Option<Tile> {
        self.cells.insert(tile.grid_pos, tile)
    }

    pub fn insert_offgrid(&mut self, tile: OffgridTile) {
        self.offgrid.push(tile);
    }

    pub fn tile_size(&self) -> i32 {
        self.tile_size
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.cells.values()
    }

    pub fn offgrid(&self) -> &[OffgridTile] {
        &self.offgrid
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }
}

// ── Queries ──

impl TileGrid {
    /// Grid cell containing a world-pixel point.
    #[inline]
    pub fn cell_of(&self, point: Vec2) -> GridPos {
        let ts = self.tile_size as f32;
        ((point.x / ts).floor() as i32, (point.y / ts).floor() as i32)
    }

    /// World-pixel bounds of a cell.
    #[inline]
    pub fn cell_rect(&self, pos: GridPos) -> Rect {
        let ts = self.tile_size as f32;
        Rect::new(pos.0 as f32 * ts, pos.1 as f32 * ts, ts, ts)
    }

    pub fn tile_at(&self, pos: GridPos) -> Option<&Tile> {
        self.cells.get(&pos)
    }

    /// Tiles in the 3×3 neighbourhood of the cell containing `point`.
    pub fn tiles_near(&self, point: Vec2) -> Vec<Tile> {
        let (cx, cy) = self.cell_of(point);
        NEIGHBOR_OFFSETS
            .iter()
            .filter_map(|(dx, dy)| self.cells.get(&(cx + dx, cy + dy)).copied())
            .collect()
    }

    /// Bounds of every solid tile near `point`, in neighbourhood order.
    pub fn solid_rects_near(&self, point: Vec2) -> Vec<Rect> {
        self.tiles_near(point)
            .into_iter()
            .filter(|t| t.kind.is_solid())
            .map(|t| self.cell_rect(t.grid_pos))
            .collect()
    }

    /// The tile at the exact cell containing `point`, if it is solid.
    pub fn solid_tile_at(&self, point: Vec2) -> Option<Tile> {
        self.cells
            .get(&self.cell_of(point))
            .filter(|t| t.kind.is_solid())
            .copied()
    }

    pub fn transition_zones(&self) -> Vec<TransitionZone> {
        self.cells
            .values()
            .filter(|t| t.kind == TileKind::Transition)
            .map(|t| TransitionZone { rect: self.cell_rect(t.grid_pos), variant: t.variant })
            .collect()
    }

    pub fn weapon_spawn_zones(&self) -> Vec<Rect> {
        self.cells
            .values()
            .filter(|t| t.kind == TileKind::WeaponSpawn)
            .map(|t| self.cell_rect(t.grid_pos))
            .collect()
    }

    /// Inclusive (min, max) cell corners of the on-grid tiles, if any.
    pub fn bounds(&self) -> Option<(GridPos, GridPos)> {
        let mut it = self.cells.keys();
        let first = *it.next()?;
        Some(it.fold((first, first), |(lo, hi), &(x, y)| {
            ((lo.0.min(x), lo.1.min(y)), (hi.0.max(x), hi.1.max(y)))
        }))
    }
}

// ── Mutation ──

impl TileGrid {
    /// Gather every tile whose (kind, variant) is in `filter`, off-grid
    /// tiles first. Grid positions are converted to world pixels.
    ///
    /// With `keep_in_place == false` the matches are removed from the grid.
    pub fn collect_by_type(&mut self, filter: &[(TileKind, u32)], keep_in_place: bool) -> Vec<PlacedTile> {
        let wanted = |kind: TileKind, variant: u32| filter.contains(&(kind, variant));
        let mut matches = vec![];

        for t in &self.offgrid {
            if wanted(t.kind, t.variant) {
                matches.push(PlacedTile { kind: t.kind, variant: t.variant, pos: t.pos });
            }
        }
        if !keep_in_place {
            self.offgrid.retain(|t| !wanted(t.kind, t.variant));
        }

        let ts = self.tile_size as f32;
        for t in self.cells.values() {
            if wanted(t.kind, t.variant) {
                matches.push(PlacedTile {
                    kind: t.kind,
                    variant: t.variant,
                    pos: Vec2::new(t.grid_pos.0 as f32 * ts, t.grid_pos.1 as f32 * ts),
                });
            }
        }
        if !keep_in_place {
            self.cells.retain(|_, t| !wanted(t.kind, t.variant));
        }

        matches
    }

    /// Remove every weapon-spawn tile. Returns how many were removed;
    /// calling it again is a no-op returning 0.
    pub fn despawn_weapon_spawns(&mut self) -> usize {
        let before = self.cells.len();
        self.cells.retain(|_, t| t.kind != TileKind::WeaponSpawn);
        before - self.cells.len()
    }
}

// ══════════════════════════════════════════════════════════════
// Test helpers
// ══════════════════════════════════════════════════════════════

/// Build a 16px grid from row strings. Row 0 is grid y 0.
///
///   '#' stone   'g' grass   'G' weapon spawn
///   '>' transition (forward)   '<' transition (backward)
///   '1' / '2' spawner variant 0 / 1   anything else is air
#[cfg(test)]
pub fn grid_from_rows(rows: &[&str]) -> TileGrid {
    let mut grid = TileGrid::new(16);
    for (y, row) in rows.iter().enumerate() {
        for (x, ch) in row.chars().enumerate() {
            let (kind, variant) = match ch {
                '#' => (TileKind::Stone, 0),
                'g' => (TileKind::Grass, 0),
                'G' => (TileKind::WeaponSpawn, 0),
                '>' => (TileKind::Transition, 0),
                '<' => (TileKind::Transition, 1),
                '1' => (TileKind::Spawner, 0),
                '2' => (TileKind::Spawner, 1),
                _ => continue,
            };
            grid.insert(Tile { kind, variant, grid_pos: (x as i32, y as i32) });
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_of_floors_negative_coordinates() {
        let grid = TileGrid::new(16);
        assert_eq!(grid.cell_of(Vec2::new(15.9, 16.0)), (0, 1));
        assert_eq!(grid.cell_of(Vec2::new(-0.5, -16.0)), (-1, -1));
        assert_eq!(grid.cell_of(Vec2::new(-16.5, 0.0)), (-2, 0));
    }

    #[test]
    fn tiles_near_is_the_3x3_neighbourhood() {
        let grid = grid_from_rows(&[
            "#####",
            "#...#",
            "#####",
        ]);
        // Point in cell (2,1): neighbours are rows 0..=2, columns 1..=3
        let near = grid.tiles_near(Vec2::new(40.0, 20.0));
        assert_eq!(near.len(), 6);
        assert!(near.iter().all(|t| (1..=3).contains(&t.grid_pos.0)));

        // Point far away: nothing
        assert!(grid.tiles_near(Vec2::new(500.0, 500.0)).is_empty());
    }

    #[test]
    fn tiles_near_follows_offset_order() {
        let grid = grid_from_rows(&[
            "###",
            "###",
            "###",
        ]);
        let order: Vec<GridPos> = grid.tiles_near(Vec2::new(20.0, 20.0)).iter().map(|t| t.grid_pos).collect();
        assert_eq!(order, vec![(0, 1), (0, 0), (1, 0), (2, 0), (2, 1), (1, 1), (0, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn solid_tile_at_ignores_non_solid_kinds() {
        let grid = grid_from_rows(&["#G>"]);
        assert!(grid.solid_tile_at(Vec2::new(3.0, 3.0)).is_some());
        assert!(grid.solid_tile_at(Vec2::new(20.0, 3.0)).is_none());
        assert!(grid.solid_tile_at(Vec2::new(36.0, 3.0)).is_none());
        assert!(grid.solid_tile_at(Vec2::new(60.0, 3.0)).is_none());
    }

    #[test]
    fn collect_by_type_removes_unless_kept() {
        let mut grid = grid_from_rows(&["1.2#"]);
        grid.insert_offgrid(OffgridTile { kind: TileKind::LargeDecor, variant: 2, pos: Vec2::new(3.5, 7.0) });

        let kept = grid.collect_by_type(&[(TileKind::LargeDecor, 2)], true);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].pos, Vec2::new(3.5, 7.0));
        assert_eq!(grid.offgrid().len(), 1);

        let spawns = grid.collect_by_type(&[(TileKind::Spawner, 0), (TileKind::Spawner, 1)], false);
        assert_eq!(spawns.len(), 2);
        assert_eq!(spawns[0].pos, Vec2::new(0.0, 0.0));
        assert_eq!(spawns[1].pos, Vec2::new(32.0, 0.0));
        assert_eq!(grid.len(), 1);
        assert!(grid.collect_by_type(&[(TileKind::Spawner, 0)], false).is_empty());
    }

    #[test]
    fn transition_zones_carry_variant() {
        let grid = grid_from_rows(&["..>", "..<"]);
        let zones = grid.transition_zones();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].rect, Rect::new(32.0, 0.0, 16.0, 16.0));
        assert_eq!(zones[0].favors(), Favors::Forward);
        assert_eq!(zones[1].favors(), Favors::Backward);
    }

    #[test]
    fn despawn_weapon_spawns_is_idempotent() {
        let mut grid = grid_from_rows(&["G#G"]);
        assert_eq!(grid.weapon_spawn_zones().len(), 2);
        assert_eq!(grid.despawn_weapon_spawns(), 2);
        assert_eq!(grid.despawn_weapon_spawns(), 0);
        assert!(grid.weapon_spawn_zones().is_empty());
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn insert_keeps_one_tile_per_cell() {
        let mut grid = TileGrid::new(16);
        let a = Tile { kind: TileKind::Stone, variant: 0, grid_pos: (1, 1) };
        let b = Tile { kind: TileKind::Grass, variant: 3, grid_pos: (1, 1) };
        assert!(grid.insert(a).is_none());
        assert_eq!(grid.insert(b), Some(a));
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.bounds(), Some(((1, 1), (1, 1))));
    }
}
