/// Tile kinds and their properties.
/// Properties are queried via methods, not stored as flags,
/// so tile semantics are centralized here.
///
/// The level file names kinds with strings (`"stone"`, `"gunTile"`, ...).
/// Parsing is closed: an unknown name is rejected at load time, never
/// carried into the simulation.

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub enum TileKind {
    Grass,       // Solid, autotiled
    Stone,       // Solid, autotiled
    Decor,       // Cosmetic only
    LargeDecor,  // Cosmetic; variant 2 is a leaf emitter
    Spawner,     // Player spawn marker, pulled out at load
    WeaponSpawn, // Gun pickup
    Transition,  // Level-advance zone
}

/// Grid coordinate of a cell, in tiles.
pub type GridPos = (i32, i32);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Tile {
    pub kind: TileKind,
    pub variant: u32,
    pub grid_pos: GridPos,
}

impl TileKind {
    pub const ALL: [TileKind; 7] = [
        TileKind::Grass,
        TileKind::Stone,
        TileKind::Decor,
        TileKind::LargeDecor,
        TileKind::Spawner,
        TileKind::WeaponSpawn,
        TileKind::Transition,
    ];

    /// Name used in level files.
    pub fn name(self) -> &'static str {
        match self {
            TileKind::Grass => "grass",
            TileKind::Stone => "stone",
            TileKind::Decor => "decor",
            TileKind::LargeDecor => "large_decor",
            TileKind::Spawner => "spawners",
            TileKind::WeaponSpawn => "gunTile",
            TileKind::Transition => "transition",
        }
    }

    pub fn from_name(name: &str) -> Option<TileKind> {
        TileKind::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Number of valid variants. Anything at or above is a data error.
    pub fn variant_count(self) -> u32 {
        match self {
            TileKind::Grass | TileKind::Stone => 9,
            TileKind::Decor => 4,
            TileKind::LargeDecor => 3,
            TileKind::Spawner => 2,
            TileKind::WeaponSpawn => 1,
            TileKind::Transition => 2,
        }
    }

    /// Does this tile block bodies and projectiles?
    pub fn is_solid(self) -> bool {
        matches!(self, TileKind::Grass | TileKind::Stone)
    }
}

/// Which player a transition zone lets through.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Favors {
    Forward,  // variant 0: player 1 pushes the level index up
    Backward, // variant 1: player 2 pushes it down
}

impl Favors {
    pub fn from_variant(variant: u32) -> Favors {
        if variant == 1 { Favors::Backward } else { Favors::Forward }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in TileKind::ALL {
            assert_eq!(TileKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(TileKind::from_name("lava"), None);
    }

    #[test]
    fn only_ground_is_solid() {
        let solid: Vec<_> = TileKind::ALL.into_iter().filter(|k| k.is_solid()).collect();
        assert_eq!(solid, vec![TileKind::Grass, TileKind::Stone]);
    }
}
