/// Level loading and validation.
///
/// ## Sources (priority order):
///   1. `levels/` directory (`*.json`, sorted by file name)
///   2. Built-in arenas
///
/// ## File format (`.json`):
///   ```json
///   {
///     "tilemap":   { "3;7": { "type": "stone", "variant": 1, "pos": [3, 7] } },
///     "tile_size": 16,
///     "offgrid":   [ { "type": "large_decor", "variant": 2, "pos": [40.0, 52.5] } ]
///   }
///   ```
///
/// `tilemap` keys are `"x;y"` grid coordinates and must agree with the
/// record's `pos`. `offgrid` positions are world pixels.
///
/// Every level is parsed and validated when the set is loaded. Once a
/// `LevelSet` exists, switching to any of its levels cannot fail.
///
/// ## Row legend (built-in arenas):
///   '#' = stone            'g' = grass
///   'G' = gun pickup       'd' = small decor
///   '>' = transition (P1)  '<' = transition (P2)
///   '1' = P1 spawn         '2' = P2 spawn
///   'L' = leaf tree (off-grid)
///   '.' = air

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::geom::{Rect, Vec2};
use crate::domain::grid::{OffgridTile, TileGrid};
use crate::domain::tile::{Tile, TileKind};

const DEFAULT_TILE_SIZE: i32 = 16;

/// `large_decor` variant that sheds leaves.
const LEAF_TREE: (TileKind, u32) = (TileKind::LargeDecor, 2);
const SPAWNERS: [(TileKind, u32); 2] = [(TileKind::Spawner, 0), (TileKind::Spawner, 1)];

// ══════════════════════════════════════════════════════════════
// Errors
// ══════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid level JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("bad tile key {0:?}, expected \"x;y\"")]
    BadKey(String),
    #[error("tile under key {key:?} claims pos {pos:?}")]
    KeyMismatch { key: String, pos: [i32; 2] },
    #[error("unknown tile type {0:?}")]
    UnknownType(String),
    #[error("{} variant {variant} out of range (type has {count})", kind.name())]
    VariantOutOfRange { kind: TileKind, variant: u32, count: u32 },
    #[error("tile size must be positive, got {0}")]
    BadTileSize(i32),
    #[error("level has no player spawner")]
    NoSpawner,
    #[error("no levels to play")]
    Empty,
    #[error("{}: {source}", path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<LevelError>,
    },
}

// ══════════════════════════════════════════════════════════════
// Level data (file format)
// ══════════════════════════════════════════════════════════════

/// On-grid tile: `pos` is the grid coordinate, written as integers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub variant: u32,
    pub pos: [i32; 2],
}

/// Off-grid tile: `pos` is in world pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OffgridRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub variant: u32,
    pub pos: [f32; 2],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    pub tilemap: BTreeMap<String, TileRecord>,
    pub tile_size: i32,
    #[serde(default)]
    pub offgrid: Vec<OffgridRecord>,
}

impl LevelData {
    pub fn from_json(text: &str) -> Result<Self, LevelError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, LevelError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize a grid. Nothing is dropped: every on-grid and off-grid
    /// tile has a record.
    pub fn from_grid(grid: &TileGrid) -> Self {
        let tilemap = grid
            .tiles()
            .map(|t| {
                let (x, y) = t.grid_pos;
                (format!("{x};{y}"), record(t.kind, t.variant, [x, y]))
            })
            .collect();
        let offgrid = grid
            .offgrid()
            .iter()
            .map(|t| offgrid_record(t.kind, t.variant, [t.pos.x, t.pos.y]))
            .collect();
        LevelData { tilemap, tile_size: grid.tile_size(), offgrid }
    }

    /// Validate every record and build the grid. The first bad record
    /// aborts the whole level.
    pub fn to_grid(&self) -> Result<TileGrid, LevelError> {
        if self.tile_size <= 0 {
            return Err(LevelError::BadTileSize(self.tile_size));
        }
        let mut grid = TileGrid::new(self.tile_size);

        for (key, rec) in &self.tilemap {
            let grid_pos = parse_key(key)?;
            if rec.pos != [grid_pos.0, grid_pos.1] {
                return Err(LevelError::KeyMismatch { key: key.clone(), pos: rec.pos });
            }
            let kind = parse_kind(&rec.kind, rec.variant)?;
            grid.insert(Tile { kind, variant: rec.variant, grid_pos });
        }

        for rec in &self.offgrid {
            let kind = parse_kind(&rec.kind, rec.variant)?;
            grid.insert_offgrid(OffgridTile {
                kind,
                variant: rec.variant,
                pos: Vec2::new(rec.pos[0], rec.pos[1]),
            });
        }

        Ok(grid)
    }

    /// Build level data from row strings (see the legend above).
    pub fn from_rows(rows: &[&str]) -> Self {
        let ts = DEFAULT_TILE_SIZE;
        let mut tilemap = BTreeMap::new();
        let mut offgrid = vec![];

        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let (x, y) = (x as i32, y as i32);
                let (kind, variant) = match ch {
                    '#' => (TileKind::Stone, 1),
                    'g' => (TileKind::Grass, 1),
                    'G' => (TileKind::WeaponSpawn, 0),
                    'd' => (TileKind::Decor, 0),
                    '>' => (TileKind::Transition, 0),
                    '<' => (TileKind::Transition, 1),
                    '1' => (TileKind::Spawner, 0),
                    '2' => (TileKind::Spawner, 1),
                    'L' => {
                        // Tree sprite sits half a tile above its marker
                        let pos = [(x * ts) as f32, (y * ts) as f32 - ts as f32 / 2.0];
                        offgrid.push(offgrid_record(LEAF_TREE.0, LEAF_TREE.1, pos));
                        continue;
                    }
                    _ => continue,
                };
                tilemap.insert(format!("{x};{y}"), record(kind, variant, [x, y]));
            }
        }

        LevelData { tilemap, tile_size: ts, offgrid }
    }
}

fn record(kind: TileKind, variant: u32, pos: [i32; 2]) -> TileRecord {
    TileRecord { kind: kind.name().to_string(), variant, pos }
}

fn offgrid_record(kind: TileKind, variant: u32, pos: [f32; 2]) -> OffgridRecord {
    OffgridRecord { kind: kind.name().to_string(), variant, pos }
}

fn parse_key(key: &str) -> Result<(i32, i32), LevelError> {
    let bad = || LevelError::BadKey(key.to_string());
    let (x, y) = key.split_once(';').ok_or_else(bad)?;
    let x = x.trim().parse::<i32>().map_err(|_| bad())?;
    let y = y.trim().parse::<i32>().map_err(|_| bad())?;
    Ok((x, y))
}

fn parse_kind(name: &str, variant: u32) -> Result<TileKind, LevelError> {
    let kind = TileKind::from_name(name).ok_or_else(|| LevelError::UnknownType(name.to_string()))?;
    let count = kind.variant_count();
    if variant >= count {
        return Err(LevelError::VariantOutOfRange { kind, variant, count });
    }
    Ok(kind)
}

// ══════════════════════════════════════════════════════════════
// Validated level
// ══════════════════════════════════════════════════════════════

/// A level ready to play: spawners already pulled out of the grid.
#[derive(Clone, Debug)]
pub struct Level {
    pub name: String,
    pub grid: TileGrid,
    /// Respawn point per player slot.
    pub spawns: [Vec2; 2],
    pub leaf_emitters: Vec<Rect>,
}

impl Level {
    pub fn from_data(name: impl Into<String>, data: &LevelData) -> Result<Self, LevelError> {
        let mut grid = data.to_grid()?;

        let spawners = grid.collect_by_type(&SPAWNERS, false);
        let find = |variant: u32| spawners.iter().find(|s| s.variant == variant).map(|s| s.pos);
        let spawns = match (find(0), find(1)) {
            (Some(a), Some(b)) => [a, b],
            (Some(only), None) | (None, Some(only)) => [only, only],
            (None, None) => return Err(LevelError::NoSpawner),
        };

        let leaf_emitters = grid
            .collect_by_type(&[LEAF_TREE], true)
            .iter()
            .map(|t| Rect::new(t.pos.x + 4.0, t.pos.y + 4.0, 23.0, 13.0))
            .collect();

        Ok(Level { name: name.into(), grid, spawns, leaf_emitters })
    }
}

// ══════════════════════════════════════════════════════════════
// Level set
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct LevelSet {
    levels: Vec<Level>,
}

impl LevelSet {
    pub fn new(levels: Vec<Level>) -> Result<Self, LevelError> {
        if levels.is_empty() {
            return Err(LevelError::Empty);
        }
        Ok(LevelSet { levels })
    }

    /// Every `*.json` in `dir`, sorted by file name. Falls back to the
    /// built-in arenas when there are none or `dir` does not exist. An
    /// unreadable directory or one bad file fails the set.
    pub fn load_dir(dir: &Path) -> Result<Self, LevelError> {
        let files = json_files(dir)?;
        if files.is_empty() {
            info!(dir = %dir.display(), "no level files, using built-in arenas");
            return builtin_levels();
        }

        let mut levels = Vec::with_capacity(files.len());
        for path in files {
            let level = load_file(&path).map_err(|e| LevelError::InFile { path: path.clone(), source: Box::new(e) })?;
            debug!(name = %level.name, tiles = level.grid.len(), "level loaded");
            levels.push(level);
        }
        info!(count = levels.len(), dir = %dir.display(), "levels loaded");
        LevelSet::new(levels)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn get(&self, idx: usize) -> Option<&Level> {
        self.levels.get(idx)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map(|l| l.name.as_str())
    }
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, LevelError> {
    let io_err = |source| LevelError::Io { path: dir.to_path_buf(), source };
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(io_err(e)),
    };
    let mut files = vec![];
    for entry in entries {
        let path = entry.map_err(io_err)?.path();
        if path.extension().is_some_and(|x| x == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn load_file(path: &Path) -> Result<Level, LevelError> {
    let text = std::fs::read_to_string(path).map_err(|source| LevelError::Io { path: path.to_path_buf(), source })?;
    let data = LevelData::from_json(&text)?;
    let name = path.file_stem().unwrap_or_default().to_string_lossy().to_string();
    Level::from_data(name, &data)
}

// ══════════════════════════════════════════════════════════════
// Built-in arenas
// ══════════════════════════════════════════════════════════════

const ARENAS: [(&str, &[&str]); 3] = [
    ("Canopy", &[
        "##################################################",
        "#................................................#",
        "#................................................#",
        "#................................................#",
        "#................................................#",
        "#.....................L.G........................#",
        "#....................gggggggg....................#",
        "#................................................#",
        "#...............ggggggg....ggggggg...............#",
        "#.........L...........................L..........#",
        "#.......ggggggg....................ggggggg.......#",
        "#<..1.........d.....................d........2..>#",
        "gggggggggggggggggggggggggggggggggggggggggggggggggg",
        "##################################################",
    ]),
    ("Quarry", &[
        "##################################################",
        "#................................................#",
        "#................................................#",
        "#...........##......................##...........#",
        "#...........##......................##...........#",
        "#....................L...G.......................#",
        "#...................##########...................#",
        "#................................................#",
        "#............######............######............#",
        "#................................................#",
        "#.....######..........................######.....#",
        "#<..1...............d........d...............2..>#",
        "##################################################",
        "##################################################",
    ]),
    ("Ridge", &[
        "##################################################",
        "#................................................#",
        "#................................................#",
        "#...........L....................................#",
        "#.........ggggg....................ggggg.........#",
        "#................................................#",
        "#........................G.......................#",
        "#.....................gggggg.....................#",
        "#................................................#",
        "#.....L........gggggg........gggggg.......L......#",
        "#...gggggg..............................gggggg...#",
        "#<.1....................d.....................2.>#",
        "gggggggggggggggggggggggggggggggggggggggggggggggggg",
        "##################################################",
    ]),
];

pub fn builtin_levels() -> Result<LevelSet, LevelError> {
    let levels = ARENAS
        .iter()
        .map(|(name, rows)| Level::from_data(*name, &LevelData::from_rows(rows)))
        .collect::<Result<Vec<_>, _>>()?;
    LevelSet::new(levels)
}

/// Write the built-in arenas into `dir` as level files, numbered so they
/// load in the same order. Each goes through validation first.
pub fn export_builtin(dir: &Path) -> Result<Vec<PathBuf>, LevelError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| LevelError::Io { path, source }
    };
    std::fs::create_dir_all(dir).map_err(io_err(dir))?;

    let mut written = Vec::with_capacity(ARENAS.len());
    for (i, (name, rows)) in ARENAS.iter().enumerate() {
        let grid = LevelData::from_rows(rows).to_grid()?;
        let json = LevelData::from_grid(&grid).to_json()?;
        let path = dir.join(format!("{:02}_{}.json", i + 1, name.to_lowercase()));
        std::fs::write(&path, json).map_err(io_err(&path))?;
        written.push(path);
    }
    info!(count = written.len(), dir = %dir.display(), "built-in arenas exported");
    Ok(written)
}
