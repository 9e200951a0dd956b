//! Static lot description and the `LotMap` resource built from it.
//!
//! The layout is loaded once at startup and validated fatally: a malformed
//! polygon or a dangling adjacency reference aborts before the tick loop
//! starts. After that, zones live for the process lifetime and only their
//! mutable fields change.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DEFAULT_BASE_CONGESTION;
use crate::geometry::Point;
use crate::vehicles::ZoneRef;
use crate::zones::{CellId, Corridor, CorridorId, ParkingCell};

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("duplicate parking cell id {0}")]
    DuplicateCell(u32),
    #[error("duplicate corridor id {0}")]
    DuplicateCorridor(u32),
    #[error("parking cell {id} has a degenerate boundary ({vertices} vertices)")]
    DegenerateCellBoundary { id: u32, vertices: usize },
    #[error("corridor {id} has a degenerate boundary ({vertices} vertices)")]
    DegenerateCorridorBoundary { id: u32, vertices: usize },
    #[error("parking cell {cell} references unknown corridor {corridor}")]
    UnknownCellCorridor { cell: u32, corridor: u32 },
    #[error("corridor {corridor} links to unknown corridor {other}")]
    UnknownCorridorLink { corridor: u32, other: u32 },
    #[error("corridor {corridor} references unknown parking cell {cell}")]
    UnknownCorridorCell { corridor: u32, cell: u32 },
    #[error("entry corridor {0} does not exist")]
    MissingEntryCorridor(u32),
    #[error("exit corridor {0} does not exist")]
    MissingExitCorridor(u32),
    #[error("display corridor {0} does not exist")]
    MissingDisplayCorridor(u32),
    #[error("failed to read layout file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse layout: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One parking cell in the layout file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellSpec {
    pub id: u32,
    pub name: String,
    /// Polygon vertices, clockwise: top-left, top-right, bottom-right,
    /// bottom-left by convention. Any vertex count >= 3 is accepted.
    pub boundary: Vec<Point>,
    /// The single corridor this cell is reached from.
    pub corridor: u32,
}

/// One movement corridor in the layout file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorridorSpec {
    pub id: u32,
    pub name: String,
    pub boundary: Vec<Point>,
    #[serde(default = "default_base_congestion")]
    pub base_congestion: u32,
    /// Undirected routing edges. Links are listed on both endpoints.
    pub links: Vec<u32>,
    /// Parking cells reachable directly from this corridor.
    #[serde(default)]
    pub cells: Vec<u32>,
}

fn default_base_congestion() -> u32 {
    DEFAULT_BASE_CONGESTION
}

/// Plates assumed for vehicles already inside the lot when the core starts,
/// keyed by the zone they are found in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedPlates {
    #[serde(default)]
    pub cells: BTreeMap<u32, String>,
    #[serde(default)]
    pub corridors: BTreeMap<u32, String>,
}

/// The whole static configuration: zone graph, designated corridors, display
/// units, and startup seed plates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotLayout {
    pub cells: Vec<CellSpec>,
    pub corridors: Vec<CorridorSpec>,
    pub entry_corridor: u32,
    pub exit_corridor: u32,
    /// Corridors with guidance displays; list position is the display unit
    /// number (first entry is unit 1).
    #[serde(default)]
    pub display_corridors: Vec<u32>,
    #[serde(default)]
    pub seed_plates: SeedPlates,
}

impl LotLayout {
    pub fn from_json_str(json: &str) -> Result<Self, LayoutError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}

/// All zones of the lot, owned by the core as a resource. `BTreeMap` keeps
/// iteration in id order, which is what makes nearest-cell and zone scans
/// deterministic.
#[derive(Resource)]
pub struct LotMap {
    pub cells: BTreeMap<CellId, ParkingCell>,
    pub corridors: BTreeMap<CorridorId, Corridor>,
    pub entry: CorridorId,
    pub exit: CorridorId,
    pub displays: Vec<CorridorId>,
    pub seed_cell_plates: BTreeMap<CellId, String>,
    pub seed_corridor_plates: BTreeMap<CorridorId, String>,
}

impl LotMap {
    pub fn from_layout(layout: &LotLayout) -> Result<Self, LayoutError> {
        let cell_ids: BTreeSet<u32> = layout.cells.iter().map(|c| c.id).collect();
        let corridor_ids: BTreeSet<u32> = layout.corridors.iter().map(|c| c.id).collect();

        let mut cells = BTreeMap::new();
        for spec in &layout.cells {
            if spec.boundary.len() < 3 {
                return Err(LayoutError::DegenerateCellBoundary {
                    id: spec.id,
                    vertices: spec.boundary.len(),
                });
            }
            if !corridor_ids.contains(&spec.corridor) {
                return Err(LayoutError::UnknownCellCorridor {
                    cell: spec.id,
                    corridor: spec.corridor,
                });
            }
            let cell = ParkingCell::new(
                CellId(spec.id),
                spec.name.clone(),
                spec.boundary.clone(),
                CorridorId(spec.corridor),
            );
            if cells.insert(cell.id, cell).is_some() {
                return Err(LayoutError::DuplicateCell(spec.id));
            }
        }

        let mut corridors = BTreeMap::new();
        for spec in &layout.corridors {
            if spec.boundary.len() < 3 {
                return Err(LayoutError::DegenerateCorridorBoundary {
                    id: spec.id,
                    vertices: spec.boundary.len(),
                });
            }
            for other in &spec.links {
                if !corridor_ids.contains(other) {
                    return Err(LayoutError::UnknownCorridorLink {
                        corridor: spec.id,
                        other: *other,
                    });
                }
            }
            for cell in &spec.cells {
                if !cell_ids.contains(cell) {
                    return Err(LayoutError::UnknownCorridorCell {
                        corridor: spec.id,
                        cell: *cell,
                    });
                }
            }
            let corridor = Corridor::new(
                CorridorId(spec.id),
                spec.name.clone(),
                spec.boundary.clone(),
                spec.base_congestion,
                spec.links.iter().map(|id| CorridorId(*id)).collect(),
                spec.cells.iter().map(|id| CellId(*id)).collect(),
            );
            if corridors.insert(corridor.id, corridor).is_some() {
                return Err(LayoutError::DuplicateCorridor(spec.id));
            }
        }

        if !corridor_ids.contains(&layout.entry_corridor) {
            return Err(LayoutError::MissingEntryCorridor(layout.entry_corridor));
        }
        if !corridor_ids.contains(&layout.exit_corridor) {
            return Err(LayoutError::MissingExitCorridor(layout.exit_corridor));
        }
        for display in &layout.display_corridors {
            if !corridor_ids.contains(display) {
                return Err(LayoutError::MissingDisplayCorridor(*display));
            }
        }

        Ok(Self {
            cells,
            corridors,
            entry: CorridorId(layout.entry_corridor),
            exit: CorridorId(layout.exit_corridor),
            displays: layout.display_corridors.iter().map(|id| CorridorId(*id)).collect(),
            seed_cell_plates: layout
                .seed_plates
                .cells
                .iter()
                .map(|(id, plate)| (CellId(*id), plate.clone()))
                .collect(),
            seed_corridor_plates: layout
                .seed_plates
                .corridors
                .iter()
                .map(|(id, plate)| (CorridorId(*id), plate.clone()))
                .collect(),
        })
    }

    /// Map a position to the zone it falls in. Parking cells take precedence
    /// over corridors: a car straddling a cell edge is parked, not driving.
    pub fn locate(&self, point: Point) -> Option<ZoneRef> {
        for cell in self.cells.values() {
            if cell.contains(point) {
                return Some(ZoneRef::Cell(cell.id));
            }
        }
        for corridor in self.corridors.values() {
            if corridor.contains(point) {
                return Some(ZoneRef::Corridor(corridor.id));
            }
        }
        None
    }

    pub fn has_empty_cell(&self) -> bool {
        self.cells.values().any(|cell| cell.is_available())
    }
}

/// The reference lot: 15 corridors digitized from the camera frame, 23
/// parking cells in three banks, entry at corridor 15, exit at corridor 1,
/// six guidance displays. Used by the demo binary and the benchmarks.
pub fn demo_lot() -> LotLayout {
    let corridor_data: [(u32, [(f64, f64); 4], &[u32]); 15] = [
        (1, [(1090.0, 505.0), (1336.0, 492.0), (1443.0, 886.0), (1147.0, 889.0)], &[2]),
        (2, [(815.0, 532.0), (1094.0, 531.0), (1125.0, 744.0), (810.0, 720.0)], &[1, 3, 5]),
        (3, [(559.0, 526.0), (823.0, 525.0), (817.0, 717.0), (531.0, 719.0)], &[2, 4]),
        (4, [(385.0, 521.0), (568.0, 523.0), (539.0, 727.0), (334.0, 730.0)], &[3, 6]),
        (5, [(816.0, 372.0), (1066.0, 373.0), (1100.0, 538.0), (807.0, 535.0)], &[2, 7]),
        (6, [(417.0, 369.0), (578.0, 375.0), (564.0, 531.0), (381.0, 529.0)], &[4, 9]),
        (7, [(814.0, 237.0), (1049.0, 236.0), (1067.0, 383.0), (811.0, 379.0)], &[5, 8, 10]),
        (8, [(595.0, 234.0), (820.0, 231.0), (813.0, 377.0), (578.0, 375.0)], &[7, 9]),
        (9, [(445.0, 241.0), (599.0, 242.0), (580.0, 382.0), (412.0, 377.0)], &[6, 8, 11]),
        (10, [(818.0, 115.0), (1035.0, 113.0), (1049.0, 246.0), (812.0, 244.0)], &[7, 12]),
        (11, [(472.0, 122.0), (608.0, 120.0), (595.0, 245.0), (439.0, 247.0)], &[9, 14]),
        (12, [(824.0, 8.0), (1029.0, 4.0), (1037.0, 121.0), (820.0, 123.0)], &[10, 13, 15]),
        (13, [(613.0, 12.0), (835.0, 6.0), (824.0, 106.0), (608.0, 107.0)], &[12, 14]),
        (14, [(487.0, 7.0), (628.0, 6.0), (611.0, 129.0), (468.0, 128.0)], &[11, 13]),
        (15, [(1028.0, 5.0), (1226.0, 9.0), (1244.0, 136.0), (1031.0, 138.0)], &[12]),
    ];

    // Three parking banks in the blocks between corridor rows. Cells 0-7 sit
    // between corridors 11 and 10, 8-15 between 6 and 5, 16-22 along the
    // bottom row.
    let mut cells = Vec::new();
    let mut bank = |first: u32, count: u32, x0: f64, y0: f64, w: f64, h: f64, corridor: u32| {
        for i in 0..count {
            let id = first + i;
            let top = y0 + f64::from(i) * h;
            cells.push(CellSpec {
                id,
                name: format!("S{id}"),
                boundary: vec![
                    Point::new(x0, top),
                    Point::new(x0 + w, top),
                    Point::new(x0 + w, top + h),
                    Point::new(x0, top + h),
                ],
                corridor,
            });
        }
    };
    bank(0, 4, 612.0, 125.0, 88.0, 30.0, 11);
    bank(4, 4, 712.0, 125.0, 88.0, 30.0, 10);
    bank(8, 4, 590.0, 385.0, 88.0, 35.0, 6);
    bank(12, 4, 700.0, 385.0, 88.0, 35.0, 5);
    for i in 0..7u32 {
        let id = 16 + i;
        let x0 = 340.0 + f64::from(i) * 90.0;
        let corridor = match id {
            16 | 17 => 4,
            18 | 19 => 3,
            _ => 2,
        };
        cells.push(CellSpec {
            id,
            name: format!("S{id}"),
            boundary: vec![
                Point::new(x0, 735.0),
                Point::new(x0 + 80.0, 735.0),
                Point::new(x0 + 80.0, 800.0),
                Point::new(x0, 800.0),
            ],
            corridor,
        });
    }

    let mut corridor_cells: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for cell in &cells {
        corridor_cells.entry(cell.corridor).or_default().push(cell.id);
    }

    let corridors = corridor_data
        .iter()
        .map(|(id, quad, links)| CorridorSpec {
            id: *id,
            name: format!("P{id}"),
            boundary: quad.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            base_congestion: DEFAULT_BASE_CONGESTION,
            links: links.to_vec(),
            cells: corridor_cells.get(id).cloned().unwrap_or_default(),
        })
        .collect();

    let seed_plates = SeedPlates {
        cells: (0..23).map(|id| (id, format!("20{id:02}"))).collect(),
        corridors: (1..16).map(|id| (id, format!("10{id:02}"))).collect(),
    };

    LotLayout {
        cells,
        corridors,
        entry_corridor: 15,
        exit_corridor: 1,
        display_corridors: vec![12, 7, 2, 14, 9, 4],
        seed_plates,
    }
}
