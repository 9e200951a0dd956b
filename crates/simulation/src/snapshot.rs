//! Immutable per-tick state snapshots for downstream consumers.
//!
//! Everything here is built by value: a published snapshot shares no mutable
//! state with the core, so a later tick can never change what a consumer
//! already holds.

use std::collections::BTreeMap;
use std::sync::Arc;

use bevy::prelude::*;
use serde::Serialize;

use crate::geometry::Point;
use crate::lot::LotMap;
use crate::vehicles::{VehicleRegistry, VehicleStatus, ZoneRef};
use crate::zones::CellStatus;
use crate::TickCounter;

/// Arrow shown on a guidance display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Right,
    Left,
    Up,
    Down,
}

/// One `(plate, direction)` line on a guidance display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayEntry {
    pub plate: String,
    pub direction: Direction,
}

/// Per-display-unit guidance lines, keyed by unit number (1-based).
pub type DisplayFrame = BTreeMap<u32, Vec<DisplayEntry>>;

#[derive(Debug, Clone, Serialize)]
pub struct VehicleEntry {
    pub id: u32,
    pub plate: String,
    pub status: VehicleStatus,
    pub entry_time: f64,
    pub parking_time: Option<f64>,
    pub position: Point,
    pub zone: Option<ZoneRef>,
    pub target_cell: Option<u32>,
    pub route: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellEntry {
    pub id: u32,
    pub name: String,
    pub boundary: Vec<Point>,
    pub corridor: u32,
    pub status: CellStatus,
    pub vehicle: Option<u32>,
    pub plate: Option<String>,
    pub occupied_since: Option<f64>,
    pub occupants: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorridorEntry {
    pub id: u32,
    pub name: String,
    pub boundary: Vec<Point>,
    pub congestion: u32,
    pub links: Vec<u32>,
    pub cells: Vec<u32>,
    pub occupants: Vec<u32>,
    pub route_holds: Vec<u32>,
}

/// The full immutable view published once per tick.
#[derive(Debug, Clone, Serialize)]
pub struct LotSnapshot {
    pub time: f64,
    pub tick: u64,
    pub vehicles: BTreeMap<u32, VehicleEntry>,
    pub cells: BTreeMap<u32, CellEntry>,
    pub corridors: BTreeMap<u32, CorridorEntry>,
    pub displays: DisplayFrame,
}

/// Latest snapshot, replaced wholesale each tick and handed out by `Arc`.
#[derive(Resource, Default)]
pub struct CurrentSnapshot(pub Option<Arc<LotSnapshot>>);

/// Direction from a display corridor toward the next route step: the axis
/// with the larger center delta wins. The camera frame is mirrored relative
/// to the mounted displays, so growing x reads as left and growing y as up.
pub fn display_direction(display_center: Point, next_center: Point) -> Direction {
    let dx = (display_center.x - next_center.x).abs();
    let dy = (display_center.y - next_center.y).abs();
    if dx > dy {
        if display_center.x < next_center.x {
            Direction::Left
        } else {
            Direction::Right
        }
    } else if display_center.y < next_center.y {
        Direction::Up
    } else {
        Direction::Down
    }
}

/// Build the immutable view of the current core state.
pub fn snapshot_from(lot: &LotMap, registry: &VehicleRegistry, tick: u64, time: f64) -> LotSnapshot {
    let mut displays: DisplayFrame = (1..=lot.displays.len() as u32).map(|unit| (unit, Vec::new())).collect();

    let mut vehicles = BTreeMap::new();
    for vehicle in registry.vehicles.values() {
        vehicles.insert(
            vehicle.id.0,
            VehicleEntry {
                id: vehicle.id.0,
                plate: vehicle.plate.clone(),
                status: vehicle.status,
                entry_time: vehicle.entry_time,
                parking_time: vehicle.parking_time,
                position: vehicle.position,
                zone: vehicle.zone,
                target_cell: vehicle.target_cell.map(|id| id.0),
                route: vehicle.route.iter().map(|id| id.0).collect(),
            },
        );

        // Guidance: vehicles whose next route step carries a display.
        if vehicle.route.len() < 2 {
            continue;
        }
        let next_step = vehicle.route[1];
        let Some(unit_index) = lot.displays.iter().position(|&id| id == next_step) else {
            continue;
        };
        let next_center = if vehicle.route.len() > 2 {
            match lot.corridors.get(&vehicle.route[2]) {
                Some(corridor) => corridor.center,
                None => continue,
            }
        } else {
            match vehicle.target_cell.and_then(|id| lot.cells.get(&id)) {
                Some(cell) => cell.center,
                None => continue,
            }
        };
        let Some(display_corridor) = lot.corridors.get(&next_step) else {
            continue;
        };
        let entry = DisplayEntry {
            plate: vehicle.plate.clone(),
            direction: display_direction(display_corridor.center, next_center),
        };
        displays.entry(unit_index as u32 + 1).or_default().push(entry);
    }

    let mut cells = BTreeMap::new();
    for cell in lot.cells.values() {
        // The claimant may have dropped out of tracking this very tick.
        let plate = cell
            .claimant
            .and_then(|id| registry.get(id))
            .map(|vehicle| vehicle.plate.clone());
        cells.insert(
            cell.id.0,
            CellEntry {
                id: cell.id.0,
                name: cell.name.clone(),
                boundary: cell.boundary.clone(),
                corridor: cell.corridor.0,
                status: cell.status,
                vehicle: cell.claimant.map(|id| id.0),
                plate,
                occupied_since: cell.occupied_since,
                occupants: cell.occupants.iter().map(|id| id.0).collect(),
            },
        );
    }

    let mut corridors = BTreeMap::new();
    for corridor in lot.corridors.values() {
        corridors.insert(
            corridor.id.0,
            CorridorEntry {
                id: corridor.id.0,
                name: corridor.name.clone(),
                boundary: corridor.boundary.clone(),
                congestion: corridor.congestion,
                links: corridor.links.iter().map(|id| id.0).collect(),
                cells: corridor.cells.iter().map(|id| id.0).collect(),
                occupants: corridor.occupants.iter().map(|id| id.0).collect(),
                route_holds: corridor.route_holds.iter().map(|id| id.0).collect(),
            },
        );
    }

    LotSnapshot { time, tick, vehicles, cells, corridors, displays }
}

/// System: publish the tick's snapshot into [`CurrentSnapshot`].
pub fn build_snapshot(
    lot: Res<LotMap>,
    registry: Res<VehicleRegistry>,
    tick: Res<TickCounter>,
    mut current: ResMut<CurrentSnapshot>,
) {
    let snapshot = snapshot_from(&lot, &registry, tick.0, crate::unix_now());
    current.0 = Some(Arc::new(snapshot));
}
