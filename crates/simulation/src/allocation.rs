//! The allocation controller: reacts to zone-membership changes per tick.
//!
//! One tick consumes exactly one tracking frame. Per tracked vehicle the
//! controller reclassifies its zone (cells take precedence over corridors),
//! unwinds old memberships, applies the arrival rules, and re-routes when the
//! stored route goes stale. Vehicles that reach the exit corridor or drop out
//! of tracking are destroyed and their resources released.

use std::collections::BTreeMap;

use bevy::prelude::*;

use crate::admission::AdmissionQueue;
use crate::geometry::Point;
use crate::lot::LotMap;
use crate::routing::{clear_route, drop_route_prefix, plan_route};
use crate::vehicles::{Vehicle, VehicleRegistry, VehicleStatus, ZoneRef};
use crate::zones::{CellArrival, CellId, CorridorId, VehicleId};

/// The tick input: tracker id to camera position, as delivered by the
/// perception pipeline. An empty frame is valid (no vehicles visible).
#[derive(Resource, Default)]
pub struct TrackingFrame(pub BTreeMap<VehicleId, Point>);

impl TrackingFrame {
    pub fn from_pairs(pairs: &[(u32, (f64, f64))]) -> Self {
        Self(
            pairs
                .iter()
                .map(|&(id, (x, y))| (VehicleId(id), Point::new(x, y)))
                .collect(),
        )
    }
}

/// Set before the first processed frame: that frame seeds vehicles already
/// inside the lot instead of running normal admission.
#[derive(Resource, Default)]
pub struct SeedPending(pub bool);

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExitNotice {
    pub vehicle: VehicleId,
    pub plate: String,
}

/// Exit notifications accumulated this tick, drained by the runtime after
/// the update.
#[derive(Resource, Default)]
pub struct ExitNotices(pub Vec<ExitNotice>);

/// Per-tick entry point, run once per tracking frame.
pub fn apply_tracking_frame(
    mut lot: ResMut<LotMap>,
    mut registry: ResMut<VehicleRegistry>,
    frame: Res<TrackingFrame>,
    mut admissions: ResMut<AdmissionQueue>,
    mut exits: ResMut<ExitNotices>,
    mut seed: ResMut<SeedPending>,
) {
    let now = crate::unix_now();

    if seed.0 {
        seed.0 = false;
        seed_lot(&mut lot, &mut registry, &frame, &mut exits, now);
        return;
    }

    for (&id, &position) in frame.0.iter() {
        if registry.contains(id) {
            update_vehicle(&mut lot, &mut registry, id, position, &mut exits, now);
        } else if entry_corridor_contains(&lot, position) && !admissions.pending.is_empty() {
            try_admit(&mut lot, &mut registry, &mut admissions, &mut exits, id, position, now);
        }
    }

    // Loss-of-track cleanup: anything tracked last tick but absent now.
    let lost: Vec<VehicleId> = registry
        .vehicles
        .keys()
        .filter(|id| !frame.0.contains_key(id))
        .copied()
        .collect();
    for id in lost {
        if let Some(mut vehicle) = registry.vehicles.remove(&id) {
            debug!("lost track of vehicle {} (plate {})", id.0, vehicle.plate);
            release_vehicle(&mut lot, &mut vehicle);
        }
    }
}

fn entry_corridor_contains(lot: &LotMap, position: Point) -> bool {
    lot.corridors
        .get(&lot.entry)
        .is_some_and(|corridor| corridor.contains(position))
}

/// Advance one tracked vehicle to its new position.
fn update_vehicle(
    lot: &mut LotMap,
    registry: &mut VehicleRegistry,
    id: VehicleId,
    position: Point,
    exits: &mut ExitNotices,
    now: f64,
) {
    // Taken out of the registry while mutated, so a displaced reservation
    // holder can be re-routed through the registry without aliasing.
    let Some(mut vehicle) = registry.vehicles.remove(&id) else {
        return;
    };
    vehicle.position = position;

    match lot.locate(position) {
        Some(ZoneRef::Cell(cell_id)) => {
            let displaced = enter_cell(lot, &mut vehicle, cell_id, now);
            registry.vehicles.insert(id, vehicle);
            if let Some(holder) = displaced {
                replan_displaced(lot, registry, holder);
            }
        }
        Some(ZoneRef::Corridor(corridor_id)) if corridor_id == lot.exit => {
            info!("vehicle {} (plate {}) exited", id.0, vehicle.plate);
            exits.0.push(ExitNotice { vehicle: id, plate: vehicle.plate.clone() });
            release_vehicle(lot, &mut vehicle);
        }
        Some(ZoneRef::Corridor(corridor_id)) => {
            enter_corridor(lot, &mut vehicle, corridor_id);
            registry.vehicles.insert(id, vehicle);
        }
        None => {
            debug!("vehicle {} (plate {}) left the monitored area", id.0, vehicle.plate);
            release_vehicle(lot, &mut vehicle);
        }
    }
}

/// The vehicle's position tests inside a parking cell.
fn enter_cell(
    lot: &mut LotMap,
    vehicle: &mut Vehicle,
    cell_id: CellId,
    now: f64,
) -> Option<VehicleId> {
    match vehicle.zone {
        Some(ZoneRef::Cell(old)) if old == cell_id => return None,
        Some(ZoneRef::Cell(old)) => {
            if let Some(cell) = lot.cells.get_mut(&old) {
                cell.remove_occupant(vehicle.id);
            }
        }
        Some(ZoneRef::Corridor(old)) => {
            if let Some(corridor) = lot.corridors.get_mut(&old) {
                corridor.remove_occupant(vehicle.id);
            }
        }
        None => {}
    }

    let arrival = match lot.cells.get_mut(&cell_id) {
        Some(cell) => cell.add_occupant(vehicle.id, now),
        None => return None,
    };

    vehicle.zone = Some(ZoneRef::Cell(cell_id));
    vehicle.status = VehicleStatus::Parking;
    vehicle.parking_time = Some(now);
    // Parked vehicles hold no route and no reservation; this also releases a
    // reservation on a different cell than the one actually taken.
    clear_route(lot, vehicle);

    match arrival {
        CellArrival::ClaimedDisplacing(holder) => Some(holder),
        _ => None,
    }
}

/// The vehicle's position tests inside a corridor other than the exit.
fn enter_corridor(lot: &mut LotMap, vehicle: &mut Vehicle, corridor_id: CorridorId) {
    match vehicle.zone {
        Some(ZoneRef::Corridor(old)) if old == corridor_id => {
            // Still in the same corridor. A vehicle left without a route by a
            // failed search retries here.
            if vehicle.route.is_empty() {
                replan(lot, vehicle);
            }
            return;
        }
        Some(ZoneRef::Corridor(old)) => {
            if let Some(corridor) = lot.corridors.get_mut(&old) {
                corridor.remove_occupant(vehicle.id);
            }
        }
        Some(ZoneRef::Cell(old)) => {
            if let Some(cell) = lot.cells.get_mut(&old) {
                cell.remove_occupant(vehicle.id);
            }
        }
        None => {}
    }

    if vehicle.status.is_parking() {
        // Leaving a cell means heading out.
        vehicle.status = VehicleStatus::Exit;
        vehicle.parking_time = None;
    }
    vehicle.zone = Some(ZoneRef::Corridor(corridor_id));
    if let Some(corridor) = lot.corridors.get_mut(&corridor_id) {
        corridor.add_occupant(vehicle.id);
    }

    // Pure progress keeps the route, dropping the traversed prefix; anything
    // else means the route is stale and gets re-planned.
    if !drop_route_prefix(lot, vehicle, corridor_id) {
        replan(lot, vehicle);
    }
}

fn replan(lot: &mut LotMap, vehicle: &mut Vehicle) {
    if let Err(err) = plan_route(lot, vehicle) {
        error!("vehicle {} (plate {}): {err}", vehicle.id.0, vehicle.plate);
    }
}

/// Re-route a vehicle whose reservation was taken by another arrival.
fn replan_displaced(lot: &mut LotMap, registry: &mut VehicleRegistry, holder: VehicleId) {
    match registry.get_mut(holder) {
        Some(vehicle) => {
            vehicle.target_cell = None;
            replan(lot, vehicle);
        }
        // The holder may already be gone; displacement is then moot.
        None => debug!("displaced reservation holder {} no longer tracked", holder.0),
    }
}

/// Unwind all state a vehicle holds before it is destroyed.
fn release_vehicle(lot: &mut LotMap, vehicle: &mut Vehicle) {
    match vehicle.zone.take() {
        Some(ZoneRef::Cell(cell_id)) => {
            if let Some(cell) = lot.cells.get_mut(&cell_id) {
                cell.remove_occupant(vehicle.id);
            }
        }
        Some(ZoneRef::Corridor(corridor_id)) => {
            if let Some(corridor) = lot.corridors.get_mut(&corridor_id) {
                corridor.remove_occupant(vehicle.id);
            }
        }
        None => {}
    }
    clear_route(lot, vehicle);
}

/// An unmatched track is inside the entry corridor and a kiosk plate is
/// waiting: admit or reject. Rejection (lot full) creates no vehicle.
fn try_admit(
    lot: &mut LotMap,
    registry: &mut VehicleRegistry,
    admissions: &mut AdmissionQueue,
    exits: &mut ExitNotices,
    id: VehicleId,
    position: Point,
    now: f64,
) {
    let Some(plate) = admissions.pending.pop_front() else {
        return;
    };
    let accepted = lot.has_empty_cell();
    admissions.respond(accepted);
    if !accepted {
        info!("admission rejected for plate {plate}: lot full");
        return;
    }

    info!("vehicle {} admitted with plate {plate}", id.0);
    registry
        .vehicles
        .insert(id, Vehicle::admitted(id, plate, position, now));
    // Classify into the entry corridor and plan the first route right away.
    update_vehicle(lot, registry, id, position, exits, now);
}

/// First-frame seeding: tracks already inside the lot become vehicles with
/// plates from the layout's seed map. Parked tracks claim their cells before
/// movers plan routes, so reservations never race the vehicles already
/// standing in a cell.
fn seed_lot(
    lot: &mut LotMap,
    registry: &mut VehicleRegistry,
    frame: &TrackingFrame,
    exits: &mut ExitNotices,
    now: f64,
) {
    let mut movers = Vec::new();
    for (&id, &position) in frame.0.iter() {
        match lot.locate(position) {
            Some(ZoneRef::Cell(cell_id)) => {
                let Some(plate) = lot.seed_cell_plates.get(&cell_id).cloned() else {
                    warn!("no seed plate for track {} in cell {}, ignored", id.0, cell_id.0);
                    continue;
                };
                registry
                    .vehicles
                    .insert(id, Vehicle::admitted(id, plate, position, now));
                update_vehicle(lot, registry, id, position, exits, now);
            }
            Some(ZoneRef::Corridor(corridor_id)) => {
                match lot.seed_corridor_plates.get(&corridor_id).cloned() {
                    Some(plate) => movers.push((id, position, plate)),
                    None => {
                        warn!(
                            "no seed plate for track {} in corridor {}, ignored",
                            id.0, corridor_id.0
                        );
                    }
                }
            }
            None => warn!("seed track {} outside all zones, ignored", id.0),
        }
    }
    for (id, position, plate) in movers {
        registry
            .vehicles
            .insert(id, Vehicle::admitted(id, plate, position, now));
        update_vehicle(lot, registry, id, position, exits, now);
    }
    info!("seeded {} vehicles from the first frame", registry.vehicles.len());
}
