//! Congestion-weighted routing over the corridor graph.
//!
//! Edge cost is charged on arrival: stepping to a neighbor costs that
//! neighbor's current congestion. Routes therefore steer around corridors
//! that are occupied or already claimed by other vehicles' routes.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use bevy::prelude::*;
use thiserror::Error;

use crate::geometry::Point;
use crate::lot::LotMap;
use crate::vehicles::{Vehicle, VehicleStatus};
use crate::zones::{CellId, CorridorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The goal is not connected to the start. Graph connectivity is static,
    /// so this indicates a layout defect rather than a transient condition.
    #[error("corridor {} is unreachable from corridor {}", .goal.0, .start.0)]
    Unreachable { start: CorridorId, goal: CorridorId },
}

/// Dijkstra over the corridor graph with the destination corridor's current
/// congestion as the step cost. Equal-cost heap entries pop in discovery
/// order (the sequence number below; `BinaryHeap` is not insertion-stable on
/// its own). Returns the corridor path from `start` to `goal` inclusive;
/// `start == goal` yields the single-element path.
pub fn shortest_path(
    lot: &LotMap,
    start: CorridorId,
    goal: CorridorId,
) -> Result<Vec<CorridorId>, RouteError> {
    if start == goal {
        return Ok(vec![start]);
    }
    if !lot.corridors.contains_key(&start) || !lot.corridors.contains_key(&goal) {
        return Err(RouteError::Unreachable { start, goal });
    }

    let mut heap = BinaryHeap::new();
    let mut cost_so_far: BTreeMap<CorridorId, u32> = BTreeMap::new();
    let mut came_from: BTreeMap<CorridorId, CorridorId> = BTreeMap::new();
    let mut seq: u64 = 0;

    cost_so_far.insert(start, 0);
    heap.push(Reverse((0u32, seq, start)));

    while let Some(Reverse((_, _, current))) = heap.pop() {
        if current == goal {
            break;
        }
        let Some(corridor) = lot.corridors.get(&current) else {
            continue;
        };
        for &next in &corridor.links {
            let Some(neighbor) = lot.corridors.get(&next) else {
                continue;
            };
            let new_cost = cost_so_far[&current] + neighbor.congestion;
            if cost_so_far.get(&next).map_or(true, |&known| new_cost < known) {
                cost_so_far.insert(next, new_cost);
                seq += 1;
                heap.push(Reverse((new_cost, seq, next)));
                came_from.insert(next, current);
            }
        }
    }

    if !came_from.contains_key(&goal) {
        return Err(RouteError::Unreachable { start, goal });
    }
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&previous) = came_from.get(&current) {
        path.push(previous);
        current = previous;
    }
    path.reverse();
    Ok(path)
}

/// The Euclidean-nearest cell whose status is `Empty`, measured to cell
/// centers. Ties keep the first cell in id order. Vehicles heading out get
/// no cell, and a lot with no empty cell reports `None` ("lot full").
pub fn nearest_empty_cell(
    lot: &LotMap,
    position: Point,
    status: VehicleStatus,
) -> Option<CellId> {
    if status.is_exit() {
        return None;
    }
    let mut best: Option<(f64, CellId)> = None;
    for cell in lot.cells.values() {
        if !cell.is_available() {
            continue;
        }
        let distance = position.distance_to(cell.center);
        if best.map_or(true, |(nearest, _)| distance < nearest) {
            best = Some((distance, cell.id));
        }
    }
    best.map(|(_, id)| id)
}

/// First empty cell adjacent to any corridor on the path, final corridor
/// excluded. Lets a vehicle claim a closer cell than the globally nearest
/// one when one frees up along the way.
fn first_empty_cell_on_path(lot: &LotMap, path: &[CorridorId]) -> Option<(usize, CellId)> {
    let before_last = path.len().saturating_sub(1);
    for (index, corridor_id) in path.iter().enumerate().take(before_last) {
        let Some(corridor) = lot.corridors.get(corridor_id) else {
            continue;
        };
        for &cell_id in &corridor.cells {
            if lot.cells.get(&cell_id).is_some_and(|cell| cell.is_available()) {
                return Some((index, cell_id));
            }
        }
    }
    None
}

/// Release everything the vehicle's current plan holds: route-holds on every
/// corridor of the route and the reservation on its target cell.
pub fn clear_route(lot: &mut LotMap, vehicle: &mut Vehicle) {
    for corridor_id in vehicle.route.drain(..) {
        if let Some(corridor) = lot.corridors.get_mut(&corridor_id) {
            corridor.remove_route_hold(vehicle.id);
        }
    }
    if let Some(cell_id) = vehicle.target_cell.take() {
        if let Some(cell) = lot.cells.get_mut(&cell_id) {
            cell.release();
        }
    }
}

/// Drop the already-traversed prefix of the route so that `current` becomes
/// its head, releasing the holds on the dropped corridors. Returns false if
/// `current` is not on the route at all (the route is stale).
pub fn drop_route_prefix(lot: &mut LotMap, vehicle: &mut Vehicle, current: CorridorId) -> bool {
    let Some(index) = vehicle.route.iter().position(|&id| id == current) else {
        return false;
    };
    for corridor_id in vehicle.route.drain(..index) {
        if let Some(corridor) = lot.corridors.get_mut(&corridor_id) {
            corridor.remove_route_hold(vehicle.id);
        }
    }
    true
}

/// Re-plan the vehicle from scratch: clear the old plan, pick the nearest
/// empty cell (or the exit when none is available or the vehicle is
/// leaving), search the corridor graph, then opportunistically shorten the
/// route to the first empty cell found along it. The globally nearest cell
/// is reserved before the scan and released again if a closer one supersedes
/// it. Every corridor on the final route gets a route-hold.
pub fn plan_route(lot: &mut LotMap, vehicle: &mut Vehicle) -> Result<(), RouteError> {
    clear_route(lot, vehicle);
    let Some(start) = vehicle.current_corridor() else {
        // Vehicles outside the corridor graph cannot be routed; the next
        // corridor transition will plan them.
        return Ok(());
    };

    let target = nearest_empty_cell(lot, vehicle.position, vehicle.status);
    let goal = match target {
        Some(cell_id) => lot.cells[&cell_id].corridor,
        None => lot.exit,
    };
    let mut path = shortest_path(lot, start, goal)?;

    if let Some(nearest) = target {
        if let Some(cell) = lot.cells.get_mut(&nearest) {
            cell.reserve(vehicle.id);
        }
        let mut claimed = nearest;
        if let Some((index, closer)) = first_empty_cell_on_path(lot, &path) {
            path.truncate(index + 1);
            if let Some(cell) = lot.cells.get_mut(&nearest) {
                cell.release();
            }
            if let Some(cell) = lot.cells.get_mut(&closer) {
                cell.reserve(vehicle.id);
            }
            claimed = closer;
        }
        vehicle.target_cell = Some(claimed);
    }

    for corridor_id in &path {
        if let Some(corridor) = lot.corridors.get_mut(corridor_id) {
            corridor.add_route_hold(vehicle.id);
        }
    }
    debug!(
        "vehicle {} routed {:?} (target {:?})",
        vehicle.id.0, path, vehicle.target_cell
    );
    vehicle.route = path;
    Ok(())
}
