//! Zone model: parking cells and movement corridors.
//!
//! Zones are created once at startup from the lot layout and live for the
//! process lifetime; only their mutable fields (occupancy, status, congestion,
//! route holds) change at runtime. All membership edits are idempotent, and
//! every congestion increment has exactly one matching decrement.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::{ROUTE_HOLD_CONGESTION, VEHICLE_CONGESTION};
use crate::geometry::{point_in_polygon, polygon_center, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CorridorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub u32);

/// Occupancy state of a parking cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    Empty,
    Target,
    Occupied,
}

impl CellStatus {
    pub fn is_empty(self) -> bool {
        self == CellStatus::Empty
    }

    pub fn is_target(self) -> bool {
        self == CellStatus::Target
    }

    pub fn is_occupied(self) -> bool {
        self == CellStatus::Occupied
    }
}

/// Outcome of adding an occupant to a parking cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellArrival {
    /// The vehicle was already inside; nothing changed.
    AlreadyPresent,
    /// The vehicle is now the sole occupant and holds the cell.
    Claimed,
    /// The vehicle claimed the cell out from under an outstanding
    /// reservation. The displaced holder must be re-routed.
    ClaimedDisplacing(VehicleId),
    /// The cell already had occupants; membership recorded, attribution
    /// unchanged. Tracking noise produces these transients.
    Joined,
}

/// Outcome of removing an occupant from a parking cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellDeparture {
    /// The vehicle was not inside; nothing changed.
    NotPresent,
    /// The cell is now empty and back to `Empty`.
    NowEmpty,
    /// The attributed vehicle left but others remain; the cell stays
    /// `Occupied`, now attributed to the returned occupant.
    Reattributed(VehicleId),
    /// A non-attributed occupant left; attribution unchanged.
    Unchanged,
}

/// A parking resource. Reachable from exactly one corridor.
#[derive(Debug, Clone)]
pub struct ParkingCell {
    pub id: CellId,
    pub name: String,
    pub boundary: Vec<Point>,
    pub center: Point,
    /// The corridor a vehicle must be routed to in order to reach this cell.
    pub corridor: CorridorId,
    pub occupants: BTreeSet<VehicleId>,
    pub status: CellStatus,
    /// The vehicle this cell is attributed to: the reservation holder while
    /// `Target`, the (first) occupant while `Occupied`.
    pub claimant: Option<VehicleId>,
    /// Unix seconds at which the current occupant settled, if occupied.
    pub occupied_since: Option<f64>,
}

impl ParkingCell {
    pub fn new(id: CellId, name: String, boundary: Vec<Point>, corridor: CorridorId) -> Self {
        let center = polygon_center(&boundary);
        Self {
            id,
            name,
            boundary,
            center,
            corridor,
            occupants: BTreeSet::new(),
            status: CellStatus::Empty,
            claimant: None,
            occupied_since: None,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point_in_polygon(point, &self.boundary)
    }

    /// A cell can be reserved only while it is fully empty.
    pub fn is_available(&self) -> bool {
        self.status.is_empty()
    }

    /// Reserve this cell for `vehicle` ahead of its physical arrival.
    pub fn reserve(&mut self, vehicle: VehicleId) {
        self.status = CellStatus::Target;
        self.claimant = Some(vehicle);
        self.occupied_since = None;
    }

    /// Record `vehicle` as geometrically inside the cell and resolve the
    /// arrival against any outstanding reservation. Attribution only changes
    /// when the arrival makes the vehicle the sole occupant.
    pub fn add_occupant(&mut self, vehicle: VehicleId, now: f64) -> CellArrival {
        if !self.occupants.insert(vehicle) {
            return CellArrival::AlreadyPresent;
        }
        if self.occupants.len() != 1 {
            return CellArrival::Joined;
        }
        let displaced = match (self.status, self.claimant) {
            (CellStatus::Target, Some(holder)) if holder != vehicle => Some(holder),
            _ => None,
        };
        self.status = CellStatus::Occupied;
        self.claimant = Some(vehicle);
        self.occupied_since = Some(now);
        match displaced {
            Some(holder) => CellArrival::ClaimedDisplacing(holder),
            None => CellArrival::Claimed,
        }
    }

    /// Remove `vehicle` from the cell, releasing it to `Empty` when the last
    /// occupant leaves.
    pub fn remove_occupant(&mut self, vehicle: VehicleId) -> CellDeparture {
        if !self.occupants.remove(&vehicle) {
            return CellDeparture::NotPresent;
        }
        match self.occupants.iter().next().copied() {
            None => {
                self.clear();
                CellDeparture::NowEmpty
            }
            Some(next) if self.claimant == Some(vehicle) => {
                self.claimant = Some(next);
                CellDeparture::Reattributed(next)
            }
            Some(_) => CellDeparture::Unchanged,
        }
    }

    /// Drop the current reservation or attribution. Empty cells return to
    /// `Empty`; cells that still hold vehicles stay `Occupied`, attributed to
    /// an arbitrary remaining occupant (returned so the caller can sync its
    /// timestamps).
    pub fn release(&mut self) -> Option<VehicleId> {
        match self.occupants.iter().next().copied() {
            None => {
                self.clear();
                None
            }
            Some(next) => {
                self.status = CellStatus::Occupied;
                self.claimant = Some(next);
                Some(next)
            }
        }
    }

    fn clear(&mut self) {
        self.status = CellStatus::Empty;
        self.claimant = None;
        self.occupied_since = None;
    }
}

/// A movement zone; node of the routing graph.
#[derive(Debug, Clone)]
pub struct Corridor {
    pub id: CorridorId,
    pub name: String,
    pub boundary: Vec<Point>,
    pub center: Point,
    /// Undirected routing edges to neighboring corridors.
    pub links: BTreeSet<CorridorId>,
    /// Parking cells reachable directly from this corridor.
    pub cells: BTreeSet<CellId>,
    pub base_congestion: u32,
    /// Base weight plus occupancy and route-hold penalties.
    pub congestion: u32,
    pub occupants: BTreeSet<VehicleId>,
    /// Vehicles holding this corridor in their active route.
    pub route_holds: BTreeSet<VehicleId>,
}

impl Corridor {
    pub fn new(
        id: CorridorId,
        name: String,
        boundary: Vec<Point>,
        base_congestion: u32,
        links: BTreeSet<CorridorId>,
        cells: BTreeSet<CellId>,
    ) -> Self {
        let center = polygon_center(&boundary);
        Self {
            id,
            name,
            boundary,
            center,
            links,
            cells,
            base_congestion,
            congestion: base_congestion,
            occupants: BTreeSet::new(),
            route_holds: BTreeSet::new(),
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point_in_polygon(point, &self.boundary)
    }

    pub fn add_occupant(&mut self, vehicle: VehicleId) {
        if self.occupants.insert(vehicle) {
            self.congestion += VEHICLE_CONGESTION;
        }
    }

    pub fn remove_occupant(&mut self, vehicle: VehicleId) {
        if self.occupants.remove(&vehicle) {
            self.congestion -= VEHICLE_CONGESTION;
        }
    }

    pub fn add_route_hold(&mut self, vehicle: VehicleId) {
        if self.route_holds.insert(vehicle) {
            self.congestion += ROUTE_HOLD_CONGESTION;
        }
    }

    pub fn remove_route_hold(&mut self, vehicle: VehicleId) {
        if self.route_holds.remove(&vehicle) {
            self.congestion -= ROUTE_HOLD_CONGESTION;
        }
    }
}
