//! Per-vehicle state: status machine, current zone, target cell, route.

use std::collections::BTreeMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::zones::{CellId, CorridorId, VehicleId};

/// Where a vehicle is in its visit: heading in, parked, or heading out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Entry,
    Parking,
    Exit,
}

impl VehicleStatus {
    pub fn is_entry(self) -> bool {
        self == VehicleStatus::Entry
    }

    pub fn is_parking(self) -> bool {
        self == VehicleStatus::Parking
    }

    pub fn is_exit(self) -> bool {
        self == VehicleStatus::Exit
    }
}

/// The zone a vehicle's last known position tested inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneRef {
    Cell(CellId),
    Corridor(CorridorId),
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub plate: String,
    pub status: VehicleStatus,
    pub position: Point,
    /// Unix seconds at which the vehicle was admitted (or seeded).
    pub entry_time: f64,
    /// Unix seconds at which the vehicle settled into its cell; cleared
    /// whenever it is not parked.
    pub parking_time: Option<f64>,
    pub zone: Option<ZoneRef>,
    /// The cell holding a reservation for this vehicle, if any.
    pub target_cell: Option<CellId>,
    /// Corridors this vehicle intends to traverse, starting at its current
    /// corridor. Non-empty only while the vehicle is moving.
    pub route: Vec<CorridorId>,
}

impl Vehicle {
    /// A freshly admitted vehicle: no zone, no target, no route yet.
    pub fn admitted(id: VehicleId, plate: String, position: Point, now: f64) -> Self {
        Self {
            id,
            plate,
            status: VehicleStatus::Entry,
            position,
            entry_time: now,
            parking_time: None,
            zone: None,
            target_cell: None,
            route: Vec::new(),
        }
    }

    pub fn current_corridor(&self) -> Option<CorridorId> {
        match self.zone {
            Some(ZoneRef::Corridor(id)) => Some(id),
            _ => None,
        }
    }
}

/// All vehicles currently tracked inside the lot, keyed by tracker id.
#[derive(Resource, Default)]
pub struct VehicleRegistry {
    pub vehicles: BTreeMap<VehicleId, Vehicle>,
}

impl VehicleRegistry {
    pub fn get(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn get_mut(&mut self, id: VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(&id)
    }

    pub fn contains(&self, id: VehicleId) -> bool {
        self.vehicles.contains_key(&id)
    }
}
