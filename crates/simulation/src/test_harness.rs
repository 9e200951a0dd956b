//! TestLot: headless integration harness for the parking core.
//!
//! Wraps `bevy::app::App` + [`SimulationPlugin`] so tests can drive the
//! automaton one tracking frame at a time and assert on the resulting
//! resources, without threads or channels.

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use bevy::app::App;
use bevy::prelude::*;

use crate::admission::AdmissionQueue;
use crate::allocation::{ExitNotice, ExitNotices, SeedPending, TrackingFrame};
use crate::geometry::Point;
use crate::lot::{CellSpec, CorridorSpec, LotLayout, LotMap, SeedPlates};
use crate::snapshot::{CurrentSnapshot, LotSnapshot};
use crate::vehicles::{Vehicle, VehicleRegistry};
use crate::zones::{CellId, VehicleId};
use crate::SimulationPlugin;

/// Axis-aligned square boundary with its top-left corner at `(x, y)`.
pub fn square(x: f64, y: f64, size: f64) -> Vec<Point> {
    vec![
        Point::new(x, y),
        Point::new(x + size, y),
        Point::new(x + size, y + size),
        Point::new(x, y + size),
    ]
}

/// The six-corridor test graph: 1-2-3-4 in a row with 5 and 6 forming the
/// loop 1-5-6-2. Uniform base congestion, no parking cells.
pub fn six_corridor_layout() -> LotLayout {
    let positions = [
        (1, 0.0, 0.0, vec![2, 5]),
        (2, 100.0, 0.0, vec![1, 3, 6]),
        (3, 200.0, 0.0, vec![2, 4]),
        (4, 300.0, 0.0, vec![3]),
        (5, 0.0, 100.0, vec![1, 6]),
        (6, 100.0, 100.0, vec![2, 5]),
    ];
    LotLayout {
        cells: vec![],
        corridors: positions
            .into_iter()
            .map(|(id, x, y, links)| CorridorSpec {
                id,
                name: format!("P{id}"),
                boundary: square(x, y, 100.0),
                base_congestion: 100,
                links,
                cells: vec![],
            })
            .collect(),
        entry_corridor: 1,
        exit_corridor: 4,
        display_corridors: vec![],
        seed_plates: SeedPlates::default(),
    }
}

/// A minimal full lot for end-to-end scenarios: entry corridor 15, corridors
/// 2 and 3 in a row, exit corridor 1, cell 1 off corridor 2 and cell 0 off
/// corridor 3, displays on corridors 2 and 3.
pub fn kiosk_lot_layout() -> LotLayout {
    LotLayout {
        cells: vec![
            CellSpec {
                id: 0,
                name: "S0".into(),
                boundary: square_rect(200.0, 100.0, 100.0, 50.0),
                corridor: 3,
            },
            CellSpec {
                id: 1,
                name: "S1".into(),
                boundary: square_rect(100.0, 100.0, 100.0, 50.0),
                corridor: 2,
            },
        ],
        corridors: vec![
            CorridorSpec {
                id: 15,
                name: "Entry".into(),
                boundary: square(0.0, 0.0, 100.0),
                base_congestion: 100,
                links: vec![2],
                cells: vec![],
            },
            CorridorSpec {
                id: 2,
                name: "P2".into(),
                boundary: square(100.0, 0.0, 100.0),
                base_congestion: 100,
                links: vec![15, 3],
                cells: vec![1],
            },
            CorridorSpec {
                id: 3,
                name: "P3".into(),
                boundary: square(200.0, 0.0, 100.0),
                base_congestion: 100,
                links: vec![2, 1],
                cells: vec![0],
            },
            CorridorSpec {
                id: 1,
                name: "Exit".into(),
                boundary: square(300.0, 0.0, 100.0),
                base_congestion: 100,
                links: vec![3],
                cells: vec![],
            },
        ],
        entry_corridor: 15,
        exit_corridor: 1,
        display_corridors: vec![2, 3],
        seed_plates: SeedPlates {
            cells: [(0, "2000"), (1, "2001")]
                .into_iter()
                .map(|(id, plate)| (id, plate.to_string()))
                .collect(),
            corridors: [(2, "1002"), (3, "1003"), (15, "1015")]
                .into_iter()
                .map(|(id, plate)| (id, plate.to_string()))
                .collect(),
        },
    }
}

fn square_rect(x: f64, y: f64, width: f64, height: f64) -> Vec<Point> {
    vec![
        Point::new(x, y),
        Point::new(x + width, y),
        Point::new(x + width, y + height),
        Point::new(x, y + height),
    ]
}

/// A headless app wrapping [`SimulationPlugin`] for integration testing.
pub struct TestLot {
    app: App,
}

impl TestLot {
    pub fn new(layout: &LotLayout) -> Self {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.insert_resource(LotMap::from_layout(layout).expect("test layout must be valid"));
        app.add_plugins(SimulationPlugin);
        Self { app }
    }

    /// Like [`TestLot::new`], but the first frame seeds pre-parked vehicles.
    pub fn seeded(layout: &LotLayout) -> Self {
        let mut lot = Self::new(layout);
        lot.app.world_mut().resource_mut::<SeedPending>().0 = true;
        lot
    }

    /// Advance one tick with the given `(track id, position)` frame.
    pub fn tick(&mut self, pairs: &[(u32, (f64, f64))]) {
        self.app.insert_resource(TrackingFrame::from_pairs(pairs));
        self.app.update();
    }

    /// Queue a kiosk plate as if the admission channel delivered it.
    pub fn push_plate(&mut self, plate: &str) {
        self.app
            .world_mut()
            .resource_mut::<AdmissionQueue>()
            .push(plate.to_string());
    }

    /// Install a verdict channel and return its receiving end.
    pub fn verdicts(&mut self) -> Receiver<bool> {
        let (tx, rx) = mpsc::channel();
        self.app.world_mut().resource_mut::<AdmissionQueue>().responder = Some(tx);
        rx
    }

    pub fn pending_plates(&self) -> usize {
        self.app.world().resource::<AdmissionQueue>().pending.len()
    }

    pub fn lot(&self) -> &LotMap {
        self.app.world().resource::<LotMap>()
    }

    pub fn vehicles(&self) -> &VehicleRegistry {
        self.app.world().resource::<VehicleRegistry>()
    }

    pub fn vehicle(&self, id: u32) -> &Vehicle {
        self.vehicles()
            .get(VehicleId(id))
            .expect("vehicle should be tracked")
    }

    /// Force a cell occupied by a vehicle outside the tracked registry, for
    /// shaping scenarios (e.g. a full lot).
    pub fn occupy_cell(&mut self, cell: u32, vehicle: u32) {
        self.app
            .world_mut()
            .resource_mut::<LotMap>()
            .cells
            .get_mut(&CellId(cell))
            .expect("cell should exist")
            .add_occupant(VehicleId(vehicle), 0.0);
    }

    pub fn snapshot(&self) -> Arc<LotSnapshot> {
        self.app
            .world()
            .resource::<CurrentSnapshot>()
            .0
            .clone()
            .expect("no snapshot published yet")
    }

    pub fn drain_exits(&mut self) -> Vec<ExitNotice> {
        std::mem::take(&mut self.app.world_mut().resource_mut::<ExitNotices>().0)
    }

    /// Reservation exclusivity: every `Target` cell is claimed by exactly the
    /// vehicle targeting it, and no cell is targeted by two vehicles.
    pub fn assert_reservations_consistent(&self) {
        let lot = self.lot();
        let registry = self.vehicles();
        for cell in lot.cells.values() {
            if cell.status.is_target() {
                let holder = cell.claimant.expect("target cell without claimant");
                assert!(cell.occupants.is_empty(), "target cell {:?} has occupants", cell.id);
                let vehicle = registry.get(holder).expect("claimant not tracked");
                assert_eq!(vehicle.target_cell, Some(cell.id));
            }
        }
        for vehicle in registry.vehicles.values() {
            if let Some(target) = vehicle.target_cell {
                let holders = registry
                    .vehicles
                    .values()
                    .filter(|other| other.target_cell == Some(target))
                    .count();
                assert_eq!(holders, 1, "cell {:?} reserved by {holders} vehicles", target);
                assert_eq!(lot.cells[&target].claimant, Some(vehicle.id));
            }
        }
    }
}
