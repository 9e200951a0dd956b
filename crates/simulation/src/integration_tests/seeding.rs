use crate::test_harness::{kiosk_lot_layout, TestLot};
use crate::vehicles::ZoneRef;
use crate::zones::{CellId, CellStatus, CorridorId};

// ====================================================================
// First-frame seeding of pre-parked vehicles
// ====================================================================

#[test]
fn test_seed_frame_creates_vehicles_from_plate_map() {
    let mut lot = TestLot::seeded(&kiosk_lot_layout());

    // Track 1 is already parked in cell 0, track 2 is driving in the entry
    // corridor.
    lot.tick(&[(1, (250.0, 125.0)), (2, (50.0, 50.0))]);

    let parked = lot.vehicle(1);
    assert!(parked.status.is_parking());
    assert_eq!(parked.plate, "2000");
    assert_eq!(parked.zone, Some(ZoneRef::Cell(CellId(0))));
    assert_eq!(lot.lot().cells[&CellId(0)].status, CellStatus::Occupied);

    let mover = lot.vehicle(2);
    assert!(mover.status.is_entry());
    assert_eq!(mover.plate, "1015");
    // Cell 0 was claimed by the parked seed first, so the mover reserves
    // cell 1.
    assert_eq!(mover.target_cell, Some(CellId(1)));
    assert_eq!(mover.route, vec![CorridorId(15), CorridorId(2)]);
    lot.assert_reservations_consistent();
}

#[test]
fn test_seed_track_without_plate_is_ignored() {
    let mut layout = kiosk_lot_layout();
    layout.seed_plates.corridors.clear();
    let mut lot = TestLot::seeded(&layout);

    lot.tick(&[(1, (250.0, 125.0)), (2, (50.0, 50.0))]);

    assert!(lot.vehicles().contains(crate::zones::VehicleId(1)));
    assert!(!lot.vehicles().contains(crate::zones::VehicleId(2)));
}

#[test]
fn test_seeding_happens_once() {
    let mut lot = TestLot::seeded(&kiosk_lot_layout());
    lot.tick(&[(1, (250.0, 125.0))]);
    assert_eq!(lot.vehicles().vehicles.len(), 1);

    // A later unseen track is subject to normal admission, not seeding.
    lot.tick(&[(1, (250.0, 125.0)), (9, (50.0, 50.0))]);
    assert!(!lot.vehicles().contains(crate::zones::VehicleId(9)));

    lot.push_plate("7777");
    lot.tick(&[(1, (250.0, 125.0)), (9, (50.0, 50.0))]);
    let admitted = lot.vehicle(9);
    assert_eq!(admitted.plate, "7777");
}

#[test]
fn test_ticks_and_snapshots_advance_together() {
    let mut lot = TestLot::new(&kiosk_lot_layout());
    lot.tick(&[]);
    assert_eq!(lot.snapshot().tick, 1);
    lot.tick(&[]);
    let snapshot = lot.snapshot();
    assert_eq!(snapshot.tick, 2);
    assert!(snapshot.vehicles.is_empty());
    assert_eq!(snapshot.cells.len(), 2);
    assert_eq!(snapshot.corridors.len(), 4);
}
