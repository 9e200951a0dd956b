use crate::snapshot::Direction;
use crate::test_harness::{kiosk_lot_layout, TestLot};
use crate::vehicles::ZoneRef;
use crate::zones::{CellId, CellStatus, CorridorId, VehicleId};

// ====================================================================
// Admission and entry flow
// ====================================================================

#[test]
fn test_admission_reserves_nearest_cell() {
    let mut lot = TestLot::new(&kiosk_lot_layout());
    let verdicts = lot.verdicts();
    lot.push_plate("1234");

    // Unseen track 7 stands in the entry corridor.
    lot.tick(&[(7, (50.0, 50.0))]);

    assert_eq!(verdicts.try_recv(), Ok(true));
    let vehicle = lot.vehicle(7);
    assert!(vehicle.status.is_entry());
    assert_eq!(vehicle.plate, "1234");
    // Cell 1 (corridor 2) is nearer than cell 0 (corridor 3).
    assert_eq!(vehicle.target_cell, Some(CellId(1)));
    assert_eq!(vehicle.route.last(), Some(&CorridorId(2)));

    let cell = &lot.lot().cells[&CellId(1)];
    assert_eq!(cell.status, CellStatus::Target);
    assert_eq!(cell.claimant, Some(VehicleId(7)));
    lot.assert_reservations_consistent();
}

#[test]
fn test_parking_completes_the_entry() {
    let mut lot = TestLot::new(&kiosk_lot_layout());
    lot.push_plate("1234");
    lot.tick(&[(7, (50.0, 50.0))]);

    // The tracked position lands inside the reserved cell.
    lot.tick(&[(7, (150.0, 125.0))]);

    let vehicle = lot.vehicle(7);
    assert!(vehicle.status.is_parking());
    assert!(vehicle.route.is_empty());
    assert_eq!(vehicle.target_cell, None);
    assert!(vehicle.parking_time.is_some());
    assert_eq!(vehicle.zone, Some(ZoneRef::Cell(CellId(1))));

    let cell = &lot.lot().cells[&CellId(1)];
    assert_eq!(cell.status, CellStatus::Occupied);
    assert_eq!(cell.claimant, Some(VehicleId(7)));

    // Route holds and corridor occupancy are fully unwound.
    for corridor in lot.lot().corridors.values() {
        assert_eq!(corridor.congestion, corridor.base_congestion, "{:?}", corridor.id);
        assert!(corridor.route_holds.is_empty());
        assert!(corridor.occupants.is_empty());
    }
}

#[test]
fn test_full_lot_rejects_admission() {
    let mut lot = TestLot::new(&kiosk_lot_layout());
    lot.occupy_cell(0, 90);
    lot.occupy_cell(1, 91);
    let verdicts = lot.verdicts();
    lot.push_plate("9999");

    lot.tick(&[(5, (50.0, 50.0))]);

    assert_eq!(verdicts.try_recv(), Ok(false));
    assert!(lot.vehicles().vehicles.is_empty());
    assert_eq!(lot.pending_plates(), 0);
}

#[test]
fn test_plate_waits_until_a_track_reaches_the_entry() {
    let mut lot = TestLot::new(&kiosk_lot_layout());
    let verdicts = lot.verdicts();
    lot.push_plate("4321");

    // A track outside the entry corridor does not consume the plate.
    lot.tick(&[(5, (150.0, 50.0))]);

    assert!(verdicts.try_recv().is_err());
    assert_eq!(lot.pending_plates(), 1);
    assert!(lot.vehicles().vehicles.is_empty());
}

#[test]
fn test_snapshot_reflects_admitted_vehicle() {
    let mut lot = TestLot::new(&kiosk_lot_layout());
    lot.push_plate("1234");
    lot.tick(&[(7, (50.0, 50.0))]);

    let snapshot = lot.snapshot();
    assert_eq!(snapshot.tick, 1);
    let entry = &snapshot.vehicles[&7];
    assert_eq!(entry.plate, "1234");
    assert_eq!(entry.route, vec![15, 2]);
    assert_eq!(snapshot.cells[&1].status, CellStatus::Target);
    assert_eq!(snapshot.cells[&1].plate.as_deref(), Some("1234"));
}

// ====================================================================
// Display guidance
// ====================================================================

#[test]
fn test_display_guides_toward_target_cell() {
    let mut lot = TestLot::new(&kiosk_lot_layout());
    lot.push_plate("1234");
    lot.tick(&[(7, (50.0, 50.0))]);

    // Route is [15, 2]; corridor 2 carries display unit 1 and is the last
    // step, so the arrow points at the target cell below it.
    let snapshot = lot.snapshot();
    assert_eq!(snapshot.displays.len(), 2);
    let unit1 = &snapshot.displays[&1];
    assert_eq!(unit1.len(), 1);
    assert_eq!(unit1[0].plate, "1234");
    assert_eq!(unit1[0].direction, Direction::Up);
    assert!(snapshot.displays[&2].is_empty());
}

#[test]
fn test_display_guides_along_longer_routes() {
    let mut lot = TestLot::new(&kiosk_lot_layout());
    // Only cell 0 (corridor 3) left: route becomes [15, 2, 3].
    lot.occupy_cell(1, 91);
    lot.push_plate("5678");
    lot.tick(&[(7, (50.0, 50.0))]);

    let vehicle = lot.vehicle(7);
    assert_eq!(
        vehicle.route,
        vec![CorridorId(15), CorridorId(2), CorridorId(3)]
    );

    // Corridor 3 lies to the right of corridor 2 in camera space, which is
    // left on the mirrored display.
    let snapshot = lot.snapshot();
    let unit1 = &snapshot.displays[&1];
    assert_eq!(unit1.len(), 1);
    assert_eq!(unit1[0].direction, Direction::Left);
}
