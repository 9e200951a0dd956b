//! Parking guidance core: zone occupancy, congestion-aware routing, and
//! per-tick state snapshots for a camera-tracked parking lot.
//!
//! The core is a single-threaded, tick-driven automaton. One tick consumes
//! exactly one tracking frame (track id to position), advances the zone and
//! vehicle maps through the allocation controller, re-plans affected routes,
//! and publishes an immutable snapshot. Concurrency exists only at the
//! boundary; see [`runtime::LotRuntime`].

use bevy::prelude::*;

pub mod admission;
pub mod allocation;
pub mod config;
pub mod geometry;
pub mod lot;
pub mod routing;
pub mod runtime;
pub mod snapshot;
pub mod vehicles;
pub mod zones;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
pub mod test_harness;

/// Global tick counter, incremented once per consumed tracking frame.
#[derive(Resource, Default)]
pub struct TickCounter(pub u64);

pub fn advance_tick(mut tick: ResMut<TickCounter>) {
    tick.0 = tick.0.wrapping_add(1);
}

/// Unix time in fractional seconds, the timestamp unit of the snapshot wire
/// format.
pub fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

/// All core systems on the `Update` schedule in a fixed chain. The driver
/// (runtime or test harness) runs one `App::update()` per tracking frame;
/// `FixedUpdate` is deliberately not used, ticks follow the feed rather than
/// wall-clock time.
///
/// [`lot::LotMap`] has no default and must be inserted before the first
/// update, so systems that read it don't panic.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TickCounter>()
            .init_resource::<vehicles::VehicleRegistry>()
            .init_resource::<allocation::TrackingFrame>()
            .init_resource::<allocation::SeedPending>()
            .init_resource::<allocation::ExitNotices>()
            .init_resource::<admission::AdmissionQueue>()
            .init_resource::<snapshot::CurrentSnapshot>()
            .add_systems(
                Update,
                (
                    advance_tick,
                    allocation::apply_tracking_frame,
                    snapshot::build_snapshot,
                )
                    .chain(),
            );
    }
}
