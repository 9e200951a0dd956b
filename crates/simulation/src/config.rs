/// Congestion added to a corridor for each vehicle physically inside it.
pub const VEHICLE_CONGESTION: u32 = 100;

/// Congestion added to a corridor for each vehicle holding it in an active
/// route. This is what lets the search penalize corridors vehicles are
/// heading toward, not just the ones they currently occupy.
pub const ROUTE_HOLD_CONGESTION: u32 = 100;

/// Base congestion assumed for corridors whose layout entry omits one.
pub const DEFAULT_BASE_CONGESTION: u32 = 100;

/// Plate strings from the entry kiosk are exactly this many characters.
pub const PLATE_LEN: usize = 4;

/// How long an admission caller waits for the core's accept/reject verdict
/// before treating the request as failed.
pub const ADMISSION_TIMEOUT_SECS: u64 = 10;

/// Outbound snapshot channels buffer at most this many unread ticks. A full
/// buffer drops the tick for that consumer rather than stalling the core.
pub const SNAPSHOT_CHANNEL_CAPACITY: usize = 8;

/// Tracking frames discarded at startup while the camera pipeline warms up.
pub const WARMUP_FRAMES: usize = 10;

/// How often the core loop wakes from a blocking frame receive to check the
/// shutdown flag, in milliseconds.
pub const SHUTDOWN_POLL_MS: u64 = 250;
