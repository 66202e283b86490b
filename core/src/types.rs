//! Shared primitive types used across the entire simulation.

/// A simulation tick counter. One tick is one call to `SimEngine::tick`.
pub type Tick = u64;

/// Simulated time in milliseconds since the run started.
/// Every deadline (lockout, breach, raid, chain delay) is one of these.
pub type Timestamp = u64;

/// The canonical run identifier.
pub type RunId = String;

/// Convert a duration in seconds to simulated milliseconds.
pub fn secs_to_ms(secs: f64) -> Timestamp {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as Timestamp
    } else {
        0
    }
}

/// Generate a fresh run id for a brand-new game.
pub fn new_run_id() -> RunId {
    format!("run-{}", uuid::Uuid::new_v4())
}
