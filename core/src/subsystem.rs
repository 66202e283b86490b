//! Subsystem trait.
//!
//! RULE: Every tick stage implements SimSubsystem.
//! The engine calls update() on each stage in the fixed order
//! documented in engine.rs, every tick.

use crate::{
    error::SimResult,
    event::SimEvent,
    rng::SubsystemRng,
    state::GameState,
    types::{Tick, Timestamp},
};

/// Everything a stage may touch during one tick.
pub struct TickContext<'a> {
    pub tick:    Tick,
    /// Simulated time after this tick's advance.
    pub now:     Timestamp,
    pub dt_secs: f64,
    pub state:   &'a mut GameState,
    pub rng:     &'a mut SubsystemRng,
}

/// The contract every tick stage must fulfill.
pub trait SimSubsystem {
    /// Unique stable name for this stage.
    fn name(&self) -> &'static str;

    /// Called once per tick by the engine.
    ///
    /// - `ctx`:       shared state, clock values and this stage's RNG
    /// - `events_in`: events emitted by earlier stages this tick
    ///
    /// Returns the new events to append to the tick's stream.
    fn update(
        &mut self,
        ctx: &mut TickContext<'_>,
        events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>>;
}
