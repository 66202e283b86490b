//! Simulation clock — owns tick count, simulated time and pause.

use crate::types::{secs_to_ms, RunId, Tick, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub run_id:       RunId,
    pub current_tick: Tick,
    /// Simulated milliseconds since the run started.
    pub now_ms:       Timestamp,
    /// Player intents issued since the run started. Feeds intent RNG streams.
    #[serde(default)]
    pub intent_seq:   u64,
    #[serde(default)]
    pub paused:       bool,
}

impl SimClock {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            current_tick: 0,
            now_ms: 0,
            intent_seq: 0,
            paused: false,
        }
    }

    /// Advance one tick of `dt_secs`. Returns the new tick number.
    pub fn advance(&mut self, dt_secs: f64) -> Tick {
        self.current_tick += 1;
        self.now_ms += secs_to_ms(dt_secs);
        self.current_tick
    }

    /// Jump simulated time forward without running a tick (offline catch-up).
    pub fn skip(&mut self, ms: Timestamp) {
        self.now_ms += ms;
    }

    /// Reserve the next intent sequence number.
    pub fn next_intent(&mut self) -> u64 {
        self.intent_seq += 1;
        self.intent_seq
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }
}
