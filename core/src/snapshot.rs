//! Save snapshots — full engine state to/from JSON.
//!
//! A snapshot captures everything needed to resume a run: the clock,
//! the master seed and the complete `GameState`. RNG streams are derived
//! from (seed, slot, tick), so no generator state is stored.
//!
//! Restoring also credits offline progress for the wall-clock gap
//! between `saved_at` and the load time.

use crate::{
    catalog::UpgradeCatalog,
    clock::SimClock,
    config::{EconomyConfig, OfflineConfig},
    crisis::{CrisisState, NodeStatus},
    error::{SimError, SimResult},
    event::{LogTag, SimEvent},
    ledger::derive_rates,
    progression::perk_bonuses,
    state::GameState,
    types::{secs_to_ms, RunId, Timestamp},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bump when a field changes meaning. Additive fields only need
/// `#[serde(default)]`.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSnapshot {
    pub schema_version: u32,
    pub run_id: RunId,
    pub seed: u64,
    pub saved_at: DateTime<Utc>,
    pub clock: SimClock,
    pub state: GameState,
}

impl SaveSnapshot {
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> SimResult<Self> {
        let snap: Self = serde_json::from_str(json)?;
        if snap.schema_version > SCHEMA_VERSION {
            return Err(SimError::UnsupportedSchema {
                found: snap.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(snap)
    }
}

/// What happened while the player was away.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OfflineReport {
    /// Wall-clock seconds between save and load.
    pub away_secs: f64,
    /// Seconds actually simulated after the cap.
    pub credited_secs: f64,
    pub gained: f64,
}

impl OfflineReport {
    pub fn event(&self) -> SimEvent {
        SimEvent::OfflineProgress { elapsed_secs: self.credited_secs, gained: self.gained }
    }
}

/// Drop counts for upgrades the catalog no longer knows about.
pub fn prune_unknown_upgrades(state: &mut GameState, catalog: &UpgradeCatalog) -> usize {
    let before = state.owned.len();
    state.owned.retain(|id, _| catalog.get(id).is_some());
    let dropped = before - state.owned.len();
    if dropped > 0 {
        log::warn!("snapshot: dropped {dropped} unknown upgrade ids");
    }
    dropped
}

/// Credit offline production and move the clock forward.
///
/// The gap is integrated piecewise: it is split wherever an overclock,
/// a narrative boost or a thermal lockout runs out, and each piece is
/// credited at the rates in force during it. A breach keeps siphoning
/// for the whole gap. Breach and raid deadlines shift with the clock so
/// nothing expires while away; lockout deadlines do not, so a lockout
/// finishes offline and production resumes from that point.
pub fn apply_offline(
    state: &mut GameState,
    clock: &mut SimClock,
    catalog: &UpgradeCatalog,
    econ: &EconomyConfig,
    config: &OfflineConfig,
    away_secs: f64,
) -> OfflineReport {
    let away_secs = if away_secs.is_finite() { away_secs.max(0.0) } else { 0.0 };
    let credited_secs = away_secs.min(config.max_offline_secs.max(0.0));
    let gap = secs_to_ms(credited_secs);
    let start = clock.now_ms;
    let end = start + gap;

    let efficiency = (config.offline_efficiency + perk_bonuses(&state.meta).offline_efficiency).max(0.0);
    let mut gained = 0.0;
    if state.is_active() {
        let mut t = start;
        while t < end {
            let next = rate_changes(state)
                .into_iter()
                .flatten()
                .filter(|&at| at > t && at < end)
                .min()
                .unwrap_or(end);
            let rates = derive_rates(catalog, econ, state, t);
            let factor = match state.crisis {
                CrisisState::ThermalLockout { until } if t >= until => 1.0,
                ref crisis => crisis.production_factor(econ.breach_siphon),
            };
            let secs = (next - t) as f64 / 1000.0;
            gained += rates.production * rates.multiplier * factor * secs * efficiency;
            t = next;
        }
    }
    state.resources.accumulated += gained;
    state.resources.lifetime_accumulated += gained;

    clock.skip(gap);
    if let CrisisState::SecurityBreach { deadline, .. } = &mut state.crisis {
        *deadline += gap;
    }
    for status in state.nodes.values_mut() {
        if let NodeStatus::Raided { deadline } = status {
            *deadline += gap;
        }
    }

    OfflineReport { away_secs, credited_secs, gained }
}

/// Instants at which the offline production rate changes.
fn rate_changes(state: &GameState) -> [Option<Timestamp>; 3] {
    let lockout = match state.crisis {
        CrisisState::ThermalLockout { until } => Some(until),
        _ => None,
    };
    [
        state.modifiers.overclock_until,
        state.modifiers.boost.map(|boost| boost.until),
        lockout,
    ]
}

pub fn welcome_back_log(report: &OfflineReport) -> SimEvent {
    SimEvent::log(
        LogTag::System,
        format!(
            "Resumed after {:.0}s offline. {:.0} FLOPS computed in the background.",
            report.credited_secs, report.gained
        ),
    )
}
