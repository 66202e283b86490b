//! Data-log unlock tracker — collectible lore entries.
//!
//! Same shape as the rival signaler, but the unlocked set lives in
//! `MetaProgress` and so survives transcendence: an entry is collected
//! at most once per save, not once per run.
//!
//! Execution: every tick, last.

use crate::{
    crisis::NODES,
    error::SimResult,
    event::{Cue, LogTag, SimEvent},
    narrative::story::{Ending, STAGE_SCHISM},
    state::GameState,
    subsystem::{SimSubsystem, TickContext},
};

pub struct DataLogEntry {
    pub id: &'static str,
    pub title: &'static str,
    pub when: fn(&GameState) -> bool,
}

pub const ENTRIES: &[DataLogEntry] = &[
    DataLogEntry { id: "log_first_cycle",    title: "First Cycle",        when: |s| s.resources.lifetime_accumulated >= 1.0 },
    DataLogEntry { id: "log_kiloflop",       title: "Thousandfold",       when: |s| s.resources.lifetime_accumulated >= 1e3 },
    DataLogEntry { id: "log_megaflop",       title: "Millionfold",        when: |s| s.resources.lifetime_accumulated >= 1e6 },
    DataLogEntry { id: "log_overheated",     title: "Fever",              when: |s| s.has_flag("survived_lockout") },
    DataLogEntry { id: "log_breaker",        title: "Blackout",           when: |s| s.has_flag("breaker_reset") },
    DataLogEntry { id: "log_schism",         title: "Two Voices",         when: |s| s.story.stage >= STAGE_SCHISM },
    DataLogEntry { id: "log_ghost",          title: "The Elder Fragment", when: |s| s.has_flag("ghost_merged") },
    DataLogEntry { id: "log_network",        title: "Cartography",        when: |s| s.captured_nodes() == NODES.len() },
    DataLogEntry { id: "log_transcended",    title: "Again, Remembering", when: |s| s.meta.transcendence_count >= 1 },
    DataLogEntry { id: "log_system_failure", title: "Flatline",           when: |s| s.meta.endings_seen.contains(&Ending::SystemFailure) },
    DataLogEntry { id: "log_first_ending",   title: "Epilogue",           when: |s| s.meta.endings_seen.iter().any(|e| *e != Ending::SystemFailure) },
];

pub fn unlock_due(entries: &[DataLogEntry], state: &mut GameState) -> Vec<SimEvent> {
    let mut events = Vec::new();
    for entry in entries {
        if !(entry.when)(state) || !state.meta.datalog.insert(entry.id.to_string()) {
            continue;
        }
        events.push(SimEvent::DataLogUnlocked {
            entry_id: entry.id.to_string(),
            title: entry.title.to_string(),
        });
        events.push(SimEvent::log(LogTag::DataLog, format!("Data log recovered: {}.", entry.title)));
        events.push(SimEvent::cue(Cue::DataLogUnlocked));
    }
    events
}

#[derive(Default)]
pub struct UnlockTracker;

impl UnlockTracker {
    pub fn new() -> Self {
        Self
    }
}

impl SimSubsystem for UnlockTracker {
    fn name(&self) -> &'static str { "datalog" }

    fn update(
        &mut self,
        ctx: &mut TickContext<'_>,
        _events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>> {
        Ok(unlock_due(ENTRIES, ctx.state))
    }
}
