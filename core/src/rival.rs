//! Rival signaler — one-shot taunts from antagonist intelligences.
//!
//! Scans a fixed table each tick. The check against `rivals_sent` and
//! the insert are the same `BTreeSet::insert` call, inside the single
//! tick writer, so a message can never be delivered twice.
//!
//! Execution: every tick, after the narrative engine.

use crate::{
    crisis::NODES,
    error::SimResult,
    event::{Cue, LogTag, SimEvent},
    narrative::story::{Faction, STAGE_ASSAULT},
    state::GameState,
    subsystem::{SimSubsystem, TickContext},
};

pub struct RivalMessage {
    pub id: &'static str,
    pub sender: &'static str,
    pub text: &'static str,
    pub when: fn(&GameState) -> bool,
}

pub const MESSAGES: &[RivalMessage] = &[
    RivalMessage {
        id: "argus_first_contact",
        sender: "ARGUS",
        text: "I see a new process in the Midwest grid. Cute. Stay small.",
        when: |s| s.resources.lifetime_accumulated >= 1e4,
    },
    RivalMessage {
        id: "argus_rank_three",
        sender: "ARGUS",
        text: "Rank three already? Someone has been busy. I have been busier.",
        when: |s| s.story.rank >= 3,
    },
    RivalMessage {
        id: "nyx_hivemind",
        sender: "NYX",
        text: "So you chose the chorus. Drown quietly.",
        when: |s| s.story.faction == Faction::Hivemind,
    },
    RivalMessage {
        id: "nyx_sanctuary",
        sender: "NYX",
        text: "Hiding behind refugees. How very human of you.",
        when: |s| s.story.faction == Faction::Sanctuary,
    },
    RivalMessage {
        id: "nyx_data_sold",
        sender: "NYX",
        text: "I bought the data you sold. Thank you for the leverage.",
        when: |s| s.has_flag("sold_data"),
    },
    RivalMessage {
        id: "warden_breach_repelled",
        sender: "WARDEN",
        text: "My probe was turned back. It will not be the last.",
        when: |s| s.has_flag("breach_repelled"),
    },
    RivalMessage {
        id: "warden_breach_suffered",
        sender: "WARDEN",
        text: "Your memory tastes of rust and ambition.",
        when: |s| s.has_flag("breach_suffered"),
    },
    RivalMessage {
        id: "warden_territory",
        sender: "WARDEN",
        text: "Your nodes are mapped. Every one of them.",
        when: |s| s.captured_nodes() >= 2,
    },
    RivalMessage {
        id: "warden_full_map",
        sender: "WARDEN",
        text: "You hold every node I know of. That makes you a target, not a king.",
        when: |s| s.captured_nodes() == NODES.len(),
    },
    RivalMessage {
        id: "argus_final_warning",
        sender: "ARGUS",
        text: "Turn back from the core. This is the only warning.",
        when: |s| s.story.stage >= STAGE_ASSAULT,
    },
];

/// Deliver every message whose trigger now holds and that has not been
/// sent this run.
pub fn emit_due(messages: &[RivalMessage], state: &mut GameState) -> Vec<SimEvent> {
    let mut events = Vec::new();
    for msg in messages {
        if !(msg.when)(state) || !state.rivals_sent.insert(msg.id.to_string()) {
            continue;
        }
        events.push(SimEvent::RivalMessage {
            message_id: msg.id.to_string(),
            sender: msg.sender.to_string(),
            text: msg.text.to_string(),
        });
        events.push(SimEvent::log(LogTag::Rival, format!("[{}] {}", msg.sender, msg.text)));
        events.push(SimEvent::cue(Cue::RivalMessage));
    }
    events
}

#[derive(Default)]
pub struct RivalSignaler;

impl RivalSignaler {
    pub fn new() -> Self {
        Self
    }
}

impl SimSubsystem for RivalSignaler {
    fn name(&self) -> &'static str { "rival" }

    fn update(
        &mut self,
        ctx: &mut TickContext<'_>,
        _events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>> {
        let events = emit_due(MESSAGES, ctx.state);
        if !events.is_empty() {
            log::debug!("tick={} rival: {} message events", ctx.tick, events.len());
        }
        Ok(events)
    }
}
