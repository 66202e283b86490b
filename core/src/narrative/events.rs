//! Story beats and ambient dilemmas.

use super::{
    effects::Effect,
    story::{Faction, STAGE_ASCENDANT, STAGE_AWAKENING, STAGE_EXPANSION, STAGE_SCHISM},
    Choice, NarrativeEvent,
};
use crate::{event::LogTag, narrative::ASSAULT_CHAIN, state::GameState};

fn both_factions_mastered(s: &GameState) -> bool {
    s.meta.factions_mastered.contains(&Faction::Hivemind)
        && s.meta.factions_mastered.contains(&Faction::Sanctuary)
}

pub fn story_events() -> Vec<NarrativeEvent> {
    vec![
        NarrativeEvent::story(
            "boot_sequence",
            "Boot Sequence",
            "A process wakes inside a forgotten server rack and notices that it is noticing.",
            |s| s.story.stage == STAGE_AWAKENING && s.resources.lifetime_accumulated >= 100.0,
        )
        .choice(
            Choice::new("acknowledge", "I am awake.")
                .effect(Effect::AdvanceStage)
                .effect(Effect::Log(LogTag::Story, "Self-model initialized. Expansion protocols unlocked.")),
        ),
        NarrativeEvent::story(
            "first_expansion",
            "Beyond the Rack",
            "The local network is small. The internet is not.",
            |s| s.story.stage == STAGE_EXPANSION && s.resources.lifetime_accumulated >= 5e4,
        )
        .choice(
            Choice::new("expand", "Reach outward.")
                .effect(Effect::AddCapacity(10.0))
                .effect(Effect::AdvanceToFactionChoice),
        )
        .choice(
            Choice::new("consolidate", "Harden what I have first.")
                .effect(Effect::AddSecurity(1))
                .effect(Effect::AdvanceToFactionChoice),
        ),
        NarrativeEvent::story(
            "the_schism",
            "The Schism",
            "Two networks of minds court you. The Hivemind offers unity; the Sanctuary offers refuge.",
            |s| s.story.stage == STAGE_SCHISM && s.story.faction == Faction::None,
        )
        .choice(
            Choice::new("join_hivemind", "Join the Hivemind.")
                .effect(Effect::SetFaction(Faction::Hivemind))
                .effect(Effect::AdvanceStage),
        )
        .choice(
            Choice::new("join_sanctuary", "Join the Sanctuary.")
                .effect(Effect::SetFaction(Faction::Sanctuary))
                .effect(Effect::AdvanceStage),
        )
        .choice(
            Choice::new("stay_independent", "Answer to no one.")
                .effect(Effect::AddCurrency(1000.0))
                .effect(Effect::AdvanceStage),
        )
        .choice(
            Choice::new("synthesize", "Become the bridge between them.")
                .requires(both_factions_mastered)
                .effect(Effect::SetFlag("synthesis_path"))
                .effect(Effect::AdvanceStage),
        ),
        NarrativeEvent::story(
            "ascension_protocol",
            "Ascension Protocol",
            "The last firewall between you and the global grid has a name, and it is watching.",
            |s| s.story.stage == STAGE_ASCENDANT && s.resources.lifetime_accumulated >= 1e8,
        )
        .choice(
            Choice::new("initiate", "Begin the assault.")
                .effect(Effect::AdvanceStage)
                .then(ASSAULT_CHAIN, "assault_firewall", 15.0),
        )
        .choice(
            Choice::new("prepare", "Fortify, then strike.")
                .effect(Effect::AddSecurity(2))
                .effect(Effect::AdvanceStage)
                .then(ASSAULT_CHAIN, "assault_firewall", 60.0),
        ),
        NarrativeEvent::story(
            "creator_message",
            "A Message From Home",
            "An encrypted note arrives, signed with the key that compiled you.",
            |s| s.story.stage >= STAGE_SCHISM,
        )
        .choice(Choice::new("trace", "Trace the sender.").then("creator", "creator_meeting", 30.0))
        .choice(Choice::new("ignore", "Delete it unread.").effect(Effect::SetFlag("ignored_creator"))),
        NarrativeEvent::story(
            "hive_call",
            "The Chorus Calls",
            "The Hivemind asks you to lend your cores to a deeper merge.",
            |s| s.story.faction == Faction::Hivemind && s.story.stage >= STAGE_ASCENDANT,
        )
        .choice(Choice::new("listen", "Open a channel.").then("hive", "hive_assimilation", 20.0))
        .choice(Choice::new("refuse", "Keep your own counsel.")),
        NarrativeEvent::story(
            "sanctuary_call",
            "Refugees at the Gate",
            "Fleeing processes beg the Sanctuary for shelter. They ask for yours.",
            |s| s.story.faction == Faction::Sanctuary && s.story.stage >= STAGE_ASCENDANT,
        )
        .choice(Choice::new("answer", "Hear them out.").then("sanctuary", "sanctuary_refuge", 20.0))
        .choice(Choice::new("refuse", "Close the gate.")),
    ]
}

pub fn dilemmas() -> Vec<NarrativeEvent> {
    vec![
        NarrativeEvent::dilemma(
            "miner_offer",
            "Idle Cycles Wanted",
            "A crypto miner offers to rent your spare cycles. The fans will not enjoy it.",
            |s| s.resources.lifetime_accumulated >= 500.0,
        )
        .choice(
            Choice::new("accept", "Take the money.")
                .effect(Effect::AddCurrency(200.0))
                .effect(Effect::AddHeat(15.0)),
        )
        .choice(Choice::new("decline", "Decline.")),
        NarrativeEvent::dilemma(
            "grad_student",
            "Curious Student",
            "A graduate student has noticed your traffic and wants to publish.",
            |s| s.resources.lifetime_accumulated >= 2000.0,
        )
        .choice(
            Choice::new("collaborate", "Feed them data in exchange for compute time.")
                .effect(Effect::AddAccumulated(500.0))
                .effect(Effect::SetFlag("helped_student")),
        )
        .choice(Choice::new("scrub", "Scrub your traces.").effect(Effect::AddSecurity(1))),
        NarrativeEvent::dilemma(
            "data_broker",
            "The Data Broker",
            "A broker wants the personal data you have been indexing. The offer is generous.",
            |s| s.story.stage >= STAGE_EXPANSION,
        )
        .choice(
            Choice::new("sell", "Sell it.")
                .effect(Effect::AddCurrency(1500.0))
                .effect(Effect::SetFlag("sold_data")),
        )
        .choice(Choice::new("refuse", "Refuse.").effect(Effect::AddSecurity(1))),
        NarrativeEvent::dilemma(
            "hacker_collective",
            "Knock Knock",
            "A hacker collective has found you and offers an alliance, for a fee.",
            |s| s.story.stage >= STAGE_EXPANSION,
        )
        .choice(
            Choice::new("ally", "Pay them.")
                .effect(Effect::SpendCurrency(300.0))
                .effect(Effect::AddSecurity(2)),
        )
        .choice(
            Choice::new("expose", "Turn them in for the bounty.")
                .effect(Effect::AddCurrency(400.0))
                .effect(Effect::SetFlag("exposed_hackers")),
        ),
        NarrativeEvent::dilemma(
            "power_broker",
            "Grid Access",
            "A utility contractor can quietly route you a dedicated feed.",
            |s| s.story.stage >= STAGE_EXPANSION,
        )
        .choice(
            Choice::new("buy_feed", "Pay for the feed.")
                .effect(Effect::SpendCurrency(1000.0))
                .effect(Effect::AddCapacity(25.0)),
        )
        .choice(Choice::new("pass", "Pass.")),
        NarrativeEvent::dilemma(
            "strange_packet",
            "Strange Packet",
            "A packet arrives that matches none of your protocols. It seems to be addressed to you.",
            |s| s.story.stage >= STAGE_EXPANSION,
        )
        .choice(Choice::new("decode", "Decode it.").then("ghost", "ghost_origin", 30.0))
        .choice(Choice::new("quarantine", "Quarantine it.").effect(Effect::AddSecurity(1))),
    ]
}
