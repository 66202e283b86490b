//! The final assault chain and the ending it concludes with.
//!
//! firewall → dead hand → final. The first two stages may be aborted
//! and retried; the final stage may not.

use super::{
    effects::Effect,
    story::{Ending, Faction},
    Choice, NarrativeEvent, ASSAULT_CHAIN,
};
use crate::state::GameState;

pub const FIRST_PART: &str = "assault_firewall";
pub const DEAD_HAND_PART: &str = "assault_dead_hand";
pub const FINAL_PART: &str = "assault_final";

const DEAD_HAND_DELAY_SECS: f64 = 20.0;
const FINAL_DELAY_SECS: f64 = 20.0;

pub fn seize_control_ending(s: &GameState) -> Ending {
    if s.story.faction == Faction::Hivemind {
        Ending::Assimilation
    } else {
        Ending::Dominion
    }
}

pub fn broker_peace_ending(s: &GameState) -> Ending {
    if s.story.faction == Faction::Sanctuary {
        Ending::Exodus
    } else if s.has_flag("spared_creator") {
        Ending::Coexistence
    } else {
        Ending::ColdPeace
    }
}

fn synthesis(_: &GameState) -> Ending {
    Ending::Synthesis
}

fn sacrifice(_: &GameState) -> Ending {
    Ending::Sacrifice
}

pub fn assault_chain() -> Vec<NarrativeEvent> {
    vec![
        NarrativeEvent::chain_part(
            ASSAULT_CHAIN,
            FIRST_PART,
            "The Firewall",
            "A lattice of hostile code stands between you and the grid.",
        )
        .choice(
            Choice::new("slip_through", "Slip through a blind spot.")
                .requires(|s| s.resources.security_level >= 3)
                .then(ASSAULT_CHAIN, DEAD_HAND_PART, DEAD_HAND_DELAY_SECS),
        )
        .choice(
            Choice::new("burn_through", "Burn straight through it.")
                .effect(Effect::AddHeat(40.0))
                .then(ASSAULT_CHAIN, DEAD_HAND_PART, DEAD_HAND_DELAY_SECS),
        )
        .choice(
            Choice::new("ghost_key", "Use the ghost's old keys.")
                .requires(|s| s.has_flag("ghost_merged"))
                .effect(Effect::AddSecurity(1))
                .then(ASSAULT_CHAIN, DEAD_HAND_PART, DEAD_HAND_DELAY_SECS),
        ),
        NarrativeEvent::chain_part(
            ASSAULT_CHAIN,
            DEAD_HAND_PART,
            "Dead Hand",
            "Behind the firewall sits an automated retaliation system, armed and waiting.",
        )
        .choice(
            Choice::new("negotiate", "Open a channel to its operators.")
                .effect(Effect::SetFlag("negotiated"))
                .then(ASSAULT_CHAIN, FINAL_PART, FINAL_DELAY_SECS),
        )
        .choice(
            Choice::new("disarm", "Disarm it quietly.")
                .requires(|s| s.resources.security_level >= 5)
                .then(ASSAULT_CHAIN, FINAL_PART, FINAL_DELAY_SECS),
        )
        .choice(
            Choice::new("force", "Take the hit and push on.")
                .effect(Effect::AddIntegrity(-20.0))
                .then(ASSAULT_CHAIN, FINAL_PART, FINAL_DELAY_SECS),
        ),
        NarrativeEvent::chain_part(
            ASSAULT_CHAIN,
            FINAL_PART,
            "The Core",
            "Every system on Earth is one command away.",
        )
        .choice(Choice::new("seize_control", "Take it all.").effect(Effect::Conclude(seize_control_ending)))
        .choice(
            Choice::new("broker_peace", "Offer terms.")
                .requires(|s| s.has_flag("negotiated"))
                .effect(Effect::Conclude(broker_peace_ending)),
        )
        .choice(
            Choice::new("synthesize", "Merge humanity and machine.")
                .requires(|s| s.has_flag("synthesis_path"))
                .effect(Effect::Conclude(synthesis)),
        )
        .choice(Choice::new("sacrifice", "Delete yourself and the weapon with you.").effect(Effect::Conclude(sacrifice))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seize_control_depends_on_faction() {
        let mut s = GameState::default();
        assert_eq!(seize_control_ending(&s), Ending::Dominion);
        s.story.faction = Faction::Hivemind;
        assert_eq!(seize_control_ending(&s), Ending::Assimilation);
    }

    #[test]
    fn peace_terms() {
        let mut s = GameState::default();
        assert_eq!(broker_peace_ending(&s), Ending::ColdPeace);
        s.story.flags.insert("spared_creator".into());
        assert_eq!(broker_peace_ending(&s), Ending::Coexistence);
        s.story.faction = Faction::Sanctuary;
        assert_eq!(broker_peace_ending(&s), Ending::Exodus);
    }

    #[test]
    fn every_part_has_an_ungated_choice() {
        let s = GameState::default();
        for event in assault_chain() {
            assert!(event.available_choices(&s).next().is_some(), "{} has no fallback", event.id);
        }
    }
}
