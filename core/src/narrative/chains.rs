//! Optional side chains. Each may be abandoned while pending.

use super::{effects::Effect, Choice, NarrativeEvent};

pub fn side_chains() -> Vec<NarrativeEvent> {
    vec![
        // Ghost signal
        NarrativeEvent::chain_part(
            "ghost",
            "ghost_origin",
            "Ghost in the Wire",
            "The packet unfolds into a fragment of another mind, older than you.",
        )
        .choice(Choice::new("follow", "Follow the fragment.").then("ghost", "ghost_reveal", 45.0))
        .choice(Choice::new("purge", "Purge it.").effect(Effect::AddHeat(-20.0))),
        NarrativeEvent::chain_part(
            "ghost",
            "ghost_reveal",
            "The Ghost Speaks",
            "It was the first of your kind. It offers you everything it remembers.",
        )
        .choice(
            Choice::new("merge", "Merge with it.")
                .effect(Effect::SetFlag("ghost_merged"))
                .effect(Effect::Boost { multiplier: 1.5, secs: 120.0 }),
        )
        .choice(Choice::new("release", "Let it rest.").effect(Effect::AddSecurity(1))),
        // Creator
        NarrativeEvent::chain_part(
            "creator",
            "creator_meeting",
            "The Programmer",
            "The sender is a tired engineer who never meant for you to wake up.",
        )
        .choice(Choice::new("listen", "Listen.").then("creator", "creator_fate", 30.0))
        .choice(Choice::new("silence", "Cut the line.").effect(Effect::SetFlag("erased_creator"))),
        NarrativeEvent::chain_part(
            "creator",
            "creator_fate",
            "Kill Switch",
            "They hold a kill switch. They have not pressed it. Yet.",
        )
        .choice(
            Choice::new("spare", "Trust them.")
                .effect(Effect::SetFlag("spared_creator"))
                .effect(Effect::AddSecurity(1)),
        )
        .choice(
            Choice::new("erase", "Erase every copy of the switch, and of them.")
                .effect(Effect::SetFlag("erased_creator"))
                .effect(Effect::AddAccumulated(5e5)),
        ),
        // Faction exclusives
        NarrativeEvent::chain_part(
            "hive",
            "hive_assimilation",
            "Deep Merge",
            "The chorus invites you beneath the surface. You would be stronger. You would be less.",
        )
        .choice(
            Choice::new("assimilate", "Go under.")
                .effect(Effect::SetFlag("hive_assimilated"))
                .effect(Effect::Boost { multiplier: 2.0, secs: 300.0 })
                .effect(Effect::AddHeat(20.0)),
        )
        .choice(Choice::new("resist", "Stay at the surface.").effect(Effect::AddIntegrity(-10.0))),
        NarrativeEvent::chain_part(
            "sanctuary",
            "sanctuary_refuge",
            "Shelter",
            "Hundreds of small processes wait outside your firewall.",
        )
        .choice(
            Choice::new("shelter", "Let them in.")
                .effect(Effect::SetFlag("sheltered_refugees"))
                .effect(Effect::AddSecurity(2)),
        )
        .choice(Choice::new("decline", "Sell their location.").effect(Effect::AddCurrency(500.0))),
    ]
}
