//! Narrative engine tests — chain delays, the seen set, choice gating,
//! faction immutability and the assault sequence.

use sentience_core::{
    config::{NarrativeConfig, SimConfig},
    engine::SimEngine,
    error::ActionError,
    event::SimEvent,
    narrative::{
        story::{ChainProgress, Ending, Faction},
        NarrativeEngine,
    },
    rng::{RngBank, SubsystemSlot},
    state::GameState,
};

fn engine_with(run_id: &str, f: impl FnOnce(&mut GameState)) -> SimEngine {
    let base = SimEngine::build_test(run_id, 42);
    let mut state = base.state().clone();
    f(&mut state);
    SimEngine::from_state(run_id, 42, SimConfig::default_test(), state)
}

fn quiet() -> NarrativeConfig {
    NarrativeConfig { dilemma_chance: 0.0, ..NarrativeConfig::default() }
}

fn presented(events: &[SimEvent]) -> Option<&str> {
    events.iter().find_map(|e| match e {
        SimEvent::NarrativePresented { event_id, .. } => Some(event_id.as_str()),
        _ => None,
    })
}

#[test]
fn chain_part_waits_for_its_delay() {
    let narrative = NarrativeEngine::new(quiet());
    let bank = RngBank::new(9);
    let mut state = GameState::default();
    state.story.stage = 1;
    state.story.active_event = Some("strange_packet".into());

    let events = narrative.resolve(&mut state, 0, "strange_packet", "decode").unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        SimEvent::ChainScheduled { chain_id, unlock_at: 30_000, .. } if chain_id == "ghost"
    )));
    assert_eq!(state.story.active_event, None);

    let mut rng = bank.for_tick(SubsystemSlot::Narrative, 1);
    assert!(narrative.evaluate(&state, 29_999, &mut rng).is_none());

    let mut rng = bank.for_tick(SubsystemSlot::Narrative, 2);
    let next = narrative.evaluate(&state, 30_000, &mut rng).map(|e| e.id);
    assert_eq!(next, Some("ghost_origin"));
}

#[test]
fn resolved_event_never_comes_back() {
    let narrative = NarrativeEngine::new(NarrativeConfig { dilemma_chance: 1.0, ..NarrativeConfig::default() });
    let bank = RngBank::new(3);
    let mut state = GameState::default();
    state.story.stage = 1;
    state.story.active_event = Some("power_broker".into());

    narrative.resolve(&mut state, 0, "power_broker", "pass").unwrap();
    assert!(state.story.seen_events.contains("power_broker"));

    state.story.active_event = Some("power_broker".into());
    let err = narrative.resolve(&mut state, 0, "power_broker", "pass").unwrap_err();
    assert!(matches!(err, ActionError::UnknownChoice { .. }));
    state.story.active_event = None;

    for tick in 0..200 {
        let mut rng = bank.for_tick(SubsystemSlot::Narrative, tick);
        if let Some(event) = narrative.evaluate(&state, 1_000_000, &mut rng) {
            assert_ne!(event.id, "power_broker");
        }
    }
}

#[test]
fn dilemmas_respect_their_cooldown() {
    let narrative = NarrativeEngine::new(NarrativeConfig { dilemma_chance: 1.0, ..NarrativeConfig::default() });
    let mut rng = RngBank::new(3).for_tick(SubsystemSlot::Narrative, 1);
    let mut state = GameState::default();
    state.story.stage = 1;
    state.story.active_event = Some("power_broker".into());
    narrative.resolve(&mut state, 0, "power_broker", "pass").unwrap();

    assert!(narrative.evaluate(&state, 119_999, &mut rng).is_none());
    assert!(narrative.evaluate(&state, 120_000, &mut rng).is_some());
}

#[test]
fn chain_continuation_beats_story_and_dilemmas() {
    let narrative = NarrativeEngine::new(NarrativeConfig { dilemma_chance: 1.0, ..NarrativeConfig::default() });
    let mut state = GameState::default();
    state.story.stage = 2;
    state.story.active_chains.insert(
        "ghost".into(),
        ChainProgress { part_id: "ghost_reveal".into(), unlock_at: 0 },
    );

    for tick in 0..20 {
        let mut rng = RngBank::new(11).for_tick(SubsystemSlot::Narrative, tick);
        let picked = narrative.evaluate(&state, 1_000, &mut rng).map(|e| e.id);
        assert_eq!(picked, Some("ghost_reveal"));
    }
}

#[test]
fn nothing_is_presented_while_an_event_is_active() {
    let narrative = NarrativeEngine::new(quiet());
    let mut rng = RngBank::new(1).for_tick(SubsystemSlot::Narrative, 1);
    let mut state = GameState::default();
    state.resources.lifetime_accumulated = 1_000.0;
    assert_eq!(narrative.evaluate(&state, 0, &mut rng).map(|e| e.id), Some("boot_sequence"));

    state.story.active_event = Some("boot_sequence".into());
    assert!(narrative.evaluate(&state, 0, &mut rng).is_none());
}

#[test]
fn unknown_and_gated_choices_are_rejected() {
    let mut engine = engine_with("narrative-gated", |s| {
        s.story.stage = 2;
        s.story.seen_events.insert("creator_message".into());
    });
    let events = engine.tick(1.0).unwrap();
    assert_eq!(presented(&events), Some("the_schism"));

    assert!(matches!(
        engine.resolve("the_schism", "become_a_toaster"),
        Err(ActionError::UnknownChoice { .. })
    ));
    // Requires both factions mastered in an earlier run.
    assert!(matches!(
        engine.resolve("the_schism", "synthesize"),
        Err(ActionError::UnknownChoice { .. })
    ));
    assert!(matches!(
        engine.resolve("boot_sequence", "acknowledge"),
        Err(ActionError::UnknownChoice { .. })
    ));
    assert_eq!(engine.state().story.active_event.as_deref(), Some("the_schism"));
}

#[test]
fn failing_effect_leaves_state_untouched() {
    let mut engine = engine_with("narrative-atomic", |s| {
        s.story.stage = 1;
        s.story.active_event = Some("hacker_collective".into());
        s.resources.currency = 100.0;
    });
    let before = engine.state().clone();

    let err = engine.resolve("hacker_collective", "ally").unwrap_err();
    assert!(matches!(err, ActionError::InsufficientFunds { .. }));
    assert_eq!(engine.state(), &before);

    engine.resolve("hacker_collective", "expose").unwrap();
    assert_eq!(engine.state().resources.currency, 500.0);
    assert!(engine.state().has_flag("exposed_hackers"));
}

#[test]
fn faction_is_fixed_for_the_rest_of_the_run() {
    let mut engine = engine_with("narrative-faction", |s| {
        s.story.stage = 2;
        s.story.seen_events.insert("creator_message".into());
    });
    engine.tick(1.0).unwrap();

    let events = engine.resolve("the_schism", "join_hivemind").unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, SimEvent::FactionChosen { faction: Faction::Hivemind })));
    assert_eq!(engine.state().story.faction, Faction::Hivemind);
    assert_eq!(engine.state().story.stage, 3);

    assert!(engine.resolve("the_schism", "join_sanctuary").is_err());

    // Play on through whatever the story offers next.
    for _ in 0..300 {
        engine.tick(1.0).unwrap();
        if let Some(event) = engine.active_event() {
            let id = event.id;
            let choice = event.available_choices(engine.state()).last().map(|c| c.id);
            if let Some(choice) = choice {
                let _ = engine.resolve(id, choice);
            }
        }
        assert_eq!(engine.state().story.faction, Faction::Hivemind);
    }
}

#[test]
fn transcend_clears_the_faction() {
    let mut engine = engine_with("narrative-faction-reset", |s| {
        s.story.stage = 3;
        s.story.faction = Faction::Sanctuary;
        s.resources.lifetime_accumulated = 1e9;
    });
    engine.tick(1.0).unwrap();
    engine.transcend().unwrap();

    assert_eq!(engine.state().story.faction, Faction::None);
    assert_eq!(engine.state().story.stage, 0);
}

fn assault_ready(run_id: &str) -> SimEngine {
    engine_with(run_id, |s| {
        s.story.stage = 4;
        s.story.seen_events.insert("creator_message".into());
        s.story.active_chains.insert(
            "assault".into(),
            ChainProgress { part_id: "assault_firewall".into(), unlock_at: 0 },
        );
    })
}

#[test]
fn assault_can_be_aborted_and_retried_from_checkpoint() {
    let mut engine = assault_ready("narrative-assault-retry");
    let events = engine.tick(1.0).unwrap();
    assert_eq!(presented(&events), Some("assault_firewall"));

    engine.abort_assault().unwrap();
    assert_eq!(engine.state().story.active_event, None);
    assert_eq!(engine.state().story.assault_checkpoint.as_deref(), Some("assault_firewall"));
    assert!(matches!(engine.abort_assault(), Err(ActionError::InvalidTransition { .. })));

    let events = engine.run_ticks(30).unwrap();
    assert_eq!(presented(&events), None);

    engine.begin_assault().unwrap();
    assert!(matches!(engine.begin_assault(), Err(ActionError::InvalidTransition { .. })));
    let events = engine.run_ticks(9).unwrap();
    assert_eq!(presented(&events), None);
    let events = engine.tick(1.0).unwrap();
    assert_eq!(presented(&events), Some("assault_firewall"));
}

#[test]
fn side_chains_can_be_abandoned_but_the_assault_cannot() {
    let mut engine = engine_with("narrative-abandon", |s| {
        s.story.active_chains.insert(
            "ghost".into(),
            ChainProgress { part_id: "ghost_origin".into(), unlock_at: 60_000 },
        );
    });

    let events = engine.abandon_chain("ghost").unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, SimEvent::ChainClosed { abandoned: true, .. })));
    assert!(engine.state().story.active_chains.is_empty());
    assert!(matches!(engine.abandon_chain("ghost"), Err(ActionError::UnknownId { .. })));
    assert!(matches!(engine.abandon_chain("assault"), Err(ActionError::InvalidTransition { .. })));
}

#[test]
fn final_stage_commits_to_an_ending() {
    let mut engine = assault_ready("narrative-assault-final");
    engine.tick(1.0).unwrap();
    engine.resolve("assault_firewall", "burn_through").unwrap();

    let events = engine.run_ticks(20).unwrap();
    assert_eq!(presented(&events), Some("assault_dead_hand"));
    engine.resolve("assault_dead_hand", "negotiate").unwrap();

    // The final stage is scheduled; there is no way back now.
    assert!(matches!(engine.abort_assault(), Err(ActionError::InvalidTransition { .. })));

    let events = engine.run_ticks(20).unwrap();
    assert_eq!(presented(&events), Some("assault_final"));

    let events = engine.resolve("assault_final", "broker_peace").unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, SimEvent::EndingReached { ending: Ending::ColdPeace })));
    assert_eq!(engine.state().story.ending, Some(Ending::ColdPeace));
    assert!(engine.state().meta.endings_seen.contains(&Ending::ColdPeace));

    assert!(matches!(engine.buy("cpu_core"), Err(ActionError::InvalidTransition { .. })));
    let events = engine.run_ticks(5).unwrap();
    assert_eq!(presented(&events), None);
}
