//! Save slots, offline progress and the event journal.

use chrono::{Duration, TimeZone, Utc};
use sentience_core::{
    config::SimConfig,
    crisis::CrisisState,
    engine::SimEngine,
    error::SimError,
    event::{LogTag, SimEvent},
    ledger::ProductionBoost,
    snapshot::{SaveSnapshot, SCHEMA_VERSION},
    state::GameState,
    store::SimStore,
};

fn engine_with(run_id: &str, f: impl FnOnce(&mut GameState)) -> SimEngine {
    let base = SimEngine::build_test(run_id, 42);
    let mut state = base.state().clone();
    f(&mut state);
    SimEngine::from_state(run_id, 42, SimConfig::default_test(), state)
}

fn saved_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn shared_store(name: &str) -> SimStore {
    let store = SimStore::open(&format!("file:{name}?mode=memory&cache=shared")).expect("open store");
    store.migrate().expect("migration");
    store
}

#[test]
fn snapshot_round_trip_without_gap() {
    let mut engine = engine_with("persist-roundtrip", |s| s.resources.currency = 1_000.0);
    engine.run_ticks(30).expect("run");
    engine.buy("cpu_core").expect("buy");
    engine.trigger_breach(6).expect("breach");

    let json = engine.snapshot_at(saved_at()).to_json().expect("serialize");
    let snapshot = SaveSnapshot::from_json(&json).expect("deserialize");
    let (restored, report) =
        SimEngine::restore(snapshot, SimConfig::default_test(), saved_at()).expect("restore");

    assert_eq!(restored.state(), engine.state());
    assert_eq!(restored.clock, engine.clock);
    assert_eq!(restored.run_id, "persist-roundtrip");
    assert_eq!(restored.seed(), 42);
    assert_eq!(report.credited_secs, 0.0);
    assert_eq!(report.gained, 0.0);
}

#[test]
fn offline_time_is_credited_at_half_rate() {
    let engine = SimEngine::build_test("persist-offline", 1);
    let before = engine.state().resources.accumulated;

    let (restored, report) = SimEngine::restore(
        engine.snapshot_at(saved_at()),
        SimConfig::default_test(),
        saved_at() + Duration::seconds(100),
    )
    .expect("restore");

    assert_eq!(report.away_secs, 100.0);
    assert_eq!(report.gained, 50.0);
    assert_eq!(restored.state().resources.accumulated, before + 50.0);
    assert_eq!(restored.now(), engine.now() + 100_000);
    assert_eq!(restored.clock.current_tick, engine.clock.current_tick);
}

#[test]
fn offline_credit_is_capped() {
    let engine = SimEngine::build_test("persist-cap", 1);
    let (_, report) = SimEngine::restore(
        engine.snapshot_at(saved_at()),
        SimConfig::default_test(),
        saved_at() + Duration::hours(24),
    )
    .expect("restore");

    assert_eq!(report.credited_secs, 8.0 * 3600.0);
    assert_eq!(report.gained, 14_400.0);
}

#[test]
fn clock_skew_credits_nothing() {
    let engine = SimEngine::build_test("persist-skew", 1);
    let (restored, report) = SimEngine::restore(
        engine.snapshot_at(saved_at()),
        SimConfig::default_test(),
        saved_at() - Duration::minutes(5),
    )
    .expect("restore");

    assert_eq!(report.gained, 0.0);
    assert_eq!(restored.now(), engine.now());
}

#[test]
fn lockout_that_ends_while_away_resumes_production() {
    let engine = engine_with("persist-lockout", |s| {
        s.crisis = CrisisState::ThermalLockout { until: 5_000 };
    });
    let (mut restored, report) = SimEngine::restore(
        engine.snapshot_at(saved_at()),
        SimConfig::default_test(),
        saved_at() + Duration::seconds(3600),
    )
    .expect("restore");

    // Only the 5s of lockout go uncredited.
    assert_eq!(report.gained, 1_797.5);
    restored.tick(1.0).expect("tick");
    assert!(restored.state().crisis.is_normal());
}

#[test]
fn nothing_is_earned_offline_with_the_breaker_tripped() {
    let engine = engine_with("persist-breaker", |s| s.crisis = CrisisState::BreakerTripped);
    let (restored, report) = SimEngine::restore(
        engine.snapshot_at(saved_at()),
        SimConfig::default_test(),
        saved_at() + Duration::seconds(600),
    )
    .expect("restore");

    assert_eq!(report.gained, 0.0);
    assert_eq!(restored.state().resources.accumulated, engine.state().resources.accumulated);
}

#[test]
fn overclock_only_counts_until_it_expires() {
    let mut engine = SimEngine::build_test("persist-overclock", 1);
    engine.overclock().expect("overclock");

    let (mut restored, report) = SimEngine::restore(
        engine.snapshot_at(saved_at()),
        SimConfig::default_test(),
        saved_at() + Duration::seconds(3600),
    )
    .expect("restore");

    // 30s at double rate, the rest at base, all at half efficiency.
    assert_eq!(report.gained, 1_815.0);
    assert_eq!(restored.state().resources.multiplier, 1.0);
    let events = restored.tick(1.0).expect("tick");
    assert!(events.iter().any(|e| matches!(e, SimEvent::OverclockEnded)));
}

#[test]
fn boost_only_counts_until_it_expires() {
    let engine = engine_with("persist-boost", |s| {
        s.modifiers.boost = Some(ProductionBoost { multiplier: 3.0, until: 60_000 });
    });
    let (_, report) = SimEngine::restore(
        engine.snapshot_at(saved_at()),
        SimConfig::default_test(),
        saved_at() + Duration::seconds(100),
    )
    .expect("restore");

    assert_eq!(report.gained, 0.5 * (3.0 * 60.0 + 40.0));
}

#[test]
fn breach_siphons_offline_production() {
    let mut engine = SimEngine::build_test("persist-siphon", 1);
    engine.trigger_breach(10).expect("breach");

    let (_, report) = SimEngine::restore(
        engine.snapshot_at(saved_at()),
        SimConfig::default_test(),
        saved_at() + Duration::seconds(100),
    )
    .expect("restore");

    assert_eq!(report.gained, 37.5);
}

#[test]
fn offline_report_arrives_with_the_next_tick() {
    let engine = SimEngine::build_test("persist-welcome", 1);
    let (mut restored, _) = SimEngine::restore(
        engine.snapshot_at(saved_at()),
        SimConfig::default_test(),
        saved_at() + Duration::seconds(100),
    )
    .expect("restore");
    restored.attach_store(shared_store("persist_welcome")).expect("attach");

    let events = restored.tick(1.0).expect("tick");
    assert!(events.iter().any(|e| matches!(
        e,
        SimEvent::OfflineProgress { elapsed_secs, gained } if *elapsed_secs == 100.0 && *gained == 50.0
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, SimEvent::Log { tag: LogTag::System, text } if text.contains("offline"))));

    let tick = restored.clock.current_tick;
    let journaled = restored
        .store()
        .expect("store attached")
        .events_for_tick("persist-welcome", tick)
        .expect("events");
    assert!(journaled
        .iter()
        .any(|e| e.event_type == "offline_progress" && e.subsystem == "offline"));

    // Delivered once.
    let events = restored.tick(1.0).expect("tick");
    assert!(!events.iter().any(|e| matches!(e, SimEvent::OfflineProgress { .. })));
}

#[test]
fn no_offline_report_without_a_gap() {
    let engine = SimEngine::build_test("persist-no-gap", 1);
    let (mut restored, _) =
        SimEngine::restore(engine.snapshot_at(saved_at()), SimConfig::default_test(), saved_at())
            .expect("restore");
    let events = restored.tick(1.0).expect("tick");
    assert!(!events.iter().any(|e| matches!(e, SimEvent::OfflineProgress { .. })));
}

#[test]
fn breach_deadline_moves_with_the_clock() {
    let mut engine = SimEngine::build_test("persist-breach", 1);
    engine.trigger_breach(10).expect("breach");

    let (mut restored, _) = SimEngine::restore(
        engine.snapshot_at(saved_at()),
        SimConfig::default_test(),
        saved_at() + Duration::seconds(60),
    )
    .expect("restore");

    assert!(matches!(
        restored.state().crisis,
        CrisisState::SecurityBreach { deadline: 80_000, .. }
    ));
    restored.run_ticks(19).expect("run");
    assert!(matches!(restored.state().crisis, CrisisState::SecurityBreach { .. }));
    restored.tick(1.0).expect("tick");
    assert!(restored.state().crisis.is_normal());
}

#[test]
fn newer_schema_is_rejected() {
    let engine = SimEngine::build_test("persist-schema", 1);
    let mut snapshot = engine.snapshot_at(saved_at());
    snapshot.schema_version = SCHEMA_VERSION + 1;

    let json = snapshot.to_json().expect("serialize");
    assert!(matches!(
        SaveSnapshot::from_json(&json),
        Err(SimError::UnsupportedSchema { .. })
    ));
    assert!(matches!(
        SimEngine::restore(snapshot, SimConfig::default_test(), saved_at()),
        Err(SimError::UnsupportedSchema { .. })
    ));
}

#[test]
fn unknown_upgrades_are_dropped_on_restore() {
    let engine = engine_with("persist-prune", |s| {
        s.owned.insert("warp_core".into(), 2);
    });
    let (restored, _) =
        SimEngine::restore(engine.snapshot_at(saved_at()), SimConfig::default_test(), saved_at())
            .expect("restore");

    assert_eq!(restored.state().owned_count("warp_core"), 0);
    assert_eq!(restored.state().owned_count("cpu_core"), 1);
}

#[test]
fn save_slot_round_trip_through_sqlite() {
    let mut engine = engine_with("persist-slot", |s| s.resources.currency = 1_000.0);
    engine.attach_store(shared_store("persist_slot")).expect("attach");
    engine.run_ticks(20).expect("run");
    engine.buy("cpu_core").expect("buy");
    engine.save("main").expect("save");

    let reader = SimStore::open("file:persist_slot?mode=memory&cache=shared").expect("open reader");
    let (loaded, _) = SimEngine::load(reader, "main", SimConfig::default_test(), Utc::now())
        .expect("load")
        .expect("slot exists");

    assert_eq!(loaded.run_id, "persist-slot");
    assert_eq!(loaded.clock.current_tick, 20);
    assert_eq!(loaded.state().owned_count("cpu_core"), 2);
    assert_eq!(loaded.state().story, engine.state().story);

    let store = loaded.store().expect("store attached");
    assert!(store.load_game("missing").expect("query").is_none());
    assert!(store.delete_game("main").expect("delete"));
    assert!(store.load_game("main").expect("query").is_none());
}

#[test]
fn saving_needs_a_store() {
    let engine = SimEngine::build_test("persist-no-store", 1);
    assert!(engine.save("main").is_err());
}

#[test]
fn events_are_journaled() {
    let mut engine = engine_with("persist-journal", |s| s.resources.currency = 1_000.0);
    engine.attach_store(shared_store("persist_journal")).expect("attach");
    engine.run_ticks(5).expect("run");
    engine.buy("fan_bank").expect("buy");

    let store = engine.store().expect("store attached");
    assert!(store.event_count("persist-journal", None).expect("count") > 0);
    assert_eq!(
        store.event_count("persist-journal", Some("upgrade_purchased")).expect("count"),
        1
    );
    assert_eq!(store.run_seed("persist-journal").expect("seed"), Some(42));

    let tick_one = store.events_for_tick("persist-journal", 1).expect("events");
    assert!(tick_one.iter().all(|e| e.tick == 1 && e.run_id == "persist-journal"));
}

#[test]
fn journal_rows_carry_wall_clock_write_times() {
    let before = Utc::now() - Duration::seconds(1);
    let mut engine = engine_with("persist-journal-time", |s| s.resources.currency = 1_000.0);
    engine.attach_store(shared_store("persist_journal_time")).expect("attach");
    engine.run_ticks(3).expect("run");
    engine.buy("fan_bank").expect("buy");
    let after = Utc::now() + Duration::seconds(1);

    let store = engine.store().expect("store attached");
    let times = store.event_times("persist-journal-time", 3).expect("times");
    assert!(!times.is_empty());
    assert!(times.iter().all(|t| *t >= before && *t <= after));
}
