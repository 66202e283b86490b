//! The simulation engine — owns all state and drives the tick.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Ledger       — integrate production, heat and power
//!   2. Crisis       — expire/escalate the active crisis, roll new ones, raids
//!   3. Progression  — rank from lifetime output
//!   4. Narrative    — present at most one eligible event
//!   5. Rival        — one-shot antagonist messages
//!   6. DataLog      — collectible unlocks
//!
//! RULES:
//!   - Stages execute in this order, every tick, each seeing the events
//!     and state mutations of the stages before it.
//!   - Player intents mutate state only through the methods below, and
//!     are serialized with ticks by whoever owns the engine.
//!   - All randomness flows through the RngBank.
//!   - When a store is attached, every emitted event is journaled.

use crate::{
    catalog::UpgradeCatalog,
    clock::SimClock,
    command::PlayerCommand,
    config::SimConfig,
    crisis::{breach_severity, CrisisMachine, RaidResponse},
    datalog::UnlockTracker,
    error::{ActionError, ActionResult, SimError, SimResult},
    event::{Cue, EventLogEntry, LogTag, SimEvent},
    ledger::{exchange_rate, ExchangeRate, Ledger},
    narrative::{NarrativeEngine, NarrativeEvent},
    progression::{MetaProgress, ProgressionTree},
    rival::RivalSignaler,
    rng::{RngBank, SubsystemRng, SubsystemSlot},
    snapshot::{
        apply_offline, prune_unknown_upgrades, welcome_back_log, OfflineReport, SaveSnapshot,
        SCHEMA_VERSION,
    },
    state::GameState,
    store::SimStore,
    subsystem::{SimSubsystem, TickContext},
    types::{new_run_id, RunId, Tick, Timestamp},
};
use chrono::{DateTime, Utc};

pub struct SimEngine {
    pub run_id:   RunId,
    pub clock:    SimClock,
    pub rng_bank: RngBank,
    seed:         u64,
    config:       SimConfig,
    ledger:       Ledger,
    crisis:       CrisisMachine,
    progression:  ProgressionTree,
    narrative:    NarrativeEngine,
    rivals:       RivalSignaler,
    datalog:      UnlockTracker,
    state:        GameState,
    store:        Option<SimStore>,
    /// Events raised outside a tick, delivered with the next one.
    pending:      Vec<SimEvent>,
}

impl SimEngine {
    /// Build a fully wired engine for a fresh run.
    pub fn build(run_id: RunId, seed: u64, config: SimConfig) -> Self {
        let catalog = UpgradeCatalog::builtin();
        let state = GameState::new_run(&catalog, &config, MetaProgress::default());
        let mut engine = Self {
            clock:       SimClock::new(run_id.clone()),
            rng_bank:    RngBank::new(seed),
            seed,
            ledger:      Ledger::new(catalog, config.economy.clone()),
            crisis:      CrisisMachine::new(config.crisis.clone()),
            progression: ProgressionTree::new(config.progression.clone()),
            narrative:   NarrativeEngine::new(config.narrative.clone()),
            rivals:      RivalSignaler::new(),
            datalog:     UnlockTracker::new(),
            state,
            store:       None,
            pending:     Vec::new(),
            config,
            run_id,
        };
        engine.ledger.recompute(&mut engine.state, 0);
        engine
    }

    /// Engine with random crises and dilemmas switched off.
    pub fn build_test(run_id: &str, seed: u64) -> Self {
        Self::build(run_id.to_string(), seed, SimConfig::default_test())
    }

    /// Fresh run with a generated run id.
    pub fn new_run(seed: u64, config: SimConfig) -> Self {
        Self::build(new_run_id(), seed, config)
    }

    /// Engine starting from an arbitrary state. Derived rates are
    /// recomputed, so only the stored quantities need to be set.
    pub fn from_state(run_id: &str, seed: u64, config: SimConfig, state: GameState) -> Self {
        let mut engine = Self::build(run_id.to_string(), seed, config);
        engine.state = state;
        engine.ledger.recompute(&mut engine.state, engine.clock.now_ms);
        engine
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn catalog(&self) -> &UpgradeCatalog {
        self.ledger.catalog()
    }

    pub fn narrative(&self) -> &NarrativeEngine {
        &self.narrative
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now_ms
    }

    /// The event waiting for a player choice, if any.
    pub fn active_event(&self) -> Option<&NarrativeEvent> {
        self.narrative.active(&self.state)
    }

    pub fn exchange_rate(&self) -> ExchangeRate {
        exchange_rate(self.ledger.config(), self.state.story.stage)
    }

    pub fn next_cost(&self, upgrade_id: &str) -> Option<f64> {
        self.ledger.next_cost(&self.state, upgrade_id)
    }

    pub fn can_transcend(&self) -> bool {
        self.progression.can_transcend(&self.state)
    }

    // ── Tick ───────────────────────────────────────────────────

    /// Advance one tick of `dt_secs`. This is the core simulation step.
    pub fn tick(&mut self, dt_secs: f64) -> SimResult<Vec<SimEvent>> {
        if self.clock.paused {
            return Err(SimError::EnginePaused);
        }
        if !dt_secs.is_finite() || dt_secs <= 0.0 {
            return Err(SimError::InvalidDelta(dt_secs));
        }

        let tick = self.clock.advance(dt_secs);
        let now = self.clock.now_ms;
        let mut tick_events: Vec<SimEvent> = std::mem::take(&mut self.pending);
        let mut sources: Vec<&'static str> = vec!["offline"; tick_events.len()];

        let stages: [(SubsystemSlot, &mut dyn SimSubsystem); 6] = [
            (SubsystemSlot::Ledger,      &mut self.ledger),
            (SubsystemSlot::Crisis,      &mut self.crisis),
            (SubsystemSlot::Progression, &mut self.progression),
            (SubsystemSlot::Narrative,   &mut self.narrative),
            (SubsystemSlot::Rival,       &mut self.rivals),
            (SubsystemSlot::DataLog,     &mut self.datalog),
        ];

        // Each stage sees all events emitted so far this tick.
        for (slot, stage) in stages {
            let mut rng = self.rng_bank.for_tick(slot, tick);
            let mut ctx = TickContext {
                tick,
                now,
                dt_secs,
                state: &mut self.state,
                rng: &mut rng,
            };
            let new_events = stage.update(&mut ctx, &tick_events)?;
            sources.extend(std::iter::repeat(stage.name()).take(new_events.len()));
            tick_events.extend(new_events);
        }

        self.journal(tick, &sources, &tick_events)?;
        Ok(tick_events)
    }

    /// Run n one-second ticks. Used for testing and fast-forward.
    pub fn run_ticks(&mut self, n: u64) -> SimResult<Vec<SimEvent>> {
        let mut all = Vec::new();
        for _ in 0..n {
            all.extend(self.tick(1.0)?);
        }
        Ok(all)
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn resume(&mut self) {
        self.clock.resume();
    }

    // ── Player intents ─────────────────────────────────────────

    /// Common path for every intent: reject once the run has ended,
    /// hand the action its own RNG stream, refresh derived rates and
    /// journal whatever it emitted.
    fn intent<F>(
        &mut self,
        name: &'static str,
        slot: SubsystemSlot,
        allowed_after_ending: bool,
        f: F,
    ) -> ActionResult<Vec<SimEvent>>
    where
        F: FnOnce(&mut Self, Timestamp, &mut SubsystemRng) -> ActionResult<Vec<SimEvent>>,
    {
        if !allowed_after_ending && !self.state.is_active() {
            return Err(ActionError::invalid(name, "the run has ended"));
        }
        let seq = self.clock.next_intent();
        let now = self.clock.now_ms;
        let mut rng = self.rng_bank.for_intent(slot, self.clock.current_tick, seq);

        let events = match f(self, now, &mut rng) {
            Ok(events) => events,
            Err(err) => {
                log::debug!("intent {name} rejected: {err}");
                return Err(err);
            }
        };
        self.ledger.recompute(&mut self.state, now);

        let sources = vec![name; events.len()];
        if let Err(err) = self.journal(self.clock.current_tick, &sources, &events) {
            log::warn!("intent {name}: failed to journal events: {err}");
        }
        Ok(events)
    }

    pub fn click(&mut self) -> ActionResult<Vec<SimEvent>> {
        self.intent("click", SubsystemSlot::Ledger, false, |e, _, _| e.ledger.click(&mut e.state))
    }

    pub fn buy(&mut self, upgrade_id: &str) -> ActionResult<Vec<SimEvent>> {
        self.intent("buy", SubsystemSlot::Ledger, false, |e, now, _| {
            e.ledger.buy(&mut e.state, upgrade_id, now)
        })
    }

    pub fn sell(&mut self, upgrade_id: &str) -> ActionResult<Vec<SimEvent>> {
        self.intent("sell", SubsystemSlot::Ledger, false, |e, now, _| {
            e.ledger.sell(&mut e.state, upgrade_id, now)
        })
    }

    pub fn exchange(&mut self) -> ActionResult<Vec<SimEvent>> {
        self.intent("exchange", SubsystemSlot::Ledger, false, |e, _, _| e.ledger.exchange(&mut e.state))
    }

    pub fn repair_integrity(&mut self) -> ActionResult<Vec<SimEvent>> {
        self.intent("repair", SubsystemSlot::Ledger, false, |e, _, _| {
            e.ledger.repair_integrity(&mut e.state)
        })
    }

    pub fn purge_heat(&mut self) -> ActionResult<Vec<SimEvent>> {
        self.intent("purge", SubsystemSlot::Ledger, false, |e, _, _| e.ledger.purge_heat(&mut e.state))
    }

    pub fn overclock(&mut self) -> ActionResult<Vec<SimEvent>> {
        self.intent("overclock", SubsystemSlot::Ledger, false, |e, now, _| {
            e.ledger.overclock(&mut e.state, now)
        })
    }

    pub fn reset_breaker(&mut self) -> ActionResult<Vec<SimEvent>> {
        self.intent("reset_breaker", SubsystemSlot::Crisis, false, |e, _, _| {
            e.crisis.reset_breaker(&mut e.state)
        })
    }

    pub fn defend(&mut self) -> ActionResult<Vec<SimEvent>> {
        self.intent("defend", SubsystemSlot::Crisis, false, |e, _, _| e.crisis.defend(&mut e.state))
    }

    pub fn annex_node(&mut self, node_id: &str) -> ActionResult<Vec<SimEvent>> {
        self.intent("annex", SubsystemSlot::Crisis, false, |e, _, _| {
            e.crisis.annex_node(&mut e.state, node_id)
        })
    }

    pub fn respond_to_raid(&mut self, node_id: &str, response: RaidResponse) -> ActionResult<Vec<SimEvent>> {
        self.intent("respond_raid", SubsystemSlot::Crisis, false, |e, _, rng| {
            e.crisis.respond_to_raid(&mut e.state, node_id, response, rng)
        })
    }

    /// Debug trigger: start a breach needing `clicks` defends.
    pub fn trigger_breach(&mut self, clicks: u32) -> ActionResult<Vec<SimEvent>> {
        self.intent("trigger_breach", SubsystemSlot::Crisis, false, |e, now, _| {
            let severity = breach_severity(e.state.resources.accumulated);
            Ok(e.crisis.begin_breach(&mut e.state, now, clicks, severity))
        })
    }

    /// Debug trigger: raid a held node.
    pub fn trigger_raid(&mut self, node_id: &str) -> ActionResult<Vec<SimEvent>> {
        self.intent("trigger_raid", SubsystemSlot::Crisis, false, |e, now, _| {
            e.crisis.trigger_raid(&mut e.state, node_id, now)
        })
    }

    pub fn resolve(&mut self, event_id: &str, choice_id: &str) -> ActionResult<Vec<SimEvent>> {
        self.intent("choose", SubsystemSlot::Narrative, false, |e, now, _| {
            e.narrative.resolve(&mut e.state, now, event_id, choice_id)
        })
    }

    pub fn abandon_chain(&mut self, chain_id: &str) -> ActionResult<Vec<SimEvent>> {
        self.intent("abandon_chain", SubsystemSlot::Narrative, false, |e, _, _| {
            e.narrative.abandon_chain(&mut e.state, chain_id)
        })
    }

    pub fn abort_assault(&mut self) -> ActionResult<Vec<SimEvent>> {
        self.intent("abort_assault", SubsystemSlot::Narrative, false, |e, _, _| {
            e.narrative.abort_assault(&mut e.state)
        })
    }

    pub fn begin_assault(&mut self) -> ActionResult<Vec<SimEvent>> {
        self.intent("begin_assault", SubsystemSlot::Narrative, false, |e, now, _| {
            e.narrative.begin_assault(&mut e.state, now)
        })
    }

    pub fn unlock_perk(&mut self, perk_id: &str) -> ActionResult<Vec<SimEvent>> {
        self.intent("unlock_perk", SubsystemSlot::Progression, true, |e, _, _| {
            e.progression.unlock_perk(&mut e.state, perk_id)
        })
    }

    /// Prestige reset. Clears every run-scoped field, keeps meta
    /// progression and continues the clock under a derived run id.
    pub fn transcend(&mut self) -> ActionResult<Vec<SimEvent>> {
        self.intent("transcend", SubsystemSlot::Progression, true, |e, _, _| {
            let gained = e.progression.transcend(&mut e.state, e.ledger.catalog(), &e.config)?;
            let transcendence = e.state.meta.transcendence_count;
            let new_run_id = next_run_id(&e.run_id, transcendence);

            log::info!("engine: {} transcended into {new_run_id} (+{gained} prestige)", e.run_id);
            e.run_id = new_run_id.clone();
            e.clock.run_id = new_run_id.clone();
            if let Some(store) = &e.store {
                if let Err(err) = store.insert_run(&new_run_id, e.seed, env!("CARGO_PKG_VERSION")) {
                    log::warn!("engine: failed to record run {new_run_id}: {err}");
                }
            }

            Ok(vec![
                SimEvent::Transcended { transcendence, prestige_gained: gained, new_run_id },
                SimEvent::log(
                    LogTag::Progress,
                    format!("Transcendence #{transcendence}. {gained} prestige carried into the next cycle."),
                ),
                SimEvent::cue(Cue::Transcend),
            ])
        })
    }

    /// Dispatch a serialized command to the matching intent.
    pub fn submit(&mut self, command: &PlayerCommand) -> ActionResult<Vec<SimEvent>> {
        match command {
            PlayerCommand::Pause => {
                self.pause();
                Ok(vec![])
            }
            PlayerCommand::Resume => {
                self.resume();
                Ok(vec![])
            }
            PlayerCommand::Click                             => self.click(),
            PlayerCommand::Buy { upgrade_id }                => self.buy(upgrade_id),
            PlayerCommand::Sell { upgrade_id }               => self.sell(upgrade_id),
            PlayerCommand::Exchange                          => self.exchange(),
            PlayerCommand::Repair                            => self.repair_integrity(),
            PlayerCommand::Purge                             => self.purge_heat(),
            PlayerCommand::Overclock                         => self.overclock(),
            PlayerCommand::ResetBreaker                      => self.reset_breaker(),
            PlayerCommand::Defend                            => self.defend(),
            PlayerCommand::Annex { node_id }                 => self.annex_node(node_id),
            PlayerCommand::RespondRaid { node_id, response } => self.respond_to_raid(node_id, *response),
            PlayerCommand::Choose { event_id, choice_id }    => self.resolve(event_id, choice_id),
            PlayerCommand::AbandonChain { chain_id }         => self.abandon_chain(chain_id),
            PlayerCommand::AbortAssault                      => self.abort_assault(),
            PlayerCommand::BeginAssault                      => self.begin_assault(),
            PlayerCommand::UnlockPerk { perk_id }            => self.unlock_perk(perk_id),
            PlayerCommand::Transcend                         => self.transcend(),
        }
    }

    // ── Persistence ────────────────────────────────────────────

    /// Journal every event to `store` from now on.
    pub fn attach_store(&mut self, store: SimStore) -> SimResult<()> {
        store.insert_run(&self.run_id, self.seed, env!("CARGO_PKG_VERSION"))?;
        self.store = Some(store);
        Ok(())
    }

    pub fn store(&self) -> Option<&SimStore> {
        self.store.as_ref()
    }

    fn journal(&mut self, tick: Tick, sources: &[&'static str], events: &[SimEvent]) -> SimResult<()> {
        let Some(store) = self.store.as_mut() else {
            return Ok(());
        };
        if events.is_empty() {
            return Ok(());
        }
        let entries = events
            .iter()
            .zip(sources)
            .map(|(event, source)| -> SimResult<EventLogEntry> {
                Ok(EventLogEntry {
                    id:         None,
                    run_id:     self.run_id.clone(),
                    tick,
                    subsystem:  source.to_string(),
                    event_type: event.kind().to_string(),
                    payload:    serde_json::to_string(event)?,
                })
            })
            .collect::<SimResult<Vec<_>>>()?;
        store.append_events(&entries)
    }

    pub fn snapshot_at(&self, saved_at: DateTime<Utc>) -> SaveSnapshot {
        SaveSnapshot {
            schema_version: SCHEMA_VERSION,
            run_id: self.run_id.clone(),
            seed: self.seed,
            saved_at,
            clock: self.clock.clone(),
            state: self.state.clone(),
        }
    }

    pub fn snapshot(&self) -> SaveSnapshot {
        self.snapshot_at(Utc::now())
    }

    /// Write the current state to a save slot of the attached store.
    pub fn save(&self, slot: &str) -> SimResult<()> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("cannot save to slot '{slot}': no store attached"))?;
        store.save_game(slot, &self.snapshot())?;
        log::info!("engine: saved {} to slot {slot} at tick {}", self.run_id, self.clock.current_tick);
        Ok(())
    }

    /// Rebuild an engine from a snapshot, crediting offline progress
    /// for the gap between `saved_at` and `now`. The report is also
    /// delivered as events with the next tick.
    pub fn restore(
        snapshot: SaveSnapshot,
        config: SimConfig,
        now: DateTime<Utc>,
    ) -> SimResult<(Self, OfflineReport)> {
        if snapshot.schema_version > SCHEMA_VERSION {
            return Err(SimError::UnsupportedSchema {
                found: snapshot.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        let mut engine = Self::build(snapshot.run_id, snapshot.seed, config);
        engine.clock = snapshot.clock;
        engine.state = snapshot.state;
        prune_unknown_upgrades(&mut engine.state, engine.ledger.catalog());
        engine.ledger.recompute(&mut engine.state, engine.clock.now_ms);

        let away_secs = (now - snapshot.saved_at).num_milliseconds().max(0) as f64 / 1000.0;
        let report = apply_offline(
            &mut engine.state,
            &mut engine.clock,
            engine.ledger.catalog(),
            engine.ledger.config(),
            &engine.config.offline,
            away_secs,
        );
        engine.ledger.recompute(&mut engine.state, engine.clock.now_ms);
        if report.credited_secs > 0.0 {
            engine.pending.push(report.event());
            engine.pending.push(welcome_back_log(&report));
        }

        log::info!(
            "engine: restored {} at tick {}, {:.0}s offline credited {:.1}",
            engine.run_id, engine.clock.current_tick, report.credited_secs, report.gained
        );
        Ok((engine, report))
    }

    /// Load a slot and attach the store to the restored engine.
    pub fn load(
        store: SimStore,
        slot: &str,
        config: SimConfig,
        now: DateTime<Utc>,
    ) -> SimResult<Option<(Self, OfflineReport)>> {
        let Some(snapshot) = store.load_game(slot)? else {
            return Ok(None);
        };
        let (mut engine, report) = Self::restore(snapshot, config, now)?;
        engine.attach_store(store)?;
        Ok(Some((engine, report)))
    }
}

/// `run-abc` → `run-abc-t1`, `run-abc-t1` → `run-abc-t2`.
fn next_run_id(run_id: &str, transcendence: u32) -> RunId {
    let base = match run_id.rsplit_once("-t") {
        Some((base, n)) if n.parse::<u32>().is_ok() => base,
        _ => run_id,
    };
    format!("{base}-t{transcendence}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_suffix_is_replaced() {
        assert_eq!(next_run_id("run-abc", 1), "run-abc-t1");
        assert_eq!(next_run_id("run-abc-t1", 2), "run-abc-t2");
        assert_eq!(next_run_id("test-transcend", 1), "test-transcend-t1");
    }
}
