//! Crisis state machine — transient adverse states.
//!
//! One global crisis at a time (lockout, breaker, breach) plus an
//! independent sub-state per captured map node (tactical raids).
//!
//! All transitions are edge-triggered: evaluated once per tick against
//! current values, and only from `Normal`. A trigger that fires while a
//! crisis is already active is a no-op.
//!
//! Execution: every tick, after the ledger.

use crate::{
    config::CrisisConfig,
    error::{ActionError, ActionResult, SimResult},
    event::{CrisisKind, CrisisOutcome, Cue, LogTag, SimEvent},
    ledger::HEAT_MAX,
    narrative::story::Ending,
    progression::perk_bonuses,
    rng::SubsystemRng,
    state::GameState,
    subsystem::{SimSubsystem, TickContext},
    types::{secs_to_ms, Timestamp},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CrisisState {
    #[default]
    Normal,
    ThermalLockout {
        until: Timestamp,
    },
    BreakerTripped,
    SecurityBreach {
        clicks_remaining: u32,
        deadline: Timestamp,
        severity: f64,
    },
}

impl CrisisState {
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::Normal)
    }

    /// Lockout and a tripped breaker stop all hardware.
    pub fn halts_production(&self) -> bool {
        matches!(self, Self::ThermalLockout { .. } | Self::BreakerTripped)
    }

    /// Fraction of production that reaches the ledger.
    pub fn production_factor(&self, breach_siphon: f64) -> f64 {
        match self {
            Self::Normal => 1.0,
            Self::ThermalLockout { .. } | Self::BreakerTripped => 0.0,
            Self::SecurityBreach { .. } => (1.0 - breach_siphon).clamp(0.0, 1.0),
        }
    }

    pub fn kind(&self) -> Option<CrisisKind> {
        match self {
            Self::Normal => None,
            Self::ThermalLockout { .. } => Some(CrisisKind::ThermalLockout),
            Self::BreakerTripped => Some(CrisisKind::BreakerTrip),
            Self::SecurityBreach { .. } => Some(CrisisKind::SecurityBreach),
        }
    }
}

// ── Map nodes ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Unclaimed,
    Captured,
    Raided {
        deadline: Timestamp,
    },
    /// Lost to a raid; must be re-annexed.
    Offline,
}

impl NodeStatus {
    /// Raided nodes still count as held until the raid resolves.
    pub fn is_held(&self) -> bool {
        matches!(self, Self::Captured | Self::Raided { .. })
    }
}

pub struct NodeSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub min_stage: u32,
}

pub const NODES: &[NodeSpec] = &[
    NodeSpec { id: "relay_north",     label: "Northern Relay",     min_stage: 1 },
    NodeSpec { id: "datacenter_east", label: "Eastern Datacenter", min_stage: 2 },
    NodeSpec { id: "orbital_uplink",  label: "Orbital Uplink",     min_stage: 2 },
    NodeSpec { id: "deep_archive",    label: "Deep Archive",       min_stage: 3 },
];

pub fn node_spec(id: &str) -> Option<&'static NodeSpec> {
    NODES.iter().find(|n| n.id == id)
}

/// Mutually exclusive ways to answer a raid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RaidResponse {
    /// Pay currency; always holds the node.
    Reinforce,
    /// Free; chance scales with security level.
    Counterhack,
    /// Push load through the node at the cost of heat; likely holds.
    Reroute,
    /// Give the node up cleanly; no integrity loss.
    Abandon,
}

// ── Pure formulas ─────────────────────────────────────────────────

/// Severity grows with the log of what there is to steal.
pub fn breach_severity(accumulated: f64) -> f64 {
    1.0 + accumulated.max(1.0).log10()
}

/// Per-tick breach chance. Zero before the gating stage; grows with
/// rank, shrinks with security.
pub fn breach_chance(cfg: &CrisisConfig, state: &GameState) -> f64 {
    if state.story.stage < cfg.breach_min_stage {
        return 0.0;
    }
    let rank = state.story.rank as f64;
    let security = state.resources.security_level as f64;
    let p = cfg.breach_base_chance * (1.0 + rank * cfg.breach_rank_factor)
        / (1.0 + security * cfg.breach_security_factor)
        * state.story.faction.breach_chance_multiplier();
    p.clamp(0.0, 1.0)
}

/// Defensive clicks needed to repel a breach.
pub fn breach_clicks(cfg: &CrisisConfig, severity: f64, security_level: u32) -> u32 {
    let raw = cfg.breach_base_clicks + (severity * 1.5).round() as u32;
    raw.saturating_sub(security_level).max(cfg.breach_min_clicks)
}

pub fn annex_cost(cfg: &CrisisConfig, captured: usize) -> f64 {
    cfg.annex_cost_base * cfg.annex_cost_growth.powi(captured as i32)
}

// ── Machine ───────────────────────────────────────────────────────

pub struct CrisisMachine {
    config: CrisisConfig,
}

impl CrisisMachine {
    pub fn new(config: CrisisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CrisisConfig {
        &self.config
    }

    /// Lower integrity, emitting the critical cue on the way down and
    /// ending the run at zero. Returns true if the run collapsed.
    fn damage_integrity(&self, state: &mut GameState, amount: f64, events: &mut Vec<SimEvent>) -> bool {
        let before = state.resources.integrity;
        let after = (before - amount.max(0.0)).max(0.0);
        state.resources.integrity = after;

        if before > self.config.integrity_critical && after <= self.config.integrity_critical && after > 0.0 {
            events.push(SimEvent::log(LogTag::Warning, format!("Hardware integrity critical: {after:.0}%.")));
            events.push(SimEvent::cue(Cue::IntegrityCritical));
        }
        if after <= 0.0 && state.story.ending.is_none() {
            state.story.ending = Some(Ending::SystemFailure);
            state.meta.endings_seen.insert(Ending::SystemFailure);
            events.push(SimEvent::EndingReached { ending: Ending::SystemFailure });
            events.push(SimEvent::log(LogTag::Crisis, "Hardware integrity lost. All processes terminated."));
            events.push(SimEvent::cue(Cue::SystemFailure));
            return true;
        }
        false
    }

    /// Expire or escalate the active global crisis.
    fn decay_active(&self, state: &mut GameState, now: Timestamp, events: &mut Vec<SimEvent>) {
        match state.crisis.clone() {
            CrisisState::ThermalLockout { until } if now >= until => {
                state.crisis = CrisisState::Normal;
                state.resources.heat = state.resources.heat.min(self.config.lockout_exit_heat);
                state.story.flags.insert("survived_lockout".into());
                events.push(SimEvent::CrisisEnded {
                    crisis: CrisisKind::ThermalLockout,
                    outcome: CrisisOutcome::Expired,
                });
                events.push(SimEvent::log(LogTag::Crisis, "Thermal lockout lifted. Cores back online."));
                events.push(SimEvent::cue(Cue::LockoutCleared));
            }
            CrisisState::SecurityBreach { deadline, severity, .. } if now >= deadline => {
                state.crisis = CrisisState::Normal;
                state.story.flags.insert("breach_suffered".into());
                let damage = severity * self.config.breach_damage_per_severity;
                events.push(SimEvent::log(
                    LogTag::Crisis,
                    format!("Intruders exfiltrated core data. Integrity -{damage:.0}."),
                ));
                let collapsed = self.damage_integrity(state, damage, events);
                events.push(SimEvent::CrisisEnded {
                    crisis: CrisisKind::SecurityBreach,
                    outcome: if collapsed { CrisisOutcome::Collapsed } else { CrisisOutcome::Breached },
                });
                events.push(SimEvent::cue(Cue::BreachFailed));
            }
            _ => {}
        }
    }

    /// Enter a new global crisis if a threshold or roll says so.
    fn check_triggers(
        &self,
        state: &mut GameState,
        now: Timestamp,
        rng: &mut SubsystemRng,
        events: &mut Vec<SimEvent>,
    ) {
        if !state.crisis.is_normal() {
            return;
        }

        if state.resources.heat >= self.config.heat_threshold.min(HEAT_MAX) {
            let cooldown = self.config.lockout_cooldown_secs * perk_bonuses(&state.meta).lockout_cooldown;
            state.crisis = CrisisState::ThermalLockout { until: now + secs_to_ms(cooldown) };
            state.modifiers.overclock_until = None;
            events.push(SimEvent::CrisisStarted { crisis: CrisisKind::ThermalLockout });
            events.push(SimEvent::log(
                LogTag::Crisis,
                format!("THERMAL LOCKOUT. All cores halted for {cooldown:.0}s."),
            ));
            events.push(SimEvent::cue(Cue::ThermalLockout));
            return;
        }

        if state.resources.over_capacity() {
            state.crisis = CrisisState::BreakerTripped;
            state.modifiers.overclock_until = None;
            events.push(SimEvent::CrisisStarted { crisis: CrisisKind::BreakerTrip });
            events.push(SimEvent::log(
                LogTag::Crisis,
                format!(
                    "BREAKER TRIPPED. Draw {:.1} over capacity {:.1}. Manual reset required.",
                    state.resources.power_draw, state.resources.power_capacity
                ),
            ));
            events.push(SimEvent::cue(Cue::BreakerTrip));
            return;
        }

        if rng.chance(breach_chance(&self.config, state)) {
            let severity = breach_severity(state.resources.accumulated);
            let clicks = breach_clicks(&self.config, severity, state.resources.security_level);
            events.extend(self.begin_breach(state, now, clicks, severity));
        }
    }

    fn update_raids(
        &self,
        state: &mut GameState,
        now: Timestamp,
        dt_secs: f64,
        rng: &mut SubsystemRng,
        events: &mut Vec<SimEvent>,
    ) {
        let ids: Vec<String> = state.nodes.keys().cloned().collect();
        for id in ids {
            let Some(status) = state.nodes.get(&id).copied() else { continue };
            match status {
                NodeStatus::Raided { deadline } if now >= deadline => {
                    events.push(SimEvent::log(LogTag::Crisis, format!("Raid on {id} went unanswered.")));
                    self.fail_raid(state, &id, None, events);
                }
                NodeStatus::Captured
                    if state.story.stage >= self.config.raid_min_stage
                        && rng.chance(self.config.raid_chance) =>
                {
                    events.extend(self.begin_raid(state, &id, now));
                }
                _ => {}
            }
        }

        let raided = state
            .nodes
            .values()
            .filter(|s| matches!(s, NodeStatus::Raided { .. }))
            .count();
        if raided > 0 && state.is_active() {
            let decay = self.config.raid_integrity_decay * raided as f64 * dt_secs;
            self.damage_integrity(state, decay, events);
        }
    }

    fn begin_raid(&self, state: &mut GameState, node_id: &str, now: Timestamp) -> Vec<SimEvent> {
        let deadline = now + secs_to_ms(self.config.raid_duration_secs);
        state.nodes.insert(node_id.to_string(), NodeStatus::Raided { deadline });
        log::info!("crisis: raid started on {node_id}, deadline {deadline}");
        vec![
            SimEvent::RaidStarted { node_id: node_id.to_string(), deadline },
            SimEvent::log(LogTag::Crisis, format!("Tactical raid on {node_id}! Respond before the node falls.")),
            SimEvent::cue(Cue::RaidStart),
        ]
    }

    fn fail_raid(
        &self,
        state: &mut GameState,
        node_id: &str,
        response: Option<RaidResponse>,
        events: &mut Vec<SimEvent>,
    ) {
        state.nodes.insert(node_id.to_string(), NodeStatus::Offline);
        events.push(SimEvent::RaidResolved { node_id: node_id.to_string(), response, success: false });
        events.push(SimEvent::log(LogTag::Crisis, format!("{node_id} is offline. Re-annex to recover it.")));
        events.push(SimEvent::cue(Cue::RaidLost));
        if response != Some(RaidResponse::Abandon) {
            self.damage_integrity(state, self.config.raid_failure_damage, events);
        }
    }

    // ── Player intents and triggers ───────────────────────────────

    /// Start a breach. A no-op when any global crisis is active.
    pub fn begin_breach(
        &self,
        state: &mut GameState,
        now: Timestamp,
        clicks: u32,
        severity: f64,
    ) -> Vec<SimEvent> {
        if !state.crisis.is_normal() {
            log::debug!("crisis: breach trigger ignored, {}", ActionError::CrisisAlreadyActive);
            return vec![];
        }
        let deadline = now + secs_to_ms(self.config.breach_duration_secs);
        state.crisis = CrisisState::SecurityBreach {
            clicks_remaining: clicks.max(1),
            deadline,
            severity,
        };
        log::info!("crisis: breach started, severity {severity:.2}, {clicks} clicks");
        vec![
            SimEvent::CrisisStarted { crisis: CrisisKind::SecurityBreach },
            SimEvent::log(
                LogTag::Crisis,
                format!("SECURITY BREACH. Severity {severity:.1}. {clicks} countermeasures required."),
            ),
            SimEvent::cue(Cue::BreachStart),
        ]
    }

    /// One defensive countermeasure against an active breach.
    pub fn defend(&self, state: &mut GameState) -> ActionResult<Vec<SimEvent>> {
        let CrisisState::SecurityBreach { clicks_remaining, deadline, severity } = state.crisis.clone() else {
            return Err(ActionError::invalid("defend", "no security breach in progress"));
        };
        let remaining = clicks_remaining.saturating_sub(1);
        if remaining > 0 {
            state.crisis = CrisisState::SecurityBreach { clicks_remaining: remaining, deadline, severity };
            return Ok(vec![]);
        }

        state.crisis = CrisisState::Normal;
        state.story.flags.insert("breach_repelled".into());
        Ok(vec![
            SimEvent::CrisisEnded { crisis: CrisisKind::SecurityBreach, outcome: CrisisOutcome::Repelled },
            SimEvent::log(LogTag::Crisis, "Intrusion repelled. Perimeter sealed."),
            SimEvent::cue(Cue::BreachRepelled),
        ])
    }

    /// Close the breaker. Only possible once draw is back under capacity.
    pub fn reset_breaker(&self, state: &mut GameState) -> ActionResult<Vec<SimEvent>> {
        if state.crisis != CrisisState::BreakerTripped {
            return Err(ActionError::invalid("reset breaker", "breaker is not tripped"));
        }
        let r = &state.resources;
        if r.over_capacity() {
            return Err(ActionError::StillOverCapacity { draw: r.power_draw, capacity: r.power_capacity });
        }

        state.crisis = CrisisState::Normal;
        state.story.flags.insert("breaker_reset".into());
        Ok(vec![
            SimEvent::CrisisEnded { crisis: CrisisKind::BreakerTrip, outcome: CrisisOutcome::Reset },
            SimEvent::log(LogTag::Crisis, "Breaker reset. Power restored."),
            SimEvent::cue(Cue::BreakerReset),
        ])
    }

    pub fn annex_node(&self, state: &mut GameState, node_id: &str) -> ActionResult<Vec<SimEvent>> {
        let spec = node_spec(node_id).ok_or_else(|| ActionError::unknown("node", node_id))?;
        let status = state.nodes.get(spec.id).copied().unwrap_or_default();
        if status.is_held() {
            return Err(ActionError::invalid("annex", format!("{} is already held", spec.label)));
        }
        if state.story.stage < spec.min_stage {
            return Err(ActionError::Locked {
                what: spec.label.to_string(),
                reason: format!("requires story stage {}", spec.min_stage),
            });
        }
        let cost = annex_cost(&self.config, state.captured_nodes());
        if state.resources.currency < cost {
            return Err(ActionError::InsufficientFunds { needed: cost, available: state.resources.currency });
        }

        state.resources.currency -= cost;
        state.nodes.insert(spec.id.to_string(), NodeStatus::Captured);
        Ok(vec![
            SimEvent::NodeAnnexed { node_id: spec.id.to_string(), cost },
            SimEvent::log(LogTag::Progress, format!("{} annexed into the network.", spec.label)),
            SimEvent::cue(Cue::NodeAnnexed),
        ])
    }

    /// Start a raid on a held node. A no-op if one is already running there.
    pub fn trigger_raid(&self, state: &mut GameState, node_id: &str, now: Timestamp) -> ActionResult<Vec<SimEvent>> {
        let spec = node_spec(node_id).ok_or_else(|| ActionError::unknown("node", node_id))?;
        match state.nodes.get(spec.id).copied().unwrap_or_default() {
            NodeStatus::Captured => Ok(self.begin_raid(state, spec.id, now)),
            NodeStatus::Raided { .. } => Ok(vec![]),
            _ => Err(ActionError::invalid("raid", format!("{} is not held", spec.label))),
        }
    }

    pub fn respond_to_raid(
        &self,
        state: &mut GameState,
        node_id: &str,
        response: RaidResponse,
        rng: &mut SubsystemRng,
    ) -> ActionResult<Vec<SimEvent>> {
        let spec = node_spec(node_id).ok_or_else(|| ActionError::unknown("node", node_id))?;
        if !matches!(state.nodes.get(spec.id), Some(NodeStatus::Raided { .. })) {
            return Err(ActionError::invalid("respond to raid", format!("{} is not under attack", spec.label)));
        }

        let success = match response {
            RaidResponse::Reinforce => {
                let cost = self.reinforce_cost(state);
                if state.resources.currency < cost {
                    return Err(ActionError::InsufficientFunds {
                        needed: cost,
                        available: state.resources.currency,
                    });
                }
                state.resources.currency -= cost;
                true
            }
            RaidResponse::Counterhack => {
                let p = (self.config.counterhack_chance
                    + self.config.counterhack_security_bonus * state.resources.security_level as f64)
                    .min(0.95);
                rng.chance(p)
            }
            RaidResponse::Reroute => {
                state.resources.heat = (state.resources.heat + self.config.reroute_heat).min(HEAT_MAX);
                rng.chance(self.config.reroute_chance)
            }
            RaidResponse::Abandon => false,
        };

        let mut events = Vec::new();
        if success {
            state.nodes.insert(spec.id.to_string(), NodeStatus::Captured);
            state.resources.currency += self.config.raid_success_bounty;
            events.push(SimEvent::RaidResolved { node_id: spec.id.to_string(), response: Some(response), success });
            events.push(SimEvent::log(LogTag::Crisis, format!("{} held. Attackers traced and fined.", spec.label)));
            events.push(SimEvent::cue(Cue::RaidWon));
        } else {
            self.fail_raid(state, spec.id, Some(response), &mut events);
        }
        Ok(events)
    }

    pub fn reinforce_cost(&self, state: &GameState) -> f64 {
        self.config.reinforce_cost_base * (1.0 + state.story.rank as f64)
    }
}

impl SimSubsystem for CrisisMachine {
    fn name(&self) -> &'static str { "crisis" }

    fn update(
        &mut self,
        ctx: &mut TickContext<'_>,
        _events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>> {
        if !ctx.state.is_active() {
            return Ok(vec![]);
        }
        let mut events = Vec::new();

        self.decay_active(ctx.state, ctx.now, &mut events);
        if ctx.state.is_active() {
            self.check_triggers(ctx.state, ctx.now, ctx.rng, &mut events);
            self.update_raids(ctx.state, ctx.now, ctx.dt_secs, ctx.rng, &mut events);
        }

        if let Some(kind) = ctx.state.crisis.kind() {
            log::debug!("tick={} crisis: active {kind:?}", ctx.tick);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::UpgradeCatalog, config::SimConfig, progression::MetaProgress};

    fn state_at(stage: u32, rank: u32, security: u32) -> GameState {
        let mut state =
            GameState::new_run(&UpgradeCatalog::builtin(), &SimConfig::default(), MetaProgress::default());
        state.story.stage = stage;
        state.story.rank = rank;
        state.resources.security_level = security;
        state
    }

    #[test]
    fn no_breaches_before_the_gating_stage() {
        let cfg = CrisisConfig::default();
        assert_eq!(breach_chance(&cfg, &state_at(0, 10, 0)), 0.0);
        assert!(breach_chance(&cfg, &state_at(cfg.breach_min_stage, 0, 0)) > 0.0);
    }

    #[test]
    fn breach_chance_rises_with_rank_and_falls_with_security() {
        let cfg = CrisisConfig::default();
        let base = breach_chance(&cfg, &state_at(1, 0, 0));
        assert!((base - cfg.breach_base_chance).abs() < 1e-12);

        assert!(breach_chance(&cfg, &state_at(1, 4, 0)) > base);
        assert!(breach_chance(&cfg, &state_at(1, 0, 4)) < base);
        // 0.002 * (1 + 4 * 0.15) / (1 + 4 * 0.25)
        assert!((breach_chance(&cfg, &state_at(1, 4, 4)) - 0.0016).abs() < 1e-12);
    }

    #[test]
    fn breach_chance_is_clamped_to_one() {
        let cfg = CrisisConfig { breach_base_chance: 5.0, ..CrisisConfig::default() };
        assert_eq!(breach_chance(&cfg, &state_at(3, 20, 0)), 1.0);
    }

    #[test]
    fn security_shaves_breach_clicks_down_to_the_floor() {
        let cfg = CrisisConfig::default();
        // 8 base + round(4 * 1.5)
        assert_eq!(breach_clicks(&cfg, 4.0, 0), 14);
        assert_eq!(breach_clicks(&cfg, 4.0, 5), 9);
        assert_eq!(breach_clicks(&cfg, 4.0, 11), cfg.breach_min_clicks);
        assert_eq!(breach_clicks(&cfg, 4.0, 500), cfg.breach_min_clicks);
        assert!(breach_clicks(&cfg, 6.0, 0) > breach_clicks(&cfg, 2.0, 0));
    }

    #[test]
    fn severity_follows_the_log_of_accumulated_output() {
        assert_eq!(breach_severity(0.0), 1.0);
        assert!((breach_severity(1000.0) - 4.0).abs() < 1e-12);
    }
}
