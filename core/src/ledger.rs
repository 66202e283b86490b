//! Resource ledger — the per-tick economy.
//!
//! Holds the resource state and the pure functions that derive rates
//! from owned upgrades. Production stacks multiplicatively across:
//! upgrade effects × prestige × tech-tree perks × faction × captured
//! nodes × story boosts × overclock. Crisis factors are applied on
//! integration, never folded into the derived rates.
//!
//! Execution: first stage of every tick.

use crate::{
    catalog::UpgradeCatalog,
    config::EconomyConfig,
    crisis::CrisisState,
    error::{ActionError, ActionResult, SimResult},
    event::{Cue, LogTag, SimEvent},
    progression::perk_bonuses,
    state::GameState,
    subsystem::{SimSubsystem, TickContext},
    types::{secs_to_ms, Timestamp},
};
use serde::{Deserialize, Serialize};

pub const HEAT_MAX: f64 = 100.0;
pub const INTEGRITY_MAX: f64 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceState {
    /// Raw resource/sec from owned upgrades, before multipliers.
    pub production: f64,
    /// Global production multiplier.
    pub multiplier: f64,
    pub accumulated: f64,
    /// Total ever produced this run. Never reduced by exchange or purge.
    pub lifetime_accumulated: f64,
    pub currency: f64,
    pub heat: f64,
    /// Gross heat/sec from active hardware.
    pub heat_generation: f64,
    /// Heat shed per second.
    pub cooling: f64,
    pub power_draw: f64,
    pub power_capacity: f64,
    pub efficiency: f64,
    pub integrity: f64,
    pub security_level: u32,
}

impl Default for ResourceState {
    fn default() -> Self {
        Self {
            production: 0.0,
            multiplier: 1.0,
            accumulated: 0.0,
            lifetime_accumulated: 0.0,
            currency: 0.0,
            heat: 0.0,
            heat_generation: 0.0,
            cooling: 0.0,
            power_draw: 0.0,
            power_capacity: 0.0,
            efficiency: 0.0,
            integrity: INTEGRITY_MAX,
            security_level: 0,
        }
    }
}

impl ResourceState {
    /// Resource/sec after the global multiplier, ignoring crisis effects.
    pub fn effective_production(&self) -> f64 {
        self.production * self.multiplier
    }

    pub fn over_capacity(&self) -> bool {
        self.power_draw > self.power_capacity
    }
}

/// A temporary production boost granted by a narrative choice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ProductionBoost {
    pub multiplier: f64,
    pub until: Timestamp,
}

/// Transient and story-granted modifiers layered over the upgrades.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Modifiers {
    pub overclock_until: Option<Timestamp>,
    pub boost: Option<ProductionBoost>,
    pub security_bonus: i64,
    pub capacity_bonus: f64,
}

impl Modifiers {
    pub fn overclocked(&self, now: Timestamp) -> bool {
        self.overclock_until.is_some_and(|until| now < until)
    }
}

/// Rates derived from owned upgrades and modifiers. All non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedRates {
    pub production: f64,
    pub multiplier: f64,
    pub heat_generation: f64,
    pub cooling: f64,
    pub power_draw: f64,
    pub power_capacity: f64,
    pub efficiency: f64,
    pub security_level: u32,
}

/// Compute every derived rate from scratch. Pure.
pub fn derive_rates(
    catalog: &UpgradeCatalog,
    econ: &EconomyConfig,
    state: &GameState,
    now: Timestamp,
) -> DerivedRates {
    let perks = perk_bonuses(&state.meta);
    let faction = state.story.faction;

    let mut production = 0.0;
    let mut gross_heat = 0.0;
    let mut cooling = econ.passive_cooling.max(0.0);
    let mut draw = 0.0;
    let mut capacity = econ.base_power_capacity.max(0.0) + state.modifiers.capacity_bonus.max(0.0);
    let mut efficiency = 0.0;
    let mut security: i64 = 0;

    for spec in catalog.iter() {
        let n = state.owned_count(spec.id) as f64;
        if n == 0.0 {
            continue;
        }
        production += spec.prod_delta.max(0.0) * n;
        if spec.heat_delta >= 0.0 {
            gross_heat += spec.heat_delta * n;
        } else {
            cooling += -spec.heat_delta * n;
        }
        if spec.power_delta >= 0.0 {
            draw += spec.power_delta * n;
        } else {
            capacity += -spec.power_delta * n;
        }
        efficiency += spec.efficiency_delta.max(0.0) * n;
        security += spec.security_delta as i64 * n as i64;
    }

    let overclocked = state.modifiers.overclocked(now);
    let mut multiplier = (1.0 + econ.prestige_multiplier_step * state.meta.lifetime_prestige as f64)
        * perks.production
        * faction.production_multiplier()
        * (1.0 + econ.node_production_bonus * state.captured_nodes() as f64);
    if let Some(boost) = state.modifiers.boost {
        if now < boost.until {
            multiplier *= boost.multiplier.max(0.0);
        }
    }
    let mut heat_factor = perks.heat * faction.heat_multiplier();
    if overclocked {
        multiplier *= econ.overclock_multiplier;
        heat_factor *= econ.overclock_heat_multiplier;
    }

    security += state.modifiers.security_bonus + perks.security as i64 + faction.security_bonus() as i64;

    DerivedRates {
        production,
        multiplier: multiplier.max(0.0),
        heat_generation: (gross_heat * heat_factor / (1.0 + efficiency)).max(0.0),
        cooling,
        power_draw: draw,
        power_capacity: capacity,
        efficiency,
        security_level: security.max(0) as u32,
    }
}

/// Exchange label and rate for a story stage. Pure lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRate {
    pub label: String,
    pub rate: f64,
}

pub fn exchange_rate(econ: &EconomyConfig, stage: u32) -> ExchangeRate {
    if stage >= econ.exchange_midpoint_stage {
        ExchangeRate { label: econ.exchange_label_late.clone(), rate: econ.exchange_rate_late }
    } else {
        ExchangeRate { label: econ.exchange_label_early.clone(), rate: econ.exchange_rate_early }
    }
}

/// Currency needed to restore `points` of integrity.
pub fn repair_cost(econ: &EconomyConfig, points: f64, stage: u32) -> f64 {
    points.max(0.0) * econ.repair_cost_per_point * (1.0 + stage as f64 * 0.5)
}

pub struct Ledger {
    catalog: UpgradeCatalog,
    config:  EconomyConfig,
}

impl Ledger {
    pub fn new(catalog: UpgradeCatalog, config: EconomyConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &UpgradeCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    /// Refresh every derived field of `state.resources`.
    pub fn recompute(&self, state: &mut GameState, now: Timestamp) {
        let rates = derive_rates(&self.catalog, &self.config, state, now);
        let r = &mut state.resources;
        r.production = rates.production;
        r.multiplier = rates.multiplier;
        r.heat_generation = rates.heat_generation;
        r.cooling = rates.cooling;
        r.power_draw = rates.power_draw;
        r.power_capacity = rates.power_capacity;
        r.efficiency = rates.efficiency;
        r.security_level = rates.security_level;
    }

    /// Integrate production and heat over `dt_secs`.
    pub fn integrate(&self, state: &mut GameState, dt_secs: f64, now: Timestamp) -> Vec<SimEvent> {
        let mut events = Vec::new();

        if let Some(until) = state.modifiers.overclock_until {
            if now >= until {
                state.modifiers.overclock_until = None;
                events.push(SimEvent::OverclockEnded);
                events.push(SimEvent::log(LogTag::System, "Overclock disengaged. Clocks returning to nominal."));
            }
        }
        if state.modifiers.boost.is_some_and(|b| now >= b.until) {
            state.modifiers.boost = None;
        }

        self.recompute(state, now);

        let halted = state.crisis.halts_production();
        let factor = state.crisis.production_factor(self.config.breach_siphon);
        let r = &mut state.resources;
        let gained = r.effective_production() * factor * dt_secs;
        r.accumulated += gained;
        r.lifetime_accumulated += gained;

        let generation = if halted { 0.0 } else { r.heat_generation };
        r.heat = (r.heat + (generation - r.cooling) * dt_secs).clamp(0.0, HEAT_MAX);

        if r.over_capacity() && state.crisis.is_normal() {
            log::debug!("ledger: draw {:.1} exceeds capacity {:.1}", r.power_draw, r.power_capacity);
        }
        events
    }

    /// The primary production action.
    pub fn click(&self, state: &mut GameState) -> ActionResult<Vec<SimEvent>> {
        match state.crisis {
            CrisisState::ThermalLockout { .. } => {
                return Err(ActionError::invalid("compute", "thermal lockout in progress"))
            }
            CrisisState::BreakerTripped => {
                return Err(ActionError::invalid("compute", "breaker tripped, no power"))
            }
            _ => {}
        }
        let r = &mut state.resources;
        let yield_ = self.config.click_yield
            + r.effective_production() * self.config.click_production_share;
        r.accumulated += yield_;
        r.lifetime_accumulated += yield_;
        Ok(vec![])
    }

    pub fn buy(&self, state: &mut GameState, upgrade_id: &str, now: Timestamp) -> ActionResult<Vec<SimEvent>> {
        let spec = self.catalog.require(upgrade_id)?;
        if matches!(state.crisis, CrisisState::ThermalLockout { .. }) {
            return Err(ActionError::invalid("buy", "thermal lockout in progress"));
        }
        if state.story.stage < spec.min_stage {
            return Err(ActionError::Locked {
                what: spec.label.to_string(),
                reason: format!("requires story stage {}", spec.min_stage),
            });
        }
        // The breaker only trips from Normal; no overloading mid-crisis.
        if !state.crisis.is_normal()
            && spec.power_delta > 0.0
            && state.resources.power_draw + spec.power_delta > state.resources.power_capacity
        {
            return Err(ActionError::invalid("buy", "would exceed power capacity during a crisis"));
        }

        let owned = state.owned_count(spec.id);
        let cost = spec.cost_at(owned);
        if state.resources.currency < cost {
            return Err(ActionError::InsufficientFunds {
                needed: cost,
                available: state.resources.currency,
            });
        }

        state.resources.currency -= cost;
        let count = owned + 1;
        state.owned.insert(spec.id.to_string(), count);
        self.recompute(state, now);

        let mut events = vec![
            SimEvent::UpgradePurchased { upgrade_id: spec.id.to_string(), count, cost },
            SimEvent::log(LogTag::Market, format!("Acquired {} #{count} for {cost:.0}.", spec.label)),
            SimEvent::cue(Cue::PurchaseSuccess),
        ];
        if state.resources.over_capacity() {
            events.push(SimEvent::log(
                LogTag::Warning,
                format!(
                    "Power draw {:.1} exceeds capacity {:.1}.",
                    state.resources.power_draw, state.resources.power_capacity
                ),
            ));
        }
        Ok(events)
    }

    pub fn sell(&self, state: &mut GameState, upgrade_id: &str, now: Timestamp) -> ActionResult<Vec<SimEvent>> {
        let spec = self.catalog.require(upgrade_id)?;
        let owned = state.owned_count(spec.id);
        if owned == 0 || !spec.sellable {
            return Err(ActionError::NothingToSell { upgrade_id: spec.id.to_string() });
        }

        let count = owned - 1;
        let refund = spec.cost_at(count) * self.config.refund_fraction;
        state.resources.currency += refund;
        state.owned.insert(spec.id.to_string(), count);
        self.recompute(state, now);

        Ok(vec![
            SimEvent::UpgradeSold { upgrade_id: spec.id.to_string(), count, refund },
            SimEvent::log(LogTag::Market, format!("Decommissioned {} for {refund:.0}.", spec.label)),
            SimEvent::cue(Cue::Sell),
        ])
    }

    /// Convert all accumulated resource to currency.
    pub fn exchange(&self, state: &mut GameState) -> ActionResult<Vec<SimEvent>> {
        let amount = state.resources.accumulated;
        if amount <= 0.0 {
            return Ok(vec![]);
        }
        let rate = exchange_rate(&self.config, state.story.stage);
        let perks = perk_bonuses(&state.meta);
        let currency = amount * rate.rate * perks.exchange;

        state.resources.accumulated = 0.0;
        state.resources.currency += currency;

        Ok(vec![
            SimEvent::Exchanged { amount, currency, label: rate.label.clone() },
            SimEvent::log(
                LogTag::Market,
                format!("Exchanged {amount:.0} FLOPS for {currency:.2} {}.", rate.label),
            ),
            SimEvent::cue(Cue::Exchange),
        ])
    }

    pub fn repair_integrity(&self, state: &mut GameState) -> ActionResult<Vec<SimEvent>> {
        let missing = INTEGRITY_MAX - state.resources.integrity;
        if missing <= 0.0 {
            return Ok(vec![]);
        }
        let restored = missing.min(self.config.max_repair_delta);
        let cost = repair_cost(&self.config, restored, state.story.stage);
        if state.resources.currency < cost {
            return Err(ActionError::InsufficientFunds {
                needed: cost,
                available: state.resources.currency,
            });
        }

        state.resources.currency -= cost;
        state.resources.integrity = (state.resources.integrity + restored).min(INTEGRITY_MAX);

        Ok(vec![
            SimEvent::IntegrityRepaired { restored, cost },
            SimEvent::log(
                LogTag::System,
                format!("Hardware integrity restored to {:.0}%.", state.resources.integrity),
            ),
            SimEvent::cue(Cue::Repair),
        ])
    }

    /// Dump all heat at the cost of every accumulated unit.
    pub fn purge_heat(&self, state: &mut GameState) -> ActionResult<Vec<SimEvent>> {
        if matches!(state.crisis, CrisisState::ThermalLockout { .. }) {
            return Err(ActionError::invalid("purge heat", "coolant lines sealed during lockout"));
        }
        let heat = state.resources.heat;
        let accumulated_lost = state.resources.accumulated;
        state.resources.heat = 0.0;
        state.resources.accumulated = 0.0;

        Ok(vec![
            SimEvent::HeatPurged { heat, accumulated_lost },
            SimEvent::log(
                LogTag::System,
                format!("Emergency purge: vented {heat:.0} heat, flushed {accumulated_lost:.0} FLOPS."),
            ),
            SimEvent::cue(Cue::Purge),
        ])
    }

    pub fn overclock(&self, state: &mut GameState, now: Timestamp) -> ActionResult<Vec<SimEvent>> {
        if !state.crisis.is_normal() {
            return Err(ActionError::invalid("overclock", "a crisis is active"));
        }
        if state.modifiers.overclocked(now) {
            return Err(ActionError::invalid("overclock", "already overclocked"));
        }
        let until = now + secs_to_ms(self.config.overclock_duration_secs);
        state.modifiers.overclock_until = Some(until);
        self.recompute(state, now);

        Ok(vec![
            SimEvent::OverclockStarted { until },
            SimEvent::log(LogTag::System, "Overclock engaged. Watch the thermals."),
            SimEvent::cue(Cue::Overclock),
        ])
    }

    /// Next-unit price for an upgrade, if it exists.
    pub fn next_cost(&self, state: &GameState, upgrade_id: &str) -> Option<f64> {
        self.catalog.get(upgrade_id).map(|s| s.cost_at(state.owned_count(s.id)))
    }
}

impl SimSubsystem for Ledger {
    fn name(&self) -> &'static str { "ledger" }

    fn update(
        &mut self,
        ctx: &mut TickContext<'_>,
        _events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>> {
        if !ctx.state.is_active() {
            return Ok(vec![]);
        }
        let events = self.integrate(ctx.state, ctx.dt_secs, ctx.now);
        log::debug!(
            "tick={} ledger: prod={:.2}x{:.2} acc={:.1} heat={:.1} draw={:.1}/{:.1}",
            ctx.tick,
            ctx.state.resources.production,
            ctx.state.resources.multiplier,
            ctx.state.resources.accumulated,
            ctx.state.resources.heat,
            ctx.state.resources.power_draw,
            ctx.state.resources.power_capacity,
        );
        Ok(events)
    }
}
