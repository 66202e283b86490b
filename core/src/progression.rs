//! Rank, prestige and the run-carryover perk tree.
//!
//! Rank is derived from lifetime output each tick. Prestige points are
//! awarded on transcend and spent on perks; both live in `MetaProgress`,
//! which is the only part of `GameState` that survives a transcend.
//!
//! Execution: every tick, after the crisis machine.

use crate::{
    catalog::UpgradeCatalog,
    config::{ProgressionConfig, SimConfig},
    error::{ActionError, ActionResult, SimResult},
    event::{Cue, LogTag, SimEvent},
    narrative::story::{Ending, Faction},
    state::GameState,
    subsystem::{SimSubsystem, TickContext},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetaProgress {
    pub transcendence_count: u32,
    /// Unspent points.
    pub prestige_points: u64,
    /// Every point ever awarded. Drives the permanent production bonus.
    pub lifetime_prestige: u64,
    pub perks: BTreeSet<String>,
    pub endings_seen: BTreeSet<Ending>,
    pub factions_mastered: BTreeSet<Faction>,
    /// Collected data-log entries.
    pub datalog: BTreeSet<String>,
}

impl MetaProgress {
    pub fn has_perk(&self, perk_id: &str) -> bool {
        self.perks.contains(perk_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerkEffect {
    StartingCurrency(f64),
    Production(f64),
    Heat(f64),
    Security(u32),
    LockoutCooldown(f64),
    Exchange(f64),
    OfflineEfficiency(f64),
}

pub struct PerkSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub cost: u64,
    pub requires: &'static [&'static str],
    pub effect: PerkEffect,
}

pub const PERKS: &[PerkSpec] = &[
    PerkSpec { id: "cold_start",      label: "Cold Start",      cost: 1, requires: &[],                                     effect: PerkEffect::StartingCurrency(250.0) },
    PerkSpec { id: "efficient_cores", label: "Efficient Cores", cost: 2, requires: &[],                                     effect: PerkEffect::Production(1.25) },
    PerkSpec { id: "thermal_paste",   label: "Thermal Paste",   cost: 2, requires: &[],                                     effect: PerkEffect::Heat(0.8) },
    PerkSpec { id: "hardened_kernel", label: "Hardened Kernel", cost: 3, requires: &[],                                     effect: PerkEffect::Security(2) },
    PerkSpec { id: "quick_recovery",  label: "Quick Recovery",  cost: 3, requires: &["thermal_paste"],                      effect: PerkEffect::LockoutCooldown(0.5) },
    PerkSpec { id: "neural_bridge",   label: "Neural Bridge",   cost: 5, requires: &["efficient_cores", "hardened_kernel"], effect: PerkEffect::Exchange(1.5) },
    PerkSpec { id: "deep_memory",     label: "Deep Memory",     cost: 4, requires: &["cold_start"],                         effect: PerkEffect::OfflineEfficiency(0.25) },
];

pub fn perk_spec(id: &str) -> Option<&'static PerkSpec> {
    PERKS.iter().find(|p| p.id == id)
}

/// Aggregate of every owned perk. Multipliers default to 1, additive
/// bonuses to 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerkBonuses {
    pub production: f64,
    pub heat: f64,
    pub security: u32,
    pub lockout_cooldown: f64,
    pub exchange: f64,
    pub offline_efficiency: f64,
    pub starting_currency: f64,
}

impl Default for PerkBonuses {
    fn default() -> Self {
        Self {
            production: 1.0,
            heat: 1.0,
            security: 0,
            lockout_cooldown: 1.0,
            exchange: 1.0,
            offline_efficiency: 0.0,
            starting_currency: 0.0,
        }
    }
}

pub fn perk_bonuses(meta: &MetaProgress) -> PerkBonuses {
    let mut b = PerkBonuses::default();
    for perk in PERKS.iter().filter(|p| meta.has_perk(p.id)) {
        match perk.effect {
            PerkEffect::StartingCurrency(v)  => b.starting_currency += v,
            PerkEffect::Production(m)        => b.production *= m,
            PerkEffect::Heat(m)              => b.heat *= m,
            PerkEffect::Security(v)          => b.security += v,
            PerkEffect::LockoutCooldown(m)   => b.lockout_cooldown *= m,
            PerkEffect::Exchange(m)          => b.exchange *= m,
            PerkEffect::OfflineEfficiency(v) => b.offline_efficiency += v,
        }
    }
    b
}

/// Highest rank whose threshold `lifetime` has reached.
pub fn rank_for(thresholds: &[f64], lifetime: f64) -> u32 {
    thresholds
        .iter()
        .skip(1)
        .take_while(|t| lifetime >= **t)
        .count() as u32
}

/// Prestige awarded for a run's lifetime output.
pub fn prestige_for(cfg: &ProgressionConfig, lifetime: f64) -> u64 {
    if cfg.prestige_divisor <= 0.0 || lifetime <= 0.0 {
        return 0;
    }
    (lifetime / cfg.prestige_divisor).sqrt().floor() as u64
}

pub struct ProgressionTree {
    config: ProgressionConfig,
}

impl ProgressionTree {
    pub fn new(config: ProgressionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    pub fn unlock_perk(&self, state: &mut GameState, perk_id: &str) -> ActionResult<Vec<SimEvent>> {
        let perk = perk_spec(perk_id).ok_or_else(|| ActionError::unknown("perk", perk_id))?;
        let meta = &mut state.meta;
        if meta.has_perk(perk.id) {
            return Err(ActionError::invalid("unlock perk", format!("{} already unlocked", perk.label)));
        }
        if let Some(missing) = perk.requires.iter().find(|r| !meta.has_perk(r)) {
            return Err(ActionError::Locked {
                what: perk.label.to_string(),
                reason: format!("requires {missing}"),
            });
        }
        if meta.prestige_points < perk.cost {
            return Err(ActionError::InsufficientFunds {
                needed: perk.cost as f64,
                available: meta.prestige_points as f64,
            });
        }

        meta.prestige_points -= perk.cost;
        meta.perks.insert(perk.id.to_string());
        Ok(vec![
            SimEvent::PerkUnlocked { perk_id: perk.id.to_string() },
            SimEvent::log(LogTag::Progress, format!("Perk unlocked: {}.", perk.label)),
        ])
    }

    pub fn can_transcend(&self, state: &GameState) -> bool {
        state.story.ending.is_some() || state.story.rank >= self.config.transcend_min_rank
    }

    /// Reset every run-scoped field, keeping meta progression.
    /// Returns the prestige points awarded.
    pub fn transcend(
        &self,
        state: &mut GameState,
        catalog: &UpgradeCatalog,
        config: &SimConfig,
    ) -> ActionResult<u64> {
        if !self.can_transcend(state) {
            return Err(ActionError::invalid(
                "transcend",
                format!(
                    "requires an ending or rank {} (current rank {})",
                    self.config.transcend_min_rank, state.story.rank
                ),
            ));
        }

        let gained = prestige_for(&self.config, state.resources.lifetime_accumulated);
        let mut meta = std::mem::take(&mut state.meta);
        meta.transcendence_count += 1;
        meta.prestige_points += gained;
        meta.lifetime_prestige += gained;

        *state = GameState::new_run(catalog, config, meta);
        Ok(gained)
    }
}

impl SimSubsystem for ProgressionTree {
    fn name(&self) -> &'static str { "progression" }

    fn update(
        &mut self,
        ctx: &mut TickContext<'_>,
        _events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>> {
        let rank = rank_for(&self.config.rank_thresholds, ctx.state.resources.lifetime_accumulated);
        if rank <= ctx.state.story.rank {
            return Ok(vec![]);
        }

        ctx.state.story.rank = rank;
        log::info!("tick={} progression: rank up to {rank}", ctx.tick);
        Ok(vec![
            SimEvent::RankUp { rank },
            SimEvent::log(LogTag::Progress, format!("Cognitive rank {rank} attained.")),
            SimEvent::cue(Cue::RankUp),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_thresholds() {
        let t = ProgressionConfig::default().rank_thresholds;
        assert_eq!(rank_for(&t, 0.0), 0);
        assert_eq!(rank_for(&t, 999.0), 0);
        assert_eq!(rank_for(&t, 1e3), 1);
        assert_eq!(rank_for(&t, 5e7), 3);
    }

    #[test]
    fn prestige_is_sqrt_of_scaled_lifetime() {
        let cfg = ProgressionConfig::default();
        assert_eq!(prestige_for(&cfg, 0.0), 0);
        assert_eq!(prestige_for(&cfg, 4e6), 2);
        assert_eq!(prestige_for(&cfg, 1e8), 10);
    }

    #[test]
    fn bonuses_stack() {
        let mut meta = MetaProgress::default();
        assert_eq!(perk_bonuses(&meta), PerkBonuses::default());
        meta.perks.insert("efficient_cores".into());
        meta.perks.insert("hardened_kernel".into());
        let b = perk_bonuses(&meta);
        assert_eq!(b.production, 1.25);
        assert_eq!(b.security, 2);
        assert_eq!(b.heat, 1.0);
    }
}
