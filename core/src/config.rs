//! Tuning values. Shapes (log-scaled severity, rank-gated chances,
//! geometric cost curves) live in code; the literal numbers live here
//! and may be re-tuned with every content update.

use serde::{Deserialize, Serialize};

// ── Economy ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub starting_currency: f64,
    /// Power capacity available before any generator is owned.
    pub base_power_capacity: f64,
    /// Heat shed per second with no cooling hardware.
    pub passive_cooling: f64,
    /// Fraction of the last unit's price returned on sale.
    pub refund_fraction: f64,
    /// Resource produced by one manual compute action.
    pub click_yield: f64,
    /// Extra manual yield as a fraction of per-second production.
    pub click_production_share: f64,
    pub repair_cost_per_point: f64,
    /// Maximum integrity restored by a single repair.
    pub max_repair_delta: f64,
    /// Story stage from which the post-midpoint exchange applies.
    pub exchange_midpoint_stage: u32,
    pub exchange_rate_early: f64,
    pub exchange_label_early: String,
    pub exchange_rate_late: f64,
    pub exchange_label_late: String,
    pub overclock_multiplier: f64,
    pub overclock_heat_multiplier: f64,
    pub overclock_duration_secs: f64,
    /// Fraction of output lost while a security breach is active.
    pub breach_siphon: f64,
    /// Production bonus per captured map node.
    pub node_production_bonus: f64,
    /// Production bonus per prestige point ever earned.
    pub prestige_multiplier_step: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_currency: 10.0,
            base_power_capacity: 0.0,
            passive_cooling: 1.0,
            refund_fraction: 0.5,
            click_yield: 1.0,
            click_production_share: 0.05,
            repair_cost_per_point: 25.0,
            max_repair_delta: 40.0,
            exchange_midpoint_stage: 3,
            exchange_rate_early: 0.5,
            exchange_label_early: "USD".into(),
            exchange_rate_late: 2.0,
            exchange_label_late: "NEURAL_CREDITS".into(),
            overclock_multiplier: 2.0,
            overclock_heat_multiplier: 2.5,
            overclock_duration_secs: 30.0,
            breach_siphon: 0.25,
            node_production_bonus: 0.10,
            prestige_multiplier_step: 0.05,
        }
    }
}

// ── Crisis ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrisisConfig {
    pub heat_threshold: f64,
    pub lockout_cooldown_secs: f64,
    /// Heat is forced to at most this value when a lockout expires.
    pub lockout_exit_heat: f64,
    pub breach_min_stage: u32,
    /// Per-tick breach chance at rank 0 with no security.
    pub breach_base_chance: f64,
    /// Relative chance increase per rank.
    pub breach_rank_factor: f64,
    /// Relative chance decrease per security level.
    pub breach_security_factor: f64,
    pub breach_base_clicks: u32,
    pub breach_min_clicks: u32,
    pub breach_duration_secs: f64,
    /// Integrity lost per point of severity when a breach times out.
    pub breach_damage_per_severity: f64,
    pub integrity_critical: f64,
    pub raid_min_stage: u32,
    pub raid_chance: f64,
    pub raid_duration_secs: f64,
    /// Integrity lost per second while any raid is active.
    pub raid_integrity_decay: f64,
    pub raid_failure_damage: f64,
    pub raid_success_bounty: f64,
    pub reinforce_cost_base: f64,
    pub counterhack_chance: f64,
    pub counterhack_security_bonus: f64,
    pub reroute_chance: f64,
    pub reroute_heat: f64,
    pub annex_cost_base: f64,
    pub annex_cost_growth: f64,
}

impl Default for CrisisConfig {
    fn default() -> Self {
        Self {
            heat_threshold: 100.0,
            lockout_cooldown_secs: 30.0,
            lockout_exit_heat: 60.0,
            breach_min_stage: 1,
            breach_base_chance: 0.002,
            breach_rank_factor: 0.15,
            breach_security_factor: 0.25,
            breach_base_clicks: 8,
            breach_min_clicks: 3,
            breach_duration_secs: 20.0,
            breach_damage_per_severity: 5.0,
            integrity_critical: 25.0,
            raid_min_stage: 2,
            raid_chance: 0.001,
            raid_duration_secs: 45.0,
            raid_integrity_decay: 0.05,
            raid_failure_damage: 10.0,
            raid_success_bounty: 250.0,
            reinforce_cost_base: 400.0,
            counterhack_chance: 0.55,
            counterhack_security_bonus: 0.05,
            reroute_chance: 0.8,
            reroute_heat: 30.0,
            annex_cost_base: 500.0,
            annex_cost_growth: 2.5,
        }
    }
}

// ── Narrative ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    /// Per-tick chance that an eligible ambient dilemma is presented.
    pub dilemma_chance: f64,
    /// Quiet period after an ambient dilemma resolves.
    pub dilemma_cooldown_secs: f64,
    /// Delay before a retried assault stage becomes eligible again.
    pub assault_retry_delay_secs: f64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            dilemma_chance: 0.02,
            dilemma_cooldown_secs: 120.0,
            assault_retry_delay_secs: 10.0,
        }
    }
}

// ── Progression ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Lifetime output needed for each rank, ascending. Rank 0 is free.
    pub rank_thresholds: Vec<f64>,
    pub transcend_min_rank: u32,
    /// Prestige points = floor(sqrt(lifetime / divisor)).
    pub prestige_divisor: f64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            rank_thresholds: vec![0.0, 1e3, 1e5, 1e7, 1e9, 1e11, 1e13],
            transcend_min_rank: 4,
            prestige_divisor: 1e6,
        }
    }
}

// ── Offline ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    pub max_offline_secs: f64,
    pub offline_efficiency: f64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            max_offline_secs: 8.0 * 3600.0,
            offline_efficiency: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub economy:     EconomyConfig,
    pub crisis:      CrisisConfig,
    pub narrative:   NarrativeConfig,
    pub progression: ProgressionConfig,
    pub offline:     OfflineConfig,
}

impl SimConfig {
    /// Load from the data/ directory. Missing sections fall back to defaults.
    /// In tests, use SimConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/tuning.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SimConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        log::info!("Loaded tuning from {path}");
        Ok(config)
    }

    /// Shipped tuning with every probabilistic trigger switched off,
    /// so tests only see crises and dilemmas they cause themselves.
    pub fn default_test() -> Self {
        let mut config = Self::default();
        config.crisis.breach_base_chance = 0.0;
        config.crisis.raid_chance = 0.0;
        config.narrative.dilemma_chance = 0.0;
        config
    }
}
