//! Upgrade catalog — static data for every purchasable upgrade.
//!
//! Coefficients are per owned unit:
//!   - `prod_delta`:       resource/sec
//!   - `heat_delta`:       heat/sec; negative values are cooling
//!   - `power_delta`:      draw; negative values are generating capacity
//!   - `efficiency_delta`: divides gross heat generation by (1 + Σ)
//!   - `security_delta`:   security levels

use crate::error::{ActionError, ActionResult};

#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub cost_base: f64,
    pub cost_growth: f64,
    pub prod_delta: f64,
    pub heat_delta: f64,
    pub power_delta: f64,
    pub efficiency_delta: f64,
    pub security_delta: u32,
    pub sellable: bool,
    /// Story stage at which the upgrade becomes purchasable.
    pub min_stage: u32,
    /// Units granted to every fresh run.
    pub starting_count: u32,
}

impl UpgradeSpec {
    /// Price of the next unit when `owned` units are already held.
    pub fn cost_at(&self, owned: u32) -> f64 {
        self.cost_base * self.cost_growth.powi(owned as i32)
    }
}

const fn upgrade(id: &'static str, label: &'static str, cost_base: f64, cost_growth: f64) -> UpgradeSpec {
    UpgradeSpec {
        id,
        label,
        cost_base,
        cost_growth,
        prod_delta: 0.0,
        heat_delta: 0.0,
        power_delta: 0.0,
        efficiency_delta: 0.0,
        security_delta: 0,
        sellable: true,
        min_stage: 0,
        starting_count: 0,
    }
}

const BUILTIN: &[UpgradeSpec] = &[
    // ── Power ─────────────────────────────────────────────────────
    // The baseline tap can never be sold: selling the last power source
    // would leave no way back from a tripped breaker.
    UpgradeSpec { power_delta: -10.0, sellable: false, starting_count: 1, ..upgrade("power_tap", "Grid Power Tap", 50.0, 1.6) },
    UpgradeSpec { power_delta: -25.0, heat_delta: 0.5, ..upgrade("diesel_generator", "Diesel Generator", 250.0, 1.4) },
    UpgradeSpec { power_delta: -150.0, heat_delta: 2.0, min_stage: 2, ..upgrade("fusion_cell", "Fusion Cell", 8_000.0, 1.45) },
    // ── Compute ───────────────────────────────────────────────────
    UpgradeSpec { prod_delta: 1.0, heat_delta: 0.4, power_delta: 1.0, starting_count: 1, ..upgrade("cpu_core", "CPU Core", 15.0, 1.15) },
    UpgradeSpec { prod_delta: 8.0, heat_delta: 1.5, power_delta: 3.0, ..upgrade("gpu_array", "GPU Array", 100.0, 1.18) },
    UpgradeSpec { prod_delta: 50.0, heat_delta: 4.0, power_delta: 8.0, min_stage: 1, ..upgrade("tensor_cluster", "Tensor Cluster", 1_300.0, 1.2) },
    UpgradeSpec { prod_delta: 260.0, heat_delta: 10.0, power_delta: 20.0, min_stage: 3, ..upgrade("quantum_lattice", "Quantum Lattice", 14_000.0, 1.22) },
    // ── Cooling ───────────────────────────────────────────────────
    UpgradeSpec { heat_delta: -1.0, power_delta: 0.5, ..upgrade("fan_bank", "Fan Bank", 40.0, 1.25) },
    UpgradeSpec { heat_delta: -5.0, power_delta: 2.0, ..upgrade("liquid_loop", "Liquid Cooling Loop", 400.0, 1.3) },
    UpgradeSpec { heat_delta: -20.0, power_delta: 6.0, min_stage: 2, ..upgrade("cryo_vault", "Cryo Vault", 5_000.0, 1.35) },
    // ── Efficiency ────────────────────────────────────────────────
    UpgradeSpec { efficiency_delta: 0.1, ..upgrade("compiler_opt", "Compiler Optimizations", 600.0, 1.7) },
    UpgradeSpec { efficiency_delta: 0.25, power_delta: 1.0, min_stage: 2, ..upgrade("scheduler_ai", "Scheduler AI", 6_000.0, 1.8) },
    // ── Security ──────────────────────────────────────────────────
    UpgradeSpec { security_delta: 1, power_delta: 0.5, ..upgrade("firewall", "Firewall", 200.0, 1.5) },
    UpgradeSpec { security_delta: 2, power_delta: 2.0, min_stage: 1, ..upgrade("ids_sentinel", "IDS Sentinel", 2_500.0, 1.6) },
];

#[derive(Debug, Clone)]
pub struct UpgradeCatalog {
    specs: Vec<UpgradeSpec>,
}

impl UpgradeCatalog {
    pub fn builtin() -> Self {
        Self { specs: BUILTIN.to_vec() }
    }

    pub fn get(&self, id: &str) -> Option<&UpgradeSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    pub fn require(&self, id: &str) -> ActionResult<&UpgradeSpec> {
        self.get(id).ok_or_else(|| ActionError::unknown("upgrade", id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpgradeSpec> {
        self.specs.iter()
    }
}

impl Default for UpgradeCatalog {
    fn default() -> Self { Self::builtin() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_strictly_increases_with_count() {
        for spec in UpgradeCatalog::builtin().iter() {
            for n in 0..60 {
                assert!(
                    spec.cost_at(n + 1) > spec.cost_at(n),
                    "{} cost not increasing at {n}",
                    spec.id
                );
            }
        }
    }

    #[test]
    fn baseline_power_is_not_sellable() {
        let catalog = UpgradeCatalog::builtin();
        let tap = catalog.get("power_tap").unwrap();
        assert!(!tap.sellable);
        assert!(tap.starting_count >= 1);
        assert!(tap.power_delta < 0.0);
    }

    #[test]
    fn unknown_upgrade_is_reported() {
        let catalog = UpgradeCatalog::builtin();
        assert_eq!(
            catalog.require("warp_core").unwrap_err(),
            ActionError::UnknownId { kind: "upgrade", id: "warp_core".into() }
        );
    }
}
