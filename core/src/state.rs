//! The complete mutable game state for one run.
//!
//! Owned by the engine; every stage receives `&mut GameState` through
//! its `TickContext`. Everything here is serialized into a save slot.

use crate::{
    catalog::UpgradeCatalog,
    config::SimConfig,
    crisis::{CrisisState, NodeStatus, NODES},
    ledger::{Modifiers, ResourceState},
    narrative::story::StoryState,
    progression::{perk_bonuses, MetaProgress},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameState {
    pub resources: ResourceState,
    /// Owned count per upgrade id.
    pub owned: BTreeMap<String, u32>,
    pub modifiers: Modifiers,
    pub crisis: CrisisState,
    pub nodes: BTreeMap<String, NodeStatus>,
    pub story: StoryState,
    /// Rival message ids already delivered this run.
    pub rivals_sent: BTreeSet<String>,
    /// Carries over across transcendence.
    pub meta: MetaProgress,
}

impl GameState {
    /// Fresh run state. `meta` is carried in from the previous run.
    pub fn new_run(catalog: &UpgradeCatalog, config: &SimConfig, meta: MetaProgress) -> Self {
        let owned = catalog
            .iter()
            .filter(|s| s.starting_count > 0)
            .map(|s| (s.id.to_string(), s.starting_count))
            .collect();
        let nodes = NODES
            .iter()
            .map(|n| (n.id.to_string(), NodeStatus::Unclaimed))
            .collect();

        let mut state = Self {
            owned,
            nodes,
            meta,
            ..Self::default()
        };
        state.resources.currency =
            config.economy.starting_currency + perk_bonuses(&state.meta).starting_currency;
        state
    }

    pub fn owned_count(&self, upgrade_id: &str) -> u32 {
        self.owned.get(upgrade_id).copied().unwrap_or(0)
    }

    /// Nodes currently held (captured or under raid).
    pub fn captured_nodes(&self) -> usize {
        self.nodes.values().filter(|s| s.is_held()).count()
    }

    /// False once an ending has been reached. Only transcend is allowed then.
    pub fn is_active(&self) -> bool {
        self.story.ending.is_none()
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.story.flags.contains(flag)
    }
}
