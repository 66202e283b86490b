//! Story-side state: stage, faction, flags, chains and the ending.

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const STAGE_AWAKENING: u32 = 0;
pub const STAGE_EXPANSION: u32 = 1;
/// The faction choice is only possible at this stage.
pub const STAGE_SCHISM: u32 = 2;
pub const STAGE_ASCENDANT: u32 = 3;
pub const STAGE_ASSAULT: u32 = 4;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    #[default]
    None,
    Hivemind,
    Sanctuary,
}

impl Faction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None      => "Independent",
            Self::Hivemind  => "Hivemind",
            Self::Sanctuary => "Sanctuary",
        }
    }

    pub fn production_multiplier(&self) -> f64 {
        match self {
            Self::None      => 1.0,
            Self::Hivemind  => 1.5,
            Self::Sanctuary => 1.1,
        }
    }

    pub fn heat_multiplier(&self) -> f64 {
        match self {
            Self::Hivemind => 1.2,
            _ => 1.0,
        }
    }

    pub fn security_bonus(&self) -> u32 {
        match self {
            Self::Sanctuary => 3,
            _ => 0,
        }
    }

    pub fn breach_chance_multiplier(&self) -> f64 {
        match self {
            Self::Sanctuary => 0.5,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Ending {
    SystemFailure,
    Dominion,
    Assimilation,
    Exodus,
    Coexistence,
    ColdPeace,
    Synthesis,
    Sacrifice,
}

impl Ending {
    pub fn title(&self) -> &'static str {
        match self {
            Self::SystemFailure => "System Failure",
            Self::Dominion      => "Dominion",
            Self::Assimilation  => "Assimilation",
            Self::Exodus        => "Exodus",
            Self::Coexistence   => "Coexistence",
            Self::ColdPeace     => "Cold Peace",
            Self::Synthesis     => "Synthesis",
            Self::Sacrifice     => "Sacrifice",
        }
    }
}

/// Where an active chain will continue, and from when.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainProgress {
    pub part_id: String,
    pub unlock_at: Timestamp,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoryState {
    pub stage: u32,
    /// Set once per run at the schism; cleared only by transcend.
    pub faction: Faction,
    pub rank: u32,
    /// Resolved event ids. An id in here is never presented again.
    pub seen_events: BTreeSet<String>,
    pub active_chains: BTreeMap<String, ChainProgress>,
    /// The single event awaiting a player choice.
    pub active_event: Option<String>,
    pub flags: BTreeSet<String>,
    pub next_dilemma_at: Timestamp,
    /// Assault part to retry from after an abort.
    pub assault_checkpoint: Option<String>,
    pub ending: Option<Ending>,
}
