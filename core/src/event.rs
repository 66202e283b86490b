//! Everything the engine tells the outside world.
//!
//! The presentation layer consumes the `Log` lines as its terminal feed,
//! audio/haptics map `Cue` tags to feedback, and the runner journals the
//! whole stream. The engine never depends on any of them being honored.

use crate::{
    crisis::RaidResponse,
    narrative::story::{Ending, Faction},
    types::{RunId, Tick, Timestamp},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogTag {
    System,
    Market,
    Crisis,
    Story,
    Rival,
    DataLog,
    Progress,
    Warning,
}

/// Discrete feedback tags for sound and haptics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Cue {
    PurchaseSuccess,
    Sell,
    Exchange,
    Repair,
    Purge,
    Overclock,
    ThermalLockout,
    LockoutCleared,
    BreakerTrip,
    BreakerReset,
    BreachStart,
    BreachRepelled,
    BreachFailed,
    IntegrityCritical,
    RaidStart,
    RaidWon,
    RaidLost,
    NodeAnnexed,
    RankUp,
    StoryBeat,
    ChoiceMade,
    RivalMessage,
    DataLogUnlocked,
    Ending,
    SystemFailure,
    Transcend,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrisisKind {
    ThermalLockout,
    BreakerTrip,
    SecurityBreach,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrisisOutcome {
    /// Lockout cooldown elapsed.
    Expired,
    /// Breaker reset by the player.
    Reset,
    /// Breach defended in time.
    Repelled,
    /// Breach timer ran out; integrity took the hit.
    Breached,
    /// Breach timer ran out and integrity hit zero.
    Collapsed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    Log {
        tag: LogTag,
        text: String,
    },
    Cue {
        cue: Cue,
    },

    // ── Ledger ──────────────────────────────────────────────────
    UpgradePurchased {
        upgrade_id: String,
        count: u32,
        cost: f64,
    },
    UpgradeSold {
        upgrade_id: String,
        count: u32,
        refund: f64,
    },
    Exchanged {
        amount: f64,
        currency: f64,
        label: String,
    },
    IntegrityRepaired {
        restored: f64,
        cost: f64,
    },
    HeatPurged {
        heat: f64,
        accumulated_lost: f64,
    },
    OverclockStarted {
        until: Timestamp,
    },
    OverclockEnded,

    // ── Crisis ──────────────────────────────────────────────────
    CrisisStarted {
        crisis: CrisisKind,
    },
    CrisisEnded {
        crisis: CrisisKind,
        outcome: CrisisOutcome,
    },
    NodeAnnexed {
        node_id: String,
        cost: f64,
    },
    RaidStarted {
        node_id: String,
        deadline: Timestamp,
    },
    RaidResolved {
        node_id: String,
        response: Option<RaidResponse>,
        success: bool,
    },

    // ── Progression ─────────────────────────────────────────────
    RankUp {
        rank: u32,
    },
    PerkUnlocked {
        perk_id: String,
    },
    Transcended {
        transcendence: u32,
        prestige_gained: u64,
        new_run_id: RunId,
    },

    // ── Narrative ───────────────────────────────────────────────
    NarrativePresented {
        event_id: String,
        chain_id: Option<String>,
    },
    NarrativeResolved {
        event_id: String,
        choice_id: String,
    },
    ChainScheduled {
        chain_id: String,
        part_id: String,
        unlock_at: Timestamp,
    },
    ChainClosed {
        chain_id: String,
        abandoned: bool,
    },
    StageAdvanced {
        stage: u32,
    },
    FactionChosen {
        faction: Faction,
    },
    EndingReached {
        ending: Ending,
    },

    // ── Signals ─────────────────────────────────────────────────
    RivalMessage {
        message_id: String,
        sender: String,
        text: String,
    },
    DataLogUnlocked {
        entry_id: String,
        title: String,
    },

    // ── Persistence ─────────────────────────────────────────────
    OfflineProgress {
        elapsed_secs: f64,
        gained: f64,
    },
}

impl SimEvent {
    pub fn log(tag: LogTag, text: impl Into<String>) -> Self {
        Self::Log { tag, text: text.into() }
    }

    pub fn cue(cue: Cue) -> Self {
        Self::Cue { cue }
    }

    /// Stable string name for the variant. Used for the event_type
    /// column of the journal.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Log { .. }                => "log",
            Self::Cue { .. }                => "cue",
            Self::UpgradePurchased { .. }   => "upgrade_purchased",
            Self::UpgradeSold { .. }        => "upgrade_sold",
            Self::Exchanged { .. }          => "exchanged",
            Self::IntegrityRepaired { .. }  => "integrity_repaired",
            Self::HeatPurged { .. }         => "heat_purged",
            Self::OverclockStarted { .. }   => "overclock_started",
            Self::OverclockEnded            => "overclock_ended",
            Self::CrisisStarted { .. }      => "crisis_started",
            Self::CrisisEnded { .. }        => "crisis_ended",
            Self::NodeAnnexed { .. }        => "node_annexed",
            Self::RaidStarted { .. }        => "raid_started",
            Self::RaidResolved { .. }       => "raid_resolved",
            Self::RankUp { .. }             => "rank_up",
            Self::PerkUnlocked { .. }       => "perk_unlocked",
            Self::Transcended { .. }        => "transcended",
            Self::NarrativePresented { .. } => "narrative_presented",
            Self::NarrativeResolved { .. }  => "narrative_resolved",
            Self::ChainScheduled { .. }     => "chain_scheduled",
            Self::ChainClosed { .. }        => "chain_closed",
            Self::StageAdvanced { .. }      => "stage_advanced",
            Self::FactionChosen { .. }      => "faction_chosen",
            Self::EndingReached { .. }      => "ending_reached",
            Self::RivalMessage { .. }       => "rival_message",
            Self::DataLogUnlocked { .. }    => "datalog_unlocked",
            Self::OfflineProgress { .. }    => "offline_progress",
        }
    }
}

/// A journaled event as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub tick: Tick,
    /// Stage or intent that emitted the event.
    pub subsystem: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized SimEvent
}
