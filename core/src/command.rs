use crate::crisis::RaidResponse;
use serde::{Deserialize, Serialize};

/// Every player intent, as it arrives from the presentation layer or
/// the runner's IPC loop. Variants are only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PlayerCommand {
    // ── Clock control ─────────────────────────────
    Pause,
    Resume,

    // ── Economy ───────────────────────────────────
    Click,
    Buy { upgrade_id: String },
    Sell { upgrade_id: String },
    Exchange,
    Repair,
    Purge,
    Overclock,

    // ── Crisis ────────────────────────────────────
    ResetBreaker,
    Defend,
    Annex { node_id: String },
    RespondRaid { node_id: String, response: RaidResponse },

    // ── Narrative ─────────────────────────────────
    Choose { event_id: String, choice_id: String },
    AbandonChain { chain_id: String },
    AbortAssault,
    BeginAssault,

    // ── Meta ──────────────────────────────────────
    UnlockPerk { perk_id: String },
    Transcend,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format() {
        let cmd: PlayerCommand =
            serde_json::from_str(r#"{"cmd":"respond_raid","node_id":"relay_north","response":"counterhack"}"#)
                .unwrap();
        assert_eq!(
            cmd,
            PlayerCommand::RespondRaid { node_id: "relay_north".into(), response: RaidResponse::Counterhack }
        );
        assert_eq!(serde_json::to_string(&PlayerCommand::Click).unwrap(), r#"{"cmd":"click"}"#);
    }
}
