use thiserror::Error;

/// Rejections of player intents. These are expected, frequent and
/// recoverable: the presentation layer decides how to surface them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Insufficient funds: need {needed:.2}, have {available:.2}")]
    InsufficientFunds { needed: f64, available: f64 },

    #[error("Nothing to sell for upgrade '{upgrade_id}'")]
    NothingToSell { upgrade_id: String },

    #[error("Breaker still over capacity: draw {draw:.1} > capacity {capacity:.1}")]
    StillOverCapacity { draw: f64, capacity: f64 },

    #[error("Unknown choice '{choice_id}' for event '{event_id}'")]
    UnknownChoice { event_id: String, choice_id: String },

    /// Never returned by the crisis triggers (a duplicate trigger is a
    /// no-op); kept so callers can match the full taxonomy.
    #[error("Crisis already active")]
    CrisisAlreadyActive,

    #[error("Cannot {action}: {reason}")]
    InvalidTransition { action: &'static str, reason: String },

    #[error("Unknown {kind} '{id}'")]
    UnknownId { kind: &'static str, id: String },

    #[error("{what} is locked: {reason}")]
    Locked { what: String, reason: String },
}

impl ActionError {
    pub(crate) fn invalid(action: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidTransition { action, reason: reason.into() }
    }

    pub(crate) fn unknown(kind: &'static str, id: impl Into<String>) -> Self {
        Self::UnknownId { kind, id: id.into() }
    }
}

pub type ActionResult<T> = Result<T, ActionError>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Engine is paused")]
    EnginePaused,

    #[error("Invalid tick delta: {0}")]
    InvalidDelta(f64),

    #[error("Save schema {found} is newer than supported schema {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;
