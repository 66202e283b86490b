//! Deterministic simulation core for an idle "rogue AI" game.
//!
//! The engine owns all state; callers drive it with `tick(dt)` and
//! player intents, and read back events plus a read-only `GameState`.

pub mod catalog;
pub mod clock;
pub mod command;
pub mod config;
pub mod crisis;
pub mod datalog;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod narrative;
pub mod progression;
pub mod rival;
pub mod rng;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod subsystem;
pub mod types;

pub use engine::SimEngine;
pub use error::{ActionError, ActionResult, SimError, SimResult};
