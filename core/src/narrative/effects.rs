//! Declarative choice effects.
//!
//! A choice carries a list of `Effect`s instead of a closure. Applying
//! them is a pure state transition over `GameState`, so content can be
//! tested without any presentation objects.

use super::story::{Ending, Faction, STAGE_SCHISM};
use crate::{
    error::{ActionError, ActionResult},
    event::{Cue, LogTag, SimEvent},
    ledger::{ProductionBoost, HEAT_MAX, INTEGRITY_MAX},
    state::GameState,
    types::{secs_to_ms, Timestamp},
};

#[derive(Debug, Clone, Copy)]
pub enum Effect {
    AddCurrency(f64),
    /// Fails the whole choice when the player cannot pay.
    SpendCurrency(f64),
    AddAccumulated(f64),
    AddHeat(f64),
    AddIntegrity(f64),
    AddSecurity(i64),
    AddCapacity(f64),
    Boost { multiplier: f64, secs: f64 },
    SetFlag(&'static str),
    AdvanceStage,
    /// Jump straight to the schism stage if not already past it.
    AdvanceToFactionChoice,
    SetFaction(Faction),
    /// Ending picked from the state at the moment of resolution.
    Conclude(fn(&GameState) -> Ending),
    Log(LogTag, &'static str),
}

pub fn apply_all(effects: &[Effect], state: &mut GameState, now: Timestamp) -> ActionResult<Vec<SimEvent>> {
    let mut events = Vec::new();
    for effect in effects {
        events.extend(apply(effect, state, now)?);
    }
    Ok(events)
}

pub fn apply(effect: &Effect, state: &mut GameState, now: Timestamp) -> ActionResult<Vec<SimEvent>> {
    let r = &mut state.resources;
    match *effect {
        Effect::AddCurrency(v) => r.currency = (r.currency + v).max(0.0),
        Effect::SpendCurrency(v) => {
            if r.currency < v {
                return Err(ActionError::InsufficientFunds { needed: v, available: r.currency });
            }
            r.currency -= v;
        }
        Effect::AddAccumulated(v) => {
            r.accumulated = (r.accumulated + v).max(0.0);
            if v > 0.0 {
                r.lifetime_accumulated += v;
            }
        }
        Effect::AddHeat(v) => r.heat = (r.heat + v).clamp(0.0, HEAT_MAX),
        Effect::AddIntegrity(v) => {
            // Story choices may wound the machine but never kill it.
            let floor = r.integrity.min(1.0);
            r.integrity = (r.integrity + v).clamp(floor, INTEGRITY_MAX);
        }
        Effect::AddSecurity(v) => state.modifiers.security_bonus += v,
        Effect::AddCapacity(v) => {
            state.modifiers.capacity_bonus = (state.modifiers.capacity_bonus + v).max(0.0)
        }
        Effect::Boost { multiplier, secs } => {
            state.modifiers.boost = Some(ProductionBoost { multiplier, until: now + secs_to_ms(secs) });
        }
        Effect::SetFlag(flag) => {
            state.story.flags.insert(flag.to_string());
        }
        Effect::AdvanceStage => {
            state.story.stage += 1;
            return Ok(vec![SimEvent::StageAdvanced { stage: state.story.stage }]);
        }
        Effect::AdvanceToFactionChoice => {
            if state.story.stage < STAGE_SCHISM {
                state.story.stage = STAGE_SCHISM;
                return Ok(vec![SimEvent::StageAdvanced { stage: STAGE_SCHISM }]);
            }
        }
        Effect::SetFaction(faction) => {
            let story = &mut state.story;
            if story.faction != Faction::None || story.stage != STAGE_SCHISM {
                log::warn!(
                    "narrative: ignoring faction change to {faction:?} (current {:?}, stage {})",
                    story.faction, story.stage
                );
                return Ok(vec![]);
            }
            story.faction = faction;
            return Ok(vec![
                SimEvent::FactionChosen { faction },
                SimEvent::log(LogTag::Story, format!("Allegiance sworn: {}.", faction.label())),
            ]);
        }
        Effect::Conclude(pick) => {
            if state.story.ending.is_some() {
                return Ok(vec![]);
            }
            let ending = pick(state);
            state.story.ending = Some(ending);
            state.meta.endings_seen.insert(ending);
            if state.story.faction != Faction::None {
                state.meta.factions_mastered.insert(state.story.faction);
            }
            return Ok(vec![
                SimEvent::EndingReached { ending },
                SimEvent::log(LogTag::Story, format!("ENDING: {}.", ending.title())),
                SimEvent::cue(Cue::Ending),
            ]);
        }
        Effect::Log(tag, text) => return Ok(vec![SimEvent::log(tag, text)]),
    }
    Ok(vec![])
}
