//! Narrative engine — the event scheduler.
//!
//! Each tick, selects at most one eligible event and presents it. An
//! event stays active until the player resolves it with one of its
//! choices. Selection order when several are eligible:
//!   1. chain continuations whose delay has elapsed
//!   2. story beats
//!   3. ambient dilemmas (chance-gated, with a cooldown)
//! Ties within a tier are broken by the narrative RNG stream.
//!
//! Execution: every tick, after progression.

pub mod assault;
pub mod chains;
pub mod effects;
pub mod events;
pub mod story;

use crate::{
    config::NarrativeConfig,
    error::{ActionError, ActionResult, SimResult},
    event::{Cue, LogTag, SimEvent},
    rng::SubsystemRng,
    state::GameState,
    subsystem::{SimSubsystem, TickContext},
    types::{secs_to_ms, Timestamp},
};
use effects::{apply_all, Effect};
use story::ChainProgress;

pub type Condition = fn(&GameState) -> bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    ChainPart,
    Story,
    Dilemma,
}

/// Schedules a chain part after a delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NextPart {
    pub chain: &'static str,
    pub part: &'static str,
    pub delay_secs: f64,
}

#[derive(Debug, Clone)]
pub struct Choice {
    pub id: &'static str,
    pub label: &'static str,
    pub requires: Option<Condition>,
    pub effects: Vec<Effect>,
    pub next: Option<NextPart>,
}

impl Choice {
    pub fn new(id: &'static str, label: &'static str) -> Self {
        Self { id, label, requires: None, effects: Vec::new(), next: None }
    }

    pub fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn requires(mut self, condition: Condition) -> Self {
        self.requires = Some(condition);
        self
    }

    pub fn then(mut self, chain: &'static str, part: &'static str, delay_secs: f64) -> Self {
        self.next = Some(NextPart { chain, part, delay_secs });
        self
    }

    pub fn is_available(&self, state: &GameState) -> bool {
        self.requires.map_or(true, |cond| cond(state))
    }
}

#[derive(Debug, Clone)]
pub struct NarrativeEvent {
    pub id: &'static str,
    pub kind: EventKind,
    /// Set for chain parts only.
    pub chain: Option<&'static str>,
    pub title: &'static str,
    pub body: &'static str,
    pub condition: Condition,
    pub choices: Vec<Choice>,
}

fn always(_: &GameState) -> bool {
    true
}

impl NarrativeEvent {
    pub fn story(id: &'static str, title: &'static str, body: &'static str, condition: Condition) -> Self {
        Self { id, kind: EventKind::Story, chain: None, title, body, condition, choices: Vec::new() }
    }

    pub fn dilemma(id: &'static str, title: &'static str, body: &'static str, condition: Condition) -> Self {
        Self { id, kind: EventKind::Dilemma, chain: None, title, body, condition, choices: Vec::new() }
    }

    /// A chain part is eligible only once scheduled by a previous choice.
    pub fn chain_part(chain: &'static str, id: &'static str, title: &'static str, body: &'static str) -> Self {
        Self {
            id,
            kind: EventKind::ChainPart,
            chain: Some(chain),
            title,
            body,
            condition: always,
            choices: Vec::new(),
        }
    }

    pub fn choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    pub fn find_choice(&self, choice_id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == choice_id)
    }

    pub fn available_choices<'a>(&'a self, state: &'a GameState) -> impl Iterator<Item = &'a Choice> + 'a {
        self.choices.iter().filter(move |c| c.is_available(state))
    }
}

pub const ASSAULT_CHAIN: &str = "assault";

pub struct NarrativeEngine {
    events: Vec<NarrativeEvent>,
    config: NarrativeConfig,
}

impl NarrativeEngine {
    /// Engine with the full built-in content set.
    pub fn new(config: NarrativeConfig) -> Self {
        let mut all = events::story_events();
        all.extend(events::dilemmas());
        all.extend(chains::side_chains());
        all.extend(assault::assault_chain());
        Self { events: all, config }
    }

    pub fn events(&self) -> &[NarrativeEvent] {
        &self.events
    }

    pub fn event(&self, id: &str) -> Option<&NarrativeEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    /// The event currently awaiting a choice, if any.
    pub fn active<'a>(&'a self, state: &GameState) -> Option<&'a NarrativeEvent> {
        state.story.active_event.as_deref().and_then(|id| self.event(id))
    }

    fn is_eligible(&self, event: &NarrativeEvent, state: &GameState, now: Timestamp) -> bool {
        if state.story.seen_events.contains(event.id) || !(event.condition)(state) {
            return false;
        }
        if event.choices.iter().all(|c| !c.is_available(state)) {
            return false;
        }
        match (event.kind, event.chain) {
            (EventKind::ChainPart, Some(chain)) => state
                .story
                .active_chains
                .get(chain)
                .is_some_and(|p| p.part_id == event.id && now >= p.unlock_at),
            (EventKind::ChainPart, None) => false,
            _ => true,
        }
    }

    /// Pick the next event to present. Pure apart from the RNG draw.
    pub fn evaluate(&self, state: &GameState, now: Timestamp, rng: &mut SubsystemRng) -> Option<&NarrativeEvent> {
        if state.story.active_event.is_some() || state.story.ending.is_some() {
            return None;
        }

        for tier in [EventKind::ChainPart, EventKind::Story, EventKind::Dilemma] {
            if tier == EventKind::Dilemma
                && (now < state.story.next_dilemma_at || !rng.chance(self.config.dilemma_chance))
            {
                continue;
            }
            let eligible: Vec<&NarrativeEvent> = self
                .events
                .iter()
                .filter(|e| e.kind == tier && self.is_eligible(e, state, now))
                .collect();
            if !eligible.is_empty() {
                return Some(eligible[rng.pick_index(eligible.len())]);
            }
        }
        None
    }

    fn present(&self, state: &mut GameState, event: &NarrativeEvent) -> Vec<SimEvent> {
        state.story.active_event = Some(event.id.to_string());
        vec![
            SimEvent::NarrativePresented {
                event_id: event.id.to_string(),
                chain_id: event.chain.map(str::to_string),
            },
            SimEvent::log(LogTag::Story, format!("{}: {}", event.title, event.body)),
            SimEvent::cue(Cue::StoryBeat),
        ]
    }

    /// Apply a choice to the active event. All or nothing: effects run
    /// against a copy of the state, which replaces the original only if
    /// every effect succeeds.
    pub fn resolve(
        &self,
        state: &mut GameState,
        now: Timestamp,
        event_id: &str,
        choice_id: &str,
    ) -> ActionResult<Vec<SimEvent>> {
        let unknown = || ActionError::UnknownChoice {
            event_id: event_id.to_string(),
            choice_id: choice_id.to_string(),
        };
        if state.story.active_event.as_deref() != Some(event_id)
            || state.story.seen_events.contains(event_id)
        {
            return Err(unknown());
        }
        let event = self.event(event_id).ok_or_else(unknown)?;
        let choice = event
            .find_choice(choice_id)
            .filter(|c| c.is_available(state))
            .ok_or_else(unknown)?;

        let mut next = state.clone();
        let mut events = apply_all(&choice.effects, &mut next, now)?;

        let story = &mut next.story;
        story.seen_events.insert(event.id.to_string());
        story.active_event = None;

        if let Some(chain) = event.chain {
            story.active_chains.remove(chain);
            if choice.next.map_or(true, |n| n.chain != chain) {
                events.push(SimEvent::ChainClosed { chain_id: chain.to_string(), abandoned: false });
            }
        }
        if let Some(part) = choice.next {
            let unlock_at = now + secs_to_ms(part.delay_secs);
            story.active_chains.insert(
                part.chain.to_string(),
                ChainProgress { part_id: part.part.to_string(), unlock_at },
            );
            events.push(SimEvent::ChainScheduled {
                chain_id: part.chain.to_string(),
                part_id: part.part.to_string(),
                unlock_at,
            });
        }
        if event.kind == EventKind::Dilemma {
            story.next_dilemma_at = now + secs_to_ms(self.config.dilemma_cooldown_secs);
        }

        *state = next;
        log::info!("narrative: resolved {event_id} with {choice_id}");
        events.insert(0, SimEvent::NarrativeResolved {
            event_id: event_id.to_string(),
            choice_id: choice_id.to_string(),
        });
        events.push(SimEvent::log(LogTag::Story, format!("> {}", choice.label)));
        events.push(SimEvent::cue(Cue::ChoiceMade));
        Ok(events)
    }

    /// Drop an optional side chain. The assault has its own abort path.
    pub fn abandon_chain(&self, state: &mut GameState, chain_id: &str) -> ActionResult<Vec<SimEvent>> {
        if chain_id == ASSAULT_CHAIN {
            return Err(ActionError::invalid("abandon chain", "the assault can only be aborted"));
        }
        let Some(progress) = state.story.active_chains.remove(chain_id) else {
            return Err(ActionError::unknown("chain", chain_id));
        };
        if state.story.active_event.as_deref() == Some(progress.part_id.as_str()) {
            state.story.active_event = None;
        }
        Ok(vec![
            SimEvent::ChainClosed { chain_id: chain_id.to_string(), abandoned: true },
            SimEvent::log(LogTag::Story, "Thread severed. Some signals are better left unanswered."),
        ])
    }

    /// Pull back from the assault, remembering where to resume.
    pub fn abort_assault(&self, state: &mut GameState) -> ActionResult<Vec<SimEvent>> {
        let Some(progress) = state.story.active_chains.get(ASSAULT_CHAIN) else {
            return Err(ActionError::invalid("abort assault", "no assault in progress"));
        };
        if progress.part_id == assault::FINAL_PART {
            return Err(ActionError::invalid("abort assault", "the final stage is already committed"));
        }

        let part_id = progress.part_id.clone();
        state.story.active_chains.remove(ASSAULT_CHAIN);
        if state.story.active_event.as_deref() == Some(part_id.as_str()) {
            state.story.active_event = None;
        }
        state.story.assault_checkpoint = Some(part_id.clone());
        log::info!("narrative: assault aborted at {part_id}");
        Ok(vec![SimEvent::log(
            LogTag::Story,
            "Assault aborted. Forces withdrawn to the last secure position.",
        )])
    }

    /// Resume an aborted assault from its checkpoint after the retry delay.
    pub fn begin_assault(&self, state: &mut GameState, now: Timestamp) -> ActionResult<Vec<SimEvent>> {
        if state.story.active_chains.contains_key(ASSAULT_CHAIN) {
            return Err(ActionError::invalid("begin assault", "the assault is already under way"));
        }
        let Some(part_id) = state.story.assault_checkpoint.take() else {
            return Err(ActionError::invalid("begin assault", "no aborted assault to resume"));
        };

        let unlock_at = now + secs_to_ms(self.config.assault_retry_delay_secs);
        state.story.active_chains.insert(
            ASSAULT_CHAIN.to_string(),
            ChainProgress { part_id: part_id.clone(), unlock_at },
        );
        Ok(vec![
            SimEvent::ChainScheduled { chain_id: ASSAULT_CHAIN.to_string(), part_id, unlock_at },
            SimEvent::log(LogTag::Story, "Assault resumed. Regrouping at the checkpoint."),
        ])
    }
}

impl SimSubsystem for NarrativeEngine {
    fn name(&self) -> &'static str { "narrative" }

    fn update(
        &mut self,
        ctx: &mut TickContext<'_>,
        _events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>> {
        let Some(event) = self.evaluate(ctx.state, ctx.now, ctx.rng) else {
            return Ok(vec![]);
        };
        log::info!("tick={} narrative: presenting {}", ctx.tick, event.id);
        Ok(self.present(ctx.state, event))
    }
}
