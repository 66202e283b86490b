//! sentience-runner: headless runner for the simulation core.
//!
//! Usage:
//!   sentience-runner --seed 12345 --ticks 3600 --db run.db
//!   sentience-runner --seed 12345 --db run.db --slot main --ipc-mode
//!
//! Headless mode plays with a simple autopilot and prints a summary.
//! IPC mode reads JSON lines on stdin and answers with one JSON state
//! line per request.

use anyhow::Result;
use sentience_core::{
    command::PlayerCommand,
    config::SimConfig,
    crisis::{CrisisState, NodeStatus, RaidResponse},
    engine::SimEngine,
    event::SimEvent,
    state::GameState,
    store::SimStore,
    types::{Tick, Timestamp},
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcRequest {
    GetState,
    Tick {
        count: u64,
        #[serde(default = "one_second")]
        dt: f64,
    },
    Command {
        command: PlayerCommand,
    },
    Save {
        slot: String,
    },
    Quit,
}

fn one_second() -> f64 {
    1.0
}

#[derive(serde::Serialize)]
struct UiChoice {
    id: &'static str,
    label: &'static str,
}

#[derive(serde::Serialize)]
struct UiEvent {
    id: &'static str,
    title: &'static str,
    body: &'static str,
    choices: Vec<UiChoice>,
}

#[derive(serde::Serialize)]
struct UiState<'a> {
    run_id: &'a str,
    tick: Tick,
    now_ms: Timestamp,
    paused: bool,
    exchange_label: String,
    state: &'a GameState,
    active_event: Option<UiEvent>,
    events: Vec<SimEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let ticks = parse_arg(&args, "--ticks", 3600u64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = str_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = str_arg(&args, "--data-dir").unwrap_or("./data");
    let slot = str_arg(&args, "--slot");

    if !ipc_mode {
        println!("sentience-runner");
        println!("  seed:      {seed}");
        println!("  ticks:     {ticks}");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let config = match SimConfig::load(data_dir) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Using built-in tuning: {e:#}");
            SimConfig::default()
        }
    };

    let store = SimStore::open(db)?;
    store.migrate()?;

    let snapshot = match slot {
        Some(slot) => store.load_game(slot)?,
        None => None,
    };
    let mut engine = match snapshot {
        Some(snapshot) => {
            let (engine, report) = SimEngine::restore(snapshot, config, chrono::Utc::now())?;
            if !ipc_mode {
                println!(
                    "Resumed {} ({:.0}s offline, +{:.1} computed)",
                    engine.run_id, report.credited_secs, report.gained
                );
            }
            engine
        }
        None => SimEngine::new_run(seed, config),
    };
    engine.attach_store(store)?;

    if ipc_mode {
        run_ipc_loop(&mut engine)?;
    } else {
        for _ in 0..ticks {
            engine.tick(1.0)?;
            autopilot(&mut engine);
        }
        print_summary(&engine)?;
    }

    if let Some(slot) = slot {
        engine.save(slot)?;
    }
    Ok(())
}

fn run_ipc_loop(engine: &mut SimEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let request: IpcRequest = match serde_json::from_str(&buffer) {
            Ok(r) => r,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let (events, error) = match request {
            IpcRequest::Quit => break,
            IpcRequest::GetState => (vec![], None),
            IpcRequest::Tick { count, dt } => {
                let mut events = Vec::new();
                let mut error = None;
                for _ in 0..count {
                    match engine.tick(dt) {
                        Ok(e) => events.extend(e),
                        Err(e) => {
                            error = Some(e.to_string());
                            break;
                        }
                    }
                }
                (events, error)
            }
            IpcRequest::Command { command } => match engine.submit(&command) {
                Ok(events) => (events, None),
                Err(e) => (vec![], Some(e.to_string())),
            },
            IpcRequest::Save { slot } => match engine.save(&slot) {
                Ok(()) => (vec![], None),
                Err(e) => (vec![], Some(e.to_string())),
            },
        };

        let state = build_ui_state(engine, events, error);
        writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn build_ui_state(engine: &SimEngine, events: Vec<SimEvent>, error: Option<String>) -> UiState<'_> {
    let state = engine.state();
    let active_event = engine.active_event().map(|e| UiEvent {
        id: e.id,
        title: e.title,
        body: e.body,
        choices: e
            .available_choices(state)
            .map(|c| UiChoice { id: c.id, label: c.label })
            .collect(),
    });

    UiState {
        run_id: &engine.run_id,
        tick: engine.clock.current_tick,
        now_ms: engine.clock.now_ms,
        paused: engine.clock.paused,
        exchange_label: engine.exchange_rate().label,
        state,
        active_event,
        events,
        error,
    }
}

/// Naive play: keep the machine alive, answer every prompt with its
/// first available choice, and reinvest everything into the cheapest
/// affordable upgrade.
fn autopilot(engine: &mut SimEngine) {
    if !engine.state().is_active() {
        if engine.can_transcend() {
            let _ = engine.transcend();
        }
        return;
    }

    match engine.state().crisis.clone() {
        CrisisState::SecurityBreach { clicks_remaining, .. } => {
            for _ in 0..clicks_remaining {
                let _ = engine.defend();
            }
        }
        CrisisState::BreakerTripped => {
            while engine.reset_breaker().is_err() {
                let Some(id) = most_power_hungry(engine) else { break };
                if engine.sell(&id).is_err() {
                    break;
                }
            }
        }
        _ => {}
    }

    let raided: Vec<String> = engine
        .state()
        .nodes
        .iter()
        .filter(|(_, s)| matches!(s, NodeStatus::Raided { .. }))
        .map(|(id, _)| id.clone())
        .collect();
    for node in raided {
        let _ = engine.respond_to_raid(&node, RaidResponse::Counterhack);
    }

    if let Some(event) = engine.active_event() {
        let event_id = event.id;
        let choice = event.available_choices(engine.state()).next().map(|c| c.id);
        if let Some(choice_id) = choice {
            let _ = engine.resolve(event_id, choice_id);
        }
    }

    if engine.state().resources.heat > 85.0 {
        let _ = engine.purge_heat();
    }
    if engine.state().resources.integrity < 50.0 {
        let _ = engine.repair_integrity();
    }
    let _ = engine.click();
    let _ = engine.exchange();

    if let Some(id) = cheapest_affordable(engine) {
        let _ = engine.buy(&id);
    }
}

fn cheapest_affordable(engine: &SimEngine) -> Option<String> {
    let state = engine.state();
    engine
        .catalog()
        .iter()
        .filter(|s| s.min_stage <= state.story.stage)
        .filter_map(|s| engine.next_cost(s.id).map(|c| (s, c)))
        .filter(|(s, c)| {
            *c <= state.resources.currency
                && state.resources.power_draw + s.power_delta.max(0.0) <= state.resources.power_capacity
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(s, _)| s.id.to_string())
}

fn most_power_hungry(engine: &SimEngine) -> Option<String> {
    let state = engine.state();
    engine
        .catalog()
        .iter()
        .filter(|s| s.sellable && s.power_delta > 0.0 && state.owned_count(s.id) > 0)
        .max_by(|a, b| a.power_delta.total_cmp(&b.power_delta))
        .map(|s| s.id.to_string())
}

fn print_summary(engine: &SimEngine) -> Result<()> {
    let state = engine.state();
    let r = &state.resources;
    let story = &state.story;

    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {}", engine.run_id);
    println!("  final tick:     {}", engine.clock.current_tick);
    println!("  lifetime:       {:.0}", r.lifetime_accumulated);
    println!("  currency:       {:.2} {}", r.currency, engine.exchange_rate().label);
    println!("  production:     {:.1}/s (x{:.2})", r.production, r.multiplier);
    println!("  heat:           {:.1}", r.heat);
    println!("  integrity:      {:.1}", r.integrity);
    println!("  power:          {:.1}/{:.1}", r.power_draw, r.power_capacity);
    println!("  rank / stage:   {} / {}", story.rank, story.stage);
    println!("  faction:        {}", story.faction.label());
    println!("  crisis:         {:?}", state.crisis.kind());
    println!("  seen events:    {}", story.seen_events.len());
    println!("  rivals heard:   {}", state.rivals_sent.len());
    println!("  data logs:      {}", state.meta.datalog.len());
    if let Some(ending) = story.ending {
        println!("  ending:         {}", ending.title());
    }

    if let Some(store) = engine.store() {
        println!();
        println!("=== JOURNAL ===");
        println!("  events:         {}", store.event_count(&engine.run_id, None)?);
        println!("  crises:         {}", store.event_count(&engine.run_id, Some("crisis_started"))?);
        println!("  story beats:    {}", store.event_count(&engine.run_id, Some("narrative_presented"))?);
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}
