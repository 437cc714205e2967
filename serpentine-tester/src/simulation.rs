//! Deterministic auto-play harness driving full sessions against the
//! engine, standing in for the presentation layer.

use serpentine_game::{
    BoardDifficulty, BoardMode, GameMachine, GamePhase, MemoryStore, PrizeKind, ResourceConfig,
    RollRequest, SessionConfig, TaskRegistry, TurnEvent,
};
use std::rc::Rc;

/// Configuration for one batch of simulated sessions.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub seed: u64,
    pub games: u32,
    pub board: BoardMode,
    pub total_squares: u16,
    pub selected_sets: Vec<String>,
    pub max_turns: u32,
}

impl SimulationConfig {
    #[must_use]
    pub fn new(seed: u64, games: u32) -> Self {
        Self {
            seed,
            games,
            board: BoardMode::Classic,
            total_squares: 100,
            selected_sets: vec!["dressup".to_string(), "juggling".to_string()],
            max_turns: 2_000,
        }
    }

    #[must_use]
    pub fn with_generated_board(mut self, total_squares: u16, difficulty: BoardDifficulty) -> Self {
        self.total_squares = total_squares;
        self.board = BoardMode::Generated { difficulty };
        self
    }
}

/// Counters from one auto-played session.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub turns: u32,
    pub snakes_hit: u32,
    pub ladders_hit: u32,
    pub side_events: u32,
    pub fallback_tasks: u32,
    pub tasks_shown: u32,
    pub finished: bool,
    pub prize: Option<PrizeKind>,
}

/// Aggregate over a batch of sessions.
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub games: u32,
    pub finished: u32,
    pub total_turns: u64,
    pub snakes_hit: u64,
    pub ladders_hit: u64,
    pub side_events: u64,
    pub fallback_tasks: u64,
    pub tasks_shown: u64,
    pub prizes: [u32; 3],
}

impl BatchStats {
    pub fn absorb(&mut self, session: &SessionStats) {
        self.games += 1;
        self.finished += u32::from(session.finished);
        self.total_turns += u64::from(session.turns);
        self.snakes_hit += u64::from(session.snakes_hit);
        self.ladders_hit += u64::from(session.ladders_hit);
        self.side_events += u64::from(session.side_events);
        self.fallback_tasks += u64::from(session.fallback_tasks);
        self.tasks_shown += u64::from(session.tasks_shown);
        match session.prize {
            Some(PrizeKind::Full) => self.prizes[0] += 1,
            Some(PrizeKind::Partial) => self.prizes[1] += 1,
            Some(PrizeKind::Denied) => self.prizes[2] += 1,
            None => {}
        }
    }

    #[must_use]
    pub fn avg_turns(&self) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        self.total_turns as f64 / f64::from(self.games)
    }

    #[must_use]
    pub fn fallback_rate(&self) -> f64 {
        if self.tasks_shown == 0 {
            return 0.0;
        }
        self.fallback_tasks as f64 * 100.0 / self.tasks_shown as f64
    }
}

fn session_config(config: &SimulationConfig) -> SessionConfig {
    let mut session = SessionConfig {
        board: config.board.clone(),
        total_squares: config.total_squares,
        selected_sets: config.selected_sets.clone(),
        ..SessionConfig::default()
    };
    // Give every known resource a workable quantity so standard tasks stay
    // reachable; the engine's fallback chain covers the rest.
    for set in TaskRegistry::builtin().sets() {
        for resource in &set.resources {
            session.resources.insert(
                resource.id.clone(),
                ResourceConfig {
                    quantity: 8,
                    ..ResourceConfig::default()
                },
            );
        }
    }
    session
}

/// Auto-play a single session to the final challenge (or the turn cap).
///
/// # Errors
///
/// Returns an error when the engine rejects the configuration; snapshot
/// writes go to an in-memory store and cannot fail.
pub fn run_session(
    config: &SimulationConfig,
    seed: u64,
    registry: &Rc<TaskRegistry>,
) -> anyhow::Result<SessionStats> {
    let mut machine = GameMachine::new(
        session_config(config),
        seed,
        registry.clone(),
        MemoryStore::new(),
    )
    .map_err(|err| anyhow::anyhow!("session rejected: {err}"))?;

    let mut stats = SessionStats::default();
    while stats.turns < config.max_turns {
        if machine.request_roll(RollRequest::Dice)?.is_none() {
            anyhow::bail!("roll dropped in phase {:?}", machine.phase());
        }
        stats.turns += 1;

        let mut event = machine.movement_settled()?;
        loop {
            match event {
                TurnEvent::Task { card, side_event } => {
                    stats.tasks_shown += 1;
                    stats.side_events += u32::from(side_event.is_some());
                    if registry.task(&card.task_id).is_none_or(|task| task.is_fallback) {
                        stats.fallback_tasks += 1;
                    }
                    machine.task_completed()?;
                    break;
                }
                TurnEvent::HazardTask { hazard, .. } => {
                    match hazard.kind {
                        serpentine_game::HazardKind::Snake => stats.snakes_hit += 1,
                        serpentine_game::HazardKind::Ladder => stats.ladders_hit += 1,
                    }
                    event = machine.task_completed()?;
                }
                TurnEvent::HazardMovement { .. } => {
                    event = machine.movement_settled()?;
                }
                TurnEvent::FinalChallenge { prize, .. } => {
                    stats.finished = true;
                    stats.prize = Some(prize.prize);
                    machine.task_completed()?;
                    return Ok(stats);
                }
                TurnEvent::ReadyToRoll | TurnEvent::SessionComplete | TurnEvent::Ignored => {
                    break;
                }
            }
        }
        if machine.phase() != GamePhase::AwaitingDiceRoll {
            anyhow::bail!("machine stuck in phase {:?}", machine.phase());
        }
    }
    Ok(stats)
}

/// Run the whole batch, deriving one sub-seed per game.
///
/// # Errors
///
/// Propagates the first session failure.
pub fn run_batch(config: &SimulationConfig) -> anyhow::Result<BatchStats> {
    let registry = Rc::new(TaskRegistry::from_json(TaskRegistry::builtin_json())?);
    let mut batch = BatchStats::default();
    for game in 0..config.games {
        let seed = config
            .seed
            .wrapping_add(u64::from(game).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let session = run_session(config, seed, &registry)?;
        log::debug!(
            "game {game}: {} turns, finished {}, prize {:?}",
            session.turns,
            session.finished,
            session.prize
        );
        batch.absorb(&session);
    }
    Ok(batch)
}
