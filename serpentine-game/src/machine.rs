//! Turn-phase state machine.
//!
//! Orchestrates the player-visible sequence (roll → move → hazard? → task →
//! next roll), persists a full snapshot after every transition, and resumes
//! from an arbitrary mid-sequence snapshot without re-rolling any decision.
//!
//! Movement and animation are opaque to the engine: a roll hands the
//! presentation a movement request, and the logical turn blocks until the
//! matching settle call arrives. A roll requested while movement is in
//! flight is dropped, not queued.

use log::{debug, warn};
use rand::Rng;
use std::rc::Rc;
use thiserror::Error;

use crate::board::Square;
use crate::config::{ConfigError, SessionConfig};
use crate::constants::{DIE_SIDES, SESSION_SLOT};
use crate::content::TaskCard;
use crate::registry::{TaskMetadata, TaskRegistry};
use crate::seed::RngBundle;
use crate::selector::{
    self, FinalPrize, SelectionContext, select_final_task, select_hazard_task, select_next_task,
};
use crate::session::{ActiveTask, GamePhase, PendingHazard, RollOutcome, SessionState};
use crate::side_events::{SideEvent, roll_side_event};
use crate::snapshot::SnapshotStore;

/// How a movement target is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollRequest {
    /// A real die roll, 1..=6.
    Dice,
    /// Test-jump override to an absolute square, clamped to the finish.
    JumpTo(Square),
}

/// What the presentation layer is told after each engine step.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// The signal was dropped (wrong phase or movement already in flight).
    Ignored,
    /// Turn finished; the next roll may be requested.
    ReadyToRoll,
    /// Show a normal task, with the turn's side event if one fired.
    Task {
        card: TaskCard,
        side_event: Option<SideEvent>,
    },
    /// Show a hazard-entry task; traversal follows completion.
    HazardTask {
        card: TaskCard,
        hazard: PendingHazard,
    },
    /// Animate the hazard traversal, then report the settle.
    HazardMovement { from: Square, to: Square },
    /// Show the final challenge.
    FinalChallenge { card: TaskCard, prize: FinalPrize },
    /// The final challenge is done; the session is complete.
    SessionComplete,
}

/// Errors from constructing a session.
#[derive(Debug, Error)]
pub enum EngineError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("snapshot store: {0}")]
    Store(#[source] E),
}

/// In-flight movement, re-armed on restore for hazard traversals. Not
/// persisted: the phase only advances at settle, so a crash mid-flight
/// resumes at the pre-movement phase.
#[derive(Debug, Clone, Copy)]
struct Movement {
    target: Square,
    traversal: bool,
}

/// The turn-phase state machine. Owns the session state and its
/// collaborators; all mutation flows through the signal methods.
#[derive(Debug)]
pub struct GameMachine<S: SnapshotStore> {
    state: SessionState,
    registry: Rc<TaskRegistry>,
    rng: RngBundle,
    store: S,
    movement: Option<Movement>,
}

impl<S: SnapshotStore> GameMachine<S> {
    /// Start a fresh session: validate the configuration, build the board,
    /// and write the initial snapshot.
    ///
    /// # Errors
    ///
    /// Returns a configuration error before any state is created, or a
    /// store error from the initial checkpoint.
    pub fn new(
        mut config: SessionConfig,
        seed: u64,
        registry: Rc<TaskRegistry>,
        store: S,
    ) -> Result<Self, EngineError<S::Error>> {
        config.sanitize();
        config.validate(&registry)?;
        let mut rng = RngBundle::from_user_seed(seed);
        let board = config.build_board(rng.board());
        let state = SessionState::new(config, seed, board);
        let mut machine = Self {
            state,
            registry,
            rng,
            store,
            movement: None,
        };
        machine.checkpoint().map_err(EngineError::Store)?;
        Ok(machine)
    }

    /// Resume from the persisted snapshot, replaying cached selections.
    /// Missing replay state degrades: a task-bound phase with no stored
    /// task resets the turn to `awaiting_dice_roll`, losing only the
    /// in-progress task.
    ///
    /// # Errors
    ///
    /// Returns a store error when the snapshot cannot be read.
    pub fn resume(registry: Rc<TaskRegistry>, store: S) -> Result<Option<Self>, S::Error> {
        let Some(mut state) = store.load(SESSION_SLOT)? else {
            return Ok(None);
        };

        if state.phase.is_task_bound() && state.active_task.is_none() {
            warn!("snapshot lost its active task; resetting turn");
            state.phase = GamePhase::AwaitingDiceRoll;
            state.pending_hazard = None;
            state.side_event = None;
        }
        if state.phase == GamePhase::AwaitingHazardMovement && state.pending_hazard.is_none() {
            warn!("snapshot lost its pending hazard; resetting turn");
            state.phase = GamePhase::AwaitingDiceRoll;
            state.side_event = None;
        }
        // Replayed selections come from the snapshot, never from fresh
        // draws: the streams restart at their persisted positions.
        let rng = RngBundle::restore(state.seed, state.rng_counters);
        let movement = match (state.phase, state.pending_hazard) {
            (GamePhase::AwaitingHazardMovement, Some(pending)) => Some(Movement {
                target: pending.to,
                traversal: true,
            }),
            _ => None,
        };
        Ok(Some(Self {
            state,
            registry,
            rng,
            store,
            movement,
        }))
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub const fn phase(&self) -> GamePhase {
        self.state.phase
    }

    /// The task the presentation should currently display, if any.
    #[must_use]
    pub fn active_task(&self) -> Option<&ActiveTask> {
        self.state.active_task.as_ref()
    }

    /// Consume the machine, returning the final session state.
    #[must_use]
    pub fn into_state(self) -> SessionState {
        self.state
    }

    /// Request a die roll or test jump. Returns the movement request for
    /// the presentation to animate, or `None` when the request is dropped
    /// (wrong phase, or a movement is already in flight for this turn).
    ///
    /// # Errors
    ///
    /// Returns a store error from the checkpoint.
    pub fn request_roll(&mut self, request: RollRequest) -> Result<Option<RollOutcome>, S::Error> {
        if self.state.phase != GamePhase::AwaitingDiceRoll || self.movement.is_some() {
            debug!("roll request dropped in phase {:?}", self.state.phase);
            return Ok(None);
        }
        let finish = self.state.board.finish();
        let from = self.state.position;
        self.state.turn_count += 1;

        let outcome = match request {
            RollRequest::Dice => {
                let rolled = self.rng.dice().gen_range(1..=DIE_SIDES);
                let to = (from + Square::from(rolled)).min(finish);
                RollOutcome {
                    description: format!("Dice: {rolled}"),
                    rolled: Some(rolled),
                    from,
                    to,
                }
            }
            RollRequest::JumpTo(square) => {
                let to = square.clamp(1, finish);
                RollOutcome {
                    description: format!("Jump to: {to}"),
                    rolled: None,
                    from,
                    to,
                }
            }
        };
        self.state.last_roll = Some(outcome.clone());
        self.movement = Some(Movement {
            target: outcome.to,
            traversal: false,
        });
        self.checkpoint()?;
        Ok(Some(outcome))
    }

    /// Report that the animated movement reached its target. Resolves the
    /// settle: side event, hazard entry, normal task, or final challenge.
    ///
    /// # Errors
    ///
    /// Returns a store error from the checkpoint.
    pub fn movement_settled(&mut self) -> Result<TurnEvent, S::Error> {
        let Some(movement) = self.movement.take() else {
            debug!("settle signal dropped; no movement in flight");
            return Ok(TurnEvent::Ignored);
        };
        self.state.position = movement.target;

        if movement.traversal {
            self.state.pending_hazard = None;
        } else {
            // Side events roll once per settle, before the main task, and
            // their inventory mutation executes exactly here.
            let ctx = SelectionContext {
                registry: self.registry.as_ref(),
                config: &self.state.config,
                inventory: &self.state.inventory,
            };
            let side_event = roll_side_event(&ctx, self.rng.side_events());
            self.state.side_event = side_event;
            if let Some(event) = self.state.side_event.as_mut() {
                event.execute(&mut self.state.inventory);
            }
        }

        if self.state.position == self.state.board.finish() {
            return self.enter_final_challenge();
        }

        if !movement.traversal
            && let Some((kind, dest)) = self.state.board.hazard_at(self.state.position)
        {
            let pending = PendingHazard {
                kind,
                from: self.state.position,
                to: dest,
            };
            let ctx = SelectionContext {
                registry: self.registry.as_ref(),
                config: &self.state.config,
                inventory: &self.state.inventory,
            };
            let task = select_hazard_task(&ctx, kind, self.rng.tasks());
            let card = render_card(&self.state.config, task);
            self.state.pending_hazard = Some(pending);
            self.state.active_task = Some(ActiveTask {
                card: card.clone(),
                progress: 0,
                prize: None,
            });
            self.state.phase = GamePhase::AwaitingHazardTask;
            self.checkpoint()?;
            return Ok(TurnEvent::HazardTask {
                card,
                hazard: pending,
            });
        }

        let ctx = SelectionContext {
            registry: self.registry.as_ref(),
            config: &self.state.config,
            inventory: &self.state.inventory,
        };
        let task = select_next_task(&ctx, self.rng.tasks());
        let card = render_card(&self.state.config, task);
        let task = task.clone();
        self.state.record_task_presented(&task);
        self.state.active_task = Some(ActiveTask {
            card: card.clone(),
            progress: 0,
            prize: None,
        });
        self.state.phase = GamePhase::AwaitingNormalTask;
        self.checkpoint()?;
        Ok(TurnEvent::Task {
            card,
            side_event: self.state.side_event.clone(),
        })
    }

    /// Report that the player completed the displayed task.
    ///
    /// # Errors
    ///
    /// Returns a store error from the checkpoint.
    pub fn task_completed(&mut self) -> Result<TurnEvent, S::Error> {
        match self.state.phase {
            GamePhase::AwaitingHazardTask => {
                let Some(pending) = self.state.pending_hazard else {
                    warn!("hazard task completed with no pending hazard; resetting turn");
                    self.state.phase = GamePhase::AwaitingDiceRoll;
                    self.state.active_task = None;
                    self.checkpoint()?;
                    return Ok(TurnEvent::ReadyToRoll);
                };
                self.state.phase = GamePhase::AwaitingHazardMovement;
                self.state.active_task = None;
                self.movement = Some(Movement {
                    target: pending.to,
                    traversal: true,
                });
                self.checkpoint()?;
                Ok(TurnEvent::HazardMovement {
                    from: pending.from,
                    to: pending.to,
                })
            }
            GamePhase::AwaitingNormalTask => {
                self.state.phase = GamePhase::AwaitingDiceRoll;
                self.state.active_task = None;
                self.state.side_event = None;
                self.state.pending_hazard = None;
                self.checkpoint()?;
                Ok(TurnEvent::ReadyToRoll)
            }
            // The machine does not self-terminate; the final challenge is
            // the practical end.
            GamePhase::AwaitingFinalChallenge => Ok(TurnEvent::SessionComplete),
            GamePhase::AwaitingDiceRoll | GamePhase::AwaitingHazardMovement => {
                debug!("task completion dropped in phase {:?}", self.state.phase);
                Ok(TurnEvent::Ignored)
            }
        }
    }

    /// Advance the in-progress task's reveal position by one step. Each
    /// advance is externally-visible content, so it checkpoints.
    ///
    /// # Errors
    ///
    /// Returns a store error from the checkpoint.
    pub fn advance_task(&mut self) -> Result<usize, S::Error> {
        let Some(active) = self.state.active_task.as_mut() else {
            return Ok(0);
        };
        let last_step = active.card.content.step_count().saturating_sub(1);
        active.progress = (active.progress + 1).min(last_step);
        let progress = active.progress;
        self.checkpoint()?;
        Ok(progress)
    }

    fn enter_final_challenge(&mut self) -> Result<TurnEvent, S::Error> {
        // Prize first, independent of which task is chosen.
        let prize = selector::draw_final_prize(&self.state.config, self.rng.prize());
        let ctx = SelectionContext {
            registry: self.registry.as_ref(),
            config: &self.state.config,
            inventory: &self.state.inventory,
        };
        let task = select_final_task(&ctx, self.rng.tasks());
        let card = render_card(&self.state.config, task);
        self.state.pending_hazard = None;
        self.state.active_task = Some(ActiveTask {
            card: card.clone(),
            progress: 0,
            prize: Some(prize.clone()),
        });
        self.state.phase = GamePhase::AwaitingFinalChallenge;
        self.checkpoint()?;
        Ok(TurnEvent::FinalChallenge { card, prize })
    }

    /// Re-persist the current snapshot without changing any state.
    ///
    /// # Errors
    ///
    /// Returns a store error when the write fails.
    pub fn persist(&mut self) -> Result<(), S::Error> {
        self.checkpoint()
    }

    /// Write the full snapshot synchronously before control returns.
    fn checkpoint(&mut self) -> Result<(), S::Error> {
        self.state.rng_counters = self.rng.counters();
        self.store.save(SESSION_SLOT, &self.state)
    }
}

/// Render a task's content with its difficulty-scaled amount substituted.
fn render_card(config: &SessionConfig, task: &TaskMetadata) -> TaskCard {
    let amount = task.amount.map(|amount| {
        let difficulty = task
            .resource
            .as_deref()
            .map(|resource| config.resource(resource).difficulty)
            .unwrap_or_default();
        amount.for_difficulty(difficulty)
    });
    TaskCard::render(&task.id, &task.content, amount)
}
