//! Async driver for one round
//!
//! The round task owns its [`Game`] outright. Commands arrive over a channel
//! and are applied between ticks, so a command never interleaves with a tick.
//! After every step the task emits a snapshot, and the terminal result once.

use crate::game::{Action, Game, GameResult, GameSnapshot};
use crate::room::PlayerState;
use crate::scheduler::Scheduler;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Commands to a running round
#[derive(Debug)]
pub enum Control {
    Act(Action),
    /// Echo of our own pushed state from the store
    OwnEcho(Box<PlayerState>),
    Stop,
}

/// Output of a running round
#[derive(Debug, Clone)]
pub enum RoundEvent {
    Snapshot(Box<GameSnapshot>),
    Ended(GameResult),
}

/// Handle to a spawned round task
#[derive(Debug)]
pub struct RoundHandle {
    control: mpsc::UnboundedSender<Control>,
    task: JoinHandle<Game>,
}

impl RoundHandle {
    /// Spawn a round on the current runtime
    pub fn spawn(game: Game, events: mpsc::UnboundedSender<RoundEvent>) -> Self {
        let (control, control_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_round(game, control_rx, events));
        Self { control, task }
    }

    /// Forward a player action. False if the round is gone.
    pub fn act(&self, action: Action) -> bool {
        self.control.send(Control::Act(action)).is_ok()
    }

    pub fn reconcile(&self, echo: PlayerState) -> bool {
        self.control.send(Control::OwnEcho(Box::new(echo))).is_ok()
    }

    pub fn stop(&self) {
        let _ = self.control.send(Control::Stop);
    }

    /// Wait for the round task and get the game back
    pub async fn join(self) -> Result<Game, String> {
        self.task.await.map_err(|e| format!("round task failed: {}", e))
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn emit(events: &mpsc::UnboundedSender<RoundEvent>, game: &Game) {
    let _ = events.send(RoundEvent::Snapshot(Box::new(game.snapshot())));
}

async fn run_round(
    mut game: Game,
    mut control: mpsc::UnboundedReceiver<Control>,
    events: mpsc::UnboundedSender<RoundEvent>,
) -> Game {
    let mut schedule = Scheduler::start(Instant::now(), game.tick_interval());
    schedule.sync_survival(Instant::now(), game.survival_remaining().is_some());
    emit(&events, &game);

    if let Some(result) = game.take_result() {
        let _ = events.send(RoundEvent::Ended(result));
        return game;
    }
    if game.is_over() {
        debug!("Round restored in a finished state");
        return game;
    }

    loop {
        let tick_at = schedule.tick.deadline();
        let survival_at = schedule.survival.deadline();

        tokio::select! {
            biased;
            msg = control.recv() => match msg {
                Some(Control::Act(action)) => {
                    if !game.apply(action) {
                        continue;
                    }
                    match action {
                        Action::Pause => schedule.pause(Instant::now()),
                        Action::Resume => schedule.resume(Instant::now()),
                        _ => {}
                    }
                }
                Some(Control::OwnEcho(echo)) => {
                    if !game.reconcile_own_echo(&echo) {
                        continue;
                    }
                }
                Some(Control::Stop) | None => {
                    debug!("Round stopped after {} ticks", game.ticks());
                    return game;
                }
            },
            _ = sleep_until(tick_at) => {
                game.tick();
                schedule.tick.arm(Instant::now(), game.tick_interval());
            }
            _ = sleep_until(survival_at) => {
                game.survival_second();
                schedule.survival.disarm();
            }
        }

        schedule.sync_survival(Instant::now(), game.survival_remaining().is_some());
        emit(&events, &game);

        if let Some(result) = game.take_result() {
            let _ = events.send(RoundEvent::Ended(result));
            return game;
        }
    }
}
