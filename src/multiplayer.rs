//! Versus rooms
//!
//! Each party simulates its own round and pushes a [`PlayerState`] to the
//! shared room document after every step. The [`Reconciler`] is the pure part:
//! it reads room documents and local snapshots and decides which status writes
//! this party is responsible for. [`VersusSession`] wires it to a round task,
//! the store subscription and a single writer task.
//!
//! Write ownership:
//! 1. Each party writes only its own player state
//! 2. Only the first slot moves the room from waiting to in_game
//! 3. in_game -> finished is written by the first slot, or by the second slot
//!    when it is the one that topped out

use crate::board::Board;
use crate::context::Context;
use crate::game::{Action, Game, GameSnapshot};
use crate::level::{Level, LevelId};
use crate::room::{GameRoom, PlayerId, PlayerState, RoomId, RoomStatus, Slot};
use crate::runner::{RoundEvent, RoundHandle};
use crate::sequence::generate_sequence;
use crate::store::{RoomStore, StoreError};
use crate::tetromino::ShapeId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A status write this party should issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEffect {
    /// waiting -> in_game
    Start,
    /// in_game -> finished. No winner when the winning slot was vacated.
    Finish { winner: Option<PlayerId> },
}

/// Winning slot of a room, if the game is decided.
///
/// If both parties are over the higher score wins and a tie goes to the first
/// slot. If exactly one is over the other one wins. A party with no state
/// counts as still playing. The winning slot may be empty if its party left.
pub fn decide_winner(room: &GameRoom) -> Option<Slot> {
    let over = |slot| room.state(slot).is_some_and(|s| s.is_game_over);
    let score = |slot| room.state(slot).map_or(0, |s| s.score);

    match (over(Slot::First), over(Slot::Second)) {
        (true, true) if score(Slot::First) >= score(Slot::Second) => Some(Slot::First),
        (true, true) => Some(Slot::Second),
        (true, false) => Some(Slot::Second),
        (false, true) => Some(Slot::First),
        (false, false) => None,
    }
}

/// Last-known state of the other party, for display only
#[derive(Debug, Clone, PartialEq)]
pub struct OpponentView {
    pub player: PlayerId,
    pub board: Board,
    pub score: u64,
    pub game_over: bool,
}

impl OpponentView {
    fn from_state(state: &PlayerState) -> Self {
        Self {
            player: state.user_id.clone(),
            board: state.to_board(),
            score: state.score,
            game_over: state.is_game_over,
        }
    }
}

/// Pure room-status reconciliation for one party
#[derive(Debug, Clone)]
pub struct Reconciler {
    slot: Slot,
    room: Option<GameRoom>,
    /// Latest state produced by our own round
    local: Option<PlayerState>,
    opponent: Option<OpponentView>,
    start_requested: bool,
    finish_requested: bool,
}

impl Reconciler {
    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            room: None,
            local: None,
            opponent: None,
            start_requested: false,
            finish_requested: false,
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Opponent's last-known snapshot. `None` means still waiting.
    pub fn opponent(&self) -> Option<&OpponentView> {
        self.opponent.as_ref()
    }

    pub fn status(&self) -> Option<RoomStatus> {
        self.room.as_ref().map(|room| room.status)
    }

    /// Take in a fresh room document
    pub fn observe(&mut self, room: &GameRoom) -> Vec<RoomEffect> {
        // Keep the old view when the opponent's state is momentarily absent
        if let Some(state) = room.state(self.slot.other()) {
            self.opponent = Some(OpponentView::from_state(state));
        } else if room.player(self.slot.other()).is_none() {
            self.opponent = None;
        }
        self.room = Some(room.clone());
        self.evaluate()
    }

    /// Take in a snapshot of our own round
    pub fn record_local(&mut self, state: PlayerState) -> Vec<RoomEffect> {
        self.local = Some(state);
        self.evaluate()
    }

    fn evaluate(&mut self) -> Vec<RoomEffect> {
        let Some(room) = &self.room else {
            return Vec::new();
        };
        let mut effects = Vec::new();

        if self.slot == Slot::First
            && room.status == RoomStatus::Waiting
            && room.both_present()
            && !self.start_requested
        {
            self.start_requested = true;
            effects.push(RoomEffect::Start);
        }

        if room.status == RoomStatus::InGame && !self.finish_requested {
            // Our own half is whatever our round last produced
            let mut view = room.clone();
            if let Some(local) = &self.local {
                *view.state_mut(self.slot) = Some(local.clone());
            }
            let locally_over = view.state(self.slot).is_some_and(|s| s.is_game_over);
            if let Some(winning) = decide_winner(&view) {
                if self.slot == Slot::First || locally_over {
                    self.finish_requested = true;
                    effects.push(RoomEffect::Finish {
                        winner: view.player(winning).cloned(),
                    });
                }
            }
        }

        effects
    }
}

/// How a session ended for this party
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Won,
    Lost,
    /// Finished without a recorded winner
    Undecided,
    /// The room went away before finishing
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub verdict: Verdict,
    pub local_score: u64,
    pub opponent_score: Option<u64>,
}

/// What the shell gets to render while a session is playing
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Local(Box<GameSnapshot>),
    Opponent(OpponentView),
    Status(RoomStatus),
}

/// Queued write to the room document
#[derive(Debug)]
enum RoomWrite {
    PlayerState(Box<PlayerState>),
    Status(RoomStatus, Option<PlayerId>),
    Leave,
    Delete,
}

/// One party's membership in a versus room
pub struct VersusSession<S: RoomStore> {
    ctx: Context<S>,
    room_id: RoomId,
    slot: Slot,
    writes: mpsc::UnboundedSender<RoomWrite>,
    writer: JoinHandle<()>,
}

impl<S: RoomStore> VersusSession<S> {
    /// Open a new room on `level` and take the first slot
    pub async fn host(ctx: Context<S>, level: &LevelId) -> Result<Self, StoreError> {
        let seed = rand::random::<u64>();
        let sequence = generate_sequence(seed, ctx.settings.gameplay.sequence_length);
        let room = GameRoom::open(RoomId::random(), ctx.identity.id.clone(), level.clone(), sequence);
        let room_id = room.room_id.clone();
        info!("Hosting room {} on '{}' with seed {}", room_id, level, seed);
        ctx.store.create_room(room).await?;
        Ok(Self::attach(ctx, room_id, Slot::First))
    }

    /// Take the second slot of a waiting room
    pub async fn join(ctx: Context<S>, room_id: &RoomId) -> Result<Self, StoreError> {
        ctx.store.join_room(room_id, &ctx.identity.id).await?;
        info!("Joined room {}", room_id);
        Ok(Self::attach(ctx, room_id.clone(), Slot::Second))
    }

    /// Rooms waiting for a second player
    pub async fn lobby(ctx: &Context<S>) -> Result<Vec<GameRoom>, StoreError> {
        ctx.store.waiting_rooms().await
    }

    fn attach(ctx: Context<S>, room_id: RoomId, slot: Slot) -> Self {
        let (writes, queue) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(Arc::clone(&ctx.store), room_id.clone(), slot, queue));
        Self {
            ctx,
            room_id,
            slot,
            writes,
            writer,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    fn send(&self, write: RoomWrite) {
        if self.writes.send(write).is_err() {
            warn!("Room writer for {} is gone", self.room_id);
        }
    }

    fn request(&self, effect: RoomEffect) {
        match effect {
            RoomEffect::Start => {
                info!("Starting room {}", self.room_id);
                self.send(RoomWrite::Status(RoomStatus::InGame, None));
            }
            RoomEffect::Finish { winner } => {
                info!("Finishing room {}, winner {:?}", self.room_id, winner);
                self.send(RoomWrite::Status(RoomStatus::Finished, winner));
            }
        }
    }

    fn start_round(&self, room: &GameRoom, events: mpsc::UnboundedSender<RoundEvent>) -> RoundHandle {
        let level = match self.ctx.settings.level(&room.level) {
            Some(level) => level.clone(),
            None => {
                warn!("Unknown level '{}', playing the versus level", room.level);
                Level::multiplayer()
            }
        };
        let sequence: Arc<[ShapeId]> = room.block_sequence.clone().into();
        let speed = self.ctx.settings.gameplay.speed_curve();

        let game = match room.state(self.slot) {
            Some(saved) if !saved.is_pristine() => Game::restore(&level, sequence, speed, saved),
            _ => Game::versus(&level, sequence, speed),
        };
        RoundHandle::spawn(game, events)
    }

    /// Play the room until it finishes or disappears.
    ///
    /// `actions` feeds player input into the round once it is running; every
    /// local snapshot, opponent update and status change goes out on `events`.
    pub async fn play(
        &mut self,
        mut actions: mpsc::UnboundedReceiver<Action>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<SessionSummary, StoreError> {
        let mut watch = self.ctx.store.subscribe(&self.room_id).await?;
        let mut reconciler = Reconciler::new(self.slot);
        let (round_tx, mut round_rx) = mpsc::unbounded_channel();
        let mut round: Option<RoundHandle> = None;
        let mut local_score = 0;
        let mut room_changed = true;

        let finished = loop {
            if room_changed {
                room_changed = false;
                let current = watch.borrow_and_update().clone();
                let Some(room) = current else {
                    info!("Room {} is gone", self.room_id);
                    break None;
                };

                for effect in reconciler.observe(&room) {
                    self.request(effect);
                }
                if let Some(view) = reconciler.opponent() {
                    let _ = events.send(SessionEvent::Opponent(view.clone()));
                }
                let _ = events.send(SessionEvent::Status(room.status));

                if room.status == RoomStatus::Finished {
                    break Some(room);
                }
                if let Some(handle) = &round {
                    if let Some(own) = room.state(self.slot) {
                        handle.reconcile(own.clone());
                    }
                } else if room.status == RoomStatus::InGame {
                    round = Some(self.start_round(&room, round_tx.clone()));
                }
            }

            tokio::select! {
                changed = watch.changed() => {
                    if changed.is_err() {
                        info!("Subscription to room {} closed", self.room_id);
                        break None;
                    }
                    room_changed = true;
                }
                Some(event) = round_rx.recv() => match event {
                    RoundEvent::Snapshot(snapshot) => {
                        let state = snapshot.to_player_state(&self.ctx.identity.id);
                        local_score = state.score;
                        self.send(RoomWrite::PlayerState(Box::new(state.clone())));
                        for effect in reconciler.record_local(state) {
                            self.request(effect);
                        }
                        let _ = events.send(SessionEvent::Local(snapshot));
                    }
                    RoundEvent::Ended(result) => info!("Local round over: {:?}", result),
                },
                Some(action) = actions.recv(), if round.is_some() => {
                    if let Some(handle) = &round {
                        handle.act(action);
                    }
                }
            }
        };

        if let Some(handle) = round.take() {
            handle.stop();
            if let Err(e) = handle.join().await {
                warn!("{}", e);
            }
        }

        let me = &self.ctx.identity.id;
        let opponent_score = reconciler.opponent().map(|o| o.score);
        let summary = match finished {
            None => SessionSummary {
                verdict: Verdict::Abandoned,
                local_score,
                opponent_score,
            },
            Some(room) => {
                let verdict = match &room.winner_id {
                    Some(winner) if winner == me => Verdict::Won,
                    Some(_) => Verdict::Lost,
                    None => Verdict::Undecided,
                };
                SessionSummary {
                    verdict,
                    local_score: room.state(self.slot).map_or(local_score, |s| s.score),
                    opponent_score: room.state(self.slot.other()).map(|s| s.score).or(opponent_score),
                }
            }
        };
        info!("Session in room {} ended: {:?}", self.room_id, summary);
        Ok(summary)
    }

    /// Leave the room without waiting for the store.
    ///
    /// The first slot tears the room down, the second slot vacates its half.
    /// Await the returned handle to wait for queued writes to drain.
    pub fn leave(self) -> JoinHandle<()> {
        let Self {
            room_id,
            slot,
            writes,
            writer,
            ..
        } = self;
        info!("Leaving room {}", room_id);
        let write = match slot {
            Slot::First => RoomWrite::Delete,
            Slot::Second => RoomWrite::Leave,
        };
        let _ = writes.send(write);
        writer
    }
}

/// Single writer per session so room writes land in order
async fn write_loop<S: RoomStore>(store: Arc<S>, room: RoomId, slot: Slot, mut queue: mpsc::UnboundedReceiver<RoomWrite>) {
    while let Some(write) = queue.recv().await {
        let result = match write {
            RoomWrite::PlayerState(state) => store.update_player_state(&room, slot, *state).await,
            RoomWrite::Status(status, winner) => store.update_status(&room, status, winner).await,
            RoomWrite::Leave => store.leave_room(&room).await,
            RoomWrite::Delete => store.delete_room(&room).await,
        };
        match result {
            Ok(()) => {}
            // The other party got there first
            Err(StoreError::Rejected(reason)) => debug!("Room write skipped: {}", reason),
            Err(e) => warn!("Room write to {} failed: {}", room, e),
        }
    }
    debug!("Room writer for {} stopped", room);
}
