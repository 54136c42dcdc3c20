//! Core game state and logic
//!
//! [`Game`] is a pure state machine: it never reads a clock. The runner calls
//! [`Game::tick`] once per tick interval and [`Game::survival_second`] once per
//! second, and forwards player actions through [`Game::apply`].

use crate::board::Board;
use crate::level::{Level, LevelId};
use crate::mission::{Mission, MissionRegistry};
use crate::piece::FallingPiece;
use crate::room::{BlockState, PlayerId, PlayerState};
use crate::score::{Score, SpeedCurve};
use crate::sequence::PieceSource;
use crate::tetromino::ShapeId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEnd {
    /// Topped out
    Failed,
    /// Every mission completed (solo rounds only)
    Completed,
}

/// Game state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Running,
    Paused,
    Over(RoundEnd),
}

/// Solo rounds end when all missions complete, versus rounds only on top-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundMode {
    Solo,
    Versus,
}

/// Terminal value of a round, or the operator's choice afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameResult {
    PlayAgain,
    NextLevel(LevelId),
    MainMenu,
    Failed { score: u64, level: LevelId },
    Completed { score: u64, level: LevelId },
}

/// Input actions the game can process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveRight,
    SoftDrop,
    HardDrop,
    Rotate,
    Pause,
    Resume,
}

/// Everything a renderer or the multiplayer layer needs from one moment
#[derive(Debug, Clone, PartialEq)]
pub struct GameSnapshot {
    pub level: LevelId,
    pub board: Board,
    pub piece: Option<FallingPiece>,
    pub score: Score,
    pub cursor: usize,
    pub missions: Vec<Mission>,
    pub survival_remaining: Option<u64>,
    pub state: GameState,
    pub tick_interval: Duration,
}

impl GameSnapshot {
    /// Persisted form of this snapshot for `user`
    pub fn to_player_state(&self, user: &PlayerId) -> PlayerState {
        PlayerState {
            user_id: user.clone(),
            board: self.board.to_cells(),
            current_block: self.piece.as_ref().map(BlockState::from_piece),
            score: self.score.points,
            is_game_over: self.state == GameState::Over(RoundEnd::Failed),
            current_block_sequence_index: self.cursor,
            level: self.level.clone(),
        }
    }
}

/// The main game struct
#[derive(Debug, Clone)]
pub struct Game {
    level: Level,
    mode: RoundMode,
    board: Board,
    current_piece: Option<FallingPiece>,
    source: PieceSource,
    score: Score,
    tick_interval: Duration,
    speed: SpeedCurve,
    missions: MissionRegistry,
    state: GameState,
    /// Terminal result waiting to be taken
    result: Option<GameResult>,
    ticks: u64,
}

impl Game {
    /// Solo round with random pieces
    pub fn solo(level: &Level, speed: SpeedCurve) -> Self {
        Self::with_source(level, PieceSource::random(), RoundMode::Solo, speed)
    }

    /// Versus round reading the room's shared sequence from the start
    pub fn versus(level: &Level, sequence: Arc<[ShapeId]>, speed: SpeedCurve) -> Self {
        Self::with_source(level, PieceSource::shared(sequence, 0), RoundMode::Versus, speed)
    }

    /// Build and initialize a round. If the first piece can't spawn the
    /// round is already over.
    pub fn with_source(level: &Level, source: PieceSource, mode: RoundMode, speed: SpeedCurve) -> Self {
        let mut game = Self {
            level: level.clone(),
            mode,
            board: Board::new(),
            current_piece: None,
            source,
            score: Score::new(),
            tick_interval: level.starting_interval(),
            speed,
            missions: MissionRegistry::new(&level.missions, &level.unlocks),
            state: GameState::Running,
            result: None,
            ticks: 0,
        };
        game.initialize();
        game
    }

    /// Rebuild a versus round from the party's own persisted snapshot
    pub fn restore(level: &Level, sequence: Arc<[ShapeId]>, speed: SpeedCurve, saved: &PlayerState) -> Self {
        let board = saved.to_board();
        let current_piece = saved
            .current_block
            .as_ref()
            .map(BlockState::to_piece)
            .filter(|piece| !board.collides(piece, 0, 0));
        let score = Score {
            points: saved.score,
            lines: 0,
        };
        let state = if saved.is_game_over {
            GameState::Over(RoundEnd::Failed)
        } else {
            GameState::Running
        };
        info!(
            "Restoring round on '{}' at cursor {} with score {}",
            level.id, saved.current_block_sequence_index, saved.score
        );

        Self {
            level: level.clone(),
            mode: RoundMode::Versus,
            board,
            current_piece,
            source: PieceSource::shared(sequence, saved.current_block_sequence_index),
            missions: MissionRegistry::restored(&level.missions, &level.unlocks, score.points, score.lines),
            score,
            tick_interval: level.starting_interval(),
            speed,
            state,
            // Already reported before the restart
            result: None,
            ticks: 0,
        }
    }

    /// Reset everything for another attempt at the same level
    pub fn restart(&mut self) {
        self.source.rewind();
        self.initialize();
    }

    fn initialize(&mut self) {
        self.board = Board::with_obstacles(&self.level.obstacles);
        self.current_piece = None;
        self.score = Score::new();
        self.tick_interval = self.level.starting_interval();
        self.missions = MissionRegistry::new(&self.level.missions, &self.level.unlocks);
        self.state = GameState::Running;
        self.result = None;
        self.ticks = 0;
        info!("Round started on '{}' ({:?})", self.level.id, self.mode);
        self.spawn();
        self.evaluate_missions();
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn mode(&self) -> RoundMode {
        self.mode
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_piece(&self) -> Option<&FallingPiece> {
        self.current_piece.as_ref()
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_over(&self) -> bool {
        matches!(self.state, GameState::Over(_))
    }

    /// Current delay between ticks
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn missions(&self) -> &[Mission] {
        self.missions.missions()
    }

    pub fn survival_remaining(&self) -> Option<u64> {
        self.missions.survival_remaining()
    }

    /// Shared-sequence cursor
    pub fn cursor(&self) -> usize {
        self.source.cursor()
    }

    /// Ticks executed since the round started
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Take the terminal result. Returns it once per round.
    pub fn take_result(&mut self) -> Option<GameResult> {
        self.result.take()
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            level: self.level.id.clone(),
            board: self.board.clone(),
            piece: self.current_piece.clone(),
            score: self.score.clone(),
            cursor: self.cursor(),
            missions: self.missions().to_vec(),
            survival_remaining: self.survival_remaining(),
            state: self.state,
            tick_interval: self.tick_interval,
        }
    }

    /// One simulation step: spawn if needed, otherwise fall or commit
    pub fn tick(&mut self) -> bool {
        if self.state != GameState::Running {
            return false;
        }
        self.ticks += 1;

        match self.current_piece.take() {
            None => self.spawn(),
            Some(piece) if self.board.collides(&piece, 0, 1) => self.lock_piece(piece),
            Some(piece) => self.current_piece = Some(piece.translated(0, 1)),
        }

        self.evaluate_missions();
        true
    }

    /// Process a player action. Returns false if it was rejected.
    pub fn apply(&mut self, action: Action) -> bool {
        match self.state {
            GameState::Paused => action == Action::Resume && self.resume(),
            GameState::Over(_) => false,
            GameState::Running => match action {
                Action::MoveLeft => self.try_move(-1, 0),
                Action::MoveRight => self.try_move(1, 0),
                Action::SoftDrop => self.try_move(0, 1),
                Action::Rotate => self.try_rotate(),
                Action::HardDrop => self.hard_drop(),
                Action::Pause => self.pause(),
                Action::Resume => false,
            },
        }
    }

    pub fn pause(&mut self) -> bool {
        if self.state != GameState::Running {
            return false;
        }
        debug!("Round paused");
        self.state = GameState::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != GameState::Paused {
            return false;
        }
        debug!("Round resumed");
        self.state = GameState::Running;
        true
    }

    /// One second of the survival countdown
    pub fn survival_second(&mut self) -> bool {
        if self.state != GameState::Running || self.survival_remaining().is_none() {
            return false;
        }
        self.missions.tick_survival();
        self.evaluate_missions();
        true
    }

    /// Adopt the piece from an echo of our own pushed state when we have none.
    ///
    /// The echo must describe the board we currently have, so a stale echo of
    /// an already committed piece is ignored.
    pub fn reconcile_own_echo(&mut self, echo: &PlayerState) -> bool {
        if self.state != GameState::Running || self.current_piece.is_some() {
            return false;
        }
        let Some(block) = &echo.current_block else {
            return false;
        };
        if echo.board != self.board.to_cells() {
            return false;
        }
        let piece = block.to_piece();
        if self.board.collides(&piece, 0, 0) {
            return false;
        }
        debug!("Adopted {} piece from own echo", piece.shape);
        self.current_piece = Some(piece);
        true
    }

    fn try_move(&mut self, dx: i32, dy: i32) -> bool {
        let Some(piece) = &self.current_piece else {
            return false;
        };
        if self.board.collides(piece, dx, dy) {
            return false;
        }
        self.current_piece = Some(piece.translated(dx, dy));
        true
    }

    fn try_rotate(&mut self) -> bool {
        let Some(piece) = &self.current_piece else {
            return false;
        };
        let rotated = piece.rotated();
        if self.board.collides(&rotated, 0, 0) {
            return false;
        }
        self.current_piece = Some(rotated);
        true
    }

    fn hard_drop(&mut self) -> bool {
        let Some(piece) = self.current_piece.take() else {
            return false;
        };
        let landed = piece.hard_dropped(&self.board);
        self.lock_piece(landed);
        self.evaluate_missions();
        true
    }

    /// Spawn the next piece, ending the round if it doesn't fit
    fn spawn(&mut self) {
        let piece = FallingPiece::spawn(self.source.next());
        if self.board.collides(&piece, 0, 0) {
            info!("Top out spawning {} at cursor {}", piece.shape, self.source.cursor());
            self.end(RoundEnd::Failed);
            return;
        }
        self.current_piece = Some(piece);
    }

    /// Commit a piece, clear rows, score and speed up
    fn lock_piece(&mut self, piece: FallingPiece) {
        self.board.place(&piece);
        let lines = self.board.clear_full_rows();
        if lines > 0 {
            let gained = self.score.add_clear(lines);
            self.tick_interval = self.speed.next_interval(self.tick_interval);
            debug!(
                "Cleared {} lines for {} points, interval now {:?}",
                lines, gained, self.tick_interval
            );
            self.missions.on_lines_cleared(lines, self.score.lines);
        }
        self.current_piece = None;
    }

    fn evaluate_missions(&mut self) {
        self.missions.on_score(self.score.points);
        if self.mode == RoundMode::Solo
            && self.state == GameState::Running
            && !self.missions().is_empty()
            && self.missions.all_completed()
        {
            self.end(RoundEnd::Completed);
        }
    }

    fn end(&mut self, end: RoundEnd) {
        if self.is_over() {
            return;
        }
        let score = self.score.points;
        let level = self.level.id.clone();
        info!("Round over on '{}': {:?} with {} points", level, end, score);
        self.state = GameState::Over(end);
        self.current_piece = None;
        self.result = Some(match end {
            RoundEnd::Failed => GameResult::Failed { score, level },
            RoundEnd::Completed => GameResult::Completed { score, level },
        });
    }
}
