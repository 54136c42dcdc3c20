//! TETRS ROOMS - headless shell
//!
//! `tetrs-rooms solo [level]` lets an autoplayer work through the level
//! catalogue. `tetrs-rooms versus [level]` pits two autoplayers against each
//! other through an in-memory room store.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tetrs_rooms::board::{BOARD_COLS, BOARD_ROWS, Board};
use tetrs_rooms::context::{Context, Identity};
use tetrs_rooms::level::next_level;
use tetrs_rooms::multiplayer::SessionEvent;
use tetrs_rooms::piece::FallingPiece;
use tetrs_rooms::scheduler::SURVIVAL_STEP;
use tetrs_rooms::settings::Settings;
use tetrs_rooms::{Action, Game, GameResult, Level, LevelId, MemoryStore, StoreError, VersusSession};
use tokio::sync::mpsc;

/// Upper bound on simulated ticks per solo round
const MAX_SOLO_TICKS: u64 = 200_000;
/// Attempts per solo level before giving up
const MAX_ATTEMPTS: u32 = 3;

/// Get the temp directory for logs, creating it if needed
fn temp_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join("tetrs-rooms");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

fn main() -> io::Result<()> {
    let session_id: u32 = rand::random();
    let log_dir = temp_dir();
    let log_file = format!("{:08x}.log", session_id);

    // Setup tracing to log file
    let file_appender = tracing_appender::rolling::never(&log_dir, &log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "tetrs_rooms=debug".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .with_ansi(false)
        .init();

    tracing::info!(
        "TETRS ROOMS starting up, session={:08x}, log={}",
        session_id,
        log_dir.join(&log_file).display()
    );

    let mut settings = Settings::load();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("solo");
    let level = args.get(1).map(|id| LevelId::new(id));

    match command {
        "solo" => {
            let start = level
                .or_else(|| settings.levels.first().map(|l| l.id.clone()))
                .unwrap_or_else(|| Level::beginner().id);
            run_solo(&mut settings, start);
            if let Err(e) = settings.save() {
                eprintln!("Warning: Could not save settings: {}", e);
            }
        }
        "versus" => {
            let level = level.unwrap_or_else(|| Level::multiplayer().id);
            let runtime = tokio::runtime::Runtime::new()?;
            if let Err(e) = runtime.block_on(run_versus(Arc::new(settings), level)) {
                tracing::error!("Versus session failed: {}", e);
                eprintln!("Versus session failed: {}", e);
            }
        }
        other => {
            eprintln!("Unknown command '{}'. Usage: tetrs-rooms [solo|versus] [level-id]", other);
        }
    }

    Ok(())
}

/// Autoplayer choosing placements by a board heuristic
struct Bot {
    /// Chance of playing the best placement instead of a random one
    skill: f64,
    rng: StdRng,
}

impl Bot {
    fn new(skill: f64) -> Self {
        Self {
            skill,
            rng: StdRng::from_entropy(),
        }
    }

    /// Actions taking `piece` to its chosen landing spot
    fn plan(&mut self, board: &Board, piece: &FallingPiece) -> Vec<Action> {
        let options = placements(board, piece);
        let chosen = if self.rng.gen_bool(self.skill) {
            options.iter().max_by_key(|(_, value)| *value)
        } else {
            options.choose(&mut self.rng)
        };
        chosen
            .map(|(actions, _)| actions.clone())
            .unwrap_or_else(|| vec![Action::HardDrop])
    }
}

/// Every reachable rotation and column, with the value of the board after
fn placements(board: &Board, piece: &FallingPiece) -> Vec<(Vec<Action>, i64)> {
    let mut options = Vec::new();
    let mut rotated = piece.clone();

    for rotations in 0..4 {
        if rotations > 0 {
            let next = rotated.rotated();
            if board.collides(&next, 0, 0) {
                break;
            }
            rotated = next;
        }
        for (dir, step) in [(-1, Action::MoveLeft), (1, Action::MoveRight)] {
            let mut shifted = rotated.clone();
            let mut moves = 0;
            loop {
                // The unshifted spot is scored once, on the left pass
                if dir < 0 || moves > 0 {
                    let landed = shifted.hard_dropped(board);
                    let mut after = board.clone();
                    after.place(&landed);
                    let lines = after.clear_full_rows();
                    let mut actions = vec![Action::Rotate; rotations];
                    actions.extend(std::iter::repeat_n(step, moves));
                    actions.push(Action::HardDrop);
                    options.push((actions, board_value(&after, lines)));
                }
                if board.collides(&shifted, dir, 0) {
                    break;
                }
                shifted = shifted.translated(dir, 0);
                moves += 1;
            }
        }
    }
    options
}

fn board_value(board: &Board, lines: usize) -> i64 {
    let mut heights = [0i64; BOARD_COLS];
    let mut holes = 0i64;
    for (col, height) in heights.iter_mut().enumerate() {
        let mut covered = false;
        for row in 0..BOARD_ROWS {
            let filled = board
                .get(row as i32, col as i32)
                .is_some_and(|cell| cell.is_filled());
            if filled && !covered {
                covered = true;
                *height = (BOARD_ROWS - row) as i64;
            } else if !filled && covered {
                holes += 1;
            }
        }
    }
    let total: i64 = heights.iter().sum();
    let bumpiness: i64 = heights.windows(2).map(|w| (w[0] - w[1]).abs()).sum();
    lines as i64 * 80 - total * 5 - holes * 35 - bumpiness * 2
}

/// Play one solo round on a simulated clock
fn play_round(game: &mut Game, bot: &mut Bot) -> Option<GameResult> {
    let mut elapsed = Duration::ZERO;
    while game.ticks() < MAX_SOLO_TICKS {
        if let Some(result) = game.take_result() {
            return Some(result);
        }
        if let Some(piece) = game.current_piece().cloned() {
            if piece.row == 0 {
                for action in bot.plan(game.board(), &piece) {
                    game.apply(action);
                }
            }
        }
        elapsed += game.tick_interval();
        game.tick();
        while elapsed >= SURVIVAL_STEP {
            elapsed -= SURVIVAL_STEP;
            game.survival_second();
        }
    }
    tracing::warn!("Round on '{}' hit the tick limit", game.level().id);
    None
}

/// Operator choice after a terminal result
fn next_step(settings: &Settings, result: &GameResult, attempts: u32) -> GameResult {
    match result {
        GameResult::Completed { level, .. } => match next_level(&settings.levels, level) {
            Some(next) => GameResult::NextLevel(next.id.clone()),
            None => GameResult::MainMenu,
        },
        GameResult::Failed { .. } if attempts < MAX_ATTEMPTS => GameResult::PlayAgain,
        GameResult::Failed { .. } => GameResult::MainMenu,
        // Already an operator choice
        GameResult::PlayAgain | GameResult::NextLevel(_) | GameResult::MainMenu => result.clone(),
    }
}

fn run_solo(settings: &mut Settings, start: LevelId) {
    let Some(level) = settings.level(&start).cloned() else {
        eprintln!("Unknown level '{}'", start);
        return;
    };
    let speed = settings.gameplay.speed_curve();
    let mut bot = Bot::new(0.97);
    let mut game = Game::solo(&level, speed);
    let mut attempts = 1;

    loop {
        let Some(result) = play_round(&mut game, &mut bot) else {
            println!("{}: gave up after {} ticks", game.level().name, game.ticks());
            return;
        };
        match &result {
            GameResult::Completed { score, level } => {
                println!("{}: completed with {} points", level, score);
                settings.add_score(level, *score, true);
            }
            GameResult::Failed { score, level } => {
                println!("{}: topped out with {} points", level, score);
                settings.add_score(level, *score, false);
            }
            GameResult::PlayAgain | GameResult::NextLevel(_) | GameResult::MainMenu => {}
        }

        match next_step(settings, &result, attempts) {
            GameResult::PlayAgain => {
                attempts += 1;
                game.restart();
            }
            GameResult::NextLevel(id) => {
                let Some(level) = settings.level(&id).cloned() else {
                    return;
                };
                attempts = 1;
                game = Game::solo(&level, speed);
            }
            GameResult::MainMenu | GameResult::Failed { .. } | GameResult::Completed { .. } => break,
        }
    }

    println!("\nThanks for playing TETRS ROOMS!");
    for level in &settings.levels {
        if let Some(best) = settings.best_for(&level.id) {
            println!("Best on {}: {}", level.name, best);
        }
    }
}

/// Feed a bot's plans into a session as pieces spawn
async fn drive(mut bot: Bot, mut view: mpsc::UnboundedReceiver<SessionEvent>, input: mpsc::UnboundedSender<Action>) {
    let mut planned_for = None;
    while let Some(event) = view.recv().await {
        let SessionEvent::Local(snapshot) = event else {
            continue;
        };
        let Some(piece) = &snapshot.piece else {
            continue;
        };
        if planned_for == Some(snapshot.cursor) {
            continue;
        }
        planned_for = Some(snapshot.cursor);
        for action in bot.plan(&snapshot.board, piece) {
            if input.send(action).is_err() {
                return;
            }
        }
    }
}

async fn run_versus(settings: Arc<Settings>, level: LevelId) -> Result<(), StoreError> {
    let store = Arc::new(MemoryStore::new());
    let host_ctx = Context::new(Identity::guest(), store, settings);
    let guest_ctx = host_ctx.with_identity(Identity::guest());

    let mut host = VersusSession::host(host_ctx.clone(), &level).await?;
    let lobby = VersusSession::lobby(&guest_ctx).await?;
    let Some(open) = lobby.first() else {
        return Err(StoreError::Rejected("no open room to join".to_string()));
    };
    let mut guest = VersusSession::join(guest_ctx.clone(), &open.room_id).await?;
    println!("{} hosts room {}, {} joins", host_ctx.identity.id, host.room_id(), guest_ctx.identity.id);

    let (host_input, host_actions) = mpsc::unbounded_channel();
    let (host_events, host_view) = mpsc::unbounded_channel();
    let (guest_input, guest_actions) = mpsc::unbounded_channel();
    let (guest_events, guest_view) = mpsc::unbounded_channel();
    let host_bot = tokio::spawn(drive(Bot::new(0.6), host_view, host_input));
    let guest_bot = tokio::spawn(drive(Bot::new(0.4), guest_view, guest_input));

    let (host_summary, guest_summary) = tokio::join!(
        host.play(host_actions, host_events),
        guest.play(guest_actions, guest_events)
    );
    host_bot.abort();
    guest_bot.abort();

    for (who, summary) in [(&host_ctx.identity.id, host_summary?), (&guest_ctx.identity.id, guest_summary?)] {
        println!(
            "{}: {:?} with {} points (opponent {})",
            who,
            summary.verdict,
            summary.local_score,
            summary.opponent_score.map_or("-".to_string(), |s| s.to_string())
        );
    }

    let _ = guest.leave().await;
    let _ = host.leave().await;
    Ok(())
}
