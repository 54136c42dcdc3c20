//! TETRS ROOMS - mission-driven falling blocks with synchronized versus rooms
//!
//! The engine (`board`, `piece`, `mission`, `game`) is pure and clock-free.
//! `runner` drives a round in real time, and `multiplayer` keeps two rounds
//! consistent through a shared room document held by a `store`.

pub mod board;
pub mod context;
pub mod game;
pub mod level;
pub mod mission;
pub mod multiplayer;
pub mod piece;
pub mod room;
pub mod runner;
pub mod scheduler;
pub mod score;
pub mod sequence;
pub mod settings;
pub mod store;
pub mod tetromino;

pub use game::{Action, Game, GameResult, GameSnapshot, GameState, RoundEnd, RoundMode};
pub use level::{Level, LevelId};
pub use multiplayer::{Reconciler, RoomEffect, SessionSummary, Verdict, VersusSession};
pub use room::{GameRoom, PlayerId, PlayerState, RoomId, RoomStatus, Slot};
pub use store::{MemoryStore, RoomStore, StoreError};
