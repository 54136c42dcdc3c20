//! Room documents exchanged through the remote store
//!
//! Field names follow the persisted (camelCase) document shape:
//! `{roomId, player1Id, player2Id?, status, winnerId?, level, blockSequence,
//! player1State?, player2State?}`.

use crate::board::Board;
use crate::level::LevelId;
use crate::piece::FallingPiece;
use crate::tetromino::{Color, ShapeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable opaque identity of a party
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room document key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Fresh random id, formatted like session ids
    pub fn random() -> Self {
        Self(format!("{:016x}", rand::random::<u64>()))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room lifecycle, strictly waiting -> in_game -> finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    InGame,
    Finished,
}

/// Which half of the room a party owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The room's creator
    First,
    Second,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }

    /// Document field holding this slot's state
    pub fn state_field(self) -> &'static str {
        match self {
            Slot::First => "player1State",
            Slot::Second => "player2State",
        }
    }

    /// Document field holding this slot's identity
    pub fn id_field(self) -> &'static str {
        match self {
            Slot::First => "player1Id",
            Slot::Second => "player2Id",
        }
    }
}

/// In-flight piece as persisted. Only spawn orientation is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockState {
    pub shape_id: ShapeId,
    pub color: u32,
    pub row: i32,
    pub col: i32,
}

impl BlockState {
    pub fn from_piece(piece: &FallingPiece) -> Self {
        Self {
            shape_id: piece.shape,
            color: piece.color.0,
            row: piece.row,
            col: piece.col,
        }
    }

    /// Rebuild the described piece verbatim (shape, color, anchor)
    pub fn to_piece(&self) -> FallingPiece {
        FallingPiece::at(self.shape_id, Color(self.color), self.row, self.col)
    }
}

/// One party's snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub user_id: PlayerId,
    /// Flattened row-major board, 0 = empty
    pub board: Vec<u32>,
    #[serde(default)]
    pub current_block: Option<BlockState>,
    pub score: u64,
    pub is_game_over: bool,
    pub current_block_sequence_index: usize,
    pub level: LevelId,
}

impl PlayerState {
    /// State of a party that hasn't played yet
    pub fn initial(user_id: PlayerId, level: LevelId) -> Self {
        Self {
            user_id,
            board: Board::new().to_cells(),
            current_block: None,
            score: 0,
            is_game_over: false,
            current_block_sequence_index: 0,
            level,
        }
    }

    /// Pure conversion back into a board
    pub fn to_board(&self) -> Board {
        Board::from_cells(&self.board)
    }

    /// True if nothing has been played from this state yet
    pub fn is_pristine(&self) -> bool {
        self.score == 0
            && self.current_block.is_none()
            && self.current_block_sequence_index == 0
            && !self.is_game_over
            && self.board.iter().all(|&cell| cell == 0)
    }
}

/// The shared room document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRoom {
    pub room_id: RoomId,
    pub player1_id: PlayerId,
    #[serde(default)]
    pub player2_id: Option<PlayerId>,
    pub status: RoomStatus,
    #[serde(default)]
    pub winner_id: Option<PlayerId>,
    pub level: LevelId,
    pub block_sequence: Vec<ShapeId>,
    #[serde(default)]
    pub player1_state: Option<PlayerState>,
    #[serde(default)]
    pub player2_state: Option<PlayerState>,
}

impl GameRoom {
    /// A new room waiting for its second player
    pub fn open(room_id: RoomId, host: PlayerId, level: LevelId, block_sequence: Vec<ShapeId>) -> Self {
        Self {
            room_id,
            player1_state: Some(PlayerState::initial(host.clone(), level.clone())),
            player1_id: host,
            player2_id: None,
            status: RoomStatus::Waiting,
            winner_id: None,
            level,
            block_sequence,
            player2_state: None,
        }
    }

    /// Listed in the lobby: waiting with the second slot free
    pub fn is_open(&self) -> bool {
        self.status == RoomStatus::Waiting && self.player2_id.is_none()
    }

    pub fn player(&self, slot: Slot) -> Option<&PlayerId> {
        match slot {
            Slot::First => Some(&self.player1_id),
            Slot::Second => self.player2_id.as_ref(),
        }
    }

    pub fn state(&self, slot: Slot) -> Option<&PlayerState> {
        match slot {
            Slot::First => self.player1_state.as_ref(),
            Slot::Second => self.player2_state.as_ref(),
        }
    }

    pub fn state_mut(&mut self, slot: Slot) -> &mut Option<PlayerState> {
        match slot {
            Slot::First => &mut self.player1_state,
            Slot::Second => &mut self.player2_state,
        }
    }

    /// Which slot a party occupies
    pub fn slot_of(&self, player: &PlayerId) -> Option<Slot> {
        if &self.player1_id == player {
            Some(Slot::First)
        } else if self.player2_id.as_ref() == Some(player) {
            Some(Slot::Second)
        } else {
            None
        }
    }

    pub fn both_present(&self) -> bool {
        self.player2_id.is_some()
    }

    /// Whether moving to `next` respects waiting -> in_game -> finished.
    /// A winner may only accompany the move to finished.
    pub fn can_transition(&self, next: RoomStatus, winner: Option<&PlayerId>) -> bool {
        let forward = matches!(
            (self.status, next),
            (RoomStatus::Waiting, RoomStatus::InGame)
                | (RoomStatus::Waiting, RoomStatus::Finished)
                | (RoomStatus::InGame, RoomStatus::Finished)
        );
        forward && (winner.is_none() || next == RoomStatus::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn room() -> GameRoom {
        GameRoom::open(
            RoomId::new("r1"),
            PlayerId::new("alice"),
            LevelId::new("multiplayer"),
            vec![ShapeId::T, ShapeId::I],
        )
    }

    #[test]
    fn test_open_room_is_listed() {
        let room = room();
        assert!(room.is_open());
        assert_eq!(room.slot_of(&PlayerId::new("alice")), Some(Slot::First));
        assert_eq!(room.slot_of(&PlayerId::new("bob")), None);
        assert!(room.state(Slot::First).is_some_and(PlayerState::is_pristine));
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut room = room();
        assert!(room.can_transition(RoomStatus::InGame, None));
        assert!(!room.can_transition(RoomStatus::InGame, Some(&PlayerId::new("alice"))));
        room.status = RoomStatus::InGame;
        assert!(!room.can_transition(RoomStatus::Waiting, None));
        assert!(room.can_transition(RoomStatus::Finished, Some(&PlayerId::new("alice"))));
        room.status = RoomStatus::Finished;
        assert!(!room.can_transition(RoomStatus::Finished, None));
    }

    #[test]
    fn test_document_field_names() {
        let value = serde_json::to_value(room()).unwrap();
        assert_eq!(value["roomId"], json!("r1"));
        assert_eq!(value["player1Id"], json!("alice"));
        assert_eq!(value["status"], json!("waiting"));
        assert_eq!(value["blockSequence"], json!(["T", "I"]));
        assert_eq!(value["player1State"]["currentBlockSequenceIndex"], json!(0));
        assert_eq!(value["player1State"]["isGameOver"], json!(false));
    }

    #[test]
    fn test_block_state_restores_piece() {
        let piece = FallingPiece::spawn(ShapeId::S).translated(2, 7);
        let block = BlockState::from_piece(&piece);
        assert_eq!(block.to_piece(), piece);
    }

    #[test]
    fn test_parses_document_with_missing_optionals() {
        let doc = json!({
            "roomId": "r9",
            "player1Id": "alice",
            "status": "in_game",
            "level": "multiplayer",
            "blockSequence": ["O"],
        });
        let room: GameRoom = serde_json::from_value(doc).unwrap();
        assert_eq!(room.status, RoomStatus::InGame);
        assert!(room.player2_id.is_none());
        assert!(room.player1_state.is_none());
    }
}
