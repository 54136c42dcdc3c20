//! Remote room store
//!
//! [`RoomStore`] is the boundary to the shared document store: one document
//! per room, field-level updates, and a push subscription delivering the full
//! document on every change. [`MemoryStore`] keeps the documents in process
//! as JSON values, which is enough for the headless shell and for tests.

use crate::room::{GameRoom, PlayerId, PlayerState, RoomId, RoomStatus, Slot};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

/// Errors reported by the room store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("room store unavailable")]
    Unavailable,
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),
    #[error("room is full: {0}")]
    RoomFull(RoomId),
    #[error("write rejected: {0}")]
    Rejected(String),
    #[error("malformed room document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Live view of one room. `None` once the room is deleted.
pub type RoomWatch = watch::Receiver<Option<GameRoom>>;

/// Asynchronous document store holding game rooms
pub trait RoomStore: Send + Sync + 'static {
    /// Store a freshly opened room
    fn create_room(&self, room: GameRoom) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Take the second slot of a waiting room
    fn join_room(
        &self,
        room: &RoomId,
        player: &PlayerId,
    ) -> impl Future<Output = Result<GameRoom, StoreError>> + Send;

    /// Rooms in `waiting` status with the second slot open
    fn waiting_rooms(&self) -> impl Future<Output = Result<Vec<GameRoom>, StoreError>> + Send;

    fn fetch_room(&self, room: &RoomId) -> impl Future<Output = Result<GameRoom, StoreError>> + Send;

    /// Replace one slot's player state
    fn update_player_state(
        &self,
        room: &RoomId,
        slot: Slot,
        state: PlayerState,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Move the room forward, optionally recording the winner
    fn update_status(
        &self,
        room: &RoomId,
        status: RoomStatus,
        winner: Option<PlayerId>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Vacate the second slot
    fn leave_room(&self, room: &RoomId) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_room(&self, room: &RoomId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Subscribe to a room. The receiver starts with the current document.
    fn subscribe(&self, room: &RoomId) -> impl Future<Output = Result<RoomWatch, StoreError>> + Send;
}

#[derive(Debug)]
struct Document {
    value: Value,
    watchers: watch::Sender<Option<GameRoom>>,
}

impl Document {
    fn room(&self) -> Result<GameRoom, StoreError> {
        Ok(serde_json::from_value(self.value.clone())?)
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), StoreError> {
        let Value::Object(fields) = &mut self.value else {
            return Err(StoreError::Rejected("room document is not an object".to_string()));
        };
        fields.insert(field.to_string(), value);
        Ok(())
    }

    /// Push the current document to subscribers
    fn publish(&self) -> Result<(), StoreError> {
        let room = self.room()?;
        self.watchers.send_replace(Some(room));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Inner {
    rooms: HashMap<RoomId, Document>,
    offline: bool,
}

/// In-process store. Clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the connection: every operation fails with
    /// [`StoreError::Unavailable`] until switched back
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.offline = offline;
        }
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Unavailable)?;
        if inner.offline {
            return Err(StoreError::Unavailable);
        }
        f(&mut inner)
    }

    /// Apply a write to one document and notify subscribers
    fn write<T>(
        &self,
        id: &RoomId,
        f: impl FnOnce(&mut Document) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.with_inner(|inner| {
            let doc = inner
                .rooms
                .get_mut(id)
                .ok_or_else(|| StoreError::RoomNotFound(id.clone()))?;
            let out = f(doc)?;
            doc.publish()?;
            Ok(out)
        })
    }
}

impl RoomStore for MemoryStore {
    async fn create_room(&self, room: GameRoom) -> Result<(), StoreError> {
        let value = serde_json::to_value(&room)?;
        self.with_inner(|inner| {
            if inner.rooms.contains_key(&room.room_id) {
                return Err(StoreError::Rejected(format!("room {} already exists", room.room_id)));
            }
            info!("Room {} opened by {}", room.room_id, room.player1_id);
            let (watchers, _) = watch::channel(Some(room.clone()));
            inner.rooms.insert(room.room_id.clone(), Document { value, watchers });
            Ok(())
        })
    }

    async fn join_room(&self, room: &RoomId, player: &PlayerId) -> Result<GameRoom, StoreError> {
        self.write(room, |doc| {
            let current = doc.room()?;
            if !current.is_open() {
                return Err(StoreError::RoomFull(room.clone()));
            }
            if &current.player1_id == player {
                return Err(StoreError::Rejected("cannot join own room".to_string()));
            }
            let state = PlayerState::initial(player.clone(), current.level.clone());
            doc.set(Slot::Second.id_field(), serde_json::to_value(player)?)?;
            doc.set(Slot::Second.state_field(), serde_json::to_value(state)?)?;
            info!("{} joined room {}", player, room);
            doc.room()
        })
    }

    async fn waiting_rooms(&self) -> Result<Vec<GameRoom>, StoreError> {
        self.with_inner(|inner| {
            let mut open = Vec::new();
            for doc in inner.rooms.values() {
                let room = doc.room()?;
                if room.is_open() {
                    open.push(room);
                }
            }
            open.sort_by(|a, b| a.room_id.0.cmp(&b.room_id.0));
            Ok(open)
        })
    }

    async fn fetch_room(&self, room: &RoomId) -> Result<GameRoom, StoreError> {
        self.with_inner(|inner| {
            inner
                .rooms
                .get(room)
                .ok_or_else(|| StoreError::RoomNotFound(room.clone()))?
                .room()
        })
    }

    async fn update_player_state(&self, room: &RoomId, slot: Slot, state: PlayerState) -> Result<(), StoreError> {
        self.write(room, |doc| doc.set(slot.state_field(), serde_json::to_value(state)?))
    }

    async fn update_status(&self, room: &RoomId, status: RoomStatus, winner: Option<PlayerId>) -> Result<(), StoreError> {
        self.write(room, |doc| {
            let current = doc.room()?;
            if !current.can_transition(status, winner.as_ref()) {
                return Err(StoreError::Rejected(format!(
                    "status {:?} -> {:?} not allowed",
                    current.status, status
                )));
            }
            doc.set("status", serde_json::to_value(status)?)?;
            if let Some(winner) = &winner {
                doc.set("winnerId", serde_json::to_value(winner)?)?;
            }
            info!("Room {} is now {:?} (winner {:?})", room, status, winner);
            Ok(())
        })
    }

    async fn leave_room(&self, room: &RoomId) -> Result<(), StoreError> {
        self.write(room, |doc| {
            doc.set(Slot::Second.id_field(), Value::Null)?;
            doc.set(Slot::Second.state_field(), Value::Null)?;
            debug!("Second slot of room {} vacated", room);
            Ok(())
        })
    }

    async fn delete_room(&self, room: &RoomId) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            let doc = inner
                .rooms
                .remove(room)
                .ok_or_else(|| StoreError::RoomNotFound(room.clone()))?;
            doc.watchers.send_replace(None);
            info!("Room {} deleted", room);
            Ok(())
        })
    }

    async fn subscribe(&self, room: &RoomId) -> Result<RoomWatch, StoreError> {
        self.with_inner(|inner| {
            let doc = inner
                .rooms
                .get(room)
                .ok_or_else(|| StoreError::RoomNotFound(room.clone()))?;
            Ok(doc.watchers.subscribe())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LevelId;
    use crate::tetromino::ShapeId;

    fn open_room(id: &str, host: &str) -> GameRoom {
        GameRoom::open(RoomId::new(id), PlayerId::new(host), LevelId::new("multiplayer"), vec![ShapeId::T])
    }

    #[tokio::test]
    async fn test_lobby_lists_only_open_rooms() {
        let store = MemoryStore::new();
        store.create_room(open_room("a", "alice")).await.unwrap();
        store.create_room(open_room("b", "bob")).await.unwrap();
        store.join_room(&RoomId::new("b"), &PlayerId::new("carol")).await.unwrap();

        let waiting = store.waiting_rooms().await.unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].room_id, RoomId::new("a"));
    }

    #[tokio::test]
    async fn test_join_fills_second_slot_once() {
        let store = MemoryStore::new();
        let id = RoomId::new("r");
        store.create_room(open_room("r", "alice")).await.unwrap();

        let room = store.join_room(&id, &PlayerId::new("bob")).await.unwrap();
        assert_eq!(room.player2_id, Some(PlayerId::new("bob")));
        assert!(room.player2_state.is_some_and(|s| s.is_pristine()));

        let again = store.join_room(&id, &PlayerId::new("carol")).await;
        assert!(matches!(again, Err(StoreError::RoomFull(_))));
    }

    #[tokio::test]
    async fn test_status_writes_are_one_way() {
        let store = MemoryStore::new();
        let id = RoomId::new("r");
        store.create_room(open_room("r", "alice")).await.unwrap();
        store.update_status(&id, RoomStatus::InGame, None).await.unwrap();
        store
            .update_status(&id, RoomStatus::Finished, Some(PlayerId::new("alice")))
            .await
            .unwrap();

        let second = store
            .update_status(&id, RoomStatus::Finished, Some(PlayerId::new("bob")))
            .await;
        assert!(matches!(second, Err(StoreError::Rejected(_))));
        let room = store.fetch_room(&id).await.unwrap();
        assert_eq!(room.winner_id, Some(PlayerId::new("alice")));
    }

    #[tokio::test]
    async fn test_subscribers_see_every_change() {
        let store = MemoryStore::new();
        let id = RoomId::new("r");
        store.create_room(open_room("r", "alice")).await.unwrap();
        let mut watch = store.subscribe(&id).await.unwrap();
        assert!(watch.borrow_and_update().is_some());

        let mut state = PlayerState::initial(PlayerId::new("alice"), LevelId::new("multiplayer"));
        state.score = 300;
        store.update_player_state(&id, Slot::First, state).await.unwrap();
        watch.changed().await.unwrap();
        let score = watch.borrow_and_update().as_ref().and_then(|r| r.player1_state.as_ref().map(|s| s.score));
        assert_eq!(score, Some(300));

        store.delete_room(&id).await.unwrap();
        watch.changed().await.unwrap();
        assert!(watch.borrow().is_none());
    }

    #[tokio::test]
    async fn test_leave_reopens_room() {
        let store = MemoryStore::new();
        let id = RoomId::new("r");
        store.create_room(open_room("r", "alice")).await.unwrap();
        store.join_room(&id, &PlayerId::new("bob")).await.unwrap();
        store.leave_room(&id).await.unwrap();
        let room = store.fetch_room(&id).await.unwrap();
        assert!(room.player2_id.is_none());
        assert!(room.player2_state.is_none());
        assert!(room.is_open());
    }

    #[tokio::test]
    async fn test_offline_store_fails_writes() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let result = store.create_room(open_room("r", "alice")).await;
        assert!(matches!(result, Err(StoreError::Unavailable)));
        store.set_offline(false);
        assert!(store.create_room(open_room("r", "alice")).await.is_ok());
    }
}
