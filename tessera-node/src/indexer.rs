use std::sync::Arc;

use tessera_runtime::{Emitter, Event, EventKind};
use tessera_storage::traits::{BatchWriter, KvStore};
use tessera_storage::StorageError;

const OWNER_ASSETS_PREFIX: &str = "idx:owner:asset:";
const PLAYER_SESSIONS_PREFIX: &str = "idx:player:session:";

/// Maintains secondary lookup tables over committed chain events so game
/// servers can query assets and sessions by participant without scanning the
/// full state.
pub struct Indexer {
    db: Arc<dyn BatchWriter>,
}

impl Indexer {
    pub fn new(db: Arc<dyn BatchWriter>) -> Arc<Self> {
        Arc::new(Self { db })
    }

    /// Subscribe this indexer to the relevant chain events.
    pub fn attach(self: &Arc<Self>, emitter: &Emitter) {
        let idx = self.clone();
        emitter.subscribe(EventKind::AssetMinted, Box::new(move |ev| idx.on_minted(ev)));
        let idx = self.clone();
        emitter.subscribe(
            EventKind::AssetTransfer,
            Box::new(move |ev| idx.on_transferred(ev)),
        );
        let idx = self.clone();
        emitter.subscribe(EventKind::AssetBurned, Box::new(move |ev| idx.on_burned(ev)));
        let idx = self.clone();
        emitter.subscribe(
            EventKind::SessionOpen,
            Box::new(move |ev| idx.on_session_open(ev)),
        );
    }

    /// All asset ids owned by the given pubkey.
    pub fn assets_by_owner(&self, owner: &str) -> Result<Vec<String>, StorageError> {
        self.get_list(&format!("{}{}", OWNER_ASSETS_PREFIX, owner))
    }

    /// All session ids a player participated in.
    pub fn sessions_by_player(&self, player: &str) -> Result<Vec<String>, StorageError> {
        self.get_list(&format!("{}{}", PLAYER_SESSIONS_PREFIX, player))
    }

    // ---- event handlers ----

    fn on_minted(&self, ev: &Event) {
        let owner = ev.data["owner"].as_str().unwrap_or_default();
        let asset_id = ev.data["asset_id"].as_str().unwrap_or_default();
        if owner.is_empty() || asset_id.is_empty() {
            return;
        }
        if let Err(e) = self.add_to_list(&format!("{}{}", OWNER_ASSETS_PREFIX, owner), asset_id) {
            tracing::warn!(owner, asset_id, error = %e, "mint index write failed");
        }
    }

    fn on_transferred(&self, ev: &Event) {
        let from = ev.data["from"].as_str().unwrap_or_default();
        let to = ev.data["to"].as_str().unwrap_or_default();
        let asset_id = ev.data["asset_id"].as_str().unwrap_or_default();
        if from.is_empty() || to.is_empty() || asset_id.is_empty() {
            return;
        }
        if let Err(e) = self.remove_from_list(&format!("{}{}", OWNER_ASSETS_PREFIX, from), asset_id)
        {
            tracing::warn!(from, asset_id, error = %e, "transfer index remove failed");
        }
        if let Err(e) = self.add_to_list(&format!("{}{}", OWNER_ASSETS_PREFIX, to), asset_id) {
            tracing::warn!(to, asset_id, error = %e, "transfer index add failed");
        }
    }

    fn on_burned(&self, ev: &Event) {
        let owner = ev.data["owner"].as_str().unwrap_or_default();
        let asset_id = ev.data["asset_id"].as_str().unwrap_or_default();
        if owner.is_empty() || asset_id.is_empty() {
            return;
        }
        if let Err(e) = self.remove_from_list(&format!("{}{}", OWNER_ASSETS_PREFIX, owner), asset_id)
        {
            tracing::warn!(owner, asset_id, error = %e, "burn index remove failed");
        }
    }

    fn on_session_open(&self, ev: &Event) {
        let session_id = ev.data["session_id"].as_str().unwrap_or_default();
        if session_id.is_empty() {
            return;
        }
        let players = match ev.data["players"].as_array() {
            Some(players) => players,
            None => return,
        };
        for player in players {
            let player = player.as_str().unwrap_or_default();
            if player.is_empty() {
                continue;
            }
            if let Err(e) =
                self.add_to_list(&format!("{}{}", PLAYER_SESSIONS_PREFIX, player), session_id)
            {
                tracing::warn!(player, session_id, error = %e, "session index write failed");
            }
        }
    }

    // ---- list helpers ----

    fn get_list(&self, key: &str) -> Result<Vec<String>, StorageError> {
        let data = match self.db.get(key.as_bytes())? {
            Some(data) => data,
            None => return Ok(Vec::new()),
        };
        serde_json::from_slice(&data).map_err(|e| StorageError::DeserializationError {
            reason: format!("indexer list {}: {}", key, e),
        })
    }

    fn put_list(&self, key: &str, ids: &[String]) -> Result<(), StorageError> {
        let data = serde_json::to_vec(ids).map_err(|e| StorageError::SerializationError {
            reason: e.to_string(),
        })?;
        self.db.put(key.as_bytes(), &data)
    }

    fn add_to_list(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut ids = self.get_list(key)?;
        if ids.iter().any(|id| id == value) {
            return Ok(());
        }
        ids.push(value.to_string());
        self.put_list(key, &ids)
    }

    fn remove_from_list(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut ids = self.get_list(key)?;
        ids.retain(|id| id != value);
        self.put_list(key, &ids)
    }
}
