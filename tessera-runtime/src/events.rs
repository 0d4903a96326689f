use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Labels what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BlockCommit,
    TxExecuted,
    TokenTransfer,
    AssetMinted,
    AssetBurned,
    AssetTransfer,
    TemplateRegistered,
    SessionOpen,
    SessionClose,
    MarketList,
    MarketBuy,
}

/// A typed notification emitted after a state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub tx_id: String,
    pub block_height: u64,
    pub data: Value,
}

/// Callback invoked for matching events.
pub type EventHandler = Box<dyn Fn(&Event) + Send + Sync>;

/// Simple pub/sub broker. Subscribe before Emit; subscribers are registered
/// once during node startup, so handlers run under the read lock and must not
/// subscribe reentrantly.
pub struct Emitter {
    handlers: RwLock<HashMap<EventKind, Vec<EventHandler>>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register `handler` to be called whenever `kind` is emitted.
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) {
        let mut handlers = match self.handlers.write() {
            Ok(h) => h,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.entry(kind).or_default().push(handler);
    }

    /// Deliver `event` to all subscribers for its kind synchronously. Each
    /// handler is guarded by panic recovery so a misbehaving subscriber
    /// cannot crash the node or halt block production.
    pub fn emit(&self, event: Event) {
        let handlers = match self.handlers.read() {
            Ok(h) => h,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(subscribers) = handlers.get(&event.kind) {
            for handler in subscribers {
                if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                    tracing::warn!(kind = ?event.kind, "event handler panicked");
                }
            }
        }
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}
