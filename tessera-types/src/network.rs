use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::transaction::Transaction;

/// Peer handshake sent right after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub node_id: String,
}

/// Asks a peer for up to `limit` consecutive blocks starting at `from_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlocksRequest {
    pub from_height: u64,
    pub limit: u32,
}

/// A batch of consecutive blocks, truncated at the first missing height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlocksResponse {
    pub blocks: Vec<Block>,
}

/// Envelope for all peer-to-peer communication. On the wire this is JSON
/// `{"type": ..., "payload": ...}` behind a 4-byte big-endian length prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Message {
    Hello(Hello),
    Tx(Box<Transaction>),
    Block(Box<Block>),
    GetBlocks(GetBlocksRequest),
    Blocks(BlocksResponse),
}

/// Message discriminant, used as the key in the handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Hello,
    Tx,
    Block,
    GetBlocks,
    Blocks,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Hello(_) => MessageKind::Hello,
            Message::Tx(_) => MessageKind::Tx,
            Message::Block(_) => MessageKind::Block,
            Message::GetBlocks(_) => MessageKind::GetBlocks,
            Message::Blocks(_) => MessageKind::Blocks,
        }
    }
}
