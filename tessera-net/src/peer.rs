use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use tessera_types::constants::PEER_READ_TIMEOUT;
use tessera_types::network::Message;

use crate::codec;
use crate::error::NetError;

/// A connected remote node. Sends hold the write mutex across both writes of
/// a frame (length prefix, then body) so concurrent senders cannot interleave
/// frame fragments.
pub struct Peer {
    pub id: String,
    pub addr: String,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    closed: AtomicBool,
}

impl Peer {
    /// Wrap an established TCP connection as a Peer.
    pub fn new(id: &str, addr: &str, stream: TcpStream) -> Arc<Self> {
        let (reader, writer) = stream.into_split();
        Arc::new(Self {
            id: id.to_string(),
            addr: addr.to_string(),
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        })
    }

    /// Dial the remote address and return a connected Peer.
    pub async fn connect(id: &str, addr: &str) -> Result<Arc<Self>, NetError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(id, addr, stream))
    }

    /// Write a length-prefixed JSON message to the peer.
    pub async fn send(&self, msg: &Message) -> Result<(), NetError> {
        let body = codec::encode_message(msg)?;
        if self.closed.load(Ordering::Acquire) {
            return Err(NetError::PeerClosed {
                id: self.id.clone(),
            });
        }
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&(body.len() as u32).to_be_bytes())
            .await?;
        writer.write_all(&body).await?;
        Ok(())
    }

    /// Read the next message. The read deadline prevents a stalled peer from
    /// holding its read task forever.
    pub async fn receive(&self) -> Result<Message, NetError> {
        let mut reader = self.reader.lock().await;
        tokio::time::timeout(PEER_READ_TIMEOUT, codec::read_message(&mut *reader))
            .await
            .map_err(|_| NetError::ReadTimeout)?
    }

    /// Terminate the peer connection.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let mut writer = self.writer.lock().await;
            let _ = writer.shutdown().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
