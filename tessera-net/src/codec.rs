use tokio::io::{AsyncRead, AsyncReadExt};

use tessera_types::constants::MAX_MESSAGE_SIZE;
use tessera_types::network::Message;

use crate::error::NetError;

/// Encode a message into its JSON wire body (without the length prefix).
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, NetError> {
    let body = serde_json::to_vec(msg).map_err(|e| NetError::Codec {
        reason: e.to_string(),
    })?;
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(NetError::MessageTooLarge {
            size: body.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(body)
}

/// Read one length-prefixed JSON message from an async reader.
///
/// Wire format: `[4-byte BE length][JSON body]`, length capped at 32 MiB so a
/// hostile peer cannot force an unbounded allocation.
pub async fn read_message<R>(io: &mut R) -> Result<Message, NetError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    io.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(NetError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buf = vec![0u8; len];
    io.read_exact(&mut buf).await?;
    serde_json::from_slice(&buf).map_err(|e| NetError::Codec {
        reason: e.to_string(),
    })
}
