//! Per-connection session management.
//!
//! Each TCP connection gets a Session: a reader loop that decodes viewer
//! messages and hands them to the host actor, and a writer task that drains
//! the connection's outgoing queue onto the socket.
//!
//! Frames are a 4-byte big-endian length followed by a MessagePack body.

use syncpad_types::{ClientMessage, ServerMessage, WireError, MAX_MESSAGE_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{HostError, Result};
use crate::runtime::HostHandle;

/// A per-connection session.
pub struct Session {
    host: HostHandle,
    stream: TcpStream,
}

impl Session {
    /// Create a new session for a connection.
    pub fn new(host: HostHandle, stream: TcpStream) -> Self {
        Self { host, stream }
    }

    /// Run the session until the viewer disconnects.
    pub async fn run(self) -> Result<()> {
        let peer = self.stream.peer_addr().ok();
        let (mut reader, mut writer) = self.stream.into_split();
        let (connection, mut outgoing) = self.host.attach().await?;
        tracing::info!("New connection {} from {:?}", connection, peer);

        let writer_task = tokio::spawn(async move {
            while let Some(message) = outgoing.recv().await {
                if let Err(e) = write_message(&mut writer, &message).await {
                    tracing::debug!("Write to {} failed: {}", connection, e);
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        let result = loop {
            match read_message(&mut reader).await {
                Ok(Some(message)) => {
                    tracing::debug!("{} sent {:?}", connection, message);
                    if let Err(e) = self.host.client_message(connection, message).await {
                        break Err(e);
                    }
                }
                Ok(None) => {
                    tracing::debug!("Connection {} closed", connection);
                    break Ok(());
                }
                Err(e) => {
                    tracing::warn!("Dropping {}: {}", connection, e);
                    break Err(e);
                }
            }
        };

        // Detaching drops the outgoing queue, which ends the writer task.
        if self.host.detach(connection).await.is_err() {
            writer_task.abort();
        }
        let _ = writer_task.await;
        result
    }
}

/// Read a length-prefixed message. Returns `None` on a clean EOF.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<ClientMessage>>
where
    R: AsyncRead + Unpin,
{
    // Read 4-byte length prefix (big-endian)
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(HostError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;

    // Validate length
    if len > MAX_MESSAGE_SIZE {
        return Err(WireError::TooLarge {
            size: len,
            limit: MAX_MESSAGE_SIZE,
        }
        .into());
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;

    Ok(Some(ClientMessage::from_bytes(&buf)?))
}

/// Write a length-prefixed message.
pub async fn write_message<W>(writer: &mut W, message: &ServerMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = message.to_bytes()?;
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(WireError::TooLarge {
            size: bytes.len(),
            limit: MAX_MESSAGE_SIZE,
        }
        .into());
    }

    let len = bytes.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncpad_types::{AncillaryEvent, DocPath};

    fn frame(message: &ClientMessage) -> Vec<u8> {
        let body = message.to_bytes().unwrap();
        let mut out = (body.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(&body);
        out
    }

    #[tokio::test]
    async fn reads_consecutive_frames() {
        let mut bytes = frame(&ClientMessage::GetFiles);
        bytes.extend(frame(&ClientMessage::GetFile(DocPath::new("a.txt").unwrap())));
        let mut reader = bytes.as_slice();

        assert_eq!(
            read_message(&mut reader).await.unwrap(),
            Some(ClientMessage::GetFiles)
        );
        assert!(matches!(
            read_message(&mut reader).await.unwrap(),
            Some(ClientMessage::GetFile(_))
        ));
        assert_eq!(read_message(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let len = (MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes();
        let mut reader = &len[..];

        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, HostError::Wire(WireError::TooLarge { .. })));
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let mut bytes = frame(&ClientMessage::GetFiles);
        bytes.pop();
        let mut reader = bytes.as_slice();

        assert!(read_message(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn written_frame_has_length_prefix() {
        let message =
            ServerMessage::Ancillary(AncillaryEvent::new("clear", serde_json::Value::Null));
        let mut out = Vec::new();
        write_message(&mut out, &message).await.unwrap();

        let len = u32::from_be_bytes([out[0], out[1], out[2], out[3]]) as usize;
        assert_eq!(len, out.len() - 4);
        assert_eq!(ServerMessage::from_bytes(&out[4..]).unwrap(), message);
    }
}
