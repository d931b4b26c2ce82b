//! length-prefixed framing over a `TcpStream` (§6): a 4-byte big-endian length
//! followed by a bincode-encoded [`Message`]. Shared by the listeners and the
//! transmitter so both sides of a link agree on exactly one encoding.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::errors::{CoordinatorError, Result};
use crate::message::Message;

/// generous enough for a cropped detection image, small enough to bound memory
/// use against a corrupted or hostile length prefix.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

pub async fn write_frame(stream: &mut TcpStream, msg: &Message) -> Result<()> {
    let body = bincode::serialize(msg)?;
    if body.len() > MAX_FRAME_BYTES {
        return Err(CoordinatorError::FrameTooLarge(body.len(), MAX_FRAME_BYTES));
    }
    let len = body.len() as u32;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(&body).await?;
    stream.flush().await?;
    Ok(())
}

/// reads exactly one frame. Returns `Ok(None)` on a clean EOF before any bytes
/// of the next length prefix arrive; any other short read is a `FramingError`.
pub async fn read_frame(stream: &mut TcpStream) -> Result<Option<Message>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 {
        return Err(CoordinatorError::FramingError("zero-length frame".into()));
    }
    if len > MAX_FRAME_BYTES {
        return Err(CoordinatorError::FrameTooLarge(len, MAX_FRAME_BYTES));
    }
    let mut body = vec![0u8; len];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|_| CoordinatorError::FramingError("truncated frame body".into()))?;
    let msg = bincode::deserialize(&body)?;
    Ok(Some(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskId;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn round_trip_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            read_frame(&mut sock).await.unwrap().unwrap()
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let msg = Message::Request { task_id: TaskId::new(1, 3), deadline: 123.0, last_sender: 1 };
        write_frame(&mut client, &msg).await.unwrap();

        let received = accept.await.unwrap();
        assert_eq!(received.kind(), "REQUEST");
        assert_eq!(received.task_id(), Some(TaskId::new(1, 3)));
    }

    #[tokio::test]
    async fn eof_before_any_bytes_is_none() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            read_frame(&mut sock).await
        });

        let client = TcpStream::connect(addr).await.unwrap();
        drop(client);

        let result = accept.await.unwrap().unwrap();
        assert!(result.is_none());
    }
}
