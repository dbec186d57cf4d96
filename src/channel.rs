//! # Duplex channel between a supervisor and one worker.
//!
//! A channel is an ordered, reliable, bidirectional pipe of text frames with
//! exactly two [`Endpoint`]s. Frames are JSON produced by [`codec`](crate::codec),
//! so only plain data ever travels through it.
//!
//! Two ways to obtain endpoints:
//! - [`pair`] for units living in the same process (tokio tasks/threads);
//! - [`framed`] to run one end over any byte stream (child-process pipes,
//!   sockets) as newline-delimited JSON.
//!
//! ```text
//!  supervisor ─ Endpoint ══ frames (FIFO) ══ Endpoint ─ worker
//! ```

use futures::{SinkExt, StreamExt};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

use crate::codec;
use crate::error::{CodecError, RuntimeError};

/// One end of a duplex channel.
#[derive(Debug)]
pub struct Endpoint {
    tx: mpsc::Sender<String>,
    rx: mpsc::Receiver<String>,
}

/// Creates a connected pair of endpoints; each direction buffers `capacity` frames.
pub fn pair(capacity: usize) -> (Endpoint, Endpoint) {
    let capacity = capacity.max(1);
    let (a_tx, b_rx) = mpsc::channel(capacity);
    let (b_tx, a_rx) = mpsc::channel(capacity);
    (
        Endpoint { tx: a_tx, rx: a_rx },
        Endpoint { tx: b_tx, rx: b_rx },
    )
}

impl Endpoint {
    /// Sends one raw frame.
    pub async fn send_frame(&self, frame: String) -> Result<(), RuntimeError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Receives the next raw frame; `None` once the peer is gone.
    pub async fn recv_frame(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Encodes and sends `value`.
    pub async fn send<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), RuntimeError> {
        let frame = codec::encode(value, 0)?;
        self.send_frame(frame).await
    }

    /// Receives and decodes the next frame.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Option<Result<T, CodecError>> {
        let frame = self.rx.recv().await?;
        Some(codec::decode(&frame))
    }

    /// Splits into the sending and receiving halves.
    pub fn into_parts(self) -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        (self.tx, self.rx)
    }
}

/// Runs a channel over a byte stream as newline-delimited frames.
///
/// Returns the local endpoint; two pump tasks move frames between it and the
/// stream. Lines longer than `max_frame_bytes` (`0` = unlimited) are skipped
/// with a warning. The pumps stop at EOF, on I/O errors, or once the returned
/// endpoint is dropped.
pub fn framed<R, W>(reader: R, writer: W, capacity: usize, max_frame_bytes: usize) -> Endpoint
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (local, remote) = pair(capacity);
    let (to_local, mut from_local) = remote.into_parts();

    tokio::spawn(async move {
        let mut input = FramedRead::new(reader, LinesCodec::new());
        while let Some(line) = input.next().await {
            match line {
                Ok(frame) if frame.is_empty() => continue,
                Ok(frame) if max_frame_bytes > 0 && frame.len() > max_frame_bytes => {
                    tracing::warn!(
                        len = frame.len(),
                        max = max_frame_bytes,
                        "inbound frame too large; dropped"
                    );
                }
                Ok(frame) => {
                    if to_local.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(LinesCodecError::MaxLineLengthExceeded) => break,
                Err(LinesCodecError::Io(e)) => {
                    tracing::debug!(error = %e, "channel reader stopped");
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        let mut output = FramedWrite::new(writer, LinesCodec::new());
        while let Some(frame) = from_local.recv().await {
            if let Err(e) = output.send(frame).await {
                tracing::debug!(error = %e, "channel writer stopped");
                break;
            }
        }
    });

    local
}
