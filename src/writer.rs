//! Per-connection writer task.
//!
//! Handlers on many tasks may answer on the same connection. Instead of
//! locking the write half, each connection owns one writer task fed by an
//! mpsc channel of fully encoded envelopes. The task drains whatever is
//! queued and writes it with a single vectored write where possible.
//!
//! ```text
//! Handler 1 ─┐
//! Handler 2 ─┼─► mpsc::Sender<Bytes> ─► Writer Task ─► write half
//! Handler N ─┘
//! ```

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, WireError};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum envelopes written in one batch.
const MAX_BATCH_SIZE: usize = 64;

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Envelopes that may queue before `send` waits.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for queueing envelopes on a writer task.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Bytes>,
}

impl WriterHandle {
    /// Queue one encoded envelope.
    ///
    /// Fails with [`WireError::ConnectionClosed`] once the writer task has
    /// stopped.
    pub async fn send(&self, envelope: Bytes) -> Result<()> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| WireError::ConnectionClosed)
    }

    /// Whether the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task for `writer`.
///
/// The task ends cleanly when every [`WriterHandle`] is dropped, or with
/// an error when a write fails.
pub fn spawn_writer_task<W>(writer: W, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<Bytes>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(first) = rx.recv().await {
        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(envelope) => batch.push(envelope),
                Err(_) => break,
            }
        }

        write_batch(&mut writer, &batch).await?;
    }
    Ok(())
}

/// Write a batch with `write_vectored`, continuing after partial writes.
async fn write_batch<W>(writer: &mut W, batch: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(|b| b.len()).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(WireError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Slices covering everything after the first `skip_bytes` of the batch.
fn build_remaining_slices(batch: &[Bytes], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0;

    for envelope in batch {
        let end = offset + envelope.len();
        if skip_bytes < end && !envelope.is_empty() {
            let start = skip_bytes.saturating_sub(offset);
            slices.push(IoSlice::new(&envelope[start..]));
        }
        offset = end;
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Envelope, FrameBuffer, HEADER_SIZE};
    use std::io::Cursor;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt};

    fn envelope(contract: u32, payload: &'static [u8]) -> Bytes {
        Envelope::new(contract, 0, Bytes::from_static(payload)).encode()
    }

    #[tokio::test]
    async fn test_writer_handle_send() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default());

        handle.send(envelope(1, b"hello")).await.unwrap();

        let mut buf = vec![0u8; HEADER_SIZE + 5];
        tokio::time::timeout(Duration::from_secs(1), server.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();

        let envelopes = FrameBuffer::new().push(&buf).unwrap();
        assert_eq!(envelopes[0].payload(), b"hello");
    }

    #[tokio::test]
    async fn test_writer_keeps_order() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, WriterConfig { channel_capacity: 4 });

        for i in 0..10u32 {
            handle.send(envelope(i, b"abcd")).await.unwrap();
        }

        let mut buf = vec![0u8; 10 * (HEADER_SIZE + 4)];
        tokio::time::timeout(Duration::from_secs(1), server.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();

        let envelopes = FrameBuffer::new().push(&buf).unwrap();
        let contracts: Vec<u32> = envelopes.iter().map(|e| e.contract()).collect();
        assert_eq!(contracts, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_build_remaining_slices() {
        let batch = vec![envelope(1, b"hello"), envelope(2, b"abc")];

        let all = build_remaining_slices(&batch, 0);
        assert_eq!(all.len(), 2);

        let partial = build_remaining_slices(&batch, 5);
        assert_eq!(partial[0].len(), HEADER_SIZE);
        assert_eq!(partial[1].len(), HEADER_SIZE + 3);

        let second_only = build_remaining_slices(&batch, HEADER_SIZE + 5 + 1);
        assert_eq!(second_only.len(), 1);
        assert_eq!(second_only[0].len(), HEADER_SIZE + 2);
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());
        let batch: Vec<_> = (0..5).map(|i| envelope(i, b"abc")).collect();

        write_batch(&mut buf, &batch).await.unwrap();

        assert_eq!(buf.into_inner().len(), 5 * (HEADER_SIZE + 3));
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());

        drop(handle);

        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_send_after_peer_gone() {
        let (client, server) = duplex(64);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());
        drop(server);

        handle.send(envelope(1, b"lost")).await.unwrap();
        assert!(task.await.unwrap().is_err());

        assert!(handle.is_closed());
        assert!(matches!(
            handle.send(envelope(1, b"late")).await,
            Err(WireError::ConnectionClosed)
        ));
    }
}
