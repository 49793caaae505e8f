//! Chunked transfer of payloads larger than one attribute value
//!
//! Read cycle: the first read prepares the payload and returns its 4-byte
//! length, each following read returns the next chunk. Write cycle: the first
//! write is the 4-byte length, following writes are appended until the
//! announced length is reached.

use std::sync::{Mutex, MutexGuard, PoisonError};

use casanode_proto::{CHUNK_SIZE, ERROR_SENTINEL, decode_length, encode_length};
use futures::future::BoxFuture;


/// Outbound side of a cycle
#[derive(Debug, Default)]
pub struct ChunkReader {
    payload: Vec<u8>,
    cursor: usize,
    length_sent: bool,
}

impl ChunkReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// No cycle running, the next read must prepare a payload
    pub fn is_idle(&self) -> bool {
        !self.length_sent && self.cursor == 0
    }

    pub fn start(&mut self, payload: Vec<u8>) {
        self.payload = payload;
        self.cursor = 0;
        self.length_sent = false;
    }

    /// Next transfer of the cycle. The cycle resets once the last chunk is out.
    pub fn next_transfer(&mut self) -> Vec<u8> {
        let out = if self.length_sent {
            let end = (self.cursor + CHUNK_SIZE).min(self.payload.len());
            let chunk = self.payload[self.cursor..end].to_vec();
            self.cursor = end;
            chunk
        } else {
            self.length_sent = true;
            encode_length(self.payload.len() as u32).to_vec()
        };

        if self.cursor >= self.payload.len() {
            self.payload.clear();
            self.cursor = 0;
            self.length_sent = false;
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteProgress {
    /// Length prefix accepted
    Started { expected: u32 },
    Partial { received: usize, expected: u32 },
    /// Cycle finished, the writer is reset
    Complete(Vec<u8>),
}

/// The first write of a cycle was not a 4-byte length prefix
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected a 4-byte length prefix, got {0} bytes")]
pub struct ProtocolViolation(pub usize);

/// Inbound side of a cycle
#[derive(Debug, Default)]
pub struct ChunkWriter {
    expected: Option<u32>,
    buffer: Vec<u8>,
}

impl ChunkWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.expected.is_none()
    }

    pub fn push(&mut self, data: &[u8]) -> Result<WriteProgress, ProtocolViolation> {
        let Some(expected) = self.expected else {
            let expected = decode_length(data).ok_or(ProtocolViolation(data.len()))?;
            self.buffer.clear();
            if expected == 0 {
                return Ok(WriteProgress::Complete(Vec::new()));
            }
            self.expected = Some(expected);
            return Ok(WriteProgress::Started { expected });
        };

        self.buffer.extend_from_slice(data);
        if self.buffer.len() >= expected as usize {
            self.expected = None;
            Ok(WriteProgress::Complete(std::mem::take(&mut self.buffer)))
        } else {
            Ok(WriteProgress::Partial {
                received: self.buffer.len(),
                expected,
            })
        }
    }
}

/// The steps a chunked attribute delegates.
pub trait ChunkedTransfer: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Build the payload for a read cycle. `None` sends the error sentinel.
    fn prepare(&self) -> BoxFuture<'_, Option<Vec<u8>>>;

    /// Consume a fully received write cycle
    fn complete(&self, payload: Vec<u8>) -> BoxFuture<'_, ()>;
}

/// Reader and writer state glued to a [`ChunkedTransfer`].
///
/// State locks are never held across `prepare` or `complete`. Reads are
/// serialised among themselves so a cycle prepares its payload once.
pub struct ChunkedAttribute<T: ChunkedTransfer> {
    transfer: T,
    reader: Mutex<ChunkReader>,
    writer: Mutex<ChunkWriter>,
    read_turn: tokio::sync::Mutex<()>,
}

impl<T: ChunkedTransfer> ChunkedAttribute<T> {
    pub fn new(transfer: T) -> Self {
        Self {
            transfer,
            reader: Mutex::new(ChunkReader::new()),
            writer: Mutex::new(ChunkWriter::new()),
            read_turn: tokio::sync::Mutex::new(()),
        }
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    pub async fn read(&self) -> Vec<u8> {
        let _turn = self.read_turn.lock().await;
        let name = self.transfer.name();

        if lock(&self.reader).is_idle() {
            let payload = match self.transfer.prepare().await {
                Some(payload) if !payload.is_empty() => payload,
                _ => {
                    tracing::warn!(attribute = name, "nothing to send, returning error sentinel");
                    ERROR_SENTINEL.to_vec()
                }
            };
            tracing::info!(attribute = name, length = payload.len(), "read cycle started");
            lock(&self.reader).start(payload);
        }

        let out = lock(&self.reader).next_transfer();
        tracing::debug!(attribute = name, size = out.len(), "sent transfer");
        out
    }

    /// Feed one write. The writer resets before `complete` runs, whatever its outcome.
    pub async fn write(&self, data: &[u8]) -> Result<(), ProtocolViolation> {
        let name = self.transfer.name();
        let progress = lock(&self.writer).push(data);

        match progress {
            Ok(WriteProgress::Started { expected }) => {
                tracing::info!(attribute = name, expected, "write cycle started");
            }
            Ok(WriteProgress::Partial { received, expected }) => {
                tracing::debug!(attribute = name, received, expected, "received chunk");
            }
            Ok(WriteProgress::Complete(payload)) => {
                tracing::info!(attribute = name, length = payload.len(), "write cycle complete");
                self.transfer.complete(payload).await;
            }
            Err(violation) => {
                tracing::error!(attribute = name, "{violation}");
                return Err(violation);
            }
        }
        Ok(())
    }
}

fn lock<S>(state: &Mutex<S>) -> MutexGuard<'_, S> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
