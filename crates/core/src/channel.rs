//! A managed connection: identity, bounded write queue, read loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::conn::{Conn, FrameReader, FrameWriter, write_and_flush};
use crate::constants::{DEFAULT_READ_WAIT, DEFAULT_WRITE_WAIT, WRITE_QUEUE_CAPACITY};
use crate::error::{Error, TransportError};
use crate::event::Event;
use crate::frame::OpCode;
use crate::listener::{Agent, BoxFuture, MessageListener};

/// Read and write timeouts, shared with the write pump.
#[derive(Debug)]
struct Waits {
    read: AtomicU64,
    write: AtomicU64,
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl Waits {
    fn new() -> Self {
        Self {
            read: AtomicU64::new(nanos(DEFAULT_READ_WAIT)),
            write: AtomicU64::new(nanos(DEFAULT_WRITE_WAIT)),
        }
    }

    fn read(&self) -> Duration {
        Duration::from_nanos(self.read.load(Ordering::Relaxed))
    }

    fn write(&self) -> Duration {
        Duration::from_nanos(self.write.load(Ordering::Relaxed))
    }
}

/// Set by the write pump when a write fails, so the read loop can end.
#[derive(Debug, Default)]
struct WriteFailure {
    event: Event,
    error: std::sync::Mutex<Option<TransportError>>,
}

impl WriteFailure {
    fn report(&self, err: TransportError) {
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err);
        self.event.fire();
    }

    fn take(&self) -> TransportError {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or(TransportError::ConnectionClosed)
    }
}

/// One connected peer.
///
/// Outbound payloads go through a bounded queue drained by a dedicated write
/// pump task, so [`push`](Self::push) applies backpressure instead of
/// buffering without limit. Inbound frames are consumed by
/// [`readloop`](Self::readloop) in the caller's task.
pub struct Channel<C: Conn> {
    id: String,
    reader: Mutex<C::Reader>,
    writer: Arc<Mutex<C::Writer>>,
    queue: std::sync::Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    closed: Event,
    write_failure: Arc<WriteFailure>,
    waits: Arc<Waits>,
}

impl<C: Conn> Channel<C> {
    /// Wraps `conn` and starts its write pump. Must be called inside a runtime.
    pub fn new(id: impl Into<String>, conn: C) -> Arc<Self> {
        let id = id.into();
        let (reader, writer) = conn.split();
        let writer = Arc::new(Mutex::new(writer));
        let (tx, rx) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        let closed = Event::new();
        let waits = Arc::new(Waits::new());
        let write_failure = Arc::new(WriteFailure::default());

        tokio::spawn(write_pump(
            id.clone(),
            writer.clone(),
            rx,
            closed.clone(),
            write_failure.clone(),
            waits.clone(),
        ));

        Arc::new(Self {
            id,
            reader: Mutex::new(reader),
            writer,
            queue: std::sync::Mutex::new(Some(tx)),
            closed,
            write_failure,
            waits,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queues `payload` for the write pump, waiting while the queue is full.
    pub async fn push(&self, payload: Vec<u8>) -> Result<(), Error> {
        let sender = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sender) = sender else {
            return Err(Error::ChannelClosed(self.id.clone()));
        };
        sender
            .send(payload)
            .await
            .map_err(|_| Error::ChannelClosed(self.id.clone()))
    }

    /// Reads frames until the peer closes, a read or a queued write fails,
    /// or the channel is closed locally. Application payloads are dispatched
    /// to `listener` on their own tasks.
    pub async fn readloop(self: &Arc<Self>, listener: Arc<dyn MessageListener>) -> Result<(), Error> {
        let mut reader = self.reader.lock().await;
        loop {
            reader.set_read_deadline(Some(Instant::now() + self.waits.read()));
            let frame = tokio::select! {
                biased;
                _ = self.closed.wait() => {
                    return Err(Error::ChannelClosed(self.id.clone()));
                }
                _ = self.write_failure.event.wait() => {
                    return Err(Error::Transport(self.write_failure.take()));
                }
                frame = reader.read_frame() => frame?,
            };

            match frame.opcode {
                OpCode::Close => {
                    debug!(id = %self.id, "close frame received");
                    return Err(Error::RemoteClosed);
                }
                OpCode::Ping => {
                    trace!(id = %self.id, "ping received");
                    if let Err(e) = self.write_control(OpCode::Pong, &[]).await {
                        debug!(id = %self.id, error = %e, "failed to write pong");
                    }
                    continue;
                }
                OpCode::Pong => {
                    trace!(id = %self.id, "pong received");
                    continue;
                }
                _ => {}
            }

            if frame.payload.is_empty() {
                continue;
            }

            let agent: Arc<dyn Agent> = self.clone();
            let listener = listener.clone();
            tokio::spawn(async move {
                listener.receive(agent, frame.payload).await;
            });
        }
    }

    /// Stops accepting pushes and signals the pump and read loop to stop.
    ///
    /// Returns `true` for the call that actually closed the channel. The
    /// socket stays open; see [`close_transport`](Self::close_transport).
    pub fn close(&self) -> bool {
        let sender = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let first = self.closed.fire();
        if first {
            debug!(id = %self.id, "channel closed");
        }
        first
    }

    pub fn is_closed(&self) -> bool {
        self.closed.has_fired()
    }

    /// Shuts the outbound side of the socket down, ignoring failures.
    pub async fn close_transport(&self) {
        let mut writer = self.writer.lock().await;
        writer.set_write_deadline(Some(Instant::now() + self.waits.write()));
        if let Err(e) = writer.close().await {
            debug!(id = %self.id, error = %e, "failed to close transport");
        }
    }

    /// Writes a frame outside the queue and flushes it.
    pub(crate) async fn write_control(&self, opcode: OpCode, payload: &[u8]) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        write_and_flush(&mut *writer, opcode, payload, self.waits.write()).await
    }

    pub fn set_read_wait(&self, wait: Duration) {
        if !wait.is_zero() {
            self.waits.read.store(nanos(wait), Ordering::Relaxed);
        }
    }

    pub fn set_write_wait(&self, wait: Duration) {
        if !wait.is_zero() {
            self.waits.write.store(nanos(wait), Ordering::Relaxed);
        }
    }

    pub fn read_wait(&self) -> Duration {
        self.waits.read()
    }

    pub fn write_wait(&self) -> Duration {
        self.waits.write()
    }
}

impl<C: Conn> Agent for Channel<C> {
    fn id(&self) -> &str {
        &self.id
    }

    fn push(&self, payload: Vec<u8>) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(Channel::<C>::push(self, payload))
    }
}

impl<C: Conn> std::fmt::Debug for Channel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn write_pump<W: FrameWriter>(
    id: String,
    writer: Arc<Mutex<W>>,
    mut rx: mpsc::Receiver<Vec<u8>>,
    closed: Event,
    write_failure: Arc<WriteFailure>,
    waits: Arc<Waits>,
) {
    loop {
        let first = tokio::select! {
            biased;
            _ = closed.wait() => break,
            payload = rx.recv() => match payload {
                Some(payload) => payload,
                None => break,
            },
        };

        // A started batch runs to completion (bounded by the write deadline)
        // so a close never leaves half a frame in the writer.
        if let Err(e) = write_batch(&writer, first, &mut rx, waits.write()).await {
            warn!(id = %id, error = %e, "write failed");
            write_failure.report(e);
            break;
        }
    }
    // Dropping the receiver fails any push still waiting for room.
    drop(rx);
    debug!(id = %id, "write pump exited");
}

/// Writes `first` plus whatever is already queued, then flushes once.
async fn write_batch<W: FrameWriter>(
    writer: &Mutex<W>,
    first: Vec<u8>,
    rx: &mut mpsc::Receiver<Vec<u8>>,
    write_wait: Duration,
) -> Result<(), TransportError> {
    let mut writer = writer.lock().await;
    writer.set_write_deadline(Some(Instant::now() + write_wait));
    writer.write_frame(OpCode::Binary, &first).await?;

    for _ in 0..WRITE_QUEUE_CAPACITY {
        let Ok(next) = rx.try_recv() else { break };
        writer.set_write_deadline(Some(Instant::now() + write_wait));
        writer.write_frame(OpCode::Binary, &next).await?;
    }
    writer.flush().await
}
