//! In-memory connection used by the unit tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::conn::{Conn, Deadline, Dialer, DialerContext, FrameReader, FrameWriter, Transport};
use crate::error::{Error, TransportError};
use crate::frame::{Frame, OpCode};

/// Everything the local side emitted, as seen by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Written {
    Frame(Frame),
    Flush,
    Close,
}

pub struct MockReader {
    rx: mpsc::UnboundedReceiver<Frame>,
    deadline: Deadline,
}

impl FrameReader for MockReader {
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        let rx = &mut self.rx;
        self.deadline
            .run(async move { rx.recv().await.ok_or(TransportError::ConnectionClosed) })
            .await
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline.set(deadline);
    }
}

pub struct MockWriter {
    tx: mpsc::UnboundedSender<Written>,
    stall: Arc<AtomicBool>,
    deadline: Deadline,
}

impl MockWriter {
    async fn emit(&mut self, written: Written) -> Result<(), TransportError> {
        let stall = self.stall.clone();
        let tx = self.tx.clone();
        self.deadline
            .run(async move {
                while stall.load(Ordering::Acquire) {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                tx.send(written).map_err(|_| TransportError::ConnectionClosed)
            })
            .await
    }
}

impl FrameWriter for MockWriter {
    async fn write_frame(&mut self, opcode: OpCode, payload: &[u8]) -> Result<(), TransportError> {
        self.emit(Written::Frame(Frame::new(opcode, payload.to_vec())))
            .await
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        self.emit(Written::Flush).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx
            .send(Written::Close)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline.set(deadline);
    }
}

pub struct MockConn {
    reader: MockReader,
    writer: MockWriter,
}

impl FrameReader for MockConn {
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        self.reader.read_frame().await
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.reader.set_read_deadline(deadline);
    }
}

impl FrameWriter for MockConn {
    async fn write_frame(&mut self, opcode: OpCode, payload: &[u8]) -> Result<(), TransportError> {
        self.writer.write_frame(opcode, payload).await
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        self.writer.flush().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.writer.close().await
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) {
        self.writer.set_write_deadline(deadline);
    }
}

impl Conn for MockConn {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn split(self) -> (MockReader, MockWriter) {
        (self.reader, self.writer)
    }
}

/// The remote end of a [`MockConn`].
pub struct Peer {
    tx: Option<mpsc::UnboundedSender<Frame>>,
    rx: mpsc::UnboundedReceiver<Written>,
    stall: Arc<AtomicBool>,
}

impl Peer {
    /// Delivers a frame to the local reader.
    pub fn send(&self, frame: Frame) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(frame);
        }
    }

    /// Ends the inbound stream; the local reader sees `ConnectionClosed`.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }

    /// Makes local writes and flushes block until cleared.
    pub fn stall_writes(&self, stall: bool) {
        self.stall.store(stall, Ordering::Release);
    }

    pub async fn next(&mut self) -> Option<Written> {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next written frame, skipping flush markers.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.next().await? {
                Written::Frame(frame) => return Some(frame),
                Written::Flush => continue,
                Written::Close => return None,
            }
        }
    }

    /// Everything written so far without waiting.
    pub fn drain(&mut self) -> Vec<Written> {
        let mut out = Vec::new();
        while let Ok(w) = self.rx.try_recv() {
            out.push(w);
        }
        out
    }
}

pub fn pair() -> (MockConn, Peer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let stall = Arc::new(AtomicBool::new(false));
    let conn = MockConn {
        reader: MockReader {
            rx: in_rx,
            deadline: Deadline::default(),
        },
        writer: MockWriter {
            tx: out_tx,
            stall: stall.clone(),
            deadline: Deadline::default(),
        },
    };
    let peer = Peer {
        tx: Some(in_tx),
        rx: out_rx,
        stall,
    };
    (conn, peer)
}

/// Hands out pre-built connections and sends the id as a login frame.
#[derive(Default)]
pub struct MockDialer {
    conns: Mutex<Vec<MockConn>>,
    delay: Duration,
    seen: Mutex<Vec<DialerContext>>,
}

impl MockDialer {
    pub fn new(conns: Vec<MockConn>) -> Self {
        Self {
            conns: Mutex::new(conns),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn seen(&self) -> Vec<DialerContext> {
        self.seen.lock().unwrap().clone()
    }
}

impl Dialer for MockDialer {
    type Conn = MockConn;

    async fn dial_and_handshake(&self, ctx: DialerContext) -> Result<MockConn, Error> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let conn = self.conns.lock().unwrap().pop();
        let id = ctx.id.clone();
        self.seen.lock().unwrap().push(ctx);
        let mut conn = conn.ok_or_else(|| Error::HandshakeFailed("connection refused".into()))?;
        conn.write_frame(OpCode::Binary, id.as_bytes()).await?;
        conn.flush().await?;
        Ok(conn)
    }
}

/// Transport for servers whose connections are injected directly.
pub struct MockTransport;

impl Transport for MockTransport {
    type Conn = MockConn;

    fn name(&self) -> &'static str {
        "mock"
    }

    async fn upgrade(&self, _stream: TcpStream) -> Result<MockConn, TransportError> {
        Err(TransportError::Protocol("mock transport cannot upgrade sockets".into()))
    }
}
