//! Buffered TCP connection speaking the length-prefixed frame format.

use std::net::SocketAddr;

use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::Instant;

use portico_core::{Conn, Deadline, Frame, FrameReader, FrameWriter, OpCode, TransportError};

use crate::wire;

/// Read half of a [`TcpConn`].
pub struct TcpReader {
    inner: BufReader<OwnedReadHalf>,
    deadline: Deadline,
}

/// Write half of a [`TcpConn`].
pub struct TcpWriter {
    inner: BufWriter<OwnedWriteHalf>,
    deadline: Deadline,
}

/// A framed TCP connection.
pub struct TcpConn {
    reader: TcpReader,
    writer: TcpWriter,
    peer: Option<SocketAddr>,
}

impl TcpConn {
    pub fn new(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        let (read, write) = stream.into_split();
        Self {
            reader: TcpReader {
                inner: BufReader::new(read),
                deadline: Deadline::default(),
            },
            writer: TcpWriter {
                inner: BufWriter::new(write),
                deadline: Deadline::default(),
            },
            peer,
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl FrameReader for TcpReader {
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        self.deadline.run(wire::read_frame(&mut self.inner)).await
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline.set(deadline);
    }
}

impl FrameWriter for TcpWriter {
    async fn write_frame(&mut self, opcode: OpCode, payload: &[u8]) -> Result<(), TransportError> {
        self.deadline
            .run(wire::write_frame(&mut self.inner, opcode, payload))
            .await
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        let inner = &mut self.inner;
        self.deadline
            .run(async move { inner.flush().await.map_err(TransportError::from) })
            .await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let inner = &mut self.inner;
        self.deadline
            .run(async move { inner.shutdown().await.map_err(TransportError::from) })
            .await
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline.set(deadline);
    }
}

impl FrameReader for TcpConn {
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        self.reader.read_frame().await
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.reader.set_read_deadline(deadline);
    }
}

impl FrameWriter for TcpConn {
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

impl Conn for TcpConn {
    type Reader = TcpReader;
    type Writer = TcpWriter;

    fn split(self) -> (TcpReader, TcpWriter) {
        (self.reader, self.writer)
    }
}
