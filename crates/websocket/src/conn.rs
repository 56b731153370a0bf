//! WebSocket connection mapped onto gateway frames.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};

use portico_core::constants::MAX_FRAME_SIZE;
use portico_core::{Conn, Deadline, Frame, FrameReader, FrameWriter, OpCode, TransportError};

/// Largest close reason that fits a control frame (125 bytes minus the code).
pub const MAX_CLOSE_REASON: usize = 123;

/// Read half of a [`WsConn`].
pub struct WsReader<S> {
    inner: SplitStream<WebSocketStream<S>>,
    deadline: Deadline,
}

/// Write half of a [`WsConn`].
///
/// tungstenite queues its own Pong (echoing the ping payload) for every Ping
/// it reads. Writing a Pong replaces that queued reply, but if another write
/// flushed it first the peer sees two pongs: the echo, then ours.
pub struct WsWriter<S> {
    inner: SplitSink<WebSocketStream<S>, Message>,
    deadline: Deadline,
}

/// A WebSocket connection over any async byte stream.
pub struct WsConn<S> {
    reader: WsReader<S>,
    writer: WsWriter<S>,
}

impl<S> WsConn<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(stream: WebSocketStream<S>) -> Self {
        let (sink, source) = stream.split();
        Self {
            reader: WsReader {
                inner: source,
                deadline: Deadline::default(),
            },
            writer: WsWriter {
                inner: sink,
                deadline: Deadline::default(),
            },
        }
    }
}

/// Maps a tungstenite error onto the transport taxonomy.
pub(crate) fn map_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::ConnectionClosed
        }
        tungstenite::Error::Io(e) => TransportError::Io(e),
        tungstenite::Error::Protocol(e) => TransportError::Protocol(e.to_string()),
        tungstenite::Error::Capacity(e) => TransportError::Protocol(e.to_string()),
        other => TransportError::Other(Box::new(other)),
    }
}

/// Converts an inbound message; raw frames are never surfaced by the reader.
fn into_frame(msg: Message) -> Option<Frame> {
    let frame = match msg {
        Message::Text(text) => Frame::new(OpCode::Text, text.as_str().as_bytes()),
        Message::Binary(data) => Frame::new(OpCode::Binary, data.to_vec()),
        Message::Ping(data) => Frame::new(OpCode::Ping, data.to_vec()),
        Message::Pong(data) => Frame::new(OpCode::Pong, data.to_vec()),
        Message::Close(close) => Frame::new(
            OpCode::Close,
            close
                .map(|c| c.reason.as_str().as_bytes().to_vec())
                .unwrap_or_default(),
        ),
        Message::Frame(_) => return None,
    };
    Some(frame)
}

fn close_reason(payload: &[u8]) -> String {
    let mut reason = String::from_utf8_lossy(payload).into_owned();
    if reason.len() > MAX_CLOSE_REASON {
        let mut end = MAX_CLOSE_REASON;
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        reason.truncate(end);
    }
    reason
}

fn into_message(opcode: OpCode, payload: &[u8]) -> Result<Message, TransportError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(TransportError::Protocol(format!(
            "payload too large: {} bytes (max {MAX_FRAME_SIZE})",
            payload.len()
        )));
    }
    let msg = match opcode {
        OpCode::Text => {
            let text = std::str::from_utf8(payload)
                .map_err(|_| TransportError::Protocol("text payload is not valid UTF-8".into()))?;
            Message::Text(text.into())
        }
        OpCode::Binary => Message::Binary(payload.to_vec().into()),
        OpCode::Ping => Message::Ping(payload.to_vec().into()),
        OpCode::Pong => Message::Pong(payload.to_vec().into()),
        OpCode::Close => Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: close_reason(payload).into(),
        })),
        OpCode::Continuation => {
            return Err(TransportError::Protocol(
                "continuation frames are not supported".into(),
            ));
        }
    };
    Ok(msg)
}

impl<S> FrameReader for WsReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        let inner = &mut self.inner;
        self.deadline
            .run(async move {
                loop {
                    match inner.next().await {
                        Some(Ok(msg)) => {
                            if let Some(frame) = into_frame(msg) {
                                return Ok(frame);
                            }
                        }
                        Some(Err(e)) => return Err(map_error(e)),
                        None => return Err(TransportError::ConnectionClosed),
                    }
                }
            })
            .await
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline.set(deadline);
    }
}

impl<S> FrameWriter for WsWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn write_frame(&mut self, opcode: OpCode, payload: &[u8]) -> Result<(), TransportError> {
        let msg = into_message(opcode, payload)?;
        let inner = &mut self.inner;
        self.deadline
            .run(async move { inner.feed(msg).await.map_err(map_error) })
            .await
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        let inner = &mut self.inner;
        self.deadline
            .run(async move { inner.flush().await.map_err(map_error) })
            .await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let inner = &mut self.inner;
        let result = self
            .deadline
            .run(async move { inner.close().await.map_err(map_error) })
            .await;
        match result {
            Err(TransportError::ConnectionClosed) => Ok(()),
            other => other,
        }
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline.set(deadline);
    }
}

impl<S> FrameReader for WsConn<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        self.reader.read_frame().await
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.reader.set_read_deadline(deadline);
    }
}

impl<S> FrameWriter for WsConn<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
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

impl<S> Conn for WsConn<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Reader = WsReader<S>;
    type Writer = WsWriter<S>;

    fn split(self) -> (WsReader<S>, WsWriter<S>) {
        (self.reader, self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_messages_map_to_frames() {
        let text = into_frame(Message::Text("hi".into())).unwrap();
        assert_eq!(text, Frame::new(OpCode::Text, "hi"));

        let binary = into_frame(Message::Binary(vec![1, 2, 3].into())).unwrap();
        assert_eq!(binary, Frame::binary(vec![1, 2, 3]));

        let close = into_frame(Message::Close(Some(CloseFrame {
            code: CloseCode::Policy,
            reason: "channel id is repeated: u1".into(),
        })))
        .unwrap();
        assert_eq!(close.opcode, OpCode::Close);
        assert_eq!(close.payload, b"channel id is repeated: u1");

        let bare_close = into_frame(Message::Close(None)).unwrap();
        assert!(bare_close.payload.is_empty());
    }

    #[test]
    fn outbound_frames_map_to_messages() {
        let msg = into_message(OpCode::Binary, b"abc").unwrap();
        assert_eq!(msg, Message::Binary(b"abc".to_vec().into()));

        let msg = into_message(OpCode::Pong, &[]).unwrap();
        assert_eq!(msg, Message::Pong(Vec::new().into()));

        let err = into_message(OpCode::Text, &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));

        let err = into_message(OpCode::Continuation, b"x").unwrap_err();
        assert!(err.to_string().contains("continuation"));
    }

    #[test]
    fn close_reason_is_truncated_on_char_boundary() {
        let long = "é".repeat(100);
        let reason = close_reason(long.as_bytes());
        assert!(reason.len() <= MAX_CLOSE_REASON);
        assert!(reason.chars().all(|c| c == 'é'));

        assert_eq!(close_reason(b"short"), "short");
    }

    #[test]
    fn closed_errors_map_to_connection_closed() {
        assert!(matches!(
            map_error(tungstenite::Error::ConnectionClosed),
            TransportError::ConnectionClosed
        ));
        assert!(matches!(
            map_error(tungstenite::Error::AlreadyClosed),
            TransportError::ConnectionClosed
        ));
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert!(matches!(map_error(tungstenite::Error::Io(io)), TransportError::Io(_)));
    }
}
