//! TCP wire format.
//!
//! # Wire format
//!
//! ```text
//! FRAME:
//!   [1 byte: opcode]           0x0 continuation, 0x1 text, 0x2 binary,
//!                              0x8 close, 0x9 ping, 0xa pong
//!   [4 bytes BE: payload_len]  at most MAX_FRAME_SIZE
//!   [payload_len bytes: payload]
//! ```

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use portico_core::constants::MAX_FRAME_SIZE;
use portico_core::{Frame, OpCode, TransportError};

/// Bytes preceding every payload.
pub const HEADER_LEN: usize = 5;

/// Writes one frame. Nothing is flushed.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    opcode: OpCode,
    payload: &[u8],
) -> Result<(), TransportError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(TransportError::Protocol(format!(
            "payload too large: {} bytes (max {MAX_FRAME_SIZE})",
            payload.len()
        )));
    }

    writer.write_u8(opcode.into()).await?;
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    Ok(())
}

/// Reads one frame.
///
/// A clean end of stream before the first header byte is reported as
/// [`TransportError::ConnectionClosed`].
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, TransportError> {
    let code = match reader.read_u8().await {
        Ok(code) => code,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            return Err(TransportError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    };
    let opcode = OpCode::try_from(code)?;

    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_SIZE {
        return Err(TransportError::Protocol(format!(
            "frame too large: {len} bytes (max {MAX_FRAME_SIZE})"
        )));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Frame { opcode, payload })
}
