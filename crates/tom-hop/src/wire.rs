//! Hop wire format: one MessagePack message per stream direction, prefixed
//! by its length as a big-endian `u32`.

use iroh::endpoint::{RecvStream, SendStream};
use serde::{Deserialize, Serialize};

use crate::error::HopError;

/// Largest accepted hop frame. Hop messages are a handful of bytes.
pub const MAX_FRAME_SIZE: usize = 4 * 1024;

/// Relay answer to a hop query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HopStatus {
    /// Relay will forward traffic for the asker.
    Success,
    /// Relay speaks the protocol but has hop turned off.
    HopDisabled,
    /// Relay did not understand the request.
    MalformedRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HopMessage {
    /// "Can you hop for me?"
    CanHop,
    Status(HopStatus),
}

/// Serialize a message into a length-prefixed frame.
pub(crate) fn encode_frame(msg: &HopMessage) -> Result<Vec<u8>, HopError> {
    let payload = rmp_serde::to_vec(msg)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(HopError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Validate a frame header and return the payload length.
pub(crate) fn frame_len(header: [u8; 4]) -> Result<usize, HopError> {
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(HopError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(len)
}

pub(crate) fn decode_payload(payload: &[u8]) -> Result<HopMessage, HopError> {
    Ok(rmp_serde::from_slice(payload)?)
}

/// Write one framed message and finish the send side.
pub(crate) async fn write_message(
    send: &mut SendStream,
    msg: &HopMessage,
) -> Result<(), HopError> {
    let frame = encode_frame(msg)?;
    send.write_all(&frame)
        .await
        .map_err(|e| HopError::Write(e.into()))?;
    send.finish().map_err(|e| HopError::Write(e.into()))?;
    Ok(())
}

/// Read one framed message.
pub(crate) async fn read_message(recv: &mut RecvStream) -> Result<HopMessage, HopError> {
    let mut header = [0u8; 4];
    recv.read_exact(&mut header)
        .await
        .map_err(|e| HopError::Read(e.into()))?;

    let len = frame_len(header)?;
    let mut payload = vec![0u8; len];
    recv.read_exact(&mut payload)
        .await
        .map_err(|e| HopError::Read(e.into()))?;

    decode_payload(&payload)
}
