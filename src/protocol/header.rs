// src/protocol/header.rs
//! The 10-byte frame every FastDFS message carries: an 8-byte big-endian
//! body length, a 1-byte command code, and a 1-byte status (0 on success,
//! `errno` on failure).

use crate::buffer::Buffer;
use crate::error::{CoreError, CoreResult};

/// Wire size of a [`Header`].
pub const HEADER_LEN: usize = 10;

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Length of the body that follows this header, in bytes.
    pub body_len: u64,
    /// Command code (see [`super::command::Command`]).
    pub cmd: u8,
    /// 0 on success, an `errno`-style value on failure.
    pub status: u8,
}

impl Header {
    /// Builds a header for an outgoing request (`status` is always 0).
    pub fn request(body_len: u64, cmd: u8) -> Self {
        Self {
            body_len,
            cmd,
            status: 0,
        }
    }

    /// Builds a header for an outgoing response, command code 100.
    pub fn response(body_len: u64, status: u8) -> Self {
        Self {
            body_len,
            cmd: super::command::RESPONSE,
            status,
        }
    }

    /// Encodes the header into its 10-byte wire form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = Buffer::new(HEADER_LEN);
        buf.put_u64(self.body_len).expect("header buffer is exactly HEADER_LEN");
        buf.put_byte(self.cmd).expect("header buffer is exactly HEADER_LEN");
        buf.put_byte(self.status).expect("header buffer is exactly HEADER_LEN");
        let mut out = [0u8; HEADER_LEN];
        out.copy_from_slice(buf.as_slice());
        out
    }

    /// Decodes a 10-byte frame header. `InvalidArgument` if `bytes` is not
    /// exactly [`HEADER_LEN`] long — FastDFS headers are fixed-size, there
    /// is no partial-header case once the bytes are in hand.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() != HEADER_LEN {
            return Err(CoreError::InvalidArgument(format!(
                "header must be {HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut buf = Buffer::from_vec(bytes.to_vec());
        let body_len = buf.get_u64().map_err(CoreError::from)?;
        let cmd = buf.get_byte().map_err(CoreError::from)?;
        let status = buf.get_byte().map_err(CoreError::from)?;
        Ok(Self {
            body_len,
            cmd,
            status,
        })
    }
}
