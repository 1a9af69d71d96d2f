//! Expiring Record Envelope
//!
//! Every expiring key stores its payload wrapped in a small envelope that
//! carries the absolute expiry instant next to the caller's bytes.
//!
//! ## Layout
//!
//! ```text
//! ┌────────┬─────────┬──────────────────┬──────────────────┬─────────────┐
//! │ magic  │ version │ expire_at (i64)  │ payload len (u64)│ payload ... │
//! │ 2 bytes│ 1 byte  │ 8 bytes, BE      │ 8 bytes, BE      │ len bytes   │
//! └────────┴─────────┴──────────────────┴──────────────────┴─────────────┘
//! ```
//!
//! `expire_at` is in seconds since the Unix epoch, `0` meaning "never".
//! Decoding rejects anything that does not match this structure exactly, so a
//! plain value read through the expiring path fails loudly instead of being
//! mistaken for a record.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::DecodeError;

const MAGIC: [u8; 2] = [0x78, 0x6b];
const VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 1 + 8 + 8;

/// Expiry value meaning the record never expires.
pub const NO_EXPIRY: i64 = 0;

/// A decoded expiring record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// The caller's value
    pub payload: Bytes,
    /// Absolute expiry in Unix seconds, or [`NO_EXPIRY`]
    pub expire_at: i64,
}

impl Envelope {
    /// Creates an envelope that never expires.
    pub fn permanent(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            expire_at: NO_EXPIRY,
        }
    }

    /// Creates an envelope expiring at the given Unix second.
    pub fn expiring(payload: impl Into<Bytes>, expire_at: i64) -> Self {
        Self {
            payload: payload.into(),
            expire_at,
        }
    }

    /// Returns true if the record carries an expiry.
    #[inline]
    pub fn has_expiry(&self) -> bool {
        self.expire_at != NO_EXPIRY
    }

    /// Checks whether the record is expired at `now` (Unix seconds).
    ///
    /// A record is expired once `now` reaches its expiry instant.
    #[inline]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expire_at > 0 && self.expire_at <= now
    }

    /// Serializes the envelope.
    pub fn encode(&self) -> Bytes {
        encode(&self.payload, self.expire_at)
    }

    /// Parses an envelope, sharing the payload with `raw` instead of copying it.
    pub fn decode(raw: Bytes) -> Result<Self, DecodeError> {
        decode(raw)
    }
}

/// Encodes `payload` with the given absolute expiry.
pub fn encode(payload: &[u8], expire_at: i64) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_slice(&MAGIC);
    buf.put_u8(VERSION);
    buf.put_i64(expire_at);
    buf.put_u64(payload.len() as u64);
    buf.put_slice(payload);
    buf.freeze()
}

/// Decodes bytes produced by [`encode`].
pub fn decode(mut raw: Bytes) -> Result<Envelope, DecodeError> {
    if raw.len() < HEADER_LEN {
        return Err(DecodeError::Truncated(raw.len()));
    }
    if raw[..MAGIC.len()] != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    raw.advance(MAGIC.len());

    let version = raw.get_u8();
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let expire_at = raw.get_i64();
    let declared = raw.get_u64();
    if declared != raw.len() as u64 {
        return Err(DecodeError::LengthMismatch {
            declared: declared as usize,
            actual: raw.len(),
        });
    }

    Ok(Envelope {
        payload: raw,
        expire_at,
    })
}
