//! Fixed layout buffers carrying requests, responses and error reports
//! between the caller and the worker task.
//!
//! ```text
//! [class: u8][sid: u8][kind: u8][size: u16 LE][postcard payload; size]
//! ```
//!
//! `ContentKind::Borrowed` payloads deserialize into slices of the pack
//! buffer, so the buffer has to outlive the decoded value.

use heapless::Vec;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::service::Sid;

pub const HEADER_LEN: usize = 5;

/// Room for the largest payload (a full socket send or receive) plus header.
pub const PACK_CAPACITY: usize = 1600;

pub type PackBuffer = Vec<u8, PACK_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MessageClass {
    Request = 0x01,
    Response = 0x02,
    Error = 0x03,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ContentKind {
    /// The payload is self contained.
    Owned = 0x00,
    /// The payload refers to caller data that must stay untouched until the
    /// transaction completes.
    Borrowed = 0x01,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PackError {
    BufferTooSmall,
    /// Fewer bytes than the header announces.
    Truncated,
    BadHeader,
    Encoding,
    /// The payload belongs to another service than expected.
    SidMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header {
    pub class: MessageClass,
    pub sid: Sid,
    pub kind: ContentKind,
    pub size: u16,
}

impl Header {
    pub fn read(buf: &[u8]) -> Result<Self, PackError> {
        let [class, sid, kind, lo, hi] = *buf.get(..HEADER_LEN).ok_or(PackError::Truncated)?
        else {
            return Err(PackError::Truncated);
        };
        Ok(Self {
            class: MessageClass::try_from(class).map_err(|_| PackError::BadHeader)?,
            sid: Sid::try_from(sid).map_err(|_| PackError::BadHeader)?,
            kind: ContentKind::try_from(kind).map_err(|_| PackError::BadHeader)?,
            size: u16::from_le_bytes([lo, hi]),
        })
    }

    fn write(&self, buf: &mut [u8]) {
        let size = self.size.to_le_bytes();
        buf[..HEADER_LEN].copy_from_slice(&[
            self.class as u8,
            self.sid as u8,
            self.kind as u8,
            size[0],
            size[1],
        ]);
    }
}

/// Serializes `value` behind a header into `out`.
pub fn pack<T: Serialize>(
    out: &mut PackBuffer,
    class: MessageClass,
    sid: Sid,
    kind: ContentKind,
    value: &T,
) -> Result<(), PackError> {
    out.clear();
    out.resize(PACK_CAPACITY, 0)
        .map_err(|_| PackError::BufferTooSmall)?;

    let size = match postcard::to_slice(value, &mut out[HEADER_LEN..]) {
        Ok(payload) => payload.len(),
        Err(postcard::Error::SerializeBufferFull) => {
            out.clear();
            return Err(PackError::BufferTooSmall);
        }
        Err(_) => {
            out.clear();
            return Err(PackError::Encoding);
        }
    };

    Header {
        class,
        sid,
        kind,
        size: size as u16,
    }
    .write(out);
    out.truncate(HEADER_LEN + size);
    Ok(())
}

/// Reads the header and deserializes the payload, borrowing from `buf`.
pub fn unpack<'a, T: Deserialize<'a>>(buf: &'a [u8]) -> Result<(Header, T), PackError> {
    let header = Header::read(buf)?;
    let payload = buf
        .get(HEADER_LEN..HEADER_LEN + header.size as usize)
        .ok_or(PackError::Truncated)?;
    let value = postcard::from_bytes(payload).map_err(|_| PackError::Encoding)?;
    Ok((header, value))
}
