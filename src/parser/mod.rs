//! Turning the modem byte stream into messages, and messages into fields.

pub mod element;
pub mod framer;

use core::str::FromStr;

use heapless::Vec;

pub use element::{Element, ElementCursor, Elements, Extracted};
pub use framer::Framer;

/// Largest message the framer will keep. Socket payloads up to 1500 bytes
/// fit as a single raw message.
pub const MESSAGE_CAPACITY: usize = 1536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageKind {
    /// A text line, stored without its line terminator.
    Line,
    /// The `"> "` data prompt.
    Prompt,
    /// An opaque payload announced by a preceding length header.
    Raw,
}

/// One complete message received from the modem.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    buf: Vec<u8, MESSAGE_CAPACITY>,
    kind: MessageKind,
}

impl Message {
    pub(crate) fn new(buf: Vec<u8, MESSAGE_CAPACITY>, kind: MessageKind) -> Self {
        Self { buf, kind }
    }

    /// Builds a text line. Bytes past [`MESSAGE_CAPACITY`] are dropped.
    pub fn line(bytes: &[u8]) -> Self {
        Self::new(truncated(bytes), MessageKind::Line)
    }

    pub fn raw(bytes: &[u8]) -> Self {
        Self::new(truncated(bytes), MessageKind::Raw)
    }

    pub fn prompt() -> Self {
        Self::new(Vec::new(), MessageKind::Prompt)
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn is_prompt(&self) -> bool {
        self.kind == MessageKind::Prompt
    }

    pub fn is_raw(&self) -> bool {
        self.kind == MessageKind::Raw
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The line as text, or an empty string if it is not valid UTF-8.
    pub fn text(&self) -> &str {
        core::str::from_utf8(&self.buf).unwrap_or("")
    }

    /// Command name of a `+`/`%` prefixed line, e.g. `+CEREG` for
    /// `+CEREG: 1,5`.
    pub fn prefix(&self) -> Option<&[u8]> {
        if self.kind != MessageKind::Line {
            return None;
        }
        match self.buf.first() {
            Some(b'+') | Some(b'%') => {}
            _ => return None,
        }
        let end = self
            .buf
            .iter()
            .position(|&c| c == b':' || c == b'\r')
            .unwrap_or(self.buf.len());
        Some(&self.buf[..end])
    }

    /// Lazily splits the message into its fields.
    pub fn elements(&self) -> Elements<'_> {
        match self.kind {
            MessageKind::Line => Elements::new(&self.buf),
            _ => Elements::new(&[]),
        }
    }
}

impl core::fmt::Debug for Message {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}({:?})", self.kind, crate::fmt::Bytes(&self.buf))
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Message {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}({})", self.kind, crate::fmt::Bytes(&self.buf))
    }
}

fn truncated(bytes: &[u8]) -> Vec<u8, MESSAGE_CAPACITY> {
    let len = bytes.len().min(MESSAGE_CAPACITY);
    Vec::from_slice(&bytes[..len]).unwrap_or_default()
}

/// Parses a field as a decimal (or other `FromStr`) value.
pub fn parse_field<T: FromStr>(field: &[u8]) -> Option<T> {
    core::str::from_utf8(field).ok()?.trim().parse().ok()
}
