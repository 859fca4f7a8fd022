//! Byte-at-a-time message framing.
//!
//! Modem output is a sequence of `\r\n` delimited lines, the `"> "` data
//! prompt, and for some dialects binary socket payloads announced by a header
//! line carrying the payload length. The framer groups bytes into
//! [`Message`]s; it does not interpret them beyond recognising payload headers.

use heapless::Vec;

use super::{Message, MessageKind, MESSAGE_CAPACITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramerState {
    WaitingForInitCr,
    WaitingForLf,
    WaitingForFirstChar,
    WaitingForCr,
    /// Got `>` at the start of a line, a space completes the data prompt.
    WaitingForPromptSpace,
    /// A payload header line was terminated by `\r`.
    WaitingForRawLf { len: usize },
    /// Consuming payload bytes verbatim.
    RawPayload { remaining: usize },
}

pub struct Framer {
    state: FramerState,
    buf: Vec<u8, MESSAGE_CAPACITY>,
    raw_headers: &'static [&'static [u8]],
    expected_payload: Option<usize>,
    complete: Option<MessageKind>,
    /// First payload byte, received before the header was taken.
    carry: Option<u8>,
    overflow: bool,
}

impl Framer {
    /// `raw_headers` lists the line prefixes (e.g. `+QIRD: `) whose first
    /// field announces a binary payload.
    pub const fn new(raw_headers: &'static [&'static [u8]]) -> Self {
        Self {
            state: FramerState::WaitingForInitCr,
            buf: Vec::new(),
            raw_headers,
            expected_payload: None,
            complete: None,
            carry: None,
            overflow: false,
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = FramerState::WaitingForInitCr;
        self.buf.clear();
        self.expected_payload = None;
        self.complete = None;
        self.carry = None;
        self.overflow = false;
    }

    /// Payload size the pending request asked for. The length carried by the
    /// header always wins, a disagreement is only logged.
    pub fn expect_payload(&mut self, len: Option<usize>) {
        self.expected_payload = len;
    }

    /// Feeds one byte. Returns `true` when a message boundary was reached, the
    /// message is then available from [`Framer::take`].
    pub fn push(&mut self, byte: u8) -> bool {
        if self.complete.take().is_some() {
            warn!("Dropping message that was never taken");
            self.buf.clear();
            self.overflow = false;
        }

        self.state = match self.state {
            FramerState::WaitingForInitCr => match byte {
                b'\r' => FramerState::WaitingForLf,
                b'\n' => FramerState::WaitingForFirstChar,
                b'>' => FramerState::WaitingForPromptSpace,
                c => {
                    self.store(c);
                    FramerState::WaitingForCr
                }
            },
            FramerState::WaitingForLf => match byte {
                b'\n' => {
                    if !self.buf.is_empty() {
                        self.finish(MessageKind::Line);
                    }
                    FramerState::WaitingForFirstChar
                }
                b'\r' => FramerState::WaitingForLf,
                c => {
                    self.store(c);
                    FramerState::WaitingForCr
                }
            },
            FramerState::WaitingForFirstChar => match byte {
                b'\r' => FramerState::WaitingForLf,
                b'\n' => FramerState::WaitingForFirstChar,
                b'>' => FramerState::WaitingForPromptSpace,
                c => {
                    self.store(c);
                    FramerState::WaitingForCr
                }
            },
            FramerState::WaitingForCr => match byte {
                b'\r' => match self.payload_header() {
                    Some(len) => FramerState::WaitingForRawLf { len },
                    None => FramerState::WaitingForLf,
                },
                c => {
                    self.store(c);
                    FramerState::WaitingForCr
                }
            },
            FramerState::WaitingForPromptSpace => match byte {
                b' ' => {
                    self.finish(MessageKind::Prompt);
                    FramerState::WaitingForFirstChar
                }
                b'\r' => {
                    self.store(b'>');
                    FramerState::WaitingForLf
                }
                c => {
                    self.store(b'>');
                    self.store(c);
                    FramerState::WaitingForCr
                }
            },
            FramerState::WaitingForRawLf { len } => {
                self.finish(MessageKind::Line);
                if byte == b'\n' {
                    FramerState::RawPayload { remaining: len }
                } else {
                    warn!("Payload header not followed by LF");
                    self.carry = Some(byte);
                    FramerState::RawPayload { remaining: len - 1 }
                }
            }
            FramerState::RawPayload { remaining } => {
                self.store(byte);
                if remaining <= 1 {
                    self.finish(MessageKind::Raw);
                    FramerState::WaitingForFirstChar
                } else {
                    FramerState::RawPayload {
                        remaining: remaining - 1,
                    }
                }
            }
        };

        self.complete.is_some()
    }

    /// Takes a message completed by the last [`Framer::push`]. A single byte
    /// can complete two messages (a payload header and a one byte payload),
    /// so call this until it returns `None`.
    pub fn take(&mut self) -> Option<Message> {
        let kind = self.complete.take()?;
        let buf = core::mem::take(&mut self.buf);
        self.overflow = false;
        if let Some(byte) = self.carry.take() {
            self.store(byte);
            if self.state == (FramerState::RawPayload { remaining: 0 }) {
                self.finish(MessageKind::Raw);
                self.state = FramerState::WaitingForFirstChar;
            }
        }
        Some(Message::new(buf, kind))
    }

    fn store(&mut self, byte: u8) {
        if self.buf.push(byte).is_err() && !self.overflow {
            warn!("Message exceeds {} bytes, truncating", MESSAGE_CAPACITY);
            self.overflow = true;
        }
    }

    fn finish(&mut self, kind: MessageKind) {
        self.complete = Some(kind);
    }

    /// Length announced by a payload header line, if the buffer holds one.
    fn payload_header(&mut self) -> Option<usize> {
        let headers = self.raw_headers;
        let header = headers.iter().find(|h| self.buf.starts_with(h))?;

        let digits = &self.buf[header.len()..];
        let end = digits
            .iter()
            .position(|c| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        if end == 0 || (end < digits.len() && digits[end] != b',') {
            return None;
        }
        let len: usize = super::parse_field(&digits[..end])?;

        if let Some(expected) = self.expected_payload.take() {
            if expected != len {
                warn!(
                    "Payload header announces {} bytes, expected {}; using header",
                    len, expected
                );
            }
        }

        (len > 0).then_some(len)
    }
}
