use core::str::FromStr;

/// Bounds of one field inside a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Element {
    pub start: usize,
    pub end: usize,
    /// Position of the field. For `+`/`%` lines rank 0 is the command name.
    pub rank: u8,
}

impl Element {
    pub fn size(&self) -> usize {
        self.end - self.start
    }

    pub fn slice<'a>(&self, msg: &'a [u8]) -> &'a [u8] {
        msg.get(self.start..self.end).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Extracted {
    Field(Element),
    EndOfMessage,
}

/// Resumable position inside a message.
///
/// Rules: the first colon of a `+`/`%` prefixed line ends the command name
/// and is consumed once, with one following space skipped. Commas separate
/// parameters except inside double quotes, where `\"` does not end the quoted
/// run. Surrounding quotes are not part of the field. `\r` ends the message.
#[derive(Debug, Clone, Default)]
pub struct ElementCursor {
    pos: usize,
    rank: u8,
    done: bool,
}

impl ElementCursor {
    pub const fn new() -> Self {
        Self {
            pos: 0,
            rank: 0,
            done: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn next_element(&mut self, msg: &[u8]) -> Extracted {
        let len = msg.iter().position(|&c| c == b'\r').unwrap_or(msg.len());
        if self.done || self.pos > len || len == 0 {
            self.done = true;
            return Extracted::EndOfMessage;
        }

        if self.rank == 0 && self.pos == 0 && matches!(msg[0], b'+' | b'%') {
            let colon = msg[..len].iter().position(|&c| c == b':');
            let end = colon.unwrap_or(len);
            let name = self.emit(0, end);
            match colon {
                Some(colon) => {
                    self.pos = colon + 1;
                    if msg.get(self.pos) == Some(&b' ') {
                        self.pos += 1;
                    }
                    if self.pos >= len {
                        self.done = true;
                    }
                }
                None => self.done = true,
            }
            return name;
        }

        let mut start = self.pos;
        while start < len && msg[start] == b' ' {
            start += 1;
        }

        let mut i = start;
        let mut quoted = false;
        while i < len {
            match msg[i] {
                b'\\' if i + 1 < len && msg[i + 1] == b'"' => {
                    i += 2;
                    continue;
                }
                b'"' => quoted = !quoted,
                b',' if !quoted => break,
                _ => {}
            }
            i += 1;
        }

        let mut end = i;
        while end > start && msg[end - 1] == b' ' {
            end -= 1;
        }
        if end > start && msg[start] == b'"' {
            start += 1;
            if end > start && msg[end - 1] == b'"' {
                end -= 1;
            }
        }

        if i < len {
            self.pos = i + 1;
        } else {
            self.done = true;
        }
        self.emit(start, end)
    }

    fn emit(&mut self, start: usize, end: usize) -> Extracted {
        let element = Element {
            start,
            end,
            rank: self.rank,
        };
        self.rank = self.rank.saturating_add(1);
        Extracted::Field(element)
    }
}

/// Iterator over the field contents of one message.
pub struct Elements<'a> {
    msg: &'a [u8],
    cursor: ElementCursor,
}

impl<'a> Elements<'a> {
    pub fn new(msg: &'a [u8]) -> Self {
        Self {
            msg,
            cursor: ElementCursor::new(),
        }
    }

    pub fn next_element(&mut self) -> Option<Element> {
        match self.cursor.next_element(self.msg) {
            Extracted::Field(e) => Some(e),
            Extracted::EndOfMessage => None,
        }
    }

    /// Next field parsed as a number (or any other `FromStr`). An empty field
    /// yields `None` but is still consumed.
    pub fn next_parsed<T: FromStr>(&mut self) -> Option<T> {
        self.next().and_then(super::parse_field)
    }

    pub fn next_str(&mut self) -> Option<&'a str> {
        self.next().and_then(|f| core::str::from_utf8(f).ok())
    }
}

impl<'a> Iterator for Elements<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let msg = self.msg;
        self.next_element().map(|e| e.slice(msg))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fields(msg: &[u8]) -> std::vec::Vec<&[u8]> {
        Elements::new(msg).collect()
    }

    #[test]
    fn quoted_comma_is_one_field() {
        let msg = b"+CMD: 1,\"a,b\",2";
        let f = fields(msg);
        assert_eq!(f, [b"+CMD".as_slice(), b"1", b"a,b", b"2"]);
    }

    #[test]
    fn ranks_and_bounds() {
        let msg = b"+CMD: 1,\"a,b\",2";
        let mut cursor = ElementCursor::new();
        let mut ranks = std::vec::Vec::new();
        while let Extracted::Field(e) = cursor.next_element(msg) {
            ranks.push((e.rank, e.start, e.end, e.size()));
        }
        assert_eq!(
            ranks,
            [(0, 0, 4, 4), (1, 6, 7, 1), (2, 9, 12, 3), (3, 14, 15, 1)]
        );
        // exhausted cursors stay exhausted
        assert_eq!(cursor.next_element(msg), Extracted::EndOfMessage);
    }

    #[test]
    fn escaped_quote_does_not_toggle() {
        let msg = br#"+CMD: "a\",b",3"#;
        let f = fields(msg);
        assert_eq!(f, [b"+CMD".as_slice(), br#"a\",b"#, b"3"]);
    }

    #[test]
    fn only_first_colon_splits_the_name() {
        let f = fields(b"+QPING: 0,\"fe80::1\",32");
        assert_eq!(f, [b"+QPING".as_slice(), b"0", b"fe80::1", b"32"]);
    }

    #[test]
    fn no_space_after_colon() {
        let f = fields(b"%SOCKETEV:1,2");
        assert_eq!(f, [b"%SOCKETEV".as_slice(), b"1", b"2"]);
    }

    #[test]
    fn carriage_return_terminates() {
        let f = fields(b"+CSQ: 20,99\r\nOK");
        assert_eq!(f, [b"+CSQ".as_slice(), b"20", b"99"]);
    }

    #[test]
    fn empty_fields_are_kept() {
        let f = fields(b"+CPSMS: 1,,,\"101\"");
        assert_eq!(f, [b"+CPSMS".as_slice(), b"1", b"", b"", b"101"]);
    }

    #[test]
    fn bare_lines_start_at_rank_zero() {
        assert_eq!(fields(b"Quectel"), [b"Quectel".as_slice()]);
        assert_eq!(fields(b"+CMD:"), [b"+CMD".as_slice()]);
        assert!(fields(b"").is_empty());
    }

    #[test]
    fn restart_after_reset() {
        let msg = b"+CGATT: 1";
        let mut cursor = ElementCursor::new();
        let _ = cursor.next_element(msg);
        cursor.reset();
        assert_eq!(
            cursor.next_element(msg),
            Extracted::Field(Element {
                start: 0,
                end: 6,
                rank: 0
            })
        );
    }

    #[test]
    fn typed_fields() {
        let mut e = Elements::new(b"+CSQ: 20,99");
        assert_eq!(e.next_str(), Some("+CSQ"));
        assert_eq!(e.next_parsed::<u8>(), Some(20));
        assert_eq!(e.next_parsed::<u8>(), Some(99));
        assert_eq!(e.next_parsed::<u8>(), None);
    }
}
