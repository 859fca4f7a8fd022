//! Command descriptors and the per-dialect lookup tables.

pub mod general;

use core::fmt::{self, Write as _};

use embassy_time::Duration;
use heapless::Vec;

/// Timeout used when a command is missing from its table.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300);

/// Room for the largest command: a hex encoded socket payload plus its header.
pub const COMMAND_CAPACITY: usize = 2560;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandKind {
    /// `AT<name>`
    Execute,
    /// `AT<name>?`
    Read,
    /// `AT<name>=<params>`
    Write,
    /// `AT<name>=?`
    Test,
    /// Written verbatim, without header or terminator.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Answer {
    /// A missing answer fails the service.
    Mandatory,
    /// A missing answer just moves on to the next step.
    Optional,
}

/// One entry of a dialect's command table.
#[derive(Debug)]
pub struct CommandDesc<C: 'static> {
    pub id: C,
    /// Text following `AT`, and the prefix of the matching replies.
    pub name: &'static str,
    pub timeout: Duration,
}

/// Closed set of commands of one modem dialect.
pub trait CommandId: Copy + Eq + fmt::Debug + 'static {
    /// Indexed by [`CommandId::index`].
    const LUT: &'static [CommandDesc<Self>];

    /// Pseudo command used for caller supplied command text.
    const DIRECT: Self;

    fn index(self) -> usize;

    fn desc(self) -> Option<&'static CommandDesc<Self>> {
        Self::LUT.get(self.index()).filter(|d| d.id == self)
    }

    fn name(self) -> &'static str {
        self.desc().map(|d| d.name).unwrap_or("")
    }

    /// Finds the command whose name equals `prefix` in length and content.
    /// Only `+`/`%`/`^` names take part, bare names such as `E0` never match
    /// received text.
    fn lookup(prefix: &[u8]) -> Option<Self> {
        Self::LUT
            .iter()
            .filter(|d| matches!(d.name.as_bytes().first(), Some(b'+' | b'%' | b'^')))
            .find(|d| d.name.as_bytes() == prefix)
            .map(|d| d.id)
    }
}

/// Declares a dialect command enum together with its lookup table, keeping
/// both in the same order.
macro_rules! command_table {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => ($text:literal, $timeout:expr) ),+ $(,)?
        }
        direct = $direct:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[repr(u8)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $crate::command::CommandId for $name {
            const LUT: &'static [$crate::command::CommandDesc<Self>] = &[
                $(
                    $crate::command::CommandDesc {
                        id: $name::$variant,
                        name: $text,
                        timeout: $timeout,
                    },
                )+
            ];

            const DIRECT: Self = $name::$direct;

            fn index(self) -> usize {
                self as usize
            }
        }
    };
}
pub(crate) use command_table;

/// A command as programmed by a sequencer step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AtCommand<C> {
    pub id: C,
    pub kind: CommandKind,
    pub timeout: Duration,
    pub answer: Answer,
    /// Ends the service once answered (or once its optional answer times out).
    pub last: bool,
    /// The modem replies with a `"> "` prompt before taking data.
    pub prompt: bool,
    /// Expected size of a binary payload in the reply.
    pub raw_size: Option<usize>,
    /// Nothing is sent, the step waits for an unsolicited report of `id`.
    pub event: bool,
}

impl<C: CommandId> AtCommand<C> {
    pub fn new(id: C, kind: CommandKind) -> Self {
        Self {
            id,
            kind,
            timeout: id.desc().map(|d| d.timeout).unwrap_or(DEFAULT_TIMEOUT),
            answer: Answer::Mandatory,
            last: false,
            prompt: false,
            raw_size: None,
            event: false,
        }
    }

    pub fn exec(id: C) -> Self {
        Self::new(id, CommandKind::Execute)
    }

    pub fn read(id: C) -> Self {
        Self::new(id, CommandKind::Read)
    }

    pub fn write(id: C) -> Self {
        Self::new(id, CommandKind::Write)
    }

    pub fn test(id: C) -> Self {
        Self::new(id, CommandKind::Test)
    }

    pub fn raw(id: C) -> Self {
        Self::new(id, CommandKind::Raw)
    }

    /// A pending wait for an event, no command is sent.
    pub fn event(id: C, timeout: Duration, answer: Answer, last: bool) -> Self {
        Self {
            timeout,
            answer,
            last,
            event: true,
            ..Self::new(id, CommandKind::Execute)
        }
    }

    pub fn optional(mut self) -> Self {
        self.answer = Answer::Optional;
        self
    }

    pub fn last(mut self) -> Self {
        self.last = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_prompt(mut self) -> Self {
        self.prompt = true;
        self
    }

    pub fn with_raw_size(mut self, size: usize) -> Self {
        self.raw_size = Some(size);
        self
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BuildError {
    /// Something the command needs is not in the request or the context.
    MissingContext,
    Overflow,
}

/// Output buffer for one serialized command.
#[derive(Default)]
pub struct CommandBuffer {
    buf: Vec<u8, COMMAND_CAPACITY>,
}

impl CommandBuffer {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), BuildError> {
        self.buf
            .extend_from_slice(bytes)
            .map_err(|_| BuildError::Overflow)
    }

    /// Writes `"s"`.
    pub fn push_quoted(&mut self, s: &str) -> Result<(), BuildError> {
        self.push_bytes(b"\"")?;
        self.push_bytes(s.as_bytes())?;
        self.push_bytes(b"\"")
    }

    /// `write!` into the buffer, mapping formatter failures to overflow.
    pub fn push_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), BuildError> {
        self.write_fmt(args).map_err(|_| BuildError::Overflow)
    }

    /// `AT` + name + the suffix for the command kind. Raw commands get no header.
    pub fn write_header<C: CommandId>(&mut self, cmd: &AtCommand<C>) -> Result<(), BuildError> {
        let suffix: &[u8] = match cmd.kind {
            CommandKind::Raw => return Ok(()),
            CommandKind::Execute => b"",
            CommandKind::Read => b"?",
            CommandKind::Write => b"=",
            CommandKind::Test => b"=?",
        };
        self.push_bytes(b"AT")?;
        self.push_bytes(cmd.name().as_bytes())?;
        self.push_bytes(suffix)
    }
}

impl fmt::Write for CommandBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf
            .extend_from_slice(s.as_bytes())
            .map_err(|_| fmt::Error)
    }
}

impl fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&crate::fmt::Bytes(&self.buf), f)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    command_table! {
        pub(crate) enum TestCmd {
            At => ("", Duration::from_millis(300)),
            Echo => ("E0", Duration::from_millis(300)),
            Creg => ("+CREG", Duration::from_secs(1)),
            Event => ("%EVT", Duration::from_secs(2)),
            Direct => ("", Duration::from_secs(1)),
        }
        direct = Direct;
    }

    #[test]
    fn table_is_indexed_by_discriminant() {
        for (i, desc) in TestCmd::LUT.iter().enumerate() {
            assert_eq!(desc.id.index(), i);
        }
        assert_eq!(TestCmd::Creg.desc().map(|d| d.name), Some("+CREG"));
    }

    #[test]
    fn lookup_requires_exact_match() {
        assert_eq!(TestCmd::lookup(b"+CREG"), Some(TestCmd::Creg));
        assert_eq!(TestCmd::lookup(b"%EVT"), Some(TestCmd::Event));
        assert_eq!(TestCmd::lookup(b"+CRE"), None);
        assert_eq!(TestCmd::lookup(b"+CREGX"), None);
        assert_eq!(TestCmd::lookup(b"E0"), None);
        assert_eq!(TestCmd::lookup(b""), None);
    }

    #[test]
    fn headers_per_kind() {
        let cases = [
            (AtCommand::exec(TestCmd::Echo), "ATE0"),
            (AtCommand::read(TestCmd::Creg), "AT+CREG?"),
            (AtCommand::write(TestCmd::Creg), "AT+CREG="),
            (AtCommand::test(TestCmd::Creg), "AT+CREG=?"),
            (AtCommand::raw(TestCmd::Creg), ""),
            (AtCommand::exec(TestCmd::At), "AT"),
        ];
        for (cmd, expected) in cases {
            let mut buf = CommandBuffer::new();
            buf.write_header(&cmd).unwrap();
            assert_eq!(buf.as_bytes(), expected.as_bytes());
        }
    }

    #[test]
    fn timeout_comes_from_the_table() {
        let cmd = AtCommand::read(TestCmd::Creg);
        assert_eq!(cmd.timeout, Duration::from_secs(1));
        assert_eq!(cmd.answer, Answer::Mandatory);
        let cmd = cmd.optional().last().with_timeout(Duration::from_millis(5));
        assert_eq!(cmd.timeout, Duration::from_millis(5));
        assert!(cmd.last);
        assert_eq!(cmd.answer, Answer::Optional);
    }

    #[test]
    fn overflow_is_reported() {
        let mut buf = CommandBuffer::new();
        let big = [b'x'; COMMAND_CAPACITY];
        buf.push_bytes(&big).unwrap();
        assert_eq!(buf.push_bytes(b"y"), Err(BuildError::Overflow));
    }
}
