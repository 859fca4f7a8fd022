use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};

use crate::context::SimState;
use crate::datapack::PackError;
use crate::service::Sid;

/// Errors returned to the caller of [`Control::send_request`].
///
/// [`Control::send_request`]: crate::asynch::control::Control::send_request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Error {
    /// Another transaction is already in progress on this modem.
    Busy,
    /// Writing to the serial transport failed. The transaction was aborted
    /// without a report.
    Transport,
    /// The transaction ended in `DoneError`.
    Service(ErrorReport),
    /// A request or response could not be moved through the data pack.
    Pack(PackError),
    IoPin,
    /// The modem did not come up after pulsing the power pin.
    PoweredDown,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self {
            Self::Busy => defmt::write!(f, "Busy"),
            Self::Transport => defmt::write!(f, "Transport"),
            Self::Service(e) => defmt::write!(f, "Service({:?})", e),
            Self::Pack(e) => defmt::write!(f, "Pack({:?})", e),
            Self::IoPin => defmt::write!(f, "IoPin"),
            Self::PoweredDown => defmt::write!(f, "PoweredDown"),
        }
    }
}

impl From<PackError> for Error {
    fn from(e: PackError) -> Self {
        Self::Pack(e)
    }
}

/// Structured report attached to every failed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorReport {
    pub kind: ErrorKind,
    /// SIM state at the time of failure.
    pub sim: SimState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// A mandatory answer did not arrive within the step timeout.
    Timeout,
    /// A received line matched neither a known command nor a known text reply.
    Protocol,
    Modem(ModemError),
    /// The sequencer was asked for a step it does not define.
    InvalidStep { sid: Sid, step: u8 },
    InvalidParameter,
    Unsupported,
    Sim(SimState),
    Socket(SocketError),
    /// The command could not be serialized from the current context.
    Build,
    /// Only the escape sequence and raw data may be sent in data mode.
    DataMode,
    /// The requested PDN is not active.
    NotActive,
}

impl From<ModemError> for ErrorKind {
    fn from(e: ModemError) -> Self {
        Self::Modem(e)
    }
}

impl From<SocketError> for ErrorKind {
    fn from(e: SocketError) -> Self {
        Self::Socket(e)
    }
}

impl From<crate::command::BuildError> for ErrorKind {
    fn from(_: crate::command::BuildError) -> Self {
        Self::Build
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketError {
    /// No socket with the given handle is known.
    NotFound,
    AlreadyOpen,
    NotConnected,
    /// All modem connection ids are in use.
    NoFreeConnection,
    /// The modem reported an error while opening the connection.
    OpenFailed(u16),
}

/// Explicit error replies from the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemError {
    /// Plain `ERROR`.
    Generic,
    Cme(CmeError),
    Cms(u16),
    NoCarrier,
    SendFail,
}

impl ModemError {
    /// Parses the final result codes signalling failure.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let line = trim(line);
        if line == b"ERROR" {
            Some(Self::Generic)
        } else if let Some(code) = line.strip_prefix(b"+CME ERROR:") {
            Some(Self::Cme(CmeError::from_primitive(parse_code(code))))
        } else if let Some(code) = line.strip_prefix(b"+CMS ERROR:") {
            Some(Self::Cms(parse_code(code)))
        } else if line == b"NO CARRIER" {
            Some(Self::NoCarrier)
        } else if line == b"SEND FAIL" {
            Some(Self::SendFail)
        } else {
            None
        }
    }

    /// Numeric code of `+CME ERROR` / `+CMS ERROR` replies.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Cme(cme) => Some(u16::from(*cme)),
            Self::Cms(code) => Some(*code),
            _ => None,
        }
    }
}

fn trim(mut s: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = s {
        if !first.is_ascii_whitespace() {
            break;
        }
        s = rest;
    }
    while let [rest @ .., last] = s {
        if !last.is_ascii_whitespace() {
            break;
        }
        s = rest;
    }
    s
}

fn parse_code(code: &[u8]) -> u16 {
    core::str::from_utf8(trim(code))
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(u16::MAX)
}

/// Mobile termination error result codes `+CME ERROR`
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum CmeError {
    PhoneFailure = 0,
    NoConnectionToPhone = 1,
    PhoneAdaptorLinkReserved = 2,
    OperationNotAllowed = 3,
    OperationNotSupported = 4,
    PhSimPinRequired = 5,
    SimNotInserted = 10,
    SimPinRequired = 11,
    SimPukRequired = 12,
    SimFailure = 13,
    SimBusy = 14,
    SimWrong = 15,
    IncorrectPassword = 16,
    SimPin2Required = 17,
    SimPuk2Required = 18,
    MemoryFull = 20,
    InvalidIndex = 21,
    NotFound = 22,
    MemoryFailure = 23,
    TextStringTooLong = 24,
    NoNetworkService = 30,
    NetworkTimeout = 31,
    NetworkNotAllowed = 32,
    Unknown = 100,
    IllegalMs = 103,
    IllegalMe = 106,
    GprsServicesNotAllowed = 107,
    PlmnNotAllowed = 111,
    LocationAreaNotAllowed = 112,
    RoamingNotAllowed = 113,
    ServiceOptionNotSupported = 132,
    ServiceOptionNotSubscribed = 133,
    ServiceOptionOutOfOrder = 134,
    UnspecifiedGprsError = 148,
    PdpAuthenticationFailure = 149,
    InvalidMobileClass = 150,
    /// Quectel TCP/IP stack errors
    OperationBlocked = 551,
    InvalidParameters = 552,
    MemoryNotEnough = 553,
    SocketCreateFailed = 554,
    OperationNotSupportedByStack = 555,
    SocketBindFailed = 556,
    SocketListenFailed = 557,
    SocketWriteFailed = 558,
    SocketReadFailed = 559,
    SocketAcceptFailed = 560,
    PdpOpenFailed = 561,
    PdpCloseFailed = 562,
    SocketIdentityUsed = 563,
    DnsBusy = 564,
    DnsParseFailed = 565,
    SocketConnectFailed = 566,
    SocketClosed = 567,
    OperationBusy = 568,
    OperationTimeout = 569,
    PdpBrokenDown = 570,
    #[num_enum(catch_all)]
    Other(u16),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_final_error_codes() {
        assert_eq!(ModemError::parse(b"ERROR"), Some(ModemError::Generic));
        assert_eq!(
            ModemError::parse(b"+CME ERROR: 14"),
            Some(ModemError::Cme(CmeError::SimBusy))
        );
        assert_eq!(
            ModemError::parse(b"+CME ERROR: 9999"),
            Some(ModemError::Cme(CmeError::Other(9999)))
        );
        assert_eq!(ModemError::parse(b"+CMS ERROR: 500"), Some(ModemError::Cms(500)));
        assert_eq!(ModemError::parse(b"NO CARRIER"), Some(ModemError::NoCarrier));
        assert_eq!(ModemError::parse(b"OK"), None);
        assert_eq!(ModemError::parse(b"+CMEE: 1"), None);
    }
}
