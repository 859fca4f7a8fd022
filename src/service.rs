//! Service requests (SIDs) and their typed responses.

use heapless::{String, Vec};
use no_std_net::{IpAddr, SocketAddr};
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::context::events::NetEvent;
use crate::context::pdn::{PdnConfig, PdnId};
use crate::context::socket::{Protocol, SocketHandle};
use crate::datapack::ContentKind;
use crate::registration::{CellularGlobalIdentity, Status};

/// Largest payload returned by a single receive.
pub const MAX_RECEIVE: usize = 1500;

/// Largest payload accepted by a single send.
pub const MAX_SEND: usize = 1460;

/// Room for the collected reply lines of a direct command.
pub const DIRECT_CAPACITY: usize = 512;

/// Service identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Sid {
    CheckConnection = 0x01,
    PowerOn = 0x02,
    PowerOff = 0x03,
    Reset = 0x04,
    InitModem = 0x05,
    GetDeviceInfo = 0x06,
    GetSignalQuality = 0x07,
    GetAttachStatus = 0x08,
    RegisterNet = 0x10,
    DeregisterNet = 0x11,
    GetNetStatus = 0x12,
    SubscribeNetEvent = 0x13,
    UnsubscribeNetEvent = 0x14,
    AttachPsDomain = 0x15,
    DetachPsDomain = 0x16,
    DefinePdn = 0x20,
    SetDefaultPdn = 0x21,
    ActivatePdn = 0x22,
    DeactivatePdn = 0x23,
    GetIpAddress = 0x24,
    DialSocket = 0x30,
    SendData = 0x31,
    ReceiveData = 0x32,
    CloseSocket = 0x33,
    Ping = 0x34,
    DirectCommand = 0x40,
    SuspendData = 0x41,
    ResumeData = 0x42,
    SetPowerConfig = 0x50,
    SleepRequest = 0x51,
    Wakeup = 0x52,
}

impl Sid {
    /// Services after which the modem has (re)booted or lost power, so that
    /// nothing in the persistent context can be trusted.
    pub fn resets_modem(self) -> bool {
        matches!(self, Self::PowerOn | Self::PowerOff | Self::Reset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetType {
    /// Reboot through an AT command.
    Software,
    /// Reboot through the reset pin.
    Hardware,
    /// Restore factory settings.
    Factory,
}

/// `<fun>` of `AT+CFUN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Functionality {
    Minimum = 0,
    Full = 1,
    /// Radio off, SIM still accessible.
    Airplane = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceInfoField {
    Manufacturer,
    Model,
    Revision,
    Imei,
    Iccid,
    Imsi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatorSelection {
    Automatic,
    /// Numeric PLMN, e.g. `"23801"`.
    Manual(String<8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DialParams {
    pub handle: SocketHandle,
    pub protocol: Protocol,
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub remote: SocketAddr,
    /// 0 lets the modem pick.
    pub local_port: u16,
    pub pdn: Option<PdnId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PingParams<'a> {
    pub host: &'a str,
    pub count: u8,
    /// Per echo request.
    pub timeout_s: u8,
    pub pdn: Option<PdnId>,
}

/// 3GPP power saving mode settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerConfig {
    pub psm: bool,
    /// Requested periodic TAU, GPRS timer 3 encoding.
    pub periodic_tau: Option<u8>,
    /// Requested active time, GPRS timer 2 encoding.
    pub active_time: Option<u8>,
}

/// A caller request. Byte and string payloads borrow from the buffer the
/// request was unpacked from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request<'a> {
    CheckConnection,
    PowerOn,
    PowerOff,
    Reset(ResetType),
    InitModem(Functionality),
    GetDeviceInfo(DeviceInfoField),
    GetSignalQuality,
    GetAttachStatus,
    RegisterNet(OperatorSelection),
    DeregisterNet,
    GetNetStatus,
    SubscribeNetEvent(NetEvent),
    UnsubscribeNetEvent(NetEvent),
    AttachPsDomain,
    DetachPsDomain,
    DefinePdn { id: PdnId, config: PdnConfig },
    /// Idempotent: setting the current default again changes nothing.
    SetDefaultPdn(PdnId),
    /// `None` selects the default PDN.
    ActivatePdn(Option<PdnId>),
    DeactivatePdn(Option<PdnId>),
    GetIpAddress(Option<PdnId>),
    DialSocket(DialParams),
    SendData { handle: SocketHandle, data: &'a [u8] },
    ReceiveData { handle: SocketHandle, max_len: u16 },
    CloseSocket(SocketHandle),
    Ping(#[serde(borrow)] PingParams<'a>),
    /// Raw command text, e.g. `AT+QGMR`, answered within `timeout_ms`.
    DirectCommand { command: &'a str, timeout_ms: u32 },
    SuspendData,
    ResumeData,
    SetPowerConfig(PowerConfig),
    SleepRequest,
    Wakeup,
}

impl Request<'_> {
    pub fn sid(&self) -> Sid {
        match self {
            Self::CheckConnection => Sid::CheckConnection,
            Self::PowerOn => Sid::PowerOn,
            Self::PowerOff => Sid::PowerOff,
            Self::Reset(_) => Sid::Reset,
            Self::InitModem(_) => Sid::InitModem,
            Self::GetDeviceInfo(_) => Sid::GetDeviceInfo,
            Self::GetSignalQuality => Sid::GetSignalQuality,
            Self::GetAttachStatus => Sid::GetAttachStatus,
            Self::RegisterNet(_) => Sid::RegisterNet,
            Self::DeregisterNet => Sid::DeregisterNet,
            Self::GetNetStatus => Sid::GetNetStatus,
            Self::SubscribeNetEvent(_) => Sid::SubscribeNetEvent,
            Self::UnsubscribeNetEvent(_) => Sid::UnsubscribeNetEvent,
            Self::AttachPsDomain => Sid::AttachPsDomain,
            Self::DetachPsDomain => Sid::DetachPsDomain,
            Self::DefinePdn { .. } => Sid::DefinePdn,
            Self::SetDefaultPdn(_) => Sid::SetDefaultPdn,
            Self::ActivatePdn(_) => Sid::ActivatePdn,
            Self::DeactivatePdn(_) => Sid::DeactivatePdn,
            Self::GetIpAddress(_) => Sid::GetIpAddress,
            Self::DialSocket(_) => Sid::DialSocket,
            Self::SendData { .. } => Sid::SendData,
            Self::ReceiveData { .. } => Sid::ReceiveData,
            Self::CloseSocket(_) => Sid::CloseSocket,
            Self::Ping(_) => Sid::Ping,
            Self::DirectCommand { .. } => Sid::DirectCommand,
            Self::SuspendData => Sid::SuspendData,
            Self::ResumeData => Sid::ResumeData,
            Self::SetPowerConfig(_) => Sid::SetPowerConfig,
            Self::SleepRequest => Sid::SleepRequest,
            Self::Wakeup => Sid::Wakeup,
        }
    }

    /// Whether the payload refers to caller owned data.
    pub fn content_kind(&self) -> ContentKind {
        match self {
            Self::SendData { .. } | Self::Ping(_) | Self::DirectCommand { .. } => {
                ContentKind::Borrowed
            }
            _ => ContentKind::Owned,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalQuality {
    /// `<rssi>` of `+CSQ`, 99 when unknown.
    pub rssi: u8,
    /// `<ber>` of `+CSQ`, 99 when unknown.
    pub ber: u8,
}

impl SignalQuality {
    /// Received signal strength in dBm.
    pub fn dbm(&self) -> Option<i16> {
        match self.rssi {
            0..=31 => Some(-113 + 2 * self.rssi as i16),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NetStatus {
    pub status: Status,
    pub cgi: Option<CellularGlobalIdentity>,
    pub operator: Option<String<32>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PingSummary {
    /// 0 on success, otherwise the modem's error code.
    pub result: u16,
    pub sent: u8,
    pub received: u8,
    pub min_ms: u32,
    pub max_ms: u32,
    pub avg_ms: u32,
}

/// A single echo reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PingReply {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub from: Option<IpAddr>,
    pub time_ms: u32,
    pub ttl: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    Ok,
    DeviceInfo(String<64>),
    SignalQuality(SignalQuality),
    AttachStatus(bool),
    NetStatus(NetStatus),
    IpAddress(#[cfg_attr(feature = "defmt", defmt(Debug2Format))] IpAddr),
    SocketOpened { handle: SocketHandle, conn: u8 },
    Sent(u16),
    Received(Vec<u8, MAX_RECEIVE>),
    Ping(PingSummary),
    Direct(String<DIRECT_CAPACITY>),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sid_roundtrips_through_u8() {
        for sid in [Sid::CheckConnection, Sid::DialSocket, Sid::Wakeup] {
            assert_eq!(Sid::try_from(sid as u8).ok(), Some(sid));
        }
        assert!(Sid::try_from(0xFF).is_err());
    }

    #[test]
    fn borrowed_payloads() {
        let data = [1u8, 2, 3];
        let req = Request::SendData {
            handle: SocketHandle(0),
            data: &data,
        };
        assert_eq!(req.sid(), Sid::SendData);
        assert_eq!(req.content_kind(), ContentKind::Borrowed);
        assert_eq!(Request::GetNetStatus.content_kind(), ContentKind::Owned);
    }

    #[test]
    fn rssi_to_dbm() {
        assert_eq!(SignalQuality { rssi: 0, ber: 99 }.dbm(), Some(-113));
        assert_eq!(SignalQuality { rssi: 20, ber: 99 }.dbm(), Some(-73));
        assert_eq!(SignalQuality { rssi: 99, ber: 99 }.dbm(), None);
    }
}
