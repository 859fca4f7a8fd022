//! Everything the engine knows about one modem.
//!
//! State is split by lifetime: [`Persistent`] survives across services and is
//! only reset when the modem reboots or powers off, [`SidScoped`] is reset at
//! the start of every service and [`CommandScoped`] at the start of every step.

pub mod events;
pub mod pdn;
pub mod socket;

use heapless::{String, Vec};
use no_std_net::IpAddr;
use serde::{Deserialize, Serialize};

use crate::registration::RegistrationState;
use crate::service::{NetStatus, PingSummary, SignalQuality, DIRECT_CAPACITY, MAX_RECEIVE};
use crate::urc::UrcSlots;

use events::{EventSubscriptions, RegUrcMode};
use pdn::{PdnTable, MAX_PDN};
use socket::SocketTable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SimState {
    #[default]
    Unknown,
    Ready,
    /// Present but not usable yet.
    NotReady,
    Busy,
    PinRequired,
    PukRequired,
    NotInserted,
    Failure,
}

impl SimState {
    /// States that may still turn into `Ready` by waiting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unknown | Self::NotReady | Self::Busy)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LowPowerState {
    #[default]
    Awake,
    /// Host allowed the modem to sleep, it has to be woken before commands.
    Sleeping,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemMode {
    #[default]
    Command,
    /// Transparent data mode, left through the escape sequence only.
    Data,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Identity {
    pub imei: String<16>,
    pub iccid: String<24>,
}

#[derive(Debug, Clone, Default)]
pub struct Persistent {
    pub sim: SimState,
    pub registration: RegistrationState,
    pub sockets: SocketTable,
    pub pdn: PdnTable,
    pub low_power: LowPowerState,
    pub events: EventSubscriptions,
    pub mode: ModemMode,
    pub identity: Identity,
    pub urcs: UrcSlots,
}

/// Answers collected while running one service.
#[derive(Debug, Clone, Default)]
pub struct SidScoped {
    /// Single line text reply (identity queries).
    pub text: String<64>,
    pub signal: Option<SignalQuality>,
    pub attached: Option<bool>,
    pub net: NetStatus,
    /// Automatic operator selection already in place.
    pub cops_automatic: Option<bool>,
    /// Reporting mode the current (un)subscription switches to.
    pub event_mode: Option<RegUrcMode>,
    /// Activity per PDN table index, as reported by the last context query.
    pub pdn_active: [Option<bool>; MAX_PDN],
    pub ip: Option<IpAddr>,
    /// Connection id reserved or assigned for the socket being opened.
    pub conn: Option<u8>,
    /// Result code of the asynchronous socket open, 0 is success.
    pub socket_result: Option<u16>,
    pub rx: Vec<u8, MAX_RECEIVE>,
    /// Length announced by the last receive header.
    pub rx_announced: Option<usize>,
    pub sent: Option<u16>,
    pub ping: Option<PingSummary>,
    pub direct: String<DIRECT_CAPACITY>,
    /// Name of the command sent as direct text, its replies are not URCs.
    pub direct_target: String<16>,
    /// The wake preamble switched the modem to awake.
    pub woke: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandScoped {
    pub prompt: bool,
    /// A modem error was accepted as success.
    pub tolerated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ModemContext {
    pub persistent: Persistent,
    pub sid: SidScoped,
    pub cmd: CommandScoped,
}

impl ModemContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything, as after a modem reboot. Event subscriptions are
    /// dropped as well since the modem reverts its reporting settings.
    pub fn reset_persistent(&mut self) {
        self.persistent = Persistent::default();
        self.reset_sid();
    }

    pub fn reset_sid(&mut self) {
        self.sid = SidScoped::default();
        self.reset_command();
    }

    pub fn reset_command(&mut self) {
        self.cmd = CommandScoped::default();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::socket::{Protocol, SocketHandle};

    #[test]
    fn scopes_reset_independently() {
        let mut ctx = ModemContext::new();
        ctx.persistent.sim = SimState::Ready;
        ctx.persistent
            .sockets
            .reserve(SocketHandle(1), Protocol::Tcp, 4)
            .unwrap();
        ctx.sid.conn = Some(0);
        ctx.sid.rx.extend_from_slice(b"abc").unwrap();
        ctx.cmd.prompt = true;

        ctx.reset_command();
        assert!(!ctx.cmd.prompt);
        assert_eq!(ctx.sid.conn, Some(0));

        ctx.reset_sid();
        assert!(ctx.sid.conn.is_none());
        assert!(ctx.sid.rx.is_empty());
        assert_eq!(ctx.persistent.sim, SimState::Ready);
        assert!(ctx.persistent.sockets.get(SocketHandle(1)).is_some());

        ctx.reset_persistent();
        assert_eq!(ctx.persistent.sim, SimState::Unknown);
        assert!(ctx.persistent.sockets.get(SocketHandle(1)).is_none());
    }
}
