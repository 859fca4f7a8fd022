//! Unsolicited result codes and the bounded URC store.
//!
//! Each kind has exactly one slot. A newer URC of a kind replaces the one
//! still waiting, so producers never block and memory stays bounded, at the
//! cost of intermediate values (only the latest registration state is
//! delivered after a burst).

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::context::socket::SocketHandle;
use crate::context::SimState;
use crate::registration::{CellularGlobalIdentity, RegType, Status};
use crate::service::{PingReply, SignalQuality};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegistrationEvent {
    pub reg_type: RegType,
    pub status: Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PdnEvent {
    Activated { cid: u8 },
    /// Deactivated by the network.
    Deactivated { cid: u8 },
    /// Packet domain detach by the network.
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LowPowerStatus {
    /// The modem entered PSM and stops answering until woken.
    EnteredPsm,
    Awake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemEvent {
    /// The modem finished booting and accepts commands.
    Ready,
    PoweredDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Urc {
    NetworkRegistration(RegistrationEvent),
    LocationInfo(CellularGlobalIdentity),
    SignalQuality(SignalQuality),
    SocketDataPending(SocketHandle),
    SocketClosed(SocketHandle),
    PdnEvent(PdnEvent),
    PingResponse(PingReply),
    SimEvent(SimState),
    LowPowerStatus(LowPowerStatus),
    ModemEvent(ModemEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum UrcKind {
    NetworkRegistration = 0,
    LocationInfo,
    SignalQuality,
    SocketDataPending,
    SocketClosed,
    PdnEvent,
    PingResponse,
    SimEvent,
    LowPowerStatus,
    ModemEvent,
}

pub const URC_KINDS: usize = 10;

impl Urc {
    pub fn kind(&self) -> UrcKind {
        match self {
            Self::NetworkRegistration(_) => UrcKind::NetworkRegistration,
            Self::LocationInfo(_) => UrcKind::LocationInfo,
            Self::SignalQuality(_) => UrcKind::SignalQuality,
            Self::SocketDataPending(_) => UrcKind::SocketDataPending,
            Self::SocketClosed(_) => UrcKind::SocketClosed,
            Self::PdnEvent(_) => UrcKind::PdnEvent,
            Self::PingResponse(_) => UrcKind::PingResponse,
            Self::SimEvent(_) => UrcKind::SimEvent,
            Self::LowPowerStatus(_) => UrcKind::LowPowerStatus,
            Self::ModemEvent(_) => UrcKind::ModemEvent,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UrcSlots {
    slots: [Option<Urc>; URC_KINDS],
}

impl UrcSlots {
    pub const fn new() -> Self {
        Self {
            slots: [None; URC_KINDS],
        }
    }

    /// Stores `urc`, replacing a waiting URC of the same kind. Returns `true`
    /// if one was replaced.
    pub fn push(&mut self, urc: Urc) -> bool {
        let slot = &mut self.slots[urc.kind() as usize];
        let replaced = slot.replace(urc).is_some();
        if replaced {
            debug!("URC {:?} overwritten before dispatch", urc.kind());
        }
        replaced
    }

    /// Next waiting URC in kind order, and whether other kinds are still
    /// waiting after it.
    pub fn next_urc(&mut self) -> Option<(Urc, bool)> {
        let urc = self.slots.iter_mut().find_map(|s| s.take())?;
        Some((urc, self.pending() > 0))
    }

    /// Number of kinds with a waiting URC.
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn clear(&mut self) {
        self.slots = [None; URC_KINDS];
    }
}
