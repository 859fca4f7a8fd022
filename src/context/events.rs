use serde::{Deserialize, Serialize};

/// Network events a caller can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum NetEvent {
    /// Registration status changes.
    Registration = 0b01,
    /// Serving cell changes.
    Location = 0b10,
}

/// `<n>` of `AT+CREG` / `AT+CGREG` / `AT+CEREG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RegUrcMode {
    Disabled = 0,
    Enabled = 1,
    WithLocation = 2,
}

/// Set of subscribed events sharing the registration URC switch.
///
/// The modem has a single reporting mode for all of them, so only the
/// derived mode matters: the first subscription enables reporting, the last
/// unsubscription disables it, and anything that leaves the mode as is sends
/// nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventSubscriptions {
    bits: u8,
}

impl EventSubscriptions {
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    pub fn contains(&self, event: NetEvent) -> bool {
        self.bits & event as u8 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn mode(&self) -> RegUrcMode {
        Self::mode_of(self.bits)
    }

    /// New reporting mode if subscribing to `event` changes it.
    pub fn preview_subscribe(&self, event: NetEvent) -> Option<RegUrcMode> {
        self.changed(self.bits | event as u8)
    }

    /// New reporting mode if dropping `event` changes it.
    pub fn preview_unsubscribe(&self, event: NetEvent) -> Option<RegUrcMode> {
        self.changed(self.bits & !(event as u8))
    }

    pub fn subscribe(&mut self, event: NetEvent) {
        self.bits |= event as u8;
    }

    pub fn unsubscribe(&mut self, event: NetEvent) {
        self.bits &= !(event as u8);
    }

    fn changed(&self, bits: u8) -> Option<RegUrcMode> {
        let mode = Self::mode_of(bits);
        (mode != self.mode()).then_some(mode)
    }

    fn mode_of(bits: u8) -> RegUrcMode {
        if bits & NetEvent::Location as u8 != 0 {
            RegUrcMode::WithLocation
        } else if bits & NetEvent::Registration as u8 != 0 {
            RegUrcMode::Enabled
        } else {
            RegUrcMode::Disabled
        }
    }
}
