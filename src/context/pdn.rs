use heapless::String;
use no_std_net::IpAddr;
use serde::{Deserialize, Serialize};

/// Number of PDN configurations the caller can address.
pub const MAX_PDN: usize = 4;

/// Caller facing PDN configuration id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdnId(pub u8);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PdpType {
    #[default]
    Ip,
    Ipv6,
    Ipv4v6,
    NonIp,
}

impl PdpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "IP",
            Self::Ipv6 => "IPV6",
            Self::Ipv4v6 => "IPV4V6",
            Self::NonIp => "Non-IP",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AuthType {
    #[default]
    None = 0,
    Pap = 1,
    Chap = 2,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdnConfig {
    pub apn: String<64>,
    pub pdp_type: PdpType,
    pub auth: AuthType,
    pub username: String<32>,
    pub password: String<32>,
}

impl PdnConfig {
    pub fn new(apn: &str) -> Self {
        let mut config = Self::default();
        let _ = config.apn.push_str(apn);
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdnEntry {
    /// Context id used on the modem side.
    pub modem_cid: u8,
    pub config: Option<PdnConfig>,
    pub active: bool,
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub ip: Option<IpAddr>,
}

/// User PDN id to modem cid mapping, plus what is known about each context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdnTable {
    entries: [PdnEntry; MAX_PDN],
    default: PdnId,
}

impl Default for PdnTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PdnTable {
    pub fn new() -> Self {
        Self {
            entries: core::array::from_fn(|i| PdnEntry {
                modem_cid: i as u8 + 1,
                config: None,
                active: false,
                ip: None,
            }),
            default: PdnId(0),
        }
    }

    pub fn get(&self, id: PdnId) -> Option<&PdnEntry> {
        self.entries.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: PdnId) -> Option<&mut PdnEntry> {
        self.entries.get_mut(id.0 as usize)
    }

    pub fn default_pdn(&self) -> PdnId {
        self.default
    }

    /// `id`, or the default PDN when `None`. Fails for ids outside the table.
    pub fn resolve(&self, id: Option<PdnId>) -> Option<PdnId> {
        let id = id.unwrap_or(self.default);
        self.get(id).map(|_| id)
    }

    pub fn set_default(&mut self, id: PdnId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.default = id;
        true
    }

    pub fn define(&mut self, id: PdnId, config: PdnConfig) -> bool {
        match self.get_mut(id) {
            Some(entry) => {
                entry.config = Some(config);
                true
            }
            None => false,
        }
    }

    pub fn cid(&self, id: PdnId) -> Option<u8> {
        self.get(id).map(|e| e.modem_cid)
    }

    /// Caller id of the PDN using modem context `cid`.
    pub fn id_of(&self, cid: u8) -> Option<PdnId> {
        self.entries
            .iter()
            .position(|e| e.modem_cid == cid)
            .map(|i| PdnId(i as u8))
    }

    /// Marks every context inactive, e.g. after a packet domain detach.
    pub fn deactivate_all(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.active = false;
            entry.ip = None;
        }
    }

    pub fn by_cid_mut(&mut self, cid: u8) -> Option<&mut PdnEntry> {
        self.entries.iter_mut().find(|e| e.modem_cid == cid)
    }

    pub fn set_active(&mut self, cid: u8, active: bool, ip: Option<IpAddr>) {
        if let Some(entry) = self.by_cid_mut(cid) {
            entry.active = active;
            entry.ip = if active { ip.or(entry.ip) } else { None };
        }
    }
}
