use serde::{Deserialize, Serialize};

/// `<stat>` of a `+CREG` / `+CGREG` / `+CEREG` report.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    #[default]
    None,
    NotRegistering,
    Home,
    Searching,
    Denied,
    OutOfCoverage,
    Roaming,
}

impl From<u8> for Status {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::NotRegistering,
            1 => Self::Home,
            2 => Self::Searching,
            3 => Self::Denied,
            4 => Self::OutOfCoverage,
            5 => Self::Roaming,
            _ => Self::None,
        }
    }
}

impl Status {
    pub fn registered(self) -> bool {
        matches!(self, Self::Home | Self::Roaming)
    }
}

/// Which 3GPP registration verb a report came from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegType {
    /// `+CREG`, circuit switched
    Creg,
    /// `+CGREG`, GPRS packet switched
    Cgreg,
    /// `+CEREG`, EPS
    Cereg,
    #[default]
    Unknown,
}

/// Cell the modem is camped on, as reported by `+CxREG` with location info.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CellularGlobalIdentity {
    /// Location / tracking area code
    pub lac: u32,
    pub cell_id: u32,
    /// Access technology (`<AcT>` of 27.007)
    pub act: Option<u8>,
}

/// One parsed registration report, solicited or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegistrationParams {
    pub reg_type: RegType,
    pub status: Status,
    pub cgi: Option<CellularGlobalIdentity>,
}

/// Latest status of each domain plus the serving cell.
#[derive(Debug, Clone, Default)]
pub struct RegistrationState {
    /// `+CREG`, circuit switched
    csd: Status,
    /// `+CGREG`, GPRS packet switched
    psd: Status,
    /// `+CEREG`, EPS
    eps: Status,
    cgi: Option<CellularGlobalIdentity>,
}

impl RegistrationState {
    pub const fn new() -> Self {
        Self {
            csd: Status::None,
            psd: Status::None,
            eps: Status::None,
            cgi: None,
        }
    }

    /// Only a packet domain registration gives data connectivity.
    pub fn is_registered(&self) -> bool {
        self.psd.registered() || self.eps.registered()
    }

    /// Most meaningful status across all domains, packet domains first.
    pub fn status(&self) -> Status {
        let domains = [self.eps, self.psd, self.csd];
        domains
            .iter()
            .copied()
            .find(|s| s.registered())
            .or_else(|| domains.iter().copied().find(|s| *s != Status::None))
            .unwrap_or(Status::None)
    }

    pub fn cgi(&self) -> Option<CellularGlobalIdentity> {
        self.cgi
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Applies a report. Returns `true` if the registration of that domain
    /// or the serving cell changed.
    pub fn compare_and_set(&mut self, params: RegistrationParams) -> bool {
        let domain = match params.reg_type {
            RegType::Creg => &mut self.csd,
            RegType::Cgreg => &mut self.psd,
            RegType::Cereg => &mut self.eps,
            RegType::Unknown => {
                error!("Registration report of unknown type");
                return false;
            }
        };
        let mut changed = *domain != params.status;
        *domain = params.status;

        if params.cgi.is_some() && self.cgi != params.cgi {
            self.cgi = params.cgi;
            changed = true;
        }
        changed
    }
}
