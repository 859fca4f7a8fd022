use no_std_net::SocketAddr;
use serde::{Deserialize, Serialize};

use crate::error::SocketError;

/// Number of sockets the table can track at once.
pub const MAX_SOCKETS: usize = 6;

/// Socket handle owned by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketHandle(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketFlags {
    pub connected: bool,
    /// A "data received" URC is waiting to be delivered.
    pub data_pending_urc: bool,
    /// The modem holds unread data for this socket.
    pub data_available: bool,
    /// The remote closed the connection and the URC is waiting to be delivered.
    pub closed_by_remote_pending_urc: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketEntry {
    pub handle: SocketHandle,
    /// Modem side connection id.
    pub conn: u8,
    pub protocol: Protocol,
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub remote: Option<SocketAddr>,
    pub flags: SocketFlags,
}

/// Maps caller socket handles to modem connection ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocketTable {
    entries: [Option<SocketEntry>; MAX_SOCKETS],
}

impl SocketTable {
    pub const fn new() -> Self {
        Self {
            entries: [None; MAX_SOCKETS],
        }
    }

    pub fn clear(&mut self) {
        self.entries = [None; MAX_SOCKETS];
    }

    /// Picks the lowest free connection id below `max_conn` for `handle`.
    pub fn reserve(
        &mut self,
        handle: SocketHandle,
        protocol: Protocol,
        max_conn: u8,
    ) -> Result<u8, SocketError> {
        if self.get(handle).is_some() {
            return Err(SocketError::AlreadyOpen);
        }
        let conn = (0..max_conn)
            .find(|c| self.by_conn(*c).is_none())
            .ok_or(SocketError::NoFreeConnection)?;
        self.assign(handle, conn, protocol)?;
        Ok(conn)
    }

    /// Records a connection id chosen by the modem.
    pub fn assign(
        &mut self,
        handle: SocketHandle,
        conn: u8,
        protocol: Protocol,
    ) -> Result<(), SocketError> {
        if self.get(handle).is_some() {
            return Err(SocketError::AlreadyOpen);
        }
        let slot = self
            .entries
            .iter_mut()
            .find(|e| e.is_none())
            .ok_or(SocketError::NoFreeConnection)?;
        *slot = Some(SocketEntry {
            handle,
            conn,
            protocol,
            remote: None,
            flags: SocketFlags::default(),
        });
        Ok(())
    }

    /// Forgets `handle`, freeing its connection id. Releasing an unknown
    /// handle does nothing.
    pub fn release(&mut self, handle: SocketHandle) -> Option<SocketEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.map(|e| e.handle) == Some(handle))
            .and_then(|e| e.take())
    }

    pub fn get(&self, handle: SocketHandle) -> Option<&SocketEntry> {
        self.entries.iter().flatten().find(|e| e.handle == handle)
    }

    pub fn get_mut(&mut self, handle: SocketHandle) -> Option<&mut SocketEntry> {
        self.entries
            .iter_mut()
            .flatten()
            .find(|e| e.handle == handle)
    }

    pub fn by_conn(&self, conn: u8) -> Option<&SocketEntry> {
        self.entries.iter().flatten().find(|e| e.conn == conn)
    }

    pub fn by_conn_mut(&mut self, conn: u8) -> Option<&mut SocketEntry> {
        self.entries.iter_mut().flatten().find(|e| e.conn == conn)
    }

    /// Connected entry for `handle`.
    pub fn connected(&self, handle: SocketHandle) -> Result<&SocketEntry, SocketError> {
        let entry = self.get(handle).ok_or(SocketError::NotFound)?;
        if entry.flags.connected {
            Ok(entry)
        } else {
            Err(SocketError::NotConnected)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SocketEntry> {
        self.entries.iter().flatten()
    }
}
