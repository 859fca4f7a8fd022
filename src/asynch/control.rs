use crate::datapack::{self, Header, MessageClass, PackError};
use crate::error::Error;
use crate::service::{Request, Response};

use super::state::{Snapshot, State, UrcCallback};

/// Caller side of the driver. Cheap to copy, every copy talks to the same
/// runner.
#[derive(Clone, Copy)]
pub struct Control<'a> {
    state: &'a State,
}

impl<'a> Control<'a> {
    pub(crate) fn new(state: &'a State) -> Self {
        Self { state }
    }

    /// Runs one service on the modem and waits for its outcome.
    ///
    /// Fails with [`Error::Busy`] right away while another request is in
    /// flight. Borrowed request data (send payloads, ping host, direct
    /// command text) is only read until this returns.
    pub async fn send_request(&self, req: &Request<'_>) -> Result<Response, Error> {
        let Ok(_transaction) = self.state.transaction.try_lock() else {
            warn!("{:?} refused, transaction in progress", req.sid());
            return Err(Error::Busy);
        };

        let sid = req.sid();
        {
            let mut buf = self.state.request.lock().await;
            // the runner holds this lock while serving, so a completion left
            // by a caller that stopped waiting has been signalled by now
            self.state.done.reset();
            datapack::pack(&mut buf, MessageClass::Request, sid, req.content_kind(), req)?;
        }
        self.state.pending.signal(());
        self.state.done.wait().await;

        let buf = self.state.response.lock().await;
        match Header::read(&buf)?.class {
            MessageClass::Response => {
                let (header, response) = datapack::unpack::<Response>(&buf)?;
                if header.sid != sid {
                    error!("Response for {:?} while waiting on {:?}", header.sid, sid);
                    return Err(PackError::SidMismatch.into());
                }
                Ok(response)
            }
            MessageClass::Error => Err(datapack::unpack::<Error>(&buf)?.1),
            MessageClass::Request => Err(PackError::BadHeader.into()),
        }
    }

    /// Installs the function every URC is handed to. URCs arriving while no
    /// callback is registered are dropped.
    pub fn register_urc_callback(&self, callback: UrcCallback) {
        self.state.set_urc_callback(Some(callback));
    }

    pub fn unregister_urc_callback(&self) {
        self.state.set_urc_callback(None);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Waits until the modem gains or loses its network registration.
    pub async fn wait_registration_change(&self) -> bool {
        self.state.wait_registration_change().await
    }
}
