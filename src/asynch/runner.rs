use embassy_futures::select::{select, Either};
use embedded_io_async::Write;

use crate::config::CellularConfig;
use crate::datapack::{self, ContentKind, Header, MessageClass};
use crate::error::Error;
use crate::modem::Modem;
use crate::service::{Request, ResetType, Response, Sid};

use super::pwr::PwrCtrl;
use super::state::State;
use super::transaction::Engine;

/// Background worker of the driver.
///
/// You must call `.run()` in a background task for the modem to operate.
pub struct Runner<'a, M: Modem, W: Write, C: CellularConfig> {
    engine: Engine<'a, M, W>,
    state: &'a State,
    config: C,
}

impl<'a, M, W, C> Runner<'a, M, W, C>
where
    M: Modem,
    W: Write,
    C: CellularConfig,
{
    pub(crate) fn new(engine: Engine<'a, M, W>, state: &'a State, config: C) -> Self {
        Self {
            engine,
            state,
            config,
        }
    }

    pub fn engine(&self) -> &Engine<'a, M, W> {
        &self.engine
    }

    /// Serves requests from [`Control`](super::control::Control) one at a
    /// time and processes unsolicited messages in between.
    pub async fn run(&mut self) -> ! {
        loop {
            match select(self.state.pending.wait(), self.state.messages.receive()).await {
                Either::First(()) => self.serve().await,
                Either::Second(msg) => self.engine.handle_unsolicited(&msg),
            }
        }
    }

    async fn serve(&mut self) {
        let state = self.state;
        let request = state.request.lock().await;
        let mut response = state.response.lock().await;

        let (sid, result) = match datapack::unpack::<Request>(&request) {
            Ok((header, req)) => (header.sid, self.process(&req).await),
            Err(e) => {
                error!("Unreadable request: {:?}", e);
                let sid = Header::read(&request).map_or(Sid::CheckConnection, |h| h.sid);
                (sid, Err(e.into()))
            }
        };

        let packed = match &result {
            Ok(res) => datapack::pack(
                &mut response,
                MessageClass::Response,
                sid,
                ContentKind::Owned,
                res,
            ),
            Err(e) => datapack::pack(&mut response, MessageClass::Error, sid, ContentKind::Owned, e),
        };
        if let Err(e) = packed {
            error!("Packing the {:?} outcome failed: {:?}", sid, e);
            let fallback = Error::Pack(e);
            if let Err(e) =
                datapack::pack(&mut response, MessageClass::Error, sid, ContentKind::Owned, &fallback)
            {
                error!("Packing the error failed too: {:?}", e);
            }
        }

        state.done.signal(());
    }

    async fn process(&mut self, req: &Request<'_>) -> Result<Response, Error> {
        let params = self.engine.modem().params();
        match req {
            Request::PowerOn => PwrCtrl::new(params, &mut self.config).power_up().await?,
            Request::Reset(ResetType::Hardware) => {
                PwrCtrl::new(params, &mut self.config).reset().await?
            }
            _ => {}
        }

        let response = self.engine.execute(req).await?;

        if let Request::PowerOff = req {
            PwrCtrl::new(params, &mut self.config).power_down().await?;
        }
        Ok(response)
    }
}
