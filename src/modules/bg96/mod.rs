//! Quectel BG96 (LTE Cat M1 / NB-IoT / EGPRS).
//!
//! Sockets use the Quectel TCP/IP stack (`AT+QIOPEN` and friends), received
//! data is read in buffer access mode with `AT+QIRD`, whose reply carries the
//! payload as raw bytes behind a length header.

mod analyze;
mod build;
pub mod commands;
mod response;
mod sequence;

use embassy_time::Duration;

use crate::analyzer::{Action, Origin};
use crate::command::{AtCommand, BuildError, CommandBuffer};
use crate::config::Settings;
use crate::context::{LowPowerState, ModemContext, ModemMode};
use crate::error::{ErrorKind, ModemError};
use crate::modem::Modem;
use crate::modules::{common, ModuleParams};
use crate::parser::Message;
use crate::sequencer::{Step, Transaction, WAKE_PREAMBLE_STEPS};
use crate::service::{Request, Response};

pub use commands::Bg96Cmd;

#[derive(Debug, Clone, Copy)]
pub struct Bg96Params;

impl ModuleParams for Bg96Params {
    fn power_on_pull_time(&self) -> Option<Duration> {
        Some(Duration::from_millis(550))
    }
    fn power_off_pull_time(&self) -> Duration {
        Duration::from_millis(700)
    }
    fn boot_wait(&self) -> Duration {
        Duration::from_secs(5)
    }
    fn power_down_wait(&self) -> Duration {
        Duration::from_secs(2)
    }
    fn reset_hold(&self) -> Duration {
        Duration::from_millis(300)
    }
}

pub struct Bg96 {
    ctx: ModemContext,
    settings: Settings,
}

impl Bg96 {
    pub fn new(settings: Settings) -> Self {
        Self {
            ctx: ModemContext::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl Modem for Bg96 {
    type Cmd = Bg96Cmd;
    type Params = Bg96Params;

    const PREAMBLE_STEPS: u8 = WAKE_PREAMBLE_STEPS;
    const RAW_HEADERS: &'static [&'static [u8]] = &[b"+QIRD: "];

    fn params(&self) -> Bg96Params {
        Bg96Params
    }

    fn context(&self) -> &ModemContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut ModemContext {
        &mut self.ctx
    }

    fn next_step(
        &mut self,
        req: &Request<'_>,
        tx: &mut Transaction,
    ) -> Result<Step<Bg96Cmd>, ErrorKind> {
        self.sequence(req, tx)
    }

    fn build(
        &mut self,
        req: &Request<'_>,
        cmd: &AtCommand<Bg96Cmd>,
        buf: &mut CommandBuffer,
    ) -> Result<(), BuildError> {
        build::parameters(&self.ctx, &self.settings, req, cmd, buf)
    }

    fn analyze(&mut self, id: Bg96Cmd, msg: &Message, origin: Origin) -> Action {
        analyze::reply(&mut self.ctx, id, msg, origin)
    }

    fn analyze_text(
        &mut self,
        msg: &Message,
        pending: Option<&AtCommand<Bg96Cmd>>,
    ) -> Option<Action> {
        analyze::text(&mut self.ctx, msg, pending)
    }

    fn analyze_payload(&mut self, msg: &Message, pending: Option<&AtCommand<Bg96Cmd>>) -> Action {
        analyze::payload(&mut self.ctx, msg, pending)
    }

    fn unsolicited(&self, id: Bg96Cmd) -> bool {
        matches!(
            id,
            Bg96Cmd::Creg
                | Bg96Cmd::Cgreg
                | Bg96Cmd::Cereg
                | Bg96Cmd::Cpin
                | Bg96Cmd::Cgev
                | Bg96Cmd::Qiurc
                | Bg96Cmd::Qind
        )
    }

    fn tolerate_error(&mut self, id: Bg96Cmd, err: &ModemError) -> bool {
        match (id, err) {
            // Not implemented by older firmware
            (Bg96Cmd::Ifc, _) => true,
            (Bg96Cmd::Cpin, _) => common::sim_error(&mut self.ctx, err),
            _ => false,
        }
    }

    fn response(&mut self, req: &Request<'_>) -> Result<Response, ErrorKind> {
        self.collect(req)
    }

    fn abort(&mut self, req: &Request<'_>) {
        if let Some(conn) = self.ctx.sid.conn.take() {
            if let Some(handle) = self.ctx.persistent.sockets.by_conn(conn).map(|e| e.handle) {
                debug!("Releasing connection {} of {:?}", conn, handle);
                self.ctx.persistent.sockets.release(handle);
            }
        }
        if let Request::CloseSocket(handle) = req {
            self.ctx.persistent.sockets.release(*handle);
        }
        if self.ctx.sid.woke {
            self.ctx.persistent.low_power = LowPowerState::Sleeping;
        }
        if matches!(req, Request::ResumeData) {
            self.ctx.persistent.mode = ModemMode::Command;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::SimState;
    use crate::error::CmeError;
    use crate::context::socket::{Protocol, SocketHandle};

    #[test]
    fn abort_releases_the_reserved_connection() {
        let mut bg96 = Bg96::new(Settings::default());
        let sockets = &mut bg96.ctx.persistent.sockets;
        sockets.reserve(SocketHandle(1), Protocol::Tcp, 12).unwrap();
        let conn = sockets.reserve(SocketHandle(2), Protocol::Tcp, 12).unwrap();
        bg96.ctx.sid.conn = Some(conn);

        bg96.abort(&Request::GetSignalQuality);
        assert!(bg96.ctx.persistent.sockets.get(SocketHandle(2)).is_none());
        assert!(bg96.ctx.persistent.sockets.get(SocketHandle(1)).is_some());
    }

    #[test]
    fn sim_errors_during_polling_are_recorded() {
        let mut bg96 = Bg96::new(Settings::default());
        assert!(bg96.tolerate_error(Bg96Cmd::Cpin, &ModemError::Cme(CmeError::SimBusy)));
        assert_eq!(bg96.ctx.persistent.sim, SimState::Busy);
        assert!(!bg96.tolerate_error(
            Bg96Cmd::Cpin,
            &ModemError::Cme(CmeError::SimPinRequired)
        ));
        assert!(!bg96.tolerate_error(Bg96Cmd::Cops, &ModemError::Generic));
        assert!(bg96.tolerate_error(Bg96Cmd::Ifc, &ModemError::Generic));
    }
}
