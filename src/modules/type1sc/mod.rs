//! Murata Type 1SC (Altair ALT1250, LTE Cat M1 / NB-IoT).
//!
//! The modem owns its socket ids: `%SOCKETCMD="ALLOCATE"` hands one out,
//! which is then activated. Payloads travel hex encoded inside
//! `%SOCKETDATA`, so there is no raw data phase.

mod analyze;
mod build;
pub mod commands;
mod response;
mod sequence;

use embassy_time::Duration;

use crate::analyzer::{Action, Origin};
use crate::command::{AtCommand, BuildError, CommandBuffer};
use crate::config::Settings;
use crate::context::ModemContext;
use crate::error::{ErrorKind, ModemError};
use crate::modem::Modem;
use crate::modules::{common, ModuleParams};
use crate::parser::Message;
use crate::sequencer::{Step, Transaction};
use crate::service::{Request, Response};

pub use commands::Type1scCmd;

#[derive(Debug, Clone, Copy)]
pub struct Type1scParams;

impl ModuleParams for Type1scParams {
    fn power_on_pull_time(&self) -> Option<Duration> {
        Some(Duration::from_millis(100))
    }
    fn power_off_pull_time(&self) -> Duration {
        Duration::from_millis(100)
    }
    fn boot_wait(&self) -> Duration {
        Duration::from_secs(3)
    }
    fn power_down_wait(&self) -> Duration {
        Duration::from_secs(1)
    }
    fn reset_hold(&self) -> Duration {
        Duration::from_millis(100)
    }
}

pub struct Type1sc {
    ctx: ModemContext,
    settings: Settings,
}

impl Type1sc {
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

impl Modem for Type1sc {
    type Cmd = Type1scCmd;
    type Params = Type1scParams;

    fn params(&self) -> Type1scParams {
        Type1scParams
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
    ) -> Result<Step<Type1scCmd>, ErrorKind> {
        self.sequence(req, tx)
    }

    fn build(
        &mut self,
        req: &Request<'_>,
        cmd: &AtCommand<Type1scCmd>,
        buf: &mut CommandBuffer,
    ) -> Result<(), BuildError> {
        build::parameters(&self.ctx, req, cmd, buf)
    }

    fn analyze(&mut self, id: Type1scCmd, msg: &Message, origin: Origin) -> Action {
        analyze::reply(&mut self.ctx, id, msg, origin)
    }

    fn analyze_text(
        &mut self,
        msg: &Message,
        pending: Option<&AtCommand<Type1scCmd>>,
    ) -> Option<Action> {
        analyze::text(&mut self.ctx, msg, pending)
    }

    fn unsolicited(&self, id: Type1scCmd) -> bool {
        matches!(
            id,
            Type1scCmd::Cereg
                | Type1scCmd::Cpin
                | Type1scCmd::Cgev
                | Type1scCmd::Socketev
                | Type1scCmd::Bootev
        )
    }

    fn tolerate_error(&mut self, id: Type1scCmd, err: &ModemError) -> bool {
        match id {
            Type1scCmd::Cpin => common::sim_error(&mut self.ctx, err),
            // evaluated by the sequencer, which deletes the socket again
            Type1scCmd::SocketActivate => {
                self.ctx.sid.socket_result = Some(err.code().unwrap_or(u16::MAX));
                true
            }
            // the remote may have closed it already
            Type1scCmd::SocketDeactivate => true,
            _ => false,
        }
    }

    fn response(&mut self, req: &Request<'_>) -> Result<Response, ErrorKind> {
        self.collect(req)
    }

    fn rollback(&mut self, req: &Request<'_>) -> Option<AtCommand<Type1scCmd>> {
        match req {
            // the modem keeps an allocated socket until it is deleted
            Request::DialSocket(_) if self.ctx.sid.conn.is_some() => {
                Some(AtCommand::write(Type1scCmd::SocketDelete).optional())
            }
            _ => None,
        }
    }

    fn abort(&mut self, req: &Request<'_>) {
        if let Some(conn) = self.ctx.sid.conn.take() {
            if let Some(handle) = self.ctx.persistent.sockets.by_conn(conn).map(|e| e.handle) {
                debug!("Releasing socket {} of {:?}", conn, handle);
                self.ctx.persistent.sockets.release(handle);
            }
        }
        if let Request::CloseSocket(handle) = req {
            self.ctx.persistent.sockets.release(*handle);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::socket::{Protocol, SocketHandle};
    use crate::context::SimState;
    use crate::error::CmeError;

    #[test]
    fn activation_errors_become_the_open_result() {
        let mut modem = Type1sc::new(Settings::default());
        assert!(modem.tolerate_error(
            Type1scCmd::SocketActivate,
            &ModemError::Cme(CmeError::Unknown)
        ));
        assert_eq!(modem.ctx.sid.socket_result, Some(100));

        modem.ctx.sid.socket_result = None;
        assert!(modem.tolerate_error(Type1scCmd::SocketActivate, &ModemError::Generic));
        assert_eq!(modem.ctx.sid.socket_result, Some(u16::MAX));

        assert!(modem.tolerate_error(Type1scCmd::Cpin, &ModemError::Cme(CmeError::SimBusy)));
        assert_eq!(modem.ctx.persistent.sim, SimState::Busy);
        assert!(!modem.tolerate_error(Type1scCmd::Cgact, &ModemError::Generic));
    }

    #[test]
    fn abort_forgets_the_allocated_socket() {
        let mut modem = Type1sc::new(Settings::default());
        modem
            .ctx
            .persistent
            .sockets
            .assign(SocketHandle(4), 2, Protocol::Tcp)
            .unwrap();
        modem.ctx.sid.conn = Some(2);
        modem.abort(&Request::GetSignalQuality);
        assert!(modem.ctx.persistent.sockets.get(SocketHandle(4)).is_none());
        assert_eq!(modem.ctx.sid.conn, None);
    }

    #[test]
    fn rollback_only_while_a_socket_is_allocated() {
        use crate::command::CommandKind;
        use crate::service::DialParams;
        use no_std_net::{Ipv4Addr, SocketAddr, SocketAddrV4};

        let mut modem = Type1sc::new(Settings::default());
        let dial = Request::DialSocket(DialParams {
            handle: SocketHandle(4),
            protocol: Protocol::Udp,
            remote: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 5684)),
            local_port: 0,
            pdn: None,
        });
        assert_eq!(modem.rollback(&dial), None);

        modem.ctx.sid.conn = Some(2);
        let cmd = modem.rollback(&dial).unwrap();
        assert_eq!((cmd.id, cmd.kind), (Type1scCmd::SocketDelete, CommandKind::Write));
        assert_eq!(modem.rollback(&Request::GetSignalQuality), None);
    }
}
