use embassy_time::Duration;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::command::{Answer, AtCommand};
use crate::context::pdn::PdnId;
use crate::context::socket::MAX_SOCKETS;
use crate::context::SimState;
use crate::error::{ErrorKind, SocketError};
use crate::modules::common;
use crate::sequencer::{body_step, invalid_step, Phase, Step, Transaction};
use crate::service::{DeviceInfoField, OperatorSelection, Request, ResetType, Sid};

use super::commands::MAX_SEND_CHUNK;
use super::{Type1sc, Type1scCmd};

const SYNC_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum Single {
    Run,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum PowerOn {
    WaitBoot,
    Sync,
    CheckSync,
    EchoOff,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum Reset {
    Request,
    WaitBoot,
    Sync,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum InitModem {
    SetFunctionality,
    ReportErrors,
    QuerySim,
    CheckSim,
    ReadIccid,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum RegisterNet {
    QueryOperator,
    SelectOperator,
    QueryEps,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum NetStatus {
    Eps,
    Operator,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum DefinePdn {
    Define,
    Authenticate,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum ActivatePdn {
    QueryBefore,
    Activate,
    QueryAfter,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum DialSocket {
    Allocate,
    Activate,
    Evaluate,
    Release,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum CloseSocket {
    Deactivate,
    Delete,
    Done,
}

impl Type1sc {
    pub(super) fn sequence(
        &mut self,
        req: &Request<'_>,
        tx: &mut Transaction,
    ) -> Result<Step<Type1scCmd>, ErrorKind> {
        match tx.phase() {
            Phase::Body(step) => self.body(req, step, tx),
            Phase::Preamble(step) => Err(invalid_step(req.sid(), step)),
        }
    }

    fn body(
        &mut self,
        req: &Request<'_>,
        step: u8,
        tx: &mut Transaction,
    ) -> Result<Step<Type1scCmd>, ErrorKind> {
        let sid = req.sid();
        let settings = self.settings;
        let boot = || {
            Step::Wait(AtCommand::event(
                Type1scCmd::Bootev,
                settings.boot_timeout,
                Answer::Optional,
                false,
            ))
        };

        let step = match req {
            Request::CheckConnection => single(sid, step, AtCommand::exec(Type1scCmd::At))?,

            Request::PowerOn => match body_step(sid, step)? {
                PowerOn::WaitBoot => boot(),
                PowerOn::Sync => Step::Send(AtCommand::exec(Type1scCmd::At).optional()),
                PowerOn::CheckSync => {
                    if tx.answered() {
                        Step::Skip
                    } else if tx.retry() < settings.sync_retries {
                        tx.jump_to_body(PowerOn::Sync);
                        Step::Tempo {
                            duration: SYNC_INTERVAL,
                            last: false,
                        }
                    } else {
                        error!("No answer after {} attempts", tx.retries());
                        return Err(ErrorKind::Timeout);
                    }
                }
                PowerOn::EchoOff => Step::Send(AtCommand::exec(Type1scCmd::Ate0)),
                PowerOn::Done => Step::Done,
            },

            Request::PowerOff => single(sid, step, AtCommand::write(Type1scCmd::Cfun))?,

            Request::Reset(kind) => match body_step(sid, step)? {
                Reset::Request => match kind {
                    ResetType::Software => Step::Send(AtCommand::exec(Type1scCmd::Reset)),
                    ResetType::Hardware => Step::Skip,
                    ResetType::Factory => return Err(ErrorKind::Unsupported),
                },
                Reset::WaitBoot => boot(),
                Reset::Sync => Step::Send(AtCommand::exec(Type1scCmd::Ate0)),
                Reset::Done => Step::Done,
            },

            Request::InitModem(_) => match body_step(sid, step)? {
                InitModem::SetFunctionality => Step::Send(AtCommand::write(Type1scCmd::Cfun)),
                InitModem::ReportErrors => Step::Send(AtCommand::write(Type1scCmd::Cmee)),
                InitModem::QuerySim => {
                    self.ctx.persistent.sim = SimState::Unknown;
                    Step::Send(AtCommand::read(Type1scCmd::Cpin))
                }
                InitModem::CheckSim => match self.ctx.persistent.sim {
                    SimState::Ready => Step::Skip,
                    state if state.is_transient() && tx.retries() < settings.sim_poll_retries => {
                        debug!("SIM {:?}, polling again", state);
                        tx.retry();
                        tx.jump_to_body(InitModem::QuerySim);
                        Step::Tempo {
                            duration: settings.sim_poll_interval,
                            last: false,
                        }
                    }
                    state => {
                        warn!("SIM not usable: {:?}", state);
                        return Err(ErrorKind::Sim(state));
                    }
                },
                InitModem::ReadIccid => Step::Send(AtCommand::exec(Type1scCmd::Ccid)),
                InitModem::Done => Step::Done,
            },

            Request::GetDeviceInfo(field) => {
                let id = match field {
                    DeviceInfoField::Manufacturer => Type1scCmd::Cgmi,
                    DeviceInfoField::Model => Type1scCmd::Cgmm,
                    DeviceInfoField::Revision => Type1scCmd::Cgmr,
                    DeviceInfoField::Imei => Type1scCmd::Cgsn,
                    DeviceInfoField::Iccid => Type1scCmd::Ccid,
                    DeviceInfoField::Imsi => Type1scCmd::Cimi,
                };
                single(sid, step, AtCommand::exec(id))?
            }

            Request::GetSignalQuality => single(sid, step, AtCommand::exec(Type1scCmd::Csq))?,
            Request::GetAttachStatus => single(sid, step, AtCommand::read(Type1scCmd::Cgatt))?,

            Request::RegisterNet(selection) => {
                let automatic = matches!(selection, OperatorSelection::Automatic);
                match body_step(sid, step)? {
                    RegisterNet::QueryOperator if automatic => {
                        Step::Send(AtCommand::read(Type1scCmd::Cops))
                    }
                    RegisterNet::QueryOperator => Step::Skip,
                    RegisterNet::SelectOperator
                        if automatic && self.ctx.sid.cops_automatic == Some(true) =>
                    {
                        Step::Skip
                    }
                    RegisterNet::SelectOperator => Step::Send(AtCommand::write(Type1scCmd::Cops)),
                    RegisterNet::QueryEps => Step::Send(AtCommand::read(Type1scCmd::Cereg)),
                    RegisterNet::Done => Step::Done,
                }
            }

            Request::DeregisterNet => single(sid, step, AtCommand::write(Type1scCmd::Cops))?,

            Request::GetNetStatus => match body_step(sid, step)? {
                NetStatus::Eps => Step::Send(AtCommand::read(Type1scCmd::Cereg)),
                NetStatus::Operator => Step::Send(AtCommand::read(Type1scCmd::Cops)),
                NetStatus::Done => Step::Done,
            },

            Request::SubscribeNetEvent(event) | Request::UnsubscribeNetEvent(event) => {
                match body_step(sid, step)? {
                    Single::Run => {
                        let events = &self.ctx.persistent.events;
                        let mode = if matches!(req, Request::SubscribeNetEvent(_)) {
                            events.preview_subscribe(*event)
                        } else {
                            events.preview_unsubscribe(*event)
                        };
                        self.ctx.sid.event_mode = mode;
                        match mode {
                            Some(_) => Step::Send(AtCommand::write(Type1scCmd::Cereg)),
                            None => Step::Skip,
                        }
                    }
                    Single::Done => Step::Done,
                }
            }

            Request::AttachPsDomain | Request::DetachPsDomain => {
                single(sid, step, AtCommand::write(Type1scCmd::Cgatt))?
            }

            Request::DefinePdn { id, .. } => match body_step(sid, step)? {
                DefinePdn::Define => {
                    self.pdn(Some(*id))?;
                    Step::Send(AtCommand::write(Type1scCmd::Cgdcont))
                }
                DefinePdn::Authenticate => Step::Send(AtCommand::write(Type1scCmd::Cgauth)),
                DefinePdn::Done => Step::Done,
            },

            Request::SetDefaultPdn(id) => match body_step(sid, step)? {
                Single::Run => {
                    self.pdn(Some(*id))?;
                    Step::Skip
                }
                Single::Done => Step::Done,
            },

            Request::ActivatePdn(id) => {
                let index = self.pdn(*id)?.0 as usize;
                match body_step(sid, step)? {
                    ActivatePdn::QueryBefore => Step::Send(AtCommand::read(Type1scCmd::Cgact)),
                    ActivatePdn::Activate if self.ctx.sid.pdn_active[index] == Some(true) => {
                        debug!("PDN {} already active", index);
                        Step::Skip
                    }
                    ActivatePdn::Activate => Step::Send(AtCommand::write(Type1scCmd::Cgact)),
                    ActivatePdn::QueryAfter => {
                        self.ctx.sid.pdn_active = Default::default();
                        Step::Send(AtCommand::read(Type1scCmd::Cgact))
                    }
                    ActivatePdn::Done => Step::Done,
                }
            }

            Request::DeactivatePdn(id) => {
                self.pdn(*id)?;
                single(sid, step, AtCommand::write(Type1scCmd::Cgact))?
            }

            Request::GetIpAddress(id) => {
                self.pdn(*id)?;
                single(sid, step, AtCommand::write(Type1scCmd::Cgpaddr))?
            }

            Request::DialSocket(params) => match body_step(sid, step)? {
                DialSocket::Allocate => {
                    self.pdn(params.pdn)?;
                    let sockets = &self.ctx.persistent.sockets;
                    if sockets.get(params.handle).is_some() {
                        return Err(SocketError::AlreadyOpen.into());
                    }
                    if sockets.iter().count() >= MAX_SOCKETS {
                        return Err(SocketError::NoFreeConnection.into());
                    }
                    Step::Send(AtCommand::write(Type1scCmd::SocketAllocate))
                }
                DialSocket::Activate => {
                    let Some(conn) = self.ctx.sid.conn else {
                        warn!("No socket id allocated for {:?}", params.handle);
                        return Err(ErrorKind::Protocol);
                    };
                    let sockets = &mut self.ctx.persistent.sockets;
                    sockets.assign(params.handle, conn, params.protocol)?;
                    if let Some(entry) = sockets.get_mut(params.handle) {
                        entry.remote = Some(params.remote);
                    }
                    Step::Send(
                        AtCommand::write(Type1scCmd::SocketActivate)
                            .with_timeout(settings.socket_open_timeout)
                            .optional(),
                    )
                }
                DialSocket::Evaluate => match self.ctx.sid.socket_result {
                    None if tx.answered() => {
                        if let Some(entry) = self.ctx.persistent.sockets.get_mut(params.handle) {
                            entry.flags.connected = true;
                        }
                        Step::Done
                    }
                    result => {
                        warn!("Activating {:?} failed: {:?}", params.handle, result);
                        Step::Send(AtCommand::write(Type1scCmd::SocketDelete).optional())
                    }
                },
                DialSocket::Release => {
                    self.ctx.persistent.sockets.release(params.handle);
                    self.ctx.sid.conn = None;
                    return Err(match self.ctx.sid.socket_result {
                        Some(code) => SocketError::OpenFailed(code).into(),
                        None => ErrorKind::Timeout,
                    });
                }
            },

            Request::SendData { handle, data } => {
                if matches!(Single::try_from(step), Ok(Single::Run)) {
                    self.ctx.persistent.sockets.connected(*handle)?;
                    if data.is_empty() || data.len() > MAX_SEND_CHUNK {
                        warn!("Cannot send {} bytes at once", data.len());
                        return Err(ErrorKind::InvalidParameter);
                    }
                }
                single(sid, step, AtCommand::write(Type1scCmd::Socketdata))?
            }

            Request::ReceiveData { handle, .. } => {
                if self.ctx.persistent.sockets.get(*handle).is_none() {
                    return Err(SocketError::NotFound.into());
                }
                single(sid, step, AtCommand::write(Type1scCmd::Socketdata))?
            }

            Request::CloseSocket(handle) => {
                if self.ctx.persistent.sockets.get(*handle).is_none() {
                    return Err(SocketError::NotFound.into());
                }
                match body_step(sid, step)? {
                    CloseSocket::Deactivate => {
                        Step::Send(AtCommand::write(Type1scCmd::SocketDeactivate))
                    }
                    CloseSocket::Delete => Step::Send(AtCommand::write(Type1scCmd::SocketDelete)),
                    CloseSocket::Done => Step::Done,
                }
            }

            Request::Ping(params) => {
                if matches!(Single::try_from(step), Ok(Single::Run)) {
                    self.pdn(params.pdn)?;
                    if params.host.is_empty() || params.count == 0 {
                        return Err(ErrorKind::InvalidParameter);
                    }
                }
                let timeout =
                    Duration::from_secs(u64::from(params.count) * u64::from(params.timeout_s))
                        + settings.ping_margin;
                single(
                    sid,
                    step,
                    AtCommand::write(Type1scCmd::Pingcmd).with_timeout(timeout),
                )?
            }

            Request::DirectCommand {
                command,
                timeout_ms,
            } => {
                if command.is_empty() {
                    return Err(ErrorKind::InvalidParameter);
                }
                common::direct_target(&mut self.ctx, command);
                let cmd = AtCommand::raw(Type1scCmd::Direct)
                    .with_timeout(Duration::from_millis(u64::from(*timeout_ms)));
                single(sid, step, cmd)?
            }

            Request::SetPowerConfig(_) => single(sid, step, AtCommand::write(Type1scCmd::Cpsms))?,

            Request::SuspendData | Request::ResumeData | Request::SleepRequest | Request::Wakeup => {
                warn!("{:?} not supported by this modem", sid);
                return Err(ErrorKind::Unsupported);
            }
        };
        Ok(step)
    }

    fn pdn(&self, id: Option<PdnId>) -> Result<PdnId, ErrorKind> {
        self.ctx.persistent.pdn.resolve(id).ok_or_else(|| {
            warn!("Unknown PDN {:?}", id);
            ErrorKind::InvalidParameter
        })
    }
}

fn single(sid: Sid, step: u8, cmd: AtCommand<Type1scCmd>) -> Result<Step<Type1scCmd>, ErrorKind> {
    Ok(match body_step(sid, step)? {
        Single::Run => Step::Send(cmd),
        Single::Done => Step::Done,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::command::CommandKind;
    use crate::config::Settings;
    use crate::context::socket::{Protocol, SocketHandle};
    use crate::modem::Modem;
    use crate::service::DialParams;
    use no_std_net::{Ipv4Addr, SocketAddr, SocketAddrV4};

    fn sent(step: Step<Type1scCmd>) -> (Type1scCmd, CommandKind) {
        match step {
            Step::Send(cmd) => (cmd.id, cmd.kind),
            _ => panic!("expected a command"),
        }
    }

    fn dial(handle: u8) -> Request<'static> {
        Request::DialSocket(DialParams {
            handle: SocketHandle(handle),
            protocol: Protocol::Tcp,
            remote: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 443)),
            local_port: 0,
            pdn: None,
        })
    }

    #[test]
    fn dial_allocates_then_activates() {
        let mut modem = Type1sc::new(Settings::default());
        let req = dial(1);
        let mut tx = Transaction::new(Type1sc::PREAMBLE_STEPS);
        assert_eq!(
            sent(modem.next_step(&req, &mut tx).unwrap()),
            (Type1scCmd::SocketAllocate, CommandKind::Write)
        );
        modem.ctx.sid.conn = Some(5);
        tx.advance();
        assert_eq!(
            sent(modem.next_step(&req, &mut tx).unwrap()),
            (Type1scCmd::SocketActivate, CommandKind::Write)
        );
        assert_eq!(modem.ctx.persistent.sockets.get(SocketHandle(1)).unwrap().conn, 5);

        tx.set_answered(true);
        tx.advance();
        assert_eq!(modem.next_step(&req, &mut tx), Ok(Step::Done));
        assert!(modem.ctx.persistent.sockets.get(SocketHandle(1)).unwrap().flags.connected);
    }

    #[test]
    fn failed_activation_deletes_the_socket() {
        let mut modem = Type1sc::new(Settings::default());
        let req = dial(1);
        let mut tx = Transaction::new(Type1sc::PREAMBLE_STEPS);
        modem.next_step(&req, &mut tx).unwrap();
        modem.ctx.sid.conn = Some(5);
        tx.advance();
        modem.next_step(&req, &mut tx).unwrap();
        modem.ctx.sid.socket_result = Some(100);
        tx.set_answered(true);
        tx.advance();
        assert_eq!(
            sent(modem.next_step(&req, &mut tx).unwrap()),
            (Type1scCmd::SocketDelete, CommandKind::Write)
        );
        tx.advance();
        assert_eq!(
            modem.next_step(&req, &mut tx),
            Err(ErrorKind::Socket(SocketError::OpenFailed(100)))
        );
        assert!(modem.ctx.persistent.sockets.get(SocketHandle(1)).is_none());
    }

    #[test]
    fn dial_refuses_known_handles() {
        let mut modem = Type1sc::new(Settings::default());
        modem
            .ctx
            .persistent
            .sockets
            .assign(SocketHandle(1), 0, Protocol::Udp)
            .unwrap();
        let mut tx = Transaction::new(Type1sc::PREAMBLE_STEPS);
        assert_eq!(
            modem.next_step(&dial(1), &mut tx),
            Err(ErrorKind::Socket(SocketError::AlreadyOpen))
        );
    }

    #[test]
    fn low_power_services_are_unsupported() {
        let mut modem = Type1sc::new(Settings::default());
        let mut tx = Transaction::new(Type1sc::PREAMBLE_STEPS);
        assert_eq!(
            modem.next_step(&Request::SleepRequest, &mut tx),
            Err(ErrorKind::Unsupported)
        );
        assert_eq!(
            modem.next_step(&Request::ResumeData, &mut tx),
            Err(ErrorKind::Unsupported)
        );
    }

    #[test]
    fn reset_waits_for_the_boot_event() {
        let mut modem = Type1sc::new(Settings::default());
        let req = Request::Reset(ResetType::Software);
        let mut tx = Transaction::new(Type1sc::PREAMBLE_STEPS);
        assert_eq!(
            sent(modem.next_step(&req, &mut tx).unwrap()),
            (Type1scCmd::Reset, CommandKind::Execute)
        );
        tx.advance();
        assert!(matches!(
            modem.next_step(&req, &mut tx),
            Ok(Step::Wait(cmd)) if cmd.id == Type1scCmd::Bootev && cmd.answer == Answer::Optional
        ));
        assert_eq!(
            modem.next_step(&Request::Reset(ResetType::Factory), &mut Transaction::new(0)),
            Err(ErrorKind::Unsupported)
        );
    }
}
