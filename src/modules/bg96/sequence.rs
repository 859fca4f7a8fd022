use embassy_time::Duration;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::command::{Answer, AtCommand};
use crate::context::pdn::{PdnId, PdpType};
use crate::context::{LowPowerState, ModemMode, SimState};
use crate::error::ErrorKind;
use crate::modules::common;
use crate::sequencer::{body_step, Phase, Step, Transaction};
use crate::service::{DeviceInfoField, OperatorSelection, Request, ResetType, MAX_RECEIVE, MAX_SEND};

use super::commands::MAX_CONNECTIONS;
use super::{Bg96, Bg96Cmd};

/// Pause between synchronization attempts after boot.
const SYNC_INTERVAL: Duration = Duration::from_millis(500);

/// Services made of a single command.
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
    FlowControl,
    UrcPort,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum PowerOff {
    PowerDown,
    WaitDown,
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
    QueryGprs,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum NetStatus {
    Eps,
    Gprs,
    Cs,
    Operator,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum Subscription {
    Apply,
    ApplyGprs,
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
    Open,
    WaitOpen,
    Evaluate,
    Release,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum SendData {
    Request,
    Payload,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum Ping {
    Request,
    WaitResult,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum SuspendData {
    Guard,
    Escape,
    Done,
}

#[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum Wakeup {
    Done,
}

impl Bg96 {
    pub(super) fn sequence(
        &mut self,
        req: &Request<'_>,
        tx: &mut Transaction,
    ) -> Result<Step<Bg96Cmd>, ErrorKind> {
        match tx.phase() {
            Phase::Preamble(step) => Ok(self.wake(step, tx)),
            Phase::Body(step) => self.body(req, step, tx),
        }
    }

    /// Two `AT` attempts when the modem may be asleep: the first one only
    /// wakes the UART and may be lost.
    fn wake(&mut self, step: u8, tx: &Transaction) -> Step<Bg96Cmd> {
        let persistent = &mut self.ctx.persistent;
        if persistent.low_power != LowPowerState::Sleeping {
            return Step::Skip;
        }
        match step {
            0 => Step::Send(AtCommand::exec(Bg96Cmd::At).optional()),
            _ => {
                debug!("Modem woken");
                persistent.low_power = LowPowerState::Awake;
                self.ctx.sid.woke = true;
                if tx.answered() {
                    Step::Skip
                } else {
                    Step::Send(AtCommand::exec(Bg96Cmd::At))
                }
            }
        }
    }

    fn body(
        &mut self,
        req: &Request<'_>,
        step: u8,
        tx: &mut Transaction,
    ) -> Result<Step<Bg96Cmd>, ErrorKind> {
        let sid = req.sid();
        let settings = self.settings;

        let step = match req {
            Request::CheckConnection => single(sid, step, AtCommand::exec(Bg96Cmd::At))?,

            Request::PowerOn => match body_step(sid, step)? {
                PowerOn::WaitBoot => Step::Wait(AtCommand::event(
                    Bg96Cmd::Rdy,
                    settings.boot_timeout,
                    Answer::Optional,
                    false,
                )),
                PowerOn::Sync => Step::Send(AtCommand::exec(Bg96Cmd::At).optional()),
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
                PowerOn::EchoOff => Step::Send(AtCommand::exec(Bg96Cmd::Ate0)),
                PowerOn::FlowControl => Step::Send(AtCommand::write(Bg96Cmd::Ifc)),
                PowerOn::UrcPort => Step::Send(AtCommand::write(Bg96Cmd::Qurccfg)),
                PowerOn::Done => Step::Done,
            },

            Request::PowerOff => match body_step(sid, step)? {
                PowerOff::PowerDown => Step::Send(AtCommand::write(Bg96Cmd::Qpowd)),
                PowerOff::WaitDown => Step::Wait(AtCommand::event(
                    Bg96Cmd::PoweredDown,
                    settings.power_down_timeout,
                    Answer::Optional,
                    false,
                )),
                PowerOff::Done => Step::Done,
            },

            Request::Reset(kind) => match body_step(sid, step)? {
                Reset::Request => match kind {
                    ResetType::Software => Step::Send(AtCommand::write(Bg96Cmd::Cfun)),
                    // the reset pin was pulsed before the service started
                    ResetType::Hardware => Step::Skip,
                    ResetType::Factory => return Err(ErrorKind::Unsupported),
                },
                Reset::WaitBoot => Step::Wait(AtCommand::event(
                    Bg96Cmd::Rdy,
                    settings.boot_timeout,
                    Answer::Optional,
                    false,
                )),
                Reset::Sync => Step::Send(AtCommand::exec(Bg96Cmd::Ate0)),
                Reset::Done => Step::Done,
            },

            Request::InitModem(_) => match body_step(sid, step)? {
                InitModem::SetFunctionality => Step::Send(AtCommand::write(Bg96Cmd::Cfun)),
                InitModem::ReportErrors => Step::Send(AtCommand::write(Bg96Cmd::Cmee)),
                InitModem::QuerySim => {
                    self.ctx.persistent.sim = SimState::Unknown;
                    Step::Send(AtCommand::read(Bg96Cmd::Cpin))
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
                InitModem::ReadIccid => Step::Send(AtCommand::exec(Bg96Cmd::Qccid)),
                InitModem::Done => Step::Done,
            },

            Request::GetDeviceInfo(field) => {
                let id = match field {
                    DeviceInfoField::Manufacturer => Bg96Cmd::Cgmi,
                    DeviceInfoField::Model => Bg96Cmd::Cgmm,
                    DeviceInfoField::Revision => Bg96Cmd::Cgmr,
                    DeviceInfoField::Imei => Bg96Cmd::Cgsn,
                    DeviceInfoField::Iccid => Bg96Cmd::Qccid,
                    DeviceInfoField::Imsi => Bg96Cmd::Cimi,
                };
                single(sid, step, AtCommand::exec(id))?
            }

            Request::GetSignalQuality => single(sid, step, AtCommand::exec(Bg96Cmd::Csq))?,
            Request::GetAttachStatus => single(sid, step, AtCommand::read(Bg96Cmd::Cgatt))?,

            Request::RegisterNet(selection) => {
                let automatic = matches!(selection, OperatorSelection::Automatic);
                match body_step(sid, step)? {
                    RegisterNet::QueryOperator if automatic => {
                        Step::Send(AtCommand::read(Bg96Cmd::Cops))
                    }
                    RegisterNet::QueryOperator => Step::Skip,
                    RegisterNet::SelectOperator
                        if automatic && self.ctx.sid.cops_automatic == Some(true) =>
                    {
                        debug!("Automatic operator selection already active");
                        Step::Skip
                    }
                    RegisterNet::SelectOperator => Step::Send(AtCommand::write(Bg96Cmd::Cops)),
                    RegisterNet::QueryEps => Step::Send(AtCommand::read(Bg96Cmd::Cereg)),
                    RegisterNet::QueryGprs => Step::Send(AtCommand::read(Bg96Cmd::Cgreg)),
                    RegisterNet::Done => Step::Done,
                }
            }

            Request::DeregisterNet => single(sid, step, AtCommand::write(Bg96Cmd::Cops))?,

            Request::GetNetStatus => match body_step(sid, step)? {
                NetStatus::Eps => Step::Send(AtCommand::read(Bg96Cmd::Cereg)),
                NetStatus::Gprs => Step::Send(AtCommand::read(Bg96Cmd::Cgreg)),
                NetStatus::Cs => Step::Send(AtCommand::read(Bg96Cmd::Creg)),
                NetStatus::Operator => Step::Send(AtCommand::read(Bg96Cmd::Cops)),
                NetStatus::Done => Step::Done,
            },

            Request::SubscribeNetEvent(event) | Request::UnsubscribeNetEvent(event) => {
                match body_step(sid, step)? {
                    Subscription::Apply => {
                        let events = &self.ctx.persistent.events;
                        let mode = if matches!(req, Request::SubscribeNetEvent(_)) {
                            events.preview_subscribe(*event)
                        } else {
                            events.preview_unsubscribe(*event)
                        };
                        self.ctx.sid.event_mode = mode;
                        match mode {
                            Some(_) => Step::Send(AtCommand::write(Bg96Cmd::Cereg)),
                            None => Step::Skip,
                        }
                    }
                    Subscription::ApplyGprs if self.ctx.sid.event_mode.is_some() => {
                        Step::Send(AtCommand::write(Bg96Cmd::Cgreg))
                    }
                    Subscription::ApplyGprs => Step::Skip,
                    Subscription::Done => Step::Done,
                }
            }

            Request::AttachPsDomain | Request::DetachPsDomain => {
                single(sid, step, AtCommand::write(Bg96Cmd::Cgatt))?
            }

            Request::DefinePdn { id, config } => {
                if matches!(Single::try_from(step), Ok(Single::Run)) {
                    self.pdn(Some(*id))?;
                    if config.pdp_type == PdpType::NonIp {
                        warn!("Non-IP contexts are not supported");
                        return Err(ErrorKind::Unsupported);
                    }
                }
                single(sid, step, AtCommand::write(Bg96Cmd::Qicsgp))?
            }

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
                    ActivatePdn::QueryBefore => Step::Send(AtCommand::read(Bg96Cmd::Qiact)),
                    ActivatePdn::Activate if self.ctx.sid.pdn_active[index] == Some(true) => {
                        debug!("PDN {} already active", index);
                        Step::Skip
                    }
                    ActivatePdn::Activate => Step::Send(AtCommand::write(Bg96Cmd::Qiact)),
                    ActivatePdn::QueryAfter => {
                        self.ctx.sid.pdn_active = Default::default();
                        Step::Send(AtCommand::read(Bg96Cmd::Qiact))
                    }
                    ActivatePdn::Done => Step::Done,
                }
            }

            Request::DeactivatePdn(id) => {
                self.pdn(*id)?;
                single(sid, step, AtCommand::write(Bg96Cmd::Qideact))?
            }

            Request::GetIpAddress(id) => {
                self.pdn(*id)?;
                single(sid, step, AtCommand::write(Bg96Cmd::Cgpaddr))?
            }

            Request::DialSocket(params) => match body_step(sid, step)? {
                DialSocket::Open => {
                    self.pdn(params.pdn)?;
                    let sockets = &mut self.ctx.persistent.sockets;
                    let conn = sockets.reserve(params.handle, params.protocol, MAX_CONNECTIONS)?;
                    if let Some(entry) = sockets.get_mut(params.handle) {
                        entry.remote = Some(params.remote);
                    }
                    self.ctx.sid.conn = Some(conn);
                    Step::Send(AtCommand::write(Bg96Cmd::Qiopen))
                }
                DialSocket::WaitOpen if self.ctx.sid.socket_result.is_some() => Step::Skip,
                DialSocket::WaitOpen => Step::Wait(AtCommand::event(
                    Bg96Cmd::Qiopen,
                    settings.socket_open_timeout,
                    Answer::Optional,
                    false,
                )),
                DialSocket::Evaluate => match self.ctx.sid.socket_result {
                    Some(0) => {
                        if let Some(entry) = self.ctx.persistent.sockets.get_mut(params.handle) {
                            entry.flags.connected = true;
                        }
                        Step::Done
                    }
                    Some(code) => {
                        warn!("Opening {:?} failed with {}", params.handle, code);
                        self.ctx.persistent.sockets.release(params.handle);
                        self.ctx.sid.conn = None;
                        return Err(ErrorKind::Socket(crate::error::SocketError::OpenFailed(
                            code,
                        )));
                    }
                    None => {
                        warn!("No open result for {:?}, closing", params.handle);
                        Step::Send(AtCommand::write(Bg96Cmd::Qiclose).optional())
                    }
                },
                DialSocket::Release => {
                    self.ctx.persistent.sockets.release(params.handle);
                    self.ctx.sid.conn = None;
                    return Err(ErrorKind::Timeout);
                }
            },

            Request::SendData { handle, data } => match body_step(sid, step)? {
                SendData::Request => {
                    self.ctx.persistent.sockets.connected(*handle)?;
                    if data.is_empty() || data.len() > MAX_SEND {
                        warn!("Cannot send {} bytes at once", data.len());
                        return Err(ErrorKind::InvalidParameter);
                    }
                    Step::Send(AtCommand::write(Bg96Cmd::Qisend).with_prompt())
                }
                SendData::Payload => Step::Send(AtCommand::raw(Bg96Cmd::SendRaw)),
                SendData::Done => Step::Done,
            },

            Request::ReceiveData { handle, max_len } => {
                if self.ctx.persistent.sockets.get(*handle).is_none() {
                    return Err(crate::error::SocketError::NotFound.into());
                }
                let size = (*max_len as usize).min(MAX_RECEIVE);
                single(sid, step, AtCommand::write(Bg96Cmd::Qird).with_raw_size(size))?
            }

            Request::CloseSocket(handle) => {
                if self.ctx.persistent.sockets.get(*handle).is_none() {
                    return Err(crate::error::SocketError::NotFound.into());
                }
                single(sid, step, AtCommand::write(Bg96Cmd::Qiclose))?
            }

            Request::Ping(params) => match body_step(sid, step)? {
                Ping::Request => {
                    self.pdn(params.pdn)?;
                    if params.host.is_empty() || params.count == 0 {
                        return Err(ErrorKind::InvalidParameter);
                    }
                    Step::Send(AtCommand::write(Bg96Cmd::Qping))
                }
                Ping::WaitResult if self.ctx.sid.ping.is_some() => Step::Skip,
                Ping::WaitResult => {
                    let timeout = Duration::from_secs(
                        u64::from(params.count) * u64::from(params.timeout_s),
                    ) + settings.ping_margin;
                    Step::Wait(AtCommand::event(
                        Bg96Cmd::Qping,
                        timeout,
                        Answer::Mandatory,
                        false,
                    ))
                }
                Ping::Done => Step::Done,
            },

            Request::DirectCommand {
                command,
                timeout_ms,
            } => {
                if command.is_empty() {
                    return Err(ErrorKind::InvalidParameter);
                }
                common::direct_target(&mut self.ctx, command);
                let cmd = AtCommand::raw(Bg96Cmd::Direct)
                    .with_timeout(Duration::from_millis(u64::from(*timeout_ms)));
                single(sid, step, cmd)?
            }

            Request::SuspendData => match body_step(sid, step)? {
                SuspendData::Guard if self.ctx.persistent.mode != ModemMode::Data => {
                    debug!("Not in data mode");
                    Step::Done
                }
                SuspendData::Guard => Step::Tempo {
                    duration: settings.escape_guard,
                    last: false,
                },
                SuspendData::Escape => Step::Send(AtCommand::raw(Bg96Cmd::Escape)),
                SuspendData::Done => Step::Done,
            },

            Request::ResumeData => single(sid, step, AtCommand::exec(Bg96Cmd::Ato))?,

            Request::SetPowerConfig(_) => single(sid, step, AtCommand::write(Bg96Cmd::Cpsms))?,

            Request::SleepRequest => {
                if !cfg!(feature = "low-power") {
                    return Err(ErrorKind::Unsupported);
                }
                single(sid, step, AtCommand::write(Bg96Cmd::Qsclk))?
            }

            Request::Wakeup => match body_step(sid, step)? {
                Wakeup::Done => Step::Done,
            },
        };
        Ok(step)
    }

    /// `id`, or the default PDN, if it is within the table.
    fn pdn(&self, id: Option<PdnId>) -> Result<PdnId, ErrorKind> {
        self.ctx.persistent.pdn.resolve(id).ok_or_else(|| {
            warn!("Unknown PDN {:?}", id);
            ErrorKind::InvalidParameter
        })
    }
}

fn single(
    sid: crate::service::Sid,
    step: u8,
    cmd: AtCommand<Bg96Cmd>,
) -> Result<Step<Bg96Cmd>, ErrorKind> {
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
    use crate::context::pdn::PdnConfig;
    use crate::context::socket::{Protocol, SocketHandle};
    use crate::modem::Modem;
    use crate::service::{DialParams, Functionality, Sid};
    use no_std_net::{Ipv4Addr, SocketAddr, SocketAddrV4};

    fn body(bg96: &mut Bg96, req: &Request<'_>, tx: &mut Transaction) -> Step<Bg96Cmd> {
        while matches!(tx.phase(), Phase::Preamble(_)) {
            bg96.next_step(req, tx).unwrap();
            tx.advance();
        }
        bg96.next_step(req, tx).unwrap()
    }

    fn sent(step: Step<Bg96Cmd>) -> (Bg96Cmd, CommandKind) {
        match step {
            Step::Send(cmd) => (cmd.id, cmd.kind),
            _ => panic!("expected a command"),
        }
    }

    #[test]
    fn sim_polling_jumps_back() {
        let mut bg96 = Bg96::new(Settings::default());
        let req = Request::InitModem(Functionality::Full);
        let mut tx = Transaction::new(Bg96::PREAMBLE_STEPS);
        assert_eq!(sent(body(&mut bg96, &req, &mut tx)), (Bg96Cmd::Cfun, CommandKind::Write));
        tx.advance();
        tx.advance();
        assert_eq!(sent(bg96.next_step(&req, &mut tx).unwrap()), (Bg96Cmd::Cpin, CommandKind::Read));
        tx.advance();

        bg96.ctx.persistent.sim = SimState::NotReady;
        assert!(matches!(
            bg96.next_step(&req, &mut tx),
            Ok(Step::Tempo { .. })
        ));
        tx.advance();
        assert_eq!(sent(bg96.next_step(&req, &mut tx).unwrap()), (Bg96Cmd::Cpin, CommandKind::Read));
        assert_eq!(bg96.ctx.persistent.sim, SimState::Unknown);

        tx.advance();
        bg96.ctx.persistent.sim = SimState::PinRequired;
        assert_eq!(
            bg96.next_step(&req, &mut tx),
            Err(ErrorKind::Sim(SimState::PinRequired))
        );
    }

    #[test]
    fn steps_past_the_end_are_invalid() {
        let mut bg96 = Bg96::new(Settings::default());
        let req = Request::GetSignalQuality;
        let mut tx = Transaction::new(Bg96::PREAMBLE_STEPS);
        assert_eq!(sent(body(&mut bg96, &req, &mut tx)), (Bg96Cmd::Csq, CommandKind::Execute));
        tx.advance();
        assert_eq!(bg96.next_step(&req, &mut tx), Ok(Step::Done));
        tx.advance();
        assert_eq!(
            bg96.next_step(&req, &mut tx),
            Err(ErrorKind::InvalidStep {
                sid: Sid::GetSignalQuality,
                step: 2
            })
        );
    }

    #[test]
    fn dial_reserves_a_connection() {
        let mut bg96 = Bg96::new(Settings::default());
        let req = Request::DialSocket(DialParams {
            handle: SocketHandle(3),
            protocol: Protocol::Udp,
            remote: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(1, 2, 3, 4), 5683)),
            local_port: 0,
            pdn: None,
        });
        let mut tx = Transaction::new(Bg96::PREAMBLE_STEPS);
        assert_eq!(sent(body(&mut bg96, &req, &mut tx)), (Bg96Cmd::Qiopen, CommandKind::Write));
        assert_eq!(bg96.ctx.sid.conn, Some(0));

        bg96.ctx.sid.socket_result = Some(0);
        tx.advance();
        assert_eq!(bg96.next_step(&req, &mut tx), Ok(Step::Skip));
        tx.advance();
        assert_eq!(bg96.next_step(&req, &mut tx), Ok(Step::Done));
        let entry = bg96.ctx.persistent.sockets.get(SocketHandle(3)).unwrap();
        assert!(entry.flags.connected);
    }

    #[test]
    fn rejected_open_frees_the_connection() {
        let mut bg96 = Bg96::new(Settings::default());
        let req = Request::DialSocket(DialParams {
            handle: SocketHandle(3),
            protocol: Protocol::Tcp,
            remote: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(1, 2, 3, 4), 80)),
            local_port: 0,
            pdn: None,
        });
        let mut tx = Transaction::new(Bg96::PREAMBLE_STEPS);
        body(&mut bg96, &req, &mut tx);
        bg96.ctx.sid.socket_result = Some(566);
        tx.advance();
        tx.advance();
        assert_eq!(
            bg96.next_step(&req, &mut tx),
            Err(ErrorKind::Socket(crate::error::SocketError::OpenFailed(566)))
        );
        assert!(bg96.ctx.persistent.sockets.get(SocketHandle(3)).is_none());
    }

    #[test]
    fn non_ip_contexts_are_refused() {
        let mut bg96 = Bg96::new(Settings::default());
        let mut config = PdnConfig::new("iot");
        config.pdp_type = PdpType::NonIp;
        let req = Request::DefinePdn {
            id: PdnId(0),
            config,
        };
        let mut tx = Transaction::new(Bg96::PREAMBLE_STEPS);
        while matches!(tx.phase(), Phase::Preamble(_)) {
            bg96.next_step(&req, &mut tx).unwrap();
            tx.advance();
        }
        assert_eq!(bg96.next_step(&req, &mut tx), Err(ErrorKind::Unsupported));

        let req = Request::SetDefaultPdn(PdnId(7));
        let mut tx = Transaction::new(Bg96::PREAMBLE_STEPS);
        while matches!(tx.phase(), Phase::Preamble(_)) {
            bg96.next_step(&req, &mut tx).unwrap();
            tx.advance();
        }
        assert_eq!(bg96.next_step(&req, &mut tx), Err(ErrorKind::InvalidParameter));
    }

    #[cfg(feature = "low-power")]
    #[test]
    fn sleeping_modem_is_woken_first() {
        let mut bg96 = Bg96::new(Settings::default());
        bg96.ctx.persistent.low_power = LowPowerState::Sleeping;
        let req = Request::GetSignalQuality;
        let mut tx = Transaction::new(Bg96::PREAMBLE_STEPS);

        let first = bg96.next_step(&req, &mut tx).unwrap();
        assert!(matches!(first, Step::Send(cmd) if cmd.answer == Answer::Optional));
        tx.set_answered(false);
        tx.advance();
        assert_eq!(sent(bg96.next_step(&req, &mut tx).unwrap()), (Bg96Cmd::At, CommandKind::Execute));
        assert_eq!(bg96.ctx.persistent.low_power, LowPowerState::Awake);
        assert!(bg96.ctx.sid.woke);
    }
}
