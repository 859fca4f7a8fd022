use crate::command::{general, AtCommand, BuildError, CommandBuffer, CommandKind};
use crate::config::Settings;
use crate::context::pdn::{PdnId, PdpType};
use crate::context::socket::{Protocol, SocketHandle};
use crate::context::ModemContext;
use crate::service::{Request, ResetType, MAX_RECEIVE};

use super::Bg96Cmd;

/// Appends the parameters of `cmd` for `req`. Commands that are not writes
/// (or raw data) take no parameters.
pub(super) fn parameters(
    ctx: &ModemContext,
    settings: &Settings,
    req: &Request<'_>,
    cmd: &AtCommand<Bg96Cmd>,
    buf: &mut CommandBuffer,
) -> Result<(), BuildError> {
    if !matches!(cmd.kind, CommandKind::Write | CommandKind::Raw) {
        return Ok(());
    }

    match (cmd.id, req) {
        (Bg96Cmd::Cfun, Request::InitModem(fun)) => buf.push_fmt(format_args!("{}", *fun as u8)),
        (Bg96Cmd::Cfun, Request::Reset(ResetType::Software)) => buf.push_bytes(b"1,1"),
        (Bg96Cmd::Cmee, _) => buf.push_bytes(b"1"),
        (Bg96Cmd::Ifc, _) if settings.flow_control => buf.push_bytes(b"2,2"),
        (Bg96Cmd::Ifc, _) => buf.push_bytes(b"0,0"),
        (Bg96Cmd::Qurccfg, _) => buf.push_bytes(b"\"urcport\",\"uart1\""),
        (Bg96Cmd::Cops, Request::RegisterNet(selection)) => {
            general::build_operator_selection(Some(selection), buf)
        }
        (Bg96Cmd::Cops, Request::DeregisterNet) => general::build_operator_selection(None, buf),
        (Bg96Cmd::Creg | Bg96Cmd::Cgreg | Bg96Cmd::Cereg, _) => {
            let mode = ctx.sid.event_mode.ok_or(BuildError::MissingContext)?;
            buf.push_fmt(format_args!("{}", mode as u8))
        }
        (Bg96Cmd::Cgatt, Request::AttachPsDomain) => buf.push_bytes(b"1"),
        (Bg96Cmd::Cgatt, Request::DetachPsDomain) => buf.push_bytes(b"0"),
        (Bg96Cmd::Qicsgp, Request::DefinePdn { id, config }) => {
            let context_type = match config.pdp_type {
                PdpType::Ip => 1,
                PdpType::Ipv6 => 2,
                PdpType::Ipv4v6 => 3,
                PdpType::NonIp => return Err(BuildError::MissingContext),
            };
            buf.push_fmt(format_args!("{},{},", pdn_cid(ctx, Some(*id))?, context_type))?;
            buf.push_quoted(&config.apn)?;
            buf.push_bytes(b",")?;
            buf.push_quoted(&config.username)?;
            buf.push_bytes(b",")?;
            buf.push_quoted(&config.password)?;
            buf.push_fmt(format_args!(",{}", config.auth as u8))
        }
        (Bg96Cmd::Qiact, Request::ActivatePdn(id))
        | (Bg96Cmd::Qideact, Request::DeactivatePdn(id))
        | (Bg96Cmd::Cgpaddr, Request::GetIpAddress(id)) => {
            buf.push_fmt(format_args!("{}", pdn_cid(ctx, *id)?))
        }
        (Bg96Cmd::Qiopen, Request::DialSocket(params)) => {
            let conn = ctx.sid.conn.ok_or(BuildError::MissingContext)?;
            let service = match params.protocol {
                Protocol::Tcp => "TCP",
                Protocol::Udp => "UDP",
            };
            buf.push_fmt(format_args!(
                "{},{},\"{}\",\"{}\",{},{},0",
                pdn_cid(ctx, params.pdn)?,
                conn,
                service,
                params.remote.ip(),
                params.remote.port(),
                params.local_port,
            ))
        }
        (Bg96Cmd::Qiclose, Request::DialSocket(_)) => {
            let conn = ctx.sid.conn.ok_or(BuildError::MissingContext)?;
            buf.push_fmt(format_args!("{}", conn))
        }
        (Bg96Cmd::Qiclose, Request::CloseSocket(handle)) => {
            buf.push_fmt(format_args!("{}", conn_of(ctx, *handle)?))
        }
        (Bg96Cmd::Qisend, Request::SendData { handle, data }) => {
            buf.push_fmt(format_args!("{},{}", conn_of(ctx, *handle)?, data.len()))
        }
        (Bg96Cmd::SendRaw, Request::SendData { data, .. }) => buf.push_bytes(data),
        (Bg96Cmd::Qird, Request::ReceiveData { handle, max_len }) => buf.push_fmt(format_args!(
            "{},{}",
            conn_of(ctx, *handle)?,
            (*max_len as usize).min(MAX_RECEIVE)
        )),
        (Bg96Cmd::Qping, Request::Ping(params)) => {
            buf.push_fmt(format_args!("{},", pdn_cid(ctx, params.pdn)?))?;
            buf.push_quoted(params.host)?;
            buf.push_fmt(format_args!(",{},{}", params.timeout_s, params.count))
        }
        (Bg96Cmd::Cpsms, Request::SetPowerConfig(config)) => general::build_power_saving(config, buf),
        (Bg96Cmd::Qsclk, Request::SleepRequest) => buf.push_bytes(b"1"),
        (Bg96Cmd::Qpowd, _) => buf.push_bytes(b"1"),
        (Bg96Cmd::Escape, _) => buf.push_bytes(b"+++"),
        (Bg96Cmd::Direct, Request::DirectCommand { command, .. }) => {
            buf.push_bytes(command.as_bytes())?;
            buf.push_bytes(b"\r")
        }
        _ => {
            error!("No parameters for AT{} in {:?}", cmd.name(), req.sid());
            Err(BuildError::MissingContext)
        }
    }
}

fn pdn_cid(ctx: &ModemContext, id: Option<PdnId>) -> Result<u8, BuildError> {
    let pdn = &ctx.persistent.pdn;
    pdn.resolve(id)
        .and_then(|id| pdn.cid(id))
        .ok_or(BuildError::MissingContext)
}

fn conn_of(ctx: &ModemContext, handle: SocketHandle) -> Result<u8, BuildError> {
    ctx.persistent
        .sockets
        .get(handle)
        .map(|e| e.conn)
        .ok_or(BuildError::MissingContext)
}
