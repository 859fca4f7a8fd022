use crate::command::{general, AtCommand, BuildError, CommandBuffer, CommandKind};
use crate::context::pdn::{AuthType, PdnId};
use crate::context::socket::{Protocol, SocketHandle};
use crate::context::ModemContext;
use crate::hex;
use crate::service::Request;

use super::commands::MAX_RECEIVE_CHUNK;
use super::Type1scCmd;

pub(super) fn parameters(
    ctx: &ModemContext,
    req: &Request<'_>,
    cmd: &AtCommand<Type1scCmd>,
    buf: &mut CommandBuffer,
) -> Result<(), BuildError> {
    if !matches!(cmd.kind, CommandKind::Write | CommandKind::Raw) {
        return Ok(());
    }

    match (cmd.id, req) {
        (Type1scCmd::Cfun, Request::InitModem(fun)) => buf.push_fmt(format_args!("{}", *fun as u8)),
        (Type1scCmd::Cfun, Request::PowerOff) => buf.push_bytes(b"0"),
        (Type1scCmd::Cmee, _) => buf.push_bytes(b"1"),
        (Type1scCmd::Cops, Request::RegisterNet(selection)) => {
            general::build_operator_selection(Some(selection), buf)
        }
        (Type1scCmd::Cops, Request::DeregisterNet) => general::build_operator_selection(None, buf),
        (Type1scCmd::Cereg, _) => {
            let mode = ctx.sid.event_mode.ok_or(BuildError::MissingContext)?;
            buf.push_fmt(format_args!("{}", mode as u8))
        }
        (Type1scCmd::Cgatt, Request::AttachPsDomain) => buf.push_bytes(b"1"),
        (Type1scCmd::Cgatt, Request::DetachPsDomain) => buf.push_bytes(b"0"),
        (Type1scCmd::Cgdcont, Request::DefinePdn { id, config }) => {
            buf.push_fmt(format_args!("{},", pdn_cid(ctx, Some(*id))?))?;
            buf.push_quoted(config.pdp_type.as_str())?;
            buf.push_bytes(b",")?;
            buf.push_quoted(&config.apn)
        }
        (Type1scCmd::Cgauth, Request::DefinePdn { id, config }) => {
            let cid = pdn_cid(ctx, Some(*id))?;
            if config.auth == AuthType::None {
                return buf.push_fmt(format_args!("{},0", cid));
            }
            buf.push_fmt(format_args!("{},{},", cid, config.auth as u8))?;
            buf.push_quoted(&config.username)?;
            buf.push_bytes(b",")?;
            buf.push_quoted(&config.password)
        }
        (Type1scCmd::Cgact, Request::ActivatePdn(id)) => {
            buf.push_fmt(format_args!("1,{}", pdn_cid(ctx, *id)?))
        }
        (Type1scCmd::Cgact, Request::DeactivatePdn(id)) => {
            buf.push_fmt(format_args!("0,{}", pdn_cid(ctx, *id)?))
        }
        (Type1scCmd::Cgpaddr, Request::GetIpAddress(id)) => {
            buf.push_fmt(format_args!("{}", pdn_cid(ctx, *id)?))
        }
        (Type1scCmd::SocketAllocate, Request::DialSocket(params)) => {
            let protocol = match params.protocol {
                Protocol::Tcp => "TCP",
                Protocol::Udp => "UDP",
            };
            buf.push_fmt(format_args!(
                "\"ALLOCATE\",{},\"{}\",\"OPEN\",\"{}\",{}",
                pdn_cid(ctx, params.pdn)?,
                protocol,
                params.remote.ip(),
                params.remote.port(),
            ))?;
            if params.local_port != 0 {
                buf.push_fmt(format_args!(",{}", params.local_port))?;
            }
            Ok(())
        }
        (Type1scCmd::SocketActivate, Request::DialSocket(_)) => {
            let conn = ctx.sid.conn.ok_or(BuildError::MissingContext)?;
            buf.push_fmt(format_args!("\"ACTIVATE\",{}", conn))
        }
        (Type1scCmd::SocketDeactivate, Request::CloseSocket(handle)) => {
            buf.push_fmt(format_args!("\"DEACTIVATE\",{}", conn_of(ctx, *handle)?))
        }
        (Type1scCmd::SocketDelete, Request::CloseSocket(handle)) => {
            buf.push_fmt(format_args!("\"DELETE\",{}", conn_of(ctx, *handle)?))
        }
        (Type1scCmd::SocketDelete, Request::DialSocket(_)) => {
            let conn = ctx.sid.conn.ok_or(BuildError::MissingContext)?;
            buf.push_fmt(format_args!("\"DELETE\",{}", conn))
        }
        (Type1scCmd::Socketdata, Request::SendData { handle, data }) => {
            buf.push_fmt(format_args!(
                "\"SEND\",{},{},\"",
                conn_of(ctx, *handle)?,
                data.len()
            ))?;
            hex::encode_into(data, buf).map_err(|_| BuildError::Overflow)?;
            buf.push_bytes(b"\"")
        }
        (Type1scCmd::Socketdata, Request::ReceiveData { handle, max_len }) => {
            buf.push_fmt(format_args!(
                "\"RECEIVE\",{},{}",
                conn_of(ctx, *handle)?,
                (*max_len as usize).min(MAX_RECEIVE_CHUNK)
            ))
        }
        (Type1scCmd::Pingcmd, Request::Ping(params)) => {
            buf.push_bytes(b"0,")?;
            buf.push_quoted(params.host)?;
            buf.push_fmt(format_args!(",{},32,{}", params.count, params.timeout_s))
        }
        (Type1scCmd::Cpsms, Request::SetPowerConfig(config)) => {
            general::build_power_saving(config, buf)
        }
        (Type1scCmd::Direct, Request::DirectCommand { command, .. }) => {
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

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::pdn::{PdnConfig, PdpType};
    use crate::parser::Message;
    use crate::service::{DialParams, PingParams, ResetType};
    use no_std_net::{Ipv4Addr, SocketAddr, SocketAddrV4};

    fn build(ctx: &ModemContext, req: &Request<'_>, cmd: AtCommand<Type1scCmd>) -> std::string::String {
        let mut buf = CommandBuffer::new();
        buf.write_header(&cmd).unwrap();
        parameters(ctx, req, &cmd, &mut buf).unwrap();
        std::string::String::from_utf8(buf.as_bytes().to_vec()).unwrap()
    }

    fn tokens(command: &str) -> std::vec::Vec<std::string::String> {
        let (name, params) = command.strip_prefix("AT").unwrap().split_once('=').unwrap();
        let line = std::format!("{}: {}", name, params);
        Message::line(line.as_bytes())
            .elements()
            .map(|f| std::string::String::from_utf8(f.to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn socket_commands_tokenize_back() {
        let mut ctx = ModemContext::new();
        let dial = Request::DialSocket(DialParams {
            handle: SocketHandle(0),
            protocol: Protocol::Udp,
            remote: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 5684)),
            local_port: 0,
            pdn: None,
        });
        let allocate = build(&ctx, &dial, AtCommand::write(Type1scCmd::SocketAllocate));
        assert_eq!(
            tokens(&allocate),
            ["%SOCKETCMD", "ALLOCATE", "1", "UDP", "OPEN", "10.0.0.1", "5684"]
        );

        ctx.sid.conn = Some(2);
        assert_eq!(
            build(&ctx, &dial, AtCommand::write(Type1scCmd::SocketActivate)),
            "AT%SOCKETCMD=\"ACTIVATE\",2"
        );

        ctx.persistent
            .sockets
            .assign(SocketHandle(0), 2, Protocol::Udp)
            .unwrap();
        let send = Request::SendData {
            handle: SocketHandle(0),
            data: &[0xDE, 0xAD, 0x01],
        };
        let cmd = build(&ctx, &send, AtCommand::write(Type1scCmd::Socketdata));
        assert_eq!(cmd, "AT%SOCKETDATA=\"SEND\",2,3,\"DEAD01\"");
        assert_eq!(tokens(&cmd), ["%SOCKETDATA", "SEND", "2", "3", "DEAD01"]);

        let receive = Request::ReceiveData {
            handle: SocketHandle(0),
            max_len: 1500,
        };
        assert_eq!(
            tokens(&build(&ctx, &receive, AtCommand::write(Type1scCmd::Socketdata))),
            ["%SOCKETDATA", "RECEIVE", "2", "700"]
        );
    }

    #[test]
    fn pdn_definition_with_authentication() {
        let ctx = ModemContext::new();
        let mut config = PdnConfig::new("internet");
        config.pdp_type = PdpType::NonIp;
        config.auth = AuthType::Chap;
        let _ = config.username.push_str("u");
        let _ = config.password.push_str("p");
        let define = Request::DefinePdn {
            id: PdnId(0),
            config,
        };
        assert_eq!(
            tokens(&build(&ctx, &define, AtCommand::write(Type1scCmd::Cgdcont))),
            ["+CGDCONT", "1", "Non-IP", "internet"]
        );
        assert_eq!(
            build(&ctx, &define, AtCommand::write(Type1scCmd::Cgauth)),
            "AT+CGAUTH=1,2,\"u\",\"p\""
        );
        assert_eq!(
            build(&ctx, &Request::ActivatePdn(None), AtCommand::write(Type1scCmd::Cgact)),
            "AT+CGACT=1,1"
        );
        assert_eq!(
            build(&ctx, &Request::DeactivatePdn(None), AtCommand::write(Type1scCmd::Cgact)),
            "AT+CGACT=0,1"
        );
    }

    #[test]
    fn ping_and_reset() {
        let ctx = ModemContext::new();
        let ping = Request::Ping(PingParams {
            host: "example.com",
            count: 3,
            timeout_s: 5,
            pdn: None,
        });
        assert_eq!(
            tokens(&build(&ctx, &ping, AtCommand::write(Type1scCmd::Pingcmd))),
            ["%PINGCMD", "0", "example.com", "3", "32", "5"]
        );
        assert_eq!(
            build(&ctx, &Request::Reset(ResetType::Software), AtCommand::exec(Type1scCmd::Reset)),
            "AT^RESET"
        );
    }
}
