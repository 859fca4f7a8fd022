use crate::analyzer::{Action, Origin};
use crate::command::general::{self, parse_ip};
use crate::command::AtCommand;
use crate::context::{LowPowerState, ModemContext, ModemMode};
use crate::modules::common::{self, store_text};
use crate::parser::Message;
use crate::registration::RegType;
use crate::service::{PingReply, PingSummary};
use crate::urc::{LowPowerStatus, ModemEvent, PdnEvent, Urc};

use super::Bg96Cmd;

/// Replies carrying a `+`-prefixed name from the command table.
pub(super) fn reply(ctx: &mut ModemContext, id: Bg96Cmd, msg: &Message, origin: Origin) -> Action {
    match id {
        Bg96Cmd::Creg => return common::registration(ctx, msg, RegType::Creg, origin),
        Bg96Cmd::Cgreg => return common::registration(ctx, msg, RegType::Cgreg, origin),
        Bg96Cmd::Cereg => return common::registration(ctx, msg, RegType::Cereg, origin),
        Bg96Cmd::Cpin => return common::sim(ctx, msg, origin),
        Bg96Cmd::Cgev => return common::packet_domain(ctx, msg),
        Bg96Cmd::Qiurc => return socket_event(ctx, msg),
        Bg96Cmd::Qind => return indication(ctx, msg),
        Bg96Cmd::Qiopen => return open_result(ctx, msg, origin),
        Bg96Cmd::Qping => return ping(ctx, msg, origin),
        _ => {}
    }

    if origin == Origin::Unsolicited {
        debug!("Dropping unsolicited {:?}", msg);
        return Action::UrcIgnored;
    }

    match id {
        Bg96Cmd::Csq => ctx.sid.signal = general::signal_quality(msg),
        Bg96Cmd::Cgatt => ctx.sid.attached = general::attach_state(msg),
        Bg96Cmd::Cops => {
            if let Some((mode, operator)) = general::operator(msg) {
                ctx.sid.cops_automatic = Some(mode == 0);
                ctx.sid.net.operator = operator;
            }
        }
        Bg96Cmd::Cgpaddr => {
            if let Some((cid, ip)) = general::pdp_address(msg) {
                ctx.sid.ip = ip;
                if let Some(entry) = ctx.persistent.pdn.by_cid_mut(cid) {
                    entry.ip = ip.or(entry.ip);
                }
            }
        }
        Bg96Cmd::Qiact => {
            // +QIACT: <contextID>,<context_state>,<context_type>[,<IP_address>]
            let mut fields = msg.elements();
            fields.next();
            let cid: Option<u8> = fields.next_parsed();
            let state: Option<u8> = fields.next_parsed();
            fields.next();
            let ip = fields.next().and_then(parse_ip);
            if let (Some(cid), Some(state)) = (cid, state) {
                let active = state == 1;
                ctx.persistent.pdn.set_active(cid, active, ip);
                if let Some(id) = ctx.persistent.pdn.id_of(cid) {
                    ctx.sid.pdn_active[id.0 as usize] = Some(active);
                }
            }
        }
        Bg96Cmd::Qird => {
            let mut fields = msg.elements();
            fields.next();
            ctx.sid.rx_announced = fields.next_parsed();
        }
        Bg96Cmd::Qccid => {
            if let Some(iccid) = msg.elements().nth(1).and_then(|f| core::str::from_utf8(f).ok()) {
                store_text(&mut ctx.persistent.identity.iccid, iccid);
                store_text(&mut ctx.sid.text, iccid);
            }
        }
        _ => {}
    }
    Action::Intermediate
}

/// Lines without a known prefix.
pub(super) fn text(
    ctx: &mut ModemContext,
    msg: &Message,
    pending: Option<&AtCommand<Bg96Cmd>>,
) -> Option<Action> {
    let awaited = |id: Bg96Cmd| pending.is_some_and(|c| c.event && c.id == id);
    let line = msg.as_bytes();

    match line {
        b"RDY" => {
            if awaited(Bg96Cmd::Rdy) {
                return Some(Action::ForceContinue);
            }
            return Some(common::rebooted(ctx));
        }
        b"POWERED DOWN" => {
            if awaited(Bg96Cmd::PoweredDown) {
                return Some(Action::ForceContinue);
            }
            ctx.persistent
                .urcs
                .push(Urc::ModemEvent(ModemEvent::PoweredDown));
            return Some(Action::UrcForwarded);
        }
        b"PSM POWER DOWN" => {
            info!("Entering PSM");
            ctx.persistent.low_power = LowPowerState::Sleeping;
            ctx.persistent
                .urcs
                .push(Urc::LowPowerStatus(LowPowerStatus::EnteredPsm));
            return Some(Action::UrcForwarded);
        }
        b"APP RDY" => return Some(Action::Ignored),
        _ => {}
    }

    let cmd = pending.filter(|c| !c.event)?;
    match cmd.id {
        Bg96Cmd::Ato if line.starts_with(b"CONNECT") => {
            ctx.persistent.mode = ModemMode::Data;
            Some(Action::ForceContinue)
        }
        Bg96Cmd::Cgmi | Bg96Cmd::Cgmm | Bg96Cmd::Cgmr | Bg96Cmd::Cimi => {
            store_text(&mut ctx.sid.text, msg.text());
            Some(Action::Intermediate)
        }
        Bg96Cmd::Cgsn => {
            store_text(&mut ctx.sid.text, msg.text());
            store_text(&mut ctx.persistent.identity.imei, msg.text());
            Some(Action::Intermediate)
        }
        _ => None,
    }
}

/// Socket payload following a `+QIRD` header.
pub(super) fn payload(
    ctx: &mut ModemContext,
    msg: &Message,
    pending: Option<&AtCommand<Bg96Cmd>>,
) -> Action {
    if !pending.is_some_and(|c| c.id == Bg96Cmd::Qird) {
        warn!("Payload without a pending read, dropped");
        return Action::Ignored;
    }
    let rx = &mut ctx.sid.rx;
    let room = rx.capacity() - rx.len();
    let data = msg.as_bytes();
    if data.len() > room {
        warn!("Received {} bytes, only {} fit", data.len(), room);
    }
    // cannot fail, limited to the free room
    let _ = rx.extend_from_slice(&data[..data.len().min(room)]);
    Action::Intermediate
}

/// `+QIURC: "<event>",<id>[,...]`
fn socket_event(ctx: &mut ModemContext, msg: &Message) -> Action {
    let mut fields = msg.elements();
    fields.next();
    let event = fields.next();
    let Some(id) = fields.next_parsed::<u8>() else {
        return Action::UrcIgnored;
    };

    match event {
        Some(b"recv") => {
            let Some(entry) = ctx.persistent.sockets.by_conn_mut(id) else {
                warn!("Data for unknown connection {}", id);
                return Action::UrcIgnored;
            };
            entry.flags.data_available = true;
            entry.flags.data_pending_urc = true;
            let handle = entry.handle;
            ctx.persistent.urcs.push(Urc::SocketDataPending(handle));
        }
        Some(b"closed") => {
            let Some(entry) = ctx.persistent.sockets.by_conn_mut(id) else {
                return Action::UrcIgnored;
            };
            entry.flags.connected = false;
            entry.flags.closed_by_remote_pending_urc = true;
            let handle = entry.handle;
            ctx.persistent.urcs.push(Urc::SocketClosed(handle));
        }
        Some(b"pdpdeact") => {
            ctx.persistent.pdn.set_active(id, false, None);
            ctx.persistent
                .urcs
                .push(Urc::PdnEvent(PdnEvent::Deactivated { cid: id }));
        }
        _ => return Action::UrcIgnored,
    }
    Action::UrcForwarded
}

/// `+QIND: "csq",<rssi>,<ber>`, other indications are dropped.
fn indication(ctx: &mut ModemContext, msg: &Message) -> Action {
    let mut fields = msg.elements();
    fields.next();
    if fields.next() != Some(b"csq".as_slice()) {
        return Action::UrcIgnored;
    }
    let (Some(rssi), ber) = (fields.next_parsed(), fields.next_parsed()) else {
        return Action::UrcIgnored;
    };
    ctx.persistent
        .urcs
        .push(Urc::SignalQuality(crate::service::SignalQuality {
            rssi,
            ber: ber.unwrap_or(99),
        }));
    Action::UrcForwarded
}

/// `+QIOPEN: <connectID>,<err>`
fn open_result(ctx: &mut ModemContext, msg: &Message, origin: Origin) -> Action {
    let mut fields = msg.elements();
    fields.next();
    let (Some(conn), Some(err)) = (fields.next_parsed::<u8>(), fields.next_parsed::<u16>()) else {
        return Action::Ignored;
    };
    if origin == Origin::Unsolicited || ctx.sid.conn != Some(conn) {
        warn!("Late open result {} for connection {}", err, conn);
        return Action::UrcIgnored;
    }
    ctx.sid.socket_result = Some(err);
    match origin {
        Origin::Awaited => Action::ForceContinue,
        _ => Action::Intermediate,
    }
}

/// `+QPING` echo replies and the final statistics.
///
/// ```text
/// +QPING: <result>[,<IP_address>,<bytes>,<time>,<ttl>]
/// +QPING: <finresult>[,<sent>,<rcvd>,<lost>,<min>,<max>,<avg>]
/// ```
fn ping(ctx: &mut ModemContext, msg: &Message, origin: Origin) -> Action {
    let mut fields = msg.elements();
    fields.next();
    let Some(result) = fields.next_parsed::<u16>() else {
        return Action::Ignored;
    };
    let second = fields.next();

    if let Some(addr) = second.filter(|f| f.contains(&b'.') || f.contains(&b':')) {
        fields.next();
        let reply = PingReply {
            from: parse_ip(addr),
            time_ms: fields.next_parsed().unwrap_or(0),
            ttl: fields.next_parsed().unwrap_or(0),
        };
        ctx.persistent.urcs.push(Urc::PingResponse(reply));
        return Action::UrcForwarded;
    }

    if origin == Origin::Unsolicited {
        return Action::UrcIgnored;
    }

    let sent = second.and_then(crate::parser::parse_field).unwrap_or(0);
    let received = fields.next_parsed().unwrap_or(0);
    fields.next();
    ctx.sid.ping = Some(PingSummary {
        result,
        sent,
        received,
        min_ms: fields.next_parsed().unwrap_or(0),
        max_ms: fields.next_parsed().unwrap_or(0),
        avg_ms: fields.next_parsed().unwrap_or(0),
    });
    match origin {
        Origin::Awaited => Action::ForceContinue,
        _ => Action::Intermediate,
    }
}
