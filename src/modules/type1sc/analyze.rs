use crate::analyzer::{Action, Origin};
use crate::command::general::{self, parse_ip};
use crate::command::AtCommand;
use crate::context::ModemContext;
use crate::hex;
use crate::modules::common::{self, store_text};
use crate::parser::Message;
use crate::registration::RegType;
use crate::service::{PingReply, PingSummary};
use crate::urc::Urc;

use super::Type1scCmd;

/// `<event>` values of `%SOCKETEV`.
const SOCKET_DATA: u8 = 1;
const SOCKET_DEACTIVATED: u8 = 2;
const SOCKET_TERMINATED: u8 = 3;

pub(super) fn reply(
    ctx: &mut ModemContext,
    id: Type1scCmd,
    msg: &Message,
    origin: Origin,
) -> Action {
    match id {
        Type1scCmd::Cereg => return common::registration(ctx, msg, RegType::Cereg, origin),
        Type1scCmd::Cpin => return common::sim(ctx, msg, origin),
        Type1scCmd::Cgev => return common::packet_domain(ctx, msg),
        Type1scCmd::Socketev => return socket_event(ctx, msg),
        Type1scCmd::Bootev => {
            return match origin {
                Origin::Awaited => Action::ForceContinue,
                _ => common::rebooted(ctx),
            };
        }
        _ => {}
    }

    if origin == Origin::Unsolicited {
        debug!("Dropping unsolicited {:?}", msg);
        return Action::UrcIgnored;
    }

    let mut fields = msg.elements();
    fields.next();
    match id {
        Type1scCmd::Csq => ctx.sid.signal = general::signal_quality(msg),
        Type1scCmd::Cgatt => ctx.sid.attached = general::attach_state(msg),
        Type1scCmd::Cops => {
            if let Some((mode, operator)) = general::operator(msg) {
                ctx.sid.cops_automatic = Some(mode == 0);
                ctx.sid.net.operator = operator;
            }
        }
        Type1scCmd::Cgpaddr => {
            if let Some((cid, ip)) = general::pdp_address(msg) {
                ctx.sid.ip = ip;
                if let Some(entry) = ctx.persistent.pdn.by_cid_mut(cid) {
                    entry.ip = ip.or(entry.ip);
                }
            }
        }
        Type1scCmd::Cgact => {
            if let Some((cid, active)) = general::context_state(msg) {
                ctx.persistent.pdn.set_active(cid, active, None);
                if let Some(id) = ctx.persistent.pdn.id_of(cid) {
                    ctx.sid.pdn_active[id.0 as usize] = Some(active);
                }
            }
        }
        Type1scCmd::Ccid => {
            if let Some(iccid) = fields.next_str() {
                store_text(&mut ctx.persistent.identity.iccid, iccid);
                store_text(&mut ctx.sid.text, iccid);
            }
        }
        Type1scCmd::SocketAllocate => ctx.sid.conn = fields.next_parsed(),
        Type1scCmd::Socketdata => socket_data(ctx, msg),
        Type1scCmd::Pingcmd => return ping_reply(ctx, msg),
        _ => {}
    }
    Action::Intermediate
}

pub(super) fn text(
    ctx: &mut ModemContext,
    msg: &Message,
    pending: Option<&AtCommand<Type1scCmd>>,
) -> Option<Action> {
    let cmd = pending.filter(|c| !c.event)?;
    match cmd.id {
        Type1scCmd::Cgmi | Type1scCmd::Cgmm | Type1scCmd::Cgmr | Type1scCmd::Cimi => {
            store_text(&mut ctx.sid.text, msg.text());
        }
        Type1scCmd::Cgsn => {
            store_text(&mut ctx.sid.text, msg.text());
            store_text(&mut ctx.persistent.identity.imei, msg.text());
        }
        _ => return None,
    }
    Some(Action::Intermediate)
}

/// `%SOCKETEV:<event>,<socket_id>`
fn socket_event(ctx: &mut ModemContext, msg: &Message) -> Action {
    let mut fields = msg.elements();
    fields.next();
    let (Some(event), Some(id)) = (fields.next_parsed::<u8>(), fields.next_parsed::<u8>()) else {
        return Action::UrcIgnored;
    };
    let Some(entry) = ctx.persistent.sockets.by_conn_mut(id) else {
        warn!("Event {} for unknown socket {}", event, id);
        return Action::UrcIgnored;
    };
    let handle = entry.handle;
    match event {
        SOCKET_DATA => {
            entry.flags.data_available = true;
            entry.flags.data_pending_urc = true;
            ctx.persistent.urcs.push(Urc::SocketDataPending(handle));
        }
        SOCKET_DEACTIVATED | SOCKET_TERMINATED => {
            entry.flags.connected = false;
            entry.flags.closed_by_remote_pending_urc = true;
            ctx.persistent.urcs.push(Urc::SocketClosed(handle));
        }
        _ => return Action::UrcIgnored,
    }
    Action::UrcForwarded
}

/// `%SOCKETDATA:<socket_id>,<length>[,<more_data>,"<hex>"]`, the short form
/// acknowledges a send.
fn socket_data(ctx: &mut ModemContext, msg: &Message) {
    let mut fields = msg.elements();
    fields.next();
    let id: Option<u8> = fields.next_parsed();
    let len: Option<u16> = fields.next_parsed();
    let more: Option<u8> = fields.next_parsed();

    let (Some(id), Some(more)) = (id, more) else {
        ctx.sid.sent = len;
        return;
    };
    ctx.sid.rx_announced = len.map(usize::from);
    if let Some(data) = fields.next() {
        if let Err(e) = hex::decode_into(data, &mut ctx.sid.rx) {
            warn!("Bad payload for socket {}: {:?}", id, e);
        }
    }
    if let Some(entry) = ctx.persistent.sockets.by_conn_mut(id) {
        entry.flags.data_available = more != 0;
    }
}

/// `%PINGCMD:<seq>,"<ip>",<rtt>,<ttl>`, one per echo reply. The summary is
/// built up from them since the modem reports none.
fn ping_reply(ctx: &mut ModemContext, msg: &Message) -> Action {
    let mut fields = msg.elements();
    fields.next();
    fields.next();
    let from = fields.next().and_then(parse_ip);
    let (Some(time_ms), ttl) = (fields.next_parsed::<u32>(), fields.next_parsed::<u8>()) else {
        return Action::Ignored;
    };

    let summary = ctx.sid.ping.get_or_insert(PingSummary {
        min_ms: u32::MAX,
        ..Default::default()
    });
    let n = u64::from(summary.received);
    summary.avg_ms = ((u64::from(summary.avg_ms) * n + u64::from(time_ms)) / (n + 1)) as u32;
    summary.received = summary.received.saturating_add(1);
    summary.min_ms = summary.min_ms.min(time_ms);
    summary.max_ms = summary.max_ms.max(time_ms);

    ctx.persistent.urcs.push(Urc::PingResponse(PingReply {
        from,
        time_ms,
        ttl: ttl.unwrap_or(0),
    }));
    Action::Intermediate
}
