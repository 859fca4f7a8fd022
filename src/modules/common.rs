//! Reply handling shared by the dialects for the 3GPP commands they have in
//! common.

use crate::analyzer::{Action, Origin};
use crate::command::general;
use crate::context::events::NetEvent;
use crate::context::{LowPowerState, ModemContext, ModemMode, SimState};
use crate::error::{CmeError, ModemError};
use crate::parser::Message;
use crate::registration::RegType;
use crate::urc::{ModemEvent, PdnEvent, RegistrationEvent, Urc};
use crate::service::MAX_RECEIVE;
use heapless::{String, Vec};

/// `+CREG` / `+CGREG` / `+CEREG`, read answer or notification.
pub(crate) fn registration(
    ctx: &mut ModemContext,
    msg: &Message,
    reg_type: RegType,
    origin: Origin,
) -> Action {
    let solicited = origin != Origin::Unsolicited;
    let Some(params) = general::registration(msg, reg_type, solicited) else {
        warn!("Malformed registration report {:?}", msg);
        return if solicited {
            Action::Intermediate
        } else {
            Action::UrcIgnored
        };
    };

    let previous_cgi = ctx.persistent.registration.cgi();
    let changed = ctx.persistent.registration.compare_and_set(params);
    if solicited {
        ctx.sid.net.status = ctx.persistent.registration.status();
        ctx.sid.net.cgi = ctx.persistent.registration.cgi();
        return Action::Intermediate;
    }

    let events = ctx.persistent.events;
    let mut forwarded = false;
    if changed && events.contains(NetEvent::Registration) {
        ctx.persistent
            .urcs
            .push(Urc::NetworkRegistration(RegistrationEvent {
                reg_type,
                status: params.status,
            }));
        forwarded = true;
    }
    if let Some(cgi) = params.cgi {
        if previous_cgi != Some(cgi) && events.contains(NetEvent::Location) {
            ctx.persistent.urcs.push(Urc::LocationInfo(cgi));
            forwarded = true;
        }
    }

    if forwarded {
        Action::UrcForwarded
    } else {
        Action::UrcIgnored
    }
}

/// `+CPIN`, read answer or notification.
pub(crate) fn sim(ctx: &mut ModemContext, msg: &Message, origin: Origin) -> Action {
    let Some(state) = general::sim_state(msg) else {
        return Action::Ignored;
    };
    let previous = core::mem::replace(&mut ctx.persistent.sim, state);
    match origin {
        Origin::Unsolicited if previous != state => {
            info!("SIM {:?}", state);
            ctx.persistent.urcs.push(Urc::SimEvent(state));
            Action::UrcForwarded
        }
        Origin::Unsolicited => Action::UrcIgnored,
        _ => Action::Intermediate,
    }
}

/// `+CGEV` packet domain events.
pub(crate) fn packet_domain(ctx: &mut ModemContext, msg: &Message) -> Action {
    let Some(event) = general::packet_domain_event(msg) else {
        return Action::UrcIgnored;
    };
    match event {
        PdnEvent::Detached => ctx.persistent.pdn.deactivate_all(),
        PdnEvent::Deactivated { cid } => ctx.persistent.pdn.set_active(cid, false, None),
        PdnEvent::Activated { cid } => ctx.persistent.pdn.set_active(cid, true, None),
    }
    ctx.persistent.urcs.push(Urc::PdnEvent(event));
    Action::UrcForwarded
}

/// SIM problems reported as `+CME ERROR` to `AT+CPIN?`. Returns `true` if
/// `err` was one and got recorded.
pub(crate) fn sim_error(ctx: &mut ModemContext, err: &ModemError) -> bool {
    let ModemError::Cme(cme) = err else {
        return false;
    };
    let sim = match cme {
        CmeError::SimBusy => SimState::Busy,
        CmeError::SimNotInserted => SimState::NotInserted,
        CmeError::SimFailure | CmeError::SimWrong => SimState::Failure,
        _ => return false,
    };
    ctx.persistent.sim = sim;
    true
}

/// The modem restarted on its own: nothing it reported before holds anymore.
pub(crate) fn rebooted(ctx: &mut ModemContext) -> Action {
    warn!("Modem restarted");
    let persistent = &mut ctx.persistent;
    persistent.sim = SimState::Unknown;
    persistent.registration.reset();
    persistent.sockets.clear();
    persistent.pdn.deactivate_all();
    persistent.low_power = LowPowerState::Awake;
    persistent.mode = ModemMode::Command;
    persistent.urcs.push(Urc::ModemEvent(ModemEvent::Ready));
    Action::UrcForwarded
}

/// Takes the received payload. The length announced in the receive header
/// wins over what was actually collected.
pub(crate) fn take_received(ctx: &mut ModemContext) -> Vec<u8, MAX_RECEIVE> {
    let mut rx = core::mem::take(&mut ctx.sid.rx);
    match ctx.sid.rx_announced.take() {
        Some(announced) if announced < rx.len() => {
            warn!("{} bytes announced, dropping {} extra", announced, rx.len() - announced);
            rx.truncate(announced);
        }
        Some(announced) if announced > rx.len() => {
            warn!("{} bytes announced, only {} arrived", announced, rx.len());
        }
        _ => {}
    }
    rx
}

/// Records which command a direct command text runs, e.g. `+CPIN` for
/// `AT+CPIN?`.
pub(crate) fn direct_target(ctx: &mut ModemContext, command: &str) {
    let name = match command.get(..2) {
        Some(at) if at.eq_ignore_ascii_case("AT") => &command[2..],
        _ => "",
    };
    let end = name.find(['=', '?', ';', '\r']).unwrap_or(name.len());
    store_text(&mut ctx.sid.direct_target, &name[..end]);
}

/// Replaces `dst` with as much of `src` as fits.
pub(crate) fn store_text<const N: usize>(dst: &mut String<N>, src: &str) {
    dst.clear();
    let mut end = src.len().min(N);
    while !src.is_char_boundary(end) {
        end -= 1;
    }
    // cannot fail, `end` is within capacity
    let _ = dst.push_str(&src[..end]);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registration::Status;

    #[test]
    fn registration_urcs_follow_subscriptions() {
        let mut ctx = ModemContext::new();
        let msg = Message::line(b"+CEREG: 5");
        assert_eq!(
            registration(&mut ctx, &msg, RegType::Cereg, Origin::Unsolicited),
            Action::UrcIgnored
        );
        assert!(ctx.persistent.registration.is_registered());

        ctx.persistent.events.subscribe(NetEvent::Registration);
        let msg = Message::line(b"+CEREG: 2");
        assert_eq!(
            registration(&mut ctx, &msg, RegType::Cereg, Origin::Unsolicited),
            Action::UrcForwarded
        );
        assert_eq!(
            ctx.persistent.urcs.next_urc(),
            Some((
                Urc::NetworkRegistration(RegistrationEvent {
                    reg_type: RegType::Cereg,
                    status: Status::Searching
                }),
                false
            ))
        );
    }

    #[test]
    fn solicited_reads_update_state_without_urcs() {
        let mut ctx = ModemContext::new();
        ctx.persistent.events.subscribe(NetEvent::Registration);
        let msg = Message::line(b"+CGREG: 0,1");
        assert_eq!(
            registration(&mut ctx, &msg, RegType::Cgreg, Origin::Solicited),
            Action::Intermediate
        );
        assert_eq!(ctx.sid.net.status, Status::Home);
        assert_eq!(ctx.persistent.urcs.pending(), 0);
    }

    #[test]
    fn text_is_truncated_to_capacity() {
        let mut s: String<4> = String::new();
        store_text(&mut s, "BG96MAR02");
        assert_eq!(s.as_str(), "BG96");
        store_text(&mut s, "ok");
        assert_eq!(s.as_str(), "ok");
    }

    #[test]
    fn reboot_forgets_sockets() {
        use crate::context::socket::{Protocol, SocketHandle};
        let mut ctx = ModemContext::new();
        ctx.persistent.sim = SimState::Ready;
        ctx.persistent
            .sockets
            .reserve(SocketHandle(0), Protocol::Udp, 4)
            .unwrap();
        assert_eq!(rebooted(&mut ctx), Action::UrcForwarded);
        assert_eq!(ctx.persistent.sim, SimState::Unknown);
        assert!(ctx.persistent.sockets.get(SocketHandle(0)).is_none());
    }

    #[test]
    fn announced_length_bounds_the_payload() {
        let mut ctx = ModemContext::new();
        ctx.sid.rx.extend_from_slice(b"hello world").unwrap();
        ctx.sid.rx_announced = Some(5);
        assert_eq!(take_received(&mut ctx).as_slice(), b"hello");
        assert!(ctx.sid.rx.is_empty());
        assert_eq!(ctx.sid.rx_announced, None);

        // a short payload is passed on as it is
        ctx.sid.rx.extend_from_slice(b"abc").unwrap();
        ctx.sid.rx_announced = Some(8);
        assert_eq!(take_received(&mut ctx).as_slice(), b"abc");
    }

    #[test]
    fn direct_target_names_the_command() {
        let mut ctx = ModemContext::new();
        for (text, name) in [
            ("AT+CPIN?", "+CPIN"),
            ("at%SOCKETCMD=\"INFO\",1", "%SOCKETCMD"),
            ("AT+CEREG=?", "+CEREG"),
            ("ATI", "I"),
            ("+CSQ", ""),
        ] {
            direct_target(&mut ctx, text);
            assert_eq!(ctx.sid.direct_target.as_str(), name);
        }
    }
}
