//! Commands and replies defined by 3GPP TS 27.007 and shared by every
//! dialect.
//!
//! All parsers take the whole message, including the command name, and
//! return `None` when a mandatory field is missing or malformed.

use heapless::String;
use no_std_net::IpAddr;

use super::{BuildError, CommandBuffer};
use crate::context::SimState;
use crate::parser::{parse_field, Message};
use crate::registration::{CellularGlobalIdentity, RegType, RegistrationParams, Status};
use crate::service::{OperatorSelection, PowerConfig, SignalQuality};
use crate::urc::PdnEvent;

/// `+CSQ: <rssi>,<ber>`
pub fn signal_quality(msg: &Message) -> Option<SignalQuality> {
    let mut fields = msg.elements().skip(1);
    Some(SignalQuality {
        rssi: parse_field(fields.next()?)?,
        ber: fields.next().and_then(parse_field).unwrap_or(99),
    })
}

/// `+CREG`, `+CGREG` and `+CEREG` reports.
///
/// The answer to a read command starts with `<n>`, the unsolicited report
/// does not: `+CEREG: [<n>,]<stat>[,<tac>,<ci>[,<AcT>]]`.
pub fn registration(msg: &Message, reg_type: RegType, solicited: bool) -> Option<RegistrationParams> {
    let mut fields = msg.elements().skip(1);
    if solicited {
        fields.next()?;
    }
    let status = Status::from(parse_field::<u8>(fields.next()?)?);

    let lac = fields.next().and_then(parse_hex);
    let cell_id = fields.next().and_then(parse_hex);
    let act = fields.next().and_then(parse_field);
    let cgi = match (lac, cell_id) {
        (Some(lac), Some(cell_id)) => Some(CellularGlobalIdentity { lac, cell_id, act }),
        _ => None,
    };

    Some(RegistrationParams {
        reg_type,
        status,
        cgi,
    })
}

/// `+CPIN: <code>`
pub fn sim_state(msg: &Message) -> Option<SimState> {
    let code = msg.elements().nth(1)?;
    Some(match code {
        b"READY" => SimState::Ready,
        b"NOT READY" => SimState::NotReady,
        b"NOT INSERTED" => SimState::NotInserted,
        c if c.starts_with(b"SIM PUK") || c.starts_with(b"PH-SIM PUK") => SimState::PukRequired,
        c if c.starts_with(b"SIM PIN") || c.starts_with(b"PH-") => SimState::PinRequired,
        _ => SimState::NotReady,
    })
}

/// `+CGATT: <state>`
pub fn attach_state(msg: &Message) -> Option<bool> {
    let state: u8 = parse_field(msg.elements().nth(1)?)?;
    Some(state == 1)
}

/// `+COPS: <mode>[,<format>,<oper>[,<AcT>]]`
pub fn operator(msg: &Message) -> Option<(u8, Option<String<32>>)> {
    let mut fields = msg.elements().skip(1);
    let mode = parse_field(fields.next()?)?;
    let oper = fields
        .nth(1)
        .and_then(|f| core::str::from_utf8(f).ok())
        .filter(|s| !s.is_empty())
        .and_then(|s| String::try_from(s).ok());
    Some((mode, oper))
}

/// `+CGEV: <event text>`
pub fn packet_domain_event(msg: &Message) -> Option<PdnEvent> {
    let text = core::str::from_utf8(msg.elements().nth(1)?).ok()?;
    let cid = text
        .split_ascii_whitespace()
        .last()
        .and_then(|w| w.parse().ok());

    if text.contains("DETACH") {
        Some(PdnEvent::Detached)
    } else if text.contains("DEACT") {
        Some(PdnEvent::Deactivated { cid: cid? })
    } else if text.contains("ACT") {
        Some(PdnEvent::Activated { cid: cid? })
    } else {
        None
    }
}

/// `+CGPADDR: <cid>[,<addr>]`
pub fn pdp_address(msg: &Message) -> Option<(u8, Option<IpAddr>)> {
    let mut fields = msg.elements().skip(1);
    let cid = parse_field(fields.next()?)?;
    Some((cid, fields.next().and_then(parse_ip)))
}

/// `+CGACT: <cid>,<state>`
pub fn context_state(msg: &Message) -> Option<(u8, bool)> {
    let mut fields = msg.elements().skip(1);
    let cid = parse_field(fields.next()?)?;
    let state: u8 = parse_field(fields.next()?)?;
    Some((cid, state == 1))
}

/// An address field, `0.0.0.0` and empty strings count as none.
pub fn parse_ip(field: &[u8]) -> Option<IpAddr> {
    let ip: IpAddr = parse_field(field)?;
    (!ip.is_unspecified()).then_some(ip)
}

/// `AT+COPS=` parameters. `None` deregisters.
pub fn build_operator_selection(
    selection: Option<&OperatorSelection>,
    buf: &mut CommandBuffer,
) -> Result<(), BuildError> {
    match selection {
        Some(OperatorSelection::Automatic) => buf.push_bytes(b"0"),
        Some(OperatorSelection::Manual(plmn)) => {
            buf.push_bytes(b"1,2,")?;
            buf.push_quoted(plmn)
        }
        None => buf.push_bytes(b"2"),
    }
}

/// `AT+CPSMS=` parameters, timers as 8 bit strings.
pub fn build_power_saving(config: &PowerConfig, buf: &mut CommandBuffer) -> Result<(), BuildError> {
    if !config.psm {
        return buf.push_bytes(b"0");
    }
    match (config.periodic_tau, config.active_time) {
        (Some(tau), Some(active)) => {
            buf.push_fmt(format_args!("1,,,\"{:08b}\",\"{:08b}\"", tau, active))
        }
        _ => buf.push_bytes(b"1"),
    }
}

fn parse_hex(field: &[u8]) -> Option<u32> {
    let s = core::str::from_utf8(field).ok()?;
    u32::from_str_radix(s.trim(), 16).ok()
}

#[cfg(test)]
mod test {
    use super::*;
    use no_std_net::Ipv4Addr;

    #[test]
    fn csq() {
        let q = signal_quality(&Message::line(b"+CSQ: 21,99")).unwrap();
        assert_eq!(q, SignalQuality { rssi: 21, ber: 99 });
        assert!(signal_quality(&Message::line(b"+CSQ: ")).is_none());
    }

    #[test]
    fn registration_read_and_urc() {
        let read = registration(
            &Message::line(b"+CEREG: 2,5,\"1A2B\",\"01C3D4E5\",7"),
            RegType::Cereg,
            true,
        )
        .unwrap();
        assert_eq!(read.status, Status::Roaming);
        assert_eq!(
            read.cgi,
            Some(CellularGlobalIdentity {
                lac: 0x1A2B,
                cell_id: 0x01C3_D4E5,
                act: Some(7)
            })
        );

        let urc = registration(&Message::line(b"+CEREG: 1"), RegType::Cereg, false).unwrap();
        assert_eq!(urc.status, Status::Home);
        assert!(urc.cgi.is_none());

        // the same text read as a solicited answer has no status
        assert!(registration(&Message::line(b"+CEREG: 1"), RegType::Cereg, true).is_none());
    }

    #[test]
    fn cpin_codes() {
        let cases: [(&[u8], SimState); 5] = [
            (b"+CPIN: READY", SimState::Ready),
            (b"+CPIN: SIM PIN", SimState::PinRequired),
            (b"+CPIN: SIM PUK", SimState::PukRequired),
            (b"+CPIN: NOT INSERTED", SimState::NotInserted),
            (b"+CPIN: NOT READY", SimState::NotReady),
        ];
        for (line, state) in cases {
            assert_eq!(sim_state(&Message::line(line)), Some(state));
        }
    }

    #[test]
    fn cops_with_and_without_operator() {
        assert_eq!(operator(&Message::line(b"+COPS: 0")), Some((0, None)));
        let (mode, oper) = operator(&Message::line(b"+COPS: 0,0,\"TDC\",7")).unwrap();
        assert_eq!(mode, 0);
        assert_eq!(oper.as_deref(), Some("TDC"));
    }

    #[test]
    fn cgev_events() {
        assert_eq!(
            packet_domain_event(&Message::line(b"+CGEV: NW PDN DEACT 1")),
            Some(PdnEvent::Deactivated { cid: 1 })
        );
        assert_eq!(
            packet_domain_event(&Message::line(b"+CGEV: ME PDN ACT 2")),
            Some(PdnEvent::Activated { cid: 2 })
        );
        assert_eq!(
            packet_domain_event(&Message::line(b"+CGEV: NW DETACH")),
            Some(PdnEvent::Detached)
        );
        assert_eq!(packet_domain_event(&Message::line(b"+CGEV: REJECT")), None);
    }

    #[test]
    fn addresses() {
        assert_eq!(
            pdp_address(&Message::line(b"+CGPADDR: 1,\"10.20.30.40\"")),
            Some((1, Some(IpAddr::V4(Ipv4Addr::new(10, 20, 30, 40)))))
        );
        assert_eq!(
            pdp_address(&Message::line(b"+CGPADDR: 1,\"0.0.0.0\"")),
            Some((1, None))
        );
        assert_eq!(pdp_address(&Message::line(b"+CGPADDR: 3")), Some((3, None)));
        assert_eq!(
            context_state(&Message::line(b"+CGACT: 1,1")),
            Some((1, true))
        );
    }
}
