//! Classifies each received message against the command in flight.

use crate::command::{AtCommand, CommandId};
use crate::error::{ErrorKind, ModemError};
use crate::modem::Modem;
use crate::parser::{Message, MessageKind};

/// What a received message means for the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Final success of the pending command.
    FinalOk,
    /// Final failure of the pending command.
    Error(ErrorKind),
    /// Part of the answer, the command is still pending.
    Intermediate,
    /// Completes the pending step without a final result code (prompt,
    /// awaited event).
    ForceContinue,
    /// An unsolicited report was stored for dispatch.
    UrcForwarded,
    /// A known unsolicited report nobody is interested in.
    UrcIgnored,
    Ignored,
}

/// How a message with a known prefix relates to the pending step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Origin {
    /// Answer to the command in flight.
    Solicited,
    /// The report the pending step is waiting for.
    Awaited,
    Unsolicited,
}

/// Runs the decision chain for one message.
///
/// Order matters: finals first, then the prompt, then replies whose prefix
/// is in the command table, and plain text last. While a direct command is
/// pending every other line is part of its reply, unless the dialect knows
/// it as an unsolicited report. A final result code is
/// only meaningful while a command is in flight.
pub fn analyze<M: Modem>(
    modem: &mut M,
    msg: &Message,
    pending: Option<&AtCommand<M::Cmd>>,
) -> Action {
    match msg.kind() {
        MessageKind::Raw => return modem.analyze_payload(msg, pending),
        MessageKind::Prompt => {
            return match pending {
                Some(cmd) if cmd.prompt => {
                    modem.context_mut().cmd.prompt = true;
                    Action::ForceContinue
                }
                _ => Action::Ignored,
            };
        }
        MessageKind::Line => {}
    }

    let line = msg.as_bytes();

    if let Some(cmd) = pending.filter(|c| !c.event) {
        if line == b"OK" || line == b"SEND OK" {
            return Action::FinalOk;
        }
        if let Some(err) = ModemError::parse(line) {
            if modem.tolerate_error(cmd.id, &err) {
                debug!("{:?} tolerated for AT{}", err, cmd.name());
                modem.context_mut().cmd.tolerated = true;
                return Action::FinalOk;
            }
            return Action::Error(ErrorKind::Modem(err));
        }
    }

    if line.starts_with(b"AT") {
        // echo
        return Action::Ignored;
    }

    if pending.is_some_and(|c| c.id == M::Cmd::DIRECT) {
        if let Some(action) = unprompted(modem, msg) {
            return action;
        }
        let direct = &mut modem.context_mut().sid.direct;
        let text = msg.text();
        let fits = (direct.is_empty() || direct.push('\n').is_ok()) && direct.push_str(text).is_ok();
        if !fits {
            warn!("Reply to direct command truncated");
        }
        return Action::Intermediate;
    }

    if let Some(prefix) = msg.prefix() {
        return match M::Cmd::lookup(prefix) {
            Some(id) => {
                let origin = match pending {
                    Some(cmd) if cmd.id == id && cmd.event => Origin::Awaited,
                    Some(cmd) if cmd.id == id => Origin::Solicited,
                    _ => Origin::Unsolicited,
                };
                modem.analyze(id, msg, origin)
            }
            None => {
                debug!("Unknown prefix in {:?}", msg);
                Action::UrcIgnored
            }
        };
    }

    match modem.analyze_text(msg, pending) {
        Some(action) => action,
        None => match pending {
            Some(cmd) if !cmd.event => {
                warn!("Unexpected {:?} while waiting for AT{}", msg, cmd.name());
                Action::Error(ErrorKind::Protocol)
            }
            _ => Action::Ignored,
        },
    }
}

/// Reports the modem sends on its own, recognised while the reply to a
/// direct command is being collected.
fn unprompted<M: Modem>(modem: &mut M, msg: &Message) -> Option<Action> {
    let Some(prefix) = msg.prefix() else {
        return modem.analyze_text(msg, None);
    };
    if modem.context().sid.direct_target.as_bytes() == prefix {
        return None;
    }
    match M::Cmd::lookup(prefix) {
        Some(id) if modem.unsolicited(id) => Some(modem.analyze(id, msg, Origin::Unsolicited)),
        _ => None,
    }
}
