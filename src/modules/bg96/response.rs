use crate::context::{LowPowerState, ModemMode, Persistent};
use crate::error::ErrorKind;
use crate::modules::common;
use crate::service::{Request, Response, MAX_RECEIVE};

use super::Bg96;

impl Bg96 {
    /// Result of a service whose steps all completed, and the persistent
    /// effects that only hold once it succeeded.
    pub(super) fn collect(&mut self, req: &Request<'_>) -> Result<Response, ErrorKind> {
        let ctx = &mut self.ctx;
        let response = match req {
            Request::PowerOff => {
                ctx.persistent = Persistent::default();
                Response::Ok
            }
            Request::GetDeviceInfo(_) => Response::DeviceInfo(ctx.sid.text.clone()),
            Request::GetSignalQuality => {
                Response::SignalQuality(ctx.sid.signal.ok_or(ErrorKind::Protocol)?)
            }
            Request::GetAttachStatus => {
                Response::AttachStatus(ctx.sid.attached.ok_or(ErrorKind::Protocol)?)
            }
            Request::RegisterNet(_) | Request::GetNetStatus => {
                Response::NetStatus(ctx.sid.net.clone())
            }
            Request::SubscribeNetEvent(event) => {
                ctx.persistent.events.subscribe(*event);
                Response::Ok
            }
            Request::UnsubscribeNetEvent(event) => {
                ctx.persistent.events.unsubscribe(*event);
                Response::Ok
            }
            Request::DefinePdn { id, config } => {
                ctx.persistent.pdn.define(*id, config.clone());
                Response::Ok
            }
            Request::SetDefaultPdn(id) => {
                ctx.persistent.pdn.set_default(*id);
                Response::Ok
            }
            Request::ActivatePdn(id) => {
                let pdn = &mut ctx.persistent.pdn;
                let id = pdn.resolve(*id).ok_or(ErrorKind::InvalidParameter)?;
                if ctx.sid.pdn_active[id.0 as usize] != Some(true) {
                    warn!("PDN {} not active after activation", id.0);
                    if let Some(cid) = pdn.cid(id) {
                        pdn.set_active(cid, false, None);
                    }
                    return Err(ErrorKind::NotActive);
                }
                Response::Ok
            }
            Request::DeactivatePdn(id) => {
                let pdn = &mut ctx.persistent.pdn;
                if let Some(cid) = pdn.resolve(*id).and_then(|id| pdn.cid(id)) {
                    pdn.set_active(cid, false, None);
                }
                Response::Ok
            }
            Request::GetIpAddress(_) => Response::IpAddress(ctx.sid.ip.ok_or(ErrorKind::NotActive)?),
            Request::DialSocket(params) => Response::SocketOpened {
                handle: params.handle,
                conn: ctx.sid.conn.ok_or(ErrorKind::Protocol)?,
            },
            Request::SendData { data, .. } => Response::Sent(data.len() as u16),
            Request::ReceiveData { handle, max_len } => {
                let rx = common::take_received(ctx);
                let requested = (*max_len as usize).min(MAX_RECEIVE);
                if let Some(entry) = ctx.persistent.sockets.get_mut(*handle) {
                    // a full read may leave more behind
                    entry.flags.data_available = !rx.is_empty() && rx.len() >= requested;
                }
                Response::Received(rx)
            }
            Request::CloseSocket(handle) => {
                ctx.persistent.sockets.release(*handle);
                Response::Ok
            }
            Request::Ping(_) => Response::Ping(ctx.sid.ping.ok_or(ErrorKind::Protocol)?),
            Request::DirectCommand { .. } => Response::Direct(ctx.sid.direct.clone()),
            Request::SuspendData => {
                ctx.persistent.mode = ModemMode::Command;
                Response::Ok
            }
            Request::ResumeData => {
                if ctx.persistent.mode != ModemMode::Data {
                    warn!("No CONNECT after ATO");
                    return Err(ErrorKind::DataMode);
                }
                Response::Ok
            }
            Request::SleepRequest => {
                ctx.persistent.low_power = LowPowerState::Sleeping;
                Response::Ok
            }
            Request::CheckConnection
            | Request::PowerOn
            | Request::Reset(_)
            | Request::InitModem(_)
            | Request::DeregisterNet
            | Request::AttachPsDomain
            | Request::DetachPsDomain
            | Request::SetPowerConfig(_)
            | Request::Wakeup => Response::Ok,
        };
        Ok(response)
    }
}
