use crate::context::Persistent;
use crate::error::ErrorKind;
use crate::modules::common;
use crate::service::{Request, Response};

use super::Type1sc;

impl Type1sc {
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
            Request::SendData { data, .. } => {
                Response::Sent(ctx.sid.sent.unwrap_or(data.len() as u16))
            }
            Request::ReceiveData { handle, .. } => {
                let rx = common::take_received(ctx);
                if rx.is_empty() {
                    if let Some(entry) = ctx.persistent.sockets.get_mut(*handle) {
                        entry.flags.data_available = false;
                    }
                }
                Response::Received(rx)
            }
            Request::CloseSocket(handle) => {
                ctx.persistent.sockets.release(*handle);
                Response::Ok
            }
            Request::Ping(params) => {
                let mut summary = ctx.sid.ping.unwrap_or_default();
                summary.sent = params.count;
                if summary.received == 0 {
                    summary.min_ms = 0;
                }
                Response::Ping(summary)
            }
            Request::DirectCommand { .. } => Response::Direct(ctx.sid.direct.clone()),
            Request::CheckConnection
            | Request::PowerOn
            | Request::Reset(_)
            | Request::InitModem(_)
            | Request::DeregisterNet
            | Request::AttachPsDomain
            | Request::DetachPsDomain
            | Request::SetPowerConfig(_) => Response::Ok,
            Request::SuspendData | Request::ResumeData | Request::SleepRequest | Request::Wakeup => {
                return Err(ErrorKind::Unsupported)
            }
        };
        Ok(response)
    }
}
