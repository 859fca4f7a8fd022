use crate::urc::{LowPowerStatus, ModemEvent, PdnEvent, Urc, UrcSlots};

use super::state::State;

/// Drains `urcs` into the registered callback. URCs stored while no
/// callback is registered are logged and dropped.
pub(crate) fn dispatch(urcs: &mut UrcSlots, state: &State) {
    let callback = state.urc_callback();
    while let Some((urc, more)) = urcs.next_urc() {
        log_urc(&urc);
        if let Some(callback) = callback {
            callback(&urc);
        }
        if more {
            trace!("{} more URC kinds waiting", urcs.pending());
        }
    }
}

fn log_urc(urc: &Urc) {
    match urc {
        Urc::NetworkRegistration(reg) => {
            info!("{:?} registration: {:?}", reg.reg_type, reg.status)
        }
        Urc::LocationInfo(_) => debug!("Serving cell changed"),
        Urc::SignalQuality(_) => debug!("Signal quality report"),
        Urc::SocketDataPending(handle) => debug!("Data pending on {:?}", handle),
        Urc::SocketClosed(handle) => warn!("{:?} closed by remote", handle),
        Urc::PdnEvent(PdnEvent::Activated { cid }) => info!("PDN context {} activated", cid),
        Urc::PdnEvent(PdnEvent::Deactivated { cid }) => warn!("PDN context {} deactivated", cid),
        Urc::PdnEvent(PdnEvent::Detached) => warn!("Network detached"),
        Urc::PingResponse(_) => debug!("Ping reply"),
        Urc::SimEvent(state) => info!("SIM {:?}", state),
        Urc::LowPowerStatus(LowPowerStatus::EnteredPsm) => info!("Modem entered PSM"),
        Urc::LowPowerStatus(LowPowerStatus::Awake) => info!("Modem awake"),
        Urc::ModemEvent(ModemEvent::Ready) => info!("Modem ready"),
        Urc::ModemEvent(ModemEvent::PoweredDown) => warn!("Modem powered down"),
    }
}
