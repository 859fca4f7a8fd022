use embassy_time::{Duration, Timer};
use embedded_hal::digital::{InputPin as _, OutputPin as _};

use crate::{config::CellularConfig, error::Error, modules::ModuleParams};

const GENERIC_PWR_ON_TIMES: [u16; 2] = [300, 2000];

pub(crate) struct PwrCtrl<'b, P, C> {
    params: P,
    config: &'b mut C,
}

impl<'b, P, C> PwrCtrl<'b, P, C>
where
    P: ModuleParams,
    C: CellularConfig,
{
    pub(crate) fn new(params: P, config: &'b mut C) -> Self {
        Self { params, config }
    }

    pub(crate) fn has_power(&mut self) -> Result<bool, Error> {
        if let Some(pin) = self.config.vint_pin() {
            pin.is_high().map_err(|_| Error::IoPin)
        } else {
            info!("No VInt pin configured");
            Ok(true)
        }
    }

    /// Reset the module by driving its `RESET_N` pin low for
    /// `reset_hold()`, then wait `boot_wait()`.
    pub(crate) async fn reset(&mut self) -> Result<(), Error> {
        warn!("Hard resetting cellular module");
        if let Some(pin) = self.config.reset_pin() {
            pin.set_low().map_err(|_| Error::IoPin)?;
            Timer::after(self.params.reset_hold()).await;
            pin.set_high().map_err(|_| Error::IoPin)?;
            Timer::after(self.params.boot_wait()).await;
        } else {
            warn!("No reset pin configured");
        }
        Ok(())
    }

    /// Pulses `PWR_ON` until VInt reports power. Modules without a known pull
    /// time get each of the generic pull times in turn.
    pub(crate) async fn power_up(&mut self) -> Result<(), Error> {
        if self.has_power()? {
            return Ok(());
        }
        debug!("Attempting to power up device");

        let known = self.params.power_on_pull_time();
        let attempts = if known.is_some() {
            1
        } else {
            GENERIC_PWR_ON_TIMES.len()
        };
        for generic_time in GENERIC_PWR_ON_TIMES.into_iter().take(attempts) {
            let pull_time = known.unwrap_or(Duration::from_millis(generic_time as _));
            let Some(pin) = self.config.power_pin() else {
                warn!("No power pin configured");
                return Ok(());
            };
            pin.set_low().map_err(|_| Error::IoPin)?;
            Timer::after(pull_time).await;
            pin.set_high().map_err(|_| Error::IoPin)?;

            Timer::after(self.params.boot_wait()).await;

            if self.has_power()? {
                debug!("Powered up");
                return Ok(());
            }
        }
        Err(Error::PoweredDown)
    }

    pub(crate) async fn power_down(&mut self) -> Result<(), Error> {
        if !self.has_power()? {
            return Ok(());
        }
        if let Some(pin) = self.config.power_pin() {
            pin.set_low().map_err(|_| Error::IoPin)?;
            Timer::after(self.params.power_off_pull_time()).await;
            pin.set_high().map_err(|_| Error::IoPin)?;
            debug!("Powered down");
        } else {
            warn!("No power pin configured");
        }
        Ok(())
    }
}
