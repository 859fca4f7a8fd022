//! Supported modem dialects.

#[cfg(any(feature = "any-module", feature = "bg96"))]
pub mod bg96;
pub(crate) mod common;
#[cfg(any(feature = "any-module", feature = "type1sc"))]
pub mod type1sc;

use embassy_time::Duration;

/// Pin timing of a module.
pub trait ModuleParams: Copy {
    /// The time for which PWR_ON must be pulled down to effect power-on
    fn power_on_pull_time(&self) -> Option<Duration> {
        None
    }

    /// The time for which PWR_ON must be pulled down to effect power-off
    fn power_off_pull_time(&self) -> Duration {
        Duration::from_millis(3100)
    }

    /// How long to wait before the module is ready after boot
    fn boot_wait(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// How long to wait for a organised power-down in the absence of VInt
    fn power_down_wait(&self) -> Duration {
        Duration::from_secs(35)
    }

    /// How long the reset line has to be held for to reset the cellular module
    fn reset_hold(&self) -> Duration {
        Duration::from_millis(16500)
    }
}

/// Parameters for modules without specific values.
#[derive(Debug, Clone, Copy)]
pub struct Generic;

impl ModuleParams for Generic {}
