use core::convert::Infallible;
use embassy_time::Duration;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState};

pub struct NoPin;

impl ErrorType for NoPin {
    type Error = core::convert::Infallible;
}

impl InputPin for NoPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(false)
    }
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub struct ReverseOutputPin<P: OutputPin<Error = Infallible>>(pub P);

impl<P: OutputPin<Error = Infallible>> ErrorType for ReverseOutputPin<P> {
    type Error = Infallible;
}

impl<P: OutputPin<Error = Infallible>> OutputPin for ReverseOutputPin<P> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_high()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_low()
    }

    fn set_state(&mut self, state: PinState) -> Result<(), Self::Error> {
        match state {
            PinState::Low => self.0.set_state(PinState::High),
            PinState::High => self.0.set_state(PinState::Low),
        }
    }
}

pub struct ReverseInputPin<P: InputPin<Error = Infallible>>(pub P);

impl<P: InputPin<Error = Infallible>> ErrorType for ReverseInputPin<P> {
    type Error = Infallible;
}

impl<P: InputPin<Error = Infallible>> InputPin for ReverseInputPin<P> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }
}

/// Board wiring of the modem control pins.
pub trait CellularConfig {
    type ResetPin: OutputPin;
    type PowerPin: OutputPin;
    type VintPin: InputPin;

    fn reset_pin(&mut self) -> Option<&mut Self::ResetPin>;
    fn power_pin(&mut self) -> Option<&mut Self::PowerPin>;
    fn vint_pin(&mut self) -> Option<&mut Self::VintPin>;
}

/// Knobs of the service sequencers.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    /// Hardware flow control (`AT+IFC=2,2`) instead of none.
    pub flow_control: bool,
    /// Delay between two SIM status polls.
    pub sim_poll_interval: Duration,
    /// Polls after the first one before giving up on the SIM.
    pub sim_poll_retries: u8,
    /// `AT` attempts while synchronizing after boot.
    pub sync_retries: u8,
    /// How long to wait for the boot indication.
    pub boot_timeout: Duration,
    /// How long to wait for the asynchronous socket open result.
    pub socket_open_timeout: Duration,
    /// How long to wait for the modem to report power down.
    pub power_down_timeout: Duration,
    /// Silence around the `+++` escape sequence.
    pub escape_guard: Duration,
    /// Added to the expected ping duration.
    pub ping_margin: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    pub const fn new() -> Self {
        Self {
            flow_control: false,
            sim_poll_interval: Duration::from_secs(1),
            sim_poll_retries: 5,
            sync_retries: 10,
            boot_timeout: Duration::from_secs(10),
            socket_open_timeout: Duration::from_secs(150),
            power_down_timeout: Duration::from_secs(60),
            escape_guard: Duration::from_millis(1000),
            ping_margin: Duration::from_secs(5),
        }
    }

    pub fn with_flow_control(mut self, on: bool) -> Self {
        self.flow_control = on;
        self
    }

    pub fn with_sim_polling(mut self, interval: Duration, retries: u8) -> Self {
        self.sim_poll_interval = interval;
        self.sim_poll_retries = retries;
        self
    }

    pub fn with_boot_timeout(mut self, timeout: Duration) -> Self {
        self.boot_timeout = timeout;
        self
    }

    pub fn with_socket_open_timeout(mut self, timeout: Duration) -> Self {
        self.socket_open_timeout = timeout;
        self
    }

    pub fn with_power_down_timeout(mut self, timeout: Duration) -> Self {
        self.power_down_timeout = timeout;
        self
    }

    pub fn with_escape_guard(mut self, guard: Duration) -> Self {
        self.escape_guard = guard;
        self
    }
}
