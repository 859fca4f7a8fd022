//! Step bookkeeping shared by the per-service sequencers.
//!
//! A sequencer is a function of `(request, step index, context)` returning
//! the next [`Step`]. Steps below the dialect's preamble length belong to
//! the preamble run before every service (waking the modem), the rest to
//! the service body. Body steps are numbered from zero and named by a
//! per-service `#[repr(u8)]` enum, see [`body_step`].

use embassy_time::Duration;
use num_enum::TryFromPrimitive;

use crate::command::AtCommand;
use crate::error::ErrorKind;
use crate::service::Sid;

/// Preamble length of dialects that wake the modem before each service.
pub const WAKE_PREAMBLE_STEPS: u8 = if cfg!(feature = "low-power") { 2 } else { 0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step<C> {
    /// Send a command and wait for its answer.
    Send(AtCommand<C>),
    /// Wait for an unsolicited report, built with [`AtCommand::event`].
    Wait(AtCommand<C>),
    /// Pause without talking to the modem.
    Tempo { duration: Duration, last: bool },
    /// Nothing to do for this index.
    Skip,
    /// The service completed.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    Preamble(u8),
    Body(u8),
}

/// Progress of one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transaction {
    step: u8,
    jump: Option<u8>,
    retries: u8,
    answered: bool,
    preamble: u8,
}

impl Transaction {
    pub fn new(preamble: u8) -> Self {
        Self {
            step: 0,
            jump: None,
            retries: 0,
            answered: false,
            preamble,
        }
    }

    /// Absolute step index, preamble included.
    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn phase(&self) -> Phase {
        if self.step < self.preamble {
            Phase::Preamble(self.step)
        } else {
            Phase::Body(self.step - self.preamble)
        }
    }

    /// Moves to the next step, or to the one requested by [`Transaction::jump_to_body`].
    pub fn advance(&mut self) {
        self.step = match self.jump.take() {
            Some(step) => step,
            None => self.step.saturating_add(1),
        };
    }

    /// Continue with body step `step` after the current one.
    pub fn jump_to_body(&mut self, step: impl Into<u8>) {
        self.jump = Some(self.preamble.saturating_add(step.into()));
    }

    /// Whether the previous command or wait got its answer. `false` after an
    /// optional answer timed out. Skipped steps leave it unchanged.
    pub fn answered(&self) -> bool {
        self.answered
    }

    pub fn set_answered(&mut self, answered: bool) {
        self.answered = answered;
    }

    pub fn retries(&self) -> u8 {
        self.retries
    }

    /// Counts one more retry and returns the new count.
    pub fn retry(&mut self) -> u8 {
        self.retries = self.retries.saturating_add(1);
        self.retries
    }
}

pub fn invalid_step(sid: Sid, step: u8) -> ErrorKind {
    ErrorKind::InvalidStep { sid, step }
}

/// Names body step `step` of `sid`. Indices past the last variant are
/// sequencer bugs and fail the service.
pub fn body_step<S: TryFromPrimitive<Primitive = u8>>(sid: Sid, step: u8) -> Result<S, ErrorKind> {
    S::try_from_primitive(step).map_err(|_| {
        error!("{:?} has no step {}", sid, step);
        invalid_step(sid, step)
    })
}
