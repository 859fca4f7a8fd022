//! State shared between [`Control`](super::control::Control), the
//! [`Runner`](super::runner::Runner) and the [`Ingress`](super::ingress::Ingress).
//!
//! The modem context itself is owned by the runner alone. What callers may
//! look at is copied into a [`Snapshot`] after every transaction and URC.

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Context, Poll};

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_sync::waitqueue::WakerRegistration;

use crate::context::{ModemContext, ModemMode, SimState};
use crate::datapack::PackBuffer;
use crate::parser::Message;
use crate::registration::Status;
use crate::urc::Urc;

/// Framed messages waiting for the runner.
pub const MESSAGE_QUEUE: usize = 4;

pub type UrcCallback = fn(&Urc);

/// What the caller can see of the modem without a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    pub sim: SimState,
    pub registration: Status,
    pub mode: ModemMode,
}

impl Snapshot {
    const fn new() -> Self {
        Self {
            sim: SimState::Unknown,
            registration: Status::None,
            mode: ModemMode::Command,
        }
    }
}

pub struct State {
    /// Held by the caller for a whole transaction.
    pub(crate) transaction: Mutex<NoopRawMutex, ()>,
    pub(crate) request: Mutex<NoopRawMutex, PackBuffer>,
    pub(crate) response: Mutex<NoopRawMutex, PackBuffer>,
    /// A request was packed.
    pub(crate) pending: Signal<NoopRawMutex, ()>,
    /// The response (or error) was packed.
    pub(crate) done: Signal<NoopRawMutex, ()>,
    pub(crate) messages: Channel<NoopRawMutex, Message, MESSAGE_QUEUE>,
    shared: BlockingMutex<NoopRawMutex, RefCell<Shared>>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    pub const fn new() -> Self {
        Self {
            transaction: Mutex::new(()),
            request: Mutex::new(PackBuffer::new()),
            response: Mutex::new(PackBuffer::new()),
            pending: Signal::new(),
            done: Signal::new(),
            messages: Channel::new(),
            shared: BlockingMutex::new(RefCell::new(Shared {
                snapshot: Snapshot::new(),
                urc_callback: None,
                payload_hint: None,
                registration_waker: WakerRegistration::new(),
            })),
        }
    }

    pub(crate) fn update(&self, ctx: &ModemContext) {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            let snapshot = Snapshot {
                sim: ctx.persistent.sim,
                registration: ctx.persistent.registration.status(),
                mode: ctx.persistent.mode,
            };
            if snapshot.registration != s.snapshot.registration {
                info!("Registration status changed: {:?}", snapshot.registration);
                s.registration_waker.wake();
            }
            s.snapshot = snapshot;
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.lock(|s| s.borrow().snapshot)
    }

    pub(crate) fn set_urc_callback(&self, callback: Option<UrcCallback>) {
        self.shared.lock(|s| s.borrow_mut().urc_callback = callback)
    }

    pub(crate) fn urc_callback(&self) -> Option<UrcCallback> {
        self.shared.lock(|s| s.borrow().urc_callback)
    }

    /// Size of the raw payload the next response is expected to carry.
    pub(crate) fn expect_payload(&self, len: Option<usize>) {
        self.shared.lock(|s| s.borrow_mut().payload_hint = len)
    }

    pub(crate) fn take_payload_hint(&self) -> Option<usize> {
        self.shared.lock(|s| s.borrow_mut().payload_hint.take())
    }

    fn is_registered(&self, cx: Option<&mut Context>) -> bool {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            if let Some(cx) = cx {
                s.registration_waker.register(cx.waker());
            }
            s.snapshot.registration.registered()
        })
    }

    /// Resolves once the modem went from registered to not registered or
    /// back, returning the new state.
    pub async fn wait_registration_change(&self) -> bool {
        let old_state = self.is_registered(None);

        poll_fn(|cx| {
            let current_state = self.is_registered(Some(cx));
            if current_state != old_state {
                return Poll::Ready(current_state);
            }
            Poll::Pending
        })
        .await
    }
}

struct Shared {
    snapshot: Snapshot,
    urc_callback: Option<UrcCallback>,
    payload_hint: Option<usize>,
    registration_waker: WakerRegistration,
}
