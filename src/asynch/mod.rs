//! Async driver: a [`Runner`] task owning the modem, an [`Ingress`] task
//! feeding it received bytes and any number of [`Control`] handles.

pub mod control;
pub mod ingress;
mod pwr;
pub mod resources;
pub mod runner;
pub mod state;
pub mod transaction;
mod urc_handler;

use embedded_io_async::Write;

use crate::config::CellularConfig;
use crate::modem::Modem;

use self::control::Control;
use self::ingress::Ingress;
use self::resources::Resources;
use self::runner::Runner;
use self::transaction::Engine;

/// Opens the driver for `modem`, which talks through `writer`.
pub fn new<'a, M, W, C>(
    resources: &'a Resources,
    modem: M,
    writer: W,
    config: C,
) -> (Control<'a>, Runner<'a, M, W, C>, Ingress<'a>)
where
    M: Modem,
    W: Write,
    C: CellularConfig,
{
    let state = &resources.state;
    let engine = Engine::new(modem, writer, state);
    (
        Control::new(state),
        Runner::new(engine, state, config),
        Ingress::new(state, M::RAW_HEADERS),
    )
}

#[cfg(test)]
mod test {
    extern crate std;

    use super::*;
    use crate::config::Settings;
    use crate::context::SimState;
    use crate::error::{Error, ErrorKind, ErrorReport, ModemError};
    use crate::modules::bg96::Bg96;
    use crate::registration::Status;
    use crate::context::events::NetEvent;
    use crate::service::{Request, Response};
    use crate::test_helpers::{init_log, MockModem};
    use crate::urc::Urc;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use embassy_futures::select::{select, Either};
    use super::pwr::test::{Board, TestConfig};
    use std::rc::Rc;

    #[tokio::test]
    async fn request_round_trip() {
        init_log();
        let resources = Resources::new();
        let mock = MockModem::new(&resources.state).reply("AT+CSQ", &["+CSQ: 20,99", "OK"]);
        let board = Rc::new(Board::default());
        let (control, mut runner, _ingress) = new(
            &resources,
            Bg96::new(Settings::default()),
            mock.writer(),
            TestConfig::new(&board),
        );

        let response = match select(runner.run(), control.send_request(&Request::GetSignalQuality)).await
        {
            Either::First(_) => unreachable!(),
            Either::Second(response) => response,
        };
        assert!(matches!(response, Ok(Response::SignalQuality(q)) if q.rssi == 20));
    }

    #[tokio::test]
    async fn error_report_reaches_the_caller() {
        init_log();
        let resources = Resources::new();
        let mock = MockModem::new(&resources.state).reply("AT+CSQ", &["ERROR"]);
        let board = Rc::new(Board::default());
        let (control, mut runner, _ingress) = new(
            &resources,
            Bg96::new(Settings::default()),
            mock.writer(),
            TestConfig::new(&board),
        );

        let response = match select(runner.run(), control.send_request(&Request::GetSignalQuality)).await
        {
            Either::First(_) => unreachable!(),
            Either::Second(response) => response,
        };
        assert_eq!(
            response,
            Err(Error::Service(ErrorReport {
                kind: ErrorKind::Modem(ModemError::Generic),
                sim: SimState::Unknown,
            }))
        );
    }

    #[tokio::test]
    async fn second_caller_is_busy() {
        let resources = Resources::new();
        let (control, _runner, _ingress) = new(
            &resources,
            Bg96::new(Settings::default()),
            MockModem::new(&resources.state).writer(),
            TestConfig::new(&Rc::new(Board::default())),
        );

        let check = Request::CheckConnection;
        let first = control.send_request(&check);
        let second = async {
            embassy_futures::yield_now().await;
            control.send_request(&Request::GetSignalQuality).await
        };
        match select(first, second).await {
            Either::First(_) => panic!("nothing serves the first request"),
            Either::Second(result) => assert_eq!(result, Err(Error::Busy)),
        }
    }

    static REGISTRATIONS: AtomicUsize = AtomicUsize::new(0);

    fn on_urc(urc: &Urc) {
        if let Urc::NetworkRegistration(_) = urc {
            REGISTRATIONS.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn idle_urcs_reach_the_callback() {
        init_log();
        let resources = Resources::new();
        let mut bg96 = Bg96::new(Settings::default());
        bg96.context_mut()
            .persistent
            .events
            .subscribe(NetEvent::Registration);
        let (control, mut runner, mut ingress) = new(
            &resources,
            bg96,
            MockModem::new(&resources.state).writer(),
            TestConfig::new(&Rc::new(Board::default())),
        );
        control.register_urc_callback(on_urc);

        let registered = async {
            ingress.write(b"\r\n+CEREG: 1\r\n").await;
            control.wait_registration_change().await
        };
        match select(runner.run(), registered).await {
            Either::First(_) => unreachable!(),
            Either::Second(registered) => assert!(registered),
        }
        assert_eq!(control.snapshot().registration, Status::Home);
        assert_eq!(REGISTRATIONS.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn stale_completion_is_not_taken_for_the_answer() {
        init_log();
        let resources = Resources::new();
        let mock = MockModem::new(&resources.state).reply("AT+CSQ", &["+CSQ: 20,99", "OK"]);
        let (control, mut runner, _ingress) = new(
            &resources,
            Bg96::new(Settings::default()),
            mock.writer(),
            TestConfig::new(&Rc::new(Board::default())),
        );

        // left behind by a caller that stopped waiting
        resources.state.done.signal(());
        let response = match select(runner.run(), control.send_request(&Request::GetSignalQuality)).await
        {
            Either::First(_) => unreachable!(),
            Either::Second(response) => response,
        };
        assert!(matches!(response, Ok(Response::SignalQuality(q)) if q.rssi == 20));
    }
}
