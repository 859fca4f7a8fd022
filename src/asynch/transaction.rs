//! Drives one service against the modem: asks the dialect for steps, writes
//! the commands and feeds every received message through the analyzer until
//! the step is answered.

use embassy_time::{with_deadline, Instant};
use embedded_io_async::{Error as _, Write};

use crate::analyzer::{self, Action};
use crate::command::{Answer, AtCommand, BuildError, CommandBuffer, CommandId, CommandKind};
use crate::context::ModemMode;
use crate::error::{Error, ErrorKind, ErrorReport};
use crate::fmt::Bytes;
use crate::modem::Modem;
use crate::parser::Message;
use crate::sequencer::{Step, Transaction};
use crate::service::{Request, Response};

use super::state::State;
use super::urc_handler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransactionState {
    Idle,
    Sending,
    WaitingAnswer,
    Analyzing,
    DoneOk,
    DoneError,
}

enum Failure {
    Transport,
    Service(ErrorKind),
}

impl From<ErrorKind> for Failure {
    fn from(kind: ErrorKind) -> Self {
        Self::Service(kind)
    }
}

impl From<BuildError> for Failure {
    fn from(e: BuildError) -> Self {
        Self::Service(e.into())
    }
}

/// Owns the modem dialect and the TX half of the serial link.
pub struct Engine<'a, M: Modem, W: Write> {
    modem: M,
    writer: W,
    state: &'a State,
    buf: CommandBuffer,
    tx_state: TransactionState,
}

impl<'a, M: Modem, W: Write> Engine<'a, M, W> {
    pub(crate) fn new(modem: M, writer: W, state: &'a State) -> Self {
        Self {
            modem,
            writer,
            state,
            buf: CommandBuffer::new(),
            tx_state: TransactionState::Idle,
        }
    }

    pub fn modem(&self) -> &M {
        &self.modem
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.tx_state
    }

    /// Runs `req` to completion. Never retries on its own: a failed service
    /// is undone through [`Modem::abort`] and reported.
    pub async fn execute(&mut self, req: &Request<'_>) -> Result<Response, Error> {
        let sid = req.sid();
        debug!("Starting {:?}", sid);

        let ctx = self.modem.context_mut();
        if sid.resets_modem() {
            ctx.reset_persistent();
        } else {
            ctx.reset_sid();
        }

        let mut tx = Transaction::new(M::PREAMBLE_STEPS);
        let result = match self.run(req, &mut tx).await {
            Ok(response) => {
                self.set_state(TransactionState::DoneOk);
                Ok(response)
            }
            Err(failure) => {
                self.set_state(TransactionState::DoneError);
                if let Failure::Service(_) = failure {
                    self.roll_back(req).await;
                }
                self.modem.abort(req);
                match failure {
                    Failure::Transport => Err(Error::Transport),
                    Failure::Service(kind) => {
                        error!("{:?} failed at step {}: {:?}", sid, tx.step(), kind);
                        Err(Error::Service(ErrorReport {
                            kind,
                            sim: self.modem.context().persistent.sim,
                        }))
                    }
                }
            }
        };

        self.state.expect_payload(None);
        self.flush_urcs();
        self.set_state(TransactionState::Idle);
        result
    }

    /// A message that arrived while no transaction was running.
    pub fn handle_unsolicited(&mut self, msg: &Message) {
        match analyzer::analyze(&mut self.modem, msg, None) {
            Action::UrcForwarded | Action::UrcIgnored | Action::Ignored => {}
            action => debug!("Unexpected {:?} while idle", action),
        }
        self.flush_urcs();
    }

    async fn run(&mut self, req: &Request<'_>, tx: &mut Transaction) -> Result<Response, Failure> {
        loop {
            self.modem.context_mut().reset_command();
            let step = self.modem.next_step(req, tx)?;
            trace!("{:?} step {}", req.sid(), tx.step());

            let last = match step {
                Step::Send(cmd) => {
                    self.send(req, &cmd).await?;
                    let answered = self.wait_answer(&cmd).await?;
                    tx.set_answered(answered);
                    cmd.last
                }
                Step::Wait(cmd) => {
                    let answered = self.wait_answer(&cmd).await?;
                    tx.set_answered(answered);
                    cmd.last
                }
                Step::Tempo { duration, last } => {
                    self.idle_until(Instant::now() + duration).await;
                    last
                }
                Step::Skip => false,
                Step::Done => true,
            };

            if last {
                return Ok(self.modem.response(req)?);
            }
            tx.advance();
        }
    }

    async fn send(&mut self, req: &Request<'_>, cmd: &AtCommand<M::Cmd>) -> Result<(), Failure> {
        let data_mode = self.modem.context().persistent.mode == ModemMode::Data;
        if data_mode && (cmd.kind != CommandKind::Raw || cmd.id == M::Cmd::DIRECT) {
            warn!("AT{} refused in data mode", cmd.name());
            return Err(ErrorKind::DataMode.into());
        }

        self.set_state(TransactionState::Sending);
        self.buf.clear();
        self.buf.write_header(cmd)?;
        self.modem.build(req, cmd, &mut self.buf)?;
        if cmd.kind != CommandKind::Raw {
            self.buf.push_bytes(b"\r")?;
        }
        if cmd.raw_size.is_some() {
            self.state.expect_payload(cmd.raw_size);
        }

        debug!("TX {:?}", Bytes(self.buf.as_bytes()));
        let written = match self.writer.write_all(self.buf.as_bytes()).await {
            Ok(()) => self.writer.flush().await,
            Err(e) => Err(e),
        };
        written.map_err(|e| {
            error!("Serial write failed: {:?}", e.kind());
            Failure::Transport
        })
    }

    /// Processes messages until `cmd` is answered. `Ok(false)` when an
    /// optional answer did not arrive in time.
    async fn wait_answer(&mut self, cmd: &AtCommand<M::Cmd>) -> Result<bool, Failure> {
        self.set_state(TransactionState::WaitingAnswer);
        let deadline = Instant::now() + cmd.timeout;
        loop {
            let Ok(msg) = with_deadline(deadline, self.state.messages.receive()).await else {
                return match cmd.answer {
                    Answer::Mandatory => {
                        warn!("No answer to AT{} in {} ms", cmd.name(), cmd.timeout.as_millis());
                        Err(ErrorKind::Timeout.into())
                    }
                    Answer::Optional => {
                        debug!("No answer to AT{}, moving on", cmd.name());
                        Ok(false)
                    }
                };
            };

            self.set_state(TransactionState::Analyzing);
            let action = analyzer::analyze(&mut self.modem, &msg, Some(cmd));
            self.flush_urcs();
            match action {
                Action::FinalOk | Action::ForceContinue => return Ok(true),
                Action::Error(kind) => return Err(kind.into()),
                Action::Intermediate
                | Action::UrcForwarded
                | Action::UrcIgnored
                | Action::Ignored => {}
            }
            self.set_state(TransactionState::WaitingAnswer);
        }
    }

    /// Sends the dialect's cleanup command for a failed `req`. Its outcome
    /// does not change the reported failure.
    async fn roll_back(&mut self, req: &Request<'_>) {
        let Some(cmd) = self.modem.rollback(req) else {
            return;
        };
        self.modem.context_mut().reset_command();
        let undone = match self.send(req, &cmd).await {
            Ok(()) => self.wait_answer(&cmd).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if undone.is_err() {
            warn!("Rolling back {:?} failed", req.sid());
        }
    }

    /// Handles unsolicited messages until `deadline`.
    async fn idle_until(&mut self, deadline: Instant) {
        while let Ok(msg) = with_deadline(deadline, self.state.messages.receive()).await {
            self.handle_unsolicited(&msg);
        }
    }

    fn flush_urcs(&mut self) {
        let ctx = self.modem.context_mut();
        urc_handler::dispatch(&mut ctx.persistent.urcs, self.state);
        self.state.update(ctx);
    }

    fn set_state(&mut self, state: TransactionState) {
        if self.tx_state != state {
            trace!("{:?} -> {:?}", self.tx_state, state);
            self.tx_state = state;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Settings;
    use crate::context::pdn::PdnId;
    use crate::context::socket::{Protocol, SocketHandle};
    use crate::context::SimState;
    use crate::error::SocketError;
    use crate::modules::bg96::Bg96;
    use crate::modules::type1sc::Type1sc;
    use crate::service::{DialParams, Functionality};
    use crate::test_helpers::{init_log, MockModem};
    use embassy_time::Duration;
    use no_std_net::{Ipv4Addr, SocketAddr, SocketAddrV4};

    fn settings() -> Settings {
        Settings::default()
            .with_sim_polling(Duration::from_millis(10), 5)
            .with_socket_open_timeout(Duration::from_millis(50))
    }

    fn bg96() -> Bg96 {
        Bg96::new(settings())
    }

    fn dial(handle: u8) -> Request<'static> {
        Request::DialSocket(DialParams {
            handle: SocketHandle(handle),
            protocol: Protocol::Tcp,
            remote: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(93, 184, 216, 34), 80)),
            local_port: 0,
            pdn: None,
        })
    }

    /// Init script whose SIM stays `NOT READY` for every poll.
    fn sim_stuck_not_ready(state: &State) -> MockModem<'_> {
        let mock = MockModem::new(state)
            .reply("AT+CFUN=1", &["OK"])
            .reply("AT+CMEE=1", &["OK"]);
        for _ in 0..=settings().sim_poll_retries {
            mock.add_reply("AT+CPIN?", &["+CPIN: NOT READY", "OK"]);
        }
        mock
    }

    #[tokio::test]
    async fn sim_becomes_ready_after_polling() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state)
            .reply("AT+CFUN=1", &["OK"])
            .reply("AT+CMEE=1", &["OK"])
            .reply("AT+CPIN?", &["+CME ERROR: 14"])
            .reply("AT+CPIN?", &["+CPIN: NOT READY", "OK"])
            .reply("AT+CPIN?", &["+CPIN: READY", "OK"])
            .reply("AT+QCCID", &["+QCCID: 89882390000012345678", "OK"]);
        let mut engine = Engine::new(bg96(), mock.writer(), &state);

        let response = engine.execute(&Request::InitModem(Functionality::Full)).await;
        assert_eq!(response, Ok(Response::Ok));
        assert_eq!(mock.written_count("AT+CPIN?"), 3);
        assert_eq!(engine.modem().context().persistent.sim, SimState::Ready);
        assert_eq!(state.snapshot().sim, SimState::Ready);
        assert_eq!(
            engine.modem().context().persistent.identity.iccid.as_str(),
            "89882390000012345678"
        );
        assert_eq!(engine.transaction_state(), TransactionState::Idle);
    }

    #[tokio::test]
    async fn sim_that_never_gets_ready() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state)
            .reply("AT+CFUN=1", &["OK"])
            .reply("AT+CMEE=1", &["OK"])
            .reply("AT+CPIN?", &["+CPIN: SIM PIN", "OK"]);
        let mut engine = Engine::new(bg96(), mock.writer(), &state);

        let result = engine.execute(&Request::InitModem(Functionality::Full)).await;
        assert_eq!(
            result,
            Err(Error::Service(ErrorReport {
                kind: ErrorKind::Sim(SimState::PinRequired),
                sim: SimState::PinRequired,
            }))
        );
        assert_eq!(mock.written_count("AT+QCCID"), 0);
    }

    #[tokio::test]
    async fn sim_polling_gives_up_on_bg96() {
        init_log();
        let state = State::new();
        let mock = sim_stuck_not_ready(&state);
        let mut engine = Engine::new(bg96(), mock.writer(), &state);

        let result = engine.execute(&Request::InitModem(Functionality::Full)).await;
        assert_eq!(
            result,
            Err(Error::Service(ErrorReport {
                kind: ErrorKind::Sim(SimState::NotReady),
                sim: SimState::NotReady,
            }))
        );
        let polls = usize::from(settings().sim_poll_retries) + 1;
        assert_eq!(mock.written_count("AT+CPIN?"), polls);
        assert_eq!(mock.written_count("AT+QCCID"), 0);
    }

    #[tokio::test]
    async fn sim_polling_gives_up_on_type1sc() {
        init_log();
        let state = State::new();
        let mock = sim_stuck_not_ready(&state);
        let mut engine = Engine::new(Type1sc::new(settings()), mock.writer(), &state);

        let result = engine.execute(&Request::InitModem(Functionality::Full)).await;
        assert_eq!(
            result,
            Err(Error::Service(ErrorReport {
                kind: ErrorKind::Sim(SimState::NotReady),
                sim: SimState::NotReady,
            }))
        );
        let polls = usize::from(settings().sim_poll_retries) + 1;
        assert_eq!(mock.written_count("AT+CPIN?"), polls);
        assert_eq!(mock.written_count("AT%CCID"), 0);
    }

    #[tokio::test]
    async fn activation_skipped_when_already_active() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state)
            .reply("AT+QIACT?", &["+QIACT: 1,1,1,\"10.1.2.3\"", "OK"])
            .reply("AT+QIACT?", &["+QIACT: 1,1,1,\"10.1.2.3\"", "OK"]);
        let mut engine = Engine::new(bg96(), mock.writer(), &state);

        assert_eq!(engine.execute(&Request::ActivatePdn(None)).await, Ok(Response::Ok));
        assert_eq!(mock.written_count("AT+QIACT=1"), 0);
        assert!(engine.modem().context().persistent.pdn.get(PdnId(0)).unwrap().active);
    }

    #[tokio::test]
    async fn activation_runs_when_inactive() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state)
            .reply("AT+QIACT?", &["OK"])
            .reply("AT+QIACT=1", &["OK"])
            .reply("AT+QIACT?", &["+QIACT: 1,1,1,\"10.1.2.3\"", "OK"]);
        let mut engine = Engine::new(bg96(), mock.writer(), &state);

        assert_eq!(engine.execute(&Request::ActivatePdn(None)).await, Ok(Response::Ok));
        assert_eq!(mock.written_count("AT+QIACT=1"), 1);
    }

    #[tokio::test]
    async fn activation_that_does_not_stick() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state)
            .reply("AT+QIACT?", &["OK"])
            .reply("AT+QIACT=1", &["OK"])
            .reply("AT+QIACT?", &["OK"]);
        let mut engine = Engine::new(bg96(), mock.writer(), &state);

        let result = engine.execute(&Request::ActivatePdn(None)).await;
        assert!(matches!(
            result,
            Err(Error::Service(ErrorReport { kind: ErrorKind::NotActive, .. }))
        ));
    }

    #[tokio::test]
    async fn open_timeout_releases_the_connection() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state)
            .reply_prefix("AT+QIOPEN=", &["OK"])
            .reply("AT+QICLOSE=0", &["OK"]);
        let mut engine = Engine::new(bg96(), mock.writer(), &state);

        let dial = dial(7);
        let result = engine.execute(&dial).await;
        assert!(matches!(
            result,
            Err(Error::Service(ErrorReport { kind: ErrorKind::Timeout, .. }))
        ));
        assert_eq!(mock.written_count("AT+QICLOSE=0"), 1);
        assert!(engine.modem().context().persistent.sockets.get(SocketHandle(7)).is_none());

        // the connection id is free again
        mock.add_reply_prefix("AT+QIOPEN=", &["OK", "+QIOPEN: 0,0"]);
        let result = engine.execute(&dial).await;
        assert_eq!(
            result,
            Ok(Response::SocketOpened {
                handle: SocketHandle(7),
                conn: 0
            })
        );
    }

    #[tokio::test]
    async fn open_rejected_by_the_modem() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state).reply_prefix("AT+QIOPEN=", &["OK", "+QIOPEN: 0,566"]);
        let mut engine = Engine::new(bg96(), mock.writer(), &state);

        let result = engine
            .execute(&Request::DialSocket(DialParams {
                handle: SocketHandle(1),
                protocol: Protocol::Udp,
                remote: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(1, 1, 1, 1), 53)),
                local_port: 0,
                pdn: None,
            }))
            .await;
        assert!(matches!(
            result,
            Err(Error::Service(ErrorReport {
                kind: ErrorKind::Socket(SocketError::OpenFailed(566)),
                ..
            }))
        ));
        assert!(engine.modem().context().persistent.sockets.get(SocketHandle(1)).is_none());
    }

    #[tokio::test]
    async fn set_default_pdn_is_idempotent() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state);
        let mut engine = Engine::new(bg96(), mock.writer(), &state);

        for _ in 0..2 {
            assert_eq!(engine.execute(&Request::SetDefaultPdn(PdnId(1))).await, Ok(Response::Ok));
            assert_eq!(engine.modem().context().persistent.pdn.default_pdn(), PdnId(1));
        }
        assert_eq!(mock.written_total(), 0);
    }

    #[tokio::test]
    async fn mandatory_answer_times_out() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state);
        let mut engine = Engine::new(bg96(), mock.writer(), &state);

        let result = engine.execute(&Request::CheckConnection).await;
        assert!(matches!(
            result,
            Err(Error::Service(ErrorReport { kind: ErrorKind::Timeout, .. }))
        ));
        assert_eq!(mock.written_count("AT"), 1);
    }

    #[tokio::test]
    async fn write_failure_is_a_transport_error() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state).fail_writes();
        let mut engine = Engine::new(bg96(), mock.writer(), &state);

        assert_eq!(
            engine.execute(&Request::GetSignalQuality).await,
            Err(Error::Transport)
        );
    }

    #[tokio::test]
    async fn urcs_during_a_transaction_are_dispatched() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state).reply(
            "AT+CSQ",
            &["+CEREG: 5", "+CSQ: 17,99", "OK"],
        );
        let mut engine = Engine::new(bg96(), mock.writer(), &state);

        let response = engine.execute(&Request::GetSignalQuality).await;
        assert!(matches!(response, Ok(Response::SignalQuality(q)) if q.rssi == 17));
        assert_eq!(state.snapshot().registration, crate::registration::Status::Roaming);
    }

    #[tokio::test]
    async fn commands_are_refused_in_data_mode() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state);
        let mut bg96 = bg96();
        bg96.context_mut().persistent.mode = ModemMode::Data;
        let mut engine = Engine::new(bg96, mock.writer(), &state);

        let result = engine.execute(&Request::GetSignalQuality).await;
        assert!(matches!(
            result,
            Err(Error::Service(ErrorReport { kind: ErrorKind::DataMode, .. }))
        ));
        assert_eq!(mock.written_total(), 0);
    }

    #[tokio::test]
    async fn rejected_activation_deletes_the_allocated_socket() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state)
            .reply_prefix("AT%SOCKETCMD=\"ALLOCATE\"", &["%SOCKETCMD:1", "OK"])
            .reply("AT%SOCKETCMD=\"ACTIVATE\",1", &["ERROR"])
            .reply("AT%SOCKETCMD=\"DELETE\",1", &["OK"]);
        let mut engine = Engine::new(Type1sc::new(settings()), mock.writer(), &state);

        let result = engine.execute(&dial(3)).await;
        assert!(matches!(
            result,
            Err(Error::Service(ErrorReport {
                kind: ErrorKind::Socket(SocketError::OpenFailed(_)),
                ..
            }))
        ));
        assert_eq!(mock.written_count("AT%SOCKETCMD=\"DELETE\",1"), 1);
        assert!(engine.modem().context().persistent.sockets.get(SocketHandle(3)).is_none());
    }

    #[tokio::test]
    async fn failed_dial_rolls_back_the_allocated_socket() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state)
            .reply_prefix("AT%SOCKETCMD=\"ALLOCATE\"", &["%SOCKETCMD:1", "OK"])
            .reply("AT%SOCKETCMD=\"ACTIVATE\",1", &["garbage"])
            .reply("AT%SOCKETCMD=\"DELETE\",1", &["OK"]);
        let mut engine = Engine::new(Type1sc::new(settings()), mock.writer(), &state);

        let result = engine.execute(&dial(3)).await;
        assert!(matches!(
            result,
            Err(Error::Service(ErrorReport { kind: ErrorKind::Protocol, .. }))
        ));
        assert_eq!(
            mock.written().last().map(|w| w.as_str()),
            Some("AT%SOCKETCMD=\"DELETE\",1")
        );
        assert!(engine.modem().context().persistent.sockets.get(SocketHandle(3)).is_none());
        assert_eq!(engine.transaction_state(), TransactionState::Idle);
    }

    #[tokio::test]
    async fn urcs_during_a_direct_command_are_not_part_of_the_reply() {
        init_log();
        let state = State::new();
        let mock = MockModem::new(&state).reply(
            "AT+QGMR",
            &["+CEREG: 5", "BG96MAR02A07M1G_01.016.01.016", "OK"],
        );
        let mut engine = Engine::new(bg96(), mock.writer(), &state);

        let response = engine
            .execute(&Request::DirectCommand {
                command: "AT+QGMR",
                timeout_ms: 300,
            })
            .await;
        assert!(matches!(
            response,
            Ok(Response::Direct(ref text)) if text.as_str() == "BG96MAR02A07M1G_01.016.01.016"
        ));
        assert_eq!(state.snapshot().registration, crate::registration::Status::Roaming);
    }
}
