use embedded_io_async::{Error as _, Read};

use crate::parser::{Framer, Message};

use super::state::State;

const READ_CHUNK: usize = 64;

/// Receive side of the serial link: frames bytes into messages for the
/// runner.
pub struct Ingress<'a> {
    framer: Framer,
    state: &'a State,
}

impl<'a> Ingress<'a> {
    pub(crate) fn new(state: &'a State, raw_headers: &'static [&'static [u8]]) -> Self {
        Self {
            framer: Framer::new(raw_headers),
            state,
        }
    }

    /// Feeds received bytes, waiting for room in the message queue when
    /// the runner falls behind.
    pub async fn write(&mut self, bytes: &[u8]) {
        if let Some(len) = self.state.take_payload_hint() {
            self.framer.expect_payload(Some(len));
        }
        for &byte in bytes {
            if !self.framer.push(byte) {
                continue;
            }
            while let Some(msg) = self.framer.take() {
                trace!("RX {:?}", msg);
                self.state.messages.send(msg).await;
            }
        }
    }

    /// Queues a message that did not come from the serial link.
    pub async fn inject(&self, msg: Message) {
        self.state.messages.send(msg).await;
    }

    /// Reads `reader` forever. Read errors are logged and reading continues.
    pub async fn read_from(&mut self, mut reader: impl Read) -> ! {
        let mut buf = [0; READ_CHUNK];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => embassy_futures::yield_now().await,
                Ok(n) => self.write(&buf[..n]).await,
                Err(e) => {
                    error!("Serial read failed: {:?}", e.kind());
                    self.framer.reset();
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const HEADERS: &[&[u8]] = &[b"+QIRD: "];

    #[tokio::test]
    async fn lines_reach_the_queue() {
        let state = State::new();
        let mut ingress = Ingress::new(&state, HEADERS);
        ingress.write(b"\r\n+CSQ: 20,99\r\n\r\nOK\r\n").await;
        assert_eq!(state.messages.receive().await.as_bytes(), b"+CSQ: 20,99");
        assert_eq!(state.messages.receive().await.as_bytes(), b"OK");
        assert!(state.messages.try_receive().is_err());
    }

    #[tokio::test]
    async fn payload_split_across_reads() {
        let state = State::new();
        let mut ingress = Ingress::new(&state, HEADERS);
        state.expect_payload(Some(4));
        ingress.write(b"\r\n+QIRD: 4\r\nab").await;
        ingress.write(b"\r\n\r\n\r\nOK\r\n").await;
        assert_eq!(state.messages.receive().await.as_bytes(), b"+QIRD: 4");
        let payload = state.messages.receive().await;
        assert!(payload.is_raw());
        assert_eq!(payload.as_bytes(), b"ab\r\n");
        assert_eq!(state.messages.receive().await.as_bytes(), b"OK");
    }
}
