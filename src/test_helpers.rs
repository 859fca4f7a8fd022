//! Scripted modem for driving the engine in tests.
//!
//! Every `write` from the engine is treated as one command. The first unused
//! script entry matching it has its replies queued straight into the message
//! channel, as if the ingress had framed them.

extern crate std;

use std::cell::RefCell;
use std::rc::Rc;
use std::string::{String, ToString};
use std::vec::Vec;

use embedded_io_async::{ErrorKind, ErrorType, Write};

use crate::asynch::state::State;
use crate::parser::Message;

pub fn init_log() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
}

struct Entry {
    cmd: String,
    prefix: bool,
    replies: Vec<String>,
    used: bool,
}

impl Entry {
    fn matches(&self, written: &str) -> bool {
        !self.used
            && if self.prefix {
                written.starts_with(self.cmd.as_str())
            } else {
                written == self.cmd
            }
    }
}

#[derive(Default)]
struct Inner {
    script: Vec<Entry>,
    written: Vec<String>,
    fail: bool,
}

pub struct MockModem<'a> {
    state: &'a State,
    inner: Rc<RefCell<Inner>>,
}

impl<'a> MockModem<'a> {
    pub fn new(state: &'a State) -> Self {
        Self {
            state,
            inner: Rc::new(RefCell::new(Inner::default())),
        }
    }

    pub fn reply(self, cmd: &str, replies: &[&str]) -> Self {
        self.add(cmd, false, replies);
        self
    }

    pub fn reply_prefix(self, prefix: &str, replies: &[&str]) -> Self {
        self.add(prefix, true, replies);
        self
    }

    pub fn fail_writes(self) -> Self {
        self.inner.borrow_mut().fail = true;
        self
    }

    pub fn add_reply(&self, cmd: &str, replies: &[&str]) {
        self.add(cmd, false, replies);
    }

    pub fn add_reply_prefix(&self, prefix: &str, replies: &[&str]) {
        self.add(prefix, true, replies);
    }

    fn add(&self, cmd: &str, prefix: bool, replies: &[&str]) {
        self.inner.borrow_mut().script.push(Entry {
            cmd: cmd.to_string(),
            prefix,
            replies: replies.iter().map(|r| r.to_string()).collect(),
            used: false,
        });
    }

    pub fn writer(&self) -> MockWriter<'a> {
        MockWriter {
            state: self.state,
            inner: self.inner.clone(),
        }
    }

    /// Commands written so far, without the trailing `\r`.
    pub fn written(&self) -> Vec<String> {
        self.inner.borrow().written.clone()
    }

    pub fn written_count(&self, cmd: &str) -> usize {
        self.inner
            .borrow()
            .written
            .iter()
            .filter(|w| w.as_str() == cmd)
            .count()
    }

    pub fn written_total(&self) -> usize {
        self.inner.borrow().written.len()
    }
}

pub struct MockWriter<'a> {
    state: &'a State,
    inner: Rc<RefCell<Inner>>,
}

impl ErrorType for MockWriter<'_> {
    type Error = ErrorKind;
}

impl Write for MockWriter<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail {
            return Err(ErrorKind::Other);
        }

        let text = String::from_utf8_lossy(buf);
        let cmd = text.strip_suffix('\r').unwrap_or(&text).to_string();
        log::debug!("mock got {:?}", cmd);

        if let Some(entry) = inner.script.iter_mut().find(|e| e.matches(&cmd)) {
            entry.used = true;
            for reply in &entry.replies {
                let queued = self.state.messages.try_send(Message::line(reply.as_bytes()));
                assert!(queued.is_ok(), "too many replies queued for {:?}", cmd);
            }
        }
        inner.written.push(cmd);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
