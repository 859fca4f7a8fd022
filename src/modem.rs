//! The seam between the generic engine and a modem dialect.

use crate::analyzer::{Action, Origin};
use crate::command::{AtCommand, BuildError, CommandBuffer, CommandId};
use crate::context::ModemContext;
use crate::error::{ErrorKind, ModemError};
use crate::modules::ModuleParams;
use crate::parser::Message;
use crate::sequencer::{Step, Transaction};
use crate::service::{Request, Response};

/// A modem dialect: its command table, service sequencers, command builders
/// and reply analyzers, plus the context they share.
pub trait Modem {
    type Cmd: CommandId;
    type Params: ModuleParams;

    /// Steps run before every service body.
    const PREAMBLE_STEPS: u8 = 0;

    /// Reply prefixes followed by a binary payload, see [`crate::parser::Framer`].
    const RAW_HEADERS: &'static [&'static [u8]] = &[];

    fn params(&self) -> Self::Params;

    fn context(&self) -> &ModemContext;

    fn context_mut(&mut self) -> &mut ModemContext;

    /// The step at `tx`'s position for `req`. Asking beyond the last step of
    /// a service is an [`ErrorKind::InvalidStep`].
    fn next_step(
        &mut self,
        req: &Request<'_>,
        tx: &mut Transaction,
    ) -> Result<Step<Self::Cmd>, ErrorKind>;

    /// Appends the parameters of `cmd` after its `AT` header.
    fn build(
        &mut self,
        req: &Request<'_>,
        cmd: &AtCommand<Self::Cmd>,
        buf: &mut CommandBuffer,
    ) -> Result<(), BuildError>;

    /// A reply whose prefix is `id`'s name.
    fn analyze(&mut self, id: Self::Cmd, msg: &Message, origin: Origin) -> Action;

    /// A line without a known prefix. `None` if the dialect does not know it.
    fn analyze_text(
        &mut self,
        _msg: &Message,
        _pending: Option<&AtCommand<Self::Cmd>>,
    ) -> Option<Action> {
        None
    }

    /// A binary payload announced by one of [`Modem::RAW_HEADERS`].
    fn analyze_payload(
        &mut self,
        _msg: &Message,
        _pending: Option<&AtCommand<Self::Cmd>>,
    ) -> Action {
        Action::Ignored
    }

    /// Whether replies named after `id` also arrive unprompted, as URCs.
    fn unsolicited(&self, _id: Self::Cmd) -> bool {
        false
    }

    /// Modem errors that count as success for `id`.
    fn tolerate_error(&mut self, _id: Self::Cmd, _err: &ModemError) -> bool {
        false
    }

    /// Collects the result of a completed service from the context.
    fn response(&mut self, req: &Request<'_>) -> Result<Response, ErrorKind>;

    /// Command undoing what a failed service left behind on the modem, sent
    /// before [`Modem::abort`].
    fn rollback(&mut self, _req: &Request<'_>) -> Option<AtCommand<Self::Cmd>> {
        None
    }

    /// Undoes partial effects of a failed service.
    fn abort(&mut self, _req: &Request<'_>) {}
}
