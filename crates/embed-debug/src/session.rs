//! Debug session controller.
//! - DebugSession::check: per-step entry point called by the engine
//! - attach/detach: explicit connection lifecycle
//! - drain loop: read → dispatch → respond until the client resumes

use std::cell::{Cell, RefCell};

use tracing::{debug, info, trace, warn};

use crate::breakpoints::BreakpointStore;
use crate::codec::{write_message, MessageCodec};
use crate::config::DebugConfig;
use crate::dispatch::{Continuation, Dispatcher, StepTarget};
use crate::error::{DebugError, Result};
use crate::host::DebugHost;
use crate::protocol::{ClientMessage, ServerMessage, StopReason, StoppedEvent};
use crate::suspended::SuspendedState;
use crate::transport::{Connector, SocketConnector, Transport};

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No client: not yet connected, connection failed, or detached.
    Detached,
    /// Connected, program running.
    Idle,
    /// Connected, draining client messages with the program halted.
    Paused,
}

enum Link {
    Unattempted,
    Connected(Connection),
    Inert,
}

struct Connection {
    transport: Box<dyn Transport>,
    codec: MessageCodec,
}

/// Why the controller decided to halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseTrigger {
    Stop(StopReason),
    PendingInput,
}

struct SessionInner {
    config: DebugConfig,
    connector: Box<dyn Connector>,
    link: Link,
    breakpoints: BreakpointStore,
    step: Option<StepTarget>,
    peek_ticks: u32,
}

/// Held while a controller entry point runs. A second acquisition on the
/// same session fails until the first token drops.
struct ExecutionToken<'a> {
    active: &'a Cell<bool>,
}

impl<'a> ExecutionToken<'a> {
    fn acquire(active: &'a Cell<bool>) -> Option<Self> {
        if active.replace(true) {
            return None;
        }
        Some(Self { active })
    }
}

impl Drop for ExecutionToken<'_> {
    fn drop(&mut self) {
        self.active.set(false);
    }
}

/// In-process debugger bound to one interpreter thread.
///
/// The engine calls [`DebugSession::check`] before executing each step.
/// The first call connects to the configured address; later calls pause
/// execution on breakpoints, finished steps, or pending client input and
/// serve requests until the client resumes. Transport or protocol failures
/// detach the session for good; the program keeps running.
pub struct DebugSession {
    active: Cell<bool>,
    state: Cell<SessionState>,
    inner: RefCell<SessionInner>,
}

impl DebugSession {
    #[must_use]
    pub fn new(config: DebugConfig) -> Self {
        Self::with_connector(config, SocketConnector)
    }

    /// Session configured from `EMBED_DEBUG_ADDRESS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(DebugConfig::from_env())
    }

    #[must_use]
    pub fn with_connector(config: DebugConfig, connector: impl Connector + 'static) -> Self {
        Self {
            active: Cell::new(false),
            state: Cell::new(SessionState::Detached),
            inner: RefCell::new(SessionInner {
                config,
                connector: Box::new(connector),
                link: Link::Unattempted,
                breakpoints: BreakpointStore::new(),
                step: None,
                peek_ticks: 0,
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Whether a controller entry point is running on this session.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Inspect the breakpoint store. `None` while a check is running.
    pub fn with_breakpoints<R>(&self, f: impl FnOnce(&BreakpointStore) -> R) -> Option<R> {
        let inner = self.inner.try_borrow().ok()?;
        Some(f(&inner.breakpoints))
    }

    /// Per-step hook. Nested calls are no-ops.
    pub fn check(&self, host: &mut dyn DebugHost) {
        let Some(_token) = ExecutionToken::acquire(&self.active) else {
            trace!("nested debugger check ignored");
            return;
        };
        let mut inner = self.inner.borrow_mut();

        if matches!(inner.link, Link::Unattempted) {
            self.connect(&mut inner, &*host);
        }
        if !matches!(inner.link, Link::Connected(_)) {
            return;
        }

        match inner.pause_trigger(host) {
            Ok(Some(trigger)) => self.pause(&mut inner, &*host, trigger),
            Ok(None) => {}
            Err(err) => self.fail(&mut inner, &err),
        }
    }

    /// Attach an already connected transport, replacing any current one.
    ///
    /// Sends the entry stop event and serves requests until the client
    /// resumes.
    pub fn attach(&self, transport: Box<dyn Transport>, host: &mut dyn DebugHost) {
        let Some(_token) = ExecutionToken::acquire(&self.active) else {
            debug!("attach ignored inside a debugger check");
            return;
        };
        let mut inner = self.inner.borrow_mut();
        inner.release();
        self.start(&mut inner, transport, &*host);
    }

    /// Close the connection and drop all breakpoints.
    pub fn detach(&self) {
        let Some(_token) = ExecutionToken::acquire(&self.active) else {
            debug!("detach ignored inside a debugger check");
            return;
        };
        let mut inner = self.inner.borrow_mut();
        if matches!(inner.link, Link::Connected(_)) {
            info!("debugger detached");
        }
        inner.release();
        inner.link = Link::Inert;
        self.state.set(SessionState::Detached);
    }

    fn connect(&self, inner: &mut SessionInner, host: &dyn DebugHost) {
        inner.link = Link::Inert;
        let Some(address) = inner.config.address.clone() else {
            debug!("no debug address configured");
            return;
        };
        match inner.connector.connect(&address) {
            Ok(transport) => {
                info!(%address, "debugger connected");
                self.start(inner, transport, host);
            }
            Err(err) => warn!(%address, %err, "debugger connection failed; debugging disabled"),
        }
    }

    fn start(&self, inner: &mut SessionInner, transport: Box<dyn Transport>, host: &dyn DebugHost) {
        inner.link = Link::Connected(Connection {
            transport,
            codec: MessageCodec::new(inner.config.max_frame_len),
        });
        self.state.set(SessionState::Idle);
        self.pause(inner, host, PauseTrigger::Stop(StopReason::Entry));
    }

    fn pause(&self, inner: &mut SessionInner, host: &dyn DebugHost, trigger: PauseTrigger) {
        self.state.set(SessionState::Paused);
        let result = match trigger {
            PauseTrigger::Stop(reason) => {
                info!(?reason, thread = host.thread_id(), "execution paused");
                inner.send_stopped(reason, host)
            }
            PauseTrigger::PendingInput => {
                debug!("client input pending; pausing");
                Ok(())
            }
        }
        .and_then(|()| inner.drain(host));

        match result {
            Ok(()) => {
                debug!("execution resumed");
                self.state.set(SessionState::Idle);
            }
            Err(err) => self.fail(inner, &err),
        }
    }

    fn fail(&self, inner: &mut SessionInner, err: &DebugError) {
        warn!(%err, "debug session failed; detaching");
        inner.release();
        inner.link = Link::Inert;
        self.state.set(SessionState::Detached);
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        self.inner.get_mut().release();
    }
}

impl SessionInner {
    fn connection(&mut self) -> Result<&mut Connection> {
        match &mut self.link {
            Link::Connected(connection) => Ok(connection),
            Link::Unattempted | Link::Inert => Err(DebugError::ConnectionClosed),
        }
    }

    fn pause_trigger(&mut self, host: &mut dyn DebugHost) -> Result<Option<PauseTrigger>> {
        if host.check_breakpoint(&self.breakpoints) {
            return Ok(Some(PauseTrigger::Stop(StopReason::Breakpoint)));
        }

        if let Some(step) = &self.step {
            if !step.reached(&*host) {
                return Ok(None);
            }
            self.step = None;
            return Ok(Some(PauseTrigger::Stop(StopReason::Step)));
        }

        self.peek_ticks = self.peek_ticks.saturating_add(1);
        if self.peek_ticks < self.config.poll_interval {
            return Ok(None);
        }
        self.peek_ticks = 0;

        let available = self.connection()?.transport.peek()?;
        Ok((available > 0).then_some(PauseTrigger::PendingInput))
    }

    fn send_stopped(&mut self, reason: StopReason, host: &dyn DebugHost) -> Result<()> {
        let event = ServerMessage::Event {
            event: StoppedEvent::new(reason, host.thread_id()),
        };
        let connection = self.connection()?;
        write_message(connection.transport.as_mut(), &event)
    }

    /// Serve client messages until one resumes execution.
    fn drain(&mut self, host: &dyn DebugHost) -> Result<()> {
        let Link::Connected(connection) = &mut self.link else {
            return Err(DebugError::ConnectionClosed);
        };
        let mut suspended = SuspendedState::new(host.stack_depth());

        loop {
            let message: ClientMessage = connection
                .codec
                .read_message(connection.transport.as_mut())?;
            match message {
                ClientMessage::Request { request } => {
                    let outcome =
                        Dispatcher::new(host, &mut suspended, &mut self.step).dispatch(&request)?;
                    if let Some(response) = &outcome.response {
                        write_message(connection.transport.as_mut(), response)?;
                    }
                    if outcome.continuation == Continuation::Resume {
                        return Ok(());
                    }
                }
                ClientMessage::Continue => return Ok(()),
                ClientMessage::Breakpoints { breakpoints } => {
                    debug!(
                        path = %breakpoints.path,
                        count = breakpoints.breakpoints.len(),
                        "breakpoints updated"
                    );
                    self.breakpoints
                        .set_breakpoints(breakpoints.path, breakpoints.breakpoints);
                }
                ClientMessage::Unknown => debug!("ignoring unknown debugger message"),
            }
        }
    }

    /// Close the transport and forget per-connection state.
    fn release(&mut self) {
        if let Link::Connected(connection) = &mut self.link {
            connection.transport.close();
        }
        if !matches!(self.link, Link::Unattempted) {
            self.link = Link::Inert;
        }
        self.breakpoints.clear();
        self.step = None;
        self.peek_ticks = 0;
    }
}
