//! In-process remote debugger for embedded script interpreters.
//!
//! The engine owns a [`DebugSession`] and calls [`DebugSession::check`]
//! before each step. The session speaks length-prefixed JSON to a single
//! client over a [`Transport`] and reaches back into the engine through
//! [`DebugHost`].

mod breakpoints;
mod codec;
mod config;
mod dispatch;
mod error;
mod host;
pub mod protocol;
mod session;
mod suspended;
mod transport;
mod value;

pub use breakpoints::{BreakpointEntry, BreakpointStore, ResolvedBreakpoints};
pub use codec::{split_frame, write_frame, write_message, MessageCodec};
pub use config::{
    DebugConfig, DEBUG_ADDRESS_ENV, DEBUG_POLL_INTERVAL_ENV, DEFAULT_MAX_FRAME_LEN,
    DEFAULT_POLL_INTERVAL,
};
pub use dispatch::{Continuation, DispatchOutcome, Dispatcher, StepTarget};
pub use error::{DebugError, Result};
pub use host::{DebugHost, Location, StackFrame};
pub use protocol::{
    BreakpointSpec, BreakpointsUpdate, ClientMessage, Command, RawRequest, Scope, ServerMessage,
    StopReason, StoppedEvent, Thread, Variable,
};
pub use session::{DebugSession, SessionState};
pub use suspended::{decode_scope_reference, frame_scopes, scope_reference, ScopeKind, SuspendedState};
pub use transport::{
    read_fully, write_fully, Connector, Endpoint, SocketConnector, SocketStream, SocketTransport,
    Transport,
};
pub use value::{HostObject, ObjectHandle, ObjectId, ObjectKind, Property, PropertyKey, Value};
