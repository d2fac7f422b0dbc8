//! Request dispatch while paused.
//! - Dispatcher::dispatch: one request → optional response + continuation
//! - StepTarget: where a step command resumes to

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::Result;
use crate::host::{DebugHost, Location};
use crate::protocol::{Command, RawRequest, ServerMessage, Thread};
use crate::suspended::{frame_scopes, SuspendedState};

/// Whether the drain loop keeps reading after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Drain,
    Resume,
}

/// Pending step, checked on every controller invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTarget {
    /// Pause once the location differs from this one.
    Over(Location),
    /// Pause once the stack is shallower than this depth.
    Out { depth: u32 },
}

impl StepTarget {
    /// Whether the host's current position ends the step.
    #[must_use]
    pub fn reached(&self, host: &dyn DebugHost) -> bool {
        match self {
            StepTarget::Over(start) => *start != host.current_location(),
            StepTarget::Out { depth } => host.stack_depth() < *depth,
        }
    }
}

#[derive(Debug)]
pub struct DispatchOutcome {
    pub response: Option<ServerMessage>,
    pub continuation: Continuation,
}

impl DispatchOutcome {
    fn drain(response: Option<ServerMessage>) -> Self {
        Self {
            response,
            continuation: Continuation::Drain,
        }
    }

    fn resume(response: ServerMessage) -> Self {
        Self {
            response: Some(response),
            continuation: Continuation::Resume,
        }
    }
}

/// Interprets requests against the paused program.
pub struct Dispatcher<'a> {
    host: &'a dyn DebugHost,
    suspended: &'a mut SuspendedState,
    step: &'a mut Option<StepTarget>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        host: &'a dyn DebugHost,
        suspended: &'a mut SuspendedState,
        step: &'a mut Option<StepTarget>,
    ) -> Self {
        Self {
            host,
            suspended,
            step,
        }
    }

    pub fn dispatch(&mut self, request: &RawRequest) -> Result<DispatchOutcome> {
        let command = Command::decode(&request.command, request.args.as_ref())?;
        let seq = request.request_seq.clone();
        debug!(?command, ?seq, "debugger request");
        let outcome = match command {
            // A pending step stays armed until its location is reached.
            Command::Continue => DispatchOutcome::resume(ServerMessage::response(seq, None)),
            Command::Next => {
                *self.step = Some(StepTarget::Over(self.host.current_location()));
                DispatchOutcome::resume(ServerMessage::response(seq, None))
            }
            Command::StepOut => {
                *self.step = Some(StepTarget::Out {
                    depth: self.host.stack_depth(),
                });
                DispatchOutcome::resume(ServerMessage::response(seq, None))
            }
            Command::StackTrace => {
                let frames = self.host.build_backtrace();
                DispatchOutcome::drain(Some(respond(seq, &frames)?))
            }
            Command::Threads => {
                let threads = [Thread {
                    id: self.host.thread_id(),
                    name: "main".to_string(),
                }];
                DispatchOutcome::drain(Some(respond(seq, &threads)?))
            }
            Command::Scopes { frame_id } => {
                DispatchOutcome::drain(Some(respond(seq, &frame_scopes(frame_id))?))
            }
            Command::Variables {
                variables_reference,
            } => {
                let variables = self.suspended.variables(variables_reference, self.host)?;
                DispatchOutcome::drain(Some(respond(seq, &variables)?))
            }
            Command::Unknown(name) => {
                debug!(command = %name, ?seq, "ignoring unknown debugger command");
                DispatchOutcome::drain(None)
            }
        };
        Ok(outcome)
    }
}

fn respond<T: Serialize + ?Sized>(seq: Option<JsonValue>, body: &T) -> Result<ServerMessage> {
    let body: JsonValue = serde_json::to_value(body)?;
    Ok(ServerMessage::response(seq, Some(body)))
}
