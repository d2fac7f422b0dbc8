//! Wire envelopes exchanged with the debugger client.
//! - ClientMessage/RawRequest: client → engine
//! - ServerMessage/StoppedEvent: engine → client
//! - Command: closed set of request commands

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{DebugError, Result};

/// Envelope sent by the client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Request { request: RawRequest },
    Continue,
    Breakpoints { breakpoints: BreakpointsUpdate },
    /// Any other `type`; skipped by the drain loop.
    #[serde(other)]
    Unknown,
}

/// Request body before the command is decoded.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawRequest {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<JsonValue>,
    /// Echoed back verbatim in the response; omitted there when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_seq: Option<JsonValue>,
}

/// Replacement breakpoint list for one source path.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BreakpointsUpdate {
    pub path: String,
    #[serde(default)]
    pub breakpoints: Vec<BreakpointSpec>,
}

/// One client breakpoint, kept as sent. The engine's resolver decides what
/// the fields mean.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct BreakpointSpec(JsonValue);

impl BreakpointSpec {
    #[must_use]
    pub fn new(raw: JsonValue) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn at_line(line: u32) -> Self {
        Self(serde_json::json!({ "line": line }))
    }

    /// `line`, if present and a non-negative integer that fits.
    #[must_use]
    pub fn line(&self) -> Option<u32> {
        self.number("line")
    }

    #[must_use]
    pub fn column(&self) -> Option<u32> {
        self.number("column")
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    #[must_use]
    pub fn raw(&self) -> &JsonValue {
        &self.0
    }

    fn number(&self, key: &str) -> Option<u32> {
        self.0
            .get(key)?
            .as_u64()
            .and_then(|value| u32::try_from(value).ok())
    }
}

/// Envelope sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Event {
        event: StoppedEvent,
    },
    Response {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<JsonValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_seq: Option<JsonValue>,
    },
}

impl ServerMessage {
    #[must_use]
    pub fn response(request_seq: Option<JsonValue>, body: Option<JsonValue>) -> Self {
        Self::Response { body, request_seq }
    }
}

/// Why execution stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    Entry,
    Breakpoint,
    Step,
}

/// `StoppedEvent` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoppedEvent {
    #[serde(rename = "type")]
    pub kind: StoppedEventKind,
    pub reason: StopReason,
    pub thread: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoppedEventKind {
    StoppedEvent,
}

impl StoppedEvent {
    #[must_use]
    pub fn new(reason: StopReason, thread: u64) -> Self {
        Self {
            kind: StoppedEventKind::StoppedEvent,
            reason,
            thread,
        }
    }
}

/// One entry of a `scopes` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub name: String,
    pub reference: u32,
    pub expensive: bool,
}

/// One entry of a `variables` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub variables_reference: u32,
}

/// One entry of a `threads` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScopesArguments {
    #[serde(default)]
    frame_id: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariablesArguments {
    #[serde(default)]
    variables_reference: u32,
}

/// Request commands understood by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Continue,
    Next,
    StepOut,
    StackTrace,
    Threads,
    Scopes { frame_id: u32 },
    Variables { variables_reference: u32 },
    /// Unrecognised command name; answered with silence.
    Unknown(String),
}

impl Command {
    /// Decode a wire command name and its arguments.
    ///
    /// Missing numeric arguments default to `0`; present but malformed ones
    /// are protocol errors.
    pub fn decode(command: &str, args: Option<&JsonValue>) -> Result<Self> {
        let decoded = match command {
            "continue" => Self::Continue,
            "next" => Self::Next,
            "stepOut" => Self::StepOut,
            "stackTrace" => Self::StackTrace,
            "threads" => Self::Threads,
            "scopes" => {
                let args: ScopesArguments = decode_args(command, args)?;
                Self::Scopes {
                    frame_id: args.frame_id,
                }
            }
            "variables" => {
                let args: VariablesArguments = decode_args(command, args)?;
                Self::Variables {
                    variables_reference: args.variables_reference,
                }
            }
            other => Self::Unknown(other.to_string()),
        };
        Ok(decoded)
    }
}

fn decode_args<T>(command: &str, args: Option<&JsonValue>) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    match args {
        None | Some(JsonValue::Null) => Ok(T::default()),
        Some(value) => T::deserialize(value)
            .map_err(|err| DebugError::protocol(format!("invalid {command} args: {err}"))),
    }
}
