#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use embed_debug::{
    split_frame, BreakpointEntry, BreakpointStore, Connector, DebugError, DebugHost, Location,
    ObjectHandle, ResolvedBreakpoints, StackFrame, Transport, Value,
};
use serde_json::Value as JsonValue;

#[derive(Default)]
struct Wire {
    incoming: VecDeque<u8>,
    outgoing: Vec<u8>,
    peeks: usize,
    closed: bool,
}

/// Engine side of an in-memory connection. Reads past the queued bytes
/// report a closed peer.
pub struct ScriptedTransport {
    wire: Rc<RefCell<Wire>>,
}

impl Transport for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut wire = self.wire.borrow_mut();
        let count = buf.len().min(wire.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(wire.incoming.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut wire = self.wire.borrow_mut();
        if wire.closed {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        wire.outgoing.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn peek(&mut self) -> io::Result<usize> {
        let mut wire = self.wire.borrow_mut();
        wire.peeks += 1;
        Ok(wire.incoming.len())
    }

    fn close(&mut self) {
        self.wire.borrow_mut().closed = true;
    }
}

/// Test-side handle onto the same connection.
#[derive(Clone, Default)]
pub struct Client {
    wire: Rc<RefCell<Wire>>,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> ScriptedTransport {
        ScriptedTransport {
            wire: Rc::clone(&self.wire),
        }
    }

    pub fn send(&self, message: &JsonValue) {
        let payload = serde_json::to_vec(message).unwrap();
        self.send_raw(&payload);
    }

    pub fn send_raw(&self, payload: &[u8]) {
        let len = u32::try_from(payload.len()).unwrap();
        let mut wire = self.wire.borrow_mut();
        wire.incoming.extend(len.to_be_bytes());
        wire.incoming.extend(payload.iter().copied());
    }

    pub fn send_bytes(&self, bytes: &[u8]) {
        self.wire.borrow_mut().incoming.extend(bytes.iter().copied());
    }

    pub fn request(&self, command: &str, args: Option<JsonValue>, seq: i64) {
        let mut request = serde_json::json!({ "command": command, "request_seq": seq });
        if let Some(args) = args {
            request["args"] = args;
        }
        self.send(&serde_json::json!({ "type": "request", "request": request }));
    }

    pub fn resume(&self) {
        self.send(&serde_json::json!({ "type": "continue" }));
    }

    /// Frames written by the engine since the last call.
    pub fn received(&self) -> Vec<JsonValue> {
        let bytes = std::mem::take(&mut self.wire.borrow_mut().outgoing);
        let mut rest = bytes.as_slice();
        let mut messages = Vec::new();
        while let Some((payload, tail)) = split_frame(rest) {
            messages.push(serde_json::from_slice(payload).unwrap());
            rest = tail;
        }
        assert!(rest.is_empty(), "engine wrote a partial frame");
        messages
    }

    pub fn pending(&self) -> usize {
        self.wire.borrow().incoming.len()
    }

    pub fn peeks(&self) -> usize {
        self.wire.borrow().peeks
    }

    pub fn is_closed(&self) -> bool {
        self.wire.borrow().closed
    }
}

/// Connector that hands out one scripted transport, or refuses.
pub struct ScriptedConnector {
    client: Option<Client>,
    attempts: Rc<Cell<usize>>,
}

impl ScriptedConnector {
    pub fn accepting(client: &Client) -> (Self, Rc<Cell<usize>>) {
        let attempts = Rc::new(Cell::new(0));
        let connector = Self {
            client: Some(client.clone()),
            attempts: Rc::clone(&attempts),
        };
        (connector, attempts)
    }

    pub fn refusing() -> (Self, Rc<Cell<usize>>) {
        let attempts = Rc::new(Cell::new(0));
        let connector = Self {
            client: None,
            attempts: Rc::clone(&attempts),
        };
        (connector, attempts)
    }
}

impl Connector for ScriptedConnector {
    fn connect(&mut self, address: &str) -> embed_debug::Result<Box<dyn Transport>> {
        self.attempts.set(self.attempts.get() + 1);
        match self.client.take() {
            Some(client) => Ok(Box::new(client.transport())),
            None => Err(DebugError::InvalidAddress(address.to_string())),
        }
    }
}

/// Interpreter stand-in: one source file, a stack of named frames.
pub struct FakeHost {
    pub location: Location,
    pub frames: Vec<&'static str>,
    pub globals: ObjectHandle,
    pub locals: Vec<ObjectHandle>,
    pub closures: Vec<ObjectHandle>,
    resolved: ResolvedBreakpoints<u32>,
    pub breakpoint_checks: usize,
}

impl FakeHost {
    pub fn new(filename: &str) -> Self {
        Self {
            location: Location::new(filename, 1, 0),
            frames: vec!["<main>"],
            globals: ObjectHandle::plain(),
            locals: vec![ObjectHandle::plain()],
            closures: vec![ObjectHandle::plain()],
            resolved: ResolvedBreakpoints::new(),
            breakpoint_checks: 0,
        }
    }

    pub fn at_line(&mut self, line: u32) -> &mut Self {
        self.location.line = line;
        self
    }

    pub fn call(&mut self, name: &'static str) {
        self.frames.insert(0, name);
        self.locals.insert(0, ObjectHandle::plain());
        self.closures.insert(0, ObjectHandle::plain());
    }

    pub fn ret(&mut self) {
        self.frames.remove(0);
        self.locals.remove(0);
        self.closures.remove(0);
    }

    pub fn resolved_stamp(&self) -> Option<u64> {
        self.resolved.stamp()
    }
}

impl DebugHost for FakeHost {
    fn current_location(&self) -> Location {
        self.location.clone()
    }

    fn stack_depth(&self) -> u32 {
        u32::try_from(self.frames.len()).unwrap()
    }

    fn build_backtrace(&self) -> Vec<StackFrame> {
        self.frames
            .iter()
            .zip(0..)
            .map(|(name, id)| StackFrame {
                id,
                name: (*name).to_string(),
                filename: Some(self.location.filename.clone()),
                line: (id == 0).then_some(self.location.line),
                column: None,
            })
            .collect()
    }

    fn global_variables(&self) -> Value {
        self.globals.clone().into()
    }

    fn local_variables(&self, frame: u32) -> Value {
        self.locals[frame as usize].clone().into()
    }

    fn closure_variables(&self, frame: u32) -> Value {
        self.closures[frame as usize].clone().into()
    }

    fn check_breakpoint(&mut self, breakpoints: &BreakpointStore) -> bool {
        self.breakpoint_checks += 1;
        self.resolved.is_hit(
            breakpoints,
            &self.location.filename,
            &self.location.line,
            BreakpointEntry::lines,
        )
    }
}
