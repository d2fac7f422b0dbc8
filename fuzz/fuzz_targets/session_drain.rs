#![no_main]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use embed_debug::{
    BreakpointStore, DebugConfig, DebugHost, DebugSession, Location, ObjectHandle, StackFrame,
    Transport, Value,
};
use libfuzzer_sys::fuzz_target;

struct Script {
    input: Rc<RefCell<VecDeque<u8>>>,
}

impl Transport for Script {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut input = self.input.borrow_mut();
        let count = buf.len().min(input.len());
        for (slot, byte) in buf.iter_mut().zip(input.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn peek(&mut self) -> io::Result<usize> {
        Ok(self.input.borrow().len())
    }

    fn close(&mut self) {}
}

struct Host {
    line: u32,
    globals: ObjectHandle,
}

impl DebugHost for Host {
    fn current_location(&self) -> Location {
        Location::new("fuzz.js", self.line, 0)
    }

    fn stack_depth(&self) -> u32 {
        2
    }

    fn build_backtrace(&self) -> Vec<StackFrame> {
        Vec::new()
    }

    fn global_variables(&self) -> Value {
        self.globals.clone().into()
    }

    fn local_variables(&self, _frame: u32) -> Value {
        ObjectHandle::array([Value::Int(1), self.globals.clone().into()]).into()
    }

    fn closure_variables(&self, _frame: u32) -> Value {
        Value::Undefined
    }

    fn check_breakpoint(&mut self, breakpoints: &BreakpointStore) -> bool {
        breakpoints
            .get_breakpoints("fuzz.js")
            .is_some_and(|entry| entry.lines().contains(&self.line))
    }
}

fuzz_target!(|data: &[u8]| {
    let input = Rc::new(RefCell::new(data.iter().copied().collect::<VecDeque<u8>>()));
    let session = DebugSession::new(DebugConfig::default().poll_interval(1).max_frame_len(1 << 16));
    let globals = ObjectHandle::plain();
    globals.set("n", 7).set("name", "fuzz");
    let mut host = Host { line: 1, globals };

    session.attach(Box::new(Script { input: Rc::clone(&input) }), &mut host);
    for line in 1..64 {
        if input.borrow().is_empty() {
            break;
        }
        host.line = line;
        session.check(&mut host);
    }
});
