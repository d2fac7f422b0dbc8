#![no_main]

use std::io;

use embed_debug::{split_frame, ClientMessage, Command, MessageCodec, Transport};
use libfuzzer_sys::fuzz_target;

const MAX_FRAME_BYTES: usize = 64 * 1024;

struct Bytes<'a> {
    rest: &'a [u8],
}

impl Transport for Bytes<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = buf.len().min(self.rest.len());
        buf[..count].copy_from_slice(&self.rest[..count]);
        self.rest = &self.rest[count..];
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn peek(&mut self) -> io::Result<usize> {
        Ok(self.rest.len())
    }

    fn close(&mut self) {}
}

fn decode_payload(payload: &[u8]) {
    if let Ok(ClientMessage::Request { request }) = serde_json::from_slice(payload) {
        let _ = Command::decode(&request.command, request.args.as_ref());
    }
}

fuzz_target!(|data: &[u8]| {
    let mut rest = data;
    while let Some((payload, tail)) = split_frame(rest) {
        decode_payload(payload);
        rest = tail;
    }

    let mut transport = Bytes { rest: data };
    let mut codec = MessageCodec::new(MAX_FRAME_BYTES);
    while let Ok(payload) = codec.read_frame(&mut transport) {
        decode_payload(payload);
    }
});
