//! Byte transport between the embedded debugger and its client.
//! - Transport: blocking read/write, non-blocking peek, close
//! - read_fully/write_fully: exact-length transfers
//! - Endpoint/SocketConnector: tcp:// and unix:// attach addresses

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
#[cfg(unix)]
use std::path::PathBuf;

use tracing::debug;

use crate::error::{DebugError, Result};

const PEEK_LEN: usize = 64;

/// Connection to a debugger client.
///
/// `read` and `write` block and may transfer fewer bytes than requested;
/// [`read_fully`] and [`write_fully`] turn them into exact transfers.
/// `Ok(0)` from either is treated as a closed connection.
pub trait Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Number of bytes ready to read without blocking. Never blocks.
    fn peek(&mut self) -> io::Result<usize>;

    fn close(&mut self);
}

/// Fill `buf` completely or fail.
pub fn read_fully<T: Transport + ?Sized>(transport: &mut T, buf: &mut [u8]) -> Result<()> {
    let mut offset = 0;
    while offset < buf.len() {
        match transport.read(&mut buf[offset..]) {
            Ok(0) => return Err(DebugError::ConnectionClosed),
            Ok(received) => offset += received,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Send all of `buf` or fail.
pub fn write_fully<T: Transport + ?Sized>(transport: &mut T, buf: &[u8]) -> Result<()> {
    let mut offset = 0;
    while offset < buf.len() {
        match transport.write(&buf[offset..]) {
            Ok(0) => return Err(DebugError::ConnectionClosed),
            Ok(sent) => offset += sent,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Stream sockets usable by [`SocketTransport`].
pub trait SocketStream: Read + Write {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;
    fn shutdown(&self) -> io::Result<()>;
}

impl SocketStream for TcpStream {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

#[cfg(unix)]
impl SocketStream for UnixStream {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        UnixStream::set_nonblocking(self, nonblocking)
    }

    fn shutdown(&self) -> io::Result<()> {
        UnixStream::shutdown(self, Shutdown::Both)
    }
}

/// [`Transport`] over a connected stream socket.
///
/// `peek` does a non-blocking read into a read-ahead buffer that later
/// reads drain first, so it works the same on every socket family.
#[derive(Debug)]
pub struct SocketTransport<S> {
    stream: S,
    read_ahead: Vec<u8>,
    closed: bool,
}

impl<S: SocketStream> SocketTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_ahead: Vec::new(),
            closed: false,
        }
    }

    fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.set_nonblocking(true)?;
        let received = self.stream.read(buf);
        self.stream.set_nonblocking(false)?;
        received
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        Ok(())
    }
}

impl<S: SocketStream> Transport for SocketTransport<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_open()?;
        if self.read_ahead.is_empty() {
            return self.stream.read(buf);
        }
        let count = buf.len().min(self.read_ahead.len());
        buf[..count].copy_from_slice(&self.read_ahead[..count]);
        self.read_ahead.drain(..count);
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_open()?;
        let sent = self.stream.write(buf)?;
        self.stream.flush()?;
        Ok(sent)
    }

    fn peek(&mut self) -> io::Result<usize> {
        self.ensure_open()?;
        if !self.read_ahead.is_empty() {
            return Ok(self.read_ahead.len());
        }
        let mut scratch = [0u8; PEEK_LEN];
        match self.read_nonblocking(&mut scratch) {
            Ok(0) => Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            Ok(received) => {
                self.read_ahead.extend_from_slice(&scratch[..received]);
                Ok(received)
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(0),
            Err(err) => Err(err),
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.stream.shutdown() {
            debug!("socket shutdown failed: {err}");
        }
    }
}

/// Parsed attach address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `host:port`, resolved at connect time.
    Tcp(String),
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Endpoint {
    /// Parse `tcp://host:port`, `unix:///path` or a bare `host:port`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix("tcp://") {
            return Self::parse_tcp(rest, text);
        }
        if let Some(rest) = text.strip_prefix("unix://") {
            #[cfg(unix)]
            {
                if rest.is_empty() {
                    return Err(DebugError::InvalidAddress(text.to_string()));
                }
                return Ok(Self::Unix(PathBuf::from(rest)));
            }
            #[cfg(not(unix))]
            {
                let _ = rest;
                return Err(DebugError::InvalidAddress(text.to_string()));
            }
        }
        Self::parse_tcp(text, text)
    }

    fn parse_tcp(authority: &str, original: &str) -> Result<Self> {
        let invalid = || DebugError::InvalidAddress(original.to_string());
        let (host, port) = authority.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(invalid());
        }
        Ok(Self::Tcp(authority.to_string()))
    }
}

/// Opens transports for attach addresses.
pub trait Connector {
    fn connect(&mut self, address: &str) -> Result<Box<dyn Transport>>;
}

/// Default connector for TCP and unix socket addresses.
#[derive(Debug, Default, Clone, Copy)]
pub struct SocketConnector;

impl Connector for SocketConnector {
    fn connect(&mut self, address: &str) -> Result<Box<dyn Transport>> {
        match Endpoint::parse(address)? {
            Endpoint::Tcp(authority) => {
                let stream = TcpStream::connect(authority.as_str())?;
                stream.set_nodelay(true)?;
                Ok(Box::new(SocketTransport::new(stream)))
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = UnixStream::connect(&path)?;
                Ok(Box::new(SocketTransport::new(stream)))
            }
        }
    }
}
