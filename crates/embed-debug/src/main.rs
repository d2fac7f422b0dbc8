//! Console client for the embedded debugger.
//!
//! `embed-debug listen <address>` waits for one engine to connect, prints
//! every frame it sends as a JSON line on stdout, and forwards each JSON
//! line typed on stdin as a frame.

use std::io::{self, BufRead, Write};
use std::net::TcpListener;
#[cfg(unix)]
use std::os::unix::net::UnixListener;
use std::thread;

use anyhow::Context;
use clap::{Parser, Subcommand};
use embed_debug::{
    write_frame, DebugError, Endpoint, MessageCodec, SocketStream, SocketTransport, Transport,
    DEFAULT_MAX_FRAME_LEN,
};
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(name = "embed-debug", version, about = "Embedded debugger console")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Accept one engine connection and relay frames over stdio.
    Listen {
        /// Listen address (tcp://host:port, unix:///path or host:port).
        address: String,
        /// Largest accepted frame payload in bytes.
        #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
        max_frame_len: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Listen {
            address,
            max_frame_len,
        } => listen(&address, max_frame_len),
    }
}

fn listen(address: &str, max_frame_len: usize) -> anyhow::Result<()> {
    let endpoint = Endpoint::parse(address)?;
    match endpoint {
        Endpoint::Tcp(authority) => {
            let listener = TcpListener::bind(authority.as_str())
                .with_context(|| format!("bind {authority}"))?;
            info!(address = %listener.local_addr()?, "waiting for engine");
            let (stream, peer) = listener.accept().context("accept engine connection")?;
            stream.set_nodelay(true)?;
            info!(%peer, "engine connected");
            let writer = stream.try_clone()?;
            relay(stream, writer, max_frame_len)
        }
        #[cfg(unix)]
        Endpoint::Unix(path) => {
            let listener = UnixListener::bind(&path)
                .with_context(|| format!("bind {}", path.display()))?;
            info!(path = %path.display(), "waiting for engine");
            let (stream, _) = listener.accept().context("accept engine connection")?;
            info!("engine connected");
            let writer = stream.try_clone()?;
            let result = relay(stream, writer, max_frame_len);
            if let Err(err) = std::fs::remove_file(&path) {
                debug!("failed to remove socket file: {err}");
            }
            result
        }
    }
}

fn relay<S>(reader: S, writer: S, max_frame_len: usize) -> anyhow::Result<()>
where
    S: SocketStream + Send + 'static,
{
    // Detached: the forwarder blocks on stdin and ends on its own at EOF.
    thread::spawn(move || forward_stdin(SocketTransport::new(writer)));

    let mut transport = SocketTransport::new(reader);
    let mut codec = MessageCodec::new(max_frame_len);
    let stdout = io::stdout();
    let outcome = loop {
        let payload = match codec.read_frame(&mut transport) {
            Ok(payload) => payload,
            Err(DebugError::ConnectionClosed) => {
                info!("engine disconnected");
                break Ok(());
            }
            Err(err) => break Err(err),
        };
        let line = match serde_json::from_slice::<serde_json::Value>(payload) {
            Ok(value) => value.to_string(),
            Err(err) => {
                warn!("engine sent malformed JSON: {err}");
                String::from_utf8_lossy(payload).into_owned()
            }
        };
        let mut out = stdout.lock();
        writeln!(out, "{line}")?;
        out.flush()?;
    };
    transport.close();
    outcome.context("read from engine")
}

fn forward_stdin<S: SocketStream>(mut transport: SocketTransport<S>) {
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("stdin read failed: {err}");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(err) = serde_json::from_str::<serde_json::Value>(line) {
            warn!("skipping invalid JSON line: {err}");
            continue;
        }
        if let Err(err) = write_frame(&mut transport, line.as_bytes()) {
            warn!("failed to send frame: {err}");
            break;
        }
    }
    debug!("stdin forwarding finished");
}
