//! Delimiter echo server
//!
//! Accepts TCP connections, pins each one to a loop of an `EventLoopGroup`
//! and echoes every decoded line back, terminated by `\n`. Oversized lines
//! are answered with an `ERR` line and decoding carries on.
//!
//! One blocking reader thread per connection hands raw chunks to the
//! connection's loop; decoding and writing happen on the loop only.
//!
//! Usage:
//!     cargo build --release -p delim-echo
//!     ./target/release/delim-echo [port] [max_conns]
//!
//! With `max_conns` the server stops accepting after that many
//! connections, waits for them to close, and shuts the group down.
//!
//! Test with:
//!     printf 'one\ntwo\r\nthree\n' | nc -q1 localhost 9997
//!
//! Tuning via env: `WEFT_NUM_LOOPS`, `WEFT_MAX_FRAME_LENGTH`,
//! `WEFT_FAIL_FAST`, `RUST_LOG=debug`.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use weft::{
    Bytes, CodecError, DecoderConfig, DelimiterBasedFrameDecoder, Delimiters, EventExecutorExt,
    EventLoopGroup, FrameAccumulator, FrameSink, GroupConfig, SingleThreadEventLoop,
};

const READ_BUF: usize = 4096;

struct Stats {
    accepts: AtomicU64,
    active: AtomicU64,
    frames: AtomicU64,
    oversized: AtomicU64,
    errors: AtomicU64,
}

impl Stats {
    fn new() -> Self {
        Self {
            accepts: AtomicU64::new(0),
            active: AtomicU64::new(0),
            frames: AtomicU64::new(0),
            oversized: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }
}

/// Writes frames straight back to the peer
struct EchoSink<'a> {
    out: &'a mut TcpStream,
    stats: &'a Stats,
}

impl FrameSink for EchoSink<'_> {
    fn on_frame(&mut self, conn_id: u64, frame: Bytes) {
        self.stats.frames.fetch_add(1, Ordering::Relaxed);
        let res = self
            .out
            .write_all(&frame)
            .and_then(|_| self.out.write_all(b"\n"));
        if let Err(e) = res {
            debug!(conn_id, error = %e, "write failed");
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_error(&mut self, conn_id: u64, error: &CodecError) {
        self.stats.oversized.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = writeln!(self.out, "ERR {}", error) {
            debug!(conn_id, error = %e, "write failed");
        }
    }
}

/// Connection state, only ever touched from its event loop
struct Connection {
    frames: FrameAccumulator<DelimiterBasedFrameDecoder>,
    out: TcpStream,
}

fn serve(
    conn_id: u64,
    mut stream: TcpStream,
    event_loop: Arc<SingleThreadEventLoop>,
    decoder_config: DecoderConfig,
    stats: Arc<Stats>,
) -> io::Result<()> {
    let decoder = DelimiterBasedFrameDecoder::new(decoder_config, Delimiters::line_delimiter())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let conn = Arc::new(Mutex::new(Connection {
        frames: FrameAccumulator::new(decoder, conn_id),
        out: stream.try_clone()?,
    }));

    let mut buf = [0u8; READ_BUF];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        let chunk = buf[..n].to_vec();
        let conn = Arc::clone(&conn);
        let stats = Arc::clone(&stats);
        let submitted = event_loop.spawn(move || {
            let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            let Connection { frames, out } = &mut *guard;
            frames.feed(&chunk, &mut EchoSink { out, stats: &stats });
        });
        if let Err(e) = submitted {
            warn!(conn_id, error = %e, "event loop rejected read, closing");
            break;
        }
    }

    let _ = event_loop.spawn(move || {
        let guard = conn.lock().unwrap_or_else(|e| e.into_inner());
        if guard.frames.buffered() > 0 {
            debug!(conn_id, bytes = guard.frames.buffered(), "dropping unterminated tail");
        }
        let _ = guard.out.shutdown(Shutdown::Both);
    });
    Ok(())
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: Vec<String> = std::env::args().collect();
    let port: u16 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(9997);
    let max_conns: Option<u64> = args.get(2).and_then(|s| s.parse().ok());

    let group_config = GroupConfig::from_env();
    let decoder_config = DecoderConfig::from_env();
    if let Err(e) = decoder_config.validate() {
        error!(error = %e, "bad decoder configuration");
        std::process::exit(2);
    }

    let group = match EventLoopGroup::new(group_config) {
        Ok(group) => group,
        Err(e) => {
            error!(error = %e, "failed to start event loops");
            std::process::exit(1);
        }
    };

    let listener = match TcpListener::bind(("0.0.0.0", port)) {
        Ok(l) => l,
        Err(e) => {
            error!(port, error = %e, "bind failed");
            std::process::exit(1);
        }
    };
    info!(
        port,
        loops = group.executor_count(),
        max_frame_length = decoder_config.max_frame_length,
        "delim-echo listening"
    );

    let stats = Arc::new(Stats::new());
    let start = Instant::now();

    let stats_printer = Arc::clone(&stats);
    let _ = thread::Builder::new()
        .name("delim-echo-stats".into())
        .spawn(move || loop {
            thread::sleep(Duration::from_secs(5));
            let s = &stats_printer;
            info!(
                elapsed_s = start.elapsed().as_secs(),
                active = s.active.load(Ordering::Relaxed),
                accepts = s.accepts.load(Ordering::Relaxed),
                frames = s.frames.load(Ordering::Relaxed),
                oversized = s.oversized.load(Ordering::Relaxed),
                errors = s.errors.load(Ordering::Relaxed),
                "stats"
            );
        });

    let mut readers = Vec::new();
    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "accept failed");
                stats.errors.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        let conn_id = stats.accepts.fetch_add(1, Ordering::Relaxed) + 1;
        let event_loop = Arc::clone(group.next());
        let stats_conn = Arc::clone(&stats);

        let spawned = thread::Builder::new()
            .name(format!("delim-echo-conn-{}", conn_id))
            .spawn(move || {
                stats_conn.active.fetch_add(1, Ordering::Relaxed);
                debug!(conn_id, "connection open");
                let res = serve(
                    conn_id,
                    stream,
                    event_loop,
                    decoder_config,
                    Arc::clone(&stats_conn),
                );
                if let Err(e) = res {
                    debug!(conn_id, error = %e, "connection error");
                    stats_conn.errors.fetch_add(1, Ordering::Relaxed);
                }
                stats_conn.active.fetch_sub(1, Ordering::Relaxed);
                debug!(conn_id, "connection closed");
            });

        match spawned {
            Ok(handle) => readers.push(handle),
            Err(e) => {
                warn!(conn_id, error = %e, "failed to spawn reader thread");
                stats.errors.fetch_add(1, Ordering::Relaxed);
            }
        }

        if max_conns.map_or(false, |max| conn_id >= max) {
            info!(conn_id, "connection limit reached, no longer accepting");
            break;
        }
    }

    for reader in readers {
        let _ = reader.join();
    }

    info!("shutting down event loops");
    let terminated = group.shutdown_gracefully_default();
    if !group.await_termination(Duration::from_secs(30)) {
        warn!("event loops did not terminate in time");
    }
    debug!(done = terminated.is_done(), "group terminated");
}
