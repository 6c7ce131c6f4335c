//! stream-probe - Diagnostic consumer for the marker stream
//!
//! Binds a UDP socket, reassembles frames and logs INIT and EXTRINSIC
//! contents. Useful for checking a running `marker-stream` without the real
//! consumer.
//!
//! ```text
//! RUST_LOG=debug stream-probe --bind 0.0.0.0:12345
//! ```

use clap::Parser;
use marker_stream::error::{Error, Result};
use marker_stream::protocol::{FrameAssembler, Packet, CHUNK_SIZE};
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Receive and decode a marker stream
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Local address to listen on
    #[arg(short, long, default_value = "0.0.0.0:12345")]
    bind: String,

    /// Exit after this many complete frames
    #[arg(long)]
    frames: Option<u64>,

    /// Seconds between rate summaries
    #[arg(long, default_value = "5")]
    report_interval: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let socket = UdpSocket::bind(&args.bind)
        .map_err(|e| Error::Transport(format!("Failed to bind {}: {}", args.bind, e)))?;
    // Wake periodically to observe Ctrl-C
    socket.set_read_timeout(Some(Duration::from_millis(200)))?;
    log::info!("Listening on {}", socket.local_addr()?);

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut assembler = FrameAssembler::new();
    let mut buffer = vec![0u8; CHUNK_SIZE + 64];
    let mut frame_bytes = 0usize;
    let mut frames_in_window = 0u64;
    let mut window_start = Instant::now();
    let report_interval = Duration::from_secs(args.report_interval.max(1));

    while running.load(Ordering::Relaxed) {
        let n = match socket.recv_from(&mut buffer) {
            Ok((n, _)) => n,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let packet = match Packet::decode(&buffer[..n]) {
            Ok(packet) => packet,
            Err(e) => {
                log::warn!("Ignoring datagram: {}", e);
                continue;
            }
        };

        match &packet {
            Packet::Init(init) => log::info!(
                "INIT remap={:?} vertical_fov={:.2}°",
                init.axis_remap,
                init.vertical_fov_deg
            ),
            Packet::Extrinsic(extrinsic) => log::debug!(
                "EXTRINSIC R={:?} t={:?}",
                extrinsic.rotation,
                extrinsic.translation
            ),
            Packet::FrameHeader(_) | Packet::FrameChunk(_) => {}
        }

        if let Some(frame) = assembler.push(&packet) {
            log::debug!("Frame {} complete ({} bytes)", frame.frame_id, frame.payload.len());
            frame_bytes += frame.payload.len();
            frames_in_window += 1;
            if args.frames.is_some_and(|max| assembler.completed() >= max) {
                break;
            }
        }

        let elapsed = window_start.elapsed();
        if elapsed >= report_interval {
            let secs = elapsed.as_secs_f64();
            log::info!(
                "{:.1} fps, {:.1} KiB/s, {} frames complete, {} incomplete",
                frames_in_window as f64 / secs,
                frame_bytes as f64 / 1024.0 / secs,
                assembler.completed(),
                assembler.discarded()
            );
            frames_in_window = 0;
            frame_bytes = 0;
            window_start = Instant::now();
        }
    }

    log::info!(
        "stream-probe stopped: {} frames complete, {} incomplete",
        assembler.completed(),
        assembler.discarded()
    );
    Ok(())
}
