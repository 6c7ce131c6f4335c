//! Per-tick capture → detect → estimate → transmit pipeline
//!
//! # State Machine
//!
//! ```text
//! Capture ──fail──▶ (tick ends, nothing sent, frame id unchanged)
//!    │
//!    ▼
//! Detect ──no marker──▶ NoMarker ──▶ RetainState ──┐
//!    │                                              │
//!    ▼                                              │
//! Estimate ──fail──▶ RetainState ───────────────────┤
//!    │                                              │
//!    └──ok──▶ UpdateState (render) ─────────────────┤
//!                                                   ▼
//!                                               Transmit (frame, EXTRINSIC, id += 1)
//! ```
//!
//! Nothing inside a tick is fatal. Capture failures skip the tick, detection
//! and solve failures keep streaming the last known pose, and send failures
//! are logged. Only a quit event or the shutdown flag ends [`Pipeline::run`].
//!
//! # Input Events
//!
//! Polled from the renderer at the top of each tick:
//!
//! | Event | Action |
//! |-------|--------|
//! | `Quit` | Stop before capturing |
//! | `SaveSnapshot` | Write the last frame as `snapshot-NNNNN.png` |
//! | `ToggleRecording` | Start or stop recording on the frame source |

mod state;

pub use state::{PipelineStats, PoseState, TickReport, TickState};

use crate::codec::{self, Payload};
use crate::config::{AppConfig, InitialPose};
use crate::core::traits::{FrameSource, MarkerDetector, SceneRenderer};
use crate::core::types::{Frame, InputEvent, MarkerSelection};
use crate::devices::DeviceSet;
use crate::error::Result;
use crate::pose::{marker_object_points, PlanarPoseSolver, PoseSolver};
use crate::protocol::packets::InitParams;
use crate::protocol::FrameId;
use crate::streaming::StreamSender;
use crate::transport::DatagramTransport;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Highest snapshot index tried before giving up on a free file name
const MAX_SNAPSHOT_INDEX: u32 = 99_999;

/// Tick rate used when the configured one has no valid period
const DEFAULT_TICK_RATE_HZ: f64 = 30.0;

/// Pipeline behavior resolved from configuration
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub jpeg_quality: u8,
    pub selection: MarkerSelection,
    pub use_lighting: bool,
    pub initial_pose: InitialPose,
    pub init: InitParams,
    pub init_repeat: u32,
    pub init_interval: Duration,
    pub tick_interval: Duration,
    pub snapshot_dir: PathBuf,
}

impl PipelineOptions {
    /// Options from configuration; `vertical_fov_deg` is the source's FOV
    /// unless the configuration overrides it
    pub fn from_config(config: &AppConfig, vertical_fov_deg: f32) -> Self {
        Self {
            jpeg_quality: config.streaming.jpeg_quality,
            selection: config.marker.selection(),
            use_lighting: config.marker.use_lighting,
            initial_pose: config.streaming.initial_pose,
            init: InitParams {
                axis_remap: config.streaming.axis_remap_flat(),
                vertical_fov_deg: config.camera.vertical_fov_deg.unwrap_or(vertical_fov_deg),
            },
            init_repeat: config.streaming.init_repeat,
            init_interval: Duration::from_millis(config.streaming.init_interval_ms),
            tick_interval: tick_interval(config.pipeline.tick_rate_hz),
            snapshot_dir: config.pipeline.snapshot_dir.clone(),
        }
    }
}

/// Tick period for `rate_hz`, falling back to the default rate when the
/// period is not representable
fn tick_interval(rate_hz: f64) -> Duration {
    Duration::try_from_secs_f64(1.0 / rate_hz).unwrap_or_else(|_| {
        log::warn!(
            "tick_rate_hz {} unusable, running at {} Hz",
            rate_hz,
            DEFAULT_TICK_RATE_HZ
        );
        Duration::from_secs_f64(1.0 / DEFAULT_TICK_RATE_HZ)
    })
}

/// Tracking pipeline owning its collaborators and the stream sender
pub struct Pipeline {
    source: Box<dyn FrameSource>,
    detector: Box<dyn MarkerDetector>,
    renderer: Box<dyn SceneRenderer>,
    solver: Box<dyn PoseSolver>,
    sender: StreamSender<Box<dyn DatagramTransport>>,
    options: PipelineOptions,
    pose: PoseState,
    frame_id: FrameId,
    last_frame: Option<Frame>,
    next_snapshot: u32,
    quit: bool,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        devices: DeviceSet,
        solver: Box<dyn PoseSolver>,
        transport: Box<dyn DatagramTransport>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            source: devices.source,
            detector: devices.detector,
            renderer: devices.renderer,
            solver,
            sender: StreamSender::new(transport),
            options,
            pose: PoseState::new(),
            frame_id: FrameId::default(),
            last_frame: None,
            next_snapshot: 0,
            quit: false,
            stats: PipelineStats::default(),
        }
    }

    /// Build a pipeline with the planar solver configured for the marker
    pub fn from_config(
        config: &AppConfig,
        devices: DeviceSet,
        transport: Box<dyn DatagramTransport>,
    ) -> Result<Self> {
        config.validate()?;
        let mut solver = PlanarPoseSolver::new(
            config.camera.intrinsics(),
            config.marker.max_reprojection_error_px,
        );
        solver.set_object_points(&marker_object_points(config.marker.size))?;

        let options = PipelineOptions::from_config(config, devices.source.vertical_fov_deg());
        Ok(Self::new(devices, Box::new(solver), transport, options))
    }

    /// Start the frame identifier at `frame_id`
    pub fn with_frame_id(mut self, frame_id: FrameId) -> Self {
        self.frame_id = frame_id;
        self
    }

    /// Identifier the next transmitted frame will carry
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn pose_state(&self) -> &PoseState {
        &self.pose
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Whether a quit event has been received
    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Send the INIT packet burst; called once at startup
    pub fn send_init_burst(&mut self) -> Result<u32> {
        let init = self.options.init;
        log::info!(
            "Sending INIT x{} (vertical FOV {:.2}°)",
            self.options.init_repeat,
            init.vertical_fov_deg
        );
        self.sender
            .send_init_params(&init, self.options.init_repeat, self.options.init_interval)
    }

    /// Run one capture → detect → estimate → transmit cycle
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        self.stats.ticks += 1;

        self.handle_events(&mut report);
        if self.quit {
            report.quit_requested = true;
            return report;
        }

        report.path.push(TickState::Capture);
        let frame = match self.source.capture() {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("Capture failed, skipping tick: {}", e);
                self.stats.capture_failures += 1;
                return report;
            }
        };

        report.path.push(TickState::Detect);
        self.detect_and_estimate(&frame, &mut report);

        report.path.push(TickState::Transmit);
        self.transmit(&frame, &mut report);
        self.last_frame = Some(frame);

        log::debug!("Tick {}: {:?}", self.stats.ticks, report.path);
        report
    }

    fn detect_and_estimate(&mut self, frame: &Frame, report: &mut TickReport) {
        let observation = match self.detector.detect(frame) {
            Ok(observation) => observation,
            Err(e) => {
                log::debug!("Detector error treated as no marker: {}", e);
                Default::default()
            }
        };

        let Some(marker) = observation.select(self.options.selection) else {
            report.path.push(TickState::NoMarker);
            report.path.push(TickState::RetainState);
            self.stats.no_marker += 1;
            return;
        };

        report.path.push(TickState::Estimate);
        report.marker_id = Some(marker.id);
        match self.solver.solve(&marker.corners) {
            Ok(pose) => {
                self.pose.update(pose);
                self.stats.pose_updates += 1;
                report.pose_updated = true;
                report.path.push(TickState::UpdateState);

                let light = self
                    .options
                    .use_lighting
                    .then(|| pose.light_position());
                self.renderer.render(&pose.view_matrix(), light);
            }
            Err(e) => {
                if matches!(self.options.selection, MarkerSelection::Id(_)) {
                    log::warn!("Pose solve failed for marker {}: {}", marker.id, e);
                } else {
                    log::debug!("Pose solve failed for marker {}: {}", marker.id, e);
                }
                self.stats.solve_failures += 1;
                report.path.push(TickState::RetainState);
            }
        }
    }

    fn transmit(&mut self, frame: &Frame, report: &mut TickReport) {
        let frame_id = self.frame_id.advance();
        report.frame_id = Some(frame_id);
        self.stats.transmitted += 1;

        match codec::encode(&Payload::Image(frame), self.options.jpeg_quality) {
            Ok(payload) => match self.sender.send_frame(frame_id, &payload) {
                Ok(_) => report.frame_sent = true,
                Err(e) => {
                    log::warn!("Failed to send frame {}: {}", frame_id, e);
                    self.stats.frames_dropped += 1;
                }
            },
            Err(e) => {
                log::warn!("Failed to encode frame {}: {}", frame_id, e);
                self.stats.frames_dropped += 1;
            }
        }

        let suppress =
            !self.pose.has_estimate() && self.options.initial_pose == InitialPose::Suppress;
        if !suppress {
            match self.sender.send_extrinsic(self.pose.current()) {
                Ok(()) => report.extrinsic_sent = true,
                Err(e) => log::warn!("Failed to send extrinsic for frame {}: {}", frame_id, e),
            }
        }
    }

    fn handle_events(&mut self, report: &mut TickReport) {
        for event in self.renderer.poll_events() {
            match event {
                InputEvent::Quit => {
                    log::info!("Quit requested");
                    self.quit = true;
                }
                InputEvent::SaveSnapshot => match self.save_snapshot() {
                    Ok(Some(path)) => {
                        log::info!("Saved snapshot {}", path.display());
                        report.snapshot = Some(path);
                    }
                    Ok(None) => log::info!("No frame captured yet, snapshot skipped"),
                    Err(e) => log::warn!("Failed to save snapshot: {}", e),
                },
                InputEvent::ToggleRecording => self.toggle_recording(),
            }
        }
    }

    fn toggle_recording(&mut self) {
        let result = if self.source.is_recording() {
            self.source.stop_recording()
        } else {
            self.source.start_recording()
        };
        if let Err(e) = result {
            log::warn!("Recording toggle failed: {}", e);
        }
    }

    /// Write the last captured frame as PNG into the snapshot directory
    fn save_snapshot(&mut self) -> Result<Option<PathBuf>> {
        let Some(frame) = &self.last_frame else {
            return Ok(None);
        };
        let png = codec::encode_png(frame)?;
        let path = next_snapshot_path(&self.options.snapshot_dir, &mut self.next_snapshot)?;
        std::fs::write(&path, png)?;
        Ok(Some(path))
    }

    /// Tick until `running` is cleared, a quit event arrives, or `max_ticks` elapse
    ///
    /// Ticks are paced to the configured rate. The transport is closed on
    /// return.
    pub fn run(&mut self, running: &AtomicBool, max_ticks: Option<u64>) -> Result<PipelineStats> {
        log::info!(
            "Pipeline running at {:.1} Hz",
            1.0 / self.options.tick_interval.as_secs_f64()
        );
        let mut ticks = 0u64;

        while running.load(Ordering::Relaxed) && !self.quit {
            if max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }
            let started = Instant::now();
            self.tick();
            ticks += 1;

            if let Some(remaining) = self.options.tick_interval.checked_sub(started.elapsed()) {
                std::thread::sleep(remaining);
            }
        }

        let stats = self.stats;
        let sender = self.sender.stats();
        log::info!(
            "Pipeline stopped after {} ticks: {} transmitted, {} poses, {} misses, {} capture failures, {} send failures",
            stats.ticks,
            stats.transmitted,
            stats.pose_updates,
            stats.no_marker + stats.solve_failures,
            stats.capture_failures,
            sender.send_failures
        );
        self.sender.close()?;
        Ok(stats)
    }
}

/// First unused `snapshot-NNNNN.png` at or after `*next`
fn next_snapshot_path(dir: &Path, next: &mut u32) -> Result<PathBuf> {
    while *next <= MAX_SNAPSHOT_INDEX {
        let path = dir.join(format!("snapshot-{:05}.png", *next));
        *next += 1;
        if !path.exists() {
            return Ok(path);
        }
    }
    Err(crate::error::Error::Other(format!(
        "no free snapshot name in {}",
        dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_default_config() {
        let options = PipelineOptions::from_config(&AppConfig::default(), 42.0);
        assert_eq!(options.jpeg_quality, 70);
        assert_eq!(options.init_repeat, 5);
        assert_eq!(options.init_interval, Duration::from_millis(100));
        assert_eq!(options.init.vertical_fov_deg, 42.0);
        assert_eq!(options.selection, MarkerSelection::LowestId);
    }

    #[test]
    fn test_fov_override() {
        let mut config = AppConfig::default();
        config.camera.vertical_fov_deg = Some(60.0);
        let options = PipelineOptions::from_config(&config, 42.0);
        assert_eq!(options.init.vertical_fov_deg, 60.0);
    }

    #[test]
    fn test_unrepresentable_tick_rate_falls_back() {
        let mut config = AppConfig::default();
        for rate in [1e-300, 0.0, -1.0, f64::NAN] {
            config.pipeline.tick_rate_hz = rate;
            let options = PipelineOptions::from_config(&config, 42.0);
            assert_eq!(options.tick_interval, Duration::from_secs_f64(1.0 / 30.0));
        }
        config.pipeline.tick_rate_hz = 10.0;
        let options = PipelineOptions::from_config(&config, 42.0);
        assert_eq!(options.tick_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_snapshot_names_skip_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("snapshot-00000.png"), b"x").unwrap();

        let mut next = 0;
        let first = next_snapshot_path(dir.path(), &mut next).unwrap();
        assert_eq!(first.file_name().unwrap(), "snapshot-00001.png");
        let second = next_snapshot_path(dir.path(), &mut next).unwrap();
        assert_eq!(second.file_name().unwrap(), "snapshot-00002.png");
    }
}
