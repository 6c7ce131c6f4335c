//! Configuration for the marker-stream daemon
//!
//! Loads configuration from a TOML file. Every section and field has a
//! default, so an empty file (or no file at all) yields a working setup that
//! streams to `127.0.0.1:12345`.
//!
//! ```toml
//! [camera]
//! width = 1280
//! height = 720
//! focal_length = 700.0
//!
//! [marker]
//! size = 9.3
//!
//! [streaming]
//! target_address = "127.0.0.1:12345"
//! jpeg_quality = 70
//! initial_pose = "identity"   # or "suppress"
//! ```

use crate::core::types::{CameraIntrinsics, MarkerSelection};
use crate::devices::mock::config::SimulationConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub marker: MarkerConfig,
    pub streaming: StreamingConfig,
    pub pipeline: PipelineConfig,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

/// Camera geometry and intrinsics
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Focal length in pixels (fx = fy)
    pub focal_length: f64,
    /// Principal point `[u0, v0]`; the image center when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_point: Option<[f64; 2]>,
    /// Vertical field of view sent in INIT; derived from focal length when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_fov_deg: Option<f32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            focal_length: 700.0,
            principal_point: None,
            vertical_fov_deg: None,
        }
    }
}

impl CameraConfig {
    /// Pinhole intrinsics for the pose solver
    pub fn intrinsics(&self) -> CameraIntrinsics {
        match self.principal_point {
            Some([u0, v0]) => CameraIntrinsics::new(self.focal_length, u0, v0),
            None => CameraIntrinsics::centered(self.focal_length, self.width, self.height),
        }
    }
}

/// Marker geometry and selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Side length of the printed square (same units as the streamed translation)
    pub size: f64,
    /// Track only this marker id; the lowest visible id when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_marker_id: Option<i32>,
    /// Solutions with a larger RMS reprojection error are rejected
    pub max_reprojection_error_px: f64,
    /// Pass the camera position to the renderer as a light source
    pub use_lighting: bool,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            size: 9.3,
            target_marker_id: None,
            max_reprojection_error_px: 8.0,
            use_lighting: false,
        }
    }
}

impl MarkerConfig {
    pub fn selection(&self) -> MarkerSelection {
        match self.target_marker_id {
            Some(id) => MarkerSelection::Id(id),
            None => MarkerSelection::LowestId,
        }
    }
}

/// What to transmit as EXTRINSIC before the first successful estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialPose {
    /// Identity rotation and zero translation
    #[default]
    Identity,
    /// No EXTRINSIC packet until a pose has been estimated
    Suppress,
}

/// UDP stream settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Destination of all datagrams (host:port)
    pub target_address: String,
    /// Local bind address; port 0 picks an ephemeral port
    pub bind_address: String,
    /// JPEG quality 1..=100, or 0 to send raw RGB
    pub jpeg_quality: u8,
    /// Number of INIT packets sent at startup
    pub init_repeat: u32,
    /// Pause after each INIT packet (milliseconds)
    pub init_interval_ms: u64,
    pub initial_pose: InitialPose,
    /// Camera-axis remap matrix sent in INIT (row-major)
    pub axis_remap: [[f32; 3]; 3],
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            target_address: "127.0.0.1:12345".to_string(),
            bind_address: "0.0.0.0:0".to_string(),
            jpeg_quality: 70,
            init_repeat: 5,
            init_interval_ms: 100,
            initial_pose: InitialPose::Identity,
            axis_remap: [[0.0, -1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 0.0, -1.0]],
        }
    }
}

impl StreamingConfig {
    /// Axis remap flattened row-major
    pub fn axis_remap_flat(&self) -> [f32; 9] {
        let mut out = [0.0f32; 9];
        for (row, values) in self.axis_remap.iter().enumerate() {
            out[row * 3..row * 3 + 3].copy_from_slice(values);
        }
        out
    }
}

/// Slowest accepted tick rate (one tick per 100 s)
pub const MIN_TICK_RATE_HZ: f64 = 0.01;

/// Fastest accepted tick rate
pub const MAX_TICK_RATE_HZ: f64 = 1000.0;

/// Tick loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target tick rate; the loop sleeps away any remaining budget
    pub tick_rate_hz: f64,
    /// Directory for `snapshot-NNNNN.png` files
    pub snapshot_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30.0,
            snapshot_dir: PathBuf::from("."),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use marker_stream::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("marker-stream.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::Config(format!(
                "camera dimensions must be non-zero, got {}x{}",
                self.camera.width, self.camera.height
            )));
        }
        if !(self.camera.focal_length > 0.0) {
            return Err(Error::Config(format!(
                "focal_length must be positive, got {}",
                self.camera.focal_length
            )));
        }
        if !(self.marker.size > 0.0) {
            return Err(Error::Config(format!(
                "marker size must be positive, got {}",
                self.marker.size
            )));
        }
        if !(self.marker.max_reprojection_error_px > 0.0) {
            return Err(Error::Config(
                "max_reprojection_error_px must be positive".to_string(),
            ));
        }
        if self.streaming.jpeg_quality > crate::codec::MAX_QUALITY {
            return Err(Error::Config(format!(
                "jpeg_quality must be 0..=100, got {}",
                self.streaming.jpeg_quality
            )));
        }
        if self.streaming.init_repeat == 0 {
            return Err(Error::Config("init_repeat must be at least 1".to_string()));
        }
        if !(MIN_TICK_RATE_HZ..=MAX_TICK_RATE_HZ).contains(&self.pipeline.tick_rate_hz) {
            return Err(Error::Config(format!(
                "tick_rate_hz must be {}..={}, got {}",
                MIN_TICK_RATE_HZ, MAX_TICK_RATE_HZ, self.pipeline.tick_rate_hz
            )));
        }
        self.simulation.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.camera.width, 1280);
        assert_eq!(config.camera.height, 720);
        assert_eq!(config.marker.size, 9.3);
        assert_eq!(config.streaming.target_address, "127.0.0.1:12345");
        assert_eq!(config.streaming.jpeg_quality, 70);
        assert_eq!(config.streaming.init_repeat, 5);
        assert_eq!(config.streaming.init_interval_ms, 100);
        assert_eq!(config.streaming.initial_pose, InitialPose::Identity);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_intrinsics_centered() {
        let camera = CameraConfig::default();
        let k = camera.intrinsics();
        assert_eq!(k.focal, 700.0);
        assert_eq!(k.u0, 640.0);
        assert_eq!(k.v0, 360.0);
        // 2 * atan(360 / 700)
        assert_relative_eq!(k.vertical_fov_deg(camera.height), 54.43, epsilon = 0.01);
    }

    #[test]
    fn test_axis_remap_flat() {
        let flat = StreamingConfig::default().axis_remap_flat();
        assert_eq!(
            flat,
            [0.0, -1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, -1.0]
        );
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[marker]"));
        assert!(toml_string.contains("[streaming]"));
        assert!(toml_string.contains("[pipeline]"));
        assert!(toml_string.contains("[simulation]"));
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("target_address = \"127.0.0.1:12345\""));
        assert!(toml_string.contains("initial_pose = \"identity\""));
    }

    #[test]
    fn test_toml_deserialization_partial() {
        let toml_content = r#"
[camera]
width = 640
height = 480
principal_point = [320.5, 240.5]

[marker]
target_marker_id = 7

[streaming]
target_address = "10.0.0.2:9000"
initial_pose = "suppress"

[logging]
level = "debug"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.focal_length, 700.0);
        assert_eq!(config.camera.intrinsics().u0, 320.5);
        assert_eq!(config.marker.selection(), MarkerSelection::Id(7));
        assert_eq!(config.marker.size, 9.3);
        assert_eq!(config.streaming.initial_pose, InitialPose::Suppress);
        assert_eq!(config.streaming.jpeg_quality, 70);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marker-stream.toml");

        let mut config = AppConfig::default();
        config.streaming.jpeg_quality = 0;
        config.marker.use_lighting = true;
        config.to_file(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded.streaming.jpeg_quality, 0);
        assert!(loaded.marker.use_lighting);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.streaming.jpeg_quality = 101;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = AppConfig::default();
        config.streaming.init_repeat = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.camera.height = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.marker.size = -1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.camera.focal_length = f64::NAN;
        assert!(config.validate().is_err());

        for rate in [1e-300, 0.0, -5.0, f64::NAN, f64::INFINITY, 5000.0] {
            let mut config = AppConfig::default();
            config.pipeline.tick_rate_hz = rate;
            assert!(
                matches!(config.validate(), Err(Error::Config(_))),
                "rate {}",
                rate
            );
        }

        let mut config = AppConfig::default();
        config.pipeline.tick_rate_hz = MIN_TICK_RATE_HZ;
        assert!(config.validate().is_ok());
    }
}
