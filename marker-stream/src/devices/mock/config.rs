//! Simulation configuration
//!
//! ```toml
//! [simulation]
//! seed = 42                  # 0 = random each run
//! marker_id = 0
//! orbit_distance = 45.0      # marker units
//! orbit_tilt_deg = 25.0
//! orbit_speed_deg = 1.0      # azimuth step per captured frame
//! corner_noise_px = 0.3
//! detection_miss_rate = 0.05
//! capture_failure_rate = 0.0
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Synthetic scene and simulated device parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Noise seed; 0 draws from entropy
    pub seed: u64,
    /// Id reported for the simulated marker
    pub marker_id: i32,
    /// Camera distance from the marker center
    pub orbit_distance: f64,
    /// Angle between the viewing direction and the marker normal (degrees)
    pub orbit_tilt_deg: f64,
    /// Azimuth advance per captured frame (degrees)
    pub orbit_speed_deg: f64,
    /// Standard deviation of detected corner positions (pixels)
    pub corner_noise_px: f64,
    /// Probability that a frame yields no detection
    pub detection_miss_rate: f32,
    /// Probability that a capture fails
    pub capture_failure_rate: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            marker_id: 0,
            orbit_distance: 45.0,
            orbit_tilt_deg: 25.0,
            orbit_speed_deg: 1.0,
            corner_noise_px: 0.3,
            detection_miss_rate: 0.05,
            capture_failure_rate: 0.0,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.orbit_distance > 0.0) {
            return Err(Error::Config(format!(
                "orbit_distance must be positive, got {}",
                self.orbit_distance
            )));
        }
        // Near 90° the camera looks along the marker plane
        if !(0.0..80.0).contains(&self.orbit_tilt_deg) {
            return Err(Error::Config(format!(
                "orbit_tilt_deg must be in [0, 80), got {}",
                self.orbit_tilt_deg
            )));
        }
        if !(self.corner_noise_px >= 0.0) {
            return Err(Error::Config("corner_noise_px must be >= 0".to_string()));
        }
        for (name, rate) in [
            ("detection_miss_rate", self.detection_miss_rate),
            ("capture_failure_rate", self.capture_failure_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(Error::Config(format!(
                    "{} must be in [0, 1], got {}",
                    name, rate
                )));
            }
        }
        Ok(())
    }
}
