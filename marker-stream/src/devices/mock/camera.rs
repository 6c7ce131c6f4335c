//! Simulated camera rendering the synthetic marker

use super::config::SimulationConfig;
use super::noise::NoiseGenerator;
use super::scene::SyntheticScene;
use crate::core::traits::FrameSource;
use crate::core::types::{Frame, Point2, FRAME_CHANNELS};
use crate::error::{Error, Result};

const BACKGROUND: [u8; 3] = [128, 128, 128];
const MARKER_BORDER: [u8; 3] = [0, 0, 0];
const MARKER_CENTER: [u8; 3] = [255, 255, 255];

/// Camera on an orbit around the marker
pub struct SimulatedCamera {
    scene: SyntheticScene,
    noise: NoiseGenerator,
    failure_rate: f32,
    recording: bool,
    recorded_frames: u64,
}

impl SimulatedCamera {
    pub fn new(scene: SyntheticScene, config: &SimulationConfig) -> Self {
        Self {
            scene,
            // Offset so camera and detector draw different streams from one seed
            noise: NoiseGenerator::new(config.seed.wrapping_mul(2)),
            failure_rate: config.capture_failure_rate,
            recording: false,
            recorded_frames: 0,
        }
    }

    /// Frames captured while recording was on
    pub fn recorded_frames(&self) -> u64 {
        self.recorded_frames
    }

    fn render(&self) -> Frame {
        let mut frame = Frame::filled(self.scene.width(), self.scene.height(), BACKGROUND);
        if let Some(corners) = self.scene.projected_corners() {
            fill_quad(&mut frame, &corners, MARKER_BORDER);
            // Inner square at half size around the quad's center
            let center = corners
                .iter()
                .fold(Point2::origin(), |acc, c| acc + c.coords / 4.0);
            let inner = corners.map(|c| center + (c - center) * 0.5);
            fill_quad(&mut frame, &inner, MARKER_CENTER);
        }
        frame
    }
}

/// Fill a convex quadrilateral
fn fill_quad(frame: &mut Frame, corners: &[Point2; 4], rgb: [u8; 3]) {
    let (width, height) = (frame.width() as usize, frame.height() as usize);
    let xs = corners.iter().map(|c| c.x);
    let ys = corners.iter().map(|c| c.y);
    let min_x = xs.clone().fold(f64::INFINITY, f64::min).floor().max(0.0) as usize;
    let max_x = xs.fold(f64::NEG_INFINITY, f64::max).ceil().max(0.0) as usize;
    let min_y = ys.clone().fold(f64::INFINITY, f64::min).floor().max(0.0) as usize;
    let max_y = ys.fold(f64::NEG_INFINITY, f64::max).ceil().max(0.0) as usize;

    let data = frame.data_mut();
    for y in min_y..max_y.min(height) {
        for x in min_x..max_x.min(width) {
            let p = Point2::new(x as f64 + 0.5, y as f64 + 0.5);
            if inside_convex(corners, &p) {
                let at = (y * width + x) * FRAME_CHANNELS;
                data[at..at + FRAME_CHANNELS].copy_from_slice(&rgb);
            }
        }
    }
}

/// Point-in-polygon for convex polygons of either winding
fn inside_convex(corners: &[Point2; 4], p: &Point2) -> bool {
    let mut sign = 0.0f64;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
        if cross != 0.0 {
            if sign != 0.0 && cross.signum() != sign {
                return false;
            }
            sign = cross.signum();
        }
    }
    true
}

impl FrameSource for SimulatedCamera {
    fn capture(&mut self) -> Result<Frame> {
        self.scene.advance();
        if self.noise.chance(self.failure_rate) {
            return Err(Error::CaptureFailed("simulated capture dropout".to_string()));
        }
        let frame = self.render();
        if self.recording {
            self.recorded_frames += 1;
        }
        Ok(frame)
    }

    fn vertical_fov_deg(&self) -> f32 {
        self.scene.intrinsics().vertical_fov_deg(self.scene.height()) as f32
    }

    fn start_recording(&mut self) -> Result<()> {
        if !self.recording {
            log::info!("Simulated camera: recording started");
            self.recording = true;
            self.recorded_frames = 0;
        }
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<()> {
        if self.recording {
            log::info!(
                "Simulated camera: recording stopped ({} frames)",
                self.recorded_frames
            );
            self.recording = false;
        }
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CameraIntrinsics;

    fn camera(config: &SimulationConfig) -> SimulatedCamera {
        let scene = SyntheticScene::new(
            CameraIntrinsics::centered(700.0, 320, 240),
            320,
            240,
            9.3,
            config,
        );
        SimulatedCamera::new(scene, config)
    }

    #[test]
    fn test_renders_marker_on_background() {
        let mut cam = camera(&SimulationConfig::default());
        let frame = cam.capture().unwrap();
        assert_eq!(frame.data().len(), 320 * 240 * 3);

        // Marker center is on the optical axis: white inner square
        let center = (120 * 320 + 160) * 3;
        assert_eq!(&frame.data()[center..center + 3], &MARKER_CENTER);
        // Image corner is background
        assert_eq!(&frame.data()[0..3], &BACKGROUND);
        assert!(frame.data().chunks(3).any(|p| p == MARKER_BORDER));
    }

    #[test]
    fn test_failure_rate_one_always_fails() {
        let config = SimulationConfig {
            capture_failure_rate: 1.0,
            ..SimulationConfig::default()
        };
        let mut cam = camera(&config);
        assert!(matches!(cam.capture(), Err(Error::CaptureFailed(_))));
    }

    #[test]
    fn test_recording_counts_frames() {
        let mut cam = camera(&SimulationConfig::default());
        cam.start_recording().unwrap();
        assert!(cam.is_recording());
        cam.capture().unwrap();
        cam.capture().unwrap();
        cam.stop_recording().unwrap();
        cam.capture().unwrap();
        assert_eq!(cam.recorded_frames(), 2);
        assert!(!cam.is_recording());
    }
}
