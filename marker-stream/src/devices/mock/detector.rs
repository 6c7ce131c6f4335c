//! Simulated marker detector

use super::config::SimulationConfig;
use super::noise::NoiseGenerator;
use super::scene::SyntheticScene;
use crate::core::traits::MarkerDetector;
use crate::core::types::{Frame, MarkerObservation, Point2};
use crate::error::Result;

/// Reports the scene's marker corners with Gaussian pixel noise
///
/// The frame contents are not inspected; corners come from projecting the
/// marker at the scene pose of the latest capture.
pub struct SimulatedDetector {
    scene: SyntheticScene,
    noise: NoiseGenerator,
    corner_noise_px: f64,
    miss_rate: f32,
}

impl SimulatedDetector {
    pub fn new(scene: SyntheticScene, config: &SimulationConfig) -> Self {
        Self {
            scene,
            noise: NoiseGenerator::new(config.seed),
            corner_noise_px: config.corner_noise_px,
            miss_rate: config.detection_miss_rate,
        }
    }
}

impl MarkerDetector for SimulatedDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<MarkerObservation> {
        if self.noise.chance(self.miss_rate) {
            log::trace!("Simulated detector: miss");
            return Ok(MarkerObservation::empty());
        }
        let Some(corners) = self.scene.projected_corners() else {
            return Ok(MarkerObservation::empty());
        };
        let noisy = corners.map(|c| {
            Point2::new(
                c.x + self.noise.gaussian(self.corner_noise_px),
                c.y + self.noise.gaussian(self.corner_noise_px),
            )
        });
        Ok(MarkerObservation::from_parts(
            vec![noisy],
            Some(vec![self.scene.marker_id()]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CameraIntrinsics;

    fn scene(config: &SimulationConfig) -> SyntheticScene {
        SyntheticScene::new(
            CameraIntrinsics::centered(700.0, 1280, 720),
            1280,
            720,
            9.3,
            config,
        )
    }

    #[test]
    fn test_noise_free_detection_matches_projection() {
        let config = SimulationConfig {
            corner_noise_px: 0.0,
            detection_miss_rate: 0.0,
            marker_id: 17,
            ..SimulationConfig::default()
        };
        let scene = scene(&config);
        let mut detector = SimulatedDetector::new(scene.clone(), &config);
        let frame = Frame::filled(4, 4, [0, 0, 0]);

        let obs = detector.detect(&frame).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs.markers[0].id, 17);
        assert_eq!(obs.markers[0].corners, scene.projected_corners().unwrap());
    }

    #[test]
    fn test_miss_rate_one_is_empty() {
        let config = SimulationConfig {
            detection_miss_rate: 1.0,
            ..SimulationConfig::default()
        };
        let mut detector = SimulatedDetector::new(scene(&config), &config);
        let frame = Frame::filled(4, 4, [0, 0, 0]);
        assert!(detector.detect(&frame).unwrap().is_empty());
    }
}
