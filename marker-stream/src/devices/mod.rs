//! Device implementations
//!
//! Only simulated devices ship with the crate; hardware cameras, detectors
//! and renderers plug in through the traits in [`crate::core::traits`].

pub mod mock;

use crate::config::AppConfig;
use crate::core::traits::{FrameSource, MarkerDetector, SceneRenderer};
use crate::error::Result;
use mock::{LogRenderer, SimulatedCamera, SimulatedDetector, SyntheticScene};

/// The three collaborators the pipeline drives
pub struct DeviceSet {
    pub source: Box<dyn FrameSource>,
    pub detector: Box<dyn MarkerDetector>,
    pub renderer: Box<dyn SceneRenderer>,
}

/// Create the simulated camera, detector and renderer sharing one scene
pub fn create_simulated_devices(config: &AppConfig) -> Result<DeviceSet> {
    config.simulation.validate()?;
    let scene = SyntheticScene::new(
        config.camera.intrinsics(),
        config.camera.width,
        config.camera.height,
        config.marker.size,
        &config.simulation,
    );

    log::info!(
        "Simulated devices: {}x{} camera orbiting marker {} at distance {}",
        config.camera.width,
        config.camera.height,
        config.simulation.marker_id,
        config.simulation.orbit_distance
    );

    Ok(DeviceSet {
        source: Box::new(SimulatedCamera::new(scene.clone(), &config.simulation)),
        detector: Box::new(SimulatedDetector::new(scene, &config.simulation)),
        renderer: Box::new(LogRenderer::new()),
    })
}
