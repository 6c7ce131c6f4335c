//! Shared synthetic scene

use super::config::SimulationConfig;
use crate::core::types::{CameraIntrinsics, Point2, PoseEstimate};
use crate::pose::{marker_object_points, project_point};
use nalgebra::{Matrix3, Vector3};
use std::sync::{Arc, Mutex, MutexGuard};

/// Mutable scene state, advanced by the camera
#[derive(Debug, Clone)]
pub struct SceneState {
    /// Marker pose in camera coordinates for the latest frame
    pub pose: PoseEstimate,
    pub azimuth_deg: f64,
    /// Frames rendered so far
    pub frame_count: u64,
}

/// Marker and camera geometry shared by the simulated devices
#[derive(Clone)]
pub struct SyntheticScene {
    intrinsics: CameraIntrinsics,
    width: u32,
    height: u32,
    marker_size: f64,
    marker_id: i32,
    orbit_distance: f64,
    orbit_tilt_deg: f64,
    orbit_speed_deg: f64,
    state: Arc<Mutex<SceneState>>,
}

impl SyntheticScene {
    pub fn new(
        intrinsics: CameraIntrinsics,
        width: u32,
        height: u32,
        marker_size: f64,
        config: &SimulationConfig,
    ) -> Self {
        let pose = orbit_pose(config.orbit_distance, config.orbit_tilt_deg, 0.0);
        Self {
            intrinsics,
            width,
            height,
            marker_size,
            marker_id: config.marker_id,
            orbit_distance: config.orbit_distance,
            orbit_tilt_deg: config.orbit_tilt_deg,
            orbit_speed_deg: config.orbit_speed_deg,
            state: Arc::new(Mutex::new(SceneState {
                pose,
                azimuth_deg: 0.0,
                frame_count: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SceneState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn marker_id(&self) -> i32 {
        self.marker_id
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SceneState {
        self.lock().clone()
    }

    /// Current marker pose in camera coordinates
    pub fn pose(&self) -> PoseEstimate {
        self.lock().pose
    }

    /// Move the camera one orbit step and return the new pose
    pub fn advance(&self) -> PoseEstimate {
        let mut state = self.lock();
        state.azimuth_deg = (state.azimuth_deg + self.orbit_speed_deg) % 360.0;
        state.pose = orbit_pose(self.orbit_distance, self.orbit_tilt_deg, state.azimuth_deg);
        state.frame_count += 1;
        state.pose
    }

    /// Marker corners in pixels for the current pose
    ///
    /// `None` when a corner is behind the camera or outside the image.
    pub fn projected_corners(&self) -> Option<[Point2; 4]> {
        let pose = self.pose();
        let object = marker_object_points(self.marker_size);
        let mut corners = [Point2::origin(); 4];
        for (corner, point) in corners.iter_mut().zip(object.iter()) {
            let p = project_point(&self.intrinsics, &pose, point)?;
            if p.x < 0.0 || p.y < 0.0 || p.x >= self.width as f64 || p.y >= self.height as f64 {
                return None;
            }
            *corner = p;
        }
        Some(corners)
    }
}

/// Marker pose seen by a camera on an orbit around the marker center
///
/// The camera sits at `distance` from the origin, `tilt_deg` away from the
/// marker's -Z axis, rotated `azimuth_deg` about it, and looks at the origin.
pub fn orbit_pose(distance: f64, tilt_deg: f64, azimuth_deg: f64) -> PoseEstimate {
    let (tilt, azimuth) = (tilt_deg.to_radians(), azimuth_deg.to_radians());
    let center = Vector3::new(
        distance * tilt.sin() * azimuth.cos(),
        distance * tilt.sin() * azimuth.sin(),
        -distance * tilt.cos(),
    );

    // Camera axes in marker coordinates: x right, y down, z forward
    let forward = (-center).normalize();
    let right = Vector3::y().cross(&forward).normalize();
    let down = forward.cross(&right);

    let rotation = Matrix3::from_rows(&[right.transpose(), down.transpose(), forward.transpose()]);
    let translation = -(rotation * center);
    PoseEstimate::new(rotation, translation)
}
