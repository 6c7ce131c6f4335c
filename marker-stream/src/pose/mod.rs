//! Camera pose from marker corner correspondences
//!
//! - [`PoseSolver`]: Solver contract consumed by the pipeline
//! - [`PlanarPoseSolver`]: Homography decomposition with Gauss-Newton refinement
//!
//! Poses follow the `x_cam = R·X_marker + t` convention with a pinhole
//! camera (fx = fy, principal point `(u0, v0)`, no distortion).

pub mod homography;
pub mod planar;

pub use planar::PlanarPoseSolver;

use crate::core::types::{CameraIntrinsics, Point2, Point3, PoseEstimate};
use crate::error::Result;

/// Solves the pose of a rigid set of registered points
pub trait PoseSolver {
    /// Register the ordered marker-space points (at least 4)
    fn set_object_points(&mut self, points: &[Point3]) -> Result<()>;

    /// Pose whose projection of the registered points matches `image_points`
    ///
    /// Fails with [`crate::Error::PoseSolve`] for degenerate input or a poor fit.
    fn solve(&self, image_points: &[Point2]) -> Result<PoseEstimate>;
}

/// Corners of a square marker of side `size`, centered on the origin in Z = 0
///
/// Ordered top-left, top-right, bottom-right, bottom-left, matching the
/// corner order reported by the detector.
pub fn marker_object_points(size: f64) -> [Point3; 4] {
    let h = size / 2.0;
    [
        Point3::new(-h, h, 0.0),
        Point3::new(h, h, 0.0),
        Point3::new(h, -h, 0.0),
        Point3::new(-h, -h, 0.0),
    ]
}

/// Project a marker-space point to pixels; `None` when it is not in front of the camera
pub fn project_point(k: &CameraIntrinsics, pose: &PoseEstimate, point: &Point3) -> Option<Point2> {
    let pc = pose.rotation * point.coords + pose.translation;
    if pc.z <= f64::EPSILON {
        return None;
    }
    Some(Point2::new(
        k.focal * pc.x / pc.z + k.u0,
        k.focal * pc.y / pc.z + k.v0,
    ))
}

/// RMS reprojection error in pixels
///
/// Infinite when a point projects behind the camera or the inputs are empty
/// or of different lengths.
pub fn reprojection_error(
    k: &CameraIntrinsics,
    pose: &PoseEstimate,
    object_points: &[Point3],
    image_points: &[Point2],
) -> f64 {
    if object_points.is_empty() || object_points.len() != image_points.len() {
        return f64::INFINITY;
    }
    let mut sum_sq = 0.0;
    for (object, image) in object_points.iter().zip(image_points) {
        match project_point(k, pose, object) {
            Some(projected) => sum_sq += (projected - image).norm_squared(),
            None => return f64::INFINITY,
        }
    }
    (sum_sq / object_points.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Vector3};

    #[test]
    fn test_marker_points_order() {
        let pts = marker_object_points(9.3);
        assert_relative_eq!(pts[0].x, -4.65);
        assert_relative_eq!(pts[0].y, 4.65);
        assert_relative_eq!(pts[2].x, 4.65);
        assert_relative_eq!(pts[2].y, -4.65);
        assert!(pts.iter().all(|p| p.z == 0.0));
    }

    #[test]
    fn test_project_center() {
        let k = CameraIntrinsics::new(700.0, 640.0, 360.0);
        let pose = PoseEstimate::new(Matrix3::identity(), Vector3::new(0.0, 0.0, 50.0));
        let p = project_point(&k, &pose, &Point3::origin()).unwrap();
        assert_relative_eq!(p.x, 640.0);
        assert_relative_eq!(p.y, 360.0);

        let q = project_point(&k, &pose, &Point3::new(5.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(q.x, 640.0 + 70.0);
    }

    #[test]
    fn test_behind_camera() {
        let k = CameraIntrinsics::new(700.0, 640.0, 360.0);
        let pose = PoseEstimate::new(Matrix3::identity(), Vector3::new(0.0, 0.0, -5.0));
        let pts = marker_object_points(1.0);
        assert!(project_point(&k, &pose, &pts[0]).is_none());
        let image = [Point2::origin(); 4];
        assert!(reprojection_error(&k, &pose, &pts, &image).is_infinite());
    }
}
