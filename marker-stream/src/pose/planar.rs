//! Planar pose solver
//!
//! Solves the pose of points lying on Z = 0 in three steps:
//!
//! 1. Normalized DLT homography from marker plane to image
//! 2. Decomposition `K⁻¹H ∝ [r1 r2 t]`, projected onto SO(3)
//! 3. Gauss-Newton refinement of the reprojection error over (R, t)
//!
//! The linear estimate alone is exact for noise-free input; the refinement
//! pulls noisy corners back to the pose minimizing pixel error.

use super::homography::dlt_homography;
use super::{reprojection_error, PoseSolver};
use crate::core::types::{CameraIntrinsics, Point2, Point3, PoseEstimate};
use crate::error::{Error, Result};
use nalgebra::{Matrix2x3, Matrix3, Matrix6, Rotation3, SMatrix, Vector2, Vector3, Vector6};

/// Relative tolerance for "lies on Z = 0"
const PLANE_TOLERANCE: f64 = 1e-9;

/// Gauss-Newton iterations after the linear estimate
const DEFAULT_REFINE_ITERATIONS: usize = 10;

/// Pose solver for planar targets such as printed markers
#[derive(Debug, Clone)]
pub struct PlanarPoseSolver {
    intrinsics: CameraIntrinsics,
    object_points: Vec<Point3>,
    max_reprojection_error_px: f64,
    refine_iterations: usize,
}

impl PlanarPoseSolver {
    pub fn new(intrinsics: CameraIntrinsics, max_reprojection_error_px: f64) -> Self {
        Self {
            intrinsics,
            object_points: Vec::new(),
            max_reprojection_error_px,
            refine_iterations: DEFAULT_REFINE_ITERATIONS,
        }
    }

    /// Set the number of refinement iterations (0 disables refinement)
    pub fn with_refine_iterations(mut self, iterations: usize) -> Self {
        self.refine_iterations = iterations;
        self
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    pub fn object_points(&self) -> &[Point3] {
        &self.object_points
    }

    fn calibration_inverse(&self) -> Result<Matrix3<f64>> {
        let k = &self.intrinsics;
        if !(k.focal.is_finite() && k.focal > 0.0 && k.u0.is_finite() && k.v0.is_finite()) {
            return Err(Error::PoseSolve(format!(
                "invalid intrinsics f={} u0={} v0={}",
                k.focal, k.u0, k.v0
            )));
        }
        k.matrix()
            .try_inverse()
            .ok_or_else(|| Error::PoseSolve("intrinsics matrix is singular".to_string()))
    }

    /// Linear pose from a plane-to-image homography
    fn decompose(&self, h: &Matrix3<f64>) -> Result<PoseEstimate> {
        let degenerate = || Error::PoseSolve("degenerate homography".to_string());
        let k_inv = self.calibration_inverse()?;

        let b1 = k_inv * h.column(0);
        let b2 = k_inv * h.column(1);
        let b3 = k_inv * h.column(2);

        let (n1, n2) = (b1.norm(), b2.norm());
        if n1 <= 1e-12 || n2 <= 1e-12 {
            return Err(degenerate());
        }
        let lambda = 2.0 / (n1 + n2);

        let mut r1 = b1 * lambda;
        let mut r2 = b2 * lambda;
        let mut t = b3 * lambda;
        // Marker must be in front of the camera
        if t.z < 0.0 {
            r1 = -r1;
            r2 = -r2;
            t = -t;
        }
        let r3 = r1.cross(&r2);
        if r3.norm() <= 1e-12 {
            return Err(degenerate());
        }

        let r = Matrix3::from_columns(&[r1, r2, r3]);
        let svd = r.svd(true, true);
        let u = svd.u.ok_or_else(degenerate)?;
        let v_t = svd.v_t.ok_or_else(degenerate)?;
        let mut rotation = u * v_t;
        if rotation.determinant() < 0.0 {
            let mut u_flipped = u;
            u_flipped.column_mut(2).neg_mut();
            rotation = u_flipped * v_t;
        }

        Ok(PoseEstimate::new(rotation, t))
    }

    /// Gauss-Newton with Levenberg damping on pixel residuals
    ///
    /// Rotation updates are applied on the left: `R ← exp(δω)·R`.
    fn refine(&self, initial: PoseEstimate, image_points: &[Point2]) -> PoseEstimate {
        let k = &self.intrinsics;
        let mut pose = initial;
        let mut cost = self.cost(&pose, image_points);
        let mut damping = 1e-6;

        for _ in 0..self.refine_iterations {
            if cost <= 1e-18 {
                break;
            }
            let mut jtj = Matrix6::<f64>::zeros();
            let mut jtr = Vector6::<f64>::zeros();

            for (object, image) in self.object_points.iter().zip(image_points) {
                let rx = pose.rotation * object.coords;
                let pc = rx + pose.translation;
                if pc.z <= f64::EPSILON {
                    return pose;
                }
                let iz = 1.0 / pc.z;
                let residual = Vector2::new(
                    k.focal * pc.x * iz + k.u0 - image.x,
                    k.focal * pc.y * iz + k.v0 - image.y,
                );
                let d_proj = Matrix2x3::new(
                    k.focal * iz, 0.0, -k.focal * pc.x * iz * iz, //
                    0.0, k.focal * iz, -k.focal * pc.y * iz * iz,
                );
                let mut j = SMatrix::<f64, 2, 6>::zeros();
                j.fixed_view_mut::<2, 3>(0, 0)
                    .copy_from(&(d_proj * -rx.cross_matrix()));
                j.fixed_view_mut::<2, 3>(0, 3).copy_from(&d_proj);

                jtj += j.transpose() * j;
                jtr += j.transpose() * residual;
            }

            let system = jtj + Matrix6::identity() * damping;
            let Some(step) = system.cholesky().map(|c| c.solve(&-jtr)) else {
                break;
            };

            let d_rot = Vector3::new(step[0], step[1], step[2]);
            let d_trans = Vector3::new(step[3], step[4], step[5]);
            let candidate = PoseEstimate::new(
                Rotation3::new(d_rot).into_inner() * pose.rotation,
                pose.translation + d_trans,
            );
            let candidate_cost = self.cost(&candidate, image_points);

            if candidate_cost < cost {
                pose = candidate;
                cost = candidate_cost;
                damping = (damping * 0.1).max(1e-12);
                if step.norm() < 1e-12 {
                    break;
                }
            } else {
                damping *= 10.0;
            }
        }
        pose
    }

    fn cost(&self, pose: &PoseEstimate, image_points: &[Point2]) -> f64 {
        reprojection_error(&self.intrinsics, pose, &self.object_points, image_points)
    }
}

impl PoseSolver for PlanarPoseSolver {
    fn set_object_points(&mut self, points: &[Point3]) -> Result<()> {
        if points.len() < 4 {
            return Err(Error::PoseSolve(format!(
                "need at least 4 object points, got {}",
                points.len()
            )));
        }
        if points.iter().any(|p| !p.coords.iter().all(|v| v.is_finite())) {
            return Err(Error::PoseSolve("object points must be finite".to_string()));
        }
        let extent = points
            .iter()
            .map(|p| p.coords.amax())
            .fold(0.0f64, f64::max)
            .max(1.0);
        if points.iter().any(|p| p.z.abs() > PLANE_TOLERANCE * extent) {
            return Err(Error::PoseSolve(
                "planar solver needs object points on Z = 0".to_string(),
            ));
        }
        self.object_points = points.to_vec();
        Ok(())
    }

    fn solve(&self, image_points: &[Point2]) -> Result<PoseEstimate> {
        if self.object_points.is_empty() {
            return Err(Error::PoseSolve("object points not registered".to_string()));
        }
        if image_points.len() != self.object_points.len() {
            return Err(Error::PoseSolve(format!(
                "expected {} image points, got {}",
                self.object_points.len(),
                image_points.len()
            )));
        }
        if image_points.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(Error::PoseSolve("image points must be finite".to_string()));
        }

        let plane: Vec<Point2> = self
            .object_points
            .iter()
            .map(|p| Point2::new(p.x, p.y))
            .collect();
        let h = dlt_homography(&plane, image_points)?;
        let linear = self.decompose(&h)?;
        let pose = self.refine(linear, image_points);

        let error = self.cost(&pose, image_points);
        if !error.is_finite() {
            return Err(Error::PoseSolve(
                "solution places marker behind the camera".to_string(),
            ));
        }
        if error > self.max_reprojection_error_px {
            return Err(Error::PoseSolve(format!(
                "reprojection error {:.2} px exceeds {:.2} px",
                error, self.max_reprojection_error_px
            )));
        }
        Ok(pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{marker_object_points, project_point};
    use approx::assert_relative_eq;

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::centered(700.0, 1280, 720)
    }

    fn solver() -> PlanarPoseSolver {
        let mut solver = PlanarPoseSolver::new(intrinsics(), 8.0);
        solver.set_object_points(&marker_object_points(9.3)).unwrap();
        solver
    }

    fn synthetic_pose() -> PoseEstimate {
        let rotation = Rotation3::from_euler_angles(0.35, -0.25, 0.6).into_inner();
        PoseEstimate::new(rotation, Vector3::new(2.0, -1.5, 45.0))
    }

    fn project_all(pose: &PoseEstimate) -> Vec<Point2> {
        marker_object_points(9.3)
            .iter()
            .map(|p| project_point(&intrinsics(), pose, p).unwrap())
            .collect()
    }

    #[test]
    fn test_exact_corners_recover_pose() {
        let truth = synthetic_pose();
        let image = project_all(&truth);
        let pose = solver().solve(&image).unwrap();

        assert_relative_eq!(pose.rotation, truth.rotation, epsilon = 1e-6);
        assert_relative_eq!(pose.translation, truth.translation, epsilon = 1e-4);
        let err = reprojection_error(&intrinsics(), &pose, &marker_object_points(9.3), &image);
        assert!(err < 1e-6, "error {}", err);
        assert_relative_eq!(pose.rotation.determinant(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_noisy_corners_under_one_pixel() {
        let truth = synthetic_pose();
        let offsets = [(0.4, -0.3), (-0.5, 0.2), (0.3, 0.5), (-0.2, -0.4)];
        let image: Vec<Point2> = project_all(&truth)
            .iter()
            .zip(offsets)
            .map(|(p, (dx, dy))| Point2::new(p.x + dx, p.y + dy))
            .collect();

        let pose = solver().solve(&image).unwrap();
        let err = reprojection_error(&intrinsics(), &pose, &marker_object_points(9.3), &image);
        assert!(err < 1.0, "error {}", err);
        assert!(pose.translation.z > 0.0);
    }

    #[test]
    fn test_refinement_does_not_increase_error() {
        let truth = synthetic_pose();
        let offsets = [(1.5, -2.0), (-2.0, 1.0), (2.0, 2.0), (-1.5, -1.5)];
        let image: Vec<Point2> = project_all(&truth)
            .iter()
            .zip(offsets)
            .map(|(p, (dx, dy))| Point2::new(p.x + dx, p.y + dy))
            .collect();

        let linear_only = solver().with_refine_iterations(0).solve(&image).unwrap();
        let refined = solver().solve(&image).unwrap();
        let object = marker_object_points(9.3);
        let k = intrinsics();
        assert!(
            reprojection_error(&k, &refined, &object, &image)
                <= reprojection_error(&k, &linear_only, &object, &image) + 1e-12
        );
    }

    #[test]
    fn test_error_threshold_rejects() {
        let truth = synthetic_pose();
        let offsets = [(1.5, -2.0), (-2.0, 1.0), (2.0, 2.0), (-1.5, -1.5)];
        let image: Vec<Point2> = project_all(&truth)
            .iter()
            .zip(offsets)
            .map(|(p, (dx, dy))| Point2::new(p.x + dx, p.y + dy))
            .collect();

        let mut strict = PlanarPoseSolver::new(intrinsics(), 0.01);
        strict.set_object_points(&marker_object_points(9.3)).unwrap();
        assert!(matches!(strict.solve(&image), Err(Error::PoseSolve(_))));
    }

    #[test]
    fn test_rejects_bad_input() {
        let s = solver();
        let collinear = [
            Point2::new(100.0, 100.0),
            Point2::new(200.0, 200.0),
            Point2::new(300.0, 300.0),
            Point2::new(400.0, 400.0),
        ];
        assert!(s.solve(&collinear).is_err());
        assert!(s.solve(&collinear[..3]).is_err());

        let mut nan = project_all(&synthetic_pose());
        nan[1].x = f64::NAN;
        assert!(s.solve(&nan).is_err());

        let unregistered = PlanarPoseSolver::new(intrinsics(), 8.0);
        assert!(unregistered.solve(&project_all(&synthetic_pose())).is_err());
    }

    #[test]
    fn test_rejects_non_planar_object_points() {
        let mut s = PlanarPoseSolver::new(intrinsics(), 8.0);
        let mut pts = marker_object_points(9.3).to_vec();
        pts[2].z = 1.0;
        assert!(s.set_object_points(&pts).is_err());
        assert!(s.set_object_points(&pts[..3]).is_err());
    }

    #[test]
    fn test_invalid_intrinsics() {
        let mut s = PlanarPoseSolver::new(CameraIntrinsics::new(0.0, 640.0, 360.0), 8.0);
        s.set_object_points(&marker_object_points(9.3)).unwrap();
        let image = project_all(&synthetic_pose());
        assert!(s.solve(&image).is_err());
    }
}
