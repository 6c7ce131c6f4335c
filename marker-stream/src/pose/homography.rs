//! Plane-to-image homography by normalized DLT
//!
//! Points on both sides are shifted to zero mean and scaled to an average
//! distance of √2 before building the design matrix, then the solution is
//! mapped back.

use crate::core::types::Point2;
use crate::error::{Error, Result};
use nalgebra::{DMatrix, Matrix3};

/// Smallest normalized triangle area accepted as non-collinear
const MIN_NORMALIZED_AREA: f64 = 1e-6;

/// Normalize points to zero mean and mean distance √2
///
/// Returns the normalized points and the similarity transform applied.
fn normalize_points(points: &[Point2]) -> Option<(Vec<Point2>, Matrix3<f64>)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (sx / n, sy / n);

    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !mean_dist.is_finite() || mean_dist <= f64::EPSILON {
        return None;
    }

    let scale = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(
        scale, 0.0, -scale * cx, //
        0.0, scale, -scale * cy, //
        0.0, 0.0, 1.0,
    );
    let normalized = points
        .iter()
        .map(|p| Point2::new(scale * (p.x - cx), scale * (p.y - cy)))
        .collect();
    Some((normalized, t))
}

/// Whether normalized points span a plane (some triangle has real area)
fn spans_plane(points: &[Point2]) -> bool {
    let n = points.len();
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                let (a, b, c) = (points[i], points[j], points[k]);
                let area = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
                if area.abs() > MIN_NORMALIZED_AREA {
                    return true;
                }
            }
        }
    }
    false
}

/// Estimate `H` with `image ~ H · [x, y, 1]ᵀ` for planar points `plane`
///
/// The result is scaled so `H[(2, 2)] == 1` when that entry is non-zero.
pub fn dlt_homography(plane: &[Point2], image: &[Point2]) -> Result<Matrix3<f64>> {
    let n = plane.len();
    if n < 4 || image.len() != n {
        return Err(Error::PoseSolve(format!(
            "need at least 4 matching correspondences, got {} plane / {} image",
            n,
            image.len()
        )));
    }

    let degenerate = || Error::PoseSolve("degenerate point configuration".to_string());
    let (plane_n, t_plane) = normalize_points(plane).ok_or_else(degenerate)?;
    let (image_n, t_image) = normalize_points(image).ok_or_else(degenerate)?;
    if !spans_plane(&plane_n) || !spans_plane(&image_n) {
        return Err(Error::PoseSolve("correspondences are collinear".to_string()));
    }

    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for (i, (p, q)) in plane_n.iter().zip(&image_n).enumerate() {
        let (x, y, u, v) = (p.x, p.y, q.x, q.y);
        let r0 = 2 * i;
        let r1 = r0 + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    // Four points give 8 rows; pad to square so V is full 9x9
    if a.nrows() < a.ncols() {
        a = a.resize_vertically(9, 0.0);
    }

    let svd = a.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| Error::PoseSolve("homography SVD failed".to_string()))?;
    let null_index = svd.singular_values.imin();
    let h = v_t.row(null_index);

    let mut h_norm = Matrix3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            h_norm[(r, c)] = h[3 * r + c];
        }
    }
    if h_norm.determinant().abs() <= 1e-12 {
        return Err(Error::PoseSolve("homography is singular".to_string()));
    }

    let t_image_inv = t_image
        .try_inverse()
        .ok_or_else(|| Error::PoseSolve("normalization not invertible".to_string()))?;
    let mut h_mat = t_image_inv * h_norm * t_plane;

    let scale = h_mat[(2, 2)];
    if scale.abs() > f64::EPSILON {
        h_mat /= scale;
    }
    if h_mat.iter().any(|v| !v.is_finite()) {
        return Err(Error::PoseSolve("homography is not finite".to_string()));
    }
    Ok(h_mat)
}
