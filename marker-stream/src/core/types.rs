//! Core data types for frames, markers and poses.
//!
//! Key types:
//! - [`Frame`]: One captured RGB image, validated against its dimensions
//! - [`MarkerObservation`]: Detector output for one tick
//! - [`PoseEstimate`]: Marker pose in camera coordinates (`x_cam = R·X + t`)
//! - [`CameraIntrinsics`]: Pinhole focal length and principal point

use crate::error::{Error, Result};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Image-space point (pixels)
pub type Point2 = nalgebra::Point2<f64>;

/// Marker-space point
pub type Point3 = nalgebra::Point3<f64>;

/// Color channels per pixel (RGB8)
pub const FRAME_CHANNELS: usize = 3;

/// One captured image: RGB8, row-major, one byte per channel
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a pixel buffer, checking `data.len() == width * height * 3`
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * FRAME_CHANNELS;
        if width == 0 || height == 0 {
            return Err(Error::CaptureFailed(format!(
                "frame has zero dimension {}x{}",
                width, height
            )));
        }
        if data.len() != expected {
            return Err(Error::CaptureFailed(format!(
                "frame buffer is {} bytes, expected {} for {}x{}x{}",
                data.len(),
                expected,
                width,
                height,
                FRAME_CHANNELS
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame filled with a single color
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * FRAME_CHANNELS);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw pixel bytes
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel bytes (length is fixed)
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// A single detected marker with its four ordered corners
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedMarker {
    pub id: i32,
    pub corners: [Point2; 4],
}

/// Detector output for one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerObservation {
    pub markers: Vec<DetectedMarker>,
}

impl MarkerObservation {
    /// Observation with no markers
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from index-aligned corner and id lists
    ///
    /// Mirrors the detector contract where `ids` may be absent. Entries past
    /// the shorter of the two lists are dropped.
    pub fn from_parts(corners: Vec<[Point2; 4]>, ids: Option<Vec<i32>>) -> Self {
        let Some(ids) = ids else {
            return Self::empty();
        };
        let markers = corners
            .into_iter()
            .zip(ids)
            .map(|(corners, id)| DetectedMarker { id, corners })
            .collect();
        Self { markers }
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Pick the marker the pipeline tracks
    pub fn select(&self, selection: MarkerSelection) -> Option<&DetectedMarker> {
        match selection {
            MarkerSelection::LowestId => self.markers.iter().min_by_key(|m| m.id),
            MarkerSelection::Id(id) => self.markers.iter().find(|m| m.id == id),
        }
    }
}

/// Which marker to track when several are visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerSelection {
    /// Smallest marker id in the observation
    #[default]
    LowestId,
    /// A specific marker id; other markers are ignored
    Id(i32),
}

/// Camera pose relative to the marker: `x_cam = rotation * x_marker + translation`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl PoseEstimate {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Identity rotation, zero translation
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Camera center expressed in marker coordinates (`-Rᵀ·t`)
    pub fn camera_position(&self) -> Vector3<f64> {
        -(self.rotation.transpose() * self.translation)
    }

    /// Homogeneous light position placed at the camera center
    pub fn light_position(&self) -> [f32; 4] {
        let c = self.camera_position();
        [c.x as f32, c.y as f32, c.z as f32, 1.0]
    }

    /// Column-major 4x4 view transform `[R t; 0 0 0 1]`
    pub fn view_matrix(&self) -> ViewMatrix {
        let r = &self.rotation;
        let t = &self.translation;
        let mut m = [0.0f32; 16];
        for col in 0..3 {
            for row in 0..3 {
                m[col * 4 + row] = r[(row, col)] as f32;
            }
        }
        m[12] = t.x as f32;
        m[13] = t.y as f32;
        m[14] = t.z as f32;
        m[15] = 1.0;
        ViewMatrix(m)
    }

    /// Rotation (row-major) followed by translation, as sent on the wire
    pub fn to_wire(&self) -> [f32; 12] {
        let mut out = [0.0f32; 12];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = self.rotation[(row, col)] as f32;
            }
        }
        out[9] = self.translation.x as f32;
        out[10] = self.translation.y as f32;
        out[11] = self.translation.z as f32;
        out
    }
}

impl Default for PoseEstimate {
    fn default() -> Self {
        Self::identity()
    }
}

/// Column-major 4x4 view transform consumed by the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewMatrix(pub [f32; 16]);

/// Pinhole intrinsics with square pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length in pixels (fx = fy)
    pub focal: f64,
    /// Principal point x
    pub u0: f64,
    /// Principal point y
    pub v0: f64,
}

impl CameraIntrinsics {
    pub fn new(focal: f64, u0: f64, v0: f64) -> Self {
        Self { focal, u0, v0 }
    }

    /// Principal point at the image center
    pub fn centered(focal: f64, width: u32, height: u32) -> Self {
        Self::new(focal, width as f64 / 2.0, height as f64 / 2.0)
    }

    /// Calibration matrix K
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focal, 0.0, self.u0, //
            0.0, self.focal, self.v0, //
            0.0, 0.0, 1.0,
        )
    }

    /// Vertical field of view in degrees for an image of `height` pixels
    pub fn vertical_fov_deg(&self, height: u32) -> f64 {
        (2.0 * ((height as f64 / 2.0) / self.focal).atan()).to_degrees()
    }
}

/// Input events reported by the window collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Quit key or window close
    Quit,
    /// Save the current frame as an image file
    SaveSnapshot,
    /// Start or stop device recording
    ToggleRecording,
}
