//! Core abstractions for the tracking pipeline.
//!
//! - [`traits`]: Collaborator traits (frame source, detector, renderer)
//! - [`types`]: Frames, marker observations, poses and intrinsics

pub mod traits;
pub mod types;

pub use traits::{FrameSource, MarkerDetector, SceneRenderer};
pub use types::{
    CameraIntrinsics, DetectedMarker, Frame, InputEvent, MarkerObservation, MarkerSelection,
    Point2, Point3, PoseEstimate, ViewMatrix, FRAME_CHANNELS,
};
