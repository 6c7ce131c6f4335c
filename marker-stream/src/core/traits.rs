//! Collaborator traits consumed by the pipeline
//!
//! The camera, the marker detector and the renderer/window are external to
//! the tracking core. The pipeline only talks to them through these traits,
//! so simulated devices and test doubles plug in the same way real ones do.

use crate::core::types::{Frame, InputEvent, MarkerObservation, ViewMatrix};
use crate::error::{Error, Result};

/// Camera or video source producing fixed-size RGB frames
pub trait FrameSource {
    /// Capture one frame, blocking until it is available
    ///
    /// An `Err` is a transient capture failure: the pipeline skips the tick
    /// and retries on the next one.
    fn capture(&mut self) -> Result<Frame>;

    /// Vertical field of view in degrees (sent once in the INIT burst)
    fn vertical_fov_deg(&self) -> f32;

    /// Start recording the captured stream on the device
    fn start_recording(&mut self) -> Result<()> {
        Err(Error::NotSupported("recording".to_string()))
    }

    /// Stop recording
    fn stop_recording(&mut self) -> Result<()> {
        Err(Error::NotSupported("recording".to_string()))
    }

    /// Whether the device is currently recording
    fn is_recording(&self) -> bool {
        false
    }
}

/// Marker detector
pub trait MarkerDetector {
    /// Detect markers in a frame
    ///
    /// Returning an empty observation is the normal "untracked" state and
    /// not an error.
    fn detect(&mut self, frame: &Frame) -> Result<MarkerObservation>;
}

/// Scene renderer and window/input collaborator
pub trait SceneRenderer {
    /// Draw the scene with a column-major 4x4 view transform and an optional
    /// homogeneous light position
    fn render(&mut self, view: &ViewMatrix, light_position: Option<[f32; 4]>);

    /// Drain pending input events (keyboard, window close)
    fn poll_events(&mut self) -> Vec<InputEvent> {
        Vec::new()
    }
}
