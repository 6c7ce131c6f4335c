//! Cross-tick state and per-tick reports

use crate::core::types::PoseEstimate;
use crate::protocol::FrameId;
use std::path::PathBuf;

/// Last known pose plus whether any estimate has succeeded yet
///
/// A miss never resets the pose: the previous estimate keeps being streamed
/// until a new one replaces it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseState {
    last: PoseEstimate,
    estimated: bool,
}

impl PoseState {
    /// Identity pose, not yet estimated
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_estimate(&self) -> bool {
        self.estimated
    }

    /// Current pose (identity before the first estimate)
    pub fn current(&self) -> &PoseEstimate {
        &self.last
    }

    pub fn update(&mut self, pose: PoseEstimate) {
        self.last = pose;
        self.estimated = true;
    }
}

/// States visited during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickState {
    Capture,
    Detect,
    NoMarker,
    Estimate,
    UpdateState,
    RetainState,
    Transmit,
}

/// What one call to [`crate::Pipeline::tick`] did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// States in the order visited
    pub path: Vec<TickState>,
    /// Identifier the frame was sent with; `None` when the tick did not transmit
    pub frame_id: Option<FrameId>,
    /// Id of the marker the estimate was attempted on
    pub marker_id: Option<i32>,
    pub pose_updated: bool,
    pub frame_sent: bool,
    pub extrinsic_sent: bool,
    /// Quit event seen; the tick stopped before capture
    pub quit_requested: bool,
    /// Snapshot written during this tick
    pub snapshot: Option<PathBuf>,
}

impl TickReport {
    /// Whether the transmit step ran (the frame id advanced)
    pub fn transmitted(&self) -> bool {
        self.frame_id.is_some()
    }

    pub fn visited(&self, state: TickState) -> bool {
        self.path.contains(&state)
    }
}

/// Counters over the life of a pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub ticks: u64,
    pub transmitted: u64,
    pub capture_failures: u64,
    pub no_marker: u64,
    pub solve_failures: u64,
    pub pose_updates: u64,
    pub frames_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    #[test]
    fn test_pose_state_initial_condition() {
        let state = PoseState::new();
        assert!(!state.has_estimate());
        assert_eq!(*state.current(), PoseEstimate::identity());
    }

    #[test]
    fn test_pose_state_update() {
        let mut state = PoseState::new();
        let pose = PoseEstimate::new(Matrix3::identity(), Vector3::new(0.0, 0.0, 10.0));
        state.update(pose);
        assert!(state.has_estimate());
        assert_eq!(state.current().translation.z, 10.0);
    }
}
