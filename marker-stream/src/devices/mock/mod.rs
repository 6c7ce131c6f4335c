//! Simulated devices for hardware-free runs and tests
//!
//! A [`SyntheticScene`] holds one square marker and a camera orbiting it.
//! The devices share the scene the way a real camera and detector share the
//! physical world:
//!
//! | Device | Behavior |
//! |--------|----------|
//! | [`SimulatedCamera`] | Advances the orbit each capture and renders the marker |
//! | [`SimulatedDetector`] | Projects the marker corners for the current pose, adds pixel noise |
//! | [`LogRenderer`] | Logs view matrices; input events are queued programmatically |
//!
//! ```text
//! SimulatedCamera ──writes pose──▶ SyntheticScene ◀──reads pose── SimulatedDetector
//! ```
//!
//! All randomness comes from [`NoiseGenerator`] seeded by `[simulation] seed`.

pub mod config;
mod camera;
mod detector;
mod noise;
mod renderer;
mod scene;

pub use camera::SimulatedCamera;
pub use config::SimulationConfig;
pub use detector::SimulatedDetector;
pub use noise::NoiseGenerator;
pub use renderer::LogRenderer;
pub use scene::{orbit_pose, SceneState, SyntheticScene};
