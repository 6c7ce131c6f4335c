//! marker-stream - Fiducial marker pose tracking with UDP streaming
//!
//! Captures frames, detects a planar marker, recovers the camera pose relative
//! to it and streams the current frame plus pose to a remote consumer over UDP.
//!
//! ## Modules
//!
//! - [`core`]: Frame/marker/pose types and the collaborator traits
//! - [`codec`]: Payload encoding (raw, JPEG, PNG, text, JSON)
//! - [`pose`]: Planar pose solver (homography + refinement)
//! - [`protocol`]: Fixed-layout wire packets and frame reassembly
//! - [`transport`]: Datagram transports (UDP, mock)
//! - [`streaming`]: Stream sender (frame chunking, INIT burst, poses)
//! - [`pipeline`]: Per-tick capture → detect → estimate → transmit state machine
//! - [`devices`]: Simulated camera, detector and renderer

pub mod codec;
pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod pipeline;
pub mod pose;
pub mod protocol;
pub mod streaming;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, TickReport};
