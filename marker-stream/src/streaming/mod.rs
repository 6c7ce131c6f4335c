//! Stream sender for frames, INIT parameters and poses
//!
//! - [`StreamSender`]: Owns the transport and turns frames and poses into
//!   protocol datagrams

mod sender;

pub use sender::{SenderStats, StreamSender};
