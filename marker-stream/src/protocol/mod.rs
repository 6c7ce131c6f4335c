//! Wire protocol for the UDP pose stream
//!
//! Every datagram starts with a 4-byte big-endian kind tag. All integers are
//! big-endian `u32`, all floats big-endian IEEE-754 `f32`.
//!
//! ```text
//! FRAME header   [kind=1][frame_id][packet_count]                 12 bytes
//! FRAME chunk    [kind=1][frame_id][sequence][payload 1..=1200]   13..=1212 bytes
//! INIT           [kind=2][remap 3x3 row-major][vertical fov]      44 bytes
//! EXTRINSIC      [kind=3][rotation 3x3 row-major][translation 3]  52 bytes
//! ```
//!
//! Frame headers and chunks share a kind tag and are told apart by length:
//! a header is exactly 12 bytes, a chunk always carries at least one payload
//! byte. A zero-length frame is a header with `packet_count = 0` and no chunks.
//!
//! Delivery is best effort. INIT is repeated at startup because its loss
//! would leave the consumer without a coordinate frame; frames and poses are
//! never retransmitted.

pub mod assembler;
pub mod packets;

pub use assembler::{AssembledFrame, FrameAssembler};
pub use packets::{
    frame_packets, packet_count, ExtrinsicParams, FrameChunk, FrameHeader, InitParams, Packet,
};

/// Maximum frame payload bytes per chunk datagram
pub const CHUNK_SIZE: usize = 1200;

/// Kind tag for frame header and chunk datagrams
pub const KIND_FRAME: u32 = 1;

/// Kind tag for the startup INIT datagram
pub const KIND_INIT_PARAMS: u32 = 2;

/// Kind tag for the per-tick pose datagram
pub const KIND_EXTRINSIC: u32 = 3;

/// Monotonic frame identifier with 32-bit wraparound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct FrameId(pub u32);

impl FrameId {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Next identifier; `u32::MAX` is followed by 0
    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Advance in place, returning the identifier that was current
    #[inline]
    pub fn advance(&mut self) -> Self {
        let current = *self;
        *self = current.next();
        current
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
