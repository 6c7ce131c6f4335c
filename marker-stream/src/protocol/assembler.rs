//! Consumer-side frame reassembly
//!
//! Tracks one frame at a time. A frame completes when its header has been
//! seen and every chunk `0..packet_count` has arrived. Datagrams may arrive
//! in any order within a frame; a datagram for a newer frame id abandons the
//! frame in progress, and datagrams for slightly older ids are dropped. An id
//! far behind the last one seen means the sender restarted its counter, and
//! the assembler starts over from it.

use super::packets::{FrameChunk, FrameHeader, Packet};
use super::{FrameId, CHUNK_SIZE};
use crate::error::Result;

/// Largest frame payload the assembler buffers
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Chunk sequence numbers at or above this are dropped
pub const MAX_CHUNKS_PER_FRAME: u32 = (MAX_FRAME_BYTES / CHUNK_SIZE) as u32;

/// Ids further behind the reference than this start a new stream
pub const RESTART_WINDOW: u32 = 64;

/// A fully received frame payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFrame {
    pub frame_id: FrameId,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct PartialFrame {
    frame_id: FrameId,
    expected: Option<u32>,
    chunks: Vec<Option<Vec<u8>>>,
    received: u32,
}

impl PartialFrame {
    fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            expected: None,
            chunks: Vec::new(),
            received: 0,
        }
    }

    fn is_complete(&self) -> bool {
        self.expected == Some(self.received)
    }

    fn insert(&mut self, sequence: u32, payload: &[u8]) {
        if sequence >= MAX_CHUNKS_PER_FRAME {
            log::debug!(
                "Chunk {} of frame {} exceeds {} chunks, dropped",
                sequence,
                self.frame_id,
                MAX_CHUNKS_PER_FRAME
            );
            return;
        }
        if let Some(expected) = self.expected {
            if sequence >= expected {
                log::debug!(
                    "Chunk {} out of range for frame {} ({} chunks)",
                    sequence,
                    self.frame_id,
                    expected
                );
                return;
            }
        }
        let index = sequence as usize;
        if self.chunks.len() <= index {
            self.chunks.resize(index + 1, None);
        }
        if self.chunks[index].is_none() {
            self.chunks[index] = Some(payload.to_vec());
            self.received += 1;
        }
    }

    fn set_expected(&mut self, count: u32) {
        self.expected = Some(count);
        // Drop anything that arrived before the header but lies past the end
        if self.chunks.len() > count as usize {
            let extra = self.chunks[count as usize..]
                .iter()
                .filter(|c| c.is_some())
                .count() as u32;
            self.chunks.truncate(count as usize);
            self.received -= extra;
        }
    }

    fn into_payload(self) -> Vec<u8> {
        self.chunks.into_iter().flatten().flatten().collect()
    }
}

/// Reassembles frames from header and chunk datagrams
#[derive(Debug, Default)]
pub struct FrameAssembler {
    current: Option<PartialFrame>,
    last_completed: Option<FrameId>,
    completed: u64,
    discarded: u64,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames completed so far
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Frames abandoned before completion
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Decode a raw datagram and feed it in
    ///
    /// INIT and EXTRINSIC datagrams are accepted and ignored.
    pub fn push_datagram(&mut self, bytes: &[u8]) -> Result<Option<AssembledFrame>> {
        Ok(self.push(&Packet::decode(bytes)?))
    }

    /// Feed one decoded packet, returning a frame when it completes
    pub fn push(&mut self, packet: &Packet<'_>) -> Option<AssembledFrame> {
        match packet {
            Packet::FrameHeader(header) => self.on_header(header),
            Packet::FrameChunk(chunk) => self.on_chunk(chunk),
            Packet::Init(_) | Packet::Extrinsic(_) => None,
        }
    }

    fn on_header(&mut self, header: &FrameHeader) -> Option<AssembledFrame> {
        let partial = self.frame_for(header.frame_id)?;
        partial.set_expected(header.packet_count);
        self.finish_if_complete()
    }

    fn on_chunk(&mut self, chunk: &FrameChunk<'_>) -> Option<AssembledFrame> {
        let partial = self.frame_for(chunk.frame_id)?;
        partial.insert(chunk.sequence, chunk.payload);
        self.finish_if_complete()
    }

    /// Partial frame for `frame_id`, starting a new one if it is newer
    fn frame_for(&mut self, frame_id: FrameId) -> Option<&mut PartialFrame> {
        if self.last_completed == Some(frame_id) {
            return None;
        }
        let reference = self
            .current
            .as_ref()
            .map(|p| p.frame_id)
            .or(self.last_completed);

        let start_new = match reference {
            None => true,
            Some(reference) if reference == frame_id => false,
            Some(reference) if is_newer(frame_id, reference) => true,
            Some(reference) => {
                if reference.value().wrapping_sub(frame_id.value()) <= RESTART_WINDOW {
                    log::trace!("Dropping datagram for stale frame {}", frame_id);
                    return None;
                }
                log::info!(
                    "Frame id jumped back from {} to {}, assuming sender restart",
                    reference,
                    frame_id
                );
                self.last_completed = None;
                true
            }
        };

        if start_new {
            if let Some(abandoned) = self.current.take() {
                log::debug!(
                    "Discarding incomplete frame {} ({} chunks received)",
                    abandoned.frame_id,
                    abandoned.received
                );
                self.discarded += 1;
            }
            self.current = Some(PartialFrame::new(frame_id));
        }
        self.current.as_mut()
    }

    fn finish_if_complete(&mut self) -> Option<AssembledFrame> {
        if !self.current.as_ref().is_some_and(PartialFrame::is_complete) {
            return None;
        }
        let partial = self.current.take()?;
        let frame_id = partial.frame_id;
        self.last_completed = Some(frame_id);
        self.completed += 1;
        Some(AssembledFrame {
            frame_id,
            payload: partial.into_payload(),
        })
    }
}

/// Whether `candidate` follows `reference` under 32-bit wraparound
#[inline]
fn is_newer(candidate: FrameId, reference: FrameId) -> bool {
    (candidate.value().wrapping_sub(reference.value()) as i32) > 0
}
