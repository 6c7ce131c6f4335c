//! Stream sender
//!
//! Exclusively owns the datagram transport. Every method takes `&mut self`.
//!
//! # Send Policy
//!
//! | Data | Datagrams | Redundancy |
//! |------|-----------|------------|
//! | Frame | header + ceil(len / 1200) chunks | none |
//! | INIT | 1 | repeated `repeat` times at startup |
//! | EXTRINSIC | 1 | none |
//!
//! Send errors are returned to the caller and counted; none of them poison
//! the sender, so the next call proceeds normally.

use crate::core::types::PoseEstimate;
use crate::error::{Error, Result};
use crate::protocol::packets::{frame_packets, ExtrinsicParams, InitParams};
use crate::protocol::{FrameId, CHUNK_SIZE};
use crate::transport::DatagramTransport;
use std::time::Duration;

/// Datagram counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
}

/// Owns the transport and encodes protocol datagrams onto it
pub struct StreamSender<T: DatagramTransport> {
    transport: T,
    /// Reused for chunk encoding
    buffer: Vec<u8>,
    stats: SenderStats,
}

impl<T: DatagramTransport> StreamSender<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buffer: Vec::with_capacity(CHUNK_SIZE + 12),
            stats: SenderStats::default(),
        }
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn send_datagram(transport: &mut T, stats: &mut SenderStats, datagram: &[u8]) -> Result<()> {
        match transport.send(datagram) {
            Ok(n) => {
                stats.datagrams_sent += 1;
                stats.bytes_sent += n as u64;
                Ok(())
            }
            Err(e) => {
                stats.send_failures += 1;
                Err(e)
            }
        }
    }

    /// Send a frame payload as one header and its chunks, in order
    ///
    /// Returns the number of datagrams sent. On the first failed send the
    /// rest of the frame is abandoned; the consumer drops incomplete frames.
    pub fn send_frame(&mut self, frame_id: FrameId, payload: &[u8]) -> Result<usize> {
        let (header, chunks) = frame_packets(frame_id, payload);
        Self::send_datagram(&mut self.transport, &mut self.stats, &header.encode())?;

        let mut sent = 1;
        for chunk in chunks {
            chunk.encode_into(&mut self.buffer);
            Self::send_datagram(&mut self.transport, &mut self.stats, &self.buffer).map_err(
                |e| {
                    log::debug!(
                        "Frame {} abandoned at chunk {}/{}",
                        frame_id,
                        chunk.sequence,
                        header.packet_count
                    );
                    e
                },
            )?;
            sent += 1;
        }

        log::trace!(
            "Sent frame {} ({} bytes, {} chunks)",
            frame_id,
            payload.len(),
            header.packet_count
        );
        Ok(sent)
    }

    /// Send the INIT packet `repeat` times, pausing `interval` after each
    ///
    /// Individual failures are logged and the burst continues. Returns the
    /// number of successful sends, or the last error if none succeeded.
    pub fn send_init_params(
        &mut self,
        init: &InitParams,
        repeat: u32,
        interval: Duration,
    ) -> Result<u32> {
        let bytes = init.encode();
        let mut delivered = 0;
        let mut last_error = None;

        for attempt in 0..repeat {
            match Self::send_datagram(&mut self.transport, &mut self.stats, &bytes) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    log::warn!("INIT send {}/{} failed: {}", attempt + 1, repeat, e);
                    last_error = Some(e);
                }
            }
            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        }

        match (delivered, last_error) {
            (0, Some(e)) => Err(e),
            (0, None) => Err(Error::Transport("INIT repeat count is zero".to_string())),
            (n, _) => Ok(n),
        }
    }

    /// Send the pose as one EXTRINSIC datagram
    pub fn send_extrinsic(&mut self, pose: &PoseEstimate) -> Result<()> {
        let bytes = ExtrinsicParams::from_pose(pose).encode();
        Self::send_datagram(&mut self.transport, &mut self.stats, &bytes)
    }

    /// Close the transport
    pub fn close(&mut self) -> Result<()> {
        log::debug!(
            "Closing stream: {} datagrams, {} bytes, {} failures",
            self.stats.datagrams_sent,
            self.stats.bytes_sent,
            self.stats.send_failures
        );
        self.transport.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packets::{ExtrinsicParams, FrameHeader, FRAME_PREFIX_LEN};
    use crate::transport::MockTransport;
    use nalgebra::{Matrix3, Vector3};

    fn init() -> InitParams {
        InitParams {
            axis_remap: [0.0, -1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, -1.0],
            vertical_fov_deg: 54.4,
        }
    }

    #[test]
    fn test_send_frame_order() {
        let mock = MockTransport::new();
        let mut sender = StreamSender::new(mock.clone());

        let payload = vec![5u8; 3000];
        assert_eq!(sender.send_frame(FrameId(8), &payload).unwrap(), 4);

        let sent = mock.datagrams();
        assert_eq!(sent.len(), 4);
        let header = FrameHeader::decode(&sent[0]).unwrap();
        assert_eq!(header.packet_count, 3);
        let lens: Vec<usize> = sent[1..].iter().map(|d| d.len() - FRAME_PREFIX_LEN).collect();
        assert_eq!(lens, vec![1200, 1200, 600]);
        assert_eq!(sender.stats().datagrams_sent, 4);
    }

    #[test]
    fn test_empty_frame_is_header_only() {
        let mock = MockTransport::new();
        let mut sender = StreamSender::new(mock.clone());
        assert_eq!(sender.send_frame(FrameId(0), &[]).unwrap(), 1);
        assert_eq!(mock.datagrams()[0].len(), 12);
    }

    #[test]
    fn test_failed_chunk_abandons_frame() {
        let mock = MockTransport::new();
        let mut sender = StreamSender::new(mock.clone());

        // Header and first chunk go out, second chunk fails
        mock.fail_after(2);
        assert!(sender.send_frame(FrameId(1), &[0u8; 3000]).is_err());
        assert_eq!(mock.datagrams().len(), 2);
        assert_eq!(sender.stats().send_failures, 1);

        // The next frame is unaffected
        assert_eq!(sender.send_frame(FrameId(2), &[0u8; 10]).unwrap(), 2);
    }

    #[test]
    fn test_init_burst_identical_packets() {
        let mock = MockTransport::new();
        let mut sender = StreamSender::new(mock.clone());
        assert_eq!(
            sender
                .send_init_params(&init(), 5, Duration::from_millis(0))
                .unwrap(),
            5
        );

        let sent = mock.datagrams();
        assert_eq!(sent.len(), 5);
        assert!(sent.iter().all(|d| d.len() == 44 && *d == sent[0]));
    }

    #[test]
    fn test_init_burst_survives_partial_loss() {
        let mock = MockTransport::new();
        let mut sender = StreamSender::new(mock.clone());
        mock.fail_next(2);
        assert_eq!(
            sender.send_init_params(&init(), 5, Duration::ZERO).unwrap(),
            3
        );

        mock.set_fail_all(true);
        assert!(sender.send_init_params(&init(), 2, Duration::ZERO).is_err());
    }

    #[test]
    fn test_extrinsic_single_datagram() {
        let mock = MockTransport::new();
        let mut sender = StreamSender::new(mock.clone());
        let pose = PoseEstimate::new(Matrix3::identity(), Vector3::new(1.0, 2.0, 30.0));
        sender.send_extrinsic(&pose).unwrap();

        let sent = mock.datagrams();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), 52);
        let decoded = ExtrinsicParams::decode(&sent[0]).unwrap();
        assert_eq!(decoded.translation, [1.0, 2.0, 30.0]);
    }

    #[test]
    fn test_close_closes_transport() {
        let mock = MockTransport::new();
        let mut sender = StreamSender::new(mock.clone());
        sender.close().unwrap();
        assert!(mock.is_closed());
        assert!(sender.send_extrinsic(&PoseEstimate::identity()).is_err());
    }
}
