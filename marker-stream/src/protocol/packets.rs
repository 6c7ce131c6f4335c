//! Fixed-layout packet structures
//!
//! One struct per datagram kind, each with a single `encode`/`decode` pair.
//! Layouts are written field by field with explicit big-endian conversion, so
//! the bytes are independent of host endianness.

use super::{FrameId, CHUNK_SIZE, KIND_EXTRINSIC, KIND_FRAME, KIND_INIT_PARAMS};
use crate::core::types::PoseEstimate;
use crate::error::{Error, Result};

/// Size of the `[kind][frame_id][u32]` prefix shared by frame datagrams
pub const FRAME_PREFIX_LEN: usize = 12;

/// Number of chunks needed for a payload of `len` bytes
#[inline]
pub fn packet_count(len: usize) -> u32 {
    len.div_ceil(CHUNK_SIZE) as u32
}

/// Split a frame payload into its header and in-order chunks
pub fn frame_packets(
    frame_id: FrameId,
    payload: &[u8],
) -> (FrameHeader, impl Iterator<Item = FrameChunk<'_>>) {
    let header = FrameHeader {
        frame_id,
        packet_count: packet_count(payload.len()),
    };
    let chunks = payload
        .chunks(CHUNK_SIZE)
        .enumerate()
        .map(move |(sequence, payload)| FrameChunk {
            frame_id,
            sequence: sequence as u32,
            payload,
        });
    (header, chunks)
}

#[inline]
fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[inline]
fn read_f32s<const N: usize>(bytes: &[u8], offset: usize) -> [f32; N] {
    let mut out = [0.0f32; N];
    for (i, value) in out.iter_mut().enumerate() {
        *value = f32::from_bits(read_u32(bytes, offset + i * 4));
    }
    out
}

#[inline]
fn write_f32s(out: &mut [u8], offset: usize, values: &[f32]) {
    for (i, value) in values.iter().enumerate() {
        let at = offset + i * 4;
        out[at..at + 4].copy_from_slice(&value.to_be_bytes());
    }
}

fn check_kind(bytes: &[u8], expected: u32, name: &str) -> Result<()> {
    if bytes.len() < 4 {
        return Err(Error::InvalidPacket(format!(
            "{} packet too short: {} bytes",
            name,
            bytes.len()
        )));
    }
    let kind = read_u32(bytes, 0);
    if kind != expected {
        return Err(Error::InvalidPacket(format!(
            "{} packet has kind {}, expected {}",
            name, kind, expected
        )));
    }
    Ok(())
}

/// Frame header: announces how many chunks follow for `frame_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_id: FrameId,
    pub packet_count: u32,
}

impl FrameHeader {
    pub const LEN: usize = FRAME_PREFIX_LEN;

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0..4].copy_from_slice(&KIND_FRAME.to_be_bytes());
        out[4..8].copy_from_slice(&self.frame_id.value().to_be_bytes());
        out[8..12].copy_from_slice(&self.packet_count.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        check_kind(bytes, KIND_FRAME, "frame header")?;
        if bytes.len() != Self::LEN {
            return Err(Error::InvalidPacket(format!(
                "frame header must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        Ok(Self {
            frame_id: FrameId(read_u32(bytes, 4)),
            packet_count: read_u32(bytes, 8),
        })
    }
}

/// One slice of a frame payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameChunk<'a> {
    pub frame_id: FrameId,
    /// 0-based position of this chunk within the frame
    pub sequence: u32,
    pub payload: &'a [u8],
}

impl<'a> FrameChunk<'a> {
    /// Encoded length of this chunk
    #[inline]
    pub fn encoded_len(&self) -> usize {
        FRAME_PREFIX_LEN + self.payload.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }

    /// Encode into a reusable buffer (cleared first)
    pub fn encode_into(&self, buffer: &mut Vec<u8>) {
        buffer.clear();
        buffer.extend_from_slice(&KIND_FRAME.to_be_bytes());
        buffer.extend_from_slice(&self.frame_id.value().to_be_bytes());
        buffer.extend_from_slice(&self.sequence.to_be_bytes());
        buffer.extend_from_slice(self.payload);
    }

    pub fn decode(bytes: &'a [u8]) -> Result<Self> {
        check_kind(bytes, KIND_FRAME, "frame chunk")?;
        let len = bytes.len();
        if len <= FRAME_PREFIX_LEN || len > FRAME_PREFIX_LEN + CHUNK_SIZE {
            return Err(Error::InvalidPacket(format!(
                "frame chunk must be {}..={} bytes, got {}",
                FRAME_PREFIX_LEN + 1,
                FRAME_PREFIX_LEN + CHUNK_SIZE,
                len
            )));
        }
        Ok(Self {
            frame_id: FrameId(read_u32(bytes, 4)),
            sequence: read_u32(bytes, 8),
            payload: &bytes[FRAME_PREFIX_LEN..],
        })
    }
}

/// Startup parameters: camera-axis remap and vertical field of view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitParams {
    /// 3x3 remap matrix, row-major
    pub axis_remap: [f32; 9],
    pub vertical_fov_deg: f32,
}

impl InitParams {
    pub const LEN: usize = 4 + 10 * 4;

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0..4].copy_from_slice(&KIND_INIT_PARAMS.to_be_bytes());
        write_f32s(&mut out, 4, &self.axis_remap);
        write_f32s(&mut out, 40, &[self.vertical_fov_deg]);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        check_kind(bytes, KIND_INIT_PARAMS, "init")?;
        if bytes.len() != Self::LEN {
            return Err(Error::InvalidPacket(format!(
                "init packet must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        let [vertical_fov_deg] = read_f32s::<1>(bytes, 40);
        Ok(Self {
            axis_remap: read_f32s::<9>(bytes, 4),
            vertical_fov_deg,
        })
    }
}

/// Per-tick pose: rotation (row-major) then translation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtrinsicParams {
    pub rotation: [f32; 9],
    pub translation: [f32; 3],
}

impl ExtrinsicParams {
    pub const LEN: usize = 4 + 12 * 4;

    pub fn from_pose(pose: &PoseEstimate) -> Self {
        let wire = pose.to_wire();
        let mut rotation = [0.0f32; 9];
        rotation.copy_from_slice(&wire[..9]);
        Self {
            rotation,
            translation: [wire[9], wire[10], wire[11]],
        }
    }

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0..4].copy_from_slice(&KIND_EXTRINSIC.to_be_bytes());
        write_f32s(&mut out, 4, &self.rotation);
        write_f32s(&mut out, 40, &self.translation);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        check_kind(bytes, KIND_EXTRINSIC, "extrinsic")?;
        if bytes.len() != Self::LEN {
            return Err(Error::InvalidPacket(format!(
                "extrinsic packet must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        Ok(Self {
            rotation: read_f32s::<9>(bytes, 4),
            translation: read_f32s::<3>(bytes, 40),
        })
    }
}

/// Any datagram of the stream, decoded by kind tag and length
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet<'a> {
    FrameHeader(FrameHeader),
    FrameChunk(FrameChunk<'a>),
    Init(InitParams),
    Extrinsic(ExtrinsicParams),
}

impl<'a> Packet<'a> {
    pub fn decode(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::InvalidPacket(format!(
                "datagram too short: {} bytes",
                bytes.len()
            )));
        }
        match read_u32(bytes, 0) {
            KIND_FRAME if bytes.len() == FrameHeader::LEN => {
                FrameHeader::decode(bytes).map(Packet::FrameHeader)
            }
            KIND_FRAME => FrameChunk::decode(bytes).map(Packet::FrameChunk),
            KIND_INIT_PARAMS => InitParams::decode(bytes).map(Packet::Init),
            KIND_EXTRINSIC => ExtrinsicParams::decode(bytes).map(Packet::Extrinsic),
            kind => Err(Error::InvalidPacket(format!("unknown packet kind {}", kind))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    #[test]
    fn test_packet_count() {
        assert_eq!(packet_count(0), 0);
        assert_eq!(packet_count(1), 1);
        assert_eq!(packet_count(1199), 1);
        assert_eq!(packet_count(1200), 1);
        assert_eq!(packet_count(1201), 2);
        assert_eq!(packet_count(2400), 2);
        assert_eq!(packet_count(3000), 3);
        assert_eq!(packet_count(100_000), 84);
    }

    #[test]
    fn test_chunks_reassemble_payload() {
        for len in [0usize, 1, 1199, 1200, 1201, 2400, 3000, 100_000] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let (header, chunks) = frame_packets(FrameId(9), &payload);
            let chunks: Vec<_> = chunks.collect();

            assert_eq!(header.packet_count as usize, chunks.len(), "len {}", len);
            let mut rebuilt = Vec::with_capacity(len);
            for (i, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.sequence as usize, i);
                assert!(chunk.payload.len() <= CHUNK_SIZE);
                rebuilt.extend_from_slice(chunk.payload);
            }
            assert_eq!(rebuilt, payload, "len {}", len);
        }
    }

    #[test]
    fn test_three_thousand_byte_frame() {
        let payload = vec![0xAB; 3000];
        let (header, chunks) = frame_packets(FrameId(42), &payload);

        // [kind=1][frame_id=42][count=3]
        assert_eq!(header.encode(), [0, 0, 0, 1, 0, 0, 0, 42, 0, 0, 0, 3]);

        let encoded: Vec<Vec<u8>> = chunks.map(|c| c.encode()).collect();
        let sizes: Vec<usize> = encoded.iter().map(|d| d.len() - FRAME_PREFIX_LEN).collect();
        assert_eq!(sizes, vec![1200, 1200, 600]);
        for (seq, datagram) in encoded.iter().enumerate() {
            assert_eq!(&datagram[0..4], &[0, 0, 0, 1]);
            assert_eq!(&datagram[4..8], &[0, 0, 0, 42]);
            assert_eq!(&datagram[8..12], &(seq as u32).to_be_bytes());
        }
    }

    #[test]
    fn test_init_layout() {
        let init = InitParams {
            axis_remap: [0.0, -1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, -1.0],
            vertical_fov_deg: 54.5,
        };
        let bytes = init.encode();
        assert_eq!(bytes.len(), 44);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 2]);
        // -1.0f32 = 0xBF800000
        assert_eq!(&bytes[8..12], &[0xBF, 0x80, 0x00, 0x00]);
        assert_eq!(&bytes[40..44], &54.5f32.to_be_bytes());
        assert_eq!(InitParams::decode(&bytes).unwrap(), init);
    }

    #[test]
    fn test_extrinsic_layout() {
        let rotation = Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        let pose = PoseEstimate::new(rotation, Vector3::new(10.0, 11.0, 12.0));
        let extrinsic = ExtrinsicParams::from_pose(&pose);
        let bytes = extrinsic.encode();

        assert_eq!(bytes.len(), 52);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 3]);
        // Row-major: second float is R[0][1] = 2.0
        assert_eq!(&bytes[8..12], &2.0f32.to_be_bytes());
        // Fourth float is R[1][0] = 4.0
        assert_eq!(&bytes[16..20], &4.0f32.to_be_bytes());
        assert_eq!(&bytes[48..52], &12.0f32.to_be_bytes());
    }

    #[test]
    fn test_decode_rejects_wrong_kind_and_length() {
        let header = FrameHeader {
            frame_id: FrameId(1),
            packet_count: 1,
        }
        .encode();
        assert!(matches!(
            InitParams::decode(&header),
            Err(Error::InvalidPacket(_))
        ));
        assert!(FrameHeader::decode(&header[..8]).is_err());

        let extrinsic = ExtrinsicParams::from_pose(&PoseEstimate::identity()).encode();
        assert!(ExtrinsicParams::decode(&extrinsic[..51]).is_err());
        assert!(Packet::decode(&[0, 0, 0, 9, 0, 0, 0, 0]).is_err());
        assert!(Packet::decode(&[0, 0]).is_err());
    }

    #[test]
    fn test_packet_dispatch() {
        let payload = [7u8; 5];
        let (header, mut chunks) = frame_packets(FrameId(3), &payload);
        let header_bytes = header.encode();
        let chunk_bytes = chunks.next().unwrap().encode();

        assert!(matches!(
            Packet::decode(&header_bytes).unwrap(),
            Packet::FrameHeader(FrameHeader { packet_count: 1, .. })
        ));
        match Packet::decode(&chunk_bytes).unwrap() {
            Packet::FrameChunk(chunk) => {
                assert_eq!(chunk.frame_id, FrameId(3));
                assert_eq!(chunk.payload, &payload);
            }
            other => panic!("expected chunk, got {:?}", other),
        }
    }
}
