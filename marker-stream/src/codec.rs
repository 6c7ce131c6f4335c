//! Payload codec
//!
//! Converts the values the pipeline streams into byte payloads:
//!
//! | Payload | Quality | Output |
//! |---------|---------|--------|
//! | `Bytes` | ignored | unchanged |
//! | `Image` | 0 | raw RGB buffer, `width * height * 3` bytes |
//! | `Image` | 1..=100 | baseline JPEG at that quality |
//! | `Png` | ignored | lossless PNG |
//! | `Int` / `Float` / `Bool` | ignored | decimal text, UTF-8 |
//! | `Text` | ignored | UTF-8 |
//! | `Json` | ignored | compact JSON text, UTF-8 |
//!
//! Only the encode direction exists here; the remote consumer owns decoding.

use crate::core::types::Frame;
use crate::error::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageBuffer, ImageEncoder, Rgb};

/// Highest accepted JPEG quality
pub const MAX_QUALITY: u8 = 100;

/// Values accepted by [`encode`]
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Bytes(&'a [u8]),
    Image(&'a Frame),
    Png(&'a Frame),
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(&'a str),
    Json(&'a serde_json::Value),
}

/// Encode a payload into bytes
///
/// `quality` only applies to [`Payload::Image`]: 0 sends the raw buffer,
/// 1..=100 selects JPEG compression.
pub fn encode(payload: &Payload<'_>, quality: u8) -> Result<Vec<u8>> {
    match *payload {
        Payload::Bytes(bytes) => Ok(bytes.to_vec()),
        Payload::Image(frame) => encode_image(frame, quality),
        Payload::Png(frame) => encode_png(frame),
        Payload::Int(value) => Ok(value.to_string().into_bytes()),
        Payload::Float(value) => {
            if !value.is_finite() {
                return Err(Error::Encode(format!("non-finite float {}", value)));
            }
            Ok(format!("{:?}", value).into_bytes())
        }
        Payload::Bool(value) => Ok(value.to_string().into_bytes()),
        Payload::Text(text) => Ok(text.as_bytes().to_vec()),
        Payload::Json(value) => {
            serde_json::to_vec(value).map_err(|e| Error::Encode(e.to_string()))
        }
    }
}

/// Encode a frame: raw bytes at quality 0, JPEG otherwise
pub fn encode_image(frame: &Frame, quality: u8) -> Result<Vec<u8>> {
    if quality == 0 {
        return Ok(frame.data().to_vec());
    }
    if quality > MAX_QUALITY {
        return Err(Error::Encode(format!(
            "JPEG quality {} out of range 1..={}",
            quality, MAX_QUALITY
        )));
    }

    let image = rgb_view(frame)?;
    // JPEG output is far smaller than raw; a tenth of the raw size avoids most regrowth
    let mut buffer = Vec::with_capacity(frame.data().len() / 10);
    JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(&image)?;
    Ok(buffer)
}

/// Encode a frame as PNG
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer).write_image(
        frame.data(),
        frame.width(),
        frame.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buffer)
}

fn rgb_view(frame: &Frame) -> Result<ImageBuffer<Rgb<u8>, &[u8]>> {
    ImageBuffer::from_raw(frame.width(), frame.height(), frame.data()).ok_or_else(|| {
        Error::Encode(format!(
            "pixel buffer does not fit {}x{} RGB",
            frame.width(),
            frame.height()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push((x * 255 / width) as u8);
                data.push((y * 255 / height) as u8);
                data.push(128);
            }
        }
        Frame::new(width, height, data).unwrap()
    }

    #[test]
    fn test_bytes_pass_through() {
        let raw = [0u8, 1, 2, 255];
        assert_eq!(encode(&Payload::Bytes(&raw), 70).unwrap(), raw.to_vec());
    }

    #[test]
    fn test_quality_zero_is_raw() {
        let frame = gradient_frame(64, 48);
        let out = encode(&Payload::Image(&frame), 0).unwrap();
        assert_eq!(out.len(), 64 * 48 * 3);
        assert_eq!(out, frame.data());
    }

    #[test]
    fn test_jpeg_is_smaller_and_decodable() {
        let frame = gradient_frame(160, 120);
        for quality in [2u8, 50, 70, 100] {
            let out = encode(&Payload::Image(&frame), quality).unwrap();
            assert!(out.len() < frame.data().len(), "quality {}", quality);
            // JPEG SOI marker
            assert_eq!(&out[..2], &[0xFF, 0xD8]);

            let decoded = image::load_from_memory(&out).unwrap();
            assert_eq!(decoded.width(), 160);
            assert_eq!(decoded.height(), 120);
        }
    }

    #[test]
    fn test_quality_out_of_range() {
        let frame = gradient_frame(8, 8);
        assert!(matches!(
            encode(&Payload::Image(&frame), 101),
            Err(Error::Encode(_))
        ));
    }

    #[test]
    fn test_png_lossless() {
        let frame = gradient_frame(32, 16);
        let out = encode(&Payload::Png(&frame), 0).unwrap();
        let decoded = image::load_from_memory(&out).unwrap().to_rgb8();
        assert_eq!(decoded.as_raw().as_slice(), frame.data());
    }

    #[test]
    fn test_scalars_and_text() {
        assert_eq!(encode(&Payload::Int(-42), 0).unwrap(), b"-42");
        assert_eq!(encode(&Payload::Float(1.5), 0).unwrap(), b"1.5");
        assert_eq!(encode(&Payload::Float(2.0), 0).unwrap(), b"2.0");
        assert_eq!(encode(&Payload::Bool(true), 0).unwrap(), b"true");
        assert_eq!(
            encode(&Payload::Text("マーカー"), 0).unwrap(),
            "マーカー".as_bytes()
        );
        assert!(encode(&Payload::Float(f64::NAN), 0).is_err());
        assert!(encode(&Payload::Float(f64::INFINITY), 0).is_err());
    }

    #[test]
    fn test_json_keeps_utf8() {
        let value = json!({"name": "マーカー", "ids": [1, 2, 3]});
        let out = encode(&Payload::Json(&value), 0).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("マーカー"));
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, value);
    }
}
