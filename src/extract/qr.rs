//! QR decoding over rasterized pages
//!
//! Decoding is an opaque capability behind a trait; the production
//! implementation uses `rqrr`. The inversion-tolerant mode exists for the
//! low-resolution fallback pass, where coarse rasterization can flip the
//! apparent polarity of the modules.

use super::backend::PixelBuffer;

/// How hard to try when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Single pass over the buffer as rendered.
    Normal,
    /// Try normal polarity, then inverted.
    TryInverted,
}

/// Decode a QR payload from a grayscale pixel buffer.
pub trait QrDecoder {
    fn decode(&self, image: &PixelBuffer, mode: DecodeMode) -> Option<String>;
}

/// `rqrr`-backed decoder.
pub struct RqrrDecoder;

impl RqrrDecoder {
    fn decode_pass(image: &PixelBuffer, inverted: bool) -> Option<String> {
        let width = image.width as usize;
        let height = image.height as usize;
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            let luma = image.data[y * width + x];
            if inverted {
                255 - luma
            } else {
                luma
            }
        });

        for grid in prepared.detect_grids() {
            if let Ok((_meta, payload)) = grid.decode() {
                if !payload.is_empty() {
                    return Some(payload);
                }
            }
        }
        None
    }
}

impl QrDecoder for RqrrDecoder {
    fn decode(&self, image: &PixelBuffer, mode: DecodeMode) -> Option<String> {
        if !image.is_usable() {
            return None;
        }

        if let Some(payload) = Self::decode_pass(image, false) {
            return Some(payload);
        }
        if mode == DecodeMode::TryInverted {
            return Self::decode_pass(image, true);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unusable_buffer_decodes_to_nothing() {
        let buf = PixelBuffer {
            data: Vec::new(),
            width: 0,
            height: 0,
        };
        assert!(RqrrDecoder.decode(&buf, DecodeMode::TryInverted).is_none());
    }

    #[test]
    fn test_blank_page_decodes_to_nothing() {
        let buf = PixelBuffer {
            data: vec![255; 64 * 64],
            width: 64,
            height: 64,
        };
        assert!(RqrrDecoder.decode(&buf, DecodeMode::Normal).is_none());
    }
}
