//! Extraction option and result types
//!
//! Wire names (`linha_digitavel`, `qr`, `none`, camelCase fields) match the
//! public API of the service and are stable.

use serde::{Deserialize, Serialize};

/// Pages beyond this index are never examined, regardless of document size.
pub const PAGE_CAP: usize = 10;

/// First rasterization pass, high resolution with default decoder settings.
pub const SCALE_HIGH: f32 = 3.0;

/// Second rasterization pass, coarse resolution. Decoding at this scale is
/// inversion-tolerant because low-resolution rasterization loses contrast.
pub const SCALE_LOW: f32 = 1.5;

/// Which payload to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prefer {
    /// Try the digit line first, then QR, per page.
    #[default]
    Auto,
    /// Only attempt QR decoding.
    Qr,
    /// Only attempt digit-line matching.
    Linha,
}

/// Options for a single extraction job. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractOptions {
    #[serde(default)]
    pub prefer: Prefer,
    /// 1-indexed page to start from.
    #[serde(default = "default_start_page")]
    pub start_page: usize,
    /// When false, only `start_page` is examined.
    #[serde(default = "default_true")]
    pub try_all_pages: bool,
}

fn default_start_page() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            prefer: Prefer::Auto,
            start_page: 1,
            try_all_pages: true,
        }
    }
}

/// Outcome of a completed extraction job. Exactly one variant per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractResult {
    /// Textual digit line found on `page`.
    #[serde(rename = "linha_digitavel", rename_all = "camelCase")]
    DigitLine {
        page: usize,
        /// The substring as matched, separators included.
        formatted: String,
        /// Digits-only normalization of `formatted`.
        digits_only: String,
    },
    /// QR payload decoded from a rasterized page.
    Qr { page: usize, payload: String },
    /// No payload found on any examined page.
    None { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let opts: ExtractOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.prefer, Prefer::Auto);
        assert_eq!(opts.start_page, 1);
        assert!(opts.try_all_pages);
    }

    #[test]
    fn test_options_camel_case() {
        let opts: ExtractOptions =
            serde_json::from_str(r#"{"prefer":"qr","startPage":3,"tryAllPages":false}"#).unwrap();
        assert_eq!(opts.prefer, Prefer::Qr);
        assert_eq!(opts.start_page, 3);
        assert!(!opts.try_all_pages);
    }

    #[test]
    fn test_result_wire_format() {
        let result = ExtractResult::DigitLine {
            page: 1,
            formatted: "123".to_string(),
            digits_only: "123".to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "linha_digitavel");
        assert_eq!(json["digitsOnly"], "123");

        let result = ExtractResult::Qr {
            page: 2,
            payload: "00020101".to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "qr");
        assert_eq!(json["payload"], "00020101");
    }
}
