//! Payment-code extraction
//!
//! The stateless core: parse a PDF buffer, walk its pages in order, and
//! return the first digit line or QR payload found. Concurrency, isolation
//! and timeouts are the pool's job, not this module's.

pub mod backend;
pub mod digit_line;
pub mod error;
pub mod qr;
pub mod routine;
pub mod types;

pub use backend::{DocumentBackend, MupdfBackend, PixelBuffer};
pub use error::{ExtractError, PageError};
pub use qr::{DecodeMode, QrDecoder, RqrrDecoder};
pub use routine::{extract, run_extraction};
pub use types::{ExtractOptions, ExtractResult, Prefer};
