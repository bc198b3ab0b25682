//! The extraction routine
//!
//! Pure, synchronous, CPU-bound. Runs inside a worker thread; the host is
//! responsible for timeouts and isolation. Pages are tried in ascending
//! order and the first match wins: text before raster, lower page before
//! higher. Callers depend on that deterministic "first hit" ordering.

use super::backend::{DocumentBackend, MupdfBackend};
use super::digit_line::find_digit_line;
use super::error::{ExtractError, PageError};
use super::qr::{DecodeMode, QrDecoder, RqrrDecoder};
use super::types::{ExtractOptions, ExtractResult, Prefer, PAGE_CAP, SCALE_HIGH, SCALE_LOW};

const NO_MATCH_MESSAGE: &str =
    "QR code e linha digitável não encontrados nas páginas analisadas.";

/// Parse `buffer` as a PDF and run the extraction routine against it.
///
/// This is the entry point the worker pool dispatches to. All document
/// resources are released before returning, on every path.
pub fn extract(buffer: &[u8], options: &ExtractOptions) -> Result<ExtractResult, ExtractError> {
    let doc = MupdfBackend::from_bytes(buffer)
        .map_err(|e| ExtractError::Document(format!("Erro ao processar PDF: {}", e)))?;
    Ok(run_extraction(&doc, &RqrrDecoder, options))
}

/// Run the multi-stage search over an already-parsed document.
pub fn run_extraction<D: DocumentBackend + ?Sized, Q: QrDecoder + ?Sized>(
    doc: &D,
    qr: &Q,
    options: &ExtractOptions,
) -> ExtractResult {
    let pages = pages_to_try(doc.page_count(), options);

    for page in pages {
        // Text first: a digit-line match short-circuits all remaining pages
        // and all QR attempts.
        if options.prefer != Prefer::Qr {
            match doc.page_text(page) {
                Ok(text) => {
                    if let Some(m) = find_digit_line(&text) {
                        return ExtractResult::DigitLine {
                            page,
                            formatted: m.formatted,
                            digits_only: m.digits_only,
                        };
                    }
                }
                Err(PageError::InvalidPage(p)) => {
                    // Fewer usable pages than assumed; stop iterating.
                    tracing::warn!(page = p, "invalid page, stopping page scan");
                    break;
                }
                Err(e) => {
                    tracing::warn!(page, error = %e, "page text access failed, skipping page");
                    continue;
                }
            }
        }

        if options.prefer != Prefer::Linha {
            if let Some(payload) = try_decode_qr(doc, qr, page) {
                return ExtractResult::Qr { page, payload };
            }
        }
    }

    ExtractResult::None {
        message: NO_MATCH_MESSAGE.to_string(),
    }
}

/// Ordered page numbers to examine, capped at `PAGE_CAP`.
fn pages_to_try(page_count: usize, options: &ExtractOptions) -> Vec<usize> {
    // Pages are 1-indexed; a requested page of 0 means the first page.
    let start = options.start_page.max(1);
    if options.try_all_pages {
        let cap = page_count.min(PAGE_CAP);
        (start..=cap).collect()
    } else {
        vec![start]
    }
}

/// Two-pass QR decode: high resolution with default settings, then coarse
/// resolution with inversion tolerance. Render failures skip the page.
fn try_decode_qr<D: DocumentBackend + ?Sized, Q: QrDecoder + ?Sized>(
    doc: &D,
    qr: &Q,
    page: usize,
) -> Option<String> {
    match doc.render_page(page, SCALE_HIGH) {
        Ok(image) => {
            if image.is_usable() {
                if let Some(payload) = qr.decode(&image, DecodeMode::Normal) {
                    return Some(payload);
                }
            }
        }
        Err(e) => {
            tracing::warn!(page, error = %e, "high-resolution render failed");
        }
    }

    match doc.render_page(page, SCALE_LOW) {
        Ok(image) => {
            if image.is_usable() {
                if let Some(payload) = qr.decode(&image, DecodeMode::TryInverted) {
                    return Some(payload);
                }
            }
        }
        Err(e) => {
            tracing::warn!(page, error = %e, "low-resolution render failed");
        }
    }

    None
}
