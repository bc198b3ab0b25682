//! Document backend abstraction and the MuPDF implementation
//!
//! The routine only needs three capabilities from a PDF library: page count,
//! per-page text, and rasterization at a scale. They are expressed as a
//! trait so the routine can be exercised against in-memory fakes.

use mupdf::{Colorspace, Document, Matrix};

use super::error::PageError;

/// Grayscale pixel buffer produced by rasterizing a page.
pub struct PixelBuffer {
    /// One luma byte per pixel, row-major.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PixelBuffer {
    /// A buffer with a zero dimension cannot be decoded.
    pub fn is_usable(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.data.is_empty()
    }
}

/// Read access to a parsed document. Pages are 1-indexed.
pub trait DocumentBackend {
    fn page_count(&self) -> usize;

    /// Concatenated text content of a page.
    fn page_text(&self, page: usize) -> Result<String, PageError>;

    /// Rasterize a page at the given scale to a grayscale buffer.
    fn render_page(&self, page: usize, scale: f32) -> Result<PixelBuffer, PageError>;
}

/// MuPDF-backed document.
///
/// Opened once per job inside a worker thread, so access is already
/// serialized; all resources are released when the value drops.
pub struct MupdfBackend {
    doc: Document,
    page_count: usize,
}

impl MupdfBackend {
    /// Parse a PDF from bytes. Fails if the buffer is not a valid document.
    pub fn from_bytes(data: &[u8]) -> Result<Self, mupdf::Error> {
        let doc = Document::from_bytes(data, "application/pdf")?;
        let page_count = doc.page_count()? as usize;
        Ok(Self { doc, page_count })
    }

    fn load_page(&self, page: usize) -> Result<mupdf::Page, PageError> {
        if page == 0 || page > self.page_count {
            return Err(PageError::InvalidPage(page));
        }
        self.doc
            .load_page((page - 1) as i32)
            .map_err(|_| PageError::InvalidPage(page))
    }
}

impl DocumentBackend for MupdfBackend {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_text(&self, page: usize) -> Result<String, PageError> {
        let pdf_page = self.load_page(page)?;
        pdf_page.to_text().map_err(|e| PageError::Render {
            page,
            message: format!("text extraction failed: {}", e),
        })
    }

    fn render_page(&self, page: usize, scale: f32) -> Result<PixelBuffer, PageError> {
        let pdf_page = self.load_page(page)?;

        let matrix = Matrix::new_scale(scale, scale);
        let colorspace = Colorspace::device_rgb();
        let pixmap = pdf_page
            .to_pixmap(&matrix, &colorspace, true, false)
            .map_err(|e| PageError::Render {
                page,
                message: e.to_string(),
            })?;

        let width = pixmap.width() as u32;
        let height = pixmap.height() as u32;
        let samples = pixmap.samples();
        let n = pixmap.n() as usize;

        // Collapse the RGB(A) samples to luma for the QR decoder.
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height as usize {
            for x in 0..width as usize {
                let offset = (y * width as usize + x) * n;
                let r = samples.get(offset).copied().unwrap_or(0) as u16;
                let g = samples.get(offset + 1).copied().unwrap_or(0) as u16;
                let b = samples.get(offset + 2).copied().unwrap_or(0) as u16;
                data.push(((r + g + b) / 3) as u8);
            }
        }

        Ok(PixelBuffer {
            data,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unusable_buffers() {
        let empty = PixelBuffer {
            data: Vec::new(),
            width: 0,
            height: 0,
        };
        assert!(!empty.is_usable());

        let zero_width = PixelBuffer {
            data: vec![0; 4],
            width: 0,
            height: 4,
        };
        assert!(!zero_width.is_usable());

        let ok = PixelBuffer {
            data: vec![255; 4],
            width: 2,
            height: 2,
        };
        assert!(ok.is_usable());
    }

    #[test]
    fn test_garbage_bytes_are_not_a_document() {
        assert!(MupdfBackend::from_bytes(b"definitely not a pdf").is_err());
    }
}
