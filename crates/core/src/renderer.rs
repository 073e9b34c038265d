//! Document renderer seam
//!
//! The viewer never parses or rasterizes documents itself. A [`Renderer`] is
//! one opened document: it reports page geometry, rasterizes a page at a zoom
//! factor and extracts the page's positioned text.

use crate::record::BoundingBox;
use image::{ImageBuffer, Rgba};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Page dimensions in document units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A word as extracted from the page. Not editable and has no identity.
#[derive(Debug, Clone, PartialEq)]
pub struct WordSpan {
    pub bbox: BoundingBox,
    pub text: String,
}

impl WordSpan {
    pub fn new(bbox: BoundingBox, text: impl Into<String>) -> Self {
        Self { bbox, text: text.into() }
    }
}

/// A run of text set in one font, as used by page-range export.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub bbox: BoundingBox,
    pub text: String,
    pub font_name: String,
    pub font_size: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("page index {page_index} out of range (page_count={page_count})")]
    PageOutOfRange { page_index: u32, page_count: u32 },
    #[error("backend error: {0}")]
    Backend(String),
}

/// An opened document. Page indices are 0-based.
pub trait Renderer {
    fn page_count(&self) -> u32;

    fn page_size(&self, page_index: u32) -> Result<PageSize, RendererError>;

    fn render(&self, page_index: u32, zoom: f64) -> Result<RgbaImage, RendererError>;

    fn extract_words(&self, page_index: u32) -> Result<Vec<WordSpan>, RendererError>;

    /// Plain text of the page; only used to tell empty pages from text pages.
    fn extract_text(&self, page_index: u32) -> Result<String, RendererError>;

    fn extract_runs(&self, page_index: u32) -> Result<Vec<TextRun>, RendererError>;

    fn check_page(&self, page_index: u32) -> Result<(), RendererError> {
        let page_count = self.page_count();
        if page_index < page_count {
            Ok(())
        } else {
            Err(RendererError::PageOutOfRange { page_index, page_count })
        }
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn page_count(&self) -> u32 {
        (**self).page_count()
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize, RendererError> {
        (**self).page_size(page_index)
    }

    fn render(&self, page_index: u32, zoom: f64) -> Result<RgbaImage, RendererError> {
        (**self).render(page_index, zoom)
    }

    fn extract_words(&self, page_index: u32) -> Result<Vec<WordSpan>, RendererError> {
        (**self).extract_words(page_index)
    }

    fn extract_text(&self, page_index: u32) -> Result<String, RendererError> {
        (**self).extract_text(page_index)
    }

    fn extract_runs(&self, page_index: u32) -> Result<Vec<TextRun>, RendererError> {
        (**self).extract_runs(page_index)
    }
}

/// In-memory document with fixed pages, for tests and headless use.
///
/// Each page rasterizes to a blank white image of the zoomed page size.
#[derive(Debug, Clone, Default)]
pub struct StaticDocument {
    pages: Vec<StaticPage>,
}

#[derive(Debug, Clone)]
pub struct StaticPage {
    pub size: PageSize,
    pub runs: Vec<TextRun>,
}

impl StaticDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, size: PageSize, runs: Vec<TextRun>) -> Self {
        self.pages.push(StaticPage { size, runs });
        self
    }

    pub fn with_blank_pages(mut self, count: u32, size: PageSize) -> Self {
        for _ in 0..count {
            self.pages.push(StaticPage { size, runs: Vec::new() });
        }
        self
    }

    fn page(&self, page_index: u32) -> Result<&StaticPage, RendererError> {
        self.pages.get(page_index as usize).ok_or(RendererError::PageOutOfRange {
            page_index,
            page_count: self.page_count(),
        })
    }
}

impl Renderer for StaticDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize, RendererError> {
        Ok(self.page(page_index)?.size)
    }

    fn render(&self, page_index: u32, zoom: f64) -> Result<RgbaImage, RendererError> {
        let size = self.page(page_index)?.size;
        let zoom = if zoom <= 0.0 { 1.0 } else { zoom };
        let width = (size.width * zoom).round().max(1.0) as u32;
        let height = (size.height * zoom).round().max(1.0) as u32;

        Ok(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
    }

    fn extract_words(&self, page_index: u32) -> Result<Vec<WordSpan>, RendererError> {
        let page = self.page(page_index)?;
        Ok(page.runs.iter().map(|run| WordSpan::new(run.bbox, run.text.clone())).collect())
    }

    fn extract_text(&self, page_index: u32) -> Result<String, RendererError> {
        let page = self.page(page_index)?;
        Ok(page.runs.iter().map(|run| run.text.as_str()).collect::<Vec<_>>().join(" "))
    }

    fn extract_runs(&self, page_index: u32) -> Result<Vec<TextRun>, RendererError> {
        Ok(self.page(page_index)?.runs.clone())
    }
}
