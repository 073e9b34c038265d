//! Presentation seam for the page view and the table view
//!
//! The session decides *what* to show; a [`Presentation`] implementation
//! decides how. Overlay items always arrive with their highlight tier so the
//! three-tier styling (selected / grouped / neutral) is never left to the
//! drawing side to work out.

use crate::record::{BoundingBox, Offset, RecordId};
use crate::renderer::RgbaImage;
use crate::selection::{HighlightState, HighlightTier};
use crate::visibility::LayerFlag;

/// The overlay layers drawn on top of the page raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayLayer {
    /// Extracted word boxes
    Text,
    /// Annotation record boxes
    Annotations,
}

impl OverlayLayer {
    pub const ALL: [OverlayLayer; 2] = [OverlayLayer::Text, OverlayLayer::Annotations];

    /// The visibility flag that toggles this layer.
    pub fn flag(self) -> LayerFlag {
        match self {
            OverlayLayer::Text => LayerFlag::TextLayer,
            OverlayLayer::Annotations => LayerFlag::AnnotationLayer,
        }
    }

    pub fn name(self) -> &'static str {
        self.flag().name()
    }
}

/// One box to draw on an overlay layer, in document units.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayItem {
    /// Record id for annotation items; `None` for extracted words
    pub id: Option<RecordId>,
    pub bbox: BoundingBox,
    pub text: String,
    pub tier: HighlightTier,
}

/// Scrollable area for the raster: `(x, y, width, height)` in view pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Status line contents pushed after every refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusInfo {
    /// 1-based current page
    pub page: u32,
    pub page_count: u32,
    pub zoom: f64,
    /// Whether the page has any extractable text
    pub page_has_text: bool,
    pub page_width: f64,
    pub page_height: f64,
    /// Whether annotation data is attached to the document
    pub has_annotations: bool,
    /// Whether the grouping controls should be enabled
    pub grouping_available: bool,
}

/// Everything the session draws or reports.
pub trait Presentation {
    fn draw_raster(&mut self, image: &RgbaImage, origin: Offset, scroll_region: ScrollRegion);

    fn draw_rulers(&mut self, doc_width: f64, doc_height: f64, origin: Offset, zoom: f64);

    fn draw_layer(&mut self, layer: OverlayLayer, items: &[OverlayItem], origin: Offset, zoom: f64);

    fn clear_layer(&mut self, layer: OverlayLayer);

    /// Restyle already drawn annotation items without redrawing them.
    fn highlight_items(&mut self, highlight: &HighlightState);

    /// Mark the selected and grouped rows in the table view.
    fn highlight_rows(&mut self, highlight: &HighlightState);

    /// Replace the table view contents.
    fn show_table(&mut self, header: &[&str], rows: &[[String; 10]]);

    fn update_status(&mut self, status: &StatusInfo);

    /// Pointer position in document units, or `None` to hide the readout.
    fn show_pointer_position(&mut self, position: Option<(f64, f64)>);

    /// Export progress, 0 to 100.
    fn report_progress(&mut self, percent: u8);
}
