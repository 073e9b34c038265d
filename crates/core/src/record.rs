//! Annotation records and the page index built over them
//!
//! An [`AnnotationRecord`] is one row of the annotation table: a stable id,
//! the 1-based page it sits on, a bounding box in document units and the
//! text it labels. [`PageIndex`] owns a full record set and answers per-page
//! and per-id lookups in constant time.

use std::collections::HashMap;

/// Stable identity of an annotation record (the `nomor` column).
pub type RecordId = String;

/// Axis-aligned box in document units, origin at the top-left of the page.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl BoundingBox {
    pub fn new(x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self { x0, top, x1, bottom }
    }

    /// Vertical centre of the box, used as the line-grouping key.
    pub fn midline(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Check if a point in document units lies inside the box (edges included).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.top && y <= self.bottom
    }

    /// Scale into view space for the given zoom and origin offset.
    pub fn to_view(&self, origin: Offset, zoom: f64) -> BoundingBox {
        BoundingBox {
            x0: origin.x + self.x0 * zoom,
            top: origin.y + self.top * zoom,
            x1: origin.x + self.x1 * zoom,
            bottom: origin.y + self.bottom * zoom,
        }
    }
}

/// Offset of the page's top-left corner inside the view.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

impl Offset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One row of the annotation table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnnotationRecord {
    /// Stable identity, compared as a string
    pub id: RecordId,

    /// 1-based page number
    pub page: u32,

    /// Bounding box in document units
    pub bbox: BoundingBox,

    /// Free text; may contain the field delimiter or quotes
    pub text: String,

    /// Font name the text was set in (display only)
    pub font_name: String,

    /// Font size in points (display only)
    pub font_size: Option<f64>,
}

impl AnnotationRecord {
    pub fn new(id: impl Into<RecordId>, page: u32, bbox: BoundingBox, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            page,
            bbox,
            text: text.into(),
            font_name: String::new(),
            font_size: None,
        }
    }

    pub fn with_font(mut self, name: impl Into<String>, size: f64) -> Self {
        self.font_name = name.into();
        self.font_size = Some(size);
        self
    }

    pub fn midline(&self) -> f64 {
        self.bbox.midline()
    }
}

/// Collapse newlines to spaces and trim surrounding whitespace.
pub fn normalize_text(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ").trim().to_string()
}

/// Page → records index over a complete record set.
///
/// Built in one pass and never patched in place: any change to the record set
/// goes through [`PageIndex::build`] again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageIndex {
    records: Vec<AnnotationRecord>,
    by_page: HashMap<u32, Vec<usize>>,
    by_id: HashMap<RecordId, usize>,
}

impl PageIndex {
    /// Index `records`, keeping their order within each page.
    ///
    /// If an id appears more than once the first occurrence wins id lookups;
    /// every occurrence still appears in its page listing.
    pub fn build(records: Vec<AnnotationRecord>) -> Self {
        let mut by_page: HashMap<u32, Vec<usize>> = HashMap::new();
        let mut by_id = HashMap::with_capacity(records.len());

        for (position, record) in records.iter().enumerate() {
            by_page.entry(record.page).or_default().push(position);
            by_id.entry(record.id.clone()).or_insert(position);
        }

        Self { records, by_page, by_id }
    }

    /// Records on `page` in table order; empty when the page has none.
    pub fn get(&self, page: u32) -> Vec<&AnnotationRecord> {
        self.by_page
            .get(&page)
            .map(|positions| positions.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    pub fn find(&self, id: &str) -> Option<&AnnotationRecord> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// The full record set in table order.
    pub fn records(&self) -> &[AnnotationRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<AnnotationRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pages that carry at least one record, ascending.
    pub fn pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.by_page.keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    /// Number of records on `page`.
    pub fn page_len(&self, page: u32) -> usize {
        self.by_page.get(&page).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, page: u32, top: f64) -> AnnotationRecord {
        AnnotationRecord::new(id, page, BoundingBox::new(0.0, top, 10.0, top + 10.0), id)
    }

    #[test]
    fn test_midline() {
        let bbox = BoundingBox::new(10.0, 100.0, 50.0, 112.0);
        assert_eq!(bbox.midline(), 106.0);
        assert_eq!(bbox.width(), 40.0);
        assert_eq!(bbox.height(), 12.0);
    }

    #[test]
    fn test_contains_includes_edges() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(bbox.contains(0.0, 10.0));
        assert!(bbox.contains(5.0, 5.0));
        assert!(!bbox.contains(10.1, 5.0));
    }

    #[test]
    fn test_to_view_applies_zoom_then_origin() {
        let bbox = BoundingBox::new(10.0, 20.0, 30.0, 40.0);
        let view = bbox.to_view(Offset::new(5.0, 30.0), 2.0);
        assert_eq!(view, BoundingBox::new(25.0, 70.0, 65.0, 110.0));
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  a\nb\r\nc  "), "a b c");
        assert_eq!(normalize_text("x;y\"z"), "x;y\"z");
    }

    #[test]
    fn test_index_groups_by_page_in_order() {
        let index = PageIndex::build(vec![
            record("1", 1, 0.0),
            record("2", 2, 0.0),
            record("3", 1, 20.0),
        ]);

        let page1: Vec<&str> = index.get(1).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(page1, vec!["1", "3"]);
        assert_eq!(index.page_len(2), 1);
        assert_eq!(index.pages(), vec![1, 2]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_index_missing_page_is_empty() {
        let index = PageIndex::build(vec![record("1", 1, 0.0)]);
        assert!(index.get(7).is_empty());
        assert_eq!(index.page_len(7), 0);
    }

    #[test]
    fn test_find_by_id_first_occurrence_wins() {
        let index = PageIndex::build(vec![record("1", 1, 0.0), record("1", 3, 0.0)]);
        assert_eq!(index.find("1").map(|r| r.page), Some(1));
        assert_eq!(index.get(3).len(), 1);
        assert!(index.find("9").is_none());
        assert!(!index.contains("9"));
    }
}
