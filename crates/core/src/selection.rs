//! Selection state shared by the page view and the table view
//!
//! A session has at most one selected record. Selecting a record on another
//! page moves the session to that page and needs a full refresh; selecting on
//! the current page only restyles what is already drawn.

use crate::grouping::DEFAULT_GROUP_TOLERANCE;
use crate::record::{PageIndex, RecordId};
use std::collections::BTreeSet;

/// What a state change requires from the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Nothing changed
    None,
    /// Restyle overlay items and table rows only
    HighlightOnly,
    /// Re-rasterize the page and redraw everything
    Full,
}

/// Visual emphasis of one overlay item or table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HighlightTier {
    Neutral,
    Grouped,
    Selected,
}

/// Selected id plus its same-line group, as pushed to both views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightState {
    pub selected: Option<RecordId>,
    pub grouped: BTreeSet<RecordId>,
}

impl HighlightState {
    pub fn new(selected: Option<RecordId>, grouped: BTreeSet<RecordId>) -> Self {
        Self { selected, grouped }
    }

    /// Tier for `id`; selection wins over group membership.
    pub fn tier(&self, id: &str) -> HighlightTier {
        if self.selected.as_deref() == Some(id) {
            HighlightTier::Selected
        } else if self.grouped.contains(id) {
            HighlightTier::Grouped
        } else {
            HighlightTier::Neutral
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_none() && self.grouped.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionState {
    selected_id: Option<RecordId>,
    current_page: u32,
    group_tolerance: f64,
    grouping_enabled: bool,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            selected_id: None,
            current_page: 1,
            group_tolerance: DEFAULT_GROUP_TOLERANCE,
            grouping_enabled: true,
        }
    }
}

impl SelectionState {
    pub fn new(group_tolerance: f64, grouping_enabled: bool) -> Self {
        Self { group_tolerance, grouping_enabled, ..Self::default() }
    }

    /// Select the record `id` from `index`.
    ///
    /// Returns [`RefreshKind::Full`] when the record is on another page (and
    /// moves there), [`RefreshKind::HighlightOnly`] when it is on the current
    /// page, and [`RefreshKind::None`] with no state change for unknown ids.
    pub fn select(&mut self, id: &str, index: &PageIndex) -> RefreshKind {
        let Some(record) = index.find(id) else {
            tracing::debug!(id, "ignoring selection of unknown record");
            return RefreshKind::None;
        };

        self.selected_id = Some(record.id.clone());
        if record.page != self.current_page {
            self.current_page = record.page;
            RefreshKind::Full
        } else {
            RefreshKind::HighlightOnly
        }
    }

    pub fn clear(&mut self) {
        self.selected_id = None;
    }

    /// Drop the selection if `index` no longer contains it.
    ///
    /// Returns true if the selection was cleared.
    pub fn retain_valid(&mut self, index: &PageIndex) -> bool {
        match &self.selected_id {
            Some(id) if !index.contains(id) => {
                tracing::debug!(id = %id, "selected record vanished on reload; clearing selection");
                self.selected_id = None;
                true
            }
            _ => false,
        }
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    /// Move to `page` (1-based) without validating it. Clears the selection.
    pub fn set_current_page(&mut self, page: u32) {
        self.current_page = page;
        self.selected_id = None;
    }

    pub fn group_tolerance(&self) -> f64 {
        self.group_tolerance
    }

    /// Set the grouping tolerance. Negative or non-finite values are ignored.
    ///
    /// Returns true if the value was accepted.
    pub fn set_group_tolerance(&mut self, tolerance: f64) -> bool {
        if !tolerance.is_finite() || tolerance < 0.0 {
            tracing::warn!(tolerance, "rejecting invalid group tolerance");
            return false;
        }
        self.group_tolerance = tolerance;
        true
    }

    pub fn grouping_enabled(&self) -> bool {
        self.grouping_enabled
    }

    pub fn set_grouping_enabled(&mut self, enabled: bool) {
        self.grouping_enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AnnotationRecord, BoundingBox};

    fn index() -> PageIndex {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        PageIndex::build(vec![
            AnnotationRecord::new("1", 1, bbox, "a"),
            AnnotationRecord::new("2", 1, bbox, "b"),
            AnnotationRecord::new("9", 3, bbox, "c"),
        ])
    }

    #[test]
    fn test_select_on_current_page_is_highlight_only() {
        let mut state = SelectionState::default();
        assert_eq!(state.select("2", &index()), RefreshKind::HighlightOnly);
        assert_eq!(state.selected_id(), Some("2"));
        assert_eq!(state.current_page(), 1);
    }

    #[test]
    fn test_select_on_other_page_requests_full_refresh() {
        let mut state = SelectionState::default();
        assert_eq!(state.select("9", &index()), RefreshKind::Full);
        assert_eq!(state.current_page(), 3);
        assert_eq!(state.selected_id(), Some("9"));
    }

    #[test]
    fn test_select_unknown_id_changes_nothing() {
        let mut state = SelectionState::default();
        state.select("1", &index());
        assert_eq!(state.select("404", &index()), RefreshKind::None);
        assert_eq!(state.selected_id(), Some("1"));
    }

    #[test]
    fn test_retain_valid_clears_dangling_selection() {
        let mut state = SelectionState::default();
        state.select("9", &index());

        let reloaded = PageIndex::build(vec![]);
        assert!(state.retain_valid(&reloaded));
        assert_eq!(state.selected_id(), None);
        assert!(!state.retain_valid(&reloaded));
    }

    #[test]
    fn test_tolerance_validation() {
        let mut state = SelectionState::default();
        assert_eq!(state.group_tolerance(), 2.0);
        assert!(state.set_group_tolerance(0.5));
        assert!(!state.set_group_tolerance(-1.0));
        assert!(!state.set_group_tolerance(f64::NAN));
        assert_eq!(state.group_tolerance(), 0.5);
    }

    #[test]
    fn test_highlight_tiers() {
        let grouped: BTreeSet<RecordId> = ["1", "2"].into_iter().map(String::from).collect();
        let state = HighlightState::new(Some("1".into()), grouped);

        assert_eq!(state.tier("1"), HighlightTier::Selected);
        assert_eq!(state.tier("2"), HighlightTier::Grouped);
        assert_eq!(state.tier("3"), HighlightTier::Neutral);
        assert!(HighlightState::default().is_empty());
    }
}
