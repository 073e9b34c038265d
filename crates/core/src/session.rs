//! Document session: one open document with its caches and selection
//!
//! A [`SessionCoordinator`] owns the annotation cache, word cache and
//! selection state of exactly one document, and turns every change (page,
//! zoom, selection, layer toggle, edit) into calls on its [`Presentation`].
//! [`refresh`](SessionCoordinator::refresh) is the single place where view
//! state is derived from the model.
//!
//! Sessions share layer visibility through a [`VisibilityBroadcaster`] handed
//! in at construction. Wrap a session with
//! [`into_shared`](SessionCoordinator::into_shared) to have it redraw on every
//! toggle made anywhere in the process.

use crate::annotation_cache::{
    annotation_path_for, AnnotationCache, LoadError, RecordEdit, SaveError, HEADER,
};
use crate::config::{ViewerConfig, ZoomConfig};
use crate::export::{export_page_text, parse_page_ranges, ExportError};
use crate::grouping::{group_for_id, parse_tolerance};
use crate::presentation::{OverlayItem, OverlayLayer, Presentation, ScrollRegion, StatusInfo};
use crate::record::{AnnotationRecord, Offset, PageIndex};
use crate::renderer::{Renderer, RendererError};
use crate::selection::{HighlightState, HighlightTier, RefreshKind, SelectionState};
use crate::visibility::{LayerFlag, LayerObserver, VisibilityBroadcaster};
use crate::word_cache::WordCache;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Errors for page navigation
#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("no document is open")]
    NoDocument,

    #[error("page {requested} out of range (page_count={page_count})")]
    OutOfRange { requested: i64, page_count: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error("renderer error: {0}")]
    Renderer(#[from] RendererError),

    #[error("failed to load annotations: {0}")]
    Load(#[from] LoadError),

    #[error("failed to save annotations: {0}")]
    Save(#[from] SaveError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    #[error("no annotation record with id {0:?}")]
    UnknownRecord(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// A session that can be registered with the broadcaster.
pub type SharedSession<R, P> = Rc<RefCell<SessionCoordinator<R, P>>>;

pub struct SessionCoordinator<R, P> {
    broadcaster: VisibilityBroadcaster,
    presentation: P,
    document: Option<R>,
    annotations: AnnotationCache,
    words: WordCache,
    selection: SelectionState,
    /// Current page's records as of the last full refresh
    working_set: Vec<AnnotationRecord>,
    zoom: f64,
    zoom_limits: ZoomConfig,
    padding: f64,
    viewport: (f64, f64),
    origin: Offset,
}

impl<R, P> SessionCoordinator<R, P>
where
    R: Renderer,
    P: Presentation,
{
    pub fn new(broadcaster: VisibilityBroadcaster, presentation: P, config: &ViewerConfig) -> Self {
        Self {
            broadcaster,
            presentation,
            document: None,
            annotations: AnnotationCache::new(),
            words: WordCache::from_capacity(config.word_cache_capacity),
            selection: SelectionState::new(config.group_tolerance, config.grouping_enabled),
            working_set: Vec::new(),
            zoom: config.zoom.clamp(config.zoom.initial),
            zoom_limits: config.zoom,
            padding: config.page_padding,
            viewport: (0.0, 0.0),
            origin: Offset::default(),
        }
    }

    /// Session with its own broadcaster seeded from `config`, for hosts with
    /// a single document view.
    pub fn with_config(presentation: P, config: &ViewerConfig) -> Self {
        Self::new(VisibilityBroadcaster::from_config(config), presentation, config)
    }

    /// Move the session behind `Rc<RefCell<_>>` and subscribe it to layer
    /// toggles. The broadcaster only keeps a weak reference.
    pub fn into_shared(self) -> SharedSession<R, P>
    where
        R: 'static,
        P: 'static,
    {
        let broadcaster = self.broadcaster.clone();
        let shared = Rc::new(RefCell::new(self));
        broadcaster.observe(&shared);
        shared
    }

    /// Open `document`, loading annotations from `annotation_source` if given
    /// and present on disk.
    ///
    /// The document stays open even if the annotations fail to load; the load
    /// error is returned after the first refresh.
    pub fn open_document(&mut self, document: R, annotation_source: Option<&Path>) -> SessionResult<()> {
        self.reset();
        self.document = Some(document);

        let loaded = match annotation_source {
            Some(path) if path.exists() => self.annotations.load(path).map(|_| ()),
            _ => Ok(()),
        };

        self.refresh(true)?;
        loaded.map_err(SessionError::from)
    }

    /// Open `document` read from `path`, with annotations from the `.csv`
    /// file of the same name.
    pub fn open_document_at(&mut self, document: R, path: &Path) -> SessionResult<()> {
        let annotation_source = annotation_path_for(path);
        self.open_document(document, Some(&annotation_source))
    }

    pub fn close_document(&mut self) {
        self.reset();
        for layer in OverlayLayer::ALL {
            self.presentation.clear_layer(layer);
        }
    }

    fn reset(&mut self) {
        self.document = None;
        self.annotations.clear();
        self.words.clear();
        self.working_set.clear();
        self.selection.set_current_page(1);
        self.zoom = self.zoom_limits.clamp(self.zoom_limits.initial);
    }

    /// Recompute all derived view state and push it to the presentation.
    ///
    /// With `full` the page is rasterized again and the page's annotation
    /// records are re-read from the cache; otherwise the previous raster is
    /// kept and only the layout offset and overlays are redone.
    pub fn refresh(&mut self, full: bool) -> SessionResult<()> {
        let Some(document) = self.document.as_ref() else {
            return Ok(());
        };

        let page = self.selection.current_page();
        let page_index = page - 1;
        let size = document.page_size(page_index)?;
        let zoom = self.zoom;
        let (viewport_width, _) = self.viewport;

        if full {
            let raster = document.render(page_index, zoom)?;
            let (width, height) = (f64::from(raster.width()), f64::from(raster.height()));
            let origin = Offset::new(((viewport_width - width) / 2.0).max(0.0), self.padding);
            let region = ScrollRegion {
                x: 0.0,
                y: 0.0,
                width: viewport_width.max(width),
                height: height + origin.y * 2.0,
            };

            self.presentation.draw_raster(&raster, origin, region);
            self.presentation.draw_rulers(size.width, size.height, origin, zoom);
            self.origin = origin;
            self.working_set = self.annotations.get(page).into_iter().cloned().collect();
        } else {
            self.origin = Offset::new(
                ((viewport_width - size.width * zoom) / 2.0).max(0.0),
                self.padding,
            );
        }

        let highlight = self.highlight_state();
        let origin = self.origin;

        let words = self.words.try_get_or_fetch(page, || document.extract_words(page_index))?;
        if self.broadcaster.get(OverlayLayer::Text.flag()) {
            let items: Vec<OverlayItem> = words
                .iter()
                .map(|word| OverlayItem {
                    id: None,
                    bbox: word.bbox,
                    text: word.text.clone(),
                    tier: HighlightTier::Neutral,
                })
                .collect();
            self.presentation.draw_layer(OverlayLayer::Text, &items, origin, zoom);
        } else {
            self.presentation.clear_layer(OverlayLayer::Text);
        }

        if self.broadcaster.get(OverlayLayer::Annotations.flag()) {
            let items: Vec<OverlayItem> = self
                .working_set
                .iter()
                .map(|record| OverlayItem {
                    id: Some(record.id.clone()),
                    bbox: record.bbox,
                    text: record.text.clone(),
                    tier: highlight.tier(&record.id),
                })
                .collect();
            self.presentation.draw_layer(OverlayLayer::Annotations, &items, origin, zoom);
        } else {
            self.presentation.clear_layer(OverlayLayer::Annotations);
        }

        let status = StatusInfo {
            page,
            page_count: document.page_count(),
            zoom,
            page_has_text: !document.extract_text(page_index)?.trim().is_empty(),
            page_width: size.width,
            page_height: size.height,
            has_annotations: self.annotations.is_loaded(),
            grouping_available: self.annotations.is_loaded(),
        };
        self.presentation.update_status(&status);

        if self.selection.selected_id().is_some() {
            self.presentation.highlight_items(&highlight);
            self.presentation.highlight_rows(&highlight);
        }

        Ok(())
    }

    /// Selected id and its same-line group on the current page.
    ///
    /// The group is empty when grouping is switched off.
    pub fn highlight_state(&self) -> HighlightState {
        let selected = self.selection.selected_id();
        let grouped = if self.selection.grouping_enabled() {
            let candidates: Vec<&AnnotationRecord> = self.working_set.iter().collect();
            group_for_id(selected, &candidates, self.selection.group_tolerance())
        } else {
            Default::default()
        };

        HighlightState::new(selected.map(str::to_string), grouped)
    }

    /// Push the current highlight to both the page view and the table view.
    pub fn propagate_highlight(&mut self) {
        let highlight = self.highlight_state();
        self.presentation.highlight_items(&highlight);
        self.presentation.highlight_rows(&highlight);
    }

    /// Full refresh after a page change; on failure the previous selection
    /// and page are put back and redrawn.
    fn refresh_or_restore(&mut self, previous: SelectionState) -> SessionResult<()> {
        let Err(err) = self.refresh(true) else {
            return Ok(());
        };

        self.selection = previous;
        self.rederive_working_set();
        if let Err(restore_err) = self.refresh(true) {
            tracing::warn!(error = %restore_err, "redrawing previous page failed");
        }
        Err(err)
    }

    /// Select the record `id`, moving to its page if needed.
    ///
    /// Unknown ids leave the selection untouched and return
    /// [`RefreshKind::None`]. A record whose page is not in the document is
    /// rejected with [`NavigationError::OutOfRange`] and nothing changes.
    pub fn select(&mut self, id: &str) -> SessionResult<RefreshKind> {
        let Some(document) = self.document.as_ref() else {
            return Ok(RefreshKind::None);
        };

        let page_count = document.page_count();
        if let Some(record) = self.annotations.index().find(id) {
            if record.page < 1 || record.page > page_count {
                return Err(NavigationError::OutOfRange {
                    requested: i64::from(record.page),
                    page_count,
                }
                .into());
            }
        }

        let previous = self.selection.clone();
        let kind = self.selection.select(id, self.annotations.index());
        match kind {
            RefreshKind::Full => self.refresh_or_restore(previous)?,
            RefreshKind::HighlightOnly => self.propagate_highlight(),
            RefreshKind::None => {}
        }
        Ok(kind)
    }

    /// A row was clicked in the table view.
    pub fn on_row_click(&mut self, id: &str) -> SessionResult<RefreshKind> {
        if self.selection.selected_id() == Some(id) {
            return Ok(RefreshKind::None);
        }
        self.select(id)
    }

    /// An annotation box was clicked on the page.
    pub fn on_overlay_click(&mut self, id: &str) -> SessionResult<RefreshKind> {
        self.select(id)
    }

    pub fn clear_selection(&mut self) {
        if self.selection.selected_id().is_some() {
            self.selection.clear();
            self.propagate_highlight();
        }
    }

    /// Move by `delta` pages. Out-of-range targets are rejected unchanged.
    pub fn move_page(&mut self, delta: i64) -> SessionResult<()> {
        let target = i64::from(self.selection.current_page()) + delta;
        self.go_to(target)
    }

    pub fn next_page(&mut self) -> SessionResult<()> {
        self.move_page(1)
    }

    pub fn previous_page(&mut self) -> SessionResult<()> {
        self.move_page(-1)
    }

    /// Jump to the 1-based `page`. Out-of-range pages are rejected unchanged.
    pub fn jump_to_page(&mut self, page: u32) -> SessionResult<()> {
        self.go_to(i64::from(page))
    }

    fn go_to(&mut self, target: i64) -> SessionResult<()> {
        let page_count = self.document.as_ref().ok_or(NavigationError::NoDocument)?.page_count();
        if target < 1 || target > i64::from(page_count) {
            return Err(NavigationError::OutOfRange { requested: target, page_count }.into());
        }

        let previous = self.selection.clone();
        let had_selection = previous.selected_id().is_some();
        self.selection.set_current_page(target as u32);
        self.refresh_or_restore(previous)?;

        if had_selection {
            self.propagate_highlight();
        }
        Ok(())
    }

    pub fn zoom_in(&mut self) -> SessionResult<()> {
        self.set_zoom(self.zoom + self.zoom_limits.step)
    }

    pub fn zoom_out(&mut self) -> SessionResult<()> {
        self.set_zoom(self.zoom - self.zoom_limits.step)
    }

    /// Set the zoom factor, clamped to the configured limits.
    pub fn set_zoom(&mut self, zoom: f64) -> SessionResult<()> {
        let rounded = (zoom * 100.0).round() / 100.0;
        self.zoom = self.zoom_limits.clamp(rounded);
        tracing::debug!(zoom = self.zoom, "zoom changed");
        self.refresh(true)
    }

    pub fn resize_viewport(&mut self, width: f64, height: f64) -> SessionResult<()> {
        self.viewport = (width.max(0.0), height.max(0.0));
        self.refresh(false)
    }

    /// Change the grouping tolerance; takes effect on the current highlight at once.
    ///
    /// Returns false if the value was rejected.
    pub fn set_group_tolerance(&mut self, tolerance: f64) -> bool {
        let accepted = self.selection.set_group_tolerance(tolerance);
        if accepted && self.selection.selected_id().is_some() {
            self.propagate_highlight();
        }
        accepted
    }

    /// Like [`set_group_tolerance`](Self::set_group_tolerance) from user
    /// input; `,` is accepted as the decimal separator.
    pub fn set_group_tolerance_text(&mut self, raw: &str) -> bool {
        match parse_tolerance(raw) {
            Some(tolerance) => self.set_group_tolerance(tolerance),
            None => {
                tracing::warn!(input = raw, "ignoring unparsable group tolerance");
                false
            }
        }
    }

    pub fn set_grouping_enabled(&mut self, enabled: bool) {
        self.selection.set_grouping_enabled(enabled);
        if self.selection.selected_id().is_some() {
            self.propagate_highlight();
        }
    }

    /// Apply a table edit to record `id`, save the whole table and reload it.
    ///
    /// If the save fails the edit is kept in memory (and shown), and the
    /// error is returned.
    pub fn apply_edit(&mut self, id: &str, edit: RecordEdit) -> SessionResult<()> {
        if !self.annotations.edit(id, edit) {
            return Err(SessionError::UnknownRecord(id.to_string()));
        }

        if let Err(err) = self.annotations.save_current() {
            self.rederive_working_set();
            if let Err(refresh_err) = self.refresh(false) {
                tracing::warn!(error = %refresh_err, "refresh after failed save failed");
            }
            return Err(err.into());
        }

        self.reload_annotations()
    }

    /// Discard the annotation index and read the table from disk again.
    ///
    /// If the read fails the previous records, selection and view stay as
    /// they were.
    pub fn reload_annotations(&mut self) -> SessionResult<()> {
        let Some(source) = self.annotations.source().map(Path::to_path_buf) else {
            return Ok(());
        };

        self.annotations.invalidate_and_reload(&source)?;
        tracing::info!(path = %source.display(), "annotations reloaded");

        self.selection.retain_valid(self.annotations.index());
        self.rederive_working_set();
        self.refresh(false)?;
        if self.selection.selected_id().is_none() {
            self.propagate_highlight();
        }
        Ok(())
    }

    fn rederive_working_set(&mut self) {
        let page = self.selection.current_page();
        self.working_set = self.annotations.get(page).into_iter().cloned().collect();
    }

    /// Show every annotation row in the table view, with the current highlight.
    pub fn open_table(&mut self) {
        if !self.annotations.is_loaded() {
            return;
        }

        let rows = self.annotations.table_rows();
        self.presentation.show_table(&HEADER, &rows);
        let highlight = self.highlight_state();
        self.presentation.highlight_rows(&highlight);
    }

    /// Export the text of the pages in `range_expression` (e.g. `"1, 3-5"`)
    /// to `path`, reporting progress to the presentation.
    pub fn export_pages(&mut self, path: &Path, range_expression: &str) -> SessionResult<usize> {
        let document = self.document.as_ref().ok_or(NavigationError::NoDocument)?;
        let indices = parse_page_ranges(range_expression, document.page_count())?;

        let presentation = &mut self.presentation;
        let written =
            export_page_text(document, path, &indices, |percent| presentation.report_progress(percent))?;

        self.refresh(false)?;
        Ok(written)
    }

    /// Report the pointer position in document units while the live
    /// coordinate readout is on and the pointer is over the page.
    pub fn pointer_moved(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        let position = if self.broadcaster.get(LayerFlag::LiveCoordinates) {
            self.document_position(x, y)
        } else {
            None
        };

        self.presentation.show_pointer_position(position);
        position
    }

    fn document_position(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let document = self.document.as_ref()?;
        let size = document.page_size(self.selection.current_page() - 1).ok()?;

        let doc_x = (x - self.origin.x) / self.zoom;
        let doc_y = (y - self.origin.y) / self.zoom;
        let inside = (0.0..=size.width).contains(&doc_x) && (0.0..=size.height).contains(&doc_y);

        inside.then_some((doc_x, doc_y))
    }

    fn on_layer_changed(&mut self, flag: LayerFlag, visible: bool) {
        if flag == LayerFlag::LiveCoordinates && !visible {
            self.presentation.show_pointer_position(None);
        }

        if let Err(err) = self.refresh(false) {
            tracing::warn!(%flag, error = %err, "refresh after visibility change failed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.document.is_some()
    }

    pub fn document(&self) -> Option<&R> {
        self.document.as_ref()
    }

    /// 1-based current page.
    pub fn current_page(&self) -> u32 {
        self.selection.current_page()
    }

    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map_or(0, |document| document.page_count())
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn origin(&self) -> Offset {
        self.origin
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selection.selected_id()
    }

    pub fn annotations(&self) -> &AnnotationCache {
        &self.annotations
    }

    pub fn index(&self) -> &PageIndex {
        self.annotations.index()
    }

    pub fn word_cache(&self) -> &WordCache {
        &self.words
    }

    /// Records of the current page as last derived.
    pub fn working_set(&self) -> &[AnnotationRecord] {
        &self.working_set
    }

    pub fn broadcaster(&self) -> &VisibilityBroadcaster {
        &self.broadcaster
    }

    pub fn presentation(&self) -> &P {
        &self.presentation
    }

    pub fn presentation_mut(&mut self) -> &mut P {
        &mut self.presentation
    }
}

impl<R, P> LayerObserver for RefCell<SessionCoordinator<R, P>>
where
    R: Renderer,
    P: Presentation,
{
    fn layer_visibility_changed(&self, flag: LayerFlag, visible: bool) {
        match self.try_borrow_mut() {
            Ok(mut session) => session.on_layer_changed(flag, visible),
            Err(_) => tracing::warn!(%flag, "session busy; skipped visibility refresh"),
        }
    }
}
