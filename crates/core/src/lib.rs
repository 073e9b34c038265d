//! Overlay Viewer Core Library
//!
//! Annotation overlay model for paginated documents: the semicolon table of
//! positioned records, the page index over it, same-line grouping, selection
//! and highlight state, shared layer visibility, and the session that keeps
//! all of it in sync with a presentation.

pub mod annotation_cache;
pub mod config;
pub mod decimal;
pub mod export;
pub mod grouping;
pub mod presentation;
pub mod record;
pub mod renderer;
pub mod selection;
pub mod session;
pub mod visibility;
pub mod word_cache;

pub use annotation_cache::{
    annotation_path_for, load_table, read_table, save_table, write_table, AnnotationCache,
    LoadError, ParsedTable, RecordEdit, RowError, RowErrorKind, SaveError, HEADER,
};
pub use config::{ConfigError, ViewerConfig, ZoomConfig};
pub use export::{export_page_text, parse_page_ranges, ExportError};
pub use grouping::{group, group_for_id, parse_tolerance, DEFAULT_GROUP_TOLERANCE};
pub use presentation::{OverlayItem, OverlayLayer, Presentation, ScrollRegion, StatusInfo};
pub use record::{normalize_text, AnnotationRecord, BoundingBox, Offset, PageIndex, RecordId};
pub use renderer::{PageSize, Renderer, RendererError, RgbaImage, StaticDocument, TextRun, WordSpan};
pub use selection::{HighlightState, HighlightTier, RefreshKind, SelectionState};
pub use session::{NavigationError, SessionCoordinator, SessionError, SessionResult, SharedSession};
pub use visibility::{LayerFlag, LayerObserver, Subscription, VisibilityBroadcaster};
pub use word_cache::WordCache;
