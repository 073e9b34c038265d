//! Annotation table loading, persistence and the per-document cache
//!
//! The table is a `;`-delimited UTF-8 file with a byte-order mark and a fixed
//! header. Numbers use `,` as the decimal separator. Rows whose page or
//! coordinates do not parse are skipped and reported, never fatal.
//!
//! [`AnnotationCache`] reads the table once, indexes it by page and writes the
//! whole record set back atomically after edits.

use crate::decimal::{format_decimal, parse_decimal};
use crate::record::{normalize_text, AnnotationRecord, BoundingBox, PageIndex, RecordId};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Column order of the annotation table.
pub const HEADER: [&str; 10] = [
    "nomor",
    "halaman",
    "teks",
    "x0",
    "x1",
    "top",
    "bottom",
    "font_style",
    "font_size",
    "sumbu",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const DELIMITER: u8 = b';';
const QUOTE: u8 = b'"';

/// Error types for loading the annotation table
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing column `{0}` in header")]
    MissingColumn(&'static str),
}

/// Error types for writing the annotation table
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no annotation source is attached")]
    NoSource,
}

impl SaveError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// Why a single row was skipped during load.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based line of the row in the file (header is line 1)
    pub line: u64,
    pub reason: RowErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowErrorKind {
    /// Fewer fields than the header requires
    MissingField(&'static str),
    /// `halaman` is not a positive integer
    InvalidPage(String),
    /// A coordinate column is not a number
    InvalidCoordinate { column: &'static str, value: String },
}

impl std::fmt::Display for RowErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowErrorKind::MissingField(column) => write!(f, "missing field `{column}`"),
            RowErrorKind::InvalidPage(value) => write!(f, "invalid page number {value:?}"),
            RowErrorKind::InvalidCoordinate { column, value } => {
                write!(f, "invalid `{column}` coordinate {value:?}")
            }
        }
    }
}

/// Result of parsing a table: the usable records plus the rows that were dropped.
#[derive(Debug, Clone, Default)]
pub struct ParsedTable {
    pub records: Vec<AnnotationRecord>,
    pub skipped: Vec<RowError>,
}

/// Positions of the named columns within the header row.
struct Columns {
    id: usize,
    page: usize,
    text: usize,
    x0: usize,
    x1: usize,
    top: usize,
    bottom: usize,
    font_style: Option<usize>,
    font_size: Option<usize>,
}

impl Columns {
    fn locate(header: &csv::StringRecord) -> Result<Self, LoadError> {
        let find = |name: &'static str| header.iter().position(|h| h.trim() == name);
        let require = |name: &'static str| find(name).ok_or(LoadError::MissingColumn(name));

        Ok(Self {
            id: require("nomor")?,
            page: require("halaman")?,
            text: require("teks")?,
            x0: require("x0")?,
            x1: require("x1")?,
            top: require("top")?,
            bottom: require("bottom")?,
            font_style: find("font_style"),
            font_size: find("font_size"),
        })
    }
}

fn field<'r>(
    row: &'r csv::StringRecord,
    index: usize,
    name: &'static str,
) -> Result<&'r str, RowErrorKind> {
    row.get(index).ok_or(RowErrorKind::MissingField(name))
}

fn coordinate(
    row: &csv::StringRecord,
    index: usize,
    name: &'static str,
) -> Result<f64, RowErrorKind> {
    let raw = field(row, index, name)?;
    parse_decimal(raw)
        .ok_or_else(|| RowErrorKind::InvalidCoordinate { column: name, value: raw.to_string() })
}

fn parse_row(row: &csv::StringRecord, columns: &Columns) -> Result<AnnotationRecord, RowErrorKind> {
    let id = field(row, columns.id, "nomor")?.trim().to_string();

    let raw_page = field(row, columns.page, "halaman")?;
    let page = raw_page
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|page| *page >= 1)
        .ok_or_else(|| RowErrorKind::InvalidPage(raw_page.to_string()))?;

    let bbox = BoundingBox::new(
        coordinate(row, columns.x0, "x0")?,
        coordinate(row, columns.top, "top")?,
        coordinate(row, columns.x1, "x1")?,
        coordinate(row, columns.bottom, "bottom")?,
    );

    let text = field(row, columns.text, "teks")?.to_string();
    let font_name = columns
        .font_style
        .and_then(|i| row.get(i))
        .unwrap_or_default()
        .to_string();
    let font_size = columns.font_size.and_then(|i| row.get(i)).and_then(parse_decimal);

    Ok(AnnotationRecord { id, page, bbox, text, font_name, font_size })
}

/// Parse an annotation table from any reader.
///
/// A leading byte-order mark is accepted. Malformed rows are collected in
/// [`ParsedTable::skipped`]; only an unreadable stream or a header without the
/// required columns fails the whole parse.
pub fn read_table<R: Read>(mut reader: R) -> Result<ParsedTable, LoadError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|source| LoadError::Io { path: PathBuf::new(), source })?;
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .quote(QUOTE)
        .has_headers(true)
        .flexible(true)
        .from_reader(body);

    let columns = Columns::locate(csv_reader.headers()?)?;
    let mut table = ParsedTable::default();
    let mut lines = LineCounter::new(body);

    for row in csv_reader.records() {
        let row = row?;
        let line = lines.line_at(row.position().map_or(0, |p| p.byte()));

        match parse_row(&row, &columns) {
            Ok(record) => table.records.push(record),
            Err(reason) => {
                tracing::warn!(line, %reason, "skipping malformed annotation row");
                table.skipped.push(RowError { line, reason });
            }
        }
    }

    Ok(table)
}

/// Maps byte offsets of row starts to 1-based line numbers.
///
/// Counts `\n` bytes, so LF and CRLF files number the same way. Offsets must
/// be non-decreasing between calls.
struct LineCounter<'a> {
    body: &'a [u8],
    scanned: usize,
    line: u64,
}

impl<'a> LineCounter<'a> {
    fn new(body: &'a [u8]) -> Self {
        Self { body, scanned: 0, line: 1 }
    }

    fn line_at(&mut self, byte: u64) -> u64 {
        let end = usize::try_from(byte).unwrap_or(usize::MAX).clamp(self.scanned, self.body.len());
        let newlines = self.body[self.scanned..end].iter().filter(|&&b| b == b'\n').count();
        self.line += newlines as u64;
        self.scanned = end;
        self.line
    }
}

/// Serialize a record into table fields, in [`HEADER`] order.
pub fn record_to_row(record: &AnnotationRecord) -> [String; 10] {
    let bbox = &record.bbox;
    [
        record.id.clone(),
        record.page.to_string(),
        normalize_text(&record.text),
        format_decimal(bbox.x0),
        format_decimal(bbox.x1),
        format_decimal(bbox.top),
        format_decimal(bbox.bottom),
        record.font_name.clone(),
        record.font_size.map(format_decimal).unwrap_or_default(),
        format_decimal(bbox.midline()),
    ]
}

/// Write the full table (BOM, header and one row per record) to `writer`.
///
/// Fields are quoted only when they contain the delimiter, the quote
/// character or a line break.
pub fn write_table<W: Write>(mut writer: W, records: &[AnnotationRecord]) -> Result<(), SaveError> {
    writer
        .write_all(UTF8_BOM)
        .map_err(|source| SaveError::io(Path::new(""), source))?;

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .quote(QUOTE)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);

    csv_writer.write_record(HEADER)?;
    for record in records {
        csv_writer.write_record(record_to_row(record))?;
    }

    csv_writer
        .flush()
        .map_err(|source| SaveError::io(Path::new(""), source))?;
    Ok(())
}

/// Write the table to `path` via a sibling temp file and a rename, so the old
/// content is only replaced once the new content is fully on disk.
pub fn save_table(path: &Path, records: &[AnnotationRecord]) -> Result<(), SaveError> {
    let temp_path = temp_path_for(path);

    let result = (|| {
        let mut file = fs::File::create(&temp_path).map_err(|e| SaveError::io(&temp_path, e))?;
        write_table(&mut file, records).map_err(|err| match err {
            SaveError::Io { source, .. } => SaveError::io(&temp_path, source),
            other => other,
        })?;
        file.sync_all().map_err(|e| SaveError::io(&temp_path, e))?;
        fs::rename(&temp_path, path).map_err(|e| SaveError::io(path, e))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read and parse the table at `path`.
pub fn load_table(path: &Path) -> Result<ParsedTable, LoadError> {
    let file = fs::File::open(path)
        .map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
    read_table(file).map_err(|err| match err {
        LoadError::Io { source, .. } => LoadError::Io { path: path.to_path_buf(), source },
        other => other,
    })
}

/// A single-field change to one record, as made from the table view.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEdit {
    Text(String),
    Page(u32),
    BoundingBox(BoundingBox),
    FontName(String),
    FontSize(Option<f64>),
}

impl RecordEdit {
    fn apply(self, record: &mut AnnotationRecord) {
        match self {
            RecordEdit::Text(text) => record.text = normalize_text(&text),
            RecordEdit::Page(page) => record.page = page,
            RecordEdit::BoundingBox(bbox) => record.bbox = bbox,
            RecordEdit::FontName(name) => record.font_name = name,
            RecordEdit::FontSize(size) => record.font_size = size,
        }
    }
}

/// Per-document cache of the annotation table.
///
/// Owns the record set of exactly one document session. The index is
/// replaced wholesale on every load and edit.
#[derive(Debug, Default)]
pub struct AnnotationCache {
    source: Option<PathBuf>,
    index: PageIndex,
    skipped: Vec<RowError>,
    dirty: bool,
}

impl AnnotationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table at `source`, replacing the current index.
    ///
    /// On error the previously loaded state is kept as is.
    pub fn load(&mut self, source: &Path) -> Result<&PageIndex, LoadError> {
        let table = load_table(source)?;

        tracing::debug!(
            path = %source.display(),
            records = table.records.len(),
            skipped = table.skipped.len(),
            "annotation table loaded"
        );

        self.source = Some(source.to_path_buf());
        self.index = PageIndex::build(table.records);
        self.skipped = table.skipped;
        self.dirty = false;
        Ok(&self.index)
    }

    /// Write `records` to the attached source, overwriting it atomically.
    ///
    /// Does not touch the in-memory index; call
    /// [`invalidate_and_reload`](Self::invalidate_and_reload) afterwards to
    /// pick up what is now on disk.
    pub fn save(&self, records: &[AnnotationRecord]) -> Result<(), SaveError> {
        let path = self.source.as_deref().ok_or(SaveError::NoSource)?;
        save_table(path, records)?;
        tracing::info!(path = %path.display(), records = records.len(), "annotation table saved");
        Ok(())
    }

    /// Persist the current in-memory record set.
    pub fn save_current(&mut self) -> Result<(), SaveError> {
        self.save(self.index.records())?;
        self.dirty = false;
        Ok(())
    }

    /// Replace the index with a fresh read of `source`.
    ///
    /// The old index is only dropped once the new one has been read, so a
    /// failed reload keeps the previous state.
    pub fn invalidate_and_reload(&mut self, source: &Path) -> Result<&PageIndex, LoadError> {
        self.load(source)
    }

    /// Records on `page`, in table order.
    pub fn get(&self, page: u32) -> Vec<&AnnotationRecord> {
        self.index.get(page)
    }

    pub fn index(&self) -> &PageIndex {
        &self.index
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.source.is_some()
    }

    /// Rows dropped by the most recent load.
    pub fn skipped_rows(&self) -> &[RowError] {
        &self.skipped
    }

    /// Whether the in-memory set has edits not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Apply `edit` to the record with `id` and rebuild the index.
    ///
    /// Returns `false` when no record has that id.
    pub fn edit(&mut self, id: &str, edit: RecordEdit) -> bool {
        let mut records = std::mem::take(&mut self.index).into_records();
        let target = records.iter_mut().find(|r| r.id == id);

        let found = match target {
            Some(record) => {
                edit.apply(record);
                true
            }
            None => false,
        };

        self.index = PageIndex::build(records);
        self.dirty |= found;
        found
    }

    /// Table rows for the tabular view, formatted exactly as on disk.
    pub fn table_rows(&self) -> Vec<[String; 10]> {
        self.index.records().iter().map(record_to_row).collect()
    }

    /// Drop everything, as when the document is closed.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.index.records().iter().map(|r| &r.id)
    }
}

/// Annotation table path for a document: same stem, `.csv` extension.
pub fn annotation_path_for(document: &Path) -> PathBuf {
    document.with_extension("csv")
}
