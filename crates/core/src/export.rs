//! Page-range text export into the annotation table format
//!
//! Every text run on the chosen pages becomes one record, numbered from 1 in
//! page order. The result can be loaded straight back as an annotation table.

use crate::annotation_cache::{save_table, SaveError};
use crate::record::{normalize_text, AnnotationRecord};
use crate::renderer::{Renderer, RendererError};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("invalid page range {0:?}")]
    InvalidRange(String),

    #[error(transparent)]
    Renderer(#[from] RendererError),

    #[error(transparent)]
    Save(#[from] SaveError),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Parse a 1-based page range expression such as `"1, 3, 5-10"`.
///
/// Returns sorted, de-duplicated 0-based page indices. Pages outside
/// `1..=page_count` are dropped silently; malformed parts fail the whole
/// expression.
pub fn parse_page_ranges(expression: &str, page_count: u32) -> ExportResult<Vec<u32>> {
    let invalid = || ExportError::InvalidRange(expression.to_string());
    let number = |raw: &str| raw.trim().parse::<u32>().map_err(|_| invalid());

    let mut pages = BTreeSet::new();

    for part in expression.split(',') {
        let part = part.trim();

        match part.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (number(start)?, number(end)?);
                pages.extend(start.max(1)..=end.min(page_count));
            }
            None => {
                pages.insert(number(part)?);
            }
        }
    }

    Ok(pages
        .into_iter()
        .filter(|page| (1..=page_count).contains(page))
        .map(|page| page - 1)
        .collect())
}

/// Extract every text run of `page_indices` and write them to `path`.
///
/// `progress` is called with `(i + 1) / len * 100` after each page and with `0`
/// once the export is done. An empty selection still writes the header.
/// Returns the number of records written.
pub fn export_page_text<R, P>(
    renderer: &R,
    path: &Path,
    page_indices: &[u32],
    mut progress: P,
) -> ExportResult<usize>
where
    R: Renderer + ?Sized,
    P: FnMut(u8),
{
    let mut records = Vec::new();
    let mut next_id = 1usize;

    for (done, &page_index) in page_indices.iter().enumerate() {
        for run in renderer.extract_runs(page_index)? {
            records.push(
                AnnotationRecord::new(
                    next_id.to_string(),
                    page_index + 1,
                    run.bbox,
                    normalize_text(&run.text),
                )
                .with_font(run.font_name, run.font_size),
            );
            next_id += 1;
        }

        let percent = ((done + 1) * 100 / page_indices.len()) as u8;
        progress(percent);
    }

    let written = save_table(path, &records);
    progress(0);
    written?;

    tracing::info!(
        path = %path.display(),
        pages = page_indices.len(),
        records = records.len(),
        "page text exported"
    );
    Ok(records.len())
}
