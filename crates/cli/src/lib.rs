use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use overlay_viewer_core::{
    group, load_table, parse_page_ranges, parse_tolerance, AnnotationCache, AnnotationRecord,
    PageIndex, RecordEdit, ViewerConfig,
};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "overlay-viewer")]
#[command(about = "Annotation overlay table tools")]
pub struct Cli {
    /// Config file (defaults to the platform config directory).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable counts for an annotation table.
    Summary {
        #[arg(value_name = "CSV")]
        file: PathBuf,
    },
    /// Print the records of one page.
    Page {
        #[arg(value_name = "CSV")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Print the same-line group of a record.
    Group {
        #[arg(value_name = "CSV")]
        file: PathBuf,
        #[arg(long)]
        id: String,
        /// Midline tolerance; `,` is accepted as decimal separator.
        #[arg(long)]
        tolerance: Option<String>,
    },
    /// Change one record and save the table in place.
    Edit {
        #[arg(value_name = "CSV")]
        file: PathBuf,
        #[arg(long)]
        id: String,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        page: Option<u32>,
    },
    /// Rewrite a table in canonical form.
    Normalize {
        #[arg(value_name = "CSV")]
        file: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Expand a page range expression such as "1, 3-5".
    Ranges {
        #[arg(value_name = "EXPR")]
        expression: String,
        #[arg(long)]
        pages: u32,
    },
    /// Print the effective configuration.
    Config,
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct SummaryOutput {
    path: String,
    records: usize,
    pages: Vec<PageCount>,
    skipped: Vec<SkippedRow>,
}

#[derive(Debug, Serialize)]
struct PageCount {
    page: u32,
    records: usize,
}

#[derive(Debug, Serialize)]
struct SkippedRow {
    line: u64,
    reason: String,
}

#[derive(Debug, Serialize)]
struct PageOutput<'a> {
    page: u32,
    records: Vec<RecordOutput<'a>>,
}

#[derive(Debug, Serialize)]
struct RecordOutput<'a> {
    id: &'a str,
    text: &'a str,
    x0: f64,
    top: f64,
    x1: f64,
    bottom: f64,
    midline: f64,
}

impl<'a> From<&'a AnnotationRecord> for RecordOutput<'a> {
    fn from(record: &'a AnnotationRecord) -> Self {
        Self {
            id: &record.id,
            text: &record.text,
            x0: record.bbox.x0,
            top: record.bbox.top,
            x1: record.bbox.x1,
            bottom: record.bbox.bottom,
            midline: record.midline(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GroupOutput {
    selected: String,
    page: u32,
    tolerance: f64,
    grouped: Vec<String>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing();

    match cli.command {
        Commands::Summary { file } => run_summary(&file),
        Commands::Page { file, page } => run_page(&file, page),
        Commands::Group { file, id, tolerance } => {
            let config = load_config(cli.config.as_deref())?;
            run_group(&file, &id, tolerance.as_deref(), &config)
        }
        Commands::Edit { file, id, text, page } => run_edit(&file, &id, text, page),
        Commands::Normalize { file, output } => run_normalize(&file, output.as_deref()),
        Commands::Ranges { expression, pages } => run_ranges(&expression, pages),
        Commands::Config => {
            let config = load_config(cli.config.as_deref())?;
            print_json(&config)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    // RUST_LOG overrides; diagnostics go to stderr so stdout stays machine-readable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    let path = path.map(ToOwned::to_owned).unwrap_or_else(ViewerConfig::default_path);
    let config = ViewerConfig::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    config
        .with_env_overrides(|key| std::env::var(key).ok())
        .context("invalid configuration override in environment")
}

fn run_summary(file: &Path) -> Result<()> {
    ensure_file_exists(file)?;
    let table = load_table(file).context("failed to read annotation table")?;

    let skipped = table
        .skipped
        .iter()
        .map(|row| SkippedRow { line: row.line, reason: row.reason.to_string() })
        .collect();

    let index = PageIndex::build(table.records);
    let pages = index
        .pages()
        .into_iter()
        .map(|page| PageCount { page, records: index.page_len(page) })
        .collect();

    print_json(&SummaryOutput { path: file.display().to_string(), records: index.len(), pages, skipped })
}

fn run_page(file: &Path, page: u32) -> Result<()> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let cache = open_cache(file)?;
    let records = cache.get(page).into_iter().map(RecordOutput::from).collect();
    print_json(&PageOutput { page, records })
}

fn run_group(file: &Path, id: &str, tolerance: Option<&str>, config: &ViewerConfig) -> Result<()> {
    let tolerance = match tolerance {
        Some(raw) => parse_tolerance(raw)
            .with_context(|| format!("tolerance must be a non-negative number, got {raw:?}"))?,
        None => config.group_tolerance,
    };

    let cache = open_cache(file)?;
    let selected = cache
        .index()
        .find(id)
        .with_context(|| format!("no record with id {id:?}"))?;

    let grouped = if config.grouping_enabled {
        group(selected, cache.get(selected.page), tolerance).into_iter().collect()
    } else {
        Vec::new()
    };

    print_json(&GroupOutput { selected: selected.id.clone(), page: selected.page, tolerance, grouped })
}

fn run_edit(file: &Path, id: &str, text: Option<String>, page: Option<u32>) -> Result<()> {
    let mut edits = Vec::new();
    if let Some(text) = text {
        edits.push(RecordEdit::Text(text));
    }
    if let Some(page) = page {
        if page == 0 {
            anyhow::bail!("--page is 1-based and must be >= 1");
        }
        edits.push(RecordEdit::Page(page));
    }
    if edits.is_empty() {
        anyhow::bail!("nothing to change; pass --text or --page");
    }

    let mut cache = open_cache(file)?;
    for edit in edits {
        if !cache.edit(id, edit) {
            anyhow::bail!("no record with id {id:?}");
        }
    }

    cache.save_current().context("failed to save annotation table")?;
    println!("{}", file.display());
    Ok(())
}

fn run_normalize(file: &Path, output: Option<&Path>) -> Result<()> {
    let cache = open_cache(file)?;
    let output = output.unwrap_or(file);

    overlay_viewer_core::save_table(output, cache.index().records())
        .with_context(|| format!("failed to write table to {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}

fn run_ranges(expression: &str, pages: u32) -> Result<()> {
    let indices = parse_page_ranges(expression, pages)?;
    let pages: Vec<u32> = indices.into_iter().map(|index| index + 1).collect();
    print_json(&pages)
}

fn open_cache(file: &Path) -> Result<AnnotationCache> {
    ensure_file_exists(file)?;

    let mut cache = AnnotationCache::new();
    cache.load(file).context("failed to read annotation table")?;
    Ok(cache)
}

fn print_json<T: Serialize + ?Sized>(payload: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(payload)?;
    println!("{json}");
    Ok(())
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
