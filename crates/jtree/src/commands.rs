//! Subcommand implementations. Each writes its report to `out`.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use jtree_model::{
    DocumentConfig, FilterView, IndentMode, ModelIndex, PurgeSpec, SaveOptions, SearchHit,
    SearchPattern, Selection, SpecialFlags, TreeDocument, search,
};
use serde::Serialize;
use serde_json::json;

use crate::error::{CliError, Result};

#[derive(Debug, Clone, Args)]
pub struct DocumentArgs {
    /// JSON document to load.
    pub input: PathBuf,

    /// Profile file with `key=value` lines (max_version, page_size, version_key, flags).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Comma separated policy flags, replacing the configured ones.
    #[arg(long)]
    pub flags: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    /// Emit the summary as JSON instead of text.
    #[arg(long)]
    pub json: bool,

    /// Outline depth below the top-level row.
    #[arg(long, default_value_t = 2)]
    pub depth: usize,
}

#[derive(Debug, Clone, Args)]
pub struct SaveArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    /// Output file; stdout when omitted.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Purge rule `key=true` (drop nodes) or `key=false` (strip key). Repeatable.
    #[arg(long)]
    pub purge: Vec<String>,

    /// Remove descriptive marker keys.
    #[arg(long = "strip-descriptive")]
    pub strip_descriptive: bool,

    #[arg(long)]
    pub pretty: bool,

    /// Write this value under the version key of the output.
    #[arg(long = "set-version")]
    pub set_version: Option<i64>,
}

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    pub pattern: String,

    /// Treat the pattern as a regular expression.
    #[arg(long)]
    pub regex: bool,

    /// Print only the first hit.
    #[arg(long)]
    pub first: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {
    #[command(flatten)]
    pub document: DocumentArgs,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectSummary {
    pub version: Option<i64>,
    pub columns: Vec<String>,
    pub nodes: usize,
    pub top_level_children: usize,
    pub hidden_rows: usize,
}

fn load_config(args: &DocumentArgs) -> Result<DocumentConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => CliError::MissingPath { path: path.clone() },
                _ => CliError::Io(err),
            })?;
            DocumentConfig::from_profile(&content)?
        }
        None => DocumentConfig::default(),
    };
    if let Some(flags) = &args.flags {
        config = config.with_special_flags(SpecialFlags::parse_list(flags)?);
    }
    Ok(config)
}

pub fn open_document(args: &DocumentArgs) -> Result<TreeDocument> {
    if !args.input.exists() {
        return Err(CliError::MissingPath {
            path: args.input.clone(),
        });
    }
    let mut doc = TreeDocument::with_config(load_config(args)?);
    doc.load_path(&args.input)?;
    tracing::debug!(
        message = "jtree.cli.loaded",
        path = %args.input.display(),
        nodes = doc.total_count()
    );
    Ok(doc)
}

/// Parse `key=true|false` rules; a bare `key` drops nodes.
pub fn parse_purge_rules(rules: &[String]) -> Result<PurgeSpec> {
    let mut spec = PurgeSpec::new();
    for rule in rules {
        let (key, drop_node) = match rule.split_once('=') {
            Some((key, "true")) => (key, true),
            Some((key, "false")) => (key, false),
            Some(_) => {
                return Err(CliError::invalid(format!(
                    "purge rule `{rule}` must be key=true or key=false"
                )));
            }
            None => (rule.as_str(), true),
        };
        if key.is_empty() {
            return Err(CliError::invalid(format!("purge rule `{rule}` has no key")));
        }
        spec.insert(key, drop_node);
    }
    Ok(spec)
}

fn row_text(doc: &TreeDocument, index: ModelIndex) -> String {
    (0..doc.column_count())
        .filter_map(|column| doc.index(index.row(), column, doc.parent(index)))
        .map(|cell| doc.text(cell))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn write_outline(
    doc: &TreeDocument,
    parent: Option<ModelIndex>,
    level: usize,
    max_depth: usize,
    out: &mut dyn Write,
) -> Result<()> {
    for row in 0..doc.row_count(parent) {
        let Some(index) = doc.index(row, 0, parent) else {
            continue;
        };
        writeln!(out, "{}{}", "  ".repeat(level), row_text(doc, index))?;
        if level < max_depth {
            write_outline(doc, Some(index), level + 1, max_depth, out)?;
        }
    }
    Ok(())
}

fn hidden_rows(doc: &TreeDocument) -> usize {
    let Some(top) = doc.top_level() else {
        return 0;
    };
    let view = FilterView::new();
    let mut hidden = 0;
    let mut stack = vec![top];
    while let Some(id) = stack.pop() {
        if !view.accepts(doc, id) {
            hidden += 1;
            continue;
        }
        if let Some(node) = doc.node(id) {
            stack.extend(node.children());
        }
    }
    hidden
}

pub fn inspect_summary(doc: &TreeDocument) -> InspectSummary {
    let version = doc
        .top_level()
        .and_then(|top| doc.node(top))
        .and_then(|node| doc.json_version(node.fields()));
    InspectSummary {
        version,
        columns: (0..doc.column_count())
            .filter_map(|section| doc.header_data(section).map(str::to_owned))
            .collect(),
        nodes: doc.total_count(),
        top_level_children: doc.index(0, 0, None).map_or(0, |top| doc.row_count(Some(top))),
        hidden_rows: hidden_rows(doc),
    }
}

pub fn run_inspect(args: &InspectArgs, out: &mut dyn Write) -> Result<()> {
    let doc = open_document(&args.document)?;
    let summary = inspect_summary(&doc);
    if args.json {
        serde_json::to_writer_pretty(&mut *out, &summary)?;
        writeln!(out)?;
        return Ok(());
    }

    match summary.version {
        Some(version) => writeln!(out, "version: {version}")?,
        None => writeln!(out, "version: -")?,
    }
    writeln!(out, "columns: {}", summary.columns.join(", "))?;
    writeln!(
        out,
        "nodes: {} (hidden rows: {})",
        summary.nodes, summary.hidden_rows
    )?;
    write_outline(&doc, None, 0, args.depth, out)?;
    Ok(())
}

pub fn run_save(args: &SaveArgs, out: &mut dyn Write) -> Result<()> {
    let doc = open_document(&args.document)?;
    let mut options = SaveOptions::new().strip_descriptive(args.strip_descriptive);
    if !args.purge.is_empty() {
        options = options.with_purge(parse_purge_rules(&args.purge)?);
    }
    if let Some(version) = args.set_version {
        options = options.with_field(doc.config().version_key.clone(), json!(version));
    }
    let indent = if args.pretty {
        IndentMode::Pretty
    } else {
        IndentMode::Compact
    };

    match &args.output {
        Some(path) => {
            let written = doc.save_path(path, &options, indent)?;
            tracing::info!(
                message = "jtree.cli.saved",
                path = %path.display(),
                bytes = written
            );
        }
        None => {
            doc.save_to(&mut *out, &options, indent)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Rows from the top-level row down to the hit, e.g. `0/2/1`.
fn hit_path(doc: &TreeDocument, hit: SearchHit) -> String {
    let mut rows = Vec::new();
    let mut current = doc.index_of(hit.node, 0);
    while let Some(index) = current {
        rows.push(index.row().to_string());
        current = doc.parent(index);
    }
    rows.reverse();
    rows.join("/")
}

pub fn run_search(args: &SearchArgs, out: &mut dyn Write) -> Result<()> {
    let doc = open_document(&args.document)?;
    let pattern = if args.regex {
        SearchPattern::regex(&args.pattern)
            .map_err(|err| CliError::invalid(format!("bad regex: {err}")))?
    } else {
        SearchPattern::fixed(&args.pattern)
    };

    let mut selection = Selection::new();
    let count = search(&doc, &pattern, &mut selection);
    let hits: Vec<SearchHit> = if args.first {
        selection.next_hit().into_iter().collect()
    } else {
        selection.hits().to_vec()
    };

    for hit in hits {
        let Some(index) = doc.index_of(hit.node, hit.column) else {
            continue;
        };
        writeln!(
            out,
            "{}\t{}\t{}",
            hit_path(&doc, hit),
            doc.header_data(hit.column).unwrap_or_default(),
            doc.text(index)
        )?;
    }
    tracing::debug!(message = "jtree.cli.search", hits = count);
    Ok(())
}

pub fn run_schema(args: &SchemaArgs, out: &mut dyn Write) -> Result<()> {
    let doc = open_document(&args.document)?;
    let Some(schema) = doc.schema() else {
        return Ok(());
    };
    for column in schema.columns() {
        let draw = if column.draw_only { "\tdraw" } else { "" };
        writeln!(
            out,
            "{}\t{}\t{}{}",
            column.index, column.display_name, column.tag, draw
        )?;
    }
    Ok(())
}
