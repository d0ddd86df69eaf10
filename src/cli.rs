use crate::config::{ColumnPolicy, load_config};
use crate::config::LayoutConfig;
use crate::ir::{Graph, GroupId};
use crate::layout::{compute_layout, layout_selected_groups};
use crate::layout_dump::{StatsDump, write_layout_dump};
use crate::parser::parse_document_with;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "nglayout", version, about = "Automatic layout for node-graph documents")]
pub struct Args {
    /// Input graph document (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON file (partial layout settings, camelCase keys)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Only lay out these groups (comma separated ids)
    #[arg(long = "select", value_delimiter = ',')]
    pub select: Vec<GroupId>,

    /// Column policy: 0 auto, 1 single column, N fixed columns
    #[arg(long = "columns")]
    pub columns: Option<usize>,

    /// Keep reroute chains as regular layout nodes
    #[arg(long = "no-collapse")]
    pub no_collapse: bool,

    /// Write a layout dump (positions and stats) instead of the document
    #[arg(long = "dump")]
    pub dump: bool,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(columns) = args.columns {
        config.column_policy = ColumnPolicy::from(columns);
    }
    if args.no_collapse {
        config.collapse_reroutes = false;
    }

    let input = read_input(args.input.as_deref())?;
    let mut document = parse_document_with(&input, config.title_height)?;

    let stats = run_layout(&mut document.graph, &args.select, &config);
    if stats.processed_groups == Some(0) {
        eprintln!(
            "No group matches the selection {:?}: {}",
            args.select,
            serde_json::to_string(&stats)?
        );
    }

    if args.dump {
        let output = ensure_output(&args.output, "dump")?;
        write_layout_dump(&output, &document.graph, stats)?;
        return Ok(());
    }

    document.write_back();
    let text = document.to_json_string()?;
    write_output(&text, args.output.as_deref())
}

/// Whole-graph layout, or only the selected groups when there are any. A
/// selection matching no group leaves the graph untouched.
fn run_layout(graph: &mut Graph, select: &[GroupId], config: &LayoutConfig) -> StatsDump {
    if select.is_empty() {
        StatsDump::from(&compute_layout(graph, config))
    } else {
        StatsDump::from(&layout_selected_groups(graph, select, config))
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(text: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.write_all(b"\n")?;
            Ok(())
        }
    }
}

fn ensure_output(output: &Option<PathBuf>, what: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", what))
}
