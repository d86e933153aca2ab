use anyhow::Result;
use clap::Parser;
use prettytable::{format, Cell, Row, Table};
use realty_unify::{
    fetch::local::LocalDirSource,
    process::{is_supported_name, utils::decode_text, Stages},
    Rules, SourceLister,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Show how each export in a folder would be read: delimiter, header row,
/// canonical column mapping and file tags. No records are built.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    dir: PathBuf,
    #[arg(long, default_value = "**/*")]
    pattern: String,
    #[arg(long)]
    rules: Option<PathBuf>,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let rules = match &args.rules {
        Some(path) => Rules::load(path)?,
        None => Rules::builtin().clone(),
    };
    let stages = Stages::new(&rules)?;
    let lister = LocalDirSource::new(&args.dir, args.pattern.as_str());

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.add_row(Row::new(
        ["File", "Delim", "Header", "Columns", "Category", "Kind", "Usable"]
            .iter()
            .map(|t| Cell::new(t).style_spec("bFg"))
            .collect(),
    ));

    let entries = lister.list_files()?;
    info!(files = entries.len(), "inspecting");
    for entry in entries.iter().filter(|e| is_supported_name(&e.name)) {
        let text = match lister.get_bytes(&entry.id).and_then(|b| decode_text(&b)) {
            Ok(t) => t,
            Err(e) => {
                warn!(file = %entry.name, error = %format!("{:#}", e), "skipping");
                table.add_row(Row::new(vec![
                    Cell::new(&entry.name),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new(&format!("unreadable: {}", e)),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("no"),
                ]));
                continue;
            }
        };

        let detected = stages.hunter.parse(&text);
        let columns = stages.canonicalizer.map_headers(&detected.headers);
        let tags = stages.tag(&entry.name, &columns);
        let mapping = columns
            .iter()
            .map(|(field, idx)| format!("{} ← {}", field.as_str(), detected.headers[idx]))
            .collect::<Vec<_>>()
            .join("\n");
        let delimiter = match detected.delimiter {
            '\t' => "tab".to_string(),
            d => d.to_string(),
        };

        table.add_row(Row::new(vec![
            Cell::new(&entry.name),
            Cell::new(&delimiter),
            Cell::new(&detected.header_row_index.to_string()).style_spec("r"),
            Cell::new(&mapping),
            Cell::new(tags.category.as_str()),
            Cell::new(tags.source_kind.as_str()),
            Cell::new(if columns.is_usable() { "yes" } else { "no" }),
        ]));
    }

    println!("\n--- Sources under {} ---", args.dir.display());
    table.printstd();
    Ok(())
}
