use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use prettytable::{format, Cell, Row, Table};
use realty_unify::{
    dataset::export::write_parquet,
    fetch::{http::HttpIndexSource, local::LocalDirSource, zips::ZipSource},
    process::FileReport,
    stats::{summary::MarketSummary, TrimmedEstimate},
    AggregateDataset, Pipeline, Rules, SourceLister,
};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Normalise real-estate listing and transaction exports into one dataset"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the dataset and print per-file reports.
    Build {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        run: RunArgs,
        /// Also write the dataset as Parquet.
        #[arg(long, env = "REALTY_PARQUET")]
        parquet: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Build the dataset and print the per-district market summary.
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        run: RunArgs,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// Local folder of exports.
    #[arg(long, env = "REALTY_DIR")]
    dir: Option<PathBuf>,
    /// ZIP archive of exports.
    #[arg(long, env = "REALTY_ZIP")]
    zip: Option<PathBuf>,
    /// HTML index page linking to exports.
    #[arg(long, env = "REALTY_URL")]
    url: Option<String>,
}

#[derive(Args)]
struct RunArgs {
    /// Glob applied under `--dir`.
    #[arg(long, env = "REALTY_PATTERN", default_value = "**/*")]
    pattern: String,
    /// Rule set replacing the built-in one.
    #[arg(long, env = "REALTY_RULES")]
    rules: Option<PathBuf>,
    #[arg(long, env = "REALTY_PARALLEL")]
    parallel: bool,
    /// Abort when a single file cannot be fetched.
    #[arg(long, env = "REALTY_FAIL_FAST")]
    fail_fast: bool,
}

fn main() -> Result<()> {
    // ─── 1) init logging (stderr; stdout carries the report) ─────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build {
            source,
            run,
            parquet,
            json,
        } => {
            let pipeline = build_pipeline(&source, &run)?;
            let dataset = pipeline.build_dataset()?;
            if json {
                print_json(&json!({
                    "built_at": dataset.built_at(),
                    "records": dataset.len(),
                    "districts": dataset.districts().len(),
                    "files": dataset.reports(),
                }))?;
            } else {
                print_reports(&dataset);
            }
            if let Some(path) = parquet {
                write_parquet(&dataset, &path)?;
            }
        }
        Command::Summary { source, run, json } => {
            let pipeline = build_pipeline(&source, &run)?;
            let dataset = pipeline.build_dataset()?;
            let summary = MarketSummary::from_dataset(&dataset, &pipeline.rules().stats);
            if json {
                print_json(&summary)?;
            } else {
                print_summary(&summary);
            }
        }
    }

    info!("done");
    Ok(())
}

fn build_pipeline(source: &SourceArgs, run: &RunArgs) -> Result<Pipeline> {
    let rules = match &run.rules {
        Some(path) => Rules::load(path)?,
        None => Rules::builtin().clone(),
    };

    let lister: Box<dyn SourceLister> = if let Some(dir) = &source.dir {
        Box::new(LocalDirSource::new(dir, run.pattern.as_str()))
    } else if let Some(zip) = &source.zip {
        Box::new(ZipSource::new(zip))
    } else if let Some(url) = &source.url {
        Box::new(HttpIndexSource::new(url)?)
    } else {
        bail!("one of --dir, --zip or --url is required");
    };
    info!(source = %lister.describe(), "source selected");

    Ok(Pipeline::new(lister, rules)
        .parallel(run.parallel)
        .fail_fast(run.fail_fast))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialising output")?;
    println!("{}", text);
    Ok(())
}

fn header_row(titles: &[&str]) -> Row {
    Row::new(titles.iter().map(|t| Cell::new(t).style_spec("bFg")).collect())
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn report_row(r: &FileReport) -> Row {
    let delimiter = r.delimiter.map(|d| match d {
        '\t' => "tab".to_string(),
        other => other.to_string(),
    });
    Row::new(vec![
        Cell::new(&r.source_file),
        Cell::new(r.outcome.as_str()),
        Cell::new(&opt(r.category)),
        Cell::new(&opt(r.source_kind)),
        Cell::new(&opt(delimiter)),
        Cell::new(&opt(r.header_row)).style_spec("r"),
        Cell::new(&r.rows_seen.to_string()).style_spec("r"),
        Cell::new(&r.records_kept.to_string()).style_spec("r"),
        Cell::new(&r.dropped_numeric.to_string()).style_spec("r"),
        Cell::new(&r.dropped_bounds.to_string()).style_spec("r"),
        Cell::new(&r.dropped_district.to_string()).style_spec("r"),
    ])
}

fn print_reports(dataset: &AggregateDataset) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.add_row(header_row(&[
        "File", "Outcome", "Category", "Kind", "Delim", "Header", "Rows", "Kept", "Bad num",
        "Bounds", "District",
    ]));
    for r in dataset.reports() {
        table.add_row(report_row(r));
    }

    println!("\n--- Files ---");
    table.printstd();
    println!(
        "{} records across {} districts from {} files (built {})",
        dataset.len(),
        dataset.districts().len(),
        dataset.reports().len(),
        dataset.built_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
}

fn estimate_cell(e: &Option<TrimmedEstimate>) -> Cell {
    match e {
        Some(e) => Cell::new(&format!("{:.0} (n={}, {})", e.median, e.retained, e.confidence.as_str()))
            .style_spec("r"),
        None => Cell::new("-"),
    }
}

fn print_summary(summary: &MarketSummary) {
    if summary.districts.is_empty() {
        println!("No data: no records survived normalisation.");
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.add_row(header_row(&[
        "District",
        "Records",
        "Listings",
        "Land /m²",
        "Building /m²",
        "Listing /m²",
        "Listing ticket",
    ]));
    for d in &summary.districts {
        table.add_row(Row::new(vec![
            Cell::new(&d.district),
            Cell::new(&d.records.to_string()).style_spec("r"),
            Cell::new(&d.listings.to_string()).style_spec("r"),
            estimate_cell(&d.land_ppa),
            estimate_cell(&d.building_ppa),
            estimate_cell(&d.listing_ppa),
            estimate_cell(&d.listing_ticket),
        ]));
    }

    println!("\n--- Market summary ({} records) ---", summary.total_records);
    table.printstd();
}
