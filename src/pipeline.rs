// src/pipeline.rs
//! Run orchestration: list → fetch → per-file stage → peer medians →
//! reclassify → dataset.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::Rules;
use crate::dataset::{AggregateDataset, CanonicalRecord};
use crate::fetch::{RawSource, SourceLister};
use crate::process::{is_supported_name, process_source, FileOutcome, FileReport, Stages};
use crate::stats::land_medians;

/// A listed file after the fetch step.
enum Fetched {
    Source(RawSource),
    Skipped(FileReport),
}

pub struct Pipeline {
    lister: Box<dyn SourceLister>,
    rules: Rules,
    parallel: bool,
    fail_fast: bool,
}

impl Pipeline {
    pub fn new(lister: Box<dyn SourceLister>, rules: Rules) -> Self {
        Self {
            lister,
            rules,
            parallel: false,
            fail_fast: false,
        }
    }

    /// Run the per-file stage on the rayon pool.
    pub fn parallel(mut self, on: bool) -> Self {
        self.parallel = on;
        self
    }

    /// Treat a failed byte fetch as fatal instead of skipping the file.
    pub fn fail_fast(mut self, on: bool) -> Self {
        self.fail_fast = on;
        self
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Build a fresh dataset from every listed file. Only a listing failure
    /// (or a fetch failure under `fail_fast`) is an error; everything else
    /// degrades to fewer records.
    #[instrument(level = "info", skip(self), fields(source = %self.lister.describe()))]
    pub fn build_dataset(&self) -> Result<AggregateDataset> {
        let start = Instant::now();
        let stages = Stages::new(&self.rules).context("building pipeline stages")?;

        // ─── 1) list ───
        let entries = self
            .lister
            .list_files()
            .with_context(|| format!("listing {}", self.lister.describe()))?;
        info!(files = entries.len(), "listed sources");

        // ─── 2) fetch ───
        let mut fetched = Vec::with_capacity(entries.len());
        for entry in entries {
            if !is_supported_name(&entry.name) {
                fetched.push(Fetched::Skipped(FileReport::with_outcome(
                    &entry.name,
                    FileOutcome::Unsupported,
                )));
                continue;
            }
            match self.lister.get_bytes(&entry.id) {
                Ok(bytes) => fetched.push(Fetched::Source(RawSource::new(entry.name, bytes))),
                Err(e) if self.fail_fast => {
                    return Err(e.context(format!("fetching {}", entry.name)));
                }
                Err(e) => {
                    warn!(file = %entry.name, error = %format!("{:#}", e), "fetch failed, skipping file");
                    fetched.push(Fetched::Skipped(FileReport::with_outcome(
                        &entry.name,
                        FileOutcome::Unavailable(format!("{:#}", e)),
                    )));
                }
            }
        }

        // ─── 3) per-file stage ───
        let run = |f: Fetched| match f {
            Fetched::Source(source) => process_source(&source, &stages),
            Fetched::Skipped(report) => (Vec::new(), report),
        };
        let results: Vec<(Vec<CanonicalRecord>, FileReport)> = if self.parallel {
            fetched.into_par_iter().map(run).collect()
        } else {
            fetched.into_iter().map(run).collect()
        };

        let mut dataset = AggregateDataset::new();
        for (records, report) in results {
            dataset.append(records, report);
        }

        // ─── 4) peer medians → reclassify ───
        let medians = land_medians(dataset.records(), &self.rules.stats);
        if !medians.is_empty() {
            for record in dataset.records_mut() {
                let c = stages.classify(record, &medians);
                record.property_type = c.label;
                record.type_basis = c.basis;
            }
        }

        let reports = dataset.reports();
        let unusable = reports.iter().filter(|r| r.outcome != FileOutcome::Ok).count();
        info!(
            files = reports.len(),
            unusable,
            records = dataset.len(),
            dropped_numeric = reports.iter().map(|r| r.dropped_numeric).sum::<usize>(),
            dropped_bounds = reports.iter().map(|r| r.dropped_bounds).sum::<usize>(),
            dropped_district = reports.iter().map(|r| r.dropped_district).sum::<usize>(),
            land_medians = medians.len(),
            elapsed = ?start.elapsed(),
            "dataset built"
        );

        Ok(dataset)
    }
}
