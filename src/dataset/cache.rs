// src/dataset/cache.rs
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dataset::AggregateDataset;
use crate::pipeline::Pipeline;

/// Caller-owned snapshot of the last build. Readers hold an `Arc` to the
/// snapshot they got; a refresh swaps in a new one and never mutates the old.
pub struct DatasetCache {
    pipeline: Pipeline,
    snapshot: Option<Arc<AggregateDataset>>,
}

impl DatasetCache {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            snapshot: None,
        }
    }

    /// Current snapshot, building it on first use.
    pub fn get(&mut self) -> Result<Arc<AggregateDataset>> {
        match &self.snapshot {
            Some(ds) => {
                debug!(records = ds.len(), "dataset cache hit");
                Ok(Arc::clone(ds))
            }
            None => self.refresh(),
        }
    }

    pub fn invalidate(&mut self) {
        if self.snapshot.take().is_some() {
            info!("dataset cache invalidated");
        }
    }

    /// Rebuild now. On failure the previous snapshot is kept.
    pub fn refresh(&mut self) -> Result<Arc<AggregateDataset>> {
        let ds = Arc::new(self.pipeline.build_dataset()?);
        self.snapshot = Some(Arc::clone(&ds));
        Ok(ds)
    }

    pub fn is_cached(&self) -> bool {
        self.snapshot.is_some()
    }
}
