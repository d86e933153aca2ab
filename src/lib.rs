// src/lib.rs
//! Normalises heterogeneous real-estate spreadsheet exports (listings and
//! transaction records) into one dataset with a fixed canonical schema.
//!
//! raw bytes → decoded text → detected table → canonical columns →
//! numeric fields → district / property type → [`dataset::AggregateDataset`]

pub mod config;
pub mod dataset;
pub mod fetch;
pub mod pipeline;
pub mod process;
pub mod stats;

pub use config::Rules;
pub use dataset::{
    cache::DatasetCache, AggregateDataset, CanonicalRecord, DataCategory, PropertyType, SourceKind,
};
pub use fetch::{RawSource, SourceEntry, SourceLister};
pub use pipeline::Pipeline;
