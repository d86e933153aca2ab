// src/dataset/mod.rs
//! The canonical record schema and the dataset the pipeline produces.

pub mod cache;
pub mod export;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::process::FileReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Land,
    Building,
    Apartment,
    Villa,
    Floor,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Land => "land",
            PropertyType::Building => "building",
            PropertyType::Apartment => "apartment",
            PropertyType::Villa => "villa",
            PropertyType::Floor => "floor",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataCategory {
    Listing,
    Transaction,
}

impl DataCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::Listing => "listing",
            DataCategory::Transaction => "transaction",
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Ministry,
    Developer,
    General,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Ministry => "ministry",
            SourceKind::Developer => "developer",
            SourceKind::General => "general",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which resolver tier produced a record's district.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistrictSource {
    Column,
    ProjectName,
    FilenameDictionary,
    FilenameRemainder,
}

impl DistrictSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistrictSource::Column => "column",
            DistrictSource::ProjectName => "project_name",
            DistrictSource::FilenameDictionary => "filename_dictionary",
            DistrictSource::FilenameRemainder => "filename_remainder",
        }
    }
}

/// Which classifier tier produced a record's property type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeBasis {
    Keyword,
    /// No keyword; transaction default.
    Default,
    AreaBand,
    PeerMedian,
}

impl TypeBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeBasis::Keyword => "keyword",
            TypeBasis::Default => "default",
            TypeBasis::AreaBand => "area_band",
            TypeBasis::PeerMedian => "peer_median",
        }
    }
}

/// One normalised row. Only rows with `price > 0`, a plausible area and a
/// resolved district ever become a `CanonicalRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub price: f64,
    pub area: f64,
    pub price_per_area: f64,
    /// Always `Some` for records inside an [`AggregateDataset`].
    pub district: Option<String>,
    pub district_source: DistrictSource,
    pub property_type_raw: Option<String>,
    pub property_type: PropertyType,
    pub type_basis: TypeBasis,
    pub source_file: String,
    pub data_category: DataCategory,
    pub source_kind: SourceKind,
    pub project_name: Option<String>,
    pub city: Option<String>,
    pub developer: Option<String>,
    pub room_count: Option<f64>,
    pub deed_count: Option<f64>,
    pub status: Option<String>,
}

impl CanonicalRecord {
    pub fn district_name(&self) -> &str {
        self.district.as_deref().unwrap_or_default()
    }
}

/// Append-only result of one full ingestion run. Rebuilt from scratch on
/// every refresh; consumers read it as an immutable snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateDataset {
    records: Vec<CanonicalRecord>,
    reports: Vec<FileReport>,
    built_at: DateTime<Utc>,
}

impl AggregateDataset {
    pub(crate) fn new() -> Self {
        Self {
            records: Vec::new(),
            reports: Vec::new(),
            built_at: Utc::now(),
        }
    }

    pub(crate) fn append(&mut self, records: Vec<CanonicalRecord>, report: FileReport) {
        self.records.extend(records);
        self.reports.push(report);
    }

    pub(crate) fn records_mut(&mut self) -> &mut [CanonicalRecord] {
        &mut self.records
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn reports(&self) -> &[FileReport] {
        &self.reports
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct districts, sorted.
    pub fn districts(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.records.iter().map(|r| r.district_name()).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn filter<'a>(&'a self, filter: &'a RecordFilter) -> impl Iterator<Item = &'a CanonicalRecord> {
        self.records.iter().filter(move |r| filter.matches(r))
    }
}

/// Conjunctive filter over the three dimensions consumers slice by.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub district: Option<String>,
    pub property_type: Option<PropertyType>,
    pub data_category: Option<DataCategory>,
}

impl RecordFilter {
    pub fn district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn property_type(mut self, t: PropertyType) -> Self {
        self.property_type = Some(t);
        self
    }

    pub fn data_category(mut self, c: DataCategory) -> Self {
        self.data_category = Some(c);
        self
    }

    pub fn matches(&self, r: &CanonicalRecord) -> bool {
        self.district.as_deref().map_or(true, |d| r.district_name() == d)
            && self.property_type.map_or(true, |t| r.property_type == t)
            && self.data_category.map_or(true, |c| r.data_category == c)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(district: &str, t: PropertyType, c: DataCategory, price: f64, area: f64) -> CanonicalRecord {
        CanonicalRecord {
            price,
            area,
            price_per_area: price / area,
            district: Some(district.to_string()),
            district_source: DistrictSource::Column,
            property_type_raw: None,
            property_type: t,
            type_basis: TypeBasis::Keyword,
            source_file: "test.csv".to_string(),
            data_category: c,
            source_kind: SourceKind::General,
            project_name: None,
            city: None,
            developer: None,
            room_count: None,
            deed_count: None,
            status: None,
        }
    }

    #[test]
    fn filter_by_dimensions() {
        let mut ds = AggregateDataset::new();
        ds.records = vec![
            record("الملقا", PropertyType::Land, DataCategory::Transaction, 1_000_000.0, 500.0),
            record("الملقا", PropertyType::Apartment, DataCategory::Listing, 900_000.0, 150.0),
            record("النرجس", PropertyType::Land, DataCategory::Transaction, 800_000.0, 400.0),
        ];

        let f = RecordFilter::default().district("الملقا");
        assert_eq!(ds.filter(&f).count(), 2);

        let f = RecordFilter::default().property_type(PropertyType::Land);
        assert_eq!(ds.filter(&f).count(), 2);

        let f = RecordFilter::default()
            .district("النرجس")
            .data_category(DataCategory::Listing);
        assert_eq!(ds.filter(&f).count(), 0);

        assert_eq!(ds.districts(), vec!["الملقا", "النرجس"]);
    }
}
