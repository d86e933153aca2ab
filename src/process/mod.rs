// src/process/mod.rs
//! Per-file stage: one `RawSource` in, zero or more `CanonicalRecord`s and
//! a `FileReport` out. Nothing here fails the run; every problem becomes a
//! `FileOutcome` or a drop counter.

pub mod canonical;
pub mod category;
pub mod classify;
pub mod district;
pub mod header;
pub mod numeric;
pub mod utils;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::{CategoryRules, RecordBounds, Rules};
use crate::dataset::{CanonicalRecord, DataCategory, SourceKind};
use crate::fetch::RawSource;

use self::canonical::{CanonicalField, ColumnCanonicalizer, ColumnMap};
use self::category::{tag_file, FileTags};
use self::classify::{Classification, ClassifyInput, LandMedians, PropertyClassifier};
use self::district::{DistrictInput, DistrictResolver, Resolution};
use self::header::HeaderHunter;
use self::numeric::NumericNormalizer;
use self::utils::{decode_text, non_empty};

const SUPPORTED_EXTENSIONS: [&str; 3] = [".csv", ".tsv", ".txt"];

/// Only delimited-text exports are processed.
pub fn is_supported_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// How a file's processing ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum FileOutcome {
    Ok,
    /// `price` or `area` did not map to a column.
    NoUsableColumns,
    Undecodable(String),
    /// The lister could not deliver the bytes.
    Unavailable(String),
    Unsupported,
}

impl FileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileOutcome::Ok => "ok",
            FileOutcome::NoUsableColumns => "no_usable_columns",
            FileOutcome::Undecodable(_) => "undecodable",
            FileOutcome::Unavailable(_) => "unavailable",
            FileOutcome::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub source_file: String,
    pub category: Option<DataCategory>,
    pub source_kind: Option<SourceKind>,
    pub delimiter: Option<char>,
    pub header_row: Option<usize>,
    pub rows_seen: usize,
    pub records_kept: usize,
    pub dropped_numeric: usize,
    pub dropped_bounds: usize,
    pub dropped_district: usize,
    pub malformed_rows: usize,
    pub outcome: FileOutcome,
}

impl FileReport {
    pub fn new(source_file: &str) -> Self {
        Self::with_outcome(source_file, FileOutcome::Ok)
    }

    pub fn with_outcome(source_file: &str, outcome: FileOutcome) -> Self {
        Self {
            source_file: source_file.to_string(),
            category: None,
            source_kind: None,
            delimiter: None,
            header_row: None,
            rows_seen: 0,
            records_kept: 0,
            dropped_numeric: 0,
            dropped_bounds: 0,
            dropped_district: 0,
            malformed_rows: 0,
            outcome,
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped_numeric + self.dropped_bounds + self.dropped_district
    }
}

/// Why a row did not become a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dropped {
    Numeric,
    Bounds,
    District,
}

/// Every per-file component, built once per run from the rule set.
pub struct Stages {
    pub normalizer: NumericNormalizer,
    pub hunter: HeaderHunter,
    pub canonicalizer: ColumnCanonicalizer,
    pub resolver: DistrictResolver,
    pub classifier: PropertyClassifier,
    category: CategoryRules,
    bounds: RecordBounds,
}

impl Stages {
    pub fn new(rules: &Rules) -> Result<Self> {
        Ok(Self {
            normalizer: NumericNormalizer::new(&rules.numeric),
            hunter: HeaderHunter::new(rules),
            canonicalizer: ColumnCanonicalizer::new(rules),
            resolver: DistrictResolver::new(&rules.district)?,
            classifier: PropertyClassifier::new(&rules.classifier),
            category: rules.category.clone(),
            bounds: rules.records,
        })
    }

    pub fn tag(&self, filename: &str, columns: &ColumnMap) -> FileTags {
        tag_file(&self.category, filename, columns)
    }

    /// Classify an already-built record against a land-median lookup.
    pub fn classify(&self, record: &CanonicalRecord, land_medians: &LandMedians) -> Classification {
        let input = ClassifyInput {
            raw_type: record.property_type_raw.as_deref(),
            area: record.area,
            price_per_area: record.price_per_area,
            district: record.district_name(),
            category: record.data_category,
            source_kind: record.source_kind,
        };
        self.classifier.classify(&input, land_medians)
    }

    fn build_record(
        &self,
        row: &[String],
        columns: &ColumnMap,
        tags: FileTags,
        filename: &str,
    ) -> Result<CanonicalRecord, Dropped> {
        let number = |field| columns.cell(row, field).and_then(|c| self.normalizer.parse(c));
        let text = |field| columns.cell(row, field).and_then(non_empty);

        let price = number(CanonicalField::Price).ok_or(Dropped::Numeric)?;
        let area = number(CanonicalField::Area).ok_or(Dropped::Numeric)?;
        if price <= 0.0 || area <= self.bounds.min_area || area >= self.bounds.max_area {
            return Err(Dropped::Bounds);
        }

        let raw_district = text(CanonicalField::District);
        let project_name = text(CanonicalField::ProjectName);
        let district = match self.resolver.resolve(&DistrictInput {
            raw_district: raw_district.as_deref(),
            project_name: project_name.as_deref(),
            filename,
            source_kind: tags.source_kind,
        }) {
            Resolution::Resolved(d) => d,
            Resolution::Unresolved => return Err(Dropped::District),
        };

        let property_type_raw = text(CanonicalField::PropertyType);
        let price_per_area = price / area;
        let classification = self.classifier.classify(
            &ClassifyInput {
                raw_type: property_type_raw.as_deref(),
                area,
                price_per_area,
                district: &district.name,
                category: tags.category,
                source_kind: tags.source_kind,
            },
            &LandMedians::new(),
        );

        Ok(CanonicalRecord {
            price,
            area,
            price_per_area,
            district: Some(district.name),
            district_source: district.source,
            property_type_raw,
            property_type: classification.label,
            type_basis: classification.basis,
            source_file: filename.to_string(),
            data_category: tags.category,
            source_kind: tags.source_kind,
            project_name,
            city: text(CanonicalField::City),
            developer: text(CanonicalField::Developer),
            room_count: number(CanonicalField::RoomCount),
            deed_count: number(CanonicalField::DeedCount),
            status: text(CanonicalField::Status),
        })
    }
}

/// Run one file through decode → header → columns → tags → records.
/// Classification here sees no peer statistics; the orchestrator
/// reclassifies once land medians are known.
#[instrument(level = "debug", skip_all, fields(file = %source.filename))]
pub fn process_source(source: &RawSource, stages: &Stages) -> (Vec<CanonicalRecord>, FileReport) {
    let mut report = FileReport::new(&source.filename);

    if !is_supported_name(&source.filename) {
        debug!("unsupported extension, skipping");
        report.outcome = FileOutcome::Unsupported;
        return (Vec::new(), report);
    }

    // ─── 1) decode ───
    let text = match decode_text(&source.bytes) {
        Ok(t) => t,
        Err(e) => {
            warn!(file = %source.filename, error = %e, "could not decode file");
            report.outcome = FileOutcome::Undecodable(e.to_string());
            return (Vec::new(), report);
        }
    };

    // ─── 2) locate header + parse ───
    let table = stages.hunter.parse(&text);
    report.delimiter = Some(table.delimiter);
    report.header_row = Some(table.header_row_index);
    report.malformed_rows = table.malformed_rows;

    // ─── 3) canonical columns + file tags ───
    let columns = stages.canonicalizer.map_headers(&table.headers);
    let tags = stages.tag(&source.filename, &columns);
    report.category = Some(tags.category);
    report.source_kind = Some(tags.source_kind);

    if !columns.is_usable() {
        warn!(
            file = %source.filename,
            headers = ?table.headers,
            "no price/area columns recognised, file contributes nothing"
        );
        report.outcome = FileOutcome::NoUsableColumns;
        return (Vec::new(), report);
    }

    // ─── 4) rows → records ───
    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        report.rows_seen += 1;
        match stages.build_record(row, &columns, tags, &source.filename) {
            Ok(r) => records.push(r),
            Err(Dropped::Numeric) => report.dropped_numeric += 1,
            Err(Dropped::Bounds) => report.dropped_bounds += 1,
            Err(Dropped::District) => report.dropped_district += 1,
        }
    }
    report.records_kept = records.len();

    if report.dropped() > 0 {
        debug!(
            file = %source.filename,
            numeric = report.dropped_numeric,
            bounds = report.dropped_bounds,
            district = report.dropped_district,
            "rows dropped"
        );
    }
    debug!(
        file = %source.filename,
        category = %tags.category,
        kind = %tags.source_kind,
        rows = report.rows_seen,
        kept = report.records_kept,
        "file processed"
    );

    (records, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DistrictSource, PropertyType, TypeBasis};

    fn stages() -> Stages {
        Stages::new(Rules::builtin()).unwrap()
    }

    #[test]
    fn banner_rows_and_drop_counters() {
        let text = "تقرير العروض الأسبوعي\n\n\
                    الحي;السعر;المساحة;نوع العقار\n\
                    الياسمين;1,200,000 ريال;300;فيلا\n\
                    ;900000;150;شقة\n\
                    الياسمين;غير متوفر;200;\n\
                    الياسمين;500000;5;\n";
        let source = RawSource::new("عروض_2024.csv", text);
        let (records, report) = process_source(&source, &stages());

        assert_eq!(report.outcome, FileOutcome::Ok);
        assert_eq!(report.delimiter, Some(';'));
        assert_eq!(report.header_row, Some(2));
        assert_eq!(report.category, Some(DataCategory::Listing));
        assert_eq!(report.rows_seen, 4);
        assert_eq!(report.records_kept, 1);
        assert_eq!(report.dropped_district, 1);
        assert_eq!(report.dropped_numeric, 1);
        assert_eq!(report.dropped_bounds, 1);

        let r = &records[0];
        assert_eq!(r.price, 1_200_000.0);
        assert_eq!(r.area, 300.0);
        assert_eq!(r.price_per_area, 4000.0);
        assert_eq!(r.district.as_deref(), Some("الياسمين"));
        assert_eq!(r.district_source, DistrictSource::Column);
        assert_eq!(r.property_type, PropertyType::Villa);
        assert_eq!(r.type_basis, TypeBasis::Keyword);
        assert_eq!(r.property_type_raw.as_deref(), Some("فيلا"));
    }

    #[test]
    fn utf16_transaction_export() {
        let text = "السعر,المساحة,عدد الصفقات\n2500000,625,1\n";
        let mut bytes = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let (records, report) = process_source(&RawSource::new("صفقات_الملقا.csv", bytes), &stages());
        assert_eq!(report.outcome, FileOutcome::Ok);
        assert_eq!(report.source_kind, Some(SourceKind::Ministry));
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.data_category, DataCategory::Transaction);
        assert_eq!(r.district.as_deref(), Some("الملقا"));
        assert_eq!(r.district_source, DistrictSource::FilenameDictionary);
        assert_eq!(r.property_type, PropertyType::Building);
        assert_eq!(r.type_basis, TypeBasis::Default);
        assert_eq!(r.deed_count, Some(1.0));
    }

    #[test]
    fn optional_columns_are_carried() {
        let text = "المدينة,الحي,السعر,المساحة,عدد الغرف,الحالة,المطور\n\
                    الرياض,النرجس,850000,180,3,متاح,شركة البناء\n";
        let (records, _) = process_source(&RawSource::new("عروض.csv", text), &stages());
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.city.as_deref(), Some("الرياض"));
        assert_eq!(r.room_count, Some(3.0));
        assert_eq!(r.status.as_deref(), Some("متاح"));
        assert_eq!(r.developer.as_deref(), Some("شركة البناء"));
        assert_eq!(r.project_name, None);
    }

    #[test]
    fn unusable_files_contribute_nothing() {
        let s = stages();

        let (records, report) = process_source(&RawSource::new("x.csv", "name,notes\na,b\n"), &s);
        assert!(records.is_empty());
        assert_eq!(report.outcome, FileOutcome::NoUsableColumns);

        let (records, report) = process_source(&RawSource::new("x.csv", vec![0xC3, 0x28, 0x41, 0x42]), &s);
        assert!(records.is_empty());
        assert!(matches!(report.outcome, FileOutcome::Undecodable(_)));

        let (records, report) = process_source(&RawSource::new("x.xlsx", "السعر,المساحة\n1,2\n"), &s);
        assert!(records.is_empty());
        assert_eq!(report.outcome, FileOutcome::Unsupported);
    }

    #[test]
    fn supported_names() {
        assert!(is_supported_name("a.CSV"));
        assert!(is_supported_name("dir/b.tsv"));
        assert!(is_supported_name("c.txt"));
        assert!(!is_supported_name("d.xlsx"));
        assert!(!is_supported_name("csv"));
    }
}
