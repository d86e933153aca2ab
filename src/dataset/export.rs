// src/dataset/export.rs
//! Columnar export of a dataset snapshot: one Arrow column per record field.

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{
    fs::{self, File},
    path::Path,
    sync::Arc,
};
use tracing::info;

use crate::dataset::{AggregateDataset, CanonicalRecord};

pub fn schema() -> Schema {
    let f64_col = |name: &str, nullable| Field::new(name, DataType::Float64, nullable);
    let str_col = |name: &str, nullable| Field::new(name, DataType::Utf8, nullable);
    Schema::new(vec![
        f64_col("price", false),
        f64_col("area", false),
        f64_col("price_per_area", false),
        str_col("district", true),
        str_col("district_source", false),
        str_col("property_type_raw", true),
        str_col("property_type", false),
        str_col("type_basis", false),
        str_col("source_file", false),
        str_col("data_category", false),
        str_col("source_kind", false),
        str_col("project_name", true),
        str_col("city", true),
        str_col("developer", true),
        f64_col("room_count", true),
        f64_col("deed_count", true),
        str_col("status", true),
    ])
}

pub fn to_record_batch(dataset: &AggregateDataset) -> Result<RecordBatch> {
    let records = dataset.records();

    let columns: Vec<ArrayRef> = vec![
        f64_column(records, |r| r.price),
        f64_column(records, |r| r.area),
        f64_column(records, |r| r.price_per_area),
        opt_str_column(records, |r| r.district.as_deref()),
        str_column(records, |r| r.district_source.as_str()),
        opt_str_column(records, |r| r.property_type_raw.as_deref()),
        str_column(records, |r| r.property_type.as_str()),
        str_column(records, |r| r.type_basis.as_str()),
        str_column(records, |r| r.source_file.as_str()),
        str_column(records, |r| r.data_category.as_str()),
        str_column(records, |r| r.source_kind.as_str()),
        opt_str_column(records, |r| r.project_name.as_deref()),
        opt_str_column(records, |r| r.city.as_deref()),
        opt_str_column(records, |r| r.developer.as_deref()),
        opt_f64_column(records, |r| r.room_count),
        opt_f64_column(records, |r| r.deed_count),
        opt_str_column(records, |r| r.status.as_deref()),
    ];

    RecordBatch::try_new(Arc::new(schema()), columns).context("assembling record batch")
}

fn f64_column(records: &[CanonicalRecord], get: fn(&CanonicalRecord) -> f64) -> ArrayRef {
    Arc::new(records.iter().map(|r| Some(get(r))).collect::<Float64Array>())
}

fn opt_f64_column(records: &[CanonicalRecord], get: fn(&CanonicalRecord) -> Option<f64>) -> ArrayRef {
    Arc::new(records.iter().map(get).collect::<Float64Array>())
}

fn str_column(records: &[CanonicalRecord], get: fn(&CanonicalRecord) -> &str) -> ArrayRef {
    Arc::new(records.iter().map(|r| Some(get(r))).collect::<StringArray>())
}

fn opt_str_column(records: &[CanonicalRecord], get: fn(&CanonicalRecord) -> Option<&str>) -> ArrayRef {
    Arc::new(records.iter().map(get).collect::<StringArray>())
}

/// Write the dataset as a single Snappy-compressed Parquet file. Returns
/// the file size in bytes.
pub fn write_parquet(dataset: &AggregateDataset, output_path: &Path) -> Result<u64> {
    let batch = to_record_batch(dataset)?;

    let file = File::create(output_path)
        .with_context(|| format!("creating file {}", output_path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), Some(props)).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch to parquet")?;
    writer.close().context("closing parquet writer")?;

    let bytes = fs::metadata(output_path).context("getting file metadata")?.len();
    info!(path = %output_path.display(), rows = batch.num_rows(), bytes, "wrote parquet");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::record;
    use crate::dataset::{DataCategory, PropertyType};
    use crate::process::FileReport;
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn fixture() -> AggregateDataset {
        let mut ds = AggregateDataset::new();
        let mut villa = record("النرجس", PropertyType::Villa, DataCategory::Listing, 2_400_000.0, 400.0);
        villa.room_count = Some(5.0);
        ds.append(
            vec![
                record("الملقا", PropertyType::Land, DataCategory::Transaction, 1_500_000.0, 500.0),
                villa,
            ],
            FileReport::new("test.csv"),
        );
        ds
    }

    #[test]
    fn batch_has_one_column_per_field() -> Result<()> {
        let batch = to_record_batch(&fixture())?;
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 17);

        let types = batch
            .column_by_name("property_type")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .unwrap();
        assert_eq!(types.value(0), "land");
        assert_eq!(types.value(1), "villa");

        let rooms = batch
            .column_by_name("room_count")
            .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
            .unwrap();
        assert!(rooms.is_null(0));
        assert_eq!(rooms.value(1), 5.0);
        Ok(())
    }

    #[test]
    fn parquet_reads_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("dataset.parquet");
        let bytes = write_parquet(&fixture(), &path)?;
        assert!(bytes > 0);

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
        let mut rows = 0;
        for batch in reader {
            let batch = batch?;
            rows += batch.num_rows();
            let districts = batch
                .column_by_name("district")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .unwrap();
            assert_eq!(districts.value(0), "الملقا");
            let ppa = batch
                .column_by_name("price_per_area")
                .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
                .unwrap();
            assert_eq!(ppa.value(1), 6000.0);
        }
        assert_eq!(rows, 2);
        Ok(())
    }
}
