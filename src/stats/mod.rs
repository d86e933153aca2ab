// src/stats/mod.rs
//! Robust statistics. One trimmed estimator serves land benchmarking for the
//! classifier, sale benchmarking, and every market-summary figure.

pub mod summary;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::config::{Band, StatsConfig};
use crate::dataset::{CanonicalRecord, DataCategory, PropertyType, TypeBasis};
use crate::process::classify::LandMedians;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrimmedEstimate {
    pub median: f64,
    /// Samples left after the sanity band and the IQR fence.
    pub retained: usize,
    /// Samples inside the sanity band, before fencing.
    pub in_band: usize,
    pub confidence: Confidence,
}

/// Median of the series after dropping non-positive values, values
/// outside `band`, and (with enough samples) points beyond the
/// `fence_multiplier × IQR` fence. `None` when nothing survives the band.
pub fn trimmed_estimate<I>(values: I, band: Band, cfg: &StatsConfig) -> Option<TrimmedEstimate>
where
    I: IntoIterator<Item = f64>,
{
    let mut sane: Vec<f64> = values
        .into_iter()
        .filter(|v| v.is_finite() && *v > 0.0 && band.contains(*v))
        .collect();
    if sane.is_empty() {
        return None;
    }
    sane.sort_by(f64::total_cmp);
    let in_band = sane.len();

    let kept = if in_band < cfg.min_samples {
        sane
    } else {
        let q1 = quantile(&sane, 0.25);
        let q3 = quantile(&sane, 0.75);
        let iqr = q3 - q1;
        let lo = q1 - cfg.fence_multiplier * iqr;
        let hi = q3 + cfg.fence_multiplier * iqr;
        sane.into_iter().filter(|v| *v >= lo && *v <= hi).collect()
    };

    let retained = kept.len();
    let confidence = if retained > cfg.high_confidence_above {
        Confidence::High
    } else if retained > cfg.medium_confidence_above {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    Some(TrimmedEstimate {
        median: median(&kept),
        retained,
        in_band,
        confidence,
    })
}

/// Median of an ascending slice. NaN for an empty slice.
pub fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => f64::NAN,
        _ if n % 2 == 1 => sorted[n / 2],
        _ => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    }
}

/// Linear-interpolated quantile of an ascending, non-empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Trimmed price-per-area estimate per district.
pub fn benchmark_by_district<'a, I>(records: I, cfg: &StatsConfig) -> BTreeMap<String, TrimmedEstimate>
where
    I: IntoIterator<Item = &'a CanonicalRecord>,
{
    let mut groups: HashMap<&str, Vec<f64>> = HashMap::new();
    for r in records {
        groups.entry(r.district_name()).or_default().push(r.price_per_area);
    }
    groups
        .into_iter()
        .filter_map(|(district, values)| {
            trimmed_estimate(values, cfg.price_per_area, cfg).map(|e| (district.to_string(), e))
        })
        .collect()
}

/// Per-district land price per area unit.
pub fn land_benchmarks<'a, I>(records: I, cfg: &StatsConfig) -> BTreeMap<String, TrimmedEstimate>
where
    I: IntoIterator<Item = &'a CanonicalRecord>,
{
    benchmark_by_district(
        records.into_iter().filter(|r| r.property_type == PropertyType::Land),
        cfg,
    )
}

/// Peer lookup for the classifier: land medians from records typed `Land`
/// by an explicit keyword, so heuristic labels never feed back into it.
pub fn land_medians<'a, I>(records: I, cfg: &StatsConfig) -> LandMedians
where
    I: IntoIterator<Item = &'a CanonicalRecord>,
{
    land_benchmarks(
        records.into_iter().filter(|r| r.type_basis == TypeBasis::Keyword),
        cfg,
    )
    .into_iter()
    .map(|(district, e)| (district, e.median))
    .collect()
}

/// Per-district asking price per area unit across listings.
pub fn sale_benchmarks<'a, I>(records: I, cfg: &StatsConfig) -> BTreeMap<String, TrimmedEstimate>
where
    I: IntoIterator<Item = &'a CanonicalRecord>,
{
    benchmark_by_district(
        records.into_iter().filter(|r| r.data_category == DataCategory::Listing),
        cfg,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rules;
    use crate::dataset::tests::record;

    fn cfg() -> StatsConfig {
        Rules::builtin().stats
    }

    #[test]
    fn extreme_outlier_is_trimmed() {
        let cfg = cfg();
        let clean: Vec<f64> = (0..20).map(|i| 3000.0 + 10.0 * i as f64).collect();
        let mut series = clean.clone();
        series.push(300_000.0 / 3.0); // 100000: ~33× the rest, inside the sanity band
        series.push(3000.0 * 100.0 / 2.5); // 120000: 40×

        let est = trimmed_estimate(series.clone(), cfg.price_per_area, &cfg).unwrap();
        let mut sorted_clean = clean.clone();
        sorted_clean.sort_by(f64::total_cmp);
        assert_eq!(est.median, median(&sorted_clean));
        assert_eq!(est.retained, 20);
        assert_eq!(est.in_band, 22);
        assert_eq!(est.confidence, Confidence::High);

        let mut raw = series;
        raw.sort_by(f64::total_cmp);
        let raw_median = median(&raw);
        assert!(raw_median != est.median);
        assert!((raw_median - est.median).abs() / est.median < 0.01);
    }

    #[test]
    fn hundredfold_outlier() {
        let cfg = cfg();
        let clean = vec![1000.0, 1040.0, 980.0, 1010.0, 995.0, 1020.0, 1005.0];
        let mut series = clean.clone();
        series.push(100_000.0);
        let est = trimmed_estimate(series, cfg.price_per_area, &cfg).unwrap();
        let mut sorted_clean = clean;
        sorted_clean.sort_by(f64::total_cmp);
        assert_eq!(est.median, median(&sorted_clean));
        assert_eq!(est.confidence, Confidence::Medium);
    }

    #[test]
    fn sanity_band_and_small_samples() {
        let cfg = cfg();
        // 50 and -3 are outside the band; 3 survivors < min_samples → plain median
        let est = trimmed_estimate(vec![50.0, -3.0, 2000.0, 9000.0, 2500.0], cfg.price_per_area, &cfg).unwrap();
        assert_eq!(est.median, 2500.0);
        assert_eq!(est.retained, 3);
        assert_eq!(est.confidence, Confidence::Low);

        assert!(trimmed_estimate(vec![0.0, f64::NAN, 200_000.0], cfg.price_per_area, &cfg).is_none());
        assert!(trimmed_estimate(Vec::new(), cfg.price_per_area, &cfg).is_none());
    }

    #[test]
    fn quantiles_interpolate() {
        let s = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&s, 0.25), 1.75);
        assert_eq!(quantile(&s, 0.75), 3.25);
        assert_eq!(median(&s), 2.5);
        assert_eq!(median(&[7.0]), 7.0);
    }

    #[test]
    fn benchmarks_group_by_district() {
        let cfg = cfg();
        let records = vec![
            record("الملقا", PropertyType::Land, DataCategory::Transaction, 1_500_000.0, 500.0),
            record("الملقا", PropertyType::Land, DataCategory::Transaction, 1_600_000.0, 500.0),
            record("الملقا", PropertyType::Apartment, DataCategory::Listing, 900_000.0, 150.0),
            record("النرجس", PropertyType::Land, DataCategory::Transaction, 1_000_000.0, 500.0),
        ];
        let land = land_benchmarks(&records, &cfg);
        assert_eq!(land.len(), 2);
        assert_eq!(land["الملقا"].median, 3100.0);
        assert_eq!(land["النرجس"].median, 2000.0);

        let medians = land_medians(&records, &cfg);
        assert_eq!(medians.get("الملقا"), Some(&3100.0));

        let sale = sale_benchmarks(&records, &cfg);
        assert_eq!(sale.len(), 1);
        assert_eq!(sale["الملقا"].median, 6000.0);
    }
}
