// src/stats/summary.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::StatsConfig;
use crate::dataset::{AggregateDataset, CanonicalRecord, DataCategory, PropertyType};
use crate::stats::{trimmed_estimate, TrimmedEstimate};

#[derive(Debug, Clone, Serialize)]
pub struct DistrictSummary {
    pub district: String,
    pub records: usize,
    pub listings: usize,
    pub transactions: usize,
    /// Price per area unit of land.
    pub land_ppa: Option<TrimmedEstimate>,
    pub building_ppa: Option<TrimmedEstimate>,
    /// Asking price per area unit across listings of any type.
    pub listing_ppa: Option<TrimmedEstimate>,
    /// Total asking price of listings.
    pub listing_ticket: Option<TrimmedEstimate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketSummary {
    pub built_at: DateTime<Utc>,
    pub total_records: usize,
    pub districts: Vec<DistrictSummary>,
}

impl MarketSummary {
    pub fn from_dataset(dataset: &AggregateDataset, cfg: &StatsConfig) -> Self {
        let mut groups: BTreeMap<&str, Vec<&CanonicalRecord>> = BTreeMap::new();
        for r in dataset.records() {
            groups.entry(r.district_name()).or_default().push(r);
        }

        let districts = groups
            .into_iter()
            .map(|(district, records)| summarise(district, &records, cfg))
            .collect();

        Self {
            built_at: dataset.built_at(),
            total_records: dataset.len(),
            districts,
        }
    }

    pub fn district(&self, name: &str) -> Option<&DistrictSummary> {
        self.districts.iter().find(|d| d.district == name)
    }
}

fn summarise(district: &str, records: &[&CanonicalRecord], cfg: &StatsConfig) -> DistrictSummary {
    let ppa_where = |keep: &dyn Fn(&CanonicalRecord) -> bool| {
        trimmed_estimate(
            records.iter().copied().filter(|r| keep(*r)).map(|r| r.price_per_area),
            cfg.price_per_area,
            cfg,
        )
    };
    let is_listing = |r: &CanonicalRecord| r.data_category == DataCategory::Listing;
    let listings = records.iter().copied().filter(|r| is_listing(*r)).count();

    DistrictSummary {
        district: district.to_string(),
        records: records.len(),
        listings,
        transactions: records.len() - listings,
        land_ppa: ppa_where(&|r| r.property_type == PropertyType::Land),
        building_ppa: ppa_where(&|r| r.property_type == PropertyType::Building),
        listing_ppa: ppa_where(&is_listing),
        listing_ticket: trimmed_estimate(
            records.iter().copied().filter(|r| is_listing(*r)).map(|r| r.price),
            cfg.price,
            cfg,
        ),
    }
}
