// src/config/mod.rs
//! Rule tables that drive the pipeline: column synonyms, the district
//! dictionary, keyword sets, and numeric sanity bounds.
//!
//! These are data, not logic. The built-in set is embedded from
//! `default_rules.yaml`; callers can load their own with [`Rules::load`].

use anyhow::{ensure, Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path};

use crate::dataset::PropertyType;
use crate::process::canonical::CanonicalField;

const DEFAULT_RULES: &str = include_str!("default_rules.yaml");

static BUILTIN: Lazy<Rules> = Lazy::new(|| {
    Rules::from_yaml_str(DEFAULT_RULES).expect("embedded default rules should be valid")
});

#[derive(Debug, Clone, Deserialize)]
pub struct Rules {
    pub numeric: NumericRules,
    pub header: HeaderRules,
    pub synonyms: BTreeMap<CanonicalField, Vec<String>>,
    pub category: CategoryRules,
    pub district: DistrictRules,
    pub classifier: ClassifierRules,
    pub records: RecordBounds,
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NumericRules {
    pub currency_tokens: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeaderRules {
    /// How many leading lines may hold banners/metadata before the header.
    pub scan_lines: usize,
    /// Checked in order; the first one present on the header line wins.
    pub delimiters: Vec<char>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRules {
    pub listing_tokens: Vec<String>,
    pub ministry_tokens: Vec<String>,
    pub developer_tokens: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistrictRules {
    pub dictionary: Vec<String>,
    pub noise_tokens: Vec<String>,
    pub filename_noise_tokens: Vec<String>,
    pub locative_keywords: Vec<String>,
    pub blocklist: Blocklist,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Blocklist {
    #[serde(default)]
    pub common: Vec<String>,
    #[serde(default)]
    pub ministry: Vec<String>,
    #[serde(default)]
    pub developer: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierRules {
    /// Ordered: the first rule with a matching keyword decides.
    pub rules: Vec<KeywordRule>,
    pub building_keywords: Vec<String>,
    pub area_bands: AreaBands,
    pub building_premium: f64,
    pub building_area_ceiling: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRule {
    pub label: PropertyType,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AreaBands {
    pub apartment_below: f64,
    pub floor_below: f64,
}

/// Exclusive bounds a row must satisfy to become a record.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RecordBounds {
    pub min_area: f64,
    pub max_area: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub fn contains(&self, v: f64) -> bool {
        v > self.min && v < self.max
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatsConfig {
    pub price_per_area: Band,
    pub price: Band,
    pub min_samples: usize,
    pub fence_multiplier: f64,
    pub high_confidence_above: usize,
    pub medium_confidence_above: usize,
}

impl Rules {
    /// The embedded rule set, parsed once per process.
    pub fn builtin() -> &'static Rules {
        &BUILTIN
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let rules: Rules = serde_yaml::from_str(text).context("parsing rules YAML")?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading rules {:?}", path))?;
        Self::from_yaml_str(&text).with_context(|| format!("loading rules {:?}", path))
    }

    /// Aliases of `price` and `area`; a line holding any of them is a header.
    pub fn header_anchors(&self) -> Vec<&str> {
        [CanonicalField::Price, CanonicalField::Area]
            .iter()
            .filter_map(|f| self.synonyms.get(f))
            .flatten()
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
            .collect()
    }

    fn validate(&self) -> Result<()> {
        for field in [CanonicalField::Price, CanonicalField::Area] {
            ensure!(
                self.synonyms.get(&field).map_or(false, |v| !v.is_empty()),
                "synonym table has no aliases for `{}`",
                field.as_str()
            );
        }
        ensure!(self.header.scan_lines > 0, "header.scan_lines must be > 0");
        ensure!(
            self.header.delimiters.iter().all(char::is_ascii),
            "header.delimiters must be single-byte characters"
        );
        let bands = self.classifier.area_bands;
        ensure!(
            bands.apartment_below <= bands.floor_below,
            "classifier.area_bands: apartment_below must not exceed floor_below"
        );
        ensure!(
            self.records.min_area < self.records.max_area,
            "records.min_area must be below records.max_area"
        );
        ensure!(self.stats.min_samples > 0, "stats.min_samples must be > 0");
        Ok(())
    }
}
