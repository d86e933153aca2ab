//! Property-type classification. Pure: the only outside input is the
//! per-district land median lookup, which the orchestrator computes in a
//! separate pass so the result never depends on file order.

use std::collections::HashMap;

use crate::config::{AreaBands, ClassifierRules};
use crate::dataset::{DataCategory, PropertyType, SourceKind, TypeBasis};
use crate::process::utils::fold;

#[derive(Debug, Clone, Copy)]
pub struct ClassifyInput<'a> {
    pub raw_type: Option<&'a str>,
    pub area: f64,
    pub price_per_area: f64,
    pub district: &'a str,
    pub category: DataCategory,
    pub source_kind: SourceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub label: PropertyType,
    pub basis: TypeBasis,
}

impl Classification {
    fn new(label: PropertyType, basis: TypeBasis) -> Self {
        Self { label, basis }
    }
}

/// District → median land price per area unit.
pub type LandMedians = HashMap<String, f64>;

pub struct PropertyClassifier {
    rules: Vec<(PropertyType, Vec<String>)>,
    building: Vec<String>,
    bands: AreaBands,
    premium: f64,
    area_ceiling: f64,
}

impl PropertyClassifier {
    pub fn new(rules: &ClassifierRules) -> Self {
        let folded = |v: &[String]| -> Vec<String> {
            v.iter().map(|k| fold(k.trim())).filter(|k| !k.is_empty()).collect()
        };
        Self {
            rules: rules
                .rules
                .iter()
                .map(|r| (r.label, folded(&r.keywords)))
                .collect(),
            building: folded(&rules.building_keywords),
            bands: rules.area_bands,
            premium: rules.building_premium,
            area_ceiling: rules.building_area_ceiling,
        }
    }

    /// Always terminates with a concrete label.
    pub fn classify(&self, input: &ClassifyInput<'_>, land_medians: &LandMedians) -> Classification {
        let text = input.raw_type.map(fold).unwrap_or_default();
        let text = text.trim();

        match input.category {
            DataCategory::Transaction => {
                if self.is_land(text) {
                    Classification::new(PropertyType::Land, TypeBasis::Keyword)
                } else if self.has_non_land_word(text) {
                    Classification::new(PropertyType::Building, TypeBasis::Keyword)
                } else {
                    Classification::new(PropertyType::Building, TypeBasis::Default)
                }
            }
            DataCategory::Listing => {
                if let Some(label) = self.keyword_label(text) {
                    return Classification::new(label, TypeBasis::Keyword);
                }
                let explicit_building = contains_any(text, &self.building);
                if !explicit_building && input.source_kind == SourceKind::Ministry {
                    if let Some(median) = land_medians.get(input.district).copied() {
                        return self.by_peer_median(input, median);
                    }
                }
                Classification::new(self.by_area(input.area), TypeBasis::AreaBand)
            }
        }
    }

    /// A land keyword with no building or other-type word beside it.
    /// "دور أرضي" is a ground floor, not a plot.
    fn is_land(&self, text: &str) -> bool {
        self.rules
            .iter()
            .filter(|(label, _)| *label == PropertyType::Land)
            .any(|(_, kws)| contains_any(text, kws))
            && !self.has_non_land_word(text)
    }

    fn has_non_land_word(&self, text: &str) -> bool {
        contains_any(text, &self.building)
            || self
                .rules
                .iter()
                .filter(|(label, _)| *label != PropertyType::Land)
                .any(|(_, kws)| contains_any(text, kws))
    }

    fn keyword_label(&self, text: &str) -> Option<PropertyType> {
        if text.is_empty() {
            return None;
        }
        let land_ok = !self.has_non_land_word(text);
        self.rules
            .iter()
            .filter(|(label, _)| land_ok || *label != PropertyType::Land)
            .find(|(_, kws)| contains_any(text, kws))
            .map(|(label, _)| *label)
    }

    fn by_area(&self, area: f64) -> PropertyType {
        if area < self.bands.apartment_below {
            PropertyType::Apartment
        } else if area < self.bands.floor_below {
            PropertyType::Floor
        } else {
            PropertyType::Villa
        }
    }

    /// Transaction-style rows mixed into a listing batch: a unit priced well
    /// above the district's land median on a small plot is a building.
    fn by_peer_median(&self, input: &ClassifyInput<'_>, median: f64) -> Classification {
        let label = if input.price_per_area > self.premium * median && input.area < self.area_ceiling {
            PropertyType::Building
        } else {
            PropertyType::Land
        };
        Classification::new(label, TypeBasis::PeerMedian)
    }
}

fn contains_any(text: &str, keywords: &[String]) -> bool {
    !text.is_empty() && keywords.iter().any(|k| text.contains(k.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rules;

    fn classifier() -> PropertyClassifier {
        PropertyClassifier::new(&Rules::builtin().classifier)
    }

    fn input(raw: Option<&str>, area: f64, category: DataCategory) -> ClassifyInput<'_> {
        ClassifyInput {
            raw_type: raw,
            area,
            price_per_area: 3000.0,
            district: "الملقا",
            category,
            source_kind: SourceKind::General,
        }
    }

    #[test]
    fn transaction_is_binary() {
        let c = classifier();
        let none = LandMedians::new();
        let raws = [Some("أرض سكنية"), Some("قطعة أرض"), Some("فيلا"), Some("شقة"), Some("دور"), Some(""), None, Some("???")];
        for raw in raws {
            for area in [50.0, 250.0, 900.0] {
                let got = c.classify(&input(raw, area, DataCategory::Transaction), &none);
                assert!(
                    matches!(got.label, PropertyType::Land | PropertyType::Building),
                    "{:?} → {:?}",
                    raw,
                    got
                );
            }
        }
        assert_eq!(
            c.classify(&input(Some("قطعة أرض"), 500.0, DataCategory::Transaction), &none).label,
            PropertyType::Land
        );
        assert_eq!(
            c.classify(&input(Some("فيلا"), 500.0, DataCategory::Transaction), &none).label,
            PropertyType::Building
        );
    }

    #[test]
    fn listing_keyword_priority() {
        let c = classifier();
        let none = LandMedians::new();
        let label = |raw: &str| c.classify(&input(Some(raw), 300.0, DataCategory::Listing), &none).label;
        assert_eq!(label("ارض تجارية"), PropertyType::Land);
        assert_eq!(label("شقة للبيع"), PropertyType::Apartment);
        assert_eq!(label("Studio apartment"), PropertyType::Apartment);
        assert_eq!(label("تاون هاوس"), PropertyType::Villa);
        assert_eq!(label("دور علوي"), PropertyType::Floor);
        assert_eq!(label("Penthouse"), PropertyType::Villa);
    }

    #[test]
    fn ground_floor_is_not_land() {
        let c = classifier();
        let none = LandMedians::new();
        let got = |raw: &str, category| c.classify(&input(Some(raw), 300.0, category), &none);

        assert_eq!(
            got("شقة دور أرضي", DataCategory::Listing),
            Classification::new(PropertyType::Apartment, TypeBasis::Keyword)
        );
        assert_eq!(got("دور أرضي", DataCategory::Listing).label, PropertyType::Floor);
        assert_eq!(got("شقة أرضية", DataCategory::Listing).label, PropertyType::Apartment);
        assert_eq!(got("أرض سكنية", DataCategory::Listing).label, PropertyType::Land);

        for raw in ["فيلا دور أرضي", "دور أرضي", "شقة أرضية", "أرض عليها عمارة"] {
            assert_eq!(
                got(raw, DataCategory::Transaction),
                Classification::new(PropertyType::Building, TypeBasis::Keyword),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn listing_without_keyword_uses_area_bands() {
        let c = classifier();
        let none = LandMedians::new();
        let got = |area: f64| c.classify(&input(None, area, DataCategory::Listing), &none);
        assert_eq!(got(100.0), Classification::new(PropertyType::Apartment, TypeBasis::AreaBand));
        assert_eq!(got(199.9).label, PropertyType::Apartment);
        assert_eq!(got(200.0).label, PropertyType::Floor);
        assert_eq!(got(359.0).label, PropertyType::Floor);
        assert_eq!(got(360.0).label, PropertyType::Villa);
        assert_eq!(
            c.classify(&input(Some("غير معروف"), 120.0, DataCategory::Listing), &none).label,
            PropertyType::Apartment
        );
    }

    #[test]
    fn peer_median_only_for_ministry_rows_without_keywords() {
        let c = classifier();
        let mut medians = LandMedians::new();
        medians.insert("الملقا".to_string(), 2000.0);

        let mut row = input(None, 300.0, DataCategory::Listing);
        row.source_kind = SourceKind::Ministry;
        row.price_per_area = 3500.0;
        assert_eq!(c.classify(&row, &medians), Classification::new(PropertyType::Building, TypeBasis::PeerMedian));

        row.price_per_area = 2500.0;
        assert_eq!(c.classify(&row, &medians), Classification::new(PropertyType::Land, TypeBasis::PeerMedian));

        // large plots stay land even when expensive
        row.price_per_area = 3500.0;
        row.area = 5000.0;
        assert_eq!(c.classify(&row, &medians).label, PropertyType::Land);

        // no median for the district → area bands
        row.district = "النرجس";
        assert_eq!(c.classify(&row, &medians).basis, TypeBasis::AreaBand);

        // general sources never use the heuristic
        let mut general = input(None, 300.0, DataCategory::Listing);
        general.price_per_area = 3500.0;
        assert_eq!(c.classify(&general, &medians).basis, TypeBasis::AreaBand);
    }
}
