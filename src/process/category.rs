use crate::config::CategoryRules;
use crate::dataset::{DataCategory, SourceKind};
use crate::process::canonical::{CanonicalField, ColumnMap};
use crate::process::utils::{contains_phrase, words};

/// Provenance tags shared by every record of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTags {
    pub category: DataCategory,
    pub source_kind: SourceKind,
}

/// Tags a file from its name, plus the deed-count column for ministry
/// exports whose filenames say nothing.
pub fn tag_file(rules: &CategoryRules, filename: &str, columns: &ColumnMap) -> FileTags {
    let name = words(filename);
    let has = |tokens: &[String]| tokens.iter().any(|t| contains_phrase(&name, t));

    let category = if has(&rules.listing_tokens) {
        DataCategory::Listing
    } else {
        DataCategory::Transaction
    };

    let source_kind = if has(&rules.ministry_tokens) || columns.contains(CanonicalField::DeedCount) {
        SourceKind::Ministry
    } else if has(&rules.developer_tokens) {
        SourceKind::Developer
    } else {
        SourceKind::General
    };

    FileTags {
        category,
        source_kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rules;
    use crate::process::canonical::ColumnCanonicalizer;

    fn columns(names: &[&str]) -> ColumnMap {
        let headers: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        ColumnCanonicalizer::new(Rules::builtin()).map_headers(&headers)
    }

    #[test]
    fn listing_by_filename_token() {
        let rules = &Rules::builtin().category;
        let t = tag_file(rules, "عروض_الملقا.csv", &columns(&["السعر", "المساحة"]));
        assert_eq!(t.category, DataCategory::Listing);
        assert_eq!(t.source_kind, SourceKind::General);

        let t = tag_file(rules, "Aqar_Listings_2024.CSV", &ColumnMap::default());
        assert_eq!(t.category, DataCategory::Listing);
    }

    #[test]
    fn defaults_to_transaction() {
        let t = tag_file(&Rules::builtin().category, "النرجس_2024.csv", &ColumnMap::default());
        assert_eq!(t.category, DataCategory::Transaction);
    }

    #[test]
    fn tokens_match_whole_filename_parts() {
        let rules = &Rules::builtin().category;
        let t = tag_file(rules, "معرض_السيارات_الملقا.csv", &ColumnMap::default());
        assert_eq!(t.category, DataCategory::Transaction);
        assert_eq!(t.source_kind, SourceKind::General);

        let t = tag_file(rules, "عرض-خاص.csv", &ColumnMap::default());
        assert_eq!(t.category, DataCategory::Listing);
        let t = tag_file(rules, "2024/moj.csv", &ColumnMap::default());
        assert_eq!(t.source_kind, SourceKind::Ministry);
    }

    #[test]
    fn ministry_by_token_or_deed_column() {
        let rules = &Rules::builtin().category;
        assert_eq!(tag_file(rules, "MOJ_deals.csv", &ColumnMap::default()).source_kind, SourceKind::Ministry);
        let cols = columns(&["السعر", "المساحة", "عدد الصفقات"]);
        assert_eq!(tag_file(rules, "deals.csv", &cols).source_kind, SourceKind::Ministry);
    }

    #[test]
    fn developer_by_brand_token() {
        let t = tag_file(&Rules::builtin().category, "عروض_راكز.csv", &ColumnMap::default());
        assert_eq!(t.source_kind, SourceKind::Developer);
        assert_eq!(t.category, DataCategory::Listing);
    }
}
