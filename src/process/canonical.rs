use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

use crate::config::Rules;
use crate::process::utils::clean_str;

/// The small fixed vocabulary every source column is mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Price,
    Area,
    District,
    PropertyType,
    ProjectName,
    City,
    Developer,
    DeedCount,
    RoomCount,
    Status,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Price => "price",
            CanonicalField::Area => "area",
            CanonicalField::District => "district",
            CanonicalField::PropertyType => "property_type",
            CanonicalField::ProjectName => "project_name",
            CanonicalField::City => "city",
            CanonicalField::Developer => "developer",
            CanonicalField::DeedCount => "deed_count",
            CanonicalField::RoomCount => "room_count",
            CanonicalField::Status => "status",
        }
    }
}

/// Canonical field → column index in the source table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: BTreeMap<CanonicalField, usize>,
}

impl ColumnMap {
    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    /// Both `price` and `area` resolved; otherwise the file contributes
    /// nothing.
    pub fn is_usable(&self) -> bool {
        self.contains(CanonicalField::Price) && self.contains(CanonicalField::Area)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, usize)> + '_ {
        self.columns.iter().map(|(f, i)| (*f, *i))
    }

    /// Cell for `field` in `row`, if the column exists and the row reaches it.
    pub fn cell<'r>(&self, row: &'r [String], field: CanonicalField) -> Option<&'r str> {
        self.get(field).and_then(|i| row.get(i)).map(String::as_str)
    }
}

/// Maps source column names to canonical fields by exact (trimmed) match.
pub struct ColumnCanonicalizer {
    aliases: HashMap<String, CanonicalField>,
}

impl ColumnCanonicalizer {
    pub fn new(rules: &Rules) -> Self {
        let mut aliases = HashMap::new();
        for (field, names) in &rules.synonyms {
            for name in names {
                // an alias listed under two fields keeps the first field
                aliases.entry(clean_str(name)).or_insert(*field);
            }
        }
        Self { aliases }
    }

    pub fn lookup(&self, header: &str) -> Option<CanonicalField> {
        self.aliases.get(&clean_str(header)).copied()
    }

    /// Unmapped headers are ignored; duplicate canonical columns keep the
    /// first occurrence.
    pub fn map_headers(&self, headers: &[String]) -> ColumnMap {
        let mut columns = BTreeMap::new();
        for (idx, header) in headers.iter().enumerate() {
            match self.lookup(header) {
                Some(field) => {
                    if columns.contains_key(&field) {
                        debug!(header = %header, field = field.as_str(), "duplicate canonical column, keeping first");
                        continue;
                    }
                    columns.insert(field, idx);
                }
                None => trace!(header = %header, "unmapped column"),
            }
        }
        ColumnMap { columns }
    }
}
