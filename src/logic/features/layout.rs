//! Feature Layout - Locked schema and derived feature naming
//!
//! **This file controls the feature schema of a detector**
//!
//! ## Rules:
//! 1. The schema is locked from the first accepted sample (lexicographic key order)
//! 2. The full layout = raw fields, then rolling aggregates, then lags
//! 3. Layout length never changes until the detector is reset

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::logic::window::Aggregate;

// ============================================================================
// FIELD SCHEMA
// ============================================================================

/// How a raw field is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Numbers and booleans
    Numeric,
    /// Text, mapped to a first-seen category index
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

/// Raw field schema, locked on the first sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    fields: Vec<FieldSpec>,
}

impl FeatureSchema {
    /// Fields must already be in lexicographic order
    pub(crate) fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Field index by name (binary search, fields are sorted)
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields
            .binary_search_by(|f| f.name.as_str().cmp(name))
            .ok()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

// ============================================================================
// FULL FEATURE LAYOUT
// ============================================================================

/// Complete layout information for a detector's feature vectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLayout {
    pub raw_count: usize,
    pub feature_names: Vec<String>,
    pub hash: u32,
}

impl FeatureLayout {
    /// Build the layout for a schema and the configured derived features.
    ///
    /// Order: raw fields, then for each window and aggregate every field,
    /// then for each lag period every field.
    pub fn build(
        schema: &FeatureSchema,
        rolling_windows: &[usize],
        aggregates: &[Aggregate],
        lag_periods: &[usize],
    ) -> Self {
        let mut names: Vec<String> = schema.field_names().map(str::to_string).collect();

        for &w in rolling_windows {
            for agg in aggregates {
                for field in schema.field_names() {
                    names.push(rolling_name(field, w, *agg));
                }
            }
        }
        for &p in lag_periods {
            for field in schema.field_names() {
                names.push(lag_name(field, p));
            }
        }

        let hash = layout_hash(&names);
        Self {
            raw_count: schema.len(),
            feature_names: names,
            hash,
        }
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Feature index by name (O(n) but layouts are small)
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }
}

pub fn rolling_name(field: &str, window: usize, agg: Aggregate) -> String {
    format!("{}__roll{}_{}", field, window, agg.name())
}

pub fn lag_name(field: &str, period: usize) -> String {
    format!("{}__lag{}", field, period)
}

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// CRC32 over the feature names in order.
/// Used to detect layout changes across resets.
pub fn layout_hash(names: &[String]) -> u32 {
    let mut hasher = Hasher::new();

    hasher.update(&(names.len() as u32).to_le_bytes());
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(names: &[&str]) -> FeatureSchema {
        FeatureSchema::new(
            names
                .iter()
                .map(|n| FieldSpec { name: n.to_string(), kind: FieldKind::Numeric })
                .collect(),
        )
    }

    #[test]
    fn test_layout_order() {
        let layout = FeatureLayout::build(&schema(&["a", "b"]), &[3], &[Aggregate::Mean], &[1]);
        assert_eq!(
            layout.feature_names,
            vec!["a", "b", "a__roll3_mean", "b__roll3_mean", "a__lag1", "b__lag1"]
        );
        assert_eq!(layout.raw_count, 2);
        assert_eq!(layout.feature_count(), 6);
    }

    #[test]
    fn test_layout_hash_consistency() {
        let s = schema(&["x"]);
        let h1 = FeatureLayout::build(&s, &[5], &Aggregate::ALL, &[1]).hash;
        let h2 = FeatureLayout::build(&s, &[5], &Aggregate::ALL, &[1]).hash;
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_layout_hash_changes_with_layout() {
        let s = schema(&["x"]);
        let h1 = FeatureLayout::build(&s, &[5], &Aggregate::ALL, &[1]).hash;
        let h2 = FeatureLayout::build(&s, &[5], &Aggregate::ALL, &[2]).hash;
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_index_of() {
        let s = schema(&["a", "m", "z"]);
        assert_eq!(s.index_of("m"), Some(1));
        assert_eq!(s.index_of("q"), None);
    }
}
