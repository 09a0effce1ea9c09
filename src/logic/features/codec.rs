//! Sample Codec - Raw observation -> fixed-order numeric row
//!
//! Schema bị khóa ở sample đầu tiên. Mọi sample sau phải khớp schema.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::layout::{FeatureSchema, FieldKind, FieldSpec};
use crate::logic::error::{DetectorError, DetectorResult};

// ============================================================================
// SAMPLE
// ============================================================================

/// A single observed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Null,
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        SampleValue::Number(v)
    }
}

impl From<i64> for SampleValue {
    fn from(v: i64) -> Self {
        SampleValue::Number(v as f64)
    }
}

impl From<bool> for SampleValue {
    fn from(v: bool) -> Self {
        SampleValue::Bool(v)
    }
}

impl From<&str> for SampleValue {
    fn from(v: &str) -> Self {
        SampleValue::Text(v.to_string())
    }
}

impl From<String> for SampleValue {
    fn from(v: String) -> Self {
        SampleValue::Text(v)
    }
}

/// Observation: feature name -> value, iterated in lexicographic key order
pub type Sample = BTreeMap<String, SampleValue>;

/// Build a sample from `(name, value)` pairs
pub fn sample<K, V, I>(pairs: I) -> Sample
where
    K: Into<String>,
    V: Into<SampleValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

// ============================================================================
// MISSING FIELD POLICY
// ============================================================================

/// Handling of schema fields absent from a sample (or sent as null)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    /// Reject the sample with `SchemaMismatch`
    #[default]
    Reject,
    /// Substitute a sentinel value
    Fill { value: f64 },
}

// ============================================================================
// CODEC
// ============================================================================

#[derive(Debug, Clone)]
pub struct SampleCodec {
    policy: MissingFieldPolicy,
    schema: Option<FeatureSchema>,
    /// Per-field category index (empty for numeric fields)
    categories: Vec<HashMap<String, f64>>,
}

impl SampleCodec {
    pub fn new(policy: MissingFieldPolicy) -> Self {
        Self {
            policy,
            schema: None,
            categories: Vec::new(),
        }
    }

    pub fn schema(&self) -> Option<&FeatureSchema> {
        self.schema.as_ref()
    }

    /// Number of distinct categories seen for a field
    pub fn category_count(&self, field: &str) -> usize {
        self.schema
            .as_ref()
            .and_then(|s| s.index_of(field))
            .map(|i| self.categories[i].len())
            .unwrap_or(0)
    }

    /// Encode a sample into a raw row ordered like the schema.
    ///
    /// Locks the schema on first use. A rejected sample leaves the codec untouched.
    pub fn encode(&mut self, sample: &Sample) -> DetectorResult<Vec<f64>> {
        if sample.is_empty() {
            return Err(DetectorError::EmptySample);
        }

        let (row, new_categories) = match &self.schema {
            Some(schema) => encode_row(schema, &self.categories, self.policy, sample)?,
            None => {
                let schema = derive_schema(sample)?;
                let encoded = encode_row(&schema, &[], self.policy, sample)?;
                log::debug!(
                    "Schema locked: [{}]",
                    schema.field_names().collect::<Vec<_>>().join(", ")
                );
                self.categories = vec![HashMap::new(); schema.len()];
                self.schema = Some(schema);
                encoded
            }
        };

        for (i, text, idx) in new_categories {
            self.categories[i].insert(text, idx);
        }

        Ok(row)
    }
}

/// Category assignments discovered while encoding, committed only on success
type NewCategories = Vec<(usize, String, f64)>;

fn encode_row(
    schema: &FeatureSchema,
    categories: &[HashMap<String, f64>],
    policy: MissingFieldPolicy,
    sample: &Sample,
) -> DetectorResult<(Vec<f64>, NewCategories)> {
    let missing: Vec<String> = schema
        .field_names()
        .filter(|name| matches!(sample.get(*name), None | Some(SampleValue::Null)))
        .map(str::to_string)
        .collect();

    let fill = match policy {
        MissingFieldPolicy::Fill { value } => value,
        MissingFieldPolicy::Reject if !missing.is_empty() => {
            return Err(DetectorError::SchemaMismatch { missing });
        }
        // nothing is missing
        MissingFieldPolicy::Reject => 0.0,
    };

    let unknown: Vec<String> = sample
        .keys()
        .filter(|k| !schema.contains(k))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(DetectorError::UnknownField { fields: unknown });
    }

    let mut row = Vec::with_capacity(schema.len());
    let mut new_categories = NewCategories::new();

    for (i, field) in schema.fields().iter().enumerate() {
        let value = match (field.kind, sample.get(&field.name)) {
            (_, None) | (_, Some(SampleValue::Null)) => fill,
            (FieldKind::Numeric, Some(SampleValue::Number(v))) => {
                if !v.is_finite() {
                    return Err(DetectorError::NonFiniteValue { field: field.name.clone() });
                }
                *v
            }
            (FieldKind::Numeric, Some(SampleValue::Bool(b))) => {
                if *b { 1.0 } else { 0.0 }
            }
            (FieldKind::Numeric, Some(SampleValue::Text(_))) => {
                return Err(DetectorError::FieldTypeMismatch {
                    field: field.name.clone(),
                    expected: "number",
                });
            }
            (FieldKind::Categorical, Some(SampleValue::Text(s))) => {
                let table = categories.get(i);
                match table.and_then(|t| t.get(s)) {
                    Some(&idx) => idx,
                    None => {
                        let idx = table.map(|t| t.len()).unwrap_or(0) as f64;
                        new_categories.push((i, s.clone(), idx));
                        idx
                    }
                }
            }
            (FieldKind::Categorical, Some(_)) => {
                return Err(DetectorError::FieldTypeMismatch {
                    field: field.name.clone(),
                    expected: "text",
                });
            }
        };
        row.push(value);
    }

    Ok((row, new_categories))
}

fn derive_schema(sample: &Sample) -> DetectorResult<FeatureSchema> {
    let mut fields = Vec::with_capacity(sample.len());
    for (name, value) in sample {
        let kind = match value {
            SampleValue::Number(_) | SampleValue::Bool(_) => FieldKind::Numeric,
            SampleValue::Text(_) => FieldKind::Categorical,
            SampleValue::Null => {
                return Err(DetectorError::FieldTypeMismatch {
                    field: name.clone(),
                    expected: "a non-null value to lock the schema",
                });
            }
        };
        fields.push(FieldSpec { name: name.clone(), kind });
    }
    Ok(FeatureSchema::new(fields))
}

// ============================================================================
// TESTS
// ============================================================================
