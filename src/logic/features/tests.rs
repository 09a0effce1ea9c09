//! Tests for codec + layout + window working together

use super::*;
use crate::logic::window::{Aggregate, SlidingWindow};

#[test]
fn test_encoded_rows_match_layout_width() {
    let mut codec = SampleCodec::new(MissingFieldPolicy::Reject);
    let windows = [3];
    let aggs = Aggregate::ALL;
    let lags = [1, 2];
    let mut buffer = SlidingWindow::new(10, &windows, &aggs, &lags);

    let s = sample([("cpu", SampleValue::from(0.4)), ("host", SampleValue::from("a"))]);
    let row = codec.encode(&s).unwrap();
    buffer.append(row);

    let layout = FeatureLayout::build(codec.schema().unwrap(), &windows, &aggs, &lags);
    let features = &buffer.latest().unwrap().features;

    // 2 raw + 1 window * 4 aggs * 2 fields + 2 lags * 2 fields
    assert_eq!(layout.feature_count(), 2 + 8 + 4);
    assert_eq!(features.len(), layout.feature_count());
    assert_eq!(layout.feature_index("host__roll3_max"), Some(2 + 3 * 2 + 1));
    assert_eq!(layout.feature_index("cpu__lag2"), Some(12));
}

#[test]
fn test_schema_lock_is_idempotent() {
    let mut codec = SampleCodec::new(MissingFieldPolicy::Reject);
    codec.encode(&sample([("a", 1.0), ("b", 2.0)])).unwrap();
    let locked = codec.schema().cloned().unwrap();

    for i in 0..10 {
        codec.encode(&sample([("b", i as f64), ("a", 0.0)])).unwrap();
    }
    let _ = codec.encode(&sample([("a", 1.0)]));
    let _ = codec.encode(&sample([("a", 1.0), ("b", 1.0), ("c", 1.0)]));

    assert_eq!(codec.schema(), Some(&locked));
}

#[test]
fn test_layout_hash_follows_schema() {
    let mut first = SampleCodec::new(MissingFieldPolicy::Reject);
    first.encode(&sample([("a", 1.0)])).unwrap();
    let before = FeatureLayout::build(first.schema().unwrap(), &[5], &Aggregate::ALL, &[1]).hash;

    let mut second = SampleCodec::new(MissingFieldPolicy::Reject);
    second.encode(&sample([("a", 1.0), ("z", 2.0)])).unwrap();
    let after = FeatureLayout::build(second.schema().unwrap(), &[5], &Aggregate::ALL, &[1]).hash;
    assert_ne!(before, after);
}
