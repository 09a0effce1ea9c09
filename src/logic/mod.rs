//! Logic Module - Detector engine
//!
//! - `features/` - Sample codec, schema lock, feature layout
//! - `window/` - Sliding buffer, rolling and lag features
//! - `model/` - Scoring backends (z-score, isolation forest)
//! - `detector/` - Tick/tock streaming detector
//! - `registry` - id -> detector map

pub mod config;
pub mod error;

pub mod features;
pub mod window;
pub mod model;

pub mod detector;
pub mod registry;
