//! Features Module - Sample encoding and feature layout

pub mod codec;
pub mod layout;

#[cfg(test)]
mod tests;

pub use codec::{sample, MissingFieldPolicy, Sample, SampleCodec, SampleValue};
pub use layout::{FeatureLayout, FeatureSchema, FieldKind, FieldSpec};
