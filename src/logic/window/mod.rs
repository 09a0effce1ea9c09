//! Window Module - Sliding buffer and incremental rolling/lag features

pub mod buffer;
pub mod rolling;

pub use buffer::{SlidingWindow, StoredSample};
pub use rolling::{Aggregate, RollingWindow};
