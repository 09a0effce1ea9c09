//! Model Module - Scoring backends
//!
//! Tách thuật toán khỏi detector. Dễ swap backend hoặc thêm backend mới.

pub mod backend;
pub mod isolation;
pub mod zscore;

// Re-export common types
pub use backend::{Backend, BackendKind, BackendModel, Score, ScoringBackend, UnknownBackend};
pub use isolation::{IsolationForestBackend, IsolationForestModel};
pub use zscore::{ZScoreBackend, ZScoreModel};
