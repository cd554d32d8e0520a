//! Scoring: relevance ranking and the independent reliability scorer.

pub mod relevance;
pub mod reliability;

pub use relevance::rank;
pub use reliability::{score_all, score_at};
