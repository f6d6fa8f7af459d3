//! Phoenix severity scoring over a derived [`ClinicalRecord`](crate::models::ClinicalRecord).
//!
//! Scoring is pure: it never reads the narrative and never mutates the record.

pub mod domains;
pub mod phoenix;
pub mod types;

pub use phoenix::{phoenix8_score, phoenix_score, score};
pub use types::{DomainScore, SeverityScore};
