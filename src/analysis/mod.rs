//! Analysis modules.
//!
//! Classification decides whether a journal counts and under which license;
//! aggregation folds counted journals into the report tables.

pub mod aggregator;
pub mod classifier;
pub mod languages;

pub use aggregator::*;
pub use classifier::classify;
