//! Aggregation and comparison of participant statistics.
//!
//! This module provides the coordinator's merge and finalize steps, plus
//! metrics for comparing a federated result against a centralized one.

pub mod aggregator;
pub mod metrics;

pub use aggregator::{aggregate_counts, aggregate_ranked, extract_heavy_hitters, rank};
pub use metrics::{f1_score, precision, recall, threshold_leakage, LeakagePoint};
