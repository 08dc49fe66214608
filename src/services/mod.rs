pub mod aggregator;
pub mod analytics;
pub mod correlator;
pub mod elasticsearch;
pub mod feedback_index;
pub mod record_source;
pub mod report;
