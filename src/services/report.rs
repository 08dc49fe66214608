use serde::Serialize;
use std::collections::BTreeMap;

use crate::services::aggregator::{latest_first, ConversationSample, Rollup, SAMPLE_LIMIT};
use crate::utils::timeframe::TimeWindow;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub timeframe: String,
    pub start_date: String,
    pub end_date: String,
    pub user_count: usize,
    pub locations: Vec<String>,
    pub categories: BTreeMap<String, u64>,
    pub sentiment: BTreeMap<String, u64>,
    pub avg_satisfaction: f64,
    pub conversations: Vec<ConversationSample>,
}

impl AnalyticsReport {
    pub fn assemble(window: &TimeWindow, rollup: Rollup) -> Self {
        let avg_satisfaction = round_one_decimal(rollup.average_satisfaction());
        let Rollup {
            sessions,
            locations,
            category_counts,
            sentiment_counts,
            samples,
            ..
        } = rollup;

        Self {
            timeframe: window.label().to_string(),
            start_date: window.start_date(),
            end_date: window.end_date(),
            user_count: sessions.len(),
            locations,
            categories: category_counts,
            sentiment: sentiment_counts,
            avg_satisfaction,
            conversations: latest_first(samples, SAMPLE_LIMIT),
        }
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}
