use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::errors::AppResult;
use crate::services::aggregator::{Aggregator, SentimentSource};
use crate::services::correlator::{Correlator, SubstringCorrelator};
use crate::services::feedback_index::FeedbackIndex;
use crate::services::record_source::{scan_all, ConversationStore, FeedbackStore, ScanFilter};
use crate::services::report::AnalyticsReport;
use crate::utils::timeframe::resolve;

/// Recomputes the session-log report from both stores on every call.
pub struct AnalyticsService {
    conversations: Arc<ConversationStore>,
    feedback: Arc<FeedbackStore>,
    correlator: Arc<dyn Correlator>,
    source: SentimentSource,
}

impl AnalyticsService {
    pub fn new(conversations: Arc<ConversationStore>, feedback: Arc<FeedbackStore>, source: SentimentSource) -> Self {
        Self {
            conversations,
            feedback,
            correlator: Arc::new(SubstringCorrelator),
            source,
        }
    }

    pub fn with_correlator(mut self, correlator: Arc<dyn Correlator>) -> Self {
        self.correlator = correlator;
        self
    }

    pub fn sentiment_source(&self) -> SentimentSource {
        self.source
    }

    pub async fn get_report(&self, timeframe: Option<&str>) -> AppResult<AnalyticsReport> {
        self.get_report_at(timeframe, Utc::now()).await
    }

    pub async fn get_report_at(&self, timeframe: Option<&str>, now: DateTime<Utc>) -> AppResult<AnalyticsReport> {
        let window = resolve(timeframe, now)?;
        tracing::info!("Timeframe: {}, window {} / {}", window.label(), window.start, window.end);

        let records = scan_all(self.conversations.as_ref(), &ScanFilter::OriginalTsWithin(window.clone())).await?;

        let index = if self.source.uses_feedback() {
            let feedback = scan_all(self.feedback.as_ref(), &ScanFilter::All).await?;
            let total = feedback.len();
            let index = FeedbackIndex::build(feedback);
            if index.is_empty() {
                tracing::warn!("No usable feedback found ({} items scanned)", total);
            } else {
                tracing::info!("Feedback map size: {} (from {} items)", index.len(), total);
            }
            index
        } else {
            FeedbackIndex::default()
        };

        let rollup = Aggregator::new(self.source, self.correlator.as_ref(), &index).aggregate(&records);

        tracing::info!(
            records = rollup.records_seen,
            sessions = rollup.sessions.len(),
            locations = rollup.locations.len(),
            categories = rollup.category_counts.len(),
            sampled = rollup.samples.len(),
            "Rollup complete"
        );
        tracing::info!("Sentiment counts: {:?}", rollup.sentiment_counts);

        Ok(AnalyticsReport::assemble(&window, rollup))
    }
}
