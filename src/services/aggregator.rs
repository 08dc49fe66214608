use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

use crate::db::models::ConversationRecord;
use crate::errors::AppError;
use crate::services::correlator::Correlator;
use crate::services::feedback_index::{FeedbackIndex, Polarity};

/// Maximum number of annotated conversations returned in a report.
pub const SAMPLE_LIMIT: usize = 50;

const DEFAULT_SAMPLE_SCORE: f64 = 50.0;
const UNKNOWN_CATEGORY: &str = "Unknown";
const NEUTRAL: &str = "neutral";

/// Which signal drives the sentiment counts and the sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SentimentSource {
    /// Only conversations correlated to a user feedback event are sampled,
    /// labelled with that event's polarity.
    #[default]
    UserFeedbackOnly,
    /// Every conversation is sampled, labelled with the classifier's
    /// sentiment (`neutral` when missing).
    ClassifierSentiment,
}

impl SentimentSource {
    /// Spelling used by `SENTIMENT_SOURCE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentSource::UserFeedbackOnly => "user_feedback",
            SentimentSource::ClassifierSentiment => "classifier",
        }
    }

    /// Label keys reported even when their count is zero.
    pub fn seeded_labels(&self) -> &'static [&'static str] {
        match self {
            SentimentSource::UserFeedbackOnly => &["positive", "negative"],
            SentimentSource::ClassifierSentiment => &["positive", "neutral", "negative"],
        }
    }

    pub fn uses_feedback(&self) -> bool {
        matches!(self, SentimentSource::UserFeedbackOnly)
    }
}

impl FromStr for SentimentSource {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user_feedback" | "feedback" => Ok(SentimentSource::UserFeedbackOnly),
            "classifier" | "classifier_sentiment" => Ok(SentimentSource::ClassifierSentiment),
            other => Err(AppError::Config(format!("unknown sentiment source \"{}\"", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSample {
    pub session_id: String,
    pub timestamp: String,
    pub query: String,
    pub response: String,
    pub category: String,
    pub sentiment: String,
    pub satisfaction_score: f64,
}

/// Everything accumulated in one pass over the window's conversations.
#[derive(Debug, Default)]
pub struct Rollup {
    pub records_seen: usize,
    pub sessions: HashSet<String>,
    /// Distinct locations in first-seen order.
    pub locations: Vec<String>,
    pub location_counts: HashMap<String, u64>,
    pub category_counts: BTreeMap<String, u64>,
    pub sentiment_counts: BTreeMap<String, u64>,
    pub satisfaction_scores: Vec<f64>,
    pub samples: Vec<ConversationSample>,
}

impl Rollup {
    /// Mean of collected scores, 0 when none were collected.
    pub fn average_satisfaction(&self) -> f64 {
        if self.satisfaction_scores.is_empty() {
            return 0.0;
        }
        self.satisfaction_scores.iter().sum::<f64>() / self.satisfaction_scores.len() as f64
    }
}

/// Newest first by timestamp string, then capped. The sort is stable, so ties
/// keep scan order.
pub fn latest_first(mut samples: Vec<ConversationSample>, limit: usize) -> Vec<ConversationSample> {
    samples.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    samples.truncate(limit);
    samples
}

pub struct Aggregator<'a> {
    source: SentimentSource,
    correlator: &'a dyn Correlator,
    index: &'a FeedbackIndex,
}

impl<'a> Aggregator<'a> {
    pub fn new(source: SentimentSource, correlator: &'a dyn Correlator, index: &'a FeedbackIndex) -> Self {
        Self {
            source,
            correlator,
            index,
        }
    }

    pub fn aggregate(&self, records: &[ConversationRecord]) -> Rollup {
        let mut rollup = Rollup::default();
        for label in self.source.seeded_labels() {
            rollup.sentiment_counts.insert(label.to_string(), 0);
        }

        for record in records {
            rollup.records_seen += 1;
            if !record.session_id.is_empty() {
                rollup.sessions.insert(record.session_id.clone());
            }

            if let Some(location) = record.location.as_deref().filter(|l| !l.is_empty()) {
                let count = rollup.location_counts.entry(location.to_string()).or_insert(0);
                if *count == 0 {
                    rollup.locations.push(location.to_string());
                }
                *count += 1;
            }

            if let Some(category) = record.category.as_deref().filter(|c| !c.is_empty()) {
                *rollup.category_counts.entry(category.to_string()).or_insert(0) += 1;
            }

            // A score of exactly 0 is treated as missing.
            if let Some(score) = record.satisfaction_score.filter(|s| *s != 0.0) {
                rollup.satisfaction_scores.push(score);
            }

            let sentiment = match self.source {
                SentimentSource::UserFeedbackOnly => {
                    match self.correlator.correlate(record, self.index) {
                        Some(entry) => entry.polarity.as_str(),
                        None => continue,
                    }
                }
                SentimentSource::ClassifierSentiment => classifier_label(record.sentiment.as_deref()),
            };

            *rollup.sentiment_counts.entry(sentiment.to_string()).or_insert(0) += 1;
            rollup.samples.push(sample_of(record, sentiment));
        }

        rollup
    }
}

fn classifier_label(raw: Option<&str>) -> &'static str {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("positive") => Polarity::Positive.as_str(),
        Some("negative") => Polarity::Negative.as_str(),
        _ => NEUTRAL,
    }
}

fn sample_of(record: &ConversationRecord, sentiment: &str) -> ConversationSample {
    ConversationSample {
        session_id: record.session_id.clone(),
        timestamp: record.original_ts.clone(),
        query: record.query.clone().unwrap_or_default(),
        response: record.response.clone().unwrap_or_default(),
        category: record.category.clone().unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
        sentiment: sentiment.to_string(),
        satisfaction_score: record.satisfaction_score.unwrap_or(DEFAULT_SAMPLE_SCORE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::FeedbackRecord;
    use crate::services::correlator::SubstringCorrelator;

    fn conv(session: &str, ts: &str) -> ConversationRecord {
        ConversationRecord {
            session_id: session.to_string(),
            sort_ts: format!("{}#abcd", ts),
            original_ts: ts.to_string(),
            query: Some(format!("q from {}", session)),
            response: Some("a".to_string()),
            location: None,
            category: None,
            sentiment: None,
            satisfaction_score: None,
        }
    }

    fn index(pairs: &[(&str, &str)]) -> FeedbackIndex {
        FeedbackIndex::build(pairs.iter().map(|(id, label)| FeedbackRecord {
            message_id: Some(id.to_string()),
            feedback: Some(label.to_string()),
        }))
    }

    #[test]
    fn counts_locations_categories_and_sessions() {
        let mut a = conv("s1", "2025-03-13T08:00:00");
        a.location = Some("Denver".into());
        a.category = Some("Training & Courses".into());
        let mut b = conv("s1", "2025-03-13T09:00:00");
        b.location = Some(String::new());
        b.category = Some("Unknown".into());
        let mut c = conv("s2", "2025-03-13T10:00:00");
        c.location = Some("Austin".into());
        let mut d = conv("s3", "2025-03-13T11:00:00");
        d.location = Some("Denver".into());
        d.category = Some("Training & Courses".into());

        let idx = FeedbackIndex::default();
        let records = vec![a, b, c, d];
        let rollup = Aggregator::new(SentimentSource::UserFeedbackOnly, &SubstringCorrelator, &idx).aggregate(&records);

        assert_eq!(rollup.sessions.len(), 3);
        assert_eq!(rollup.locations, vec!["Denver", "Austin"]);
        assert_eq!(rollup.location_counts["Denver"], 2);
        assert_eq!(rollup.category_counts["Training & Courses"], 2);
        assert_eq!(rollup.category_counts["Unknown"], 1);
        let categorized: u64 = rollup.category_counts.values().sum();
        assert!(categorized as usize <= records.len());
        assert!(rollup.samples.is_empty());
        assert_eq!(rollup.sentiment_counts.get("positive"), Some(&0));
        assert_eq!(rollup.sentiment_counts.get("negative"), Some(&0));
    }

    #[test]
    fn empty_session_ids_are_not_counted() {
        let mut blank = conv("", "2025-03-13T08:00:00");
        blank.category = Some("Technical Support".into());
        let records = vec![blank, conv("s1", "2025-03-13T09:00:00")];

        let idx = FeedbackIndex::default();
        let rollup = Aggregator::new(SentimentSource::UserFeedbackOnly, &SubstringCorrelator, &idx).aggregate(&records);
        assert_eq!(rollup.sessions.len(), 1);
        assert!(rollup.sessions.contains("s1"));
        assert_eq!(rollup.records_seen, 2);
        assert_eq!(rollup.category_counts["Technical Support"], 1);
    }

    #[test]
    fn zero_scores_are_ignored_in_average() {
        let mut a = conv("s1", "2025-03-13T08:00:00");
        a.satisfaction_score = Some(0.0);
        let mut b = conv("s2", "2025-03-13T09:00:00");
        b.satisfaction_score = Some(80.0);
        let mut c = conv("s3", "2025-03-13T10:00:00");
        c.satisfaction_score = Some(90.0);

        let idx = FeedbackIndex::default();
        let rollup = Aggregator::new(SentimentSource::UserFeedbackOnly, &SubstringCorrelator, &idx).aggregate(&[a, b, c]);
        assert_eq!(rollup.satisfaction_scores, vec![80.0, 90.0]);
        assert_eq!(rollup.average_satisfaction(), 85.0);
        assert_eq!(Rollup::default().average_satisfaction(), 0.0);
    }

    #[test]
    fn feedback_only_samples_correlated_records() {
        let mut hit = conv("s1", "2025-03-13T08:00:00");
        hit.satisfaction_score = Some(0.0);
        let plain = conv("s2", "2025-03-13T09:00:00");
        let idx = index(&[("s1-msg", "negative")]);

        let rollup = Aggregator::new(SentimentSource::UserFeedbackOnly, &SubstringCorrelator, &idx).aggregate(&[hit, plain]);
        assert_eq!(rollup.sessions.len(), 2);
        assert_eq!(rollup.sentiment_counts["negative"], 1);
        assert_eq!(rollup.sentiment_counts["positive"], 0);
        assert_eq!(rollup.samples.len(), 1);
        let sample = &rollup.samples[0];
        assert_eq!(sample.sentiment, "negative");
        assert_eq!(sample.category, "Unknown");
        assert_eq!(sample.satisfaction_score, 0.0);
    }

    #[test]
    fn classifier_source_samples_everything() {
        let mut a = conv("s1", "2025-03-13T08:00:00");
        a.sentiment = Some("Positive".into());
        let b = conv("s2", "2025-03-13T09:00:00");
        let mut c = conv("s3", "2025-03-13T10:00:00");
        c.sentiment = Some("ecstatic".into());
        let idx = index(&[("s1-msg", "negative")]);

        let rollup = Aggregator::new(SentimentSource::ClassifierSentiment, &SubstringCorrelator, &idx).aggregate(&[a, b, c]);
        assert_eq!(rollup.samples.len(), 3);
        assert_eq!(rollup.sentiment_counts["positive"], 1);
        assert_eq!(rollup.sentiment_counts["neutral"], 2);
        assert_eq!(rollup.sentiment_counts["negative"], 0);
        assert_eq!(rollup.samples[1].satisfaction_score, 50.0);
    }

    #[test]
    fn sample_sorts_before_truncating() {
        let ids: Vec<String> = (0..51).map(|i| format!("fb-s-{:02}", i)).collect();
        let idx = index(&ids.iter().map(|id| (id.as_str(), "positive")).collect::<Vec<_>>());
        // Oldest first, so cutting before sorting would keep the wrong fifty.
        let records: Vec<_> = (0..51)
            .map(|i| conv(&format!("s-{:02}", i), &format!("2025-03-13T10:{:02}:00", i)))
            .collect();

        let rollup = Aggregator::new(SentimentSource::UserFeedbackOnly, &SubstringCorrelator, &idx).aggregate(&records);
        assert_eq!(rollup.samples.len(), 51);
        let sample = latest_first(rollup.samples, SAMPLE_LIMIT);

        assert_eq!(sample.len(), 50);
        assert_eq!(sample[0].timestamp, "2025-03-13T10:50:00");
        assert_eq!(sample[49].timestamp, "2025-03-13T10:01:00");
        assert!(sample.iter().all(|s| s.timestamp != "2025-03-13T10:00:00"));
    }

    #[test]
    fn source_parses_from_config_values() {
        assert_eq!("classifier".parse::<SentimentSource>().unwrap(), SentimentSource::ClassifierSentiment);
        assert_eq!("USER_FEEDBACK".parse::<SentimentSource>().unwrap(), SentimentSource::UserFeedbackOnly);
        assert!("vibes".parse::<SentimentSource>().is_err());
        for source in [SentimentSource::UserFeedbackOnly, SentimentSource::ClassifierSentiment] {
            assert_eq!(source.as_str().parse::<SentimentSource>().unwrap(), source);
        }
    }
}
