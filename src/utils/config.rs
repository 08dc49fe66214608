use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use url::Url;

use crate::errors::{AppError, AppResult};
use crate::services::aggregator::SentimentSource;
use crate::services::analytics::AnalyticsService;

#[derive(Clone)]
pub struct AppState {
    pub analytics: Arc<AnalyticsService>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Elasticsearch,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub elasticsearch_url: Url,
    pub conversation_table: String,
    pub feedback_table: String,
    pub sentiment_source: SentimentSource,
    pub page_size: usize,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Self::from_vars(env::vars().collect())
    }

    fn from_vars(vars: HashMap<String, String>) -> AppResult<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let backend = match get("STORE_BACKEND").map(str::to_lowercase).as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("elasticsearch") => StoreBackend::Elasticsearch,
            Some(other) => return Err(AppError::Config(format!("unknown STORE_BACKEND \"{}\"", other))),
        };

        let database_url = get("DATABASE_URL").map(String::from);
        if backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::Config("DATABASE_URL must be set for the postgres backend".to_string()));
        }

        let elasticsearch_url = Url::parse(get("ELASTICSEARCH_URL").unwrap_or("http://localhost:9200"))
            .map_err(|e| AppError::Config(format!("ELASTICSEARCH_URL: {}", e)))?;

        let conversation_table = identifier(get("CONVERSATION_TABLE").unwrap_or("conversation_logs"))?;
        let feedback_table = identifier(get("FEEDBACK_TABLE").unwrap_or("response_feedback"))?;

        let sentiment_source = match get("SENTIMENT_SOURCE") {
            Some(raw) => raw.parse()?,
            None => SentimentSource::default(),
        };

        let page_size = match get("SCAN_PAGE_SIZE") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| AppError::Config(format!("SCAN_PAGE_SIZE must be a positive integer, got \"{}\"", raw)))?,
            None => 500,
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("PORT must be a port number, got \"{}\"", raw)))?,
            None => 8000,
        };

        Ok(Self {
            backend,
            database_url,
            elasticsearch_url,
            conversation_table,
            feedback_table,
            sentiment_source,
            page_size,
            port,
        })
    }
}

// Table and index names are interpolated into queries.
fn identifier(name: &str) -> AppResult<String> {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name.to_string())
    } else {
        Err(AppError::Config(format!("\"{}\" is not a valid table name", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_for_postgres() {
        let config = Config::from_vars(vars(&[("DATABASE_URL", "postgres://localhost/logs")])).unwrap();
        assert_eq!(config.backend, StoreBackend::Postgres);
        assert_eq!(config.conversation_table, "conversation_logs");
        assert_eq!(config.feedback_table, "response_feedback");
        assert_eq!(config.sentiment_source, SentimentSource::UserFeedbackOnly);
        assert_eq!(config.page_size, 500);
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn postgres_requires_database_url() {
        assert!(matches!(Config::from_vars(vars(&[])), Err(AppError::Config(_))));
    }

    #[test]
    fn elasticsearch_with_overrides() {
        let config = Config::from_vars(vars(&[
            ("STORE_BACKEND", "Elasticsearch"),
            ("ELASTICSEARCH_URL", "http://search:9200"),
            ("SENTIMENT_SOURCE", "classifier"),
            ("SCAN_PAGE_SIZE", "25"),
            ("FEEDBACK_TABLE", "ncmw_feedback"),
        ]))
        .unwrap();
        assert_eq!(config.backend, StoreBackend::Elasticsearch);
        assert_eq!(config.elasticsearch_url.host_str(), Some("search"));
        assert_eq!(config.sentiment_source, SentimentSource::ClassifierSentiment);
        assert_eq!(config.page_size, 25);
        assert_eq!(config.feedback_table, "ncmw_feedback");
    }

    #[test]
    fn rejects_bad_values() {
        let base = [("DATABASE_URL", "postgres://x")];
        for (key, value) in [
            ("SCAN_PAGE_SIZE", "0"),
            ("PORT", "http"),
            ("CONVERSATION_TABLE", "logs; DROP TABLE x"),
            ("STORE_BACKEND", "dynamo"),
            ("SENTIMENT_SOURCE", "mood"),
        ] {
            let mut pairs = base.to_vec();
            pairs.push((key, value));
            assert!(
                matches!(Config::from_vars(vars(&pairs)), Err(AppError::Config(_))),
                "{} = {} should be rejected",
                key,
                value
            );
        }
    }
}
