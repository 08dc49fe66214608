use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// One logged question/answer exchange, as written by the classifier path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ConversationRecord {
    pub session_id: String,
    #[serde(default)]
    pub sort_ts: String,
    pub original_ts: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub query: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub response: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sentiment: Option<String>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub satisfaction_score: Option<f64>,
}

/// A thumbs-up/down event. `message_id` has no guaranteed relation to any
/// conversation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FeedbackRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub message_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub feedback: Option<String>,
}

// Non-string values decode as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

// Scores arrive as numbers or, from some writers, as numeric strings.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    })
}
