use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::db::models::{ConversationRecord, FeedbackRecord};
use crate::errors::AppResult;
use crate::services::record_source::{Page, PagedStore, ScanFilter};

const CONVERSATION_COLUMNS: &str =
    "session_id, sort_ts, original_ts, query, response, location, category, sentiment, satisfaction_score";

/// Conversation log table, scanned in primary-key order.
pub struct PgConversationStore {
    pool: Arc<PgPool>,
    table: String,
    page_size: i64,
}

impl PgConversationStore {
    pub fn new(pool: Arc<PgPool>, table: String, page_size: usize) -> Self {
        Self {
            pool,
            table,
            page_size: page_size as i64,
        }
    }
}

#[async_trait]
impl PagedStore for PgConversationStore {
    type Record = ConversationRecord;

    fn name(&self) -> &str {
        &self.table
    }

    async fn fetch_page(&self, filter: &ScanFilter, token: Option<String>) -> AppResult<Page<ConversationRecord>> {
        let rows = match token {
            Some(token) => {
                let (session_id, sort_ts): (String, String) = serde_json::from_str(&token)?;
                sqlx::query_as::<_, ConversationRecord>(&format!(
                    "SELECT {} FROM {} WHERE (session_id, sort_ts) > ($1, $2) ORDER BY session_id, sort_ts LIMIT $3",
                    CONVERSATION_COLUMNS, self.table
                ))
                .bind(session_id)
                .bind(sort_ts)
                .bind(self.page_size)
                .fetch_all(self.pool.as_ref())
                .await?
            }
            None => {
                sqlx::query_as::<_, ConversationRecord>(&format!(
                    "SELECT {} FROM {} ORDER BY session_id, sort_ts LIMIT $1",
                    CONVERSATION_COLUMNS, self.table
                ))
                .bind(self.page_size)
                .fetch_all(self.pool.as_ref())
                .await?
            }
        };

        let next = match rows.last() {
            Some(last) if rows.len() as i64 == self.page_size => {
                Some(serde_json::to_string(&(&last.session_id, &last.sort_ts))?)
            }
            _ => None,
        };

        let records = rows
            .into_iter()
            .filter(|record| filter.matches_conversation(record))
            .collect();

        Ok(Page { records, next })
    }
}

/// Feedback table, scanned in `message_id` order.
pub struct PgFeedbackStore {
    pool: Arc<PgPool>,
    table: String,
    page_size: i64,
}

impl PgFeedbackStore {
    pub fn new(pool: Arc<PgPool>, table: String, page_size: usize) -> Self {
        Self {
            pool,
            table,
            page_size: page_size as i64,
        }
    }
}

#[async_trait]
impl PagedStore for PgFeedbackStore {
    type Record = FeedbackRecord;

    fn name(&self) -> &str {
        &self.table
    }

    async fn fetch_page(&self, _filter: &ScanFilter, token: Option<String>) -> AppResult<Page<FeedbackRecord>> {
        let rows = match token {
            Some(after) => {
                sqlx::query_as::<_, FeedbackRecord>(&format!(
                    "SELECT message_id, feedback FROM {} WHERE message_id > $1 ORDER BY message_id LIMIT $2",
                    self.table
                ))
                .bind(after)
                .bind(self.page_size)
                .fetch_all(self.pool.as_ref())
                .await?
            }
            None => {
                sqlx::query_as::<_, FeedbackRecord>(&format!(
                    "SELECT message_id, feedback FROM {} ORDER BY message_id LIMIT $1",
                    self.table
                ))
                .bind(self.page_size)
                .fetch_all(self.pool.as_ref())
                .await?
            }
        };

        let next = match rows.last() {
            Some(last) if rows.len() as i64 == self.page_size => last.message_id.clone(),
            _ => None,
        };

        Ok(Page { records: rows, next })
    }
}
