use async_trait::async_trait;
use elasticsearch::indices::{IndicesCreateParts, IndicesExistsParts};
use elasticsearch::{Elasticsearch, SearchParts};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::db::models::{ConversationRecord, FeedbackRecord};
use crate::errors::{AppError, AppResult};
use crate::services::record_source::{Filterable, Page, PagedStore, ScanFilter};

/// Index-backed store paged with `search_after`. The token is the JSON-encoded
/// sort values of the last hit returned.
pub struct ElasticsearchStore<T> {
    client: Arc<Elasticsearch>,
    index: String,
    sort_fields: &'static [&'static str],
    mapping: Value,
    page_size: usize,
    _record: PhantomData<fn() -> T>,
}

impl<T> ElasticsearchStore<T> {
    fn with_sort(
        client: Arc<Elasticsearch>,
        index: String,
        sort_fields: &'static [&'static str],
        mapping: Value,
        page_size: usize,
    ) -> Self {
        Self {
            client,
            index,
            sort_fields,
            mapping,
            page_size,
            _record: PhantomData,
        }
    }

    /// Create the index with its mapping unless it already exists. Sorting
    /// needs the key fields mapped as `keyword`; dynamic mapping would make
    /// them `text`.
    pub async fn create_index_if_not_exists(&self) -> AppResult<()> {
        tracing::info!("Checking if index '{}' exists", self.index);

        let exists_response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[self.index.as_str()]))
            .send()
            .await?;

        if exists_response.status_code().is_success() {
            tracing::info!("Index '{}' already exists", self.index);
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&self.index))
            .body(self.mapping.clone())
            .send()
            .await?;

        if !response.status_code().is_success() {
            let status = response.status_code();
            let error_text = response.text().await?;
            tracing::error!("Failed to create index '{}': {}", self.index, error_text);
            return Err(AppError::StorageUnavailable(format!(
                "creating index '{}' returned {}",
                self.index, status
            )));
        }

        tracing::info!("✅ Index '{}' created", self.index);
        Ok(())
    }
}

fn conversation_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "session_id": { "type": "keyword" },
                "sort_ts": { "type": "keyword" },
                "original_ts": { "type": "keyword" },
                "query": { "type": "text" },
                "response": { "type": "text" },
                "location": { "type": "keyword" },
                "category": { "type": "keyword" },
                "sentiment": { "type": "keyword" },
                "satisfaction_score": { "type": "double" }
            }
        }
    })
}

fn feedback_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "message_id": { "type": "keyword" },
                "feedback": { "type": "keyword" }
            }
        }
    })
}

impl ElasticsearchStore<ConversationRecord> {
    pub fn conversations(client: Arc<Elasticsearch>, index: String, page_size: usize) -> Self {
        Self::with_sort(client, index, &["session_id", "sort_ts"], conversation_mapping(), page_size)
    }
}

impl ElasticsearchStore<FeedbackRecord> {
    pub fn feedback(client: Arc<Elasticsearch>, index: String, page_size: usize) -> Self {
        Self::with_sort(client, index, &["message_id"], feedback_mapping(), page_size)
    }
}

fn search_body(sort_fields: &[&str], page_size: usize, after: Option<Value>) -> Value {
    let sort: Vec<Value> = sort_fields
        .iter()
        .map(|field| {
            let mut order = Map::new();
            order.insert(field.to_string(), json!("asc"));
            Value::Object(order)
        })
        .collect();
    let mut body = json!({
        "size": page_size,
        "query": { "match_all": {} },
        "sort": sort,
    });
    if let Some(after) = after {
        body["search_after"] = after;
    }
    body
}

/// Split a search response into decoded records and the sort values of the
/// last hit. Undecodable documents are skipped.
fn decode_hits<T: DeserializeOwned>(index: &str, response_body: &Value) -> (Vec<T>, Option<Value>) {
    let empty_vec = vec![];
    let hits = response_body["hits"]["hits"].as_array().unwrap_or(&empty_vec);

    let mut records = Vec::with_capacity(hits.len());
    for hit in hits {
        match serde_json::from_value::<T>(hit["_source"].clone()) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Skipping malformed document {} in '{}': {}", hit["_id"], index, e);
            }
        }
    }

    let last_sort = hits.last().map(|hit| hit["sort"].clone()).filter(|s| s.is_array());
    (records, last_sort)
}

#[async_trait]
impl<T> PagedStore for ElasticsearchStore<T>
where
    T: DeserializeOwned + Filterable + Send,
{
    type Record = T;

    fn name(&self) -> &str {
        &self.index
    }

    async fn fetch_page(&self, filter: &ScanFilter, token: Option<String>) -> AppResult<Page<T>> {
        let after = match token {
            Some(t) => Some(serde_json::from_str::<Value>(&t)?),
            None => None,
        };
        let body = search_body(self.sort_fields, self.page_size, after);

        let response = self
            .client
            .search(SearchParts::Index(&[self.index.as_str()]))
            .body(body)
            .send()
            .await?;

        if !response.status_code().is_success() {
            let status = response.status_code();
            let error_text = response.text().await?;
            tracing::error!("Search on '{}' failed: {}", self.index, error_text);
            return Err(AppError::StorageUnavailable(format!(
                "search on '{}' returned {}",
                self.index, status
            )));
        }

        let response_body: Value = response.json().await?;
        let hit_count = response_body["hits"]["hits"].as_array().map_or(0, Vec::len);
        let (records, last_sort) = decode_hits::<T>(&self.index, &response_body);

        let next = match last_sort {
            Some(sort) if hit_count == self.page_size => Some(serde_json::to_string(&sort)?),
            _ => None,
        };

        let records = records.into_iter().filter(|r| r.passes(filter)).collect();
        Ok(Page { records, next })
    }
}
