use async_trait::async_trait;

use crate::db::models::{ConversationRecord, FeedbackRecord};
use crate::errors::AppResult;
use crate::utils::timeframe::TimeWindow;

/// Server-side filter applied to every examined page.
#[derive(Debug, Clone)]
pub enum ScanFilter {
    All,
    /// `original_ts` within `[start, end]`, both bounds inclusive.
    OriginalTsWithin(TimeWindow),
}

impl ScanFilter {
    pub fn matches_conversation(&self, record: &ConversationRecord) -> bool {
        match self {
            ScanFilter::All => true,
            ScanFilter::OriginalTsWithin(window) => window.contains(&record.original_ts),
        }
    }
}

/// Records a [`ScanFilter`] can be evaluated against.
pub trait Filterable {
    fn passes(&self, filter: &ScanFilter) -> bool;
}

impl Filterable for ConversationRecord {
    fn passes(&self, filter: &ScanFilter) -> bool {
        filter.matches_conversation(self)
    }
}

// Feedback scans are never filtered.
impl Filterable for FeedbackRecord {
    fn passes(&self, _filter: &ScanFilter) -> bool {
        true
    }
}

/// One page of a scan. `next` is the opaque token for the following page;
/// `None` means the scan is exhausted.
#[derive(Debug)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub next: Option<String>,
}

/// A key/value store that can be scanned a page at a time.
#[async_trait]
pub trait PagedStore: Send + Sync {
    type Record: Send;

    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn fetch_page(&self, filter: &ScanFilter, token: Option<String>) -> AppResult<Page<Self::Record>>;
}

pub type ConversationStore = dyn PagedStore<Record = ConversationRecord>;
pub type FeedbackStore = dyn PagedStore<Record = FeedbackRecord>;

/// Follow continuation tokens until the store reports no more pages and
/// return every matching record. A failed page fails the whole scan.
pub async fn scan_all<S>(store: &S, filter: &ScanFilter) -> AppResult<Vec<S::Record>>
where
    S: PagedStore + ?Sized,
{
    let mut records = Vec::new();
    let mut token = None;
    let mut pages = 0usize;

    loop {
        let page = store.fetch_page(filter, token).await?;
        pages += 1;
        tracing::debug!("{} page {} items: {}", store.name(), pages, page.records.len());
        records.extend(page.records);

        match page.next {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    tracing::info!("{} scan complete: {} items over {} pages", store.name(), records.len(), pages);
    Ok(records)
}
