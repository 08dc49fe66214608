use crate::db::models::ConversationRecord;
use crate::services::feedback_index::{FeedbackEntry, FeedbackIndex};

/// Associates a conversation with the feedback event that reacts to it.
pub trait Correlator: Send + Sync {
    fn correlate<'a>(&self, record: &ConversationRecord, index: &'a FeedbackIndex) -> Option<&'a FeedbackEntry>;
}

/// Matches when the conversation's session id, or its original timestamp,
/// appears anywhere inside a feedback `message_id`. First match in index order
/// wins. Collisions are possible: session `A` matches a message id built from
/// session `AB`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringCorrelator;

impl Correlator for SubstringCorrelator {
    fn correlate<'a>(&self, record: &ConversationRecord, index: &'a FeedbackIndex) -> Option<&'a FeedbackEntry> {
        // An empty session id would match every message id.
        if record.session_id.is_empty() {
            return None;
        }

        let timestamp = record.original_ts.as_str();
        index.iter().find(|entry| {
            entry.message_id.contains(record.session_id.as_str())
                || (!timestamp.is_empty() && entry.message_id.contains(timestamp))
        })
    }
}
