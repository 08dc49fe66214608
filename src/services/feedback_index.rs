use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::db::models::FeedbackRecord;

/// User thumbs-up/down label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Positive => "positive",
            Polarity::Negative => "negative",
        }
    }
}

impl FromStr for Polarity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Polarity::Positive),
            "negative" => Ok(Polarity::Negative),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEntry {
    pub message_id: String,
    pub polarity: Polarity,
}

/// `message_id -> polarity`, iterated in first-insertion order. A repeated
/// `message_id` overwrites the polarity but keeps its original position.
#[derive(Debug, Default)]
pub struct FeedbackIndex {
    entries: Vec<FeedbackEntry>,
    positions: HashMap<String, usize>,
}

impl FeedbackIndex {
    pub fn build<I>(records: I) -> Self
    where
        I: IntoIterator<Item = FeedbackRecord>,
    {
        let mut index = FeedbackIndex::default();
        let mut dropped = 0usize;

        for record in records {
            let entry = match (record.message_id, record.feedback) {
                (Some(message_id), Some(label)) if !message_id.is_empty() => {
                    match label.parse::<Polarity>() {
                        Ok(polarity) => FeedbackEntry { message_id, polarity },
                        Err(()) => {
                            dropped += 1;
                            continue;
                        }
                    }
                }
                _ => {
                    dropped += 1;
                    continue;
                }
            };
            index.insert(entry);
        }

        if dropped > 0 {
            tracing::debug!("Dropped {} incomplete feedback records", dropped);
        }
        index
    }

    fn insert(&mut self, entry: FeedbackEntry) {
        match self.positions.get(&entry.message_id) {
            Some(&pos) => self.entries[pos].polarity = entry.polarity,
            None => {
                self.positions.insert(entry.message_id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    #[cfg(test)]
    pub fn get(&self, message_id: &str) -> Option<Polarity> {
        self.positions.get(message_id).map(|&pos| self.entries[pos].polarity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedbackEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fb(id: Option<&str>, label: Option<&str>) -> FeedbackRecord {
        FeedbackRecord {
            message_id: id.map(String::from),
            feedback: label.map(String::from),
        }
    }

    #[test]
    fn drops_incomplete_and_unknown_labels() {
        let index = FeedbackIndex::build(vec![
            fb(Some("m1"), Some("positive")),
            fb(None, Some("negative")),
            fb(Some("m2"), None),
            fb(Some("m3"), Some("meh")),
            fb(Some(""), Some("positive")),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("m1"), Some(Polarity::Positive));
        assert_eq!(index.get("m3"), None);
    }

    #[test]
    fn last_write_wins_in_first_position() {
        let index = FeedbackIndex::build(vec![
            fb(Some("a"), Some("positive")),
            fb(Some("b"), Some("positive")),
            fb(Some("a"), Some("negative")),
        ]);

        let order: Vec<_> = index.iter().map(|e| (e.message_id.as_str(), e.polarity)).collect();
        assert_eq!(order, vec![("a", Polarity::Negative), ("b", Polarity::Positive)]);
    }
}
