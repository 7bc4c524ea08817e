use std::fmt;

use chrono::{DateTime, Local, TimeZone};

use crate::ids::{ExchangeId, IdSequence};

/// Bucket key derived from a timestamp, e.g. `January 2024`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonthLabel(String);

impl MonthLabel {
    /// Full English month name and four-digit year of `timestamp` in its own zone.
    pub fn from_timestamp<Tz>(timestamp: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        Self(timestamp.format("%B %Y").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MonthLabel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Input for one history entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewExchange {
    pub prompt: String,
    pub answer: String,
    pub attachment_count: usize,
}

/// Immutable result of one successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRecord {
    pub id: ExchangeId,
    pub prompt: String,
    pub answer: String,
    pub attachment_count: usize,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryBucket {
    pub label: MonthLabel,
    pub records: Vec<ExchangeRecord>,
}

/// What the answer pane currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveSelection {
    /// Nothing picked; the pane follows the unanswered draft.
    #[default]
    Draft,
    Exchange(ExchangeId),
}

impl ActiveSelection {
    pub fn exchange(self) -> Option<ExchangeId> {
        match self {
            Self::Draft => None,
            Self::Exchange(id) => Some(id),
        }
    }
}

/// Append-only answers grouped by month, buckets in creation order.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    buckets: Vec<HistoryBucket>,
    ids: IdSequence,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a bare answer text.
    pub fn record(&mut self, answer: impl Into<String>, created_at: DateTime<Local>) -> ExchangeId {
        self.record_exchange(
            NewExchange {
                answer: answer.into(),
                ..NewExchange::default()
            },
            created_at,
        )
    }

    pub fn record_exchange(
        &mut self,
        exchange: NewExchange,
        created_at: DateTime<Local>,
    ) -> ExchangeId {
        let label = MonthLabel::from_timestamp(&created_at);
        let id: ExchangeId = self.ids.next();
        let record = ExchangeRecord {
            id,
            prompt: exchange.prompt,
            answer: exchange.answer,
            attachment_count: exchange.attachment_count,
            created_at,
        };

        match self.buckets.iter_mut().find(|bucket| bucket.label == label) {
            Some(bucket) => bucket.records.push(record),
            None => {
                tracing::debug!(label = %label, "opening history bucket");
                self.buckets.push(HistoryBucket {
                    label: label.clone(),
                    records: vec![record],
                });
            }
        }

        tracing::info!(exchange = %id, label = %label, "exchange recorded");
        id
    }

    pub fn get(&self, id: ExchangeId) -> Option<&ExchangeRecord> {
        self.records().find(|record| record.id == id)
    }

    pub fn contains(&self, id: ExchangeId) -> bool {
        self.get(id).is_some()
    }

    pub fn buckets(&self) -> &[HistoryBucket] {
        &self.buckets
    }

    pub fn bucket(&self, label: &MonthLabel) -> Option<&HistoryBucket> {
        self.buckets.iter().find(|bucket| &bucket.label == label)
    }

    pub fn records(&self) -> impl Iterator<Item = &ExchangeRecord> {
        self.buckets.iter().flat_map(|bucket| bucket.records.iter())
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drops every bucket. Ids keep counting so stale selections never alias.
    pub(crate) fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .expect("unambiguous local noon")
    }

    fn labels(store: &HistoryStore) -> Vec<&str> {
        store
            .buckets()
            .iter()
            .map(|bucket| bucket.label.as_str())
            .collect()
    }

    #[test]
    fn month_label_uses_full_name_and_year() {
        assert_eq!(MonthLabel::from_timestamp(&at(2024, 1, 31)).as_str(), "January 2024");
        assert_eq!(MonthLabel::from_timestamp(&at(2025, 9, 1)).as_str(), "September 2025");
    }

    #[test]
    fn same_month_appends_in_creation_order() {
        let mut store = HistoryStore::new();
        let first = store.record("first answer", at(2024, 1, 3));
        let second = store.record("second answer", at(2024, 1, 28));

        assert_eq!(labels(&store), ["January 2024"]);
        let bucket = &store.buckets()[0];
        assert_eq!(
            bucket.records.iter().map(|record| record.id).collect::<Vec<_>>(),
            [first, second]
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn buckets_follow_first_creation_not_calendar_order() {
        let mut store = HistoryStore::new();
        store.record("march", at(2024, 3, 10));
        store.record("january", at(2024, 1, 10));
        store.record("march again", at(2024, 3, 11));

        assert_eq!(labels(&store), ["March 2024", "January 2024"]);
        assert_eq!(store.buckets()[0].records.len(), 2);
    }

    #[test]
    fn same_month_name_in_different_years_is_distinct() {
        let mut store = HistoryStore::new();
        store.record("old", at(2023, 5, 1));
        store.record("new", at(2024, 5, 1));

        assert_eq!(labels(&store), ["May 2023", "May 2024"]);
    }

    #[test]
    fn lookup_by_id_and_clear_keeps_ids_unique() {
        let mut store = HistoryStore::new();
        let kept = store.record_exchange(
            NewExchange {
                prompt: "What style is this?".to_string(),
                answer: "Cubism".to_string(),
                attachment_count: 2,
            },
            at(2024, 6, 2),
        );

        let record = store.get(kept).expect("recorded exchange");
        assert_eq!(record.prompt, "What style is this?");
        assert_eq!(record.attachment_count, 2);

        store.clear();
        assert!(store.is_empty());
        assert!(!store.contains(kept));

        let next = store.record("after clear", at(2024, 6, 3));
        assert_ne!(next, kept);
    }
}
