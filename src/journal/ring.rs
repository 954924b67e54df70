//! Fixed-capacity event ring.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::journal::record::EventRecord;
use crate::observability::metrics;

/// Bounded, append-only journal of authentication events.
///
/// Appending at capacity evicts the oldest record. Append and snapshot share
/// one lock, so a snapshot always reflects a whole number of appends.
pub struct EventJournal {
    inner: Mutex<Ring>,
    capacity: usize,
}

struct Ring {
    records: VecDeque<EventRecord>,
    appended: u64,
}

impl EventJournal {
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// Create an empty journal holding at most `capacity` records.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "event journal capacity must be non-zero");
        Self {
            inner: Mutex::new(Ring {
                records: VecDeque::with_capacity(capacity),
                appended: 0,
            }),
            capacity,
        }
    }

    /// Append a record as the newest entry, evicting the oldest at capacity.
    ///
    /// The log line is emitted under the lock so log order matches journal
    /// order.
    pub fn append(&self, record: EventRecord) {
        let len = {
            let mut ring = self.inner.lock().expect("event journal mutex poisoned");
            ring.appended += 1;
            tracing::info!(
                target: "auth_gate::journal",
                seq = ring.appended,
                t = %record.timestamp().to_rfc3339(),
                ip = %record.source(),
                user = %record.principal(),
                event = %record.outcome(),
                ua = %record.context(),
                n_fail = record.failures(),
                "auth event"
            );

            if ring.records.len() == self.capacity {
                ring.records.pop_front();
            }
            ring.records.push_back(record);
            assert!(
                ring.records.len() <= self.capacity,
                "event journal exceeded capacity: {} > {}",
                ring.records.len(),
                self.capacity
            );
            ring.records.len()
        };

        metrics::record_journal_len(len);
    }

    /// Copy of every retained record, oldest first.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        let ring = self.inner.lock().expect("event journal mutex poisoned");
        ring.records.iter().cloned().collect()
    }

    /// Copy of the newest `limit` records, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<EventRecord> {
        let ring = self.inner.lock().expect("event journal mutex poisoned");
        let skip = ring.records.len().saturating_sub(limit);
        ring.records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("event journal mutex poisoned").records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records ever appended, including evicted ones.
    pub fn total_appended(&self) -> u64 {
        self.inner.lock().expect("event journal mutex poisoned").appended
    }
}

impl Default for EventJournal {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::record::Outcome;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashSet;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(principal: &str) -> EventRecord {
        EventRecord::new(at(0), "10.0.0.1", principal, Outcome::Failure, "-")
    }

    fn principals(records: &[EventRecord]) -> Vec<String> {
        records.iter().map(|r| r.principal().to_string()).collect()
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let journal = EventJournal::new(2);
        journal.append(record("A"));
        journal.append(record("B"));
        journal.append(record("C"));

        assert_eq!(principals(&journal.snapshot()), vec!["B", "C"]);
        assert_eq!(journal.total_appended(), 3);
    }

    #[test]
    fn test_keeps_last_capacity_records_in_append_order() {
        let journal = EventJournal::new(5);
        for i in 0..23 {
            journal.append(record(&i.to_string()));
            assert!(journal.len() <= 5);
        }

        assert_eq!(principals(&journal.snapshot()), vec!["18", "19", "20", "21", "22"]);
    }

    #[test]
    fn test_insertion_order_ignores_timestamps() {
        let journal = EventJournal::new(10);
        journal.append(EventRecord::new(at(30), "s", "late", Outcome::Success, "-"));
        journal.append(EventRecord::new(at(10), "s", "early", Outcome::Success, "-"));

        assert_eq!(principals(&journal.snapshot()), vec!["late", "early"]);
    }

    #[test]
    fn test_recent_returns_newest_oldest_first() {
        let journal = EventJournal::new(10);
        for name in ["a", "b", "c", "d"] {
            journal.append(record(name));
        }

        assert_eq!(principals(&journal.recent(2)), vec!["c", "d"]);
        assert_eq!(journal.recent(50).len(), 4);
        assert!(journal.recent(0).is_empty());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let journal = EventJournal::new(3);
        journal.append(record("a"));
        let before = journal.snapshot();
        journal.append(record("b"));

        assert_eq!(before.len(), 1);
        assert_eq!(journal.len(), 2);
    }

    #[test]
    fn test_concurrent_appends_are_bounded_and_counted() {
        let journal = EventJournal::new(64);
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let journal = &journal;
                scope.spawn(move || {
                    for i in 0..100 {
                        journal.append(record(&format!("{worker}-{i}")));
                        assert!(journal.snapshot().len() <= 64);
                    }
                });
            }
        });

        let snapshot = journal.snapshot();
        assert_eq!(snapshot.len(), 64);
        assert_eq!(journal.total_appended(), 800);
        let unique: HashSet<_> = snapshot.iter().map(|r| r.principal().to_string()).collect();
        assert_eq!(unique.len(), 64);
    }

    /// Collects the `user` field of every journal log line, in emission order.
    #[derive(Clone, Default)]
    struct JournalLines(std::sync::Arc<Mutex<Vec<String>>>);

    struct UserField<'a>(&'a mut Option<String>);

    impl tracing::field::Visit for UserField<'_> {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "user" {
                *self.0 = Some(format!("{value:?}"));
            }
        }
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for JournalLines {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if event.metadata().target() != "auth_gate::journal" {
                return;
            }
            let mut user = None;
            event.record(&mut UserField(&mut user));
            if let Some(user) = user {
                self.0.lock().unwrap().push(user);
            }
        }
    }

    #[test]
    fn test_log_lines_follow_append_order() {
        use tracing_subscriber::layer::SubscriberExt;

        let lines = JournalLines::default();
        let dispatch = tracing::Dispatch::new(tracing_subscriber::registry().with(lines.clone()));
        let journal = EventJournal::new(1000);

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let journal = &journal;
                let dispatch = &dispatch;
                scope.spawn(move || {
                    tracing::dispatcher::with_default(dispatch, || {
                        for i in 0..50 {
                            journal.append(record(&format!("{worker}-{i}")));
                        }
                    });
                });
            }
        });

        let logged = lines.0.lock().unwrap().clone();
        assert_eq!(logged.len(), 400);
        assert_eq!(logged, principals(&journal.snapshot()));
    }

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn test_zero_capacity_rejected() {
        let _ = EventJournal::new(0);
    }
}
