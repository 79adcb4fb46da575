use std::collections::VecDeque;
use std::time::Instant;

use uuid::Uuid;

use crate::hub::model::{Event, Publication, RecoverFrom};
use crate::utils::config::HistoryConfig;

#[derive(Debug, Clone)]
struct HistoryEntry {
    offset: u64,
    event: Event,
    published_at: Instant,
}

/// What the ring could give back to a reconnecting client.
#[derive(Debug, PartialEq)]
pub struct Recovery {
    pub publications: Vec<Publication>,
    /// False when something the client missed is gone.
    pub recovered: bool,
}

/// Recent publications of one channel, bounded by count and age.
#[derive(Debug)]
pub struct HistoryRing {
    epoch: String,
    top: u64,
    entries: VecDeque<HistoryEntry>,
    config: HistoryConfig,
}

impl HistoryRing {
    pub fn new(config: HistoryConfig) -> Self {
        HistoryRing {
            epoch: Uuid::new_v4().simple().to_string(),
            top: 0,
            entries: VecDeque::with_capacity(config.size.min(1024)),
            config,
        }
    }

    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    /// Offset of the latest publication, 0 when nothing was published.
    pub fn top(&self) -> u64 {
        self.top
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, event: Event, now: Instant) -> u64 {
        self.top += 1;
        self.entries.push_back(HistoryEntry {
            offset: self.top,
            event,
            published_at: now,
        });
        self.evict(now);
        self.top
    }

    pub fn evict(&mut self, now: Instant) {
        while self.entries.len() > self.config.size {
            self.entries.pop_front();
        }
        while let Some(oldest) = self.entries.front() {
            if now.saturating_duration_since(oldest.published_at) < self.config.ttl {
                break;
            }
            self.entries.pop_front();
        }
    }

    /// Publications after `from.offset`, if `from` belongs to this ring.
    pub fn since(&mut self, from: &RecoverFrom, now: Instant) -> Recovery {
        self.evict(now);

        if from.epoch != self.epoch || from.offset > self.top {
            return Recovery {
                publications: Vec::new(),
                recovered: false,
            };
        }

        // Everything the client has not seen must still be retained.
        let first_retained = self
            .entries
            .front()
            .map(|e| e.offset)
            .unwrap_or(self.top + 1);
        let recovered = from.offset + 1 >= first_retained;

        let publications = self
            .entries
            .iter()
            .filter(|e| e.offset > from.offset)
            .map(|e| Publication {
                offset: e.offset,
                data: e.event.clone(),
            })
            .collect();

        Recovery {
            publications,
            recovered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::model::EventType;
    use serde_json::json;
    use std::time::Duration;

    fn event(n: u64) -> Event {
        Event::new(EventType::NewComment, json!({ "n": n }))
    }

    fn ring(size: usize, ttl_secs: u64) -> HistoryRing {
        HistoryRing::new(HistoryConfig {
            size,
            ttl: Duration::from_secs(ttl_secs),
        })
    }

    fn from(ring: &HistoryRing, offset: u64) -> RecoverFrom {
        RecoverFrom {
            epoch: ring.epoch().to_string(),
            offset,
        }
    }

    #[test]
    fn offsets_increase_from_one() {
        let mut ring = ring(10, 60);
        let now = Instant::now();

        assert_eq!(ring.push(event(1), now), 1);
        assert_eq!(ring.push(event(2), now), 2);
        assert_eq!(ring.top(), 2);
    }

    #[test]
    fn replays_what_the_client_missed() {
        let mut ring = ring(10, 60);
        let now = Instant::now();
        for n in 1..=5 {
            ring.push(event(n), now);
        }

        let recovery = ring.since(&from(&ring, 3), now);

        assert!(recovery.recovered);
        let offsets: Vec<u64> = recovery.publications.iter().map(|p| p.offset).collect();
        assert_eq!(offsets, vec![4, 5]);
        assert_eq!(recovery.publications[0].data.payload, json!({ "n": 4 }));
    }

    #[test]
    fn up_to_date_client_recovers_nothing() {
        let mut ring = ring(10, 60);
        let now = Instant::now();
        ring.push(event(1), now);

        let recovery = ring.since(&from(&ring, 1), now);
        assert!(recovery.recovered);
        assert!(recovery.publications.is_empty());
    }

    #[test]
    fn capacity_eviction_breaks_recovery() {
        let mut ring = ring(3, 60);
        let now = Instant::now();
        for n in 1..=6 {
            ring.push(event(n), now);
        }

        let lost = ring.since(&from(&ring, 1), now);
        assert!(!lost.recovered);
        assert_eq!(lost.publications.len(), 3);

        let fine = ring.since(&from(&ring, 3), now);
        assert!(fine.recovered);
        assert_eq!(fine.publications.len(), 3);
    }

    #[test]
    fn age_eviction_breaks_recovery() {
        let mut ring = ring(300, 60);
        let start = Instant::now();
        ring.push(event(1), start);
        ring.push(event(2), start + Duration::from_secs(30));

        let later = start + Duration::from_secs(61);
        let recovery = ring.since(&from(&ring, 0), later);

        assert!(!recovery.recovered);
        assert_eq!(recovery.publications.len(), 1);
        assert_eq!(recovery.publications[0].offset, 2);

        ring.evict(start + Duration::from_secs(120));
        assert!(ring.is_empty());
        assert_eq!(ring.top(), 2);
    }

    #[test]
    fn foreign_epoch_or_future_offset_is_not_recovered() {
        let mut ring = ring(10, 60);
        let now = Instant::now();
        ring.push(event(1), now);

        let stale = RecoverFrom {
            epoch: "previous-epoch".into(),
            offset: 0,
        };
        assert!(!ring.since(&stale, now).recovered);
        assert!(!ring.since(&from(&ring, 7), now).recovered);
    }
}
