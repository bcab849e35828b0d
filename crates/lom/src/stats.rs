//! Statistics Module - Operation Counters
//!
//! Lightweight atomic counters over the model's operations, for monitoring
//! and for tests that assert balance properties. Collection can be disabled
//! through configuration; every recording call is then a no-op.

use indexmap::IndexMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic operation counters
pub struct ModelStats {
    enabled: bool,
    objects_created: AtomicU64,
    promotions: AtomicU64,
    references_created: AtomicU64,
    tuples_packed: AtomicU64,
    tuples_unpacked: AtomicU64,
    values_packed: AtomicU64,
    registrations: AtomicU64,
    deref_hits: AtomicU64,
    deref_misses: AtomicU64,
}

impl ModelStats {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            objects_created: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
            references_created: AtomicU64::new(0),
            tuples_packed: AtomicU64::new(0),
            tuples_unpacked: AtomicU64::new(0),
            values_packed: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            deref_hits: AtomicU64::new(0),
            deref_misses: AtomicU64::new(0),
        }
    }

    #[inline]
    fn bump(&self, counter: &AtomicU64) {
        if self.enabled {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_object_created(&self) {
        self.bump(&self.objects_created);
    }

    pub(crate) fn record_promotion(&self) {
        self.bump(&self.promotions);
    }

    pub(crate) fn record_reference_created(&self) {
        self.bump(&self.references_created);
    }

    pub(crate) fn record_pack(&self, values: usize) {
        if self.enabled {
            self.tuples_packed.fetch_add(1, Ordering::Relaxed);
            self.values_packed
                .fetch_add(values as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_unpack(&self) {
        self.bump(&self.tuples_unpacked);
    }

    pub(crate) fn record_registration(&self) {
        self.bump(&self.registrations);
    }

    pub(crate) fn record_deref(&self, hit: bool) {
        if hit {
            self.bump(&self.deref_hits);
        } else {
            self.bump(&self.deref_misses);
        }
    }

    /// Consistent point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            objects_created: self.objects_created.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            references_created: self.references_created.load(Ordering::Relaxed),
            tuples_packed: self.tuples_packed.load(Ordering::Relaxed),
            tuples_unpacked: self.tuples_unpacked.load(Ordering::Relaxed),
            values_packed: self.values_packed.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            deref_hits: self.deref_hits.load(Ordering::Relaxed),
            deref_misses: self.deref_misses.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub objects_created: u64,
    pub promotions: u64,
    pub references_created: u64,
    pub tuples_packed: u64,
    pub tuples_unpacked: u64,
    pub values_packed: u64,
    pub registrations: u64,
    pub deref_hits: u64,
    pub deref_misses: u64,
}

impl StatsSnapshot {
    /// Export as named metrics, in declaration order
    pub fn metrics(&self) -> IndexMap<&'static str, u64> {
        let mut map = IndexMap::new();
        map.insert("objects_created", self.objects_created);
        map.insert("promotions", self.promotions);
        map.insert("references_created", self.references_created);
        map.insert("tuples_packed", self.tuples_packed);
        map.insert("tuples_unpacked", self.tuples_unpacked);
        map.insert("values_packed", self.values_packed);
        map.insert("registrations", self.registrations);
        map.insert("deref_hits", self.deref_hits);
        map.insert("deref_misses", self.deref_misses);
        map
    }

    /// Export as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_record() {
        let stats = ModelStats::new(true);

        stats.record_object_created();
        stats.record_object_created();
        stats.record_promotion();
        stats.record_pack(3);
        stats.record_unpack();
        stats.record_deref(true);
        stats.record_deref(false);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.objects_created, 2);
        assert_eq!(snapshot.promotions, 1);
        assert_eq!(snapshot.tuples_packed, 1);
        assert_eq!(snapshot.values_packed, 3);
        assert_eq!(snapshot.tuples_unpacked, 1);
        assert_eq!(snapshot.deref_hits, 1);
        assert_eq!(snapshot.deref_misses, 1);
    }

    #[test]
    fn test_disabled_stats_are_noops() {
        let stats = ModelStats::new(false);

        stats.record_object_created();
        stats.record_pack(5);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.objects_created, 0);
        assert_eq!(snapshot.tuples_packed, 0);
    }

    #[test]
    fn test_metrics_export() {
        let stats = ModelStats::new(true);
        stats.record_promotion();

        let metrics = stats.snapshot().metrics();
        assert_eq!(metrics["promotions"], 1);
        assert_eq!(metrics.len(), 9);
    }

    #[test]
    fn test_json_export() {
        let stats = ModelStats::new(true);
        stats.record_object_created();

        let json = stats.snapshot().to_json();
        assert!(json.contains("\"objects_created\":1"));
    }
}
