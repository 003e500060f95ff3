//! Time-bucketed health counters per (endpoint, model, provider) triple.
//!
//! Writes are the sole aggregator: every increment lands in the current
//! minute bucket and then rolls older buckets into coarser tiers inside
//! one critical section. Reads filter and sum without mutating.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MINUTE: i64 = 60;
const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;

const MINUTE_RETENTION: i64 = 60 * MINUTE;
const HOUR_RETENTION: i64 = 24 * HOUR;
const DAY_RETENTION: i64 = 30 * DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Success,
    Error,
    Skip,
}

/// Buckets keyed by tier-aligned unix timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketTiers {
    pub minute: BTreeMap<i64, u64>,
    pub hour: BTreeMap<i64, u64>,
    pub day: BTreeMap<i64, u64>,
}

impl BucketTiers {
    fn add(&mut self, now: i64, amount: u64) {
        let slot = now - now.rem_euclid(MINUTE);
        *self.minute.entry(slot).or_insert(0) += amount;
    }

    fn aggregate(&mut self, now: i64) {
        let minute_cutoff = now - MINUTE_RETENTION;
        let stale: Vec<i64> = self
            .minute
            .range(..minute_cutoff)
            .map(|(ts, _)| *ts)
            .collect();
        for ts in stale {
            let count = self.minute.remove(&ts).unwrap_or(0);
            let slot = ts - ts.rem_euclid(HOUR);
            *self.hour.entry(slot).or_insert(0) += count;
        }

        let hour_cutoff = now - HOUR_RETENTION;
        let stale: Vec<i64> = self.hour.range(..hour_cutoff).map(|(ts, _)| *ts).collect();
        for ts in stale {
            let count = self.hour.remove(&ts).unwrap_or(0);
            let slot = ts - ts.rem_euclid(DAY);
            *self.day.entry(slot).or_insert(0) += count;
        }

        let day_cutoff = now - DAY_RETENTION;
        self.day.retain(|ts, _| *ts >= day_cutoff);
    }

    fn sum_since(&self, since: i64) -> u64 {
        self.minute
            .range(since..)
            .chain(self.hour.range(since..))
            .chain(self.day.range(since..))
            .map(|(_, count)| *count)
            .sum()
    }

    fn total(&self) -> u64 {
        self.sum_since(i64::MIN)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricStats {
    pub total: u64,
    pub last_hour: u64,
    pub last_day: u64,
    pub buckets: BucketTiers,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthStats {
    pub success: MetricStats,
    pub error: MetricStats,
    pub skip: MetricStats,
}

#[derive(Debug, Default)]
struct KeyRecord {
    success: BucketTiers,
    error: BucketTiers,
    skip: BucketTiers,
}

impl KeyRecord {
    fn metric_mut(&mut self, metric: Metric) -> &mut BucketTiers {
        match metric {
            Metric::Success => &mut self.success,
            Metric::Error => &mut self.error,
            Metric::Skip => &mut self.skip,
        }
    }
}

#[derive(Debug, Default)]
pub struct HealthStore {
    records: Mutex<HashMap<String, KeyRecord>>,
}

impl HealthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, key: &str, metric: Metric, amount: u64) {
        self.increment_at(key, metric, amount, Utc::now());
    }

    /// Timestamped variant so tests and replay can drive rollup.
    pub fn increment_at(&self, key: &str, metric: Metric, amount: u64, now: DateTime<Utc>) {
        let now = now.timestamp();
        let mut records = self.records.lock().unwrap();
        let record = records.entry(key.to_string()).or_default();
        record.metric_mut(metric).add(now, amount);
        record.success.aggregate(now);
        record.error.aggregate(now);
        record.skip.aggregate(now);
    }

    pub fn get_stats(&self, key: &str) -> HealthStats {
        self.get_stats_at(key, Utc::now())
    }

    pub fn get_stats_at(&self, key: &str, now: DateTime<Utc>) -> HealthStats {
        let now = now.timestamp();
        let records = self.records.lock().unwrap();
        let Some(record) = records.get(key) else {
            return HealthStats::default();
        };
        HealthStats {
            success: metric_stats(&record.success, now),
            error: metric_stats(&record.error, now),
            skip: metric_stats(&record.skip, now),
        }
    }

    /// Lifetime totals for the skip gate: (success, error, skip).
    pub fn totals(&self, key: &str) -> (u64, u64, u64) {
        let records = self.records.lock().unwrap();
        match records.get(key) {
            Some(record) => (
                record.success.total(),
                record.error.total(),
                record.skip.total(),
            ),
            None => (0, 0, 0),
        }
    }

    pub fn errors_last_hour(&self, key: &str) -> u64 {
        self.errors_last_hour_at(key, Utc::now())
    }

    pub fn errors_last_hour_at(&self, key: &str, now: DateTime<Utc>) -> u64 {
        let since = now.timestamp() - HOUR;
        let records = self.records.lock().unwrap();
        records
            .get(key)
            .map(|record| record.error.sum_since(since))
            .unwrap_or(0)
    }

    /// Clear one key, or everything.
    pub fn reset(&self, key: Option<&str>) {
        let mut records = self.records.lock().unwrap();
        match key {
            Some(key) => {
                records.remove(key);
            }
            None => records.clear(),
        }
    }

    /// Clear a single metric for a key. Success recording uses this to
    /// drop the error and skip history of a recovered triple.
    pub fn reset_metric(&self, key: &str, metric: Metric) {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get_mut(key) {
            *record.metric_mut(metric) = BucketTiers::default();
        }
    }
}

fn metric_stats(tiers: &BucketTiers, now: i64) -> MetricStats {
    MetricStats {
        total: tiers.total(),
        last_hour: tiers.sum_since(now - HOUR),
        last_day: tiers.sum_since(now - DAY),
        buckets: tiers.clone(),
    }
}
