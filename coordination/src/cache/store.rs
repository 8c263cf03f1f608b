//! Consultation Cache: memoized consultant outcomes with a freshness window
//!
//! ```text
//! get(fp) ──▶ live record?  ── yes ──▶ bump access stats, return (authoritative)
//!                 │
//!                 └── no ──▶ drop expired entry, miss
//!
//! put(record) ──▶ insert (last writer wins)
//!                 ├─ len > maxCacheSize → evict lowest-access 10%, purge expired
//!                 └─ write-through to the record store
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::fingerprint::Fingerprint;
use crate::config::{OrchestratorConfig, TtlAdjustment};
use crate::consultant::{ConsultantId, Recommendation};
use crate::state::{list_records, put_record, schema, SharedRecordStore, StoreResult};

/// Scores above this earn a longer freshness window
pub const HIGH_QUALITY_SCORE: f64 = 0.9;

/// Fraction of entries removed when the cache is over capacity
pub const PRESSURE_EVICTION_FRACTION: f64 = 0.1;

/// A cached consultation outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRecord {
    pub fingerprint: Fingerprint,
    pub consultant_id: ConsultantId,
    pub recommendation: Recommendation,
    pub quality_score: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed_at: DateTime<Utc>,
}

impl ConsultationRecord {
    /// Build a record created at `now` with a base TTL of `ttl_ms`.
    ///
    /// The TTL is extended by half for scores above [`HIGH_QUALITY_SCORE`].
    pub fn new(
        fingerprint: Fingerprint,
        consultant_id: impl Into<ConsultantId>,
        recommendation: Recommendation,
        quality_score: f64,
        ttl_ms: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let ttl_ms = if quality_score > HIGH_QUALITY_SCORE {
            ttl_ms + ttl_ms / 2
        } else {
            ttl_ms
        };
        let ttl = Duration::milliseconds(i64::try_from(ttl_ms).unwrap_or(i64::MAX));
        Self {
            fingerprint,
            consultant_id: consultant_id.into(),
            recommendation,
            quality_score,
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            access_count: 0,
            last_accessed_at: now,
        }
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Counters exposed by [`ConsultationCache::stats`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub base_ttl_ms: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Shared reference to ConsultationCache
pub type SharedConsultationCache = Arc<ConsultationCache>;

/// Content-addressed cache of consultation outcomes
pub struct ConsultationCache {
    entries: RwLock<HashMap<Fingerprint, ConsultationRecord>>,
    max_size: usize,
    configured_ttl_ms: u64,
    base_ttl_ms: AtomicU64,
    adjustment: TtlAdjustment,
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
    window_hits: AtomicU64,
    window_lookups: AtomicU64,
    store: Option<SharedRecordStore>,
}

impl ConsultationCache {
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_size: config.max_cache_size,
            configured_ttl_ms: config.cache_ttl_ms,
            base_ttl_ms: AtomicU64::new(config.cache_ttl_ms),
            adjustment: config.ttl_adjustment,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            window_hits: AtomicU64::new(0),
            window_lookups: AtomicU64::new(0),
            store: None,
        }
    }

    /// Write records through to `store`
    pub fn with_store(mut self, store: SharedRecordStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn shared(self) -> SharedConsultationCache {
        Arc::new(self)
    }

    /// Current base TTL in milliseconds
    pub fn base_ttl_ms(&self) -> u64 {
        self.base_ttl_ms.load(Ordering::Relaxed)
    }

    /// Build a record using the current base TTL
    pub fn record(
        &self,
        fingerprint: Fingerprint,
        consultant_id: impl Into<ConsultantId>,
        recommendation: Recommendation,
        quality_score: f64,
    ) -> ConsultationRecord {
        ConsultationRecord::new(
            fingerprint,
            consultant_id,
            recommendation,
            quality_score,
            self.base_ttl_ms(),
            Utc::now(),
        )
    }

    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<ConsultationRecord> {
        self.get_at(fingerprint, Utc::now()).await
    }

    /// Look up a live record as of `now`.
    ///
    /// A hit bumps the record's access stats; an expired entry is dropped.
    pub async fn get_at(
        &self,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Option<ConsultationRecord> {
        self.window_lookups.fetch_add(1, Ordering::Relaxed);
        let (live, expired) = {
            let mut entries = self.entries.write().await;
            match entries.get_mut(fingerprint) {
                Some(record) if record.is_live_at(now) => {
                    record.access_count += 1;
                    record.last_accessed_at = now;
                    (Some(record.clone()), false)
                }
                Some(_) => {
                    entries.remove(fingerprint);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    debug!(fingerprint = %fingerprint.short(), "Expired cache entry dropped");
                    (None, true)
                }
                None => (None, false),
            }
        };
        if expired {
            self.forget_persisted(std::slice::from_ref(fingerprint)).await;
        }

        if live.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.window_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        live
    }

    /// Insert a record, replacing any previous one for its fingerprint.
    pub async fn put(&self, record: ConsultationRecord) {
        let evicted = {
            let mut entries = self.entries.write().await;
            entries.insert(record.fingerprint.clone(), record.clone());
            self.insertions.fetch_add(1, Ordering::Relaxed);

            if entries.len() > self.max_size {
                let mut evicted =
                    Self::evict_lowest_access(&mut entries, PRESSURE_EVICTION_FRACTION);
                evicted.extend(Self::purge_expired(&mut entries, Utc::now()));
                self.evictions
                    .fetch_add(evicted.len() as u64, Ordering::Relaxed);
                debug!(evicted = evicted.len(), remaining = entries.len(), "Cache over capacity");
                evicted
            } else {
                Vec::new()
            }
        };

        if let Some(store) = &self.store {
            if let Err(e) = put_record(
                store.as_ref(),
                schema::COL_CONSULTATIONS,
                record.fingerprint.as_str(),
                &record,
            )
            .await
            {
                warn!(fingerprint = %record.fingerprint.short(), error = %e, "Cache write-through failed");
            }
        }
        self.forget_persisted(&evicted).await;
    }

    /// Remove every expired entry; returns how many were removed
    pub async fn evict_expired(&self) -> usize {
        self.evict_expired_at(Utc::now()).await
    }

    pub async fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        let evicted = Self::purge_expired(&mut *self.entries.write().await, now);
        self.evictions
            .fetch_add(evicted.len() as u64, Ordering::Relaxed);
        self.forget_persisted(&evicted).await;
        evicted.len()
    }

    /// Remove the least-accessed `target_fraction` of entries
    pub async fn evict_under_pressure(&self, target_fraction: f64) -> usize {
        let evicted =
            Self::evict_lowest_access(&mut *self.entries.write().await, target_fraction);
        self.evictions
            .fetch_add(evicted.len() as u64, Ordering::Relaxed);
        self.forget_persisted(&evicted).await;
        evicted.len()
    }

    fn evict_lowest_access(
        entries: &mut HashMap<Fingerprint, ConsultationRecord>,
        fraction: f64,
    ) -> Vec<Fingerprint> {
        if entries.is_empty() || fraction <= 0.0 {
            return Vec::new();
        }
        let count = ((entries.len() as f64 * fraction.min(1.0)).ceil() as usize).max(1);

        let mut ranked: Vec<(&Fingerprint, u64, DateTime<Utc>)> = entries
            .iter()
            .map(|(fp, r)| (fp, r.access_count, r.last_accessed_at))
            .collect();
        ranked.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));

        let victims: Vec<Fingerprint> = ranked
            .into_iter()
            .take(count)
            .map(|(fp, _, _)| fp.clone())
            .collect();
        for fp in &victims {
            entries.remove(fp);
        }
        victims
    }

    fn purge_expired(
        entries: &mut HashMap<Fingerprint, ConsultationRecord>,
        now: DateTime<Utc>,
    ) -> Vec<Fingerprint> {
        let expired: Vec<Fingerprint> = entries
            .iter()
            .filter(|(_, r)| !r.is_live_at(now))
            .map(|(fp, _)| fp.clone())
            .collect();
        for fp in &expired {
            entries.remove(fp);
        }
        expired
    }

    async fn forget_persisted(&self, evicted: &[Fingerprint]) {
        let Some(store) = &self.store else {
            return;
        };
        for fp in evicted {
            if let Err(e) = store.delete(schema::COL_CONSULTATIONS, fp.as_str()).await {
                warn!(fingerprint = %fp.short(), error = %e, "Failed to delete evicted record");
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            base_ttl_ms: self.base_ttl_ms(),
        }
    }

    /// Retune the base TTL from the hit rate observed since the last call.
    ///
    /// Returns the new TTL when it changed. Bounded to half and double the
    /// configured value.
    pub fn adjust_ttl(&self) -> Option<u64> {
        let adj = &self.adjustment;
        if !adj.enabled {
            return None;
        }
        let lookups = self.window_lookups.load(Ordering::Relaxed);
        if lookups < adj.min_samples.max(1) {
            return None;
        }
        let hits = self.window_hits.swap(0, Ordering::Relaxed);
        self.window_lookups.store(0, Ordering::Relaxed);
        let hit_rate = hits as f64 / lookups as f64;

        let current = self.base_ttl_ms();
        let factor = if hit_rate >= adj.high_hit_rate {
            1.0 + adj.step
        } else if hit_rate <= adj.low_hit_rate {
            1.0 - adj.step
        } else {
            return None;
        };

        let floor = self.configured_ttl_ms / 2;
        let ceiling = self.configured_ttl_ms.saturating_mul(2);
        let next = ((current as f64 * factor).round() as u64).clamp(floor, ceiling);
        if next == current {
            return None;
        }
        self.base_ttl_ms.store(next, Ordering::Relaxed);
        info!(hit_rate, from_ms = current, to_ms = next, "Cache TTL adjusted");
        Some(next)
    }

    /// Hydrate from the record store; expired records are deleted from it.
    pub async fn warm_from_store(&self) -> StoreResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let records: Vec<(String, ConsultationRecord)> =
            list_records(store.as_ref(), schema::COL_CONSULTATIONS).await?;
        let now = Utc::now();

        let mut expired = Vec::new();
        let mut loaded = 0;
        {
            let mut entries = self.entries.write().await;
            for (_, record) in records {
                if !record.is_live_at(now) {
                    expired.push(record.fingerprint);
                } else if entries.len() < self.max_size {
                    entries.insert(record.fingerprint.clone(), record);
                    loaded += 1;
                }
            }
        }
        self.forget_persisted(&expired).await;
        info!(loaded, purged = expired.len(), "Consultation cache warmed");
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MemoryRecordStore, RecordStore};

    fn config(ttl_ms: u64, max: usize) -> OrchestratorConfig {
        OrchestratorConfig {
            cache_ttl_ms: ttl_ms,
            max_cache_size: max,
            ..OrchestratorConfig::default()
        }
    }

    fn fp(n: usize) -> Fingerprint {
        Fingerprint::from_hex(format!("{:064x}", n))
    }

    fn rec(n: usize, score: f64, ttl_ms: u64, now: DateTime<Utc>) -> ConsultationRecord {
        ConsultationRecord::new(
            fp(n),
            "architect",
            Recommendation::new(serde_json::json!({"n": n}), score),
            score,
            ttl_ms,
            now,
        )
    }

    #[tokio::test]
    async fn test_high_quality_extends_ttl() {
        let cache = ConsultationCache::new(&config(1000, 10));
        let t0 = Utc::now();
        cache.put(rec(1, 0.95, 1000, t0)).await;

        assert!(cache
            .get_at(&fp(1), t0 + Duration::milliseconds(1200))
            .await
            .is_some());
        assert!(cache
            .get_at(&fp(1), t0 + Duration::milliseconds(1600))
            .await
            .is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_regular_score_uses_base_ttl() {
        let cache = ConsultationCache::new(&config(1000, 10));
        let t0 = Utc::now();
        cache.put(rec(1, 0.8, 1000, t0)).await;
        assert!(cache
            .get_at(&fp(1), t0 + Duration::milliseconds(1200))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_hit_bumps_access_stats() {
        let cache = ConsultationCache::new(&config(60_000, 10));
        let t0 = Utc::now();
        cache.put(rec(1, 0.8, 60_000, t0)).await;

        let later = t0 + Duration::milliseconds(10);
        cache.get_at(&fp(1), later).await.unwrap();
        let second = cache.get_at(&fp(1), later).await.unwrap();

        assert_eq!(second.access_count, 2);
        assert_eq!(second.last_accessed_at, later);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate(), 1.0);
    }

    #[tokio::test]
    async fn test_pressure_evicts_least_accessed() {
        let cache = ConsultationCache::new(&config(60_000, 10));
        let t0 = Utc::now();
        for n in 0..10 {
            cache.put(rec(n, 0.8, 60_000, t0)).await;
        }
        for n in 1..10 {
            cache.get_at(&fp(n), t0).await;
        }

        // 11th insert crosses the bound; ceil(11 * 0.1) = 2 evicted
        cache.put(rec(10, 0.8, 60_000, t0)).await;

        assert_eq!(cache.len().await, 9);
        assert!(cache.get_at(&fp(0), t0).await.is_none());
        assert!(cache.get_at(&fp(5), t0).await.is_some());
        assert_eq!(cache.stats().await.evictions, 2);
    }

    #[tokio::test]
    async fn test_evict_expired() {
        let cache = ConsultationCache::new(&config(1000, 10));
        let t0 = Utc::now();
        cache.put(rec(1, 0.5, 1000, t0)).await;
        cache.put(rec(2, 0.5, 5000, t0)).await;

        let removed = cache
            .evict_expired_at(t0 + Duration::milliseconds(2000))
            .await;
        assert_eq!(removed, 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let cache = ConsultationCache::new(&config(60_000, 10));
        let t0 = Utc::now();
        cache.put(rec(1, 0.5, 60_000, t0)).await;
        cache.put(rec(1, 0.75, 60_000, t0)).await;

        let hit = cache.get_at(&fp(1), t0).await.unwrap();
        assert_eq!(hit.quality_score, 0.75);
        assert_eq!(cache.len().await, 1);
    }

    #[test]
    fn test_adjust_ttl_bounds() {
        let mut cfg = config(1000, 10);
        cfg.ttl_adjustment.min_samples = 4;
        let cache = ConsultationCache::new(&cfg);

        for round in 0..5 {
            cache.window_lookups.store(4, Ordering::Relaxed);
            cache.window_hits.store(4, Ordering::Relaxed);
            let adjusted = cache.adjust_ttl();
            if round < 3 {
                assert!(adjusted.is_some());
            }
        }
        assert_eq!(cache.base_ttl_ms(), 2000);

        for _ in 0..10 {
            cache.window_lookups.store(4, Ordering::Relaxed);
            cache.window_hits.store(0, Ordering::Relaxed);
            cache.adjust_ttl();
        }
        assert_eq!(cache.base_ttl_ms(), 500);
    }

    #[test]
    fn test_adjust_ttl_waits_for_samples() {
        let cache = ConsultationCache::new(&config(1000, 10));
        cache.window_lookups.store(3, Ordering::Relaxed);
        cache.window_hits.store(3, Ordering::Relaxed);
        assert_eq!(cache.adjust_ttl(), None);
        assert_eq!(cache.base_ttl_ms(), 1000);
    }

    #[tokio::test]
    async fn test_write_through_and_warm_start() {
        let store: SharedRecordStore = Arc::new(MemoryRecordStore::new());
        let cache = ConsultationCache::new(&config(60_000, 10)).with_store(store.clone());
        let now = Utc::now();
        cache.put(rec(1, 0.8, 60_000, now)).await;
        cache.put(rec(2, 0.8, 1, now - Duration::seconds(5))).await;

        assert_eq!(store.list(schema::COL_CONSULTATIONS).await.unwrap().len(), 2);

        let warm = ConsultationCache::new(&config(60_000, 10)).with_store(store.clone());
        assert_eq!(warm.warm_from_store().await.unwrap(), 1);
        assert!(warm.get(&fp(1)).await.is_some());
        // The expired record is gone from the store too
        let persisted = store.list(schema::COL_CONSULTATIONS).await.unwrap();
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_lookup_deletes_persisted_record() {
        let store: SharedRecordStore = Arc::new(MemoryRecordStore::new());
        let cache = ConsultationCache::new(&config(1000, 10)).with_store(store.clone());
        let t0 = Utc::now();
        cache.put(rec(1, 0.5, 1000, t0)).await;
        assert_eq!(store.list(schema::COL_CONSULTATIONS).await.unwrap().len(), 1);

        assert!(cache
            .get_at(&fp(1), t0 + Duration::milliseconds(5000))
            .await
            .is_none());

        assert!(cache.is_empty().await);
        assert!(store.list(schema::COL_CONSULTATIONS).await.unwrap().is_empty());
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn test_evict_expired_deletes_persisted_records() {
        let store: SharedRecordStore = Arc::new(MemoryRecordStore::new());
        let cache = ConsultationCache::new(&config(1000, 10)).with_store(store.clone());
        let t0 = Utc::now();
        cache.put(rec(1, 0.5, 1000, t0)).await;
        cache.put(rec(2, 0.5, 60_000, t0)).await;

        assert_eq!(cache.evict_expired_at(t0 + Duration::seconds(5)).await, 1);

        let persisted = store.list(schema::COL_CONSULTATIONS).await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].0, fp(2).as_str());
    }

    #[tokio::test]
    async fn test_evict_under_pressure_fractions() {
        let store: SharedRecordStore = Arc::new(MemoryRecordStore::new());
        let cache = ConsultationCache::new(&config(60_000, 100)).with_store(store.clone());
        let t0 = Utc::now();
        for n in 0..10 {
            cache.put(rec(n, 0.8, 60_000, t0)).await;
            // Entry n gets n hits, so lower numbers rank first for eviction
            for _ in 0..n {
                cache.get_at(&fp(n), t0).await;
            }
        }

        // ceil(10 * 0.1) = 1
        assert_eq!(cache.evict_under_pressure(0.1).await, 1);
        assert!(cache.get_at(&fp(0), t0).await.is_none());
        assert_eq!(cache.len().await, 9);

        // ceil(9 * 0.5) = 5 → entries 1..=5 go
        assert_eq!(cache.evict_under_pressure(0.5).await, 5);
        assert_eq!(cache.len().await, 4);
        for n in 1..=5 {
            assert!(cache.get_at(&fp(n), t0).await.is_none());
        }
        for n in 6..10 {
            assert!(cache.get_at(&fp(n), t0).await.is_some());
        }
        assert_eq!(cache.stats().await.evictions, 6);

        let persisted = store.list(schema::COL_CONSULTATIONS).await.unwrap();
        assert_eq!(persisted.len(), 4);
        assert!(persisted.iter().all(|(key, _)| key != fp(0).as_str()));
    }

    #[tokio::test]
    async fn test_evict_under_pressure_removes_at_least_one() {
        let cache = ConsultationCache::new(&config(60_000, 100));
        let t0 = Utc::now();
        cache.put(rec(1, 0.8, 60_000, t0)).await;
        cache.put(rec(2, 0.8, 60_000, t0)).await;

        assert_eq!(cache.evict_under_pressure(0.01).await, 1);
        assert_eq!(cache.evict_under_pressure(0.0).await, 0);
        assert_eq!(cache.len().await, 1);
    }
}
