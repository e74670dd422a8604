//! Explicit feature cache
//!
//! Feature extraction is the most expensive stage and the same buffer is often
//! analysed more than once (several windows, repeated tuning calls, a rendition
//! compared against itself). The cache is a plain value owned by the caller:
//! it lives exactly as long as the caller keeps it, and nothing is shared
//! between independent invocations.

use std::collections::HashMap;
use std::sync::Arc;

use super::{FeatureSeries, FeatureType};

/// Cache key: what a series is a deterministic function of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Fingerprint of the (preprocessed) samples and their sample rate
    pub fingerprint: u64,
    /// Frame length in samples
    pub frame_length: usize,
    /// Hop length in samples
    pub hop_length: usize,
    /// Descriptor kind
    pub feature: FeatureType,
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that required extraction
    pub misses: u64,
    /// Stored series
    pub entries: usize,
}

/// Memoized feature series keyed by content fingerprint
#[derive(Debug, Default)]
pub struct FeatureCache {
    entries: HashMap<CacheKey, Arc<FeatureSeries>>,
    hits: u64,
    misses: u64,
}

impl FeatureCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a series, counting the hit or miss
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<FeatureSeries>> {
        match self.entries.get(key) {
            Some(series) => {
                self.hits += 1;
                Some(Arc::clone(series))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Look up a series without touching the counters
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<FeatureSeries>> {
        self.entries.get(key).map(Arc::clone)
    }

    /// True if the key is present (does not touch the counters)
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Store a series; an existing entry for the same key is kept
    pub fn insert(&mut self, key: CacheKey, series: FeatureSeries) -> Arc<FeatureSeries> {
        Arc::clone(self.entries.entry(key).or_insert_with(|| Arc::new(series)))
    }

    /// Counters and size
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }

    /// Drop all entries and reset the counters
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(hop: usize) -> CacheKey {
        CacheKey {
            fingerprint: 42,
            frame_length: 2048,
            hop_length: hop,
            feature: FeatureType::SpectralFlux,
        }
    }

    #[test]
    fn test_get_counts_hits_and_misses() {
        let mut cache = FeatureCache::new();
        assert!(cache.get(&key(512)).is_none());

        cache.insert(key(512), FeatureSeries::new(FeatureType::SpectralFlux, 512, vec![1.0, 2.0]));
        let hit = cache.get(&key(512)).unwrap();
        assert_eq!(hit.values, vec![1.0, 2.0]);
        assert!(cache.get(&key(256)).is_none());

        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 2,
                entries: 1
            }
        );
    }

    #[test]
    fn test_insert_keeps_first_entry() {
        let mut cache = FeatureCache::new();
        cache.insert(key(512), FeatureSeries::new(FeatureType::SpectralFlux, 512, vec![1.0]));
        let replacement = FeatureSeries::new(FeatureType::SpectralFlux, 512, vec![9.0]);
        let kept = cache.insert(key(512), replacement);
        assert_eq!(kept.values, vec![1.0]);

        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
