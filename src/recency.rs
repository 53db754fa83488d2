//! Recency/frequency usage scores for (file, symbol) pairs
//!
//! Every accepted search result records an access. The score blends how
//! recently a pair was visited (exponential decay per hour, saturating after
//! `max_age_hours`) with how often (linear, saturating at `frequency_cap`),
//! weighted 70/30 in favour of recency by default. Scores are computed on
//! read and never stored.
//!
//! # Persistence
//!
//! The whole map lives under one store key as a JSON object of
//! `key -> { path, lastAccessed, accessCount }`. It is loaded lazily once per
//! engine (or after [`RecencyEngine::invalidate`]) and written back in full
//! after every access. Entries that fail to decode are dropped individually;
//! a value that is not an object at all is treated as an empty map.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::RecencyConfig;
use crate::store::KeyValueStore;

/// Store key holding the recency map
pub const STORE_KEY: &str = "symjump.recency";

const MS_PER_HOUR: f64 = 3_600_000.0;

/// `<path>#<symbol>`, or just `<path>` without a symbol
pub fn recency_key(path: &str, symbol: Option<&str>) -> String {
    match symbol {
        Some(symbol) => format!("{}#{}", path, symbol),
        None => path.to_string(),
    }
}

/// Current time in epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Persisted access record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecencyEntry {
    pub path: String,
    /// Epoch milliseconds
    pub last_accessed: i64,
    pub access_count: u64,
}

/// Derived score for one key
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolScore {
    /// 0..=100, one decimal place
    pub score: f64,
    /// Epoch milliseconds (0 when never accessed)
    pub last_accessed: i64,
    pub access_count: u64,
}

/// Score an entry at time `now_ms`
pub fn compute_score(entry: &RecencyEntry, now_ms: i64, config: &RecencyConfig) -> f64 {
    let age_hours = now_ms.saturating_sub(entry.last_accessed).max(0) as f64 / MS_PER_HOUR;
    let recency = config.decay_factor.powf(age_hours.min(config.max_age_hours)) * 100.0;

    let cap = config.frequency_cap.max(1);
    let frequency = entry.access_count.min(cap) as f64 * (100.0 / cap as f64);

    let score = config.recency_weight * recency + (1.0 - config.recency_weight) * frequency;
    (score * 10.0).round() / 10.0
}

/// Tracks and scores symbol accesses
pub struct RecencyEngine {
    store: Arc<dyn KeyValueStore>,
    config: RecencyConfig,
    entries: Mutex<Option<HashMap<String, RecencyEntry>>>,
}

impl RecencyEngine {
    pub fn new(store: Arc<dyn KeyValueStore>, config: RecencyConfig) -> Self {
        Self {
            store,
            config,
            entries: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RecencyConfig {
        &self.config
    }

    /// Record an access now
    pub fn record_access(&self, path: &str, symbol: Option<&str>) -> Result<()> {
        self.record_access_at(path, symbol, now_ms())
    }

    /// Record an access at `now_ms`
    ///
    /// The in-memory map is always updated; an error means only that the
    /// write to the store failed.
    pub fn record_access_at(&self, path: &str, symbol: Option<&str>, now_ms: i64) -> Result<()> {
        let key = recency_key(path, symbol);
        let mut guard = self.lock_loaded();
        let entries = guard.get_or_insert_with(HashMap::new);

        let entry = entries.entry(key.clone()).or_insert_with(|| RecencyEntry {
            path: path.to_string(),
            last_accessed: now_ms,
            access_count: 0,
        });
        entry.last_accessed = now_ms;
        entry.access_count = entry.access_count.saturating_add(1);
        log::debug!("Recorded access to {} (count {})", key, entry.access_count);

        let evicted = evict_oldest(entries, self.config.max_entries);
        if evicted > 0 {
            log::debug!("Evicted {} oldest recency entries", evicted);
        }

        self.persist(entries)
    }

    /// Score one key now
    pub fn get_score(&self, path: &str, symbol: Option<&str>) -> SymbolScore {
        self.get_score_at(path, symbol, now_ms())
    }

    pub fn get_score_at(&self, path: &str, symbol: Option<&str>, now_ms: i64) -> SymbolScore {
        let key = recency_key(path, symbol);
        let guard = self.lock_loaded();
        let entries = guard.as_ref();
        self.score_entry(entries.and_then(|e| e.get(&key)), now_ms)
    }

    /// Score many keys under a single load
    pub fn get_scores(&self, keys: &[String]) -> HashMap<String, SymbolScore> {
        self.get_scores_at(keys, now_ms())
    }

    pub fn get_scores_at(&self, keys: &[String], now_ms: i64) -> HashMap<String, SymbolScore> {
        let guard = self.lock_loaded();
        let entries = guard.as_ref();
        keys.iter()
            .map(|key| {
                let score = self.score_entry(entries.and_then(|e| e.get(key)), now_ms);
                (key.clone(), score)
            })
            .collect()
    }

    /// All entries, most recently accessed first
    pub fn entries(&self) -> Vec<(String, RecencyEntry)> {
        let guard = self.lock_loaded();
        let mut list: Vec<(String, RecencyEntry)> = guard
            .as_ref()
            .map(|e| e.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        list.sort_by(|a, b| b.1.last_accessed.cmp(&a.1.last_accessed).then_with(|| a.0.cmp(&b.0)));
        list
    }

    pub fn len(&self) -> usize {
        self.lock_loaded().as_ref().map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wipe in-memory and persisted state
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.lock();
        let entries = guard.insert(HashMap::new());
        log::info!("Cleared recency data");
        self.persist(entries)
    }

    /// Drop the in-memory copy so the next access reloads from the store
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    fn score_entry(&self, entry: Option<&RecencyEntry>, now_ms: i64) -> SymbolScore {
        match entry {
            Some(entry) => SymbolScore {
                score: compute_score(entry, now_ms, &self.config),
                last_accessed: entry.last_accessed,
                access_count: entry.access_count,
            },
            None => SymbolScore::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<HashMap<String, RecencyEntry>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lock, loading from the store first if this is the first use
    fn lock_loaded(&self) -> MutexGuard<'_, Option<HashMap<String, RecencyEntry>>> {
        let mut guard = self.lock();
        if guard.is_none() {
            *guard = Some(self.load());
        }
        guard
    }

    fn load(&self) -> HashMap<String, RecencyEntry> {
        match self.store.get(STORE_KEY) {
            Ok(Some(value)) => decode_entries(value),
            Ok(None) => HashMap::new(),
            Err(e) => {
                log::warn!("Failed to load recency data, starting empty: {:#}", e);
                HashMap::new()
            }
        }
    }

    fn persist(&self, entries: &HashMap<String, RecencyEntry>) -> Result<()> {
        let value = serde_json::to_value(entries).context("Failed to serialize recency data")?;
        self.store
            .set(STORE_KEY, &value)
            .context("Failed to persist recency data")
    }
}

/// Decode a stored map, dropping entries that do not have the expected shape
fn decode_entries(value: serde_json::Value) -> HashMap<String, RecencyEntry> {
    let serde_json::Value::Object(map) = value else {
        log::warn!("Stored recency data is not a map, ignoring it");
        return HashMap::new();
    };

    let total = map.len();
    let entries: HashMap<String, RecencyEntry> = map
        .into_iter()
        .filter_map(|(key, raw)| serde_json::from_value(raw).ok().map(|entry| (key, entry)))
        .collect();

    if entries.len() < total {
        log::warn!("Dropped {} malformed recency entries", total - entries.len());
    }
    entries
}

/// Remove the globally oldest entries until `cap` remain; returns how many went
fn evict_oldest(entries: &mut HashMap<String, RecencyEntry>, cap: usize) -> usize {
    if entries.len() <= cap {
        return 0;
    }

    let excess = entries.len() - cap;
    let mut by_age: Vec<(i64, String)> = entries
        .iter()
        .map(|(key, entry)| (entry.last_accessed, key.clone()))
        .collect();
    by_age.sort();

    for (_, key) in by_age.into_iter().take(excess) {
        entries.remove(&key);
    }
    excess
}
