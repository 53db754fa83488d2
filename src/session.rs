//! Stale-while-revalidate search sessions
//!
//! [`SymbolSearch`] owns the long-lived pieces (extractor, recency engine,
//! result cache, ranker). Opening a [`SearchSession`] serves the last cached
//! list for its (kind, root) immediately, rescored against current recency,
//! and starts a background scan. The scan always updates the cache; the
//! session picks up the fresh list through a one-shot channel only while it
//! is still open.
//!
//! ```text
//! (no cache)  Loading ──fresh──▶ Ready
//! (cached)    Revalidating ──fresh──▶ Ready
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::dedup::dedup;
use crate::extractor::SymbolExtractor;
use crate::models::{KindFilter, NavigationTarget, RankedItem};
use crate::ranker::{NucleoMatcher, Ranker, rank_by_recency, sort_items};
use crate::recency::RecencyEngine;
use crate::result_cache::{MemoryResultCache, ResultCache, cache_key};
use crate::search_tool::select_backend;
use crate::store::KeyValueStore;

/// Where a session is in its refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    /// Nothing cached yet; waiting on the first scan
    Loading,
    /// Showing a cached list while a fresh scan runs
    Revalidating,
    /// Showing the latest scan
    Ready,
}

/// Symbol search service shared by every session
#[derive(Clone)]
pub struct SymbolSearch {
    extractor: Arc<SymbolExtractor>,
    recency: Arc<RecencyEngine>,
    cache: Arc<dyn ResultCache>,
    ranker: Arc<Ranker>,
}

impl SymbolSearch {
    pub fn new(
        extractor: Arc<SymbolExtractor>,
        recency: Arc<RecencyEngine>,
        cache: Arc<dyn ResultCache>,
        ranker: Arc<Ranker>,
    ) -> Self {
        Self {
            extractor,
            recency,
            cache,
            ranker,
        }
    }

    /// Wire up the default components from config
    pub fn from_config(config: &Config, store: Arc<dyn KeyValueStore>) -> Self {
        let catalog = Catalog::with_user_rules(&config.patterns);
        log::debug!("Loaded pattern catalog with {} rules", catalog.len());

        let extractor = SymbolExtractor::new(Arc::new(catalog), select_backend(&config.search))
            .with_max_concurrency(config.search.max_concurrency);
        let recency = RecencyEngine::new(store, config.recency.clone());
        let ranker = Ranker::new(Arc::new(NucleoMatcher), config.ranking.clone());

        Self::new(
            Arc::new(extractor),
            Arc::new(recency),
            Arc::new(MemoryResultCache::new()),
            Arc::new(ranker),
        )
    }

    pub fn recency(&self) -> &RecencyEngine {
        &self.recency
    }

    pub fn ranker(&self) -> &Ranker {
        &self.ranker
    }

    /// Full scan: extract, dedup, score, sort; the cache entry is replaced
    pub async fn refresh(&self, filter: KindFilter, root: &Path) -> Result<Vec<RankedItem>> {
        ensure_workspace(root)?;
        let items = scan(&self.extractor, &self.recency, filter, root).await?;
        self.cache.set(&cache_key(filter, root), items.clone());
        Ok(items)
    }

    /// Open a session for `filter` under `root`
    ///
    /// Must be called from within a tokio runtime: the fresh scan runs as a
    /// spawned task.
    pub fn open(&self, filter: KindFilter, root: &Path) -> Result<SearchSession> {
        ensure_workspace(root)?;
        let key = cache_key(filter, root);

        let (state, base) = match self.cache.get(&key) {
            Some(stale) => {
                let occurrences = stale.into_iter().map(|item| item.occurrence);
                (SessionState::Revalidating, rank_by_recency(occurrences, &self.recency))
            }
            None => (SessionState::Loading, Vec::new()),
        };

        let (tx, rx) = oneshot::channel();
        let extractor = Arc::clone(&self.extractor);
        let recency = Arc::clone(&self.recency);
        let cache = Arc::clone(&self.cache);
        let task_root = root.to_path_buf();

        tokio::spawn(async move {
            let items = match scan(&extractor, &recency, filter, &task_root).await {
                Ok(items) => items,
                Err(e) => {
                    log::warn!("Background refresh for {} failed: {:#}", key, e);
                    return;
                }
            };
            cache.set(&key, items.clone());
            if tx.send(items).is_err() {
                log::debug!("Session for {} closed before refresh finished", key);
            }
        });

        log::debug!("Opened {} session under {} ({})", filter, root.display(), state);
        Ok(SearchSession {
            filter,
            root: root.to_path_buf(),
            state,
            visible: base.clone(),
            base,
            query: String::new(),
            fresh: Some(rx),
            recency: Arc::clone(&self.recency),
            ranker: Arc::clone(&self.ranker),
        })
    }
}

fn ensure_workspace(root: &Path) -> Result<()> {
    if !root.is_dir() {
        anyhow::bail!("No workspace folder at {}", root.display());
    }
    Ok(())
}

async fn scan(
    extractor: &SymbolExtractor,
    recency: &Arc<RecencyEngine>,
    filter: KindFilter,
    root: &Path,
) -> Result<Vec<RankedItem>> {
    let start = std::time::Instant::now();
    let occurrences = dedup(extractor.extract(filter, root).await);

    // Scoring may load recency from the store on first use
    let recency = Arc::clone(recency);
    let items = tokio::task::spawn_blocking(move || rank_by_recency(occurrences, &recency))
        .await
        .context("Recency scoring task failed")?;
    log::info!(
        "Scanned {} {} symbols under {} in {:?}",
        items.len(),
        filter,
        root.display(),
        start.elapsed()
    );
    Ok(items)
}

/// One open picker over a (kind, root) result list
pub struct SearchSession {
    filter: KindFilter,
    root: PathBuf,
    state: SessionState,
    /// Recency-sorted list the filter runs against
    base: Vec<RankedItem>,
    /// What the consumer is shown
    visible: Vec<RankedItem>,
    query: String,
    fresh: Option<oneshot::Receiver<Vec<RankedItem>>>,
    recency: Arc<RecencyEngine>,
    ranker: Arc<Ranker>,
}

impl SearchSession {
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while a fresh scan is still pending
    pub fn is_busy(&self) -> bool {
        self.fresh.is_some()
    }

    pub fn filter(&self) -> KindFilter {
        self.filter
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn items(&self) -> &[RankedItem] {
        &self.visible
    }

    /// Change the filter string and recompute the visible list
    pub fn set_query(&mut self, query: &str) -> &[RankedItem] {
        self.query = query.to_string();
        self.visible = self.ranker.filter(&self.base, &self.query);
        &self.visible
    }

    /// Apply the fresh scan if it has arrived, without waiting
    pub fn poll_refresh(&mut self) -> bool {
        let Some(rx) = self.fresh.as_mut() else {
            return false;
        };

        match rx.try_recv() {
            Ok(items) => {
                self.fresh = None;
                self.apply_fresh(items);
                true
            }
            Err(oneshot::error::TryRecvError::Empty) => false,
            Err(oneshot::error::TryRecvError::Closed) => {
                log::warn!("Background refresh ended without a result");
                self.fresh = None;
                self.state = SessionState::Ready;
                false
            }
        }
    }

    /// Wait for the fresh scan and apply it
    ///
    /// Returns false if there was nothing pending. Cancel safe: dropping
    /// the future keeps the pending scan attached to the session.
    pub async fn wait_refresh(&mut self) -> bool {
        let Some(rx) = self.fresh.as_mut() else {
            return false;
        };

        let received = rx.await;
        self.fresh = None;
        match received {
            Ok(items) => {
                self.apply_fresh(items);
                true
            }
            Err(_) => {
                log::warn!("Background refresh ended without a result");
                self.state = SessionState::Ready;
                false
            }
        }
    }

    fn apply_fresh(&mut self, items: Vec<RankedItem>) {
        // Scores may have moved while the scan ran
        let mut base: Vec<RankedItem> = items;
        let keys: Vec<String> = base.iter().map(|i| i.occurrence.recency_key()).collect();
        let scores = self.recency.get_scores(&keys);
        for (item, key) in base.iter_mut().zip(&keys) {
            item.score = scores.get(key).map_or(0.0, |s| s.score);
        }
        sort_items(&mut base);

        self.base = base;
        if self.query.trim().is_empty() {
            self.visible = self.base.clone();
        } else {
            log::debug!("Fresh results held back while filter '{}' is showing", self.query);
        }
        self.state = SessionState::Ready;
    }

    /// Accept the visible item at `index`
    ///
    /// Records a recency access for the symbol and returns where to go.
    /// A failed store write is logged; navigation still proceeds.
    pub fn accept(&mut self, index: usize) -> Result<NavigationTarget> {
        let item = self
            .visible
            .get(index)
            .with_context(|| format!("No result at position {} ({} shown)", index, self.visible.len()))?;
        let occurrence = &item.occurrence;

        if let Err(e) = self.recency.record_access(&occurrence.path, Some(&occurrence.name)) {
            log::warn!("Failed to persist recency for {}: {:#}", occurrence.recency_key(), e);
        }

        Ok(NavigationTarget {
            path: self.root.join(&occurrence.path),
            line: occurrence.line,
            start_col: occurrence.start_col,
            end_col: occurrence.end_col,
        })
    }

    /// Stop listening for the background scan
    ///
    /// The scan still finishes and updates the shared cache.
    pub fn close(&mut self) {
        self.fresh = None;
        self.state = SessionState::Ready;
        self.base.clear();
        self.visible.clear();
    }
}
