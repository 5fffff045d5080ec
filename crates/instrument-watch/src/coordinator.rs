//! Per-ticker cache and refresh coordinator
//!
//! [`InstrumentCoordinator`] is the single entry point for instrument data.
//! A miss classifies the ticker, builds a complete record, generates the
//! first analysis and registers the news and sentiment refresh jobs. A hit
//! serves the cached entry, regenerating the analysis first when it is older
//! than the staleness threshold.
//!
//! Locking:
//! - the cache map is guarded by one `RwLock` and only held to look up or
//!   insert a slot;
//! - each slot is a `OnceCell`, so concurrent misses for one ticker share a
//!   single build;
//! - entry state has its own `RwLock`, never held across a network call;
//! - a per-entry mutex serialises regenerations.

use crate::analysis::AnalysisGenerator;
use crate::builder::build_record;
use crate::classifier::classify;
use crate::config::WatchConfig;
use crate::error::{Result, WatchError};
use crate::fingerprint::Fingerprint;
use crate::news::NewsFeed;
use crate::provider::DataProvider;
use crate::record::{InstrumentRecord, NewsBundle, Section};
use crate::scheduler::{JobId, JobKind, JobScheduler};
use crate::ticker::{InstrumentKind, Ticker};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{debug, info, warn};

/// Result of one in-place refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fetched, but nothing observable changed
    Unchanged,
    /// Fetched and replaced the section
    Changed,
    /// Fetch failed; previous section kept
    Failed,
    /// Ticker is not cached
    UnknownTicker,
}

/// What callers of [`InstrumentCoordinator::get_or_create`] receive
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentView {
    pub ticker: Ticker,
    pub kind: InstrumentKind,
    pub record: InstrumentRecord,
    pub analysis: String,
    pub analysis_generated_at: DateTime<Utc>,
    /// Served from the cache rather than built by this call
    pub cached: bool,
}

struct EntryState {
    record: InstrumentRecord,
    analysis: String,
    analysis_generated_at: DateTime<Utc>,
    fingerprint: Fingerprint,
}

struct CacheEntry {
    state: RwLock<EntryState>,
    regenerating: Mutex<()>,
}

impl CacheEntry {
    fn new(record: InstrumentRecord, analysis: String, fingerprint: Fingerprint) -> Self {
        Self {
            state: RwLock::new(EntryState {
                record,
                analysis,
                analysis_generated_at: Utc::now(),
                fingerprint,
            }),
            regenerating: Mutex::new(()),
        }
    }

    async fn view(&self, cached: bool) -> InstrumentView {
        let state = self.state.read().await;
        InstrumentView {
            ticker: state.record.ticker.clone(),
            kind: state.record.kind,
            record: state.record.clone(),
            analysis: state.analysis.clone(),
            analysis_generated_at: state.analysis_generated_at,
            cached,
        }
    }

    async fn is_stale(&self, threshold: std::time::Duration) -> bool {
        let generated_at = self.state.read().await.analysis_generated_at;
        (Utc::now() - generated_at)
            .to_std()
            .is_ok_and(|age| age > threshold)
    }
}

type Slot = Arc<OnceCell<Arc<CacheEntry>>>;

struct Inner {
    config: WatchConfig,
    provider: Arc<dyn DataProvider>,
    news: Arc<dyn NewsFeed>,
    generator: Arc<dyn AnalysisGenerator>,
    entries: RwLock<HashMap<Ticker, Slot>>,
    scheduler: JobScheduler,
}

impl Inner {
    async fn slot(&self, ticker: &Ticker) -> Slot {
        if let Some(slot) = self.entries.read().await.get(ticker) {
            return Arc::clone(slot);
        }
        let mut entries = self.entries.write().await;
        Arc::clone(entries.entry(ticker.clone()).or_default())
    }

    async fn entry(&self, ticker: &Ticker) -> Option<Arc<CacheEntry>> {
        self.entries
            .read()
            .await
            .get(ticker)
            .and_then(|slot| slot.get().cloned())
    }

    async fn build_entry(&self, ticker: &Ticker) -> Arc<CacheEntry> {
        info!(ticker = %ticker, "Cache miss, building record");

        let kind = classify(self.provider.as_ref(), ticker).await;
        let record = build_record(self.provider.as_ref(), self.news.as_ref(), ticker, kind).await;

        let analysis = match self.generator.generate(&record).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(ticker = %ticker, "Initial analysis came back empty");
                "Error generating analysis: empty response".to_string()
            }
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "Initial analysis failed");
                format!("Error generating analysis: {e}")
            }
        };

        let fingerprint = Fingerprint::of_text(record.news_text(), self.config.fingerprint_window);
        Arc::new(CacheEntry::new(record, analysis, fingerprint))
    }

    /// Generate from a copy of the current record and swap the text in
    ///
    /// Returns whether the analysis was replaced. Callers hold the entry's
    /// regeneration mutex.
    async fn regenerate(&self, ticker: &Ticker, entry: &CacheEntry) -> bool {
        let record = entry.state.read().await.record.clone();

        match self.generator.generate(&record).await {
            Ok(text) if !text.trim().is_empty() => {
                let mut state = entry.state.write().await;
                state.analysis = text;
                state.analysis_generated_at = Utc::now();
                info!(ticker = %ticker, "Analysis regenerated");
                true
            }
            Ok(_) => {
                warn!(ticker = %ticker, "Regenerated analysis was empty, keeping previous text");
                false
            }
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "Regeneration failed, keeping previous text");
                false
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}

/// Shared handle to the instrument cache and its background jobs
///
/// Clones share one cache. Background jobs hold only a weak reference, so
/// dropping the last handle stops them.
#[derive(Clone)]
pub struct InstrumentCoordinator {
    inner: Arc<Inner>,
}

impl InstrumentCoordinator {
    pub fn new(
        config: WatchConfig,
        provider: Arc<dyn DataProvider>,
        news: Arc<dyn NewsFeed>,
        generator: Arc<dyn AnalysisGenerator>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                provider,
                news,
                generator,
                entries: RwLock::new(HashMap::new()),
                scheduler: JobScheduler::new(),
            }),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.inner.config
    }

    /// Cached view of `ticker`, building it on first request
    ///
    /// Only an unparseable symbol is an error. Every fetch failure is
    /// absorbed into the record, and a failed first analysis is returned as
    /// error text in the analysis field.
    pub async fn get_or_create(&self, raw: &str) -> Result<InstrumentView> {
        let ticker = Ticker::parse(raw)?;
        let slot = self.inner.slot(&ticker).await;

        let mut created = false;
        let entry = {
            let created_ref = &mut created;
            let inner = &self.inner;
            let ticker = &ticker;
            Arc::clone(
                slot.get_or_init(|| async move {
                    *created_ref = true;
                    inner.build_entry(ticker).await
                })
                .await,
            )
        };

        if created {
            self.register_jobs(&ticker);
            return Ok(entry.view(false).await);
        }

        debug!(ticker = %ticker, "Cache hit");
        self.refresh_if_stale(&ticker, &entry).await;
        Ok(entry.view(true).await)
    }

    /// Cached view without building; `None` when not cached
    pub async fn peek(&self, raw: &str) -> Option<InstrumentView> {
        let ticker = Ticker::parse(raw).ok()?;
        let entry = self.inner.entry(&ticker).await?;
        Some(entry.view(true).await)
    }

    /// News for `raw`: the cached section if present, otherwise a direct fetch
    ///
    /// A direct fetch does not create a cache entry.
    pub async fn news(&self, raw: &str) -> Result<NewsBundle> {
        let ticker = Ticker::parse(raw)?;
        let Some(entry) = self.inner.entry(&ticker).await else {
            return self.inner.news.fetch(&ticker).await;
        };

        let state = entry.state.read().await;
        match &state.record.news {
            Section::Available(bundle) => Ok(bundle.clone()),
            Section::Unavailable { reason } => Err(WatchError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: reason.clone(),
            }),
            Section::NotApplicable => Err(WatchError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: "news not applicable".to_string(),
            }),
        }
    }

    /// Cached tickers, sorted
    pub async fn tickers(&self) -> Vec<Ticker> {
        let mut tickers: Vec<Ticker> = self
            .inner
            .entries
            .read()
            .await
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(ticker, _)| ticker.clone())
            .collect();
        tickers.sort();
        tickers
    }

    /// Number of cached tickers
    pub async fn len(&self) -> usize {
        self.inner
            .entries
            .read()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Registered recurring jobs, sorted
    pub fn scheduled_jobs(&self) -> Vec<JobId> {
        self.inner.scheduler.job_ids()
    }

    /// Stop every recurring job; cached data stays readable
    ///
    /// Tickers cached afterwards get no refresh jobs.
    pub fn shutdown(&self) {
        self.inner.scheduler.shutdown();
    }

    /// Re-fetch the news section of a cached ticker
    ///
    /// On success the section is replaced and the fingerprint recomputed;
    /// when it differs a background regeneration is started. A failed fetch,
    /// or an empty one while articles are cached, leaves the entry untouched.
    pub async fn run_news_refresh(&self, ticker: &Ticker) -> RefreshOutcome {
        let Some(entry) = self.inner.entry(ticker).await else {
            return RefreshOutcome::UnknownTicker;
        };

        let bundle = match self.inner.news.fetch(ticker).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "News refresh failed, keeping previous news");
                return RefreshOutcome::Failed;
            }
        };

        let changed = {
            let mut state = entry.state.write().await;
            let has_articles = state
                .record
                .news
                .available()
                .is_some_and(|news| !news.articles.is_empty());
            if bundle.articles.is_empty() && has_articles {
                debug!(ticker = %ticker, "News refresh came back empty, keeping previous news");
                return RefreshOutcome::Unchanged;
            }
            state.record.news = Section::Available(bundle);
            let fingerprint =
                Fingerprint::of_text(state.record.news_text(), self.inner.config.fingerprint_window);
            if fingerprint == state.fingerprint {
                false
            } else {
                state.fingerprint = fingerprint;
                true
            }
        };

        if changed {
            info!(ticker = %ticker, "News changed, scheduling regeneration");
            self.spawn_regeneration(ticker);
            RefreshOutcome::Changed
        } else {
            debug!(ticker = %ticker, "News unchanged");
            RefreshOutcome::Unchanged
        }
    }

    /// Re-fetch the sentiment section of a cached ticker
    ///
    /// An empty message stream does not replace a populated snapshot.
    pub async fn run_sentiment_refresh(&self, ticker: &Ticker) -> RefreshOutcome {
        let Some(entry) = self.inner.entry(ticker).await else {
            return RefreshOutcome::UnknownTicker;
        };

        let snapshot = match self.inner.provider.sentiment(ticker).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "Sentiment refresh failed, keeping previous sentiment");
                return RefreshOutcome::Failed;
            }
        };

        let mut state = entry.state.write().await;
        let cached = state.record.sentiment.available();
        if cached == Some(&snapshot) {
            return RefreshOutcome::Unchanged;
        }
        if snapshot.messages.is_empty() && cached.is_some_and(|c| !c.messages.is_empty()) {
            debug!(ticker = %ticker, "Sentiment refresh came back empty, keeping previous sentiment");
            return RefreshOutcome::Unchanged;
        }
        state.record.sentiment = Section::Available(snapshot);
        debug!(ticker = %ticker, "Sentiment updated");
        RefreshOutcome::Changed
    }

    /// Regenerate the analysis of a cached ticker from its current record
    ///
    /// Returns whether the analysis was replaced; on failure the previous
    /// text stays.
    pub async fn regenerate_analysis(&self, ticker: &Ticker) -> bool {
        let Some(entry) = self.inner.entry(ticker).await else {
            return false;
        };
        let _guard = entry.regenerating.lock().await;
        self.inner.regenerate(ticker, &entry).await
    }

    async fn refresh_if_stale(&self, ticker: &Ticker, entry: &CacheEntry) {
        let threshold = self.inner.config.stale_threshold;
        if !entry.is_stale(threshold).await {
            return;
        }

        let _guard = entry.regenerating.lock().await;
        // Another caller may have regenerated while we waited
        if !entry.is_stale(threshold).await {
            return;
        }
        info!(ticker = %ticker, "Analysis is stale, regenerating");
        self.inner.regenerate(ticker, entry).await;
    }

    fn spawn_regeneration(&self, ticker: &Ticker) {
        let this = self.clone();
        let ticker = ticker.clone();
        let label = format!("{ticker}_regenerate");
        self.inner.scheduler.run_once(&label, async move {
            this.regenerate_analysis(&ticker).await;
        });
    }

    fn register_jobs(&self, ticker: &Ticker) {
        let config = &self.inner.config;

        let weak = Arc::downgrade(&self.inner);
        let job_ticker = ticker.clone();
        self.inner.scheduler.schedule_every(
            JobId::new(ticker.clone(), JobKind::News),
            config.news_refresh_interval,
            move || {
                let (weak, ticker) = (Weak::clone(&weak), job_ticker.clone());
                async move {
                    if let Some(inner) = weak.upgrade() {
                        InstrumentCoordinator { inner }.run_news_refresh(&ticker).await;
                    }
                }
            },
        );

        let weak = Arc::downgrade(&self.inner);
        let job_ticker = ticker.clone();
        self.inner.scheduler.schedule_every(
            JobId::new(ticker.clone(), JobKind::Sentiment),
            config.sentiment_refresh_interval,
            move || {
                let (weak, ticker) = (Weak::clone(&weak), job_ticker.clone());
                async move {
                    if let Some(inner) = weak.upgrade() {
                        InstrumentCoordinator { inner }.run_sentiment_refresh(&ticker).await;
                    }
                }
            },
        );
    }
}
