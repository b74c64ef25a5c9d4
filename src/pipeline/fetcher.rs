//! Per-day fetch loop: weekday filter → checkpoint skip → retried request →
//! append, with pacing between dates and a consecutive-failure guardrail.

use crate::config::ScraperConfig;
use crate::error::StoreError;
use crate::scraper::retry::{Pacing, RetryPolicy};
use crate::scraper::{DaySummary, SummarySource};
use crate::storage::DailyStore;
use crate::utils::weekdays;
use chrono::NaiveDate;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub retry: RetryPolicy,
    pub pacing: Pacing,
    pub max_consecutive_failures: u32,
}

impl From<&ScraperConfig> for FetchOptions {
    fn from(cfg: &ScraperConfig) -> Self {
        Self {
            retry: RetryPolicy::fixed(cfg.max_attempts, cfg.retry_delay()),
            pacing: Pacing::between(
                Duration::from_millis(cfg.min_delay_ms),
                Duration::from_millis(cfg.max_delay_ms),
            ),
            max_consecutive_failures: cfg.max_consecutive_failures,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Dates a request was issued for.
    pub attempted: usize,
    /// Dates already in the checkpoint.
    pub skipped: usize,
    pub days_written: usize,
    pub records: usize,
    /// Holidays / empty sessions.
    pub closed: usize,
    pub failed: usize,
    /// Stopped by the consecutive-failure guardrail.
    pub aborted: bool,
    /// Stopped by a shutdown signal.
    pub interrupted: bool,
}

pub struct Fetcher<'a, S: SummarySource> {
    source: &'a S,
    opts: FetchOptions,
}

impl<'a, S: SummarySource> Fetcher<'a, S> {
    pub fn new(source: &'a S, opts: FetchOptions) -> Self {
        Self { source, opts }
    }

    /// Walk `[start, end]` and append every new trading day to `store`.
    ///
    /// Each completed day is flushed before the next request, so stopping
    /// early (guardrail or `shutdown`) loses nothing already fetched. Only
    /// store failures are returned as errors.
    pub async fn run(
        &self,
        store: &mut DailyStore,
        start: NaiveDate,
        end: NaiveDate,
        shutdown: impl Future<Output = ()>,
    ) -> Result<FetchStats, StoreError> {
        tokio::pin!(shutdown);

        let mut stats = FetchStats::default();
        let mut consecutive_failures = 0u32;
        info!("Target: {} to {}", start, end);

        for date in weekdays(start, end) {
            if store.checkpoint().contains(date) {
                stats.skipped += 1;
                continue;
            }

            stats.attempted += 1;
            let label = date.to_string();
            let attempt = self
                .opts
                .retry
                .run(&label, || self.source.fetch_summary(date));

            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Interrupted while fetching {}; {} days saved", date, stats.days_written);
                    stats.interrupted = true;
                    break;
                }
                res = attempt => res,
            };

            match outcome {
                Ok(DaySummary::Records(records)) => {
                    let n = store.append(date, &records)?;
                    info!("{}: {} records", date, n);
                    stats.days_written += 1;
                    stats.records += n;
                    consecutive_failures = 0;
                }
                Ok(DaySummary::Closed) => {
                    info!("{}: no data (holiday or closed)", date);
                    stats.closed += 1;
                    consecutive_failures = 0;
                }
                Err(e) => {
                    warn!(
                        "{}: failed after {} attempts: {}",
                        date,
                        self.opts.retry.max_attempts(),
                        e
                    );
                    stats.failed += 1;
                    consecutive_failures += 1;
                    if consecutive_failures >= self.opts.max_consecutive_failures {
                        error!(
                            "{} consecutive failures, stopping (last date tried: {})",
                            consecutive_failures, date
                        );
                        stats.aborted = true;
                        break;
                    }
                }
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Interrupted; {} days saved", stats.days_written);
                    stats.interrupted = true;
                    break;
                }
                _ = self.opts.pacing.pause() => {}
            }
        }

        debug!("Fetch loop finished: {:?}", stats);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::models::DailyRecord;
    use crate::storage::tests::record;
    use async_trait::async_trait;
    use chrono::{Datelike, Weekday};
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    type Reply = Result<DaySummary, FetchError>;

    /// Replies per date, consumed in order; unscripted dates fail.
    #[derive(Default)]
    struct ScriptedSource {
        replies: Mutex<HashMap<NaiveDate, VecDeque<Reply>>>,
        calls: Mutex<Vec<NaiveDate>>,
        /// Signalled each time a day with records is served.
        served: Notify,
    }

    impl ScriptedSource {
        fn script(self, date: NaiveDate, replies: Vec<Reply>) -> Self {
            self.replies.lock().unwrap().insert(date, replies.into());
            self
        }

        fn calls(&self) -> Vec<NaiveDate> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SummarySource for ScriptedSource {
        async fn fetch_summary(&self, date: NaiveDate) -> Result<DaySummary, FetchError> {
            self.calls.lock().unwrap().push(date);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .get_mut(&date)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Err(FetchError::Status { status: 503 }));
            if let Ok(DaySummary::Records(_)) = &reply {
                self.served.notify_one();
            }
            reply
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn opts() -> FetchOptions {
        FetchOptions {
            retry: RetryPolicy::fixed(3, Duration::ZERO),
            pacing: Pacing::none(),
            max_consecutive_failures: 5,
        }
    }

    fn day(date: NaiveDate, codes: &[&str]) -> Reply {
        Ok(DaySummary::Records(
            codes.iter().map(|c| record(c, date, 100.0)).collect(),
        ))
    }

    fn stored(store: &DailyStore) -> Vec<DailyRecord> {
        let mut rdr = csv::Reader::from_path(store.path()).unwrap();
        rdr.deserialize().map(Result::unwrap).collect()
    }

    #[tokio::test]
    async fn weekends_are_never_requested() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DailyStore::open(&dir.path().join("idx_daily.csv")).unwrap();
        let source = (1..=14).fold(ScriptedSource::default(), |s, n| {
            s.script(d(n), vec![Ok(DaySummary::Closed)])
        });

        let stats = Fetcher::new(&source, opts())
            .run(&mut store, d(1), d(14), std::future::pending())
            .await
            .unwrap();

        let calls = source.calls();
        assert_eq!(calls.len(), 10);
        assert!(
            calls
                .iter()
                .all(|c| !matches!(c.weekday(), Weekday::Sat | Weekday::Sun))
        );
        assert_eq!(stats.closed, 10);
    }

    #[tokio::test]
    async fn checkpointed_dates_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idx_daily.csv");
        {
            let mut store = DailyStore::open(&path).unwrap();
            store.append(d(2), &[record("BBCA", d(2), 100.0)]).unwrap();
            store.append(d(3), &[record("BBCA", d(3), 101.0)]).unwrap();
        }

        let mut store = DailyStore::open(&path).unwrap();
        let source = ScriptedSource::default()
            .script(d(4), vec![day(d(4), &["BBCA"])])
            .script(d(5), vec![day(d(5), &["BBCA"])]);

        let stats = Fetcher::new(&source, opts())
            .run(&mut store, d(1), d(5), std::future::pending())
            .await
            .unwrap();

        // Monday 1st is requested (nothing stored), 2nd and 3rd are not
        assert_eq!(source.calls(), vec![d(1), d(1), d(1), d(4), d(5)]);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.days_written, 2);
        assert_eq!(stored(&store).len(), 4);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DailyStore::open(&dir.path().join("idx_daily.csv")).unwrap();
        let source = ScriptedSource::default().script(
            d(2),
            vec![
                Err(FetchError::Timeout),
                Err(FetchError::Network("connection reset".into())),
                day(d(2), &["BBCA", "TLKM"]),
            ],
        );

        let stats = Fetcher::new(&source, opts())
            .run(&mut store, d(2), d(2), std::future::pending())
            .await
            .unwrap();

        assert_eq!(source.calls().len(), 3);
        assert_eq!(stats.records, 2);
        assert_eq!(stats.failed, 0);
        assert!(store.checkpoint().contains(d(2)));
    }

    #[tokio::test]
    async fn guardrail_stops_after_five_failed_days() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DailyStore::open(&dir.path().join("idx_daily.csv")).unwrap();
        // Tue 2nd succeeds, everything after fails
        let source = ScriptedSource::default().script(d(2), vec![day(d(2), &["BBCA", "TLKM"])]);

        let stats = Fetcher::new(&source, opts())
            .run(&mut store, d(2), d(31), std::future::pending())
            .await
            .unwrap();

        assert!(stats.aborted);
        assert_eq!(stats.failed, 5);
        // 1 success + 5 failed days × 3 attempts; 3rd..9th weekdays only
        assert_eq!(source.calls().len(), 1 + 5 * 3);
        assert_eq!(source.calls().last(), Some(&d(9)));

        let rows = stored(&store);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.date == d(2)));
    }

    #[tokio::test]
    async fn closed_day_resets_failure_counter() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DailyStore::open(&dir.path().join("idx_daily.csv")).unwrap();
        // 2nd..5th fail, 8th closed, 9th..12th fail: never five in a row
        let source = ScriptedSource::default().script(d(8), vec![Ok(DaySummary::Closed)]);

        let stats = Fetcher::new(&source, opts())
            .run(&mut store, d(2), d(12), std::future::pending())
            .await
            .unwrap();

        assert!(!stats.aborted);
        assert_eq!(stats.failed, 8);
        assert_eq!(stats.closed, 1);
    }

    #[tokio::test]
    async fn shutdown_before_first_request_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DailyStore::open(&dir.path().join("idx_daily.csv")).unwrap();
        let source = ScriptedSource::default();

        let stats = Fetcher::new(&source, opts())
            .run(&mut store, d(2), d(31), std::future::ready(()))
            .await
            .unwrap();

        assert!(stats.interrupted);
        assert_eq!(stats.days_written, 0);
        assert!(source.calls().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn shutdown_after_a_saved_day_keeps_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DailyStore::open(&dir.path().join("idx_daily.csv")).unwrap();
        let source = ScriptedSource::default()
            .script(d(2), vec![day(d(2), &["BBCA", "TLKM"])])
            .script(d(3), vec![day(d(3), &["BBCA"])]);

        let stats = Fetcher::new(&source, opts())
            .run(&mut store, d(2), d(5), source.served.notified())
            .await
            .unwrap();

        assert!(stats.interrupted);
        assert_eq!(stats.days_written, 1);
        assert_eq!(stats.records, 2);
        assert_eq!(source.calls(), vec![d(2)]);

        let rows = stored(&store);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.date == d(2)));
        assert!(store.checkpoint().contains(d(2)));
        assert!(!store.checkpoint().contains(d(3)));
    }

    #[test]
    fn options_follow_config() {
        let opts = FetchOptions::from(&ScraperConfig::default());
        assert_eq!(opts.retry, RetryPolicy::fixed(3, Duration::from_secs(2)));
        assert_eq!(
            opts.pacing,
            Pacing::between(Duration::from_secs(1), Duration::from_secs(3))
        );
        assert_eq!(opts.max_consecutive_failures, 5);
    }

    #[test]
    fn runs_on_a_plain_executor() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DailyStore::open(&dir.path().join("idx_daily.csv")).unwrap();
        let source = ScriptedSource::default().script(d(2), vec![day(d(2), &["ASII"])]);

        let stats = tokio_test::block_on(Fetcher::new(&source, opts()).run(
            &mut store,
            d(2),
            d(2),
            std::future::pending(),
        ))
        .unwrap();
        assert_eq!(stats.records, 1);
    }
}
