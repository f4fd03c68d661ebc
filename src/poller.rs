use std::time::Duration;

use log::{info, warn};
use tokio::time;

use crate::{
    error::{Error, Result},
    scan::ScanSource,
    tracker::{BatchSummary, Tracker},
};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    /// A scan that has not answered after this long counts as failed.
    pub scan_timeout: Duration,
    pub max_backoff: Duration,
    /// Stop after this many successful passes.
    pub max_passes: Option<u64>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            scan_timeout: Duration::from_millis(5000),
            max_backoff: Duration::from_millis(30_000),
            max_passes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub passes: u64,
    pub failures: u64,
    pub new: usize,
    pub updated: usize,
}

/// Delay before the next poll: the interval while scans succeed, doubling
/// with every consecutive failure up to `max`.
#[derive(Debug)]
struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: 0,
        }
    }

    fn succeeded(&mut self) -> Duration {
        self.failures = 0;
        self.base
    }

    fn failed(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let factor = 1u32 << self.failures.min(16);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// One scan and record pass.
pub async fn poll_once<S: ScanSource>(
    source: &mut S,
    tracker: &mut Tracker,
    scan_timeout: Duration,
) -> Result<Option<BatchSummary>> {
    let batch = time::timeout(scan_timeout, source.scan())
        .await
        .map_err(|_| Error::ScanTimeout(scan_timeout.as_millis() as u64))??;
    Ok(batch.map(|readings| tracker.record_batch(&readings)))
}

/// Polls `source` until it is exhausted or `max_passes` is reached.
///
/// Passes never overlap: the next one is scheduled only once the previous
/// pass has finished. A failed or timed out scan skips that pass.
pub async fn run<S, F>(
    source: &mut S,
    tracker: &mut Tracker,
    config: &PollerConfig,
    mut on_pass: F,
) -> PollSummary
where
    S: ScanSource,
    F: FnMut(&Tracker, &BatchSummary),
{
    let mut summary = PollSummary::default();
    let mut backoff = Backoff::new(config.interval, config.max_backoff);

    loop {
        let delay = match poll_once(source, tracker, config.scan_timeout).await {
            Ok(Some(batch)) => {
                summary.passes += 1;
                summary.new += batch.new;
                summary.updated += batch.updated;
                on_pass(tracker, &batch);

                if config.max_passes.is_some_and(|x| summary.passes >= x) {
                    break;
                }
                backoff.succeeded()
            }
            Ok(None) => {
                info!("scan source exhausted");
                break;
            }
            Err(e) => {
                summary.failures += 1;
                let delay = backoff.failed();
                warn!("{e}, next poll in {}ms", delay.as_millis());
                delay
            }
        };
        time::sleep(delay).await;
    }

    summary
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::{
        first_seen::MemoryFirstSeenStore, model::RawReading, timestamp::testing::ManualClock,
    };

    enum Step {
        Batch(Vec<RawReading>),
        Fail,
        Hang,
    }

    struct Scripted(VecDeque<Step>);

    impl ScanSource for Scripted {
        async fn scan(&mut self) -> Result<Option<Vec<RawReading>>> {
            match self.0.pop_front() {
                Some(Step::Batch(x)) => Ok(Some(x)),
                Some(Step::Fail) => Err(Error::Scan("modem busy".to_owned())),
                Some(Step::Hang) => std::future::pending().await,
                None => Ok(None),
            }
        }
    }

    fn gsm(cid: i32) -> RawReading {
        RawReading::Gsm {
            cid,
            lac: 1,
            mcc: Some("262".into()),
            mnc: Some("01".into()),
            dbm: -80,
        }
    }

    fn tracker() -> Tracker {
        Tracker::new(
            Box::new(MemoryFirstSeenStore::default()),
            Box::new(ManualClock::new("2024-06-05T07:08:09+02:00")),
        )
    }

    fn fast() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(1),
            scan_timeout: Duration::from_millis(50),
            max_backoff: Duration::from_millis(4),
            max_passes: None,
        }
    }

    #[tokio::test]
    async fn failures_do_not_stop_polling() {
        let mut source = Scripted(VecDeque::from([
            Step::Batch(vec![gsm(1), gsm(2)]),
            Step::Fail,
            Step::Hang,
            Step::Batch(vec![gsm(2), gsm(3)]),
        ]));
        let mut tracker = tracker();
        let mut seen = Vec::new();

        let summary = run(&mut source, &mut tracker, &fast(), |t, _| {
            seen.push(t.registry().len())
        })
        .await;

        assert_eq!(
            summary,
            PollSummary {
                passes: 2,
                failures: 2,
                new: 3,
                updated: 1,
            }
        );
        assert_eq!(seen, [2, 3]);
    }

    #[tokio::test]
    async fn stops_after_max_passes() {
        let mut source = Scripted(VecDeque::from([
            Step::Batch(vec![gsm(1)]),
            Step::Batch(vec![gsm(1)]),
            Step::Batch(vec![gsm(1)]),
        ]));
        let mut tracker = tracker();
        let config = PollerConfig {
            max_passes: Some(2),
            ..fast()
        };

        let summary = run(&mut source, &mut tracker, &config, |_, _| {}).await;
        assert_eq!(summary.passes, 2);
        assert_eq!(source.0.len(), 1);
    }

    #[tokio::test]
    async fn hanging_scan_times_out() {
        let mut source = Scripted(VecDeque::from([Step::Hang]));
        let mut tracker = tracker();
        let result = poll_once(&mut source, &mut tracker, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::ScanTimeout(10))));
    }

    #[test]
    fn backoff_doubles_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(backoff.failed(), Duration::from_secs(2));
        assert_eq!(backoff.failed(), Duration::from_secs(4));
        assert_eq!(backoff.failed(), Duration::from_secs(5));
        assert_eq!(backoff.failed(), Duration::from_secs(5));
        assert_eq!(backoff.succeeded(), Duration::from_secs(1));
        assert_eq!(backoff.failed(), Duration::from_secs(2));
    }
}
