//! Local confirmation policies and the timeout wrapper for remote ones.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::domain::decision::{Action, ConfirmationRequest, Verdict};
use crate::domain::error::TurbotraderError;
use crate::ports::confirmation_port::ConfirmationPort;

/// Confirms every proposal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl ConfirmationPort for AlwaysConfirm {
    fn confirm(&self, _request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError> {
        Ok(Verdict::Confirm)
    }
}

/// Vetoes buys into an overbought market and sells into an oversold one,
/// judged on the mean raw RSI across scored timeframes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleConfirmation {
    pub rsi_ceiling: f64,
    pub rsi_floor: f64,
}

impl Default for RuleConfirmation {
    fn default() -> Self {
        RuleConfirmation {
            rsi_ceiling: 80.0,
            rsi_floor: 20.0,
        }
    }
}

impl ConfirmationPort for RuleConfirmation {
    fn confirm(&self, request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError> {
        let rsi = request.mean_rsi();
        let verdict = match request.proposed {
            Action::Buy if rsi > self.rsi_ceiling => Verdict::Reject,
            Action::Sell if rsi < self.rsi_floor => Verdict::Reject,
            _ => Verdict::Confirm,
        };
        tracing::debug!(asset = %request.asset, action = %request.proposed, rsi, ?verdict, "rule confirmation");
        Ok(verdict)
    }
}

type Reply = Result<Verdict, TurbotraderError>;
type Job = (ConfirmationRequest, mpsc::Sender<Reply>);

/// Runs the inner confirmation on a single long-lived worker thread and gives
/// up after `timeout`. A reply that arrives late is dropped.
///
/// The worker is started on first use and replaced if it dies. While it is
/// stuck on a slow request one more request may queue behind it; any further
/// request fails at once instead of starting another thread.
pub struct BoundedConfirmation {
    inner: Arc<dyn ConfirmationPort + Send + Sync>,
    timeout: Duration,
    worker: Mutex<Option<mpsc::SyncSender<Job>>>,
}

impl BoundedConfirmation {
    pub fn new(inner: Arc<dyn ConfirmationPort + Send + Sync>, timeout: Duration) -> Self {
        BoundedConfirmation {
            inner,
            timeout,
            worker: Mutex::new(None),
        }
    }

    fn spawn_worker(&self, asset: &str) -> Result<mpsc::SyncSender<Job>, TurbotraderError> {
        let (jobs, queue) = mpsc::sync_channel::<Job>(1);
        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name("confirmation-worker".into())
            .spawn(move || {
                for (request, reply) in queue {
                    let _ = reply.send(inner.confirm(&request));
                }
            })
            .map_err(|e| TurbotraderError::ConfirmationError {
                asset: asset.to_string(),
                reason: format!("failed to start confirmation worker: {e}"),
            })?;
        tracing::debug!("confirmation worker started");
        Ok(jobs)
    }

    fn submit(&self, mut job: Job) -> Result<(), TurbotraderError> {
        let asset = job.0.asset.clone();
        let mut worker = self.worker.lock();
        for _ in 0..2 {
            let jobs = match &*worker {
                Some(jobs) => jobs.clone(),
                None => {
                    let jobs = self.spawn_worker(&asset)?;
                    *worker = Some(jobs.clone());
                    jobs
                }
            };
            match jobs.try_send(job) {
                Ok(()) => return Ok(()),
                Err(mpsc::TrySendError::Full(_)) => {
                    return Err(TurbotraderError::ConfirmationError {
                        asset,
                        reason: "confirmation worker busy with an earlier request".into(),
                    });
                }
                Err(mpsc::TrySendError::Disconnected(returned)) => {
                    *worker = None;
                    job = returned;
                }
            }
        }
        Err(TurbotraderError::ConfirmationError {
            asset,
            reason: "confirmation worker exited before accepting the request".into(),
        })
    }
}

impl ConfirmationPort for BoundedConfirmation {
    fn confirm(&self, request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError> {
        let (reply, rx) = mpsc::channel();
        self.submit((request.clone(), reply))?;

        match rx.recv_timeout(self.timeout) {
            Ok(reply) => reply,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(TurbotraderError::ConfirmationTimeout {
                asset: request.asset.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                self.worker.lock().take();
                Err(TurbotraderError::ConfirmationError {
                    asset: request.asset.clone(),
                    reason: "confirmation worker exited without a reply".into(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorSet;
    use crate::domain::timeframe::Timeframe;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn request(proposed: Action, rsi: f64) -> ConfirmationRequest {
        ConfirmationRequest {
            asset: "BTCUSDT".into(),
            composite: if proposed == Action::Buy { 80.0 } else { 20.0 },
            proposed,
            indicators: vec![(
                Timeframe::H1,
                IndicatorSet {
                    momentum: 0.01,
                    volume_delta: 0.0,
                    rsi,
                    volatility: 0.01,
                },
            )],
            timeframe_scores: vec![(Timeframe::H1, 80.0)],
        }
    }

    struct Slow(Duration);

    impl ConfirmationPort for Slow {
        fn confirm(&self, _request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError> {
            thread::sleep(self.0);
            Ok(Verdict::Confirm)
        }
    }

    struct Panics;

    impl ConfirmationPort for Panics {
        fn confirm(&self, _request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError> {
            panic!("service crashed");
        }
    }

    #[derive(Default)]
    struct RecordsThread(Mutex<HashSet<thread::ThreadId>>);

    impl ConfirmationPort for RecordsThread {
        fn confirm(&self, _request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError> {
            self.0.lock().insert(thread::current().id());
            Ok(Verdict::Confirm)
        }
    }

    /// Panics on the first request only.
    #[derive(Default)]
    struct PanicsOnce(AtomicBool);

    impl ConfirmationPort for PanicsOnce {
        fn confirm(&self, _request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError> {
            if !self.0.swap(true, Ordering::SeqCst) {
                panic!("service crashed");
            }
            Ok(Verdict::Confirm)
        }
    }

    #[test]
    fn rule_vetoes_extremes() {
        let rule = RuleConfirmation::default();
        assert_eq!(rule.confirm(&request(Action::Buy, 85.0)).unwrap(), Verdict::Reject);
        assert_eq!(rule.confirm(&request(Action::Buy, 60.0)).unwrap(), Verdict::Confirm);
        assert_eq!(rule.confirm(&request(Action::Sell, 15.0)).unwrap(), Verdict::Reject);
        assert_eq!(rule.confirm(&request(Action::Sell, 40.0)).unwrap(), Verdict::Confirm);
    }

    #[test]
    fn always_confirms() {
        assert_eq!(AlwaysConfirm.confirm(&request(Action::Buy, 99.0)).unwrap(), Verdict::Confirm);
    }

    #[test]
    fn bounded_passes_fast_reply_through() {
        let bounded = BoundedConfirmation::new(
            Arc::new(RuleConfirmation::default()),
            Duration::from_secs(5),
        );
        assert_eq!(bounded.confirm(&request(Action::Buy, 90.0)).unwrap(), Verdict::Reject);
    }

    #[test]
    fn bounded_times_out() {
        let bounded = BoundedConfirmation::new(
            Arc::new(Slow(Duration::from_millis(500))),
            Duration::from_millis(20),
        );
        let err = bounded.confirm(&request(Action::Buy, 50.0)).unwrap_err();
        assert!(matches!(
            err,
            TurbotraderError::ConfirmationTimeout { timeout_ms: 20, .. }
        ));
    }

    #[test]
    fn bounded_reports_dead_worker() {
        let bounded = BoundedConfirmation::new(Arc::new(Panics), Duration::from_secs(5));
        let err = bounded.confirm(&request(Action::Sell, 50.0)).unwrap_err();
        assert!(matches!(err, TurbotraderError::ConfirmationError { .. }));
    }

    #[test]
    fn bounded_reuses_one_worker() {
        let recorder = Arc::new(RecordsThread::default());
        let bounded = BoundedConfirmation::new(recorder.clone(), Duration::from_secs(5));
        for _ in 0..3 {
            assert_eq!(bounded.confirm(&request(Action::Buy, 50.0)).unwrap(), Verdict::Confirm);
        }
        let threads = recorder.0.lock();
        assert_eq!(threads.len(), 1);
        assert!(!threads.contains(&thread::current().id()));
    }

    #[test]
    fn bounded_fails_fast_while_worker_is_stuck() {
        let bounded = BoundedConfirmation::new(
            Arc::new(Slow(Duration::from_millis(500))),
            Duration::from_millis(20),
        );
        // The first request occupies the worker and the second waits behind it.
        for _ in 0..2 {
            let err = bounded.confirm(&request(Action::Buy, 50.0)).unwrap_err();
            assert!(matches!(err, TurbotraderError::ConfirmationTimeout { .. }));
        }
        match bounded.confirm(&request(Action::Buy, 50.0)) {
            Err(TurbotraderError::ConfirmationError { reason, .. }) => {
                assert!(reason.contains("busy"), "{reason}");
            }
            other => panic!("expected a busy worker, got {other:?}"),
        }
    }

    #[test]
    fn bounded_replaces_dead_worker() {
        let bounded =
            BoundedConfirmation::new(Arc::new(PanicsOnce::default()), Duration::from_secs(5));
        let err = bounded.confirm(&request(Action::Buy, 50.0)).unwrap_err();
        assert!(matches!(err, TurbotraderError::ConfirmationError { .. }));
        assert_eq!(bounded.confirm(&request(Action::Buy, 50.0)).unwrap(), Verdict::Confirm);
    }
}
