//! Fixed-interval cycle scheduling.
//!
//! At most one cycle runs at a time against a store, across processes: the
//! in-process mutex orders local callers and the store's cycle lease excludes
//! other processes. Manual triggers queue behind a running cycle; scheduled
//! ticks that find a cycle in flight are skipped.

use crate::domain::stats::CycleStats;
use crate::poll::PollOrchestrator;
use crate::storage::CycleLease;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const LEASE_RETRY_INTERVAL: Duration = Duration::from_secs(1);
const MAX_LEASE_WAIT: Duration = Duration::from_secs(300);

pub struct CycleRunner {
    orchestrator: PollOrchestrator,
    lock: Mutex<()>,
}

impl CycleRunner {
    pub fn new(orchestrator: PollOrchestrator) -> Self {
        Self {
            orchestrator,
            lock: Mutex::new(()),
        }
    }

    pub fn orchestrator(&self) -> &PollOrchestrator {
        &self.orchestrator
    }

    /// Runs one cycle, waiting for any cycle already in flight to finish first.
    ///
    /// Gives up after [`MAX_LEASE_WAIT`] if another process keeps the lease,
    /// reporting a cycle with one error.
    pub async fn run_once(&self) -> CycleStats {
        let _guard = self.lock.lock().await;
        let deadline = Instant::now() + MAX_LEASE_WAIT;
        let store = self.orchestrator.store();

        loop {
            match store.try_lock_cycle().await {
                Ok(Some(lease)) => return self.run_leased(lease).await,
                Ok(None) if Instant::now() < deadline => {
                    tracing::debug!("poll cycle running elsewhere; waiting");
                    tokio::time::sleep(LEASE_RETRY_INTERVAL).await;
                }
                Ok(None) => {
                    tracing::error!(?MAX_LEASE_WAIT, "gave up waiting for the poll-cycle lock");
                    return failed_to_start();
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to take the poll-cycle lock");
                    return failed_to_start();
                }
            }
        }
    }

    /// Runs one cycle unless another is in flight, here or in another process.
    pub async fn try_run_once(&self) -> Option<CycleStats> {
        let _guard = self.lock.try_lock().ok()?;
        match self.orchestrator.store().try_lock_cycle().await {
            Ok(Some(lease)) => Some(self.run_leased(lease).await),
            Ok(None) => None,
            Err(err) => {
                tracing::error!(error = %err, "failed to take the poll-cycle lock");
                Some(failed_to_start())
            }
        }
    }

    async fn run_leased(&self, lease: Box<dyn CycleLease>) -> CycleStats {
        let stats = self.orchestrator.run_cycle().await;
        lease.release().await;
        stats
    }
}

fn failed_to_start() -> CycleStats {
    CycleStats {
        errors: 1,
        ..CycleStats::default()
    }
}

/// Background loop owned by whoever started it; dropping it also ends the loop
/// at the next tick boundary.
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    /// First cycle fires one `period` after start.
    pub fn start(runner: Arc<CycleRunner>, period: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(?period, "scheduler: started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }

                if runner.try_run_once().await.is_none() {
                    tracing::info!("scheduler: cycle already running; skipping tick");
                }
            }

            tracing::info!("scheduler: stopped");
        });

        Self { shutdown, handle }
    }

    /// Signals shutdown and waits for the in-flight cycle, if any, to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.handle.await {
            tracing::error!(error = %err, "scheduler task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollSettings;
    use crate::storage::SignalStore;
    use crate::testing::{
        candidate, sample_summary, FakeFeed, FakeNotifier, FakeSessions, FakeSummarizer,
        MemoryStore, SummaryScript,
    };
    use crate::tracking;
    use std::sync::atomic::Ordering;

    async fn runner() -> (Arc<CycleRunner>, Arc<FakeSessions>) {
        let store = MemoryStore::default();
        tracking::track(&store, "alice", None).await.unwrap();
        let sessions = Arc::new(FakeSessions::default());
        let orchestrator = PollOrchestrator::new(
            Arc::new(store),
            sessions.clone(),
            Arc::new(FakeFeed::returning(vec![])),
            Arc::new(FakeSummarizer::new(SummaryScript::Succeed(sample_summary()))),
            Arc::new(FakeNotifier::accepting()),
            PollSettings::default(),
        );
        (Arc::new(CycleRunner::new(orchestrator)), sessions)
    }

    #[tokio::test(start_paused = true)]
    async fn runs_one_cycle_per_period_until_stopped() {
        let (runner, sessions) = runner().await;
        let scheduler = Scheduler::start(Arc::clone(&runner), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(sessions.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(sessions.calls.load(Ordering::SeqCst), 2);

        scheduler.stop().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(sessions.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_tick_skips_while_a_cycle_is_in_flight() {
        let (runner, sessions) = runner().await;
        let _busy = runner.lock.try_lock().unwrap();

        assert!(runner.try_run_once().await.is_none());
        assert_eq!(sessions.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_trigger_returns_stats_verbatim() {
        let (runner, sessions) = runner().await;
        let stats = runner.run_once().await;
        assert_eq!(stats, CycleStats::default());
        assert_eq!(sessions.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_trigger_queues_behind_running_cycle() {
        let (runner, sessions) = runner().await;
        let guard = runner.lock.lock().await;

        let queued = tokio::spawn({
            let runner = Arc::clone(&runner);
            async move { runner.run_once().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sessions.calls.load(Ordering::SeqCst), 0);

        drop(guard);
        queued.await.unwrap();
        assert_eq!(sessions.calls.load(Ordering::SeqCst), 1);
    }

    fn slow_runner(store: &MemoryStore, notifier: &Arc<FakeNotifier>) -> CycleRunner {
        CycleRunner::new(PollOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(FakeSessions::default()),
            Arc::new(FakeFeed::returning(vec![candidate("100", "alice", "Adding $TSLA")])),
            Arc::new(FakeSummarizer::new(SummaryScript::Slow(
                Duration::from_secs(5),
                sample_summary(),
            ))),
            notifier.clone(),
            PollSettings::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn runners_sharing_a_store_alert_once() {
        let store = MemoryStore::default();
        tracking::track(&store, "alice", None).await.unwrap();
        let notifier = Arc::new(FakeNotifier::accepting());
        let api = slow_runner(&store, &notifier);
        let worker = slow_runner(&store, &notifier);

        let (a, b) = tokio::join!(api.run_once(), worker.run_once());

        assert_eq!(notifier.sent().len(), 1);
        let mut outcomes = [a.as_array(), b.as_array()];
        outcomes.sort();
        assert_eq!(outcomes, [[1, 0, 1, 0, 0], [1, 1, 0, 1, 0]]);
        assert_eq!(store.processed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_tick_skips_while_another_process_holds_the_lease() {
        let store = MemoryStore::default();
        tracking::track(&store, "alice", None).await.unwrap();
        let notifier = Arc::new(FakeNotifier::accepting());
        let runner = slow_runner(&store, &notifier);

        let held = store.try_lock_cycle().await.unwrap().unwrap();
        assert!(runner.try_run_once().await.is_none());
        assert!(notifier.sent().is_empty());

        held.release().await;
        let stats = runner.try_run_once().await.unwrap();
        assert_eq!(stats.notifications_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_trigger_gives_up_when_the_lease_never_frees() {
        let store = MemoryStore::default();
        tracking::track(&store, "alice", None).await.unwrap();
        let notifier = Arc::new(FakeNotifier::accepting());
        let runner = slow_runner(&store, &notifier);

        let _held = store.try_lock_cycle().await.unwrap().unwrap();
        let stats = runner.run_once().await;

        assert_eq!(stats.as_array(), [0, 0, 0, 0, 1]);
        assert!(notifier.sent().is_empty());
    }
}
