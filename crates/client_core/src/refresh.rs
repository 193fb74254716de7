use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

pub const OPERATIONAL_REFRESH: Duration = Duration::from_secs(5);
pub const COURIER_REFRESH: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct InFlightTicket {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<InFlightTicket> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightTicket {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Runs `work` unless another refresh holds the guard; `None` means skipped.
    pub async fn run<F: Future>(&self, work: F) -> Option<F::Output> {
        let _ticket = self.try_acquire()?;
        Some(work.await)
    }
}

pub struct RefreshHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    period: Duration,
    guard: InFlightGuard,
}

impl RefreshScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            guard: InFlightGuard::new(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn guard(&self) -> InFlightGuard {
        self.guard.clone()
    }

    /// Starts the timer. `visibility` carries whether the view is shown: ticks
    /// are skipped while hidden, turning visible refreshes immediately, and
    /// dropping the sender ends the task.
    pub fn start<F, Fut>(&self, mut visibility: watch::Receiver<bool>, refresh: F) -> RefreshHandle
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = self.period;
        let guard = self.guard.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_ms = period.as_millis() as u64, "refresh timer started");

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if !*visibility.borrow() {
                            continue;
                        }
                        if guard.run(refresh()).await.is_none() {
                            debug!("refresh skipped: previous one still in flight");
                        }
                    }
                    changed = visibility.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let visible = *visibility.borrow_and_update();
                        if visible && guard.run(refresh()).await.is_none() {
                            debug!("refresh on show skipped: previous one still in flight");
                        }
                    }
                }
            }
            info!("refresh timer stopped");
        });

        RefreshHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}
