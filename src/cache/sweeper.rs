use super::store::TimeBoundedCache;
use super::DEFAULT_SWEEP_INTERVAL;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Owns a running sweep task. Dropping the handle also stops the task.
pub struct SweeperHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!("Cache sweeper ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns a task that sweeps `cache` every `period` until stopped.
///
/// The first pass runs one full period after the call. A zero `period` falls
/// back to [`DEFAULT_SWEEP_INTERVAL`]. Must be called from within a tokio
/// runtime.
pub fn spawn_sweeper<V>(cache: Arc<TimeBoundedCache<V>>, period: Duration) -> SweeperHandle
where
    V: Clone + Send + 'static,
{
    spawn_with_pass(cache, period, |cache: &TimeBoundedCache<V>| cache.sweep())
}

fn spawn_with_pass<V, F>(
    cache: Arc<TimeBoundedCache<V>>,
    period: Duration,
    mut pass: F,
) -> SweeperHandle
where
    V: Clone + Send + 'static,
    F: FnMut(&TimeBoundedCache<V>) -> usize + Send + 'static,
{
    let period = if period.is_zero() {
        tracing::warn!(
            "{} cache sweep interval is zero, using {}s",
            cache.label(),
            DEFAULT_SWEEP_INTERVAL.as_secs()
        );
        DEFAULT_SWEEP_INTERVAL
    } else {
        period
    };
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(
            "{} cache sweeper started (every {}s)",
            cache.label(),
            period.as_secs()
        );

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => run_pass(&cache, &mut pass),
            }
        }

        tracing::debug!("{} cache sweeper stopped", cache.label());
    });

    SweeperHandle {
        stop_tx: Some(stop_tx),
        task,
    }
}

// A failed pass is logged and retried on the next tick.
fn run_pass<V, F>(cache: &TimeBoundedCache<V>, pass: &mut F)
where
    V: Clone,
    F: FnMut(&TimeBoundedCache<V>) -> usize,
{
    if panic::catch_unwind(AssertUnwindSafe(|| pass(cache))).is_err() {
        tracing::warn!("{} cache sweep failed, retrying next tick", cache.label());
    }
}
