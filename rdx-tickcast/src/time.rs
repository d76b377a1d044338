//! The periodic driver behind the engine's `start`/`stop` lifecycle.

use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant};
use tracing::trace;

/// A fixed-period ticker that runs as its own tokio task.
pub(crate) struct SystemClock {
    period: Duration,
}

impl SystemClock {
    pub(crate) fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Calls `on_tick` once per period until a shutdown signal arrives.
    ///
    /// The first call happens one full period after this future is first
    /// polled. Each call is awaited to completion before the next period is
    /// considered, and a pending shutdown always wins over a due tick.
    pub(crate) async fn run<F, Fut>(self, mut on_tick: F, mut shutdown_rx: broadcast::Receiver<()>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => on_tick().await,
            }
        }
        trace!("SystemClock loop exited.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_a_full_period() {
        let count = Arc::new(AtomicU32::new(0));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let counter = count.clone();
        let task = tokio::spawn(SystemClock::new(Duration::from_secs(1)).run(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            },
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2_200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }
}
