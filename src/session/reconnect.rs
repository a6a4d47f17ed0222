use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Fixed-period retry ticker.
///
/// Sends `()` on `ticks` every `period`, first one `period` after start, until
/// cancelled or dropped. The session holds at most one of these.
#[derive(Debug)]
pub struct ReconnectTimer {
    cancel: CancellationToken,
}

impl ReconnectTimer {
    pub fn start(period: Duration, ticks: mpsc::Sender<()>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => match ticks.try_send(()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(())) => trace!("Previous retry tick still pending"),
                        Err(TrySendError::Closed(())) => break,
                    },
                }
            }
            debug!("Reconnect timer stopped");
        });

        debug!("Reconnect timer started, period {:?}", period);
        Self { cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ReconnectTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_at_fixed_period_until_dropped() {
        let (tx, mut rx) = mpsc::channel(1);
        let timer = ReconnectTimer::start(Duration::from_secs(2), tx);

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_ok());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_ok());

        drop(timer);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks() {
        let (tx, mut rx) = mpsc::channel(1);
        let timer = ReconnectTimer::start(Duration::from_secs(2), tx);
        timer.cancel();
        assert!(timer.is_cancelled());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
