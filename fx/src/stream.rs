//! Periodic rate push to subscribers.

use std::sync::Arc;

use chrono::Duration;
use ratedesk_common::{CurrencyPair, DurationExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::rate::ExchangeRate;
use crate::service::RateService;

/// Channel capacity per subscription.
const STREAM_BUFFER: usize = 64;

/// Handle to a running rate subscription.
///
/// Dropping the handle does not stop the stream; call [`RateStreamHandle::stop`]
/// or drop the receiver.
pub struct RateStreamHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RateStreamHandle {
    /// Stop the stream and wait for the pump task to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl RateService {
    /// Push rates for `pairs` every `interval` (default: the configured stream interval).
    ///
    /// Each tick sends one batch through [`RateService::get_rates`]; pairs that
    /// cannot be priced on a tick are skipped. The stream ends when the receiver
    /// is dropped or the handle is stopped.
    pub fn subscribe(
        self: &Arc<Self>,
        pairs: Vec<CurrencyPair>,
        interval: Option<Duration>,
    ) -> (RateStreamHandle, mpsc::Receiver<ExchangeRate>) {
        let interval = interval
            .filter(|i| *i > Duration::zero())
            .unwrap_or(self.config().stream_interval);
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let service = Arc::clone(self);
        let task = tokio::spawn(async move {
            service.pump(pairs, interval, tx, shutdown_rx).await;
        });

        (
            RateStreamHandle {
                shutdown: shutdown_tx,
                task,
            },
            rx,
        )
    }

    async fn pump(
        &self,
        pairs: Vec<CurrencyPair>,
        interval: Duration,
        tx: mpsc::Sender<ExchangeRate>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval.as_std());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(pairs = pairs.len(), interval_ms = interval.num_milliseconds(), "Rate stream started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let rates = self.get_rates(&pairs).await;
                    debug!(count = rates.len(), "Pushing rate batch");
                    for rate in rates {
                        if tx.send(rate).await.is_err() {
                            info!("Rate stream receiver dropped");
                            return;
                        }
                    }
                }
                _ = tx.closed() => {
                    info!("Rate stream receiver dropped");
                    return;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Rate stream stopped");
                        return;
                    }
                }
            }
        }
    }
}
