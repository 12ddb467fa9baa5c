use std::time::Duration;

use table_core::Msg;
use table_logging::table_debug;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Sends `Msg::PollTick` to a loader on a fixed interval until stopped.
///
/// The poller never sees the page list; whether a tick turns into a request
/// is decided by the loader's state.
pub struct LivePoller {
    token: CancellationToken,
}

impl LivePoller {
    pub fn start(
        interval: Duration,
        msg_tx: mpsc::UnboundedSender<Msg>,
        token: CancellationToken,
    ) -> Self {
        let task_token = token.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if msg_tx.send(Msg::PollTick).is_err() {
                            break;
                        }
                    }
                }
            }
            table_debug!("Live poller stopped");
        });
        Self { token }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for LivePoller {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
