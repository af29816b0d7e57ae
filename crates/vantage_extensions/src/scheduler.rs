//! Periodic server gathers.

use crate::registry::ExtensionService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};
use vantage_extension_api::CallEvents;

/// A running periodic task. Once cancelled it never runs again.
#[derive(Debug)]
pub struct ScheduledTask {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Cancels the task. Returns `false` when it was already cancelled.
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.handle.abort();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct GatherScheduler;

impl GatherScheduler {
    /// Runs a server gather of every extension, then a conditional cleanup,
    /// once per `period`. The first run happens one period from now.
    ///
    /// Returns `None` for a zero period.
    pub fn schedule_periodic(service: &Arc<ExtensionService>, period: Duration) -> Option<ScheduledTask> {
        if period.is_zero() {
            debug!("Periodic extension gathering is disabled");
            return None;
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let service = Arc::downgrade(service);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                let Some(service) = service.upgrade() else {
                    break;
                };

                let run = tokio::task::spawn_blocking(move || {
                    service.update_server_values(CallEvents::ServerPeriodical);
                    service.remove_unsatisfied_conditionals()
                })
                .await;
                match run {
                    Ok(Ok(())) => debug!("Periodic extension gather finished"),
                    Ok(Err(e)) => warn!("Periodic conditional cleanup failed: {}", e),
                    Err(e) => warn!("Periodic extension gather did not complete: {}", e),
                }
            }
        });

        Some(ScheduledTask { cancelled, handle })
    }
}
