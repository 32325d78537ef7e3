//! bunny-scheduler - Periodic expiry sweeps
//!
//! Anything holding time-limited state (pending confirmations, for example)
//! implements [`Sweep`]. The [`ExpirySweeper`] runs as a tokio task and asks
//! every registered target to drop entries whose deadline has passed.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// State that can evict its own expired entries
pub trait Sweep: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &str;

    /// Remove every entry that expired at or before `now`, returning how many were removed
    fn sweep(&self, now: DateTime<Utc>) -> usize;
}

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Runs [`Sweep`] targets on a fixed interval until cancelled
pub struct ExpirySweeper {
    targets: Vec<Arc<dyn Sweep>>,
    config: SweeperConfig,
}

impl ExpirySweeper {
    pub fn new(config: SweeperConfig) -> Self {
        Self {
            targets: Vec::new(),
            config,
        }
    }

    pub fn register(&mut self, target: Arc<dyn Sweep>) {
        info!("Registering sweep target: {}", target.name());
        self.targets.push(target);
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Run a single pass over all targets
    pub fn sweep_once(&self, now: DateTime<Utc>) -> usize {
        let mut total = 0;
        for target in &self.targets {
            let removed = target.sweep(now);
            if removed > 0 {
                info!("Swept {} expired entries from {}", removed, target.name());
            }
            total += removed;
        }
        total
    }

    /// Loop until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            "Expiry sweeper started ({} targets, every {:?})",
            self.targets.len(),
            self.config.interval
        );
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Expiry sweeper stopped");
                    break;
                }
                _ = interval.tick() => {
                    debug!("Running expiry sweep");
                    self.sweep_once(Utc::now());
                }
            }
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
