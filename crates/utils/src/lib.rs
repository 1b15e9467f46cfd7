use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

/// Elapsed-time allowance for long CPU-bound loops.
///
/// Checked between units of work by the caller; nothing here preempts.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    limit: Duration,
}

impl Budget {
    pub fn new(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Returns `true` once the allowance has been used up.
    pub fn is_exhausted(&self) -> bool {
        self.started.elapsed() >= self.limit
    }
}

/// Install the global fmt subscriber. `RUST_LOG` wins over `default_directive`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_is_exhausted_immediately() {
        let budget = Budget::new(Duration::ZERO);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn generous_budget_is_not_exhausted() {
        let budget = Budget::from_millis(60_000);
        assert!(!budget.is_exhausted());
        assert!(budget.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn init_tracing_twice_does_not_panic() {
        init_tracing("warn");
        init_tracing("debug");
    }
}
