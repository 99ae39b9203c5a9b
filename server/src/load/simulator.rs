//! Paced load sequences shared by the HTTP and WebSocket transports

use chrono::{Local, SecondsFormat};
use std::hint::black_box;
use std::time::{Duration, Instant};
use tracing::debug;

use super::LoadError;
use crate::config::LoadConfig;
use crate::protocol::{LoadType, MEDIUM_COMPLETED_MESSAGE, SIMPLE_COMPLETED_MESSAGE};

/// Result of an HTTP load run
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub message: &'static str,
    /// Progress messages, only for medium runs
    pub messages: Option<Vec<String>>,
    pub elapsed: Duration,
}

/// Result of a `/complex` run
#[derive(Debug, Clone)]
pub struct ComplexOutcome {
    pub message: String,
    pub computation: u64,
    pub elapsed: Duration,
}

/// Executes simulated load with the configured pacing
#[derive(Debug, Clone)]
pub struct LoadSimulator {
    config: LoadConfig,
}

impl LoadSimulator {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Number of progress messages in a medium run
    pub fn medium_steps(&self) -> usize {
        self.config.medium_steps
    }

    /// Sleep for `units` time units without blocking the runtime.
    /// Saturates instead of overflowing for very large time units.
    pub async fn pause(&self, units: u32) {
        let delay = self
            .config
            .time_unit
            .checked_mul(units)
            .unwrap_or(Duration::MAX);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Run a load profile and collect everything into one outcome.
    ///
    /// Medium runs wait one time unit before appending each progress message.
    pub async fn run_http(&self, load_type: LoadType) -> LoadOutcome {
        let start = Instant::now();

        let (message, messages) = match load_type {
            LoadType::Simple => {
                self.pause(1).await;
                (SIMPLE_COMPLETED_MESSAGE, None)
            }
            LoadType::Medium => {
                let mut messages = Vec::with_capacity(self.config.medium_steps);
                for n in 1..=self.config.medium_steps {
                    self.pause(1).await;
                    messages.push(medium_message(n));
                }
                (MEDIUM_COMPLETED_MESSAGE, Some(messages))
            }
        };

        LoadOutcome {
            message,
            messages,
            elapsed: start.elapsed(),
        }
    }

    /// Burn CPU on the sum-of-squares loop, then wait out the simulated I/O.
    /// The loop runs on the blocking pool so large iteration counts do not
    /// stall the async workers.
    pub async fn run_complex(&self, message: &str) -> Result<ComplexOutcome, LoadError> {
        let start = Instant::now();

        let iterations = self.config.complex_iterations;
        let computation = tokio::task::spawn_blocking(move || sum_of_squares(iterations))
            .await
            .map_err(|e| LoadError::ComputationFailed(e.to_string()))?;
        debug!(
            "Computed sum of squares over {} iterations in {:?}",
            iterations,
            start.elapsed()
        );

        self.pause(self.config.complex_io_units).await;

        Ok(ComplexOutcome {
            message: format!("Message processed: {}", message),
            computation,
            elapsed: start.elapsed(),
        })
    }
}

/// Progress line for step `n` (1-based) of a medium run
pub fn medium_message(n: usize) -> String {
    format!("Medium load message {} processed", n)
}

/// Σ i² for i in `0..iterations`, computed by iteration so it costs CPU time.
/// Wraps on overflow, which only happens far beyond the default iteration count.
pub fn sum_of_squares(iterations: u64) -> u64 {
    let mut result: u64 = 0;
    for i in 0..iterations {
        let i = black_box(i);
        result = result.wrapping_add(i.wrapping_mul(i));
    }
    result
}

/// Compact unit-suffixed duration, e.g. `1.001234567s` or `2.5ms`
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:?}", elapsed)
}

/// Current local time as RFC 3339 with second precision
pub fn now_rfc3339() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
