//! Convergence waiter.
//!
//! Polls a [`StateRefresh`] until the reported state lands in the target set.
//! The deadline is wall-clock based: every probe and every sleep is cut short
//! at the deadline, so a wait never outlives `timeout` by more than one poll.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::refresh::{Refresh, StateRefresh};

/// What to do when a probe finds no resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsentPolicy {
    /// Keep polling; the provider may not list the resource yet.
    Pending,
    /// Absence is the goal (e.g. waiting for deletion).
    Target,
    /// Give up after this many consecutive absent probes.
    FailAfter(u32),
}

/// Delay between probes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollSchedule {
    Fixed(Duration),
    /// `initial * multiplier^n`, capped at `max`.
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl PollSchedule {
    /// Delay after the `attempt`-th probe (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            PollSchedule::Fixed(d) => d,
            PollSchedule::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exp = attempt.min(64) as i32;
                let secs = initial.as_secs_f64() * multiplier.powi(exp);
                Duration::try_from_secs_f64(secs.min(max.as_secs_f64())).unwrap_or(max)
            }
        }
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        PollSchedule::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Parameters of one wait.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub timeout: Duration,
    pub poll: PollSchedule,
    /// Pause before the first probe.
    pub delay: Duration,
    pub absent: AbsentPolicy,
}

impl WaitConfig {
    pub fn new<P, T, S>(pending: P, target: T) -> Self
    where
        P: IntoIterator<Item = S>,
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            timeout: Duration::from_secs(60),
            poll: PollSchedule::default(),
            delay: Duration::ZERO,
            absent: AbsentPolicy::Pending,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll(mut self, poll: PollSchedule) -> Self {
        self.poll = poll;
        self
    }

    pub fn poll_interval(self, interval: Duration) -> Self {
        self.poll(PollSchedule::Fixed(interval))
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn absent(mut self, absent: AbsentPolicy) -> Self {
        self.absent = absent;
        self
    }

    fn is_target(&self, state: &str) -> bool {
        self.target.iter().any(|t| t == state)
    }

    fn is_pending(&self, state: &str) -> bool {
        self.pending.iter().any(|p| p == state)
    }
}

/// Result of a successful wait.
#[derive(Debug)]
pub struct WaitOutcome<T> {
    /// Final object; `None` when absence was the target.
    pub object: Option<T>,
    pub state: Option<String>,
    pub probes: u32,
    pub elapsed: Duration,
}

/// Drives a refresher until convergence, failure, deadline or shutdown.
#[derive(Debug, Clone)]
pub struct Waiter {
    config: WaitConfig,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Waiter {
    pub fn new(config: WaitConfig) -> Self {
        Self {
            config,
            shutdown: None,
        }
    }

    /// Abort the wait once `shutdown` turns true or its sender goes away.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub async fn wait<R>(&self, refresh: &R) -> Result<WaitOutcome<R::Object>>
    where
        R: StateRefresh + ?Sized,
    {
        let config = &self.config;
        let start = Instant::now();
        let deadline = instant_after(start, config.timeout);
        let mut shutdown = self.shutdown.clone();
        let mut last_state = String::new();
        let mut probes = 0u32;
        let mut absent_checks = 0u32;

        debug!(
            pending = ?config.pending,
            target = ?config.target,
            timeout = ?config.timeout,
            "Waiting for state"
        );

        if !config.delay.is_zero() {
            let until = instant_after(start, config.delay);
            self.pause(until, deadline, &mut shutdown, &last_state)
                .await?;
        }

        loop {
            if Instant::now() >= deadline {
                return Err(self.timeout_error(&last_state, start));
            }

            let outcome = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => {
                    return Err(Error::Cancelled { last_state });
                }
                res = tokio::time::timeout_at(deadline, refresh.refresh()) => match res {
                    Ok(outcome) => outcome,
                    Err(_) => return Err(self.timeout_error(&last_state, start)),
                },
            };
            probes += 1;

            match outcome {
                Refresh::Failed(e) => return Err(e),
                Refresh::Absent => {
                    trace!(probe = probes, "Resource not found");
                    match config.absent {
                        AbsentPolicy::Target => {
                            return Ok(WaitOutcome {
                                object: None,
                                state: None,
                                probes,
                                elapsed: start.elapsed(),
                            });
                        }
                        AbsentPolicy::FailAfter(limit) => {
                            absent_checks += 1;
                            if absent_checks >= limit {
                                return Err(Error::NotFound {
                                    checks: absent_checks,
                                });
                            }
                        }
                        AbsentPolicy::Pending => {}
                    }
                }
                Refresh::Observed { object, state } => {
                    absent_checks = 0;
                    trace!(probe = probes, state = %state, "Observed state");

                    if config.is_target(&state) {
                        debug!(state = %state, probes, "Reached target state");
                        return Ok(WaitOutcome {
                            object: Some(object),
                            state: Some(state),
                            probes,
                            elapsed: start.elapsed(),
                        });
                    }
                    if !config.is_pending(&state) {
                        return Err(Error::UnexpectedState {
                            state,
                            target: config.target.clone(),
                        });
                    }
                    last_state = state;
                }
            }

            let next = instant_after(Instant::now(), config.poll.delay(probes - 1));
            self.pause(next, deadline, &mut shutdown, &last_state)
                .await?;
        }
    }

    /// Sleep until `until` (never past `deadline`), aborting on shutdown.
    async fn pause(
        &self,
        until: Instant,
        deadline: Instant,
        shutdown: &mut Option<watch::Receiver<bool>>,
        last_state: &str,
    ) -> Result<()> {
        tokio::select! {
            _ = shutdown_requested(shutdown) => Err(Error::Cancelled {
                last_state: last_state.to_string(),
            }),
            _ = tokio::time::sleep_until(until.min(deadline)) => Ok(()),
        }
    }

    fn timeout_error(&self, last_state: &str, start: Instant) -> Error {
        Error::Timeout {
            last_state: last_state.to_string(),
            target: self.config.target.clone(),
            elapsed: start.elapsed(),
        }
    }
}

/// Roughly 30 years; stands in for durations an `Instant` cannot hold.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn instant_after(base: Instant, duration: Duration) -> Instant {
    base.checked_add(duration)
        .or_else(|| base.checked_add(FAR_FUTURE))
        .unwrap_or(base)
}

/// Resolves once shutdown is signalled; never resolves without a receiver.
async fn shutdown_requested(shutdown: &mut Option<watch::Receiver<bool>>) {
    match shutdown {
        Some(rx) => loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        },
        None => std::future::pending::<()>().await,
    }
}
