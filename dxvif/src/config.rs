//! Reconciler configuration.

use std::time::Duration;

use crate::model::state;
use crate::waiter::{AbsentPolicy, WaitConfig};

/// Timing and policy knobs for [`crate::reconciler::VirtualInterfaceReconciler`].
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How long Create waits for the interface to become usable.
    pub create_timeout: Duration,
    /// Delay between status probes.
    pub poll_interval: Duration,
    /// Pause between the create call and the first probe.
    pub create_delay: Duration,
    /// Wait for the provider to report the interface gone after Delete.
    pub wait_for_deletion: bool,
    pub delete_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            create_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
            create_delay: Duration::ZERO,
            wait_for_deletion: false,
            delete_timeout: Duration::from_secs(600),
        }
    }
}

impl ReconcilerConfig {
    /// Wait used after create: `pending` until `confirming` or `available`.
    pub fn create_wait(&self) -> WaitConfig {
        WaitConfig::new([state::PENDING], [state::CONFIRMING, state::AVAILABLE])
            .timeout(self.create_timeout)
            .poll_interval(self.poll_interval)
            .delay(self.create_delay)
    }

    /// Wait used after delete: any live state until `deleted` or gone.
    pub fn delete_wait(&self) -> WaitConfig {
        WaitConfig::new(
            [
                state::PENDING,
                state::VERIFYING,
                state::CONFIRMING,
                state::AVAILABLE,
                state::DOWN,
                state::DELETING,
            ],
            [state::DELETED],
        )
        .timeout(self.delete_timeout)
        .poll_interval(self.poll_interval)
        .absent(AbsentPolicy::Target)
    }
}
