//! Reconcilers for provider resources.
//!
//! A reconciler moves a local record through its lifecycle by calling the
//! provider and, where needed, waiting for the remote side to converge.

pub mod virtual_interface;

use async_trait::async_trait;

use crate::error::Result;

pub use virtual_interface::VirtualInterfaceReconciler;

/// Lifecycle operations over a local record.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// The reconciler's view of one resource instance.
    type Record: Send;
    /// The resource as reported by the provider.
    type Observed;

    /// Create the resource and wait until it is usable.
    async fn create(&self, record: &mut Self::Record) -> Result<Self::Observed>;

    /// Refresh the record from the provider. `None` means the resource is gone
    /// and the record's identity has been cleared.
    async fn read(&self, record: &mut Self::Record) -> Result<Option<Self::Observed>>;

    /// Re-check the resource; no remote mutation.
    async fn update(&self, record: &mut Self::Record) -> Result<Option<Self::Observed>>;

    /// Delete the resource. Deleting something already gone succeeds.
    async fn delete(&self, record: &mut Self::Record) -> Result<()>;
}
