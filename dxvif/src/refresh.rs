//! State refresh probes.
//!
//! A refresher asks the provider once for the current state of one resource.
//! The waiter calls it repeatedly; Read and Update call it exactly once.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::clients::{DescribeFilter, ProviderClient};
use crate::error::Error;
use crate::model::VirtualInterface;

/// Outcome of a single probe.
#[derive(Debug)]
pub enum Refresh<T> {
    /// The provider does not (yet) know the resource.
    Absent,
    /// The resource exists and reports `state`.
    Observed { object: T, state: String },
    /// The probe failed; the caller must stop.
    Failed(Error),
}

impl<T> Refresh<T> {
    pub fn observed(object: T, state: impl Into<String>) -> Self {
        Refresh::Observed {
            object,
            state: state.into(),
        }
    }
}

/// A repeatable, argument-free status probe.
#[async_trait]
pub trait StateRefresh: Send + Sync {
    type Object: Send;

    async fn refresh(&self) -> Refresh<Self::Object>;
}

#[async_trait]
impl<F, Fut, T> StateRefresh for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Refresh<T>> + Send,
    T: Send,
{
    type Object = T;

    async fn refresh(&self) -> Refresh<T> {
        (self)().await
    }
}

/// Probe for one virtual interface on one connection.
#[derive(Clone)]
pub struct VirtualInterfaceRefresh {
    client: Arc<dyn ProviderClient>,
    connection_id: String,
    id: String,
}

impl VirtualInterfaceRefresh {
    pub fn new(client: Arc<dyn ProviderClient>, connection_id: &str, id: &str) -> Self {
        Self {
            client,
            connection_id: connection_id.to_string(),
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl StateRefresh for VirtualInterfaceRefresh {
    type Object = VirtualInterface;

    async fn refresh(&self) -> Refresh<VirtualInterface> {
        let filter = DescribeFilter::new(&self.connection_id, &self.id);
        match self.client.describe(&filter).await {
            Ok(found) => match found.into_iter().next() {
                Some(vi) => {
                    let state = vi.state.clone();
                    Refresh::Observed { object: vi, state }
                }
                // Listing can lag behind create; an empty page is not an error.
                None => Refresh::Absent,
            },
            Err(e) if e.is_not_found() => Refresh::Absent,
            Err(e) => {
                warn!(id = %self.id, error = %e, "Error refreshing virtual interface state");
                Refresh::Failed(Error::client("describe", self.id.clone(), e))
            }
        }
    }
}
