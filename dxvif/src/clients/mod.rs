//! Clients for the remote provider API.
//!
//! - `grpc`: the provider's VirtualInterfaceService over tonic
//! - `memory`: an in-process provider for tests

pub mod grpc;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{VirtualInterface, VirtualInterfaceSpec};

pub use grpc::GrpcClient;
pub use memory::MemoryClient;

/// Errors returned by provider clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The provider has no such virtual interface.
    #[error("virtual interface not found: {0}")]
    NotFound(String),

    /// Any other RPC failure (auth, validation, throttling, network).
    #[error("{operation} failed: {status}")]
    Rpc {
        operation: &'static str,
        status: tonic::Status,
    },

    #[error("invalid endpoint: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The provider answered with something that does not fit the model.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

/// Result type for client calls.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Describe filter. Both fields narrow the listing when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeFilter {
    pub connection_id: Option<String>,
    pub virtual_interface_id: Option<String>,
}

impl DescribeFilter {
    pub fn new(connection_id: &str, virtual_interface_id: &str) -> Self {
        Self {
            connection_id: Some(connection_id.to_string()),
            virtual_interface_id: Some(virtual_interface_id.to_string()),
        }
    }

    pub fn matches(&self, vi: &VirtualInterface) -> bool {
        self.connection_id
            .as_deref()
            .map_or(true, |c| c == vi.spec.connection_id)
            && self
                .virtual_interface_id
                .as_deref()
                .map_or(true, |id| id == vi.virtual_interface_id)
    }
}

/// Remote provider operations for virtual interfaces.
///
/// Implementations hold no per-call state and never retry.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Create a private virtual interface on `spec.connection_id`.
    async fn create(&self, spec: &VirtualInterfaceSpec) -> Result<VirtualInterface>;

    /// List virtual interfaces matching the filter.
    async fn describe(&self, filter: &DescribeFilter) -> Result<Vec<VirtualInterface>>;

    /// Delete a virtual interface, returning the state the provider reports.
    async fn delete(&self, id: &str) -> Result<String>;
}
