//! Client for the provider's VirtualInterfaceService over gRPC.

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};
use tracing::debug;

use super::{ClientError, DescribeFilter, ProviderClient, Result};
use crate::model::{VirtualInterface, VirtualInterfaceSpec};
use crate::proto;
use crate::proto::virtual_interface_service_client::VirtualInterfaceServiceClient;

/// gRPC provider client. Cheap to clone; each call clones the channel handle.
#[derive(Debug, Clone)]
pub struct GrpcClient {
    client: VirtualInterfaceServiceClient<Channel>,
}

impl GrpcClient {
    /// Create a client for `endpoint`. The connection is established lazily.
    pub fn new(endpoint: &str) -> Result<Self> {
        let channel = Endpoint::from_shared(endpoint.to_string())?.connect_lazy();
        Ok(Self {
            client: VirtualInterfaceServiceClient::new(channel),
        })
    }
}

/// Map a gRPC status to a client error, keeping "not found" distinguishable.
pub fn status_to_error(operation: &'static str, status: Status) -> ClientError {
    match status.code() {
        Code::NotFound => ClientError::NotFound(status.message().to_string()),
        _ => ClientError::Rpc { operation, status },
    }
}

fn prefixes_to_proto(prefixes: &[String]) -> Vec<proto::RouteFilterPrefix> {
    prefixes
        .iter()
        .map(|cidr| proto::RouteFilterPrefix { cidr: cidr.clone() })
        .collect()
}

fn spec_to_proto(spec: &VirtualInterfaceSpec) -> proto::CreatePrivateVirtualInterfaceRequest {
    proto::CreatePrivateVirtualInterfaceRequest {
        connection_id: spec.connection_id.clone(),
        new_private_virtual_interface: Some(proto::NewPrivateVirtualInterface {
            virtual_interface_name: spec.virtual_interface_name.clone(),
            vlan: i32::from(spec.vlan),
            asn: spec.asn,
            auth_key: spec.auth_key.clone(),
            amazon_address: spec.amazon_address.clone(),
            customer_address: spec.customer_address.clone(),
            virtual_gateway_id: spec.virtual_gateway_id.clone(),
            route_filter_prefixes: prefixes_to_proto(&spec.route_filter_prefixes),
        }),
    }
}

fn interface_from_proto(vi: proto::VirtualInterface) -> Result<VirtualInterface> {
    let vlan = u16::try_from(vi.vlan).map_err(|_| {
        ClientError::InvalidResponse(format!(
            "vlan {} out of range for virtual interface {}",
            vi.vlan, vi.virtual_interface_id
        ))
    })?;

    Ok(VirtualInterface {
        virtual_interface_id: vi.virtual_interface_id,
        state: vi.virtual_interface_state,
        spec: VirtualInterfaceSpec {
            connection_id: vi.connection_id,
            virtual_interface_name: vi.virtual_interface_name,
            vlan,
            asn: vi.asn,
            auth_key: vi.auth_key,
            amazon_address: vi.amazon_address,
            customer_address: vi.customer_address,
            virtual_gateway_id: vi.virtual_gateway_id,
            route_filter_prefixes: vi.route_filter_prefixes.into_iter().map(|p| p.cidr).collect(),
        },
    })
}

#[async_trait]
impl ProviderClient for GrpcClient {
    async fn create(&self, spec: &VirtualInterfaceSpec) -> Result<VirtualInterface> {
        debug!(
            connection_id = %spec.connection_id,
            name = %spec.virtual_interface_name,
            "CreatePrivateVirtualInterface"
        );
        let mut client = self.client.clone();
        let response = client
            .create_private_virtual_interface(spec_to_proto(spec))
            .await
            .map_err(|s| status_to_error("create", s))?;
        interface_from_proto(response.into_inner())
    }

    async fn describe(&self, filter: &DescribeFilter) -> Result<Vec<VirtualInterface>> {
        debug!(?filter, "DescribeVirtualInterfaces");
        let mut client = self.client.clone();
        let response = client
            .describe_virtual_interfaces(proto::DescribeVirtualInterfacesRequest {
                connection_id: filter.connection_id.clone(),
                virtual_interface_id: filter.virtual_interface_id.clone(),
            })
            .await
            .map_err(|s| status_to_error("describe", s))?;

        response
            .into_inner()
            .virtual_interfaces
            .into_iter()
            .map(interface_from_proto)
            .collect()
    }

    async fn delete(&self, id: &str) -> Result<String> {
        debug!(id = %id, "DeleteVirtualInterface");
        let mut client = self.client.clone();
        let response = client
            .delete_virtual_interface(proto::DeleteVirtualInterfaceRequest {
                virtual_interface_id: id.to_string(),
            })
            .await
            .map_err(|s| status_to_error("delete", s))?;
        Ok(response.into_inner().virtual_interface_state)
    }
}
