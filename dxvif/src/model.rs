//! Virtual interface data model: desired spec, observed state and local record.

use serde::{Deserialize, Serialize};

/// Status labels reported by the provider for a virtual interface.
pub mod state {
    pub const PENDING: &str = "pending";
    pub const VERIFYING: &str = "verifying";
    pub const CONFIRMING: &str = "confirming";
    pub const AVAILABLE: &str = "available";
    pub const DOWN: &str = "down";
    pub const DELETING: &str = "deleting";
    pub const DELETED: &str = "deleted";
    pub const REJECTED: &str = "rejected";

    /// States after which the interface will never become usable again.
    pub const TERMINAL: &[&str] = &[DELETING, DELETED, REJECTED];

    pub fn is_terminal(state: &str) -> bool {
        TERMINAL.contains(&state)
    }
}

/// Desired configuration of a private virtual interface.
///
/// Every field is fixed at creation; changing any of them means destroying
/// and recreating the interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualInterfaceSpec {
    pub connection_id: String,
    pub virtual_interface_name: String,
    pub vlan: u16,
    pub asn: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amazon_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_address: Option<String>,
    pub virtual_gateway_id: String,
    /// CIDR prefixes in insertion order.
    #[serde(default)]
    pub route_filter_prefixes: Vec<String>,
}

impl VirtualInterfaceSpec {
    /// Names of the fields that differ between `self` and `other`.
    pub fn drifted_fields(&self, other: &VirtualInterfaceSpec) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.connection_id != other.connection_id {
            fields.push("connection_id");
        }
        if self.virtual_interface_name != other.virtual_interface_name {
            fields.push("virtual_interface_name");
        }
        if self.vlan != other.vlan {
            fields.push("vlan");
        }
        if self.asn != other.asn {
            fields.push("asn");
        }
        if self.auth_key != other.auth_key {
            fields.push("auth_key");
        }
        if self.amazon_address != other.amazon_address {
            fields.push("amazon_address");
        }
        if self.customer_address != other.customer_address {
            fields.push("customer_address");
        }
        if self.virtual_gateway_id != other.virtual_gateway_id {
            fields.push("virtual_gateway_id");
        }
        if self.route_filter_prefixes != other.route_filter_prefixes {
            fields.push("route_filter_prefixes");
        }
        fields
    }
}

/// A virtual interface as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualInterface {
    pub virtual_interface_id: String,
    /// Status label, verbatim from the provider.
    pub state: String,
    #[serde(flatten)]
    pub spec: VirtualInterfaceSpec,
}

/// The reconciler's view of one virtual interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRecord {
    /// Provider-assigned identity. `None` until created, cleared once gone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub spec: VirtualInterfaceSpec,
    /// Last status label seen on the remote side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl LocalRecord {
    /// Create an empty record for a desired spec.
    pub fn new(spec: VirtualInterfaceSpec) -> Self {
        Self {
            id: None,
            spec,
            state: None,
        }
    }

    pub fn is_present(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Overwrite the record from an observed interface.
    pub fn observe(&mut self, vi: &VirtualInterface) {
        self.id = Some(vi.virtual_interface_id.clone());
        self.spec = vi.spec.clone();
        self.state = Some(vi.state.clone());
    }

    /// Forget the remote identity so the next reconciliation recreates it.
    pub fn clear(&mut self) {
        self.id = None;
        self.state = None;
    }
}
