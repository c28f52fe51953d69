//! Virtual interface reconciler - drives one interface against the provider.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::Reconciler;
use crate::clients::ProviderClient;
use crate::config::ReconcilerConfig;
use crate::error::{Error, Result};
use crate::model::{state, LocalRecord, VirtualInterface};
use crate::refresh::{Refresh, StateRefresh, VirtualInterfaceRefresh};
use crate::waiter::{WaitConfig, Waiter};

/// Reconciler for private virtual interfaces on a dedicated connection.
pub struct VirtualInterfaceReconciler {
    client: Arc<dyn ProviderClient>,
    config: ReconcilerConfig,
    shutdown: Option<watch::Receiver<bool>>,
}

impl VirtualInterfaceReconciler {
    pub fn new(client: Arc<dyn ProviderClient>, config: ReconcilerConfig) -> Self {
        Self {
            client,
            config,
            shutdown: None,
        }
    }

    /// Cancel in-flight waits when `shutdown` turns true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn refresher(&self, record: &LocalRecord, id: &str) -> VirtualInterfaceRefresh {
        VirtualInterfaceRefresh::new(Arc::clone(&self.client), &record.spec.connection_id, id)
    }

    fn waiter(&self, config: WaitConfig) -> Waiter {
        let waiter = Waiter::new(config);
        match &self.shutdown {
            Some(rx) => waiter.with_shutdown(rx.clone()),
            None => waiter,
        }
    }

    /// Wait for a freshly created interface to become usable.
    async fn converge(&self, record: &LocalRecord, id: &str) -> Result<VirtualInterface> {
        let refresh = self.refresher(record, id);
        let outcome = self.waiter(self.config.create_wait()).wait(&refresh).await?;
        outcome.object.ok_or(Error::NotFound {
            checks: outcome.probes,
        })
    }

    /// Best-effort removal of an interface that never converged.
    async fn discard(&self, id: &str) {
        match self.client.delete(id).await {
            Ok(_) => info!(id = %id, "Deleted virtual interface that failed to converge"),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(
                id = %id,
                error = %e,
                "Failed to delete virtual interface that failed to converge"
            ),
        }
    }

    /// Single probe shared by Read and Update.
    async fn probe(&self, record: &mut LocalRecord) -> Result<Option<VirtualInterface>> {
        let id = match record.id.clone().filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => return Err(Error::MissingId),
        };

        match self.refresher(record, &id).refresh().await {
            Refresh::Failed(e) => Err(e),
            Refresh::Absent => {
                warn!(id = %id, "Virtual interface not found, clearing record");
                record.clear();
                Ok(None)
            }
            Refresh::Observed { state: status, .. } if state::is_terminal(&status) => {
                warn!(id = %id, state = %status, "Virtual interface is gone, clearing record");
                record.clear();
                Ok(None)
            }
            Refresh::Observed { object, state } => {
                let drift = record.spec.drifted_fields(&object.spec);
                if !drift.is_empty() {
                    warn!(id = %id, fields = ?drift, "Virtual interface drifted from record");
                }
                debug!(id = %id, state = %state, "Refreshed virtual interface");
                record.observe(&object);
                Ok(Some(object))
            }
        }
    }
}

#[async_trait]
impl Reconciler for VirtualInterfaceReconciler {
    type Record = LocalRecord;
    type Observed = VirtualInterface;

    async fn create(&self, record: &mut LocalRecord) -> Result<VirtualInterface> {
        if let Some(id) = record.id.as_ref().filter(|id| !id.is_empty()) {
            return Err(Error::AlreadyCreated(id.clone()));
        }

        let spec = &record.spec;
        info!(
            connection_id = %spec.connection_id,
            name = %spec.virtual_interface_name,
            vlan = spec.vlan,
            asn = spec.asn,
            "Creating virtual interface"
        );

        let created = self
            .client
            .create(spec)
            .await
            .map_err(|e| Error::client("create", spec.virtual_interface_name.clone(), e))?;
        if created.virtual_interface_id.is_empty() {
            return Err(Error::EmptyId);
        }

        let id = created.virtual_interface_id.clone();
        record.id = Some(id.clone());
        record.state = Some(created.state.clone());
        info!(id = %id, state = %created.state, "Waiting for virtual interface to become available");

        match self.converge(record, &id).await {
            Ok(vi) => {
                info!(id = %id, state = %vi.state, "Virtual interface available");
                record.observe(&vi);
                Ok(vi)
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Virtual interface failed to converge");
                record.clear();
                self.discard(&id).await;
                Err(e)
            }
        }
    }

    async fn read(&self, record: &mut LocalRecord) -> Result<Option<VirtualInterface>> {
        self.probe(record).await
    }

    async fn update(&self, record: &mut LocalRecord) -> Result<Option<VirtualInterface>> {
        // Every attribute forces a new interface, so there is nothing to send.
        self.probe(record).await
    }

    async fn delete(&self, record: &mut LocalRecord) -> Result<()> {
        let id = match record.id.clone().filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => {
                debug!("No virtual interface to delete");
                return Ok(());
            }
        };

        info!(id = %id, "Deleting virtual interface");
        match self.client.delete(&id).await {
            Ok(state) => debug!(id = %id, state = %state, "Delete accepted"),
            Err(e) if e.is_not_found() => info!(id = %id, "Virtual interface already deleted"),
            Err(e) => return Err(Error::client("delete", id, e)),
        }

        if self.config.wait_for_deletion {
            let refresh = self.refresher(record, &id);
            self.waiter(self.config.delete_wait()).wait(&refresh).await?;
            info!(id = %id, "Virtual interface deleted");
        }

        record.clear();
        Ok(())
    }
}
