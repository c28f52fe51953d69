//! In-process provider.
//!
//! Each interface walks through a scripted list of states: the n-th describe
//! reports the n-th state, and the last state sticks. Failures can be injected per
//! operation, and interfaces can be removed behind the reconciler's back.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tonic::Status;
use tracing::debug;
use uuid::Uuid;

use super::{ClientError, DescribeFilter, ProviderClient, Result};
use crate::model::{state, VirtualInterface, VirtualInterfaceSpec};

struct Entry {
    interface: VirtualInterface,
    /// States still to be reported, front first.
    script: VecDeque<String>,
}

#[derive(Default)]
struct Faults {
    create: Option<Status>,
    describe: VecDeque<Status>,
    delete: Option<Status>,
}

/// In-memory provider client.
pub struct MemoryClient {
    interfaces: Mutex<HashMap<String, Entry>>,
    script: Vec<String>,
    faults: Mutex<Faults>,
    describe_calls: AtomicU32,
    delete_calls: AtomicU32,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    /// New interfaces report `pending` once, then `available`.
    pub fn new() -> Self {
        Self::with_script([state::PENDING, state::AVAILABLE])
    }

    /// New interfaces report `states` in order, one per describe.
    pub fn with_script<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            interfaces: Mutex::new(HashMap::new()),
            script: states.into_iter().map(Into::into).collect(),
            faults: Mutex::new(Faults::default()),
            describe_calls: AtomicU32::new(0),
            delete_calls: AtomicU32::new(0),
        }
    }

    /// Fail the next create with `status`.
    pub fn fail_next_create(&self, status: Status) {
        self.faults_mut().create = Some(status);
    }

    /// Queue a failure for an upcoming describe.
    pub fn fail_next_describe(&self, status: Status) {
        self.faults_mut().describe.push_back(status);
    }

    /// Fail the next delete with `status`.
    pub fn fail_next_delete(&self, status: Status) {
        self.faults_mut().delete = Some(status);
    }

    /// Drop an interface as if it was deleted out of band.
    pub fn remove(&self, id: &str) -> bool {
        self.interfaces_mut().remove(id).is_some()
    }

    /// Force the state of an existing interface, discarding its script.
    pub fn set_state(&self, id: &str, new_state: &str) -> bool {
        match self.interfaces_mut().get_mut(id) {
            Some(entry) => {
                entry.script.clear();
                entry.interface.state = new_state.to_string();
                true
            }
            None => false,
        }
    }

    /// Overwrite the remote copy of an interface's attributes.
    pub fn set_spec(&self, id: &str, spec: VirtualInterfaceSpec) -> bool {
        match self.interfaces_mut().get_mut(id) {
            Some(entry) => {
                entry.interface.spec = spec;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.interfaces_mut().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn describe_calls(&self) -> u32 {
        self.describe_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn interfaces_mut(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.interfaces.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn faults_mut(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ProviderClient for MemoryClient {
    async fn create(&self, spec: &VirtualInterfaceSpec) -> Result<VirtualInterface> {
        if let Some(status) = self.faults_mut().create.take() {
            return Err(ClientError::Rpc {
                operation: "create",
                status,
            });
        }

        let id = format!("dxvif-{}", &Uuid::new_v4().simple().to_string()[..8]);
        let script: VecDeque<String> = self.script.iter().cloned().collect();
        let initial = script
            .front()
            .cloned()
            .unwrap_or_else(|| state::PENDING.to_string());
        let interface = VirtualInterface {
            virtual_interface_id: id.clone(),
            state: initial,
            spec: spec.clone(),
        };

        debug!(id = %id, "memory provider: created virtual interface");
        self.interfaces_mut().insert(
            id,
            Entry {
                interface: interface.clone(),
                script,
            },
        );
        Ok(interface)
    }

    async fn describe(&self, filter: &DescribeFilter) -> Result<Vec<VirtualInterface>> {
        let call = self.describe_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(status) = self.faults_mut().describe.pop_front() {
            return Err(ClientError::Rpc {
                operation: "describe",
                status,
            });
        }

        let mut interfaces = self.interfaces_mut();
        let mut found = Vec::new();
        for entry in interfaces.values_mut() {
            if !filter.matches(&entry.interface) {
                continue;
            }
            if let Some(next) = entry.script.pop_front() {
                entry.interface.state = next;
            }
            found.push(entry.interface.clone());
        }
        debug!(call, matched = found.len(), "memory provider: describe");

        if found.is_empty() && filter.virtual_interface_id.is_some() {
            return Err(ClientError::NotFound(format!(
                "virtual interface {} does not exist",
                filter.virtual_interface_id.as_deref().unwrap_or_default()
            )));
        }
        Ok(found)
    }

    async fn delete(&self, id: &str) -> Result<String> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.faults_mut().delete.take() {
            return Err(ClientError::Rpc {
                operation: "delete",
                status,
            });
        }

        match self.interfaces_mut().remove(id) {
            Some(_) => {
                debug!(id = %id, "memory provider: deleted virtual interface");
                Ok(state::DELETING.to_string())
            }
            None => Err(ClientError::NotFound(format!(
                "virtual interface {} does not exist",
                id
            ))),
        }
    }
}
