//! dxvif: reconciler for dedicated-connection virtual interfaces.
//!
//! The crate drives one virtual interface through its lifecycle against the
//! provider API:
//! - `clients`: the remote provider surface (gRPC and in-memory)
//! - `refresh`: single-shot status probes
//! - `waiter`: poll-until-converged loop with deadline and cancellation
//! - `reconciler`: Create/Read/Update/Delete over a local record

pub mod clients;
pub mod config;
pub mod error;
pub mod model;
pub mod proto;
pub mod reconciler;
pub mod refresh;
pub mod waiter;

pub use config::ReconcilerConfig;
pub use error::{Error, Result};
pub use model::{LocalRecord, VirtualInterface, VirtualInterfaceSpec};
