//! kojiki-deploy - Deployment library for the Kojiki contracts.
//!
//! This crate deploys the Kojiki modules one after another, feeding the address of
//! each confirmed deployment into the constructors of the modules that depend on it.

pub mod artifacts;
pub mod client;
pub mod config;
mod ledger;
pub mod pipeline;
pub mod rpc;
mod sequencer;
pub mod spec;

pub use artifacts::{ArtifactStore, ContractArtifact};
pub use client::{ChainClient, ConfirmedDeployment, PendingDeployment};
pub use config::{Config, KojikiConfig, NetworkConfig, CONFIG_FILENAME};
pub use ledger::{AlreadyRecorded, DeploymentLedger, DeploymentRecord};
pub use pipeline::{KojikiModule, kojiki_pipeline};
pub use rpc::RpcChainClient;
pub use sequencer::{Sequencer, SequencerError, StepError, StepState, resolve_args};
pub use spec::{
    ArgSource, ArgValue, DeployOptions, DeploymentSpec, ModuleId, OrderingError, check_references,
};
