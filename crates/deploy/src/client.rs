//! The chain client seam used by the sequencer.

use std::future::Future;

use alloy_core::primitives::{Address, B256};
use anyhow::Result;

use crate::spec::{ArgValue, DeployOptions};

/// Handle to a submitted, not yet confirmed, deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeployment {
    /// Contract name the deployment was submitted for.
    pub contract: String,
    /// Transaction hash, when the client has one.
    pub tx_hash: Option<B256>,
}

/// A deployment that the chain reports as final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedDeployment {
    pub address: Address,
    pub tx_hash: Option<B256>,
}

/// Submits contract deployments and waits for them to be mined.
///
/// The sequencer calls `deploy_contract` then `wait_for_deployment` exactly once per
/// module and treats any error as fatal. Retry and timeout policy belong to the
/// implementation.
pub trait ChainClient: Send + Sync {
    /// Submit a deployment of `contract` with already-resolved constructor arguments.
    fn deploy_contract(
        &self,
        contract: &str,
        args: &[ArgValue],
        options: &DeployOptions,
    ) -> impl Future<Output = Result<PendingDeployment>> + Send;

    /// Suspend until `pending` is confirmed, returning the deployed address.
    fn wait_for_deployment(
        &self,
        pending: PendingDeployment,
    ) -> impl Future<Output = Result<ConfirmedDeployment>> + Send;
}
