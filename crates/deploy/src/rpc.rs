//! JSON-RPC chain client.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, U256};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

use crate::{
    artifacts::ArtifactStore,
    client::{ChainClient, ConfirmedDeployment, PendingDeployment},
    config::NetworkConfig,
    spec::{ArgValue, DeployOptions},
};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url.clone())
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!(
            "RPC error: {}",
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// The subset of a transaction receipt needed to confirm a deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: B256,
    /// `0x1` on success, `0x0` on revert. Absent on pre-Byzantium chains.
    status: Option<String>,
    contract_address: Option<Address>,
}

impl TransactionReceipt {
    fn into_confirmed(self) -> Result<ConfirmedDeployment, anyhow::Error> {
        if self.status.as_deref().is_some_and(|s| s != "0x1") {
            anyhow::bail!("Deployment transaction {} reverted", self.transaction_hash);
        }

        let address = self.contract_address.with_context(|| {
            format!(
                "Receipt for {} has no contract address",
                self.transaction_hash
            )
        })?;

        Ok(ConfirmedDeployment {
            address,
            tx_hash: Some(self.transaction_hash),
        })
    }
}

/// Receipt not available yet; the transaction is still in the mempool.
#[derive(Debug, thiserror::Error)]
#[error("transaction {0} not mined yet")]
struct NotMined(B256);

/// Only a missing receipt is worth polling again; any other error repeats on every poll.
fn is_not_mined(err: &anyhow::Error) -> bool {
    err.is::<NotMined>()
}

/// [`ChainClient`] that talks to a node over JSON-RPC.
///
/// Deployments are sent with `eth_sendTransaction`, so the node must manage the
/// deployer account (Anvil and Hardhat nodes do).
pub struct RpcChainClient {
    http: reqwest::Client,
    rpc_url: Url,
    from: Address,
    artifacts: ArtifactStore,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl RpcChainClient {
    /// Connect to the node described by `config`.
    ///
    /// When no deployer is configured the node's first account is used.
    pub async fn connect(config: &NetworkConfig) -> Result<Self, anyhow::Error> {
        let http = create_client()?;

        let chain_id: U256 = json_rpc_call(&http, &config.rpc_url, "eth_chainId", vec![])
            .await
            .with_context(|| format!("Failed to reach node at {}", config.rpc_url))?;

        let from = match config.deployer {
            Some(address) => address,
            None => {
                let accounts: Vec<Address> =
                    json_rpc_call(&http, &config.rpc_url, "eth_accounts", vec![]).await?;
                accounts
                    .first()
                    .copied()
                    .context("Node exposes no accounts and no deployer is configured")?
            }
        };

        tracing::info!(
            rpc_url = %config.rpc_url,
            chain_id = %chain_id,
            deployer = %from,
            "Connected to node"
        );

        Ok(Self {
            http,
            rpc_url: config.rpc_url.clone(),
            from,
            artifacts: ArtifactStore::new(&config.artifacts_dir),
            poll_interval: config.poll_interval(),
            confirmation_timeout: config.confirmation_timeout(),
        })
    }

    pub fn deployer(&self) -> Address {
        self.from
    }

    async fn fetch_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt, anyhow::Error> {
        let receipt: Option<TransactionReceipt> = json_rpc_call(
            &self.http,
            &self.rpc_url,
            "eth_getTransactionReceipt",
            vec![serde_json::json!(tx_hash)],
        )
        .await?;

        receipt.ok_or_else(|| NotMined(tx_hash).into())
    }

    fn max_polls(&self) -> usize {
        let interval = self.poll_interval.as_millis().max(1);
        (self.confirmation_timeout.as_millis() / interval).max(1) as usize
    }
}

impl ChainClient for RpcChainClient {
    async fn deploy_contract(
        &self,
        contract: &str,
        args: &[ArgValue],
        options: &DeployOptions,
    ) -> Result<PendingDeployment, anyhow::Error> {
        let artifact = self.artifacts.load(contract)?;
        let data = artifact
            .deploy_data(args)
            .with_context(|| format!("Failed to encode deployment of {}", contract))?;

        let mut tx = serde_json::json!({
            "from": self.from,
            "data": format!("0x{}", hex::encode(data)),
        });

        if let Some(value) = &options.value {
            let wei: U256 = value
                .parse()
                .with_context(|| format!("Invalid deployment value `{}`", value))?;
            tx["value"] = serde_json::json!(format!("0x{:x}", wei));
        }

        let tx_hash: B256 = json_rpc_call(&self.http, &self.rpc_url, "eth_sendTransaction", vec![tx])
            .await
            .with_context(|| format!("Failed to send deployment of {}", contract))?;

        tracing::debug!(contract, tx_hash = %tx_hash, "Deployment transaction sent");

        Ok(PendingDeployment {
            contract: contract.to_string(),
            tx_hash: Some(tx_hash),
        })
    }

    async fn wait_for_deployment(
        &self,
        pending: PendingDeployment,
    ) -> Result<ConfirmedDeployment, anyhow::Error> {
        let tx_hash = pending
            .tx_hash
            .context("Pending deployment has no transaction hash")?;

        let receipt = (|| self.fetch_receipt(tx_hash))
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.poll_interval)
                    .with_max_times(self.max_polls()),
            )
            .when(is_not_mined)
            .notify(|err: &anyhow::Error, after: Duration| {
                tracing::trace!(error = %err, retry_in = ?after, contract = %pending.contract, "Waiting for receipt");
            })
            .await
            .with_context(|| {
                format!(
                    "No receipt for {} within {:?}",
                    pending.contract, self.confirmation_timeout
                )
            })?;

        receipt.into_confirmed()
    }
}
