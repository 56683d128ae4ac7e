//! The append-only record of deployed modules.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::spec::ModuleId;

/// One confirmed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub module: ModuleId,
    pub contract: String,
    pub address: Address,
    /// Position in execution order, starting at 0.
    pub sequence: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
}

impl fmt::Display for DeploymentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} contract {}", self.module, self.address)
    }
}

/// Returned when a module is recorded twice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("module `{0}` is already recorded in the ledger")]
pub struct AlreadyRecorded(pub ModuleId);

/// Module to address mapping accumulated during a single run.
///
/// Iteration order is insertion order, which is execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentLedger {
    records: Vec<DeploymentRecord>,
    index: HashMap<ModuleId, usize>,
}

impl DeploymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record for `module`. The sequence index is assigned here.
    pub fn record(
        &mut self,
        module: ModuleId,
        contract: impl Into<String>,
        address: Address,
        tx_hash: Option<B256>,
    ) -> Result<&DeploymentRecord, AlreadyRecorded> {
        if self.index.contains_key(&module) {
            return Err(AlreadyRecorded(module));
        }

        let sequence = self.records.len();
        self.index.insert(module.clone(), sequence);
        self.records.push(DeploymentRecord {
            module,
            contract: contract.into(),
            address,
            sequence,
            tx_hash,
        });

        Ok(&self.records[sequence])
    }

    pub fn get(&self, module: &ModuleId) -> Option<&DeploymentRecord> {
        self.index.get(module).map(|&i| &self.records[i])
    }

    pub fn address_of(&self, module: &ModuleId) -> Option<Address> {
        self.get(module).map(|record| record.address)
    }

    pub fn contains(&self, module: &ModuleId) -> bool {
        self.index.contains_key(module)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.records.iter()
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleId> {
        self.records.iter().map(|record| &record.module)
    }

    /// Render the ledger as a table for the terminal.
    pub fn to_table(&self) -> comfy_table::Table {
        let mut table = comfy_table::Table::new();
        table.set_header(vec!["#", "Module", "Contract", "Address"]);
        for record in &self.records {
            table.add_row(vec![
                record.sequence.to_string(),
                record.module.to_string(),
                record.contract.clone(),
                record.address.to_string(),
            ]);
        }
        table
    }

    /// Write the ledger to a JSON deployments file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment ledger")?;

        std::fs::write(path, json)
            .with_context(|| format!("Failed to write deployments to {}", path.display()))?;

        tracing::info!(path = %path.display(), modules = self.len(), "Deployments saved");
        Ok(())
    }

    /// Load a ledger previously written by [`DeploymentLedger::save_to_file`].
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Deployments file does not exist: {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployments from {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse deployments JSON")
    }
}

/// On-disk layout of a ledger.
#[derive(Serialize, Deserialize)]
struct LedgerFile {
    deployments: Vec<DeploymentRecord>,
}

impl Serialize for DeploymentLedger {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        LedgerFile {
            deployments: self.records.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DeploymentLedger {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let file = LedgerFile::deserialize(deserializer)?;
        let mut ledger = DeploymentLedger::new();

        // Re-recording reassigns sequence numbers from file order.
        for record in file.deployments {
            ledger
                .record(record.module, record.contract, record.address, record.tx_hash)
                .map_err(serde::de::Error::custom)?;
        }

        Ok(ledger)
    }
}
