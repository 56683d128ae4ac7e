//! Deployment descriptions: what to deploy and where each constructor argument comes from.

use std::collections::HashSet;
use std::fmt;

use alloy_core::primitives::Address;
use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};

/// Identifier of a deployable module, unique within a pipeline.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Deref, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Where a constructor argument comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgSource {
    /// A configuration value, passed through unchanged.
    Literal(String),
    /// The address recorded for a previously deployed module.
    Ref(ModuleId),
}

impl ArgSource {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn reference(module: impl Into<ModuleId>) -> Self {
        Self::Ref(module.into())
    }
}

impl fmt::Display for ArgSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgSource::Literal(value) => write!(f, "{value}"),
            ArgSource::Ref(module) => write!(f, "&{module}"),
        }
    }
}

/// A constructor argument after resolution against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgValue {
    Literal(String),
    Address(Address),
}

impl ArgValue {
    /// String form handed to the ABI encoder.
    pub fn to_abi_string(&self) -> String {
        match self {
            ArgValue::Literal(value) => value.clone(),
            ArgValue::Address(address) => address.to_checksum(None),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_abi_string())
    }
}

/// Extra options attached to a deployment transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployOptions {
    /// Native currency to send with the deployment, in wei.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl DeployOptions {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

/// Immutable description of one module deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    /// Ledger key for the deployed module.
    pub module: ModuleId,
    /// Name of the compiled contract to deploy.
    pub contract: String,
    /// Constructor arguments, in declaration order.
    pub args: Vec<ArgSource>,
    #[serde(default)]
    pub options: DeployOptions,
}

impl DeploymentSpec {
    pub fn new(module: impl Into<ModuleId>, contract: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            contract: contract.into(),
            args: Vec::new(),
            options: DeployOptions::default(),
        }
    }

    /// Append a literal constructor argument.
    pub fn literal(mut self, value: impl Into<String>) -> Self {
        self.args.push(ArgSource::literal(value));
        self
    }

    /// Append a reference to a previously deployed module's address.
    pub fn reference(mut self, module: impl Into<ModuleId>) -> Self {
        self.args.push(ArgSource::reference(module));
        self
    }

    pub fn value(mut self, wei: impl Into<String>) -> Self {
        self.options.value = Some(wei.into());
        self
    }

    /// Modules this spec reads addresses from.
    pub fn references(&self) -> impl Iterator<Item = &ModuleId> {
        self.args.iter().filter_map(|arg| match arg {
            ArgSource::Ref(module) => Some(module),
            ArgSource::Literal(_) => None,
        })
    }
}

/// Problems found by [`check_references`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderingError {
    #[error("module `{module}` references `{reference}`, which is not deployed earlier")]
    ForwardReference { module: ModuleId, reference: ModuleId },

    #[error("module `{0}` appears more than once")]
    DuplicateModule(ModuleId),
}

/// Check that every reference points at a module appearing strictly earlier.
pub fn check_references(specs: &[DeploymentSpec]) -> Result<(), OrderingError> {
    let mut seen: HashSet<&ModuleId> = HashSet::with_capacity(specs.len());

    for spec in specs {
        if let Some(reference) = spec.references().find(|r| !seen.contains(r)) {
            return Err(OrderingError::ForwardReference {
                module: spec.module.clone(),
                reference: reference.clone(),
            });
        }

        if !seen.insert(&spec.module) {
            return Err(OrderingError::DuplicateModule(spec.module.clone()));
        }
    }

    Ok(())
}
