//! Compiled contract artifacts and constructor encoding.

use std::path::{Path, PathBuf};

use alloy_core::dyn_abi::{DynSolValue, Specifier};
use alloy_core::json_abi::JsonAbi;
use anyhow::{Context, Result};
use serde::Deserialize;

use crate::spec::ArgValue;

/// Hardhat/Foundry style artifact: the ABI plus creation bytecode.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractArtifact {
    pub abi: JsonAbi,
    /// Creation bytecode, `0x`-prefixed hex.
    pub bytecode: String,
}

impl ContractArtifact {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))
    }

    /// Creation bytecode followed by the ABI-encoded constructor arguments.
    pub fn deploy_data(&self, args: &[ArgValue]) -> Result<Vec<u8>> {
        let bytecode = self.bytecode.trim_start_matches("0x");
        if bytecode.is_empty() {
            anyhow::bail!("Artifact has no creation bytecode (abstract contract or interface?)");
        }

        let mut data = hex::decode(bytecode).context("Artifact bytecode is not valid hex")?;
        data.extend(encode_constructor_args(&self.abi, args)?);
        Ok(data)
    }
}

/// ABI-encode `args` against the constructor inputs declared in `abi`.
///
/// Each argument is coerced from its string form to the declared Solidity type.
pub fn encode_constructor_args(abi: &JsonAbi, args: &[ArgValue]) -> Result<Vec<u8>> {
    let inputs = abi
        .constructor
        .as_ref()
        .map(|c| c.inputs.as_slice())
        .unwrap_or_default();

    if inputs.len() != args.len() {
        anyhow::bail!(
            "Constructor expects {} argument(s), got {}",
            inputs.len(),
            args.len()
        );
    }

    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    let values = inputs
        .iter()
        .zip(args)
        .enumerate()
        .map(|(i, (param, arg))| {
            let ty = param
                .resolve()
                .with_context(|| format!("Unsupported constructor type `{}`", param.ty))?;
            ty.coerce_str(&arg.to_abi_string()).with_context(|| {
                format!("Argument {} (`{}`) is not a valid `{}`", i, arg, param.ty)
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DynSolValue::Tuple(values).abi_encode_params())
}

/// Locates artifacts by contract name under a build output directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find and load `<contract>.json` anywhere under the store root.
    pub fn load(&self, contract: &str) -> Result<ContractArtifact> {
        let file_name = format!("{contract}.json");
        let path = find_file(&self.root, &file_name)?.with_context(|| {
            format!(
                "No artifact named {} under {}",
                file_name,
                self.root.display()
            )
        })?;

        tracing::debug!(contract, path = %path.display(), "Loading contract artifact");
        ContractArtifact::load(&path)
    }
}

fn find_file(dir: &Path, file_name: &str) -> Result<Option<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read artifacts directory {}", dir.display()))?;

    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry.context("Failed to read directory entry")?.path();
        if path.is_dir() {
            // Hardhat writes solc inputs here, never deployable artifacts.
            if path.file_name().is_some_and(|name| name == "build-info") {
                continue;
            }
            subdirs.push(path);
        } else if path.file_name().is_some_and(|name| name == file_name) {
            return Ok(Some(path));
        }
    }

    subdirs.sort();
    for subdir in subdirs {
        if let Some(found) = find_file(&subdir, file_name)? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}
