use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use kojiki_deploy::{Config, KojikiModule};
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "kojiki")]
#[command(author, version, about = "Deploy the Kojiki contracts in dependency order")]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "KOJIKI_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a Kojiki.toml configuration file, or a directory containing one.
    #[arg(long, alias = "conf", global = true, env = "KOJIKI_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy every module and report the resulting addresses.
    Deploy(DeployArgs),
    /// Print the deployment order and constructor arguments without deploying.
    Plan(PipelineArgs),
}

/// Options shaping which modules are part of the run.
#[derive(Debug, Clone, Args)]
pub struct PipelineArgs {
    /// Leave a module out of the run. Only modules nothing else depends on can be skipped.
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<KojikiModule>,
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// JSON-RPC endpoint of the node to deploy to.
    #[arg(long, alias = "rpc")]
    pub rpc_url: Option<Url>,

    /// Account sending the deployments. Defaults to the node's first account.
    #[arg(long)]
    pub deployer: Option<Address>,

    /// Directory holding the compiled contract artifacts.
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// Write the resulting deployments (or the partial ones on failure) to this JSON file.
    #[arg(long, alias = "out")]
    pub deployments: Option<PathBuf>,

    /// Save the resolved configuration to this TOML file before deploying.
    #[arg(long)]
    pub save_config: Option<PathBuf>,
}

impl DeployArgs {
    /// Apply command line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(rpc_url) = &self.rpc_url {
            config.network.rpc_url = rpc_url.clone();
        }
        if let Some(deployer) = self.deployer {
            config.network.deployer = Some(deployer);
        }
        if let Some(artifacts) = &self.artifacts {
            config.network.artifacts_dir = artifacts.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deploy_with_skips() {
        let cli = Cli::try_parse_from([
            "kojiki",
            "deploy",
            "--skip",
            "lock,multicall",
            "--rpc-url",
            "http://localhost:9545",
        ])
        .unwrap();

        let Command::Deploy(args) = cli.command else {
            panic!("expected deploy command");
        };
        assert_eq!(
            args.pipeline.skip,
            vec![KojikiModule::Lock, KojikiModule::Multicall]
        );

        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.network.rpc_url.as_str(), "http://localhost:9545/");
    }

    #[test]
    fn test_unknown_module_is_rejected() {
        assert!(Cli::try_parse_from(["kojiki", "plan", "--skip", "usdc"]).is_err());
    }

    #[test]
    fn test_invalid_deployer_is_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["kojiki", "deploy", "--deployer", "0x1234"]).is_err());
    }

    #[test]
    fn test_deployer_overrides_config() {
        let cli = Cli::try_parse_from([
            "kojiki",
            "deploy",
            "--deployer",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
        ])
        .unwrap();
        let Command::Deploy(args) = cli.command else {
            panic!("expected deploy command");
        };

        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(
            config.network.deployer,
            Some("0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap())
        );
    }
}
