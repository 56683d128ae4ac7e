//! kojiki deploys the Kojiki DEX contracts in dependency order and reports their addresses.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command, DeployArgs, PipelineArgs};
use kojiki_deploy::{
    Config, DeploymentSpec, RpcChainClient, Sequencer, check_references, kojiki_pipeline,
    pipeline::unix_now,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Plan(args) => {
            let specs = build_pipeline(&config, &args)?;
            println!("{}", plan_table(&specs));
            Ok(())
        }
        Command::Deploy(args) => {
            args.apply(&mut config);
            deploy(config, args).await
        }
    }
}

/// Build the ordered pipeline and check its references before anything touches the chain.
fn build_pipeline(config: &Config, args: &PipelineArgs) -> Result<Vec<DeploymentSpec>> {
    let specs = kojiki_pipeline(&config.kojiki, unix_now(), &args.skip);

    check_references(&specs).context("Invalid deployment pipeline")?;

    Ok(specs)
}

async fn deploy(config: Config, args: DeployArgs) -> Result<()> {
    let specs = build_pipeline(&config, &args.pipeline)?;

    if let Some(path) = &args.save_config {
        config.save_to_file(path)?;
    }

    tracing::info!(
        rpc_url = %config.network.rpc_url,
        artifacts = %config.network.artifacts_dir.display(),
        modules = specs.len(),
        "Starting deployment process..."
    );

    let client = RpcChainClient::connect(&config.network)
        .await
        .context("Failed to initialize chain client")?;

    let mut sequencer = Sequencer::new(client);

    match sequencer.run(&specs).await {
        Ok(ledger) => {
            tracing::info!("✓ Deployment complete!");
            eprintln!("{}", ledger.to_table());

            if let Some(path) = &args.deployments {
                ledger.save_to_file(path)?;
            }
            Ok(())
        }
        Err(err) => {
            tracing::error!(
                module = %err.module,
                completed = err.ledger.len(),
                "Deployment aborted; modules below are already on chain"
            );
            eprintln!("{}", err.ledger.to_table());

            if let Some(path) = &args.deployments {
                err.ledger
                    .save_to_file(path)
                    .context("Failed to save partial deployments")?;
            }
            Err(err.into())
        }
    }
}

fn plan_table(specs: &[DeploymentSpec]) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.set_header(vec!["#", "Module", "Contract", "Arguments", "Value"]);

    for (i, spec) in specs.iter().enumerate() {
        let args = spec
            .args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        table.add_row(vec![
            i.to_string(),
            spec.module.to_string(),
            spec.contract.clone(),
            args,
            spec.options.value.clone().unwrap_or_default(),
        ]);
    }

    table
}
