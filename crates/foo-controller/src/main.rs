use clap::{Parser, Subcommand};
use futures::StreamExt;
use kube::{Client, CustomResourceExt};

use foo_controller::{api::Foo, config::ControllerConfig, reconciler};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
enum Commands {
    /// Run the Foo reconciliation loop
    Run(ControllerConfig),
    /// Output the K8s manifest for the Foo CRD
    CrdManifest,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(EnvFilter::from_default_env())
        .try_init()?;

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Run(config)) => run_controller(config).await?,
        Some(Commands::CrdManifest) => {
            println!("{}", serde_yaml_ng::to_string(&Foo::crd())?);
        }
        None => {}
    }

    Ok(())
}

async fn run_controller(config: ControllerConfig) -> anyhow::Result<()> {
    let client = Client::try_default().await?;

    tracing::info!(
        namespace = config.namespace.as_deref().unwrap_or("*"),
        label_value = %config.label_value,
        concurrency = config.concurrency,
        "Starting Foo controller"
    );

    reconciler::control_loop(client, config)
        .for_each(|res| async move {
            match res {
                Ok((foo, _action)) => tracing::info!("Reconciled foo {}", foo),
                Err(e) => tracing::error!("Foo reconcile failed: {:?}", e),
            }
        })
        .await;

    tracing::info!("controller terminated");
    Ok(())
}
