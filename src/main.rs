//! # Billing API Main Entry Point
//!
//! `billing` (or `billing serve`) starts the HTTP server; `billing migrate`
//! applies pending migrations and exits; `billing config` prints the
//! effective configuration with secrets redacted.

use anyhow::Context;
use billing::{
    config::ConfigLoader,
    db::{init_pool, run_migrations},
    server::run_server,
    telemetry::init_tracing,
};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "billing")]
#[command(about = "Multi-tenant usage based billing service")]
#[command(version)]
struct Cli {
    /// Bind address (overrides BILLING_API_BIND_ADDR)
    #[arg(long, global = true)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    if let Some(bind) = cli.bind {
        config.api_bind_addr = bind;
    }

    init_tracing(&config).context("initializing tracing")?;
    tracing::info!(profile = %config.profile, "Loaded configuration");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Config => {
            println!("{}", config.redacted_json()?);
            Ok(())
        }
        Command::Migrate => {
            let db = init_pool(&config).await?;
            run_migrations(&db).await
        }
        Command::Serve => {
            let db = init_pool(&config).await?;
            if config.db_auto_migrate {
                run_migrations(&db).await?;
            }
            run_server(config, db).await
        }
    }
}
