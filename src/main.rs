use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod commands;
mod config;
mod controller;
mod models;
mod render;
mod server;
mod services;
mod utils;

use config::AppConfig;
use controller::RenderOrdering;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override a configuration option, e.g. --set SERVER_PORT=5000
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    overrides: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (time endpoint and RPC dispatcher)
    Serve,
    /// Show the server time and draw new dots on demand
    View {
        /// Which graph response wins when requests overlap
        #[arg(long, value_enum, default_value_t = OrderingArg::LatestIssued)]
        ordering: OrderingArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OrderingArg {
    LatestIssued,
    LastResolved,
}

impl From<OrderingArg> for RenderOrdering {
    fn from(arg: OrderingArg) -> Self {
        match arg {
            OrderingArg::LatestIssued => RenderOrdering::LatestIssued,
            OrderingArg::LastResolved => RenderOrdering::LastResolved,
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("hellograph=debug".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap()))
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("📊 Starting hellograph v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };
    if let Err(e) = config.apply_overrides(&args.overrides) {
        error!("Invalid configuration override: {}", e);
        return;
    }

    let result = match args.command {
        Command::Serve => commands::serve::execute(&config).await,
        Command::View { ordering } => commands::view::execute(&config, ordering.into()).await,
    };

    if let Err(e) = result {
        error!("❌ {}", e);
        std::process::exit(1);
    }
}
