mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use portalflow_config::PortalConfig;
use portalflow_http::{ClientConfig, PortalClient};
use portalflow_order::{OrderService, PollPolicy, Tolerance};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Inspect and drive self-service portal orders", long_about = None)]
struct Cli {
    /// Config file (defaults to ./portal.yaml, then ~/.config/portalflow/config.yaml)
    #[arg(short, long, global = true, env = "PORTAL_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work with orders
    Order {
        #[command(subcommand)]
        command: OrderCommands,
    },
    /// Show the resolved configuration
    Config,
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum OrderCommands {
    /// Show status, last action and item tree of an order
    Show {
        /// Order ID
        id: String,
    },
    /// Wait until an order and its last action have finished
    Wait {
        /// Order ID
        id: String,
        /// Give up after this many seconds (overrides the config)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run an action against an order and wait for it
    Action {
        /// Order ID
        id: String,
        /// Action name, e.g. vm_reboot or s3_bucket_create
        name: String,
        /// Target item (defaults to the root item)
        #[arg(short, long)]
        item: Option<String>,
        /// Action attributes as a JSON object
        #[arg(short, long)]
        attrs: Option<String>,
        /// Accept a warning or failed action instead of exiting with an error
        #[arg(long, value_enum)]
        tolerate: Option<TolerateArg>,
    },
    /// Print the output of an action
    Output {
        /// Order ID
        id: String,
        /// Action ID from the order history
        action_id: String,
    },
    /// Create an order and wait until it is provisioned
    Create {
        /// Order label
        #[arg(long)]
        label: String,
        /// Product to order
        #[arg(long)]
        product_id: String,
        /// Order attributes as a JSON object
        #[arg(short, long)]
        attrs: Option<String>,
        /// Lifetime in days
        #[arg(long)]
        lifetime: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TolerateArg {
    /// Continue on a warning
    Warning,
    /// Continue on a warning or a failed action
    Failure,
}

impl From<TolerateArg> for Tolerance {
    fn from(arg: TolerateArg) -> Self {
        match arg {
            TolerateArg::Warning => Tolerance::AllowWarning,
            TolerateArg::Failure => Tolerance::AllowActionFailure,
        }
    }
}

/// Everything an order command needs
pub struct Context {
    pub config: PortalConfig,
    pub service: Arc<dyn OrderService>,
    pub policy: PollPolicy,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PortalConfig> {
    let config = match path {
        Some(path) => PortalConfig::from_file(path)?,
        None => PortalConfig::load()?,
    };
    if let Some(source) = &config.source {
        tracing::debug!("Loaded config from {}", source.display());
    }
    Ok(config)
}

fn connect(config: PortalConfig) -> anyhow::Result<Context> {
    let mut client_config = ClientConfig::new(&config.api_url, &config.token);
    if let Some(timeout) = config.request_timeout() {
        client_config = client_config.with_timeout(timeout);
    }
    let client = PortalClient::new(client_config)?;

    // Ctrl-C stops a settle wait between two polls
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let policy = config.poll.to_policy().with_cancellation(cancel);
    Ok(Context {
        config,
        service: Arc::new(client),
        policy,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match cli.command {
        Commands::Version => {
            println!("portalflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Config => {
            let config = load_config(cli.config.as_ref())?;
            commands::config::handle(&config);
            Ok(())
        }
        Commands::Order { command } => {
            let config = load_config(cli.config.as_ref())?;
            let ctx = connect(config)?;
            if let Err(e) = commands::order::handle(&ctx, command).await {
                eprintln!("{} {:#}", "✗".red().bold(), e);
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
