use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scalarweb_client::ScalarClient;
use scalarweb_client::auth::{CheckOutcome, LegacyClient, PairingOutcome};
use scalarweb_client::config::ClientConfig;

#[derive(Parser)]
#[command(name = "scalarweb")]
#[command(about = "Pair with and query a ScalarWeb device")]
struct Cli {
    /// Device URL, e.g. http://192.168.1.20
    #[arg(long)]
    device: String,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Client id registered with the device
    #[arg(long)]
    device_id: Option<String>,

    /// Name shown on the device's registered-clients list
    #[arg(long)]
    device_name: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Debug logging
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the methods, versions and notifications of a service as JSON
    Capabilities { service: String },

    /// Request an access code, or submit the one shown on the device
    Pair {
        #[arg(long)]
        code: Option<String>,
        #[command(flatten)]
        legacy: LegacyArgs,
    },

    /// Renew an existing registration
    Renew {
        #[command(flatten)]
        legacy: LegacyArgs,
    },

    /// Report which credential the device accepts
    Check {
        #[arg(long)]
        code: Option<String>,
    },

    /// Check access and pair if needed. Use RQST as code to request a new one.
    Login {
        #[arg(long)]
        code: Option<String>,
        #[command(flatten)]
        legacy: LegacyArgs,
    },
}

#[derive(clap::Args)]
struct LegacyArgs {
    /// Legacy registration URL advertised by the device
    #[arg(long)]
    legacy_url: Option<String>,

    /// Registration mode advertised with the legacy URL
    #[arg(long)]
    registration_mode: Option<u32>,

    /// Device id header name advertised by the legacy system info (without "X-")
    #[arg(long)]
    action_header: Option<String>,
}

impl From<LegacyArgs> for LegacyClient {
    fn from(args: LegacyArgs) -> Self {
        LegacyClient {
            registration_url: args.legacy_url,
            registration_mode: args.registration_mode,
            action_header: args.action_header,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(device_id) = &cli.device_id {
        config.device_id = device_id.clone();
    }
    if let Some(device_name) = &cli.device_name {
        config.device_name = Some(device_name.clone());
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    Ok(config)
}

/// Ok(false) when the device answered but the outcome was not a success
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let client = ScalarClient::connect(&config, &cli.device)?;

    match cli.command {
        Command::Capabilities { service } => {
            let capability = client.capabilities(&service);
            println!("{}", serde_json::to_string_pretty(&*capability)?);
            Ok(!capability.is_empty())
        }
        Command::Pair { code, legacy } => {
            let outcome = client.pair(legacy.into(), code.as_deref())?;
            Ok(report(&outcome))
        }
        Command::Renew { legacy } => {
            let outcome = client.handshake(legacy.into()).register_renewal();
            Ok(report(&outcome))
        }
        Command::Check { code } => match client.check(code.as_deref()) {
            CheckOutcome::OkViaHeader => {
                println!("OK (access code header)");
                Ok(true)
            }
            CheckOutcome::OkViaSession => {
                println!("OK (session)");
                Ok(true)
            }
            CheckOutcome::Failed(outcome) => Ok(report(&outcome)),
        },
        Command::Login { code, legacy } => {
            let outcome = client.login(legacy.into(), code.as_deref())?;
            Ok(report(&outcome))
        }
    }
}

fn report(outcome: &PairingOutcome) -> bool {
    println!("{}: {}", outcome.code(), outcome.message());
    outcome.is_ok()
}
