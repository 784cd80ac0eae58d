//! pushsync CLI - reconciles one account's push subscription.
//!
//! This is the main binary entry point. See the `pushsync` library for the
//! core functionality.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use pushsync::capability::CapabilityProber;
use pushsync::oplog::OperationLog;
use pushsync::{
    digest, Config, FileKeyStore, Reconciler, ReqwestTransport, StaticAccount, StaticDevice,
    SubscriptionIntent,
};

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "pushsync")]
#[command(about = "Reconcile push notification subscriptions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the server subscription in line with the requested categories
    Reconcile {
        /// Account handle (user or user@host)
        #[arg(long)]
        acct: String,
        /// Access token for the account
        #[arg(long, env = "PUSHSYNC_ACCESS_TOKEN", hide_env_values = true)]
        token: Option<String>,
        /// Push-delivery device id
        #[arg(long)]
        device_id: Option<String>,
        /// Relay installation id
        #[arg(long)]
        install_id: Option<String>,
        /// Push boosts
        #[arg(long)]
        boost: bool,
        /// Push favourites
        #[arg(long)]
        favourite: bool,
        /// Push new followers
        #[arg(long)]
        follow: bool,
        /// Push mentions
        #[arg(long)]
        mention: bool,
        /// Treat the account as a pseudo (read-only) account
        #[arg(long)]
        pseudo: bool,
        /// Print verbose diagnostics
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print the URL-safe SHA-256 digest of a string
    Digest {
        /// Text to digest
        text: String,
    },
    /// Print the push capability of the configured server
    Capability,
    /// Update and save settings in config.json
    Config {
        /// Base URL of the social-network server
        #[arg(long)]
        server_url: Option<String>,
        /// Base URL of the relay
        #[arg(long)]
        relay_url: Option<String>,
        /// Surface verbose log entries by default
        #[arg(long)]
        verbose: Option<bool>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reconcile {
            acct,
            token,
            device_id,
            install_id,
            boost,
            favourite,
            follow,
            mention,
            pseudo,
            verbose,
        } => {
            let config = Config::load()?;
            let account = StaticAccount {
                handle: acct,
                access_token: token,
                pseudo,
            };
            let device = StaticDevice {
                device_id,
                install_id,
            };
            let intent = SubscriptionIntent::new(boost, favourite, follow, mention);
            let success = reconcile(&config, &account, &device, intent, verbose || config.verbose)?;
            if !success {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Digest { text } => {
            println!("{}", digest::digest(text.as_bytes()));
            Ok(())
        }
        Commands::Capability => {
            let config = Config::load()?;
            let transport = ReqwestTransport::new()?;
            let mut log = OperationLog::new();
            let info = CapabilityProber::new(&transport, config.require_server_url()?)
                .fetch(&mut log)
                .context("Failed to read server version")?;
            println!("{}: {}", info.version, info.capability);
            Ok(())
        }
        Commands::Config {
            server_url,
            relay_url,
            verbose,
        } => {
            let mut config = Config::load()?;
            if let Some(server_url) = server_url {
                config.server_url = server_url;
            }
            if let Some(relay_url) = relay_url {
                config.relay_url = relay_url;
            }
            if let Some(verbose) = verbose {
                config.verbose = verbose;
            }
            config.save()?;
            println!("Saved to {}", Config::config_dir()?.join("config.json").display());
            Ok(())
        }
    }
}

/// Runs one reconciliation and prints its log. Returns whether it succeeded.
fn reconcile(
    config: &Config,
    account: &StaticAccount,
    device: &StaticDevice,
    intent: SubscriptionIntent,
    verbose: bool,
) -> Result<bool> {
    let server_url = config.require_server_url()?;
    let store = FileKeyStore::open(config.key_store_path()?)?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("Failed to install Ctrl-C handler")?;
    let transport = ReqwestTransport::new()?.with_cancel_flag(cancel);

    let result = Reconciler::new(&transport, &store, server_url, &config.relay_url)
        .verbose(verbose)
        .reconcile(account, device, intent);

    let log = result.rendered_log();
    if !log.is_empty() {
        println!("{}", log);
    }

    match result.error() {
        Some(err) => {
            eprintln!("Reconciliation failed: {}", err);
            Ok(false)
        }
        None => {
            println!(
                "{}",
                if result.subscribed() {
                    "Subscribed."
                } else {
                    "Not subscribed."
                }
            );
            Ok(true)
        }
    }
}
