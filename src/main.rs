//! Gasless swap service and client
//!
//! - `serve`: run the fee-payer co-signer over HTTP
//! - `quote`: ask the aggregator for a quote
//! - `swap`: execute a gasless swap with a local keypair as the user's wallet
//! - `fee-payer`: show the fee-payer address, balance and top-up guidance

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gasless_swap::{
    aggregator::JupiterClient,
    config::Config,
    gasless::{
        CoSignPolicy, CoSignResponse, CoSignTransport, CoSigner, FeePayerStatus, GaslessSwapClient,
        RemoteCoSigner,
    },
    rpc::{LedgerClient, SolanaLedger},
    server::{run_server, AppState},
    wallet::KeypairWallet,
};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "GASLESS_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the co-signer HTTP service
    Serve {
        /// Override server.bind_addr
        #[arg(long)]
        bind: Option<String>,
    },

    /// Request a swap quote
    Quote {
        #[command(flatten)]
        pair: PairArgs,
    },

    /// Execute a gasless swap
    Swap {
        #[command(flatten)]
        pair: PairArgs,

        /// Keypair file of the swapping user
        #[arg(long)]
        user_keypair: String,

        /// Co-signer service URL; without it the fee payer signs in-process
        #[arg(long)]
        cosigner_url: Option<String>,
    },

    /// Show fee-payer address and balance
    FeePayer,
}

#[derive(clap::Args, Debug)]
struct PairArgs {
    #[arg(long)]
    input_mint: Pubkey,

    #[arg(long)]
    output_mint: Pubkey,

    /// Amount in base units of the input mint
    #[arg(long)]
    amount: u64,

    #[arg(long, default_value_t = 50)]
    slippage_bps: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json)?;

    let mut config = Config::load(args.config.as_deref())?;
    info!(version = env!("CARGO_PKG_VERSION"), rpc = %config.rpc.url, "Configuration loaded");

    match args.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind_addr = bind;
            }
            serve(&config).await
        }
        Command::Quote { pair } => quote(&config, &pair).await,
        Command::Swap {
            pair,
            user_keypair,
            cosigner_url,
        } => swap(&config, &pair, &user_keypair, cosigner_url).await,
        Command::FeePayer => fee_payer(&config).await,
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "gasless_swap=debug,info"
    } else {
        "gasless_swap=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_target(true)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(true)))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

fn ledger(config: &Config) -> Arc<dyn LedgerClient> {
    Arc::new(SolanaLedger::new(config.rpc.url.clone(), config.rpc_timeout()))
}

fn local_cosigner(config: &Config, policy: CoSignPolicy) -> Result<CoSigner<dyn LedgerClient>> {
    let wallet = KeypairWallet::load(&config.fee_payer).context("Failed to load fee payer")?;
    Ok(CoSigner::new(ledger(config), wallet.signer(), policy))
}

async fn serve(config: &Config) -> Result<()> {
    let cosigner = Arc::new(local_cosigner(config, config.cosign_policy())?);

    match cosigner.fee_payer_balance().await {
        Ok(balance) if balance < config.cosigner.min_balance_lamports => warn!(
            balance,
            required = config.cosigner.min_balance_lamports,
            "Fee payer is below the minimum balance; requests will be refused until topped up"
        ),
        Ok(balance) => info!(balance, "Fee payer funded"),
        Err(e) => warn!(error = %e, "Could not read fee payer balance at startup"),
    }

    let state = AppState::new(cosigner, config.monitoring.enable_metrics);
    run_server(state, config.bind_addr()?).await
}

async fn quote(config: &Config, pair: &PairArgs) -> Result<()> {
    let jupiter = JupiterClient::new(
        config.aggregator.base_url.clone(),
        config.aggregator_timeout(),
        config.aggregator.wrap_and_unwrap_sol,
    )?;
    let quote = jupiter
        .get_quote(&pair.input_mint, &pair.output_mint, pair.amount, pair.slippage_bps)
        .await?;

    println!("{}", serde_json::to_string_pretty(&quote)?);
    Ok(())
}

async fn swap(config: &Config, pair: &PairArgs, user_keypair: &str, cosigner_url: Option<String>) -> Result<()> {
    let user = KeypairWallet::from_file(user_keypair).context("Failed to load user keypair")?;
    let jupiter = JupiterClient::new(
        config.aggregator.base_url.clone(),
        config.aggregator_timeout(),
        config.aggregator.wrap_and_unwrap_sol,
    )?;

    let quote = jupiter
        .get_quote(&pair.input_mint, &pair.output_mint, pair.amount, pair.slippage_bps)
        .await?;
    info!(
        in_amount = ?quote.in_amount(),
        out_amount = ?quote.out_amount(),
        "Quote received"
    );
    let instructions = jupiter.get_swap_instructions(&quote, &user.pubkey()).await?;

    let transport: Arc<dyn CoSignTransport> = match cosigner_url.or_else(|| config.aggregator.cosigner_url.clone()) {
        Some(url) => Arc::new(RemoteCoSigner::new(url, config.rpc_timeout() * 3)?),
        None => Arc::new(local_cosigner(config, config.cosign_policy())?),
    };

    let client = GaslessSwapClient::new(ledger(config), transport);
    let response = client.execute(&instructions, &user).await?;
    report(&response);

    if response.success {
        Ok(())
    } else {
        anyhow::bail!(response.error.unwrap_or_else(|| "co-sign failed".to_string()))
    }
}

async fn fee_payer(config: &Config) -> Result<()> {
    let cosigner = local_cosigner(config, config.cosign_policy())?;
    let balance = cosigner.fee_payer_balance().await?;
    let status = FeePayerStatus::new(&cosigner.fee_payer(), balance, config.cosigner.min_balance_lamports);

    println!("{}", serde_json::to_string_pretty(&status)?);
    if status.needs_top_up {
        println!(
            "Send at least {} lamports to {} before serving requests",
            status.min_balance - status.balance,
            status.fee_payer_address
        );
    }
    Ok(())
}

fn report(response: &CoSignResponse) {
    if let Some(url) = &response.explorer_url {
        println!("Transaction: {}", url);
    } else if let Some(signature) = &response.transaction_signature {
        println!("Transaction: {}", signature);
    }
    if let Some(shortfall) = response.shortfall_lamports() {
        println!(
            "Fee payer {} needs {} more lamports",
            response.fee_payer_address.as_deref().unwrap_or("unknown"),
            shortfall
        );
    }
    if let Some(error) = &response.error {
        println!("Error: {}", error);
    }
}
