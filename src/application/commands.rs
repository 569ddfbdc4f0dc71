//! CLI commands and handlers

use clap::{Parser, Subcommand};

use crate::application::services::ExchangeService;
use crate::shared::config::ConfigLoader;
use crate::shared::errors::AppError;
use crate::shared::fixed::Fixed;

#[derive(Parser)]
#[command(name = "aurex")]
#[command(about = "Gold/stable exchange engine with oracle-anchored liquidity buckets")]
pub struct Cli {
    /// Path to config file
    #[arg(long, default_value = "Config.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the current liquidity buckets
    Buckets,

    /// Quote a trade without executing it
    Quote {
        /// Amount in (forward) or desired amount out (with --inverse)
        amount: u64,

        /// Sell the gold asset for stable; omit to sell stable for gold
        #[arg(long)]
        sell_gold: bool,

        /// Quote the required sell amount for a desired buy amount
        #[arg(long)]
        inverse: bool,

        /// Print the quote as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute a trade in the sandbox
    Trade {
        /// Amount of the sell token to exchange
        amount: u64,

        /// Minimum acceptable amount of the buy token
        #[arg(long, default_value_t = 0)]
        min_buy: u64,

        /// Sell the gold asset for stable; omit to sell stable for gold
        #[arg(long)]
        sell_gold: bool,
    },

    /// Change engine parameters as the sandbox owner
    Set {
        /// Minimum seconds between bucket refreshes
        #[arg(long)]
        update_frequency: Option<u64>,

        /// Minimum oracle report count for a refresh
        #[arg(long)]
        minimum_reports: Option<u64>,

        /// Trading spread as a decimal fraction, e.g. 0.005
        #[arg(long)]
        spread: Option<Fixed>,

        /// Reserve fraction as a decimal fraction, e.g. 0.25
        #[arg(long)]
        reserve_fraction: Option<Fixed>,
    },

    /// Run a deterministic trading loop against the sandbox
    Simulate {
        /// Number of trades to attempt
        #[arg(long, default_value_t = 20)]
        rounds: u32,

        /// Simulated seconds between trades
        #[arg(long, default_value_t = 600)]
        step_secs: u64,

        /// Wall-clock milliseconds between rounds
        #[arg(long, default_value_t = 250)]
        interval_ms: u64,
    },
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    let config = ConfigLoader::load(&cli.config)?;
    let service = ExchangeService::new(config);

    match cli.command {
        Commands::Buckets => {
            let pair = service.buckets().await?;
            println!("📊 gold bucket:   {}", pair.gold);
            println!("📊 stable bucket: {}", pair.stable);
        }
        Commands::Quote {
            amount,
            sell_gold,
            inverse,
            json,
        } => {
            let quote = service.quote(amount as u128, sell_gold, inverse).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&quote)
                        .map_err(|e| AppError::Unknown(e.to_string()))?
                );
            } else {
                let (sell_token, buy_token) = if sell_gold {
                    ("gold", "stable")
                } else {
                    ("stable", "gold")
                };
                println!(
                    "💱 sell {} {sell_token} → receive {} {buy_token}",
                    quote.amount_in, quote.amount_out
                );
            }
        }
        Commands::Trade {
            amount,
            min_buy,
            sell_gold,
        } => {
            let trade = service
                .trade(amount as u128, min_buy as u128, sell_gold)
                .await?;
            println!(
                "✅ sold {} for {} (buckets now: gold {}, stable {})",
                trade.sell_amount, trade.buy_amount, trade.gold_bucket, trade.stable_bucket
            );
        }
        Commands::Set {
            update_frequency,
            minimum_reports,
            spread,
            reserve_fraction,
        } => {
            let config = service
                .set_parameters(update_frequency, minimum_reports, spread, reserve_fraction)
                .await?;
            println!("⚙️  spread:            {}", config.spread);
            println!("⚙️  reserve fraction:  {}", config.reserve_fraction);
            println!("⚙️  update frequency:  {}s", config.update_frequency_secs);
            println!("⚙️  minimum reports:   {}", config.minimum_reports);
        }
        Commands::Simulate {
            rounds,
            step_secs,
            interval_ms,
        } => {
            service.simulate(rounds, step_secs, interval_ms).await?;
        }
    }

    Ok(())
}
