use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use paperfolio::app::{self, App, BarInput};
use paperfolio::config::{default_config_path, ResolvedConfig};
use paperfolio::models::RawTransaction;
use paperfolio::settings::DividendMode;

#[derive(Parser)]
#[command(name = "paperfolio")]
#[command(about = "Paper trading ledger and portfolio valuation")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show current configuration
    Config,

    /// Record, delete and list ledger transactions
    #[command(subcommand)]
    Tx(TxCommand),

    /// Show or edit settings (initial cash, benchmarks, fees, dividend mode)
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Value every portfolio and compare against the benchmarks
    Report {
        /// Valuation date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Store market data in the local provider
    #[command(subcommand)]
    Market(MarketCommand),
}

#[derive(Subcommand)]
enum TxCommand {
    /// Append a transaction
    Add {
        #[arg(long)]
        portfolio: String,
        /// BUY, SELL, CASH_DEPOSIT, CASH_WITHDRAW or DIVIDEND
        #[arg(long)]
        kind: String,
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        #[arg(long)]
        ticker: Option<String>,
        /// us, tsx, tsx_venture or neo; inferred from the ticker suffix
        #[arg(long)]
        market: Option<String>,
        /// Shares for trades, amount for cash and dividend records
        #[arg(long)]
        quantity: String,
        #[arg(long)]
        price: Option<String>,
        #[arg(long)]
        currency: Option<String>,
        /// Defaults to the configured fee for trades
        #[arg(long)]
        fee: Option<String>,
    },
    /// Delete a transaction by id
    Delete { id: String },
    /// List transactions in chronological order
    List {
        #[arg(long)]
        portfolio: Option<String>,
        #[arg(long)]
        kind: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    /// Set a portfolio's initial cash
    SetCash { portfolio: String, amount: Decimal },
    /// Replace the benchmark tickers
    SetBenchmarks {
        #[arg(required = true)]
        tickers: Vec<String>,
    },
    /// Set the default trade fee
    SetFee { fee: Decimal },
    /// Choose auto or manual dividend crediting for a portfolio
    SetDividendMode { portfolio: String, mode: DividendMode },
}

#[derive(Subcommand)]
enum MarketCommand {
    /// Store a daily close (optionally with a dividend or split)
    AddBar {
        ticker: String,
        date: NaiveDate,
        close: Decimal,
        #[arg(long)]
        dividend: Option<Decimal>,
        #[arg(long)]
        split: Option<Decimal>,
    },
    /// Store an FX rate: one unit of BASE in QUOTE
    AddFx {
        base: String,
        quote: String,
        date: NaiveDate,
        rate: Decimal,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    let cli = Cli::parse();
    let config = ResolvedConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;

    let output = match cli.command {
        Command::Config => app::config_output(&cli.config, &config),
        command => {
            let app = App::open(config).await?;
            run(&app, &cli.config, command).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(app: &App, config_path: &Path, command: Command) -> Result<serde_json::Value> {
    match command {
        Command::Config => Ok(app::config_output(config_path, &app.config)),
        Command::Tx(TxCommand::Add {
            portfolio,
            kind,
            date,
            ticker,
            market,
            quantity,
            price,
            currency,
            fee,
        }) => {
            let raw = RawTransaction {
                date,
                portfolio,
                ticker,
                market,
                kind,
                quantity,
                price,
                currency,
                fee,
            };
            app::add_transaction(app, raw).await
        }
        Command::Tx(TxCommand::Delete { id }) => app::delete_transaction(app, &id).await,
        Command::Tx(TxCommand::List { portfolio, kind }) => {
            app::list_transactions(app, portfolio, kind).await
        }
        Command::Settings(SettingsCommand::Show) => app::show_settings(app).await,
        Command::Settings(SettingsCommand::SetCash { portfolio, amount }) => {
            app::set_cash(app, &portfolio, amount).await
        }
        Command::Settings(SettingsCommand::SetBenchmarks { tickers }) => {
            app::set_benchmarks(app, tickers).await
        }
        Command::Settings(SettingsCommand::SetFee { fee }) => app::set_fee(app, fee).await,
        Command::Settings(SettingsCommand::SetDividendMode { portfolio, mode }) => {
            app::set_dividend_mode(app, &portfolio, mode).await
        }
        Command::Report { as_of } => app::report(app, as_of).await,
        Command::Market(MarketCommand::AddBar {
            ticker,
            date,
            close,
            dividend,
            split,
        }) => {
            let input = BarInput {
                ticker,
                date,
                close,
                dividend,
                split,
            };
            app::add_bar(app, input).await
        }
        Command::Market(MarketCommand::AddFx {
            base,
            quote,
            date,
            rate,
        }) => app::add_fx(app, &base, &quote, date, rate).await,
    }
}
