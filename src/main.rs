use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand};
use resval::cli::calc::CalcInput;
use resval::core::TradeMode;
use resval::core::log::init_logging;
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Inputs shared by buy and sell.
#[derive(Args)]
struct TermArgs {
    /// Renewal amount in the source currency
    #[arg(short, long)]
    amount: Decimal,

    /// Source currency code
    #[arg(long, default_value = "USD")]
    currency: String,

    /// Local currency per unit of source currency; looked up when omitted
    #[arg(short, long)]
    rate: Option<Decimal>,

    /// Date the renewal term ends (YYYY-MM-DD)
    #[arg(long)]
    renewal_date: NaiveDate,

    /// Renewal period in months: 1, 3, 6, 12, 24, 36 or 60
    #[arg(short, long, default_value_t = 12)]
    period: u32,

    /// Trade date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    trade_date: Option<NaiveDate>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl TermArgs {
    fn into_input(self, mode: TradeMode) -> CalcInput {
        CalcInput {
            renewal_amount: self.amount,
            currency: self.currency,
            exchange_rate: self.rate,
            renewal_date: self.renewal_date,
            period_months: self.period,
            trade_date: self.trade_date,
            mode,
            json: self.json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example configuration file
    Setup,
    /// Show the exchange rate from a currency to the local currency
    Rate {
        /// Currency code, e.g. USD
        currency: String,
        /// Ignore cached rates
        #[arg(long)]
        refresh: bool,
    },
    /// Drop cached rates for one currency, or all of them
    ClearCache {
        currency: Option<String>,
    },
    /// Price a term you are buying: premium over its residual value
    Buy {
        #[command(flatten)]
        term: TermArgs,
        /// Asking price in local currency
        #[arg(long)]
        price: Decimal,
    },
    /// Price a term you are selling: residual value plus a premium
    Sell {
        #[command(flatten)]
        term: TermArgs,
        /// Premium on top of the residual value, in local currency
        #[arg(long, allow_negative_numbers = true)]
        premium: Decimal,
    },
}

impl From<Commands> for resval::AppCommand {
    fn from(cmd: Commands) -> resval::AppCommand {
        match cmd {
            Commands::Rate { currency, refresh } => resval::AppCommand::Rate { currency, refresh },
            Commands::ClearCache { currency } => resval::AppCommand::ClearCache { currency },
            Commands::Buy { term, price } => resval::AppCommand::Calculate(
                term.into_input(TradeMode::Buy { trade_price: price }),
            ),
            Commands::Sell { term, premium } => resval::AppCommand::Calculate(
                term.into_input(TradeMode::Sell {
                    expected_premium: premium,
                }),
            ),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => resval::cli::setup::setup(cli.config_path.as_deref()),
        Some(cmd) => resval::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
