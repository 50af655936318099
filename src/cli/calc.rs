use super::ui;
use crate::core::calculator::UnsupportedPeriod;
use crate::core::{
    CalculationRequest, CalculationResult, Clock, CurrencyRateProvider, RateOrigin, RateQuote,
    RenewalPeriod, TradeMode, TradeOutcome, calculate_residual,
};
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Input problems caught before any arithmetic runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error(transparent)]
    UnsupportedPeriod(#[from] UnsupportedPeriod),
    #[error("{field} must be greater than 0")]
    NotPositive { field: &'static str },
    #[error("Trade date {trade_date} must be earlier than renewal date {renewal_date}")]
    TradeDateNotBeforeRenewal {
        trade_date: NaiveDate,
        renewal_date: NaiveDate,
    },
}

/// Everything the `buy` and `sell` commands collect.
#[derive(Debug, Clone)]
pub struct CalcInput {
    pub renewal_amount: Decimal,
    pub currency: String,
    /// Skips the rate lookup when given.
    pub exchange_rate: Option<Decimal>,
    pub renewal_date: NaiveDate,
    pub period_months: u32,
    /// Defaults to today.
    pub trade_date: Option<NaiveDate>,
    pub mode: TradeMode,
    pub json: bool,
}

fn ensure_positive(value: Decimal, field: &'static str) -> Result<(), ValidationError> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::NotPositive { field })
    }
}

/// Checks everything that does not depend on the exchange rate and returns
/// the parsed period and the effective trade date.
pub fn validate_term(
    input: &CalcInput,
    today: NaiveDate,
) -> Result<(RenewalPeriod, NaiveDate), ValidationError> {
    let renewal_period = RenewalPeriod::try_from(input.period_months)?;
    let trade_date = input.trade_date.unwrap_or(today);
    if trade_date >= input.renewal_date {
        return Err(ValidationError::TradeDateNotBeforeRenewal {
            trade_date,
            renewal_date: input.renewal_date,
        });
    }
    ensure_positive(input.renewal_amount, "Renewal amount")?;
    if let TradeMode::Buy { trade_price } = input.mode {
        ensure_positive(trade_price, "Trade price")?;
    }
    Ok((renewal_period, trade_date))
}

pub fn build_request(
    input: &CalcInput,
    exchange_rate: Decimal,
    today: NaiveDate,
) -> Result<CalculationRequest, ValidationError> {
    let (renewal_period, trade_date) = validate_term(input, today)?;
    ensure_positive(exchange_rate, "Exchange rate")?;

    Ok(CalculationRequest {
        renewal_amount: input.renewal_amount,
        exchange_rate,
        renewal_date: input.renewal_date,
        renewal_period,
        trade_date,
        mode: input.mode,
    })
}

#[derive(Debug, Serialize)]
struct CalcReport<'a> {
    currency: &'a str,
    local_currency: &'a str,
    rate: &'a RateQuote,
    request: &'a CalculationRequest,
    result: &'a CalculationResult,
}

pub fn render_table(
    request: &CalculationRequest,
    result: &CalculationResult,
    currency: &str,
    local_currency: &str,
    quote: &RateQuote,
) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Item"), ui::header_cell("Value")]);

    table.add_row(vec![
        ui::label_cell(&format!("Renewal amount ({currency})")),
        ui::amount_cell(request.renewal_amount),
    ]);
    table.add_row(vec![
        ui::label_cell(&format!("Exchange rate ({currency}/{local_currency})")),
        ui::rate_cell(quote.rate),
    ]);
    table.add_row(vec![
        ui::label_cell("Renewal period"),
        Cell::new(format!(
            "{} ({} to {})",
            request.renewal_period, result.period_start, request.renewal_date
        )),
    ]);
    table.add_row(vec![
        ui::label_cell("Total days"),
        Cell::new(result.total_period_days),
    ]);
    table.add_row(vec![
        ui::label_cell(&format!("Daily price ({local_currency})")),
        ui::amount_cell(result.daily_price),
    ]);
    table.add_row(vec![
        ui::label_cell(&format!("Remaining days (from {})", request.trade_date)),
        Cell::new(result.remaining_days),
    ]);
    table.add_row(vec![
        ui::label_cell(&format!("Residual value ({local_currency})")),
        ui::amount_cell(result.residual_value),
    ]);
    match request.mode {
        TradeMode::Buy { trade_price } => {
            table.add_row(vec![
                ui::label_cell(&format!("Trade price ({local_currency})")),
                ui::amount_cell(trade_price),
            ]);
        }
        TradeMode::Sell { expected_premium } => {
            table.add_row(vec![
                ui::label_cell(&format!("Expected premium ({local_currency})")),
                ui::amount_cell(expected_premium),
            ]);
        }
    }

    let label = match result.outcome {
        TradeOutcome::Premium(_) => "Premium",
        TradeOutcome::SuggestedPrice(_) => "Suggested price",
    };
    let amount = result.outcome.amount();
    table.add_row(vec![
        ui::label_cell(&format!("{label} ({local_currency})")),
        ui::signed_amount_cell(amount),
    ]);

    let mut output = format!(
        "{}\n\n",
        ui::style_text("Residual value", ui::StyleType::Heading)
    );
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n{} {}",
        ui::style_text(&format!("{label}:"), ui::StyleType::OutcomeLabel),
        ui::style_text(
            &format!("{amount:.2} {local_currency}"),
            ui::StyleType::OutcomeValue
        )
    ));

    let rate_note = match (&quote.origin, quote.as_of) {
        (RateOrigin::Default, _) => ui::style_text(
            "Rate sources unavailable, using a built-in approximate rate",
            ui::StyleType::Warning,
        ),
        (origin, Some(as_of)) => ui::style_text(
            &format!("Rate from {origin}, as of {as_of}"),
            ui::StyleType::Note,
        ),
        (origin, None) => ui::style_text(&format!("Rate from {origin}"), ui::StyleType::Note),
    };
    output.push_str(&format!("\n{rate_note}"));
    output
}

pub async fn run(
    input: &CalcInput,
    provider: &dyn CurrencyRateProvider,
    local_currency: &str,
    clock: &dyn Clock,
) -> Result<()> {
    let today = clock.today();
    validate_term(input, today)?;

    let currency = input.currency.trim().to_uppercase();
    let quote = match input.exchange_rate {
        Some(rate) => RateQuote {
            rate,
            as_of: None,
            origin: RateOrigin::Manual,
        },
        None => {
            let pb = ui::new_spinner("Fetching exchange rate...");
            let quote = provider.get_rate(&currency, false).await;
            pb.finish_and_clear();
            quote
        }
    };
    debug!(?quote, "Using exchange rate for {}", currency);

    let request = build_request(input, quote.rate, today)?;
    let result = calculate_residual(&request)?;

    if input.json {
        let report = CalcReport {
            currency: &currency,
            local_currency,
            rate: &quote,
            request: &request,
            result: &result,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{}",
            render_table(&request, &result, &currency, local_currency, &quote)
        );
    }
    Ok(())
}
