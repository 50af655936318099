//! Residual value arithmetic for prepaid renewal terms.
//!
//! All money values are `Decimal`. Reported values are rounded to two places
//! with round-half-away-from-zero; intermediate values are never rounded.

use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
const REPORTED_PLACES: u32 = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unsupported renewal period: {0} months (expected one of 1, 3, 6, 12, 24, 36, 60)")]
pub struct UnsupportedPeriod(pub u32);

/// The renewal term lengths that can be priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum RenewalPeriod {
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    ThreeYears,
    FiveYears,
}

impl RenewalPeriod {
    pub const ALL: [RenewalPeriod; 7] = [
        RenewalPeriod::OneMonth,
        RenewalPeriod::ThreeMonths,
        RenewalPeriod::SixMonths,
        RenewalPeriod::OneYear,
        RenewalPeriod::TwoYears,
        RenewalPeriod::ThreeYears,
        RenewalPeriod::FiveYears,
    ];

    pub fn months(&self) -> u32 {
        match self {
            RenewalPeriod::OneMonth => 1,
            RenewalPeriod::ThreeMonths => 3,
            RenewalPeriod::SixMonths => 6,
            RenewalPeriod::OneYear => 12,
            RenewalPeriod::TwoYears => 24,
            RenewalPeriod::ThreeYears => 36,
            RenewalPeriod::FiveYears => 60,
        }
    }
}

impl TryFrom<u32> for RenewalPeriod {
    type Error = UnsupportedPeriod;

    fn try_from(months: u32) -> Result<Self, Self::Error> {
        RenewalPeriod::ALL
            .into_iter()
            .find(|p| p.months() == months)
            .ok_or(UnsupportedPeriod(months))
    }
}

impl From<RenewalPeriod> for u32 {
    fn from(period: RenewalPeriod) -> u32 {
        period.months()
    }
}

impl FromStr for RenewalPeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let months: u32 = s
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid renewal period: {}", s))?;
        Ok(RenewalPeriod::try_from(months)?)
    }
}

impl Display for RenewalPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.months() {
            1 => write!(f, "1 month"),
            n => write!(f, "{n} months"),
        }
    }
}

/// Buy mode carries the asking price, sell mode the premium the seller wants
/// on top of the residual value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TradeMode {
    Buy { trade_price: Decimal },
    Sell { expected_premium: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRequest {
    /// In the source currency.
    pub renewal_amount: Decimal,
    /// Local currency units per source currency unit.
    pub exchange_rate: Decimal,
    /// The day the renewal term ends.
    pub renewal_date: NaiveDate,
    pub renewal_period: RenewalPeriod,
    pub trade_date: NaiveDate,
    #[serde(flatten)]
    pub mode: TradeMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeOutcome {
    /// Asking price minus residual value. Negative when the asking price is
    /// below the residual value.
    Premium(Decimal),
    SuggestedPrice(Decimal),
}

impl TradeOutcome {
    pub fn amount(&self) -> Decimal {
        match self {
            TradeOutcome::Premium(d) | TradeOutcome::SuggestedPrice(d) => *d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub period_start: NaiveDate,
    pub total_period_days: i64,
    pub daily_price: Decimal,
    pub remaining_days: i64,
    pub residual_value: Decimal,
    #[serde(flatten)]
    pub outcome: TradeOutcome,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Calculation error: {message}")]
pub struct CalculationError {
    pub message: String,
}

impl CalculationError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

fn round_reported(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(REPORTED_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

fn overflow(step: &str) -> CalculationError {
    CalculationError::new(format!("decimal overflow while computing {step}"))
}

/// Subtracts whole calendar months. A day past the end of the target month
/// clamps to its last day, so 2024-03-31 minus one month is 2024-02-29.
pub fn period_start(renewal_date: NaiveDate, period: RenewalPeriod) -> Option<NaiveDate> {
    renewal_date.checked_sub_months(Months::new(period.months()))
}

/// Whole days left on the term, counting a partial day as a full one.
pub fn remaining_days(renewal_date: NaiveDate, trade_date: NaiveDate) -> i64 {
    let millis = renewal_date
        .signed_duration_since(trade_date)
        .num_milliseconds();
    let days = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) > 0 {
        days + 1
    } else {
        days
    }
}

pub fn calculate_residual(
    request: &CalculationRequest,
) -> Result<CalculationResult, CalculationError> {
    let start = period_start(request.renewal_date, request.renewal_period).ok_or_else(|| {
        CalculationError::new(format!(
            "{} before {} is out of the supported date range",
            request.renewal_period, request.renewal_date
        ))
    })?;
    let total_period_days = (request.renewal_date - start).num_days();
    if total_period_days <= 0 {
        return Err(CalculationError::new(format!(
            "renewal period starting {start} has no days"
        )));
    }

    let renewal_amount_local = request
        .renewal_amount
        .checked_mul(request.exchange_rate)
        .ok_or_else(|| overflow("local renewal amount"))?;
    let daily_price = renewal_amount_local
        .checked_div(Decimal::from(total_period_days))
        .ok_or_else(|| overflow("daily price"))?;

    let remaining_days = remaining_days(request.renewal_date, request.trade_date);
    let residual_value = daily_price
        .checked_mul(Decimal::from(remaining_days))
        .ok_or_else(|| overflow("residual value"))?;

    let outcome = match request.mode {
        TradeMode::Buy { trade_price } => TradeOutcome::Premium(round_reported(
            trade_price
                .checked_sub(residual_value)
                .ok_or_else(|| overflow("premium"))?,
        )),
        TradeMode::Sell { expected_premium } => TradeOutcome::SuggestedPrice(round_reported(
            residual_value
                .checked_add(expected_premium)
                .ok_or_else(|| overflow("suggested price"))?,
        )),
    };

    Ok(CalculationResult {
        period_start: start,
        total_period_days,
        daily_price: round_reported(daily_price),
        remaining_days,
        residual_value: round_reported(residual_value),
        outcome,
    })
}
