//! Core business logic abstractions

pub mod cache;
pub mod calculator;
pub mod clock;
pub mod config;
pub mod currency;
pub mod log;

// Re-export main types for cleaner imports
pub use calculator::{
    CalculationError, CalculationRequest, CalculationResult, RenewalPeriod, TradeMode,
    TradeOutcome, calculate_residual,
};
pub use clock::{Clock, SystemClock};
pub use currency::{CurrencyRateProvider, RateOrigin, RateQuote, RateSource, RateTable};
