//! Last-resort rates used when every remote source is down.

use rust_decimal::Decimal;
use std::collections::HashMap;

/// Approximate local-currency value of one unit of each currency. Unknown
/// codes resolve to 1.
#[derive(Debug, Clone)]
pub struct DefaultRates {
    rates: HashMap<String, Decimal>,
}

impl DefaultRates {
    /// The built-in table, quoted in CNY.
    pub fn builtin() -> Self {
        let rates = [
            ("USD", Decimal::new(72, 1)),
            ("EUR", Decimal::new(78, 1)),
            ("GBP", Decimal::new(91, 1)),
            ("JPY", Decimal::new(48, 3)),
            ("HKD", Decimal::new(92, 2)),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();
        Self { rates }
    }

    pub fn with_overrides(mut self, overrides: &HashMap<String, Decimal>) -> Self {
        for (code, rate) in overrides {
            self.rates.insert(code.to_uppercase(), *rate);
        }
        self
    }

    pub fn rate_for(&self, currency: &str) -> Decimal {
        self.rates
            .get(&currency.to_uppercase())
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    /// Known codes, sorted.
    pub fn currencies(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.rates.keys().cloned().collect();
        codes.sort();
        codes
    }
}

impl Default for DefaultRates {
    fn default() -> Self {
        Self::builtin()
    }
}
