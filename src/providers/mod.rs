pub mod defaults;
pub mod exchange_rate_api;
pub mod exchange_rate_host;
pub mod rate_cache;
pub mod rate_provider;
pub mod util;

pub use defaults::DefaultRates;
pub use rate_cache::{RateCache, RateCacheEntry};
pub use rate_provider::ExchangeRateProvider;
