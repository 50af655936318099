use super::ui;
use crate::core::{CurrencyRateProvider, RateQuote};
use anyhow::Result;
use comfy_table::Cell;

pub fn render_quote(currency: &str, local_currency: &str, quote: &RateQuote) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Rate ({local_currency})")),
        ui::header_cell("As of"),
        ui::header_cell("Source"),
    ]);
    table.add_row(vec![
        Cell::new(currency),
        ui::rate_cell(quote.rate),
        ui::date_cell(quote.as_of),
        Cell::new(quote.origin.to_string()),
    ]);

    format!(
        "{}\n\n{}",
        ui::style_text("Exchange rate", ui::StyleType::Heading),
        table
    )
}

pub async fn run(
    currency: &str,
    force_refresh: bool,
    provider: &dyn CurrencyRateProvider,
    local_currency: &str,
) -> Result<()> {
    let currency = currency.trim().to_uppercase();
    let pb = ui::new_spinner(&format!("Fetching {currency} rate..."));
    let quote = provider.get_rate(&currency, force_refresh).await;
    pb.finish_and_clear();

    println!("{}", render_quote(&currency, local_currency, &quote));
    Ok(())
}

pub async fn clear_cache(currency: Option<&str>, provider: &dyn CurrencyRateProvider) -> Result<()> {
    provider.clear_cache(currency).await;
    match currency {
        Some(code) => println!("Cleared cached rate for {}", code.trim().to_uppercase()),
        None => println!("Cleared all cached rates"),
    }
    Ok(())
}
