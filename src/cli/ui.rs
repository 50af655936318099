use chrono::NaiveDate;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use std::time::Duration;

/// Text roles used in command output.
pub enum StyleType {
    Heading,
    OutcomeLabel,
    OutcomeValue,
    Warning,
    Note,
}

pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Heading => style(text).bold().underlined(),
        StyleType::OutcomeLabel => style(text).bold(),
        StyleType::OutcomeValue => style(text).cyan().bold(),
        StyleType::Warning => style(text).yellow(),
        StyleType::Note => style(text).dim(),
    };
    styled.to_string()
}

/// Rounded-corner table that wraps to the terminal width.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

pub fn label_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

/// Right-aligned rate with trailing zeros dropped.
pub fn rate_cell(rate: Decimal) -> Cell {
    Cell::new(rate.normalize()).set_alignment(CellAlignment::Right)
}

/// Date cell; a missing date shows as a greyed "unknown".
pub fn date_cell(date: Option<NaiveDate>) -> Cell {
    match date {
        Some(date) => Cell::new(date),
        None => Cell::new("unknown").fg(Color::DarkGrey),
    }
}

pub fn amount_cell(value: Decimal) -> Cell {
    Cell::new(format!("{value:.2}")).set_alignment(CellAlignment::Right)
}

/// Bold amount: green at or above zero, red below.
pub fn signed_amount_cell(value: Decimal) -> Cell {
    let color = if value < Decimal::ZERO {
        Color::Red
    } else {
        Color::Green
    };
    amount_cell(value).fg(color).add_attribute(Attribute::Bold)
}

/// Spinner on stderr for a lookup of unknown length.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
