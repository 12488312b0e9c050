//! Text rendering of a quote for display.

use quote_core::{CostBreakdown, Currency, ProductionParameters};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Write as _;

/// Shown in place of figures while the model has no analyzed volume.
pub const AWAITING_CALCULATION: &str = "Awaiting calculation";

const UPLOAD_HINT: &str = "Upload a model and wait for processing to see calculations.";

/// Round to `dp` decimals, half away from zero. `None` for non-finite values.
pub fn round_dp(value: f64, dp: u32) -> Option<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
}

/// Format an amount with the currency symbol at two decimals.
///
/// Example:
/// assert_eq!(format_money(22.9281507, Currency::EUR), "€22.93");
pub fn format_money(value: f64, currency: Currency) -> String {
    match round_dp(value, 2) {
        Some(d) => format!("{}{:.2}", currency.symbol(), d),
        None => format!("{}-", currency.symbol()),
    }
}

fn format_weight(grams: f64) -> String {
    match round_dp(grams, 1) {
        Some(d) => format!("{:.1}g", d),
        None => "-".to_string(),
    }
}

/// What the results panel shows for the current inputs.
#[derive(Clone, Debug, PartialEq)]
pub enum QuoteView<'a> {
    Awaiting,
    Ready(&'a CostBreakdown),
}

impl<'a> QuoteView<'a> {
    pub fn new(results: Option<&'a CostBreakdown>) -> Self {
        match results {
            Some(r) => QuoteView::Ready(r),
            None => QuoteView::Awaiting,
        }
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self, QuoteView::Awaiting)
    }
}

/// Render the cost breakdown panel as plain text.
pub fn render(params: &ProductionParameters, results: Option<&CostBreakdown>) -> String {
    let cur = params.currency;
    let mut out = format!(
        "Cost Breakdown ({}, {}, {})\n",
        params.technology.as_str(),
        params.material,
        cur.code()
    );
    let r = match QuoteView::new(results) {
        QuoteView::Awaiting => {
            let _ = writeln!(out, "  {AWAITING_CALCULATION}");
            let _ = writeln!(out, "  {UPLOAD_HINT}");
            return out;
        }
        QuoteView::Ready(r) => r,
    };
    let rows = [
        (
            format!("Material Cost ({} total)", format_weight(r.weight_grams)),
            r.material_cost,
        ),
        (
            format!("Operations & Power ({} hrs)", params.print_time_hours),
            r.print_cost + r.power_cost,
        ),
        (
            format!("Labor & Prep ({}h post)", params.post_process_hours),
            r.labor_cost,
        ),
        ("Unit Cost".to_string(), r.unit_cost),
        ("Profit / unit".to_string(), r.profit_per_unit),
        ("Unit Selling Price".to_string(), r.total_unit_price),
        (
            format!("Batch Total (x{})", params.quantity),
            r.final_batch_price,
        ),
    ];
    for (label, amount) in rows {
        let _ = writeln!(out, "  {:<34}{:>14}", label, format_money(amount, cur));
    }
    out
}
