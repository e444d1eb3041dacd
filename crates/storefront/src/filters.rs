//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use rust_decimal::Decimal;

use orchard_core::display_total;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats a decimal amount as a price string with two decimal places.
///
/// Usage in templates: `{{ product.price|price }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn price(
    amount: impl std::borrow::Borrow<Decimal>,
    _env: &dyn askama::Values,
) -> askama::Result<String> {
    Ok(display_total(*amount.borrow()))
}
